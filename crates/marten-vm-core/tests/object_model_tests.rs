//! Property-descriptor and array-length invariants.

use marten_vm_core::atom::atoms;
use marten_vm_core::property::{Property, PropertyDescriptor, PropertyKey};
use marten_vm_core::{Context, JsObject, Runtime, Value};

fn new_context() -> (std::sync::Arc<Runtime>, Context) {
    let runtime = Runtime::new();
    let cx = runtime.create_context();
    (runtime, cx)
}

#[test]
fn non_configurable_transitions_are_rejected_and_leave_state() {
    let (_rt, mut cx) = new_context();
    let obj = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
    let key = cx.key("locked");

    assert!(obj
        .define_own_property(
            &mut cx,
            &key,
            PropertyDescriptor::data(Value::int32(1), false, true, false),
        )
        .unwrap());

    // configurable: false → true must fail.
    let flip_configurable = PropertyDescriptor {
        configurable: Some(true),
        ..Default::default()
    };
    assert!(!obj.define_own_property(&mut cx, &key, flip_configurable).unwrap());

    // writable: false → true must fail.
    let flip_writable = PropertyDescriptor {
        writable: Some(true),
        ..Default::default()
    };
    assert!(!obj.define_own_property(&mut cx, &key, flip_writable).unwrap());

    // Value change on a non-writable property must fail.
    let change_value = PropertyDescriptor {
        value: Some(Value::int32(2)),
        ..Default::default()
    };
    assert!(!obj.define_own_property(&mut cx, &key, change_value).unwrap());

    // data → accessor without configurability must fail.
    let to_accessor = PropertyDescriptor::accessor(None, None, true, false);
    assert!(!obj.define_own_property(&mut cx, &key, to_accessor).unwrap());

    // The descriptor is untouched.
    let current = obj.get_own_property(&mut cx, &key).unwrap().unwrap();
    match current {
        Property::Data {
            value,
            writable,
            enumerable,
            configurable,
        } => {
            assert!(value.strict_equals(&Value::int32(1)));
            assert!(!writable);
            assert!(enumerable);
            assert!(!configurable);
        }
        other => panic!("expected data property, got {other:?}"),
    }
}

#[test]
fn writable_to_non_writable_is_allowed_once() {
    let (_rt, mut cx) = new_context();
    let obj = JsObject::ordinary(None);
    let key = cx.key("p");

    obj.define_own_property(
        &mut cx,
        &key,
        PropertyDescriptor::data(Value::int32(1), true, true, false),
    )
    .unwrap();

    // writable true → false is the permitted direction.
    let narrow = PropertyDescriptor {
        writable: Some(false),
        ..Default::default()
    };
    assert!(obj.define_own_property(&mut cx, &key, narrow).unwrap());

    // And cannot be widened back.
    let widen = PropertyDescriptor {
        writable: Some(true),
        ..Default::default()
    };
    assert!(!obj.define_own_property(&mut cx, &key, widen).unwrap());
}

#[test]
fn non_extensible_rejects_new_keys_but_mutates_existing() {
    let (_rt, mut cx) = new_context();
    let obj = JsObject::ordinary(None);
    let existing = cx.key("existing");
    obj.define_own_property(
        &mut cx,
        &existing,
        PropertyDescriptor::data(Value::int32(1), true, true, true),
    )
    .unwrap();

    obj.prevent_extensions(&mut cx).unwrap();
    assert!(!obj.is_extensible(&mut cx).unwrap());

    let fresh = cx.key("fresh");
    assert!(!obj
        .define_own_property(
            &mut cx,
            &fresh,
            PropertyDescriptor::data(Value::int32(2), true, true, true),
        )
        .unwrap());

    let receiver = Value::Object(obj.clone());
    assert!(obj
        .set(&mut cx, &existing, Value::int32(9), &receiver)
        .unwrap());
    let read = obj.get(&mut cx, &existing, &receiver).unwrap();
    assert!(read.strict_equals(&Value::int32(9)));
}

#[test]
fn array_length_truncation_stops_at_non_configurable_index() {
    // a = [10, 20, 30, 40]; defineProperty(a, '2', {configurable: false});
    // a.length = 0 → length clamps to 3, a[2] survives.
    let (_rt, mut cx) = new_context();
    let a = marten_vm_core::array::new_array(
        &mut cx,
        vec![
            Value::int32(10),
            Value::int32(20),
            Value::int32(30),
            Value::int32(40),
        ],
    );

    assert!(a
        .define_own_property(
            &mut cx,
            &PropertyKey::Index(2),
            PropertyDescriptor::data(Value::int32(99), true, true, false),
        )
        .unwrap());

    let set_len = PropertyDescriptor {
        value: Some(Value::int32(0)),
        ..Default::default()
    };
    assert!(!a
        .define_own_property(&mut cx, &PropertyKey::Atom(atoms::LENGTH), set_len)
        .unwrap());

    assert_eq!(marten_vm_core::array::length_of(&a), 3);
    assert!(a
        .get_own_property(&mut cx, &PropertyKey::Index(0))
        .unwrap()
        .is_none());
    assert!(a
        .get_own_property(&mut cx, &PropertyKey::Index(1))
        .unwrap()
        .is_none());
    let survivor = a
        .get(
            &mut cx,
            &PropertyKey::Index(2),
            &Value::Object(a.clone()),
        )
        .unwrap();
    assert!(survivor.strict_equals(&Value::int32(99)));
    assert!(a
        .get_own_property(&mut cx, &PropertyKey::Index(3))
        .unwrap()
        .is_none());
}

#[test]
fn array_growth_through_index_define_bumps_length() {
    let (_rt, mut cx) = new_context();
    let a = marten_vm_core::array::new_array(&mut cx, vec![]);
    let receiver = Value::Object(a.clone());
    a.set(&mut cx, &PropertyKey::Index(4), Value::int32(5), &receiver)
        .unwrap();
    assert_eq!(marten_vm_core::array::length_of(&a), 5);
}

#[test]
fn own_keys_orders_indices_strings_symbols() {
    let (_rt, mut cx) = new_context();
    let obj = JsObject::ordinary(None);
    let name_b = cx.key("beta");
    let name_a = cx.key("alpha");
    let sym = cx.runtime().symbols().create(None);
    let sym_key = PropertyKey::Symbol(sym);

    obj.insert_property(name_b.clone(), Property::data(Value::Null));
    obj.insert_property(PropertyKey::Index(9), Property::data(Value::Null));
    obj.insert_property(sym_key.clone(), Property::data(Value::Null));
    obj.insert_property(name_a.clone(), Property::data(Value::Null));
    obj.insert_property(PropertyKey::Index(1), Property::data(Value::Null));

    let keys = obj.own_keys(&mut cx).unwrap();
    assert_eq!(
        keys,
        vec![
            PropertyKey::Index(1),
            PropertyKey::Index(9),
            name_b,
            name_a,
            sym_key,
        ]
    );
}

#[test]
fn set_prototype_of_rejects_cycles() {
    let (_rt, mut cx) = new_context();
    let a = JsObject::ordinary(None);
    let b = JsObject::ordinary(Some(a.clone()));
    let c = JsObject::ordinary(Some(b.clone()));

    // a → c would close the loop.
    assert!(!a.set_prototype_of(&mut cx, Some(c)).unwrap());
    // Replacing with an unrelated prototype still works.
    let fresh = JsObject::ordinary(None);
    assert!(a.set_prototype_of(&mut cx, Some(fresh)).unwrap());
}

#[test]
fn accessor_runs_with_receiver_as_this() {
    let (_rt, mut cx) = new_context();
    let proto = JsObject::ordinary(None);
    let getter = marten_vm_core::function::native_function(
        &mut cx,
        "get tag",
        0,
        std::sync::Arc::new(|_cx, this, _args| {
            // Identity of the receiver leaks through `this`.
            Ok(match this {
                Value::Object(o) => Value::number(o.id() as f64),
                _ => Value::Undefined,
            })
        }),
    );
    let key = cx.key("tag");
    proto.insert_property(
        key.clone(),
        Property::Accessor {
            get: Some(Value::Object(getter)),
            set: None,
            enumerable: false,
            configurable: true,
        },
    );

    let child = JsObject::ordinary(Some(proto));
    let receiver = Value::Object(child.clone());
    let got = child.get(&mut cx, &key, &receiver).unwrap();
    assert!(got.strict_equals(&Value::number(child.id() as f64)));
}
