//! Integer-indexed exotic behavior, including the coerce-then-detach race.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use marten_vm_core::array_buffer::ArrayBufferData;
use marten_vm_core::object::{JsObject, ObjectKind};
use marten_vm_core::property::{Property, PropertyDescriptor, PropertyKey};
use marten_vm_core::typed_array::{self, TypedArrayData, TypedArrayKind};
use marten_vm_core::{Context, Runtime, Value};

fn new_context() -> (std::sync::Arc<Runtime>, Context) {
    let runtime = Runtime::new();
    let cx = runtime.create_context();
    (runtime, cx)
}

fn resizable_u8_view(cx: &mut Context, len: usize, max: usize) -> marten_vm_core::GcRef<JsObject> {
    let buffer = JsObject::new(
        ObjectKind::ArrayBuffer(ArrayBufferData::new_resizable(len, max)),
        Some(cx.intrinsics().array_buffer_prototype.clone()),
    );
    typed_array::with_buffer(cx, TypedArrayKind::Uint8, buffer, 0, None).unwrap()
}

fn view_data(view: &JsObject) -> &TypedArrayData {
    match view.kind() {
        ObjectKind::TypedArray(data) => data,
        _ => panic!("not a typed array"),
    }
}

#[test]
fn numeric_coerce_then_detach_is_silently_ignored() {
    // arr[0] = { valueOf() { buf.detach(); return 42 } } must call valueOf,
    // observe the detached buffer, drop the write, and leave no exception.
    let (_rt, mut cx) = new_context();
    let view = resizable_u8_view(&mut cx, 8, 8);
    let buffer = view_data(&view).buffer_object().clone();

    let called = Arc::new(AtomicBool::new(false));
    let called_flag = called.clone();
    let value_of = marten_vm_core::function::native_function(
        &mut cx,
        "valueOf",
        0,
        Arc::new(move |_cx, _this, _args| {
            called_flag.store(true, Ordering::SeqCst);
            if let ObjectKind::ArrayBuffer(ab) = buffer.kind() {
                ab.detach();
            }
            Ok(Value::int32(42))
        }),
    );
    let trap = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
    let value_of_key = cx.key("valueOf");
    trap.insert_property(value_of_key, Property::method(Value::Object(value_of)));

    let receiver = Value::Object(view.clone());
    let result = view.set(
        &mut cx,
        &PropertyKey::Index(0),
        Value::Object(trap),
        &receiver,
    );
    assert!(result.is_ok(), "write must not raise: {result:?}");
    assert!(
        called.load(Ordering::SeqCst),
        "valueOf must run before the bounds check"
    );
    assert!(cx.pending_exception().is_none());

    // The buffer is detached; reads answer undefined.
    let read = view.get(&mut cx, &PropertyKey::Index(0), &receiver).unwrap();
    assert!(read.is_undefined());
}

#[test]
fn element_reads_bypass_the_prototype_chain() {
    let (_rt, mut cx) = new_context();
    let view = Value::Object(typed_array::with_length(&mut cx, TypedArrayKind::Uint8, 2));
    let Value::Object(view_obj) = &view else {
        unreachable!()
    };

    // Poison the prototype with an indexed property.
    let proto = view_obj.proto().unwrap();
    proto.insert_property(PropertyKey::Index(7), Property::data(Value::int32(1234)));

    let oob = view_obj.get(&mut cx, &PropertyKey::Index(7), &view).unwrap();
    assert!(
        oob.is_undefined(),
        "out-of-bounds read must not consult the prototype"
    );
}

#[test]
fn non_canonical_numeric_strings_use_the_ordinary_store() {
    let (_rt, mut cx) = new_context();
    let view = Value::Object(typed_array::with_length(&mut cx, TypedArrayKind::Uint8, 4));
    let Value::Object(view_obj) = &view else {
        unreachable!()
    };

    for name in ["01", "-0", "1.5"] {
        let key = cx.key(name);
        assert!(
            matches!(key, PropertyKey::Atom(_)),
            "{name} must not parse as an index"
        );
        assert!(view_obj
            .define_own_property(
                &mut cx,
                &key,
                PropertyDescriptor::data(Value::int32(7), true, true, true),
            )
            .unwrap());
        let read = view_obj.get(&mut cx, &key, &view).unwrap();
        assert!(read.strict_equals(&Value::int32(7)));
    }
}

#[test]
fn element_descriptors_have_the_fixed_shape() {
    let (_rt, mut cx) = new_context();
    let view = typed_array::with_length(&mut cx, TypedArrayKind::Uint8, 2);

    let prop = view
        .get_own_property(&mut cx, &PropertyKey::Index(0))
        .unwrap()
        .unwrap();
    match prop {
        Property::Data {
            writable,
            enumerable,
            configurable,
            ..
        } => assert!(writable && enumerable && configurable),
        other => panic!("expected data property, got {other:?}"),
    }

    // Accessor or narrowed descriptors are rejected.
    assert!(!view
        .define_own_property(
            &mut cx,
            &PropertyKey::Index(0),
            PropertyDescriptor::accessor(None, None, true, true),
        )
        .unwrap());
    assert!(!view
        .define_own_property(
            &mut cx,
            &PropertyKey::Index(0),
            PropertyDescriptor {
                value: Some(Value::int32(1)),
                writable: Some(false),
                ..Default::default()
            },
        )
        .unwrap());
    // The conforming shape is accepted.
    assert!(view
        .define_own_property(
            &mut cx,
            &PropertyKey::Index(0),
            PropertyDescriptor {
                value: Some(Value::int32(200)),
                ..Default::default()
            },
        )
        .unwrap());
    let read = view
        .get(&mut cx, &PropertyKey::Index(0), &Value::Object(view.clone()))
        .unwrap();
    assert!(read.strict_equals(&Value::int32(200)));
}

#[test]
fn length_tracking_views_follow_resizes() {
    let (_rt, mut cx) = new_context();
    let view = resizable_u8_view(&mut cx, 4, 16);
    let data = view_data(&view);
    assert_eq!(typed_array::view_length(data), 4);

    let buffer = data.buffer_object().clone();
    let ObjectKind::ArrayBuffer(ab) = buffer.kind() else {
        unreachable!()
    };
    ab.resize(12).unwrap();
    assert_eq!(typed_array::view_length(view_data(&view)), 12);

    // Newly exposed bytes read as zero.
    let receiver = Value::Object(view.clone());
    let v = view
        .get(&mut cx, &PropertyKey::Index(10), &receiver)
        .unwrap();
    assert!(v.strict_equals(&Value::int32(0)));

    ab.resize(2).unwrap();
    assert_eq!(typed_array::view_length(view_data(&view)), 2);
    let oob = view.get(&mut cx, &PropertyKey::Index(5), &receiver).unwrap();
    assert!(oob.is_undefined());
}

#[test]
fn bigint_views_roundtrip_values() {
    let (_rt, mut cx) = new_context();
    let view = typed_array::with_length(&mut cx, TypedArrayKind::BigInt64, 2);
    let data = view_data(&view);

    typed_array::set_index(
        &mut cx,
        data,
        0,
        Value::bigint(num_bigint::BigInt::from(-5i64)),
    )
    .unwrap();
    let read = typed_array::get_index(data, 0);
    match read {
        Value::BigInt(b) => assert_eq!(*b, num_bigint::BigInt::from(-5i64)),
        other => panic!("expected BigInt, got {other:?}"),
    }
}
