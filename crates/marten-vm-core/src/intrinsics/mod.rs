//! Built-in initialization
//!
//! Two stages, the way engines break the bootstrap cycles: [`Intrinsics::bootstrap`]
//! allocates every prototype object bare (so `Function.prototype` exists
//! before the first native function does), then [`install_globals`] populates
//! the global object in the fixed dependency order — value properties,
//! global functions, console, core constructors, collections, namespaces,
//! binary data, errors, and a final fix-up pass over function prototypes.

use marten_vm_gc::GcRef;
use std::sync::Arc;

use crate::atom::atoms;
use crate::context::Context;
use crate::error::JsErrorKind;
use crate::function::{NativeFn, NativeFunctionData};
use crate::object::{JsObject, ObjectKind};
use crate::property::{Property, PropertyKey};
use crate::typed_array::TypedArrayKind;
use crate::value::Value;

pub mod array;
pub mod atomics;
pub mod buffers;
pub mod collections;
pub mod console;
pub mod disposable;
pub mod error;
pub mod function_proto;
pub mod global_fns;
pub mod iterator;
pub mod json;
pub mod math;
pub mod object;
pub mod promise;
pub mod proxy_ctor;
pub mod reflect;
pub mod regexp;
pub mod time;
pub mod typed_array;
pub mod weak;
pub mod wrappers;

pub use console::{BufferSink, ConsoleLevel, ConsoleSink, TracingSink};

/// Registry of the intrinsic objects a context needs direct access to.
#[derive(Clone)]
pub struct Intrinsics {
    /// `Object.prototype` (its own prototype is null)
    pub object_prototype: GcRef<JsObject>,
    /// `Function.prototype`
    pub function_prototype: GcRef<JsObject>,
    /// `Array.prototype`
    pub array_prototype: GcRef<JsObject>,
    /// `String.prototype`
    pub string_prototype: GcRef<JsObject>,
    /// `Number.prototype`
    pub number_prototype: GcRef<JsObject>,
    /// `Boolean.prototype`
    pub boolean_prototype: GcRef<JsObject>,
    /// `Symbol.prototype`
    pub symbol_prototype: GcRef<JsObject>,
    /// `BigInt.prototype`
    pub bigint_prototype: GcRef<JsObject>,
    /// Per-kind error prototypes, `Error.prototype` first
    pub error_prototypes: Vec<(JsErrorKind, GcRef<JsObject>)>,
    /// `%IteratorPrototype%`
    pub iterator_prototype: GcRef<JsObject>,
    /// `%ArrayIteratorPrototype%`
    pub array_iterator_prototype: GcRef<JsObject>,
    /// `%MapIteratorPrototype%`
    pub map_iterator_prototype: GcRef<JsObject>,
    /// `%SetIteratorPrototype%`
    pub set_iterator_prototype: GcRef<JsObject>,
    /// `%GeneratorPrototype%`
    pub generator_prototype: GcRef<JsObject>,
    /// `Promise.prototype`
    pub promise_prototype: GcRef<JsObject>,
    /// `Map.prototype`
    pub map_prototype: GcRef<JsObject>,
    /// `Set.prototype`
    pub set_prototype: GcRef<JsObject>,
    /// `WeakMap.prototype`
    pub weak_map_prototype: GcRef<JsObject>,
    /// `WeakSet.prototype`
    pub weak_set_prototype: GcRef<JsObject>,
    /// `WeakRef.prototype`
    pub weak_ref_prototype: GcRef<JsObject>,
    /// `FinalizationRegistry.prototype`
    pub finalization_registry_prototype: GcRef<JsObject>,
    /// `ArrayBuffer.prototype`
    pub array_buffer_prototype: GcRef<JsObject>,
    /// `SharedArrayBuffer.prototype`
    pub shared_array_buffer_prototype: GcRef<JsObject>,
    /// `DataView.prototype`
    pub data_view_prototype: GcRef<JsObject>,
    /// `%TypedArray%.prototype`
    pub typed_array_prototype: GcRef<JsObject>,
    /// Per-kind typed array prototypes, indexed by
    /// [`crate::typed_array::kind_slot`]
    pub typed_array_prototypes: Vec<GcRef<JsObject>>,
    /// `RegExp.prototype`
    pub regexp_prototype: GcRef<JsObject>,
    /// `Date.prototype`
    pub date_prototype: GcRef<JsObject>,
    /// `%ThrowTypeError%` — the poison accessor for strict `callee`/`caller`
    pub throw_type_error: GcRef<JsObject>,
    /// `Array.prototype.values`, shared with arguments objects
    pub array_values_fn: GcRef<JsObject>,
}

impl Intrinsics {
    /// Stage 1: allocate the prototype graph with correct `[[Prototype]]`
    /// links but no properties.
    pub fn bootstrap() -> Self {
        let object_prototype = JsObject::ordinary(None);
        let function_prototype = JsObject::ordinary(Some(object_prototype.clone()));

        let plain = |proto: &GcRef<JsObject>| JsObject::ordinary(Some(proto.clone()));

        let iterator_prototype = plain(&object_prototype);
        let error_base = plain(&object_prototype);
        let mut error_prototypes = vec![(JsErrorKind::Error, error_base.clone())];
        for kind in JsErrorKind::all() {
            if kind != JsErrorKind::Error {
                error_prototypes.push((kind, plain(&error_base)));
            }
        }

        let typed_array_prototype = plain(&object_prototype);
        let typed_array_prototypes = TypedArrayKind::all()
            .iter()
            .map(|_| plain(&typed_array_prototype))
            .collect();

        // %ThrowTypeError% and the shared `values` function exist before the
        // context does, so they are wired by hand.
        let throw_type_error = bare_native(&function_prototype, |_cx, _this, _args| {
            Err(crate::error::VmError::type_error(
                "'caller' and 'callee' may not be accessed in strict mode",
            ))
        });
        throw_type_error.set_extensible_raw(false);
        let array_values_fn = bare_native(&function_prototype, array::array_values_native);

        Self {
            array_prototype: plain(&object_prototype),
            string_prototype: plain(&object_prototype),
            number_prototype: plain(&object_prototype),
            boolean_prototype: plain(&object_prototype),
            symbol_prototype: plain(&object_prototype),
            bigint_prototype: plain(&object_prototype),
            error_prototypes,
            array_iterator_prototype: plain(&iterator_prototype),
            map_iterator_prototype: plain(&iterator_prototype),
            set_iterator_prototype: plain(&iterator_prototype),
            generator_prototype: plain(&iterator_prototype),
            promise_prototype: plain(&object_prototype),
            map_prototype: plain(&object_prototype),
            set_prototype: plain(&object_prototype),
            weak_map_prototype: plain(&object_prototype),
            weak_set_prototype: plain(&object_prototype),
            weak_ref_prototype: plain(&object_prototype),
            finalization_registry_prototype: plain(&object_prototype),
            array_buffer_prototype: plain(&object_prototype),
            shared_array_buffer_prototype: plain(&object_prototype),
            data_view_prototype: plain(&object_prototype),
            typed_array_prototype,
            typed_array_prototypes,
            regexp_prototype: plain(&object_prototype),
            date_prototype: plain(&object_prototype),
            iterator_prototype,
            throw_type_error,
            array_values_fn,
            object_prototype,
            function_prototype,
        }
    }

    /// The prototype for an error kind.
    pub fn error_prototype(&self, kind: JsErrorKind) -> &GcRef<JsObject> {
        self.error_prototypes
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, p)| p)
            .expect("every error kind has a bootstrapped prototype")
    }
}

fn bare_native(
    function_prototype: &GcRef<JsObject>,
    f: fn(&mut Context, &Value, &[Value]) -> crate::error::VmResult<Value>,
) -> GcRef<JsObject> {
    JsObject::new(
        ObjectKind::NativeFunction(Box::new(NativeFunctionData {
            func: Arc::new(f),
            is_constructor: false,
            requires_new: false,
        })),
        Some(function_prototype.clone()),
    )
}

/// Stage 2: populate the global object in the fixed dependency order.
pub fn install_globals(cx: &mut Context) {
    // 1. Value properties.
    let global = cx.global().clone();
    let frozen = |v: Value| Property::data_with(v, false, false, false);
    global.insert_property(PropertyKey::Atom(atoms::NAN), frozen(Value::number(f64::NAN)));
    global.insert_property(
        PropertyKey::Atom(atoms::INFINITY),
        frozen(Value::number(f64::INFINITY)),
    );
    global.insert_property(PropertyKey::Atom(atoms::UNDEFINED), frozen(Value::Undefined));
    global.insert_property(
        PropertyKey::Atom(atoms::GLOBAL_THIS),
        Property::method(Value::Object(global.clone())),
    );

    // 2. Global functions.
    global_fns::install(cx);

    // 3. console.
    console::install(cx);

    // 4. Core constructors.
    object::install(cx);
    wrappers::install_boolean(cx);
    array::install(cx);
    wrappers::install_string(cx);
    wrappers::install_number(cx);
    function_proto::install(cx);
    time::install(cx);
    regexp::install(cx);
    wrappers::install_symbol(cx);
    wrappers::install_bigint(cx);

    // 5. Collections.
    collections::install(cx);
    weak::install(cx);

    // 6. Namespaces, Promise, iteration.
    math::install(cx);
    json::install(cx);
    global_fns::install_intl_stub(cx);
    reflect::install(cx);
    proxy_ctor::install(cx);
    promise::install(cx);
    disposable::install(cx);
    iterator::install(cx);

    // 7. Binary data.
    buffers::install(cx);
    typed_array::install(cx);
    atomics::install(cx);

    // 8. Error hierarchy.
    error::install(cx);

    // 9. Fix-up pass: every native function's prototype chain must reach
    // Function.prototype.
    fixup_function_prototypes(cx);
}

fn fixup_function_prototypes(cx: &mut Context) {
    let function_prototype = cx.intrinsics().function_prototype.clone();
    let global = cx.global().clone();
    let mut worklist: Vec<GcRef<JsObject>> = vec![global];
    let mut seen: rustc_hash::FxHashSet<usize> = rustc_hash::FxHashSet::default();

    while let Some(obj) = worklist.pop() {
        if !seen.insert(obj.id()) {
            continue;
        }
        if obj.is_callable() && obj.proto().is_none() {
            obj.set_proto_raw(Some(function_prototype.clone()));
        }
        let children: Vec<GcRef<JsObject>> = obj
            .store()
            .iter()
            .filter_map(|(_, prop)| match prop {
                Property::Data {
                    value: Value::Object(child),
                    ..
                } => Some(child.clone()),
                _ => None,
            })
            .collect();
        worklist.extend(children);
    }
}

// ====================================================================
// Installation helpers
// ====================================================================

/// Raw native function signature used by the install helpers.
pub type RawNative = fn(&mut Context, &Value, &[Value]) -> crate::error::VmResult<Value>;

/// Define a builtin method (`writable`, non-enumerable, `configurable`).
pub fn method(cx: &mut Context, target: &GcRef<JsObject>, name: &str, length: u32, f: RawNative) {
    let func = crate::function::native_function(cx, name, length, Arc::new(f) as NativeFn);
    let key = PropertyKey::Atom(cx.atom(name));
    target.insert_property(key, Property::method(Value::Object(func)));
}

/// Define a symbol-keyed builtin method.
pub fn symbol_method(
    cx: &mut Context,
    target: &GcRef<JsObject>,
    symbol: Arc<crate::symbol::JsSymbol>,
    name: &str,
    length: u32,
    f: RawNative,
) {
    let func = crate::function::native_function(cx, name, length, Arc::new(f) as NativeFn);
    target.insert_property(
        PropertyKey::Symbol(symbol),
        Property::method(Value::Object(func)),
    );
}

/// Define a get-only accessor backed by a native function.
pub fn getter(cx: &mut Context, target: &GcRef<JsObject>, name: &str, f: RawNative) {
    let func = crate::function::native_function(
        cx,
        &format!("get {name}"),
        0,
        Arc::new(f) as NativeFn,
    );
    let key = PropertyKey::Atom(cx.atom(name));
    target.insert_property(
        key,
        Property::Accessor {
            get: Some(Value::Object(func)),
            set: None,
            enumerable: false,
            configurable: true,
        },
    );
}

/// Define a non-enumerable data property.
pub fn data_prop(cx: &mut Context, target: &GcRef<JsObject>, name: &str, value: Value) {
    let key = PropertyKey::Atom(cx.atom(name));
    target.insert_property(key, Property::method(value));
}

/// Define a frozen data property.
pub fn frozen_prop(cx: &mut Context, target: &GcRef<JsObject>, name: &str, value: Value) {
    let key = PropertyKey::Atom(cx.atom(name));
    target.insert_property(key, Property::data_with(value, false, false, false));
}

/// Create a constructor, wire `prototype`/`constructor`, install it on the
/// global. Returns the constructor object.
pub fn install_constructor(
    cx: &mut Context,
    name: &str,
    length: u32,
    prototype: &GcRef<JsObject>,
    requires_new: bool,
    f: RawNative,
) -> GcRef<JsObject> {
    let ctor = crate::function::native_constructor(cx, name, length, Arc::new(f) as NativeFn, requires_new);
    ctor.insert_property(
        PropertyKey::Atom(atoms::PROTOTYPE),
        Property::data_with(Value::Object(prototype.clone()), false, false, false),
    );
    prototype.insert_property(
        PropertyKey::Atom(atoms::CONSTRUCTOR),
        Property::method(Value::Object(ctor.clone())),
    );
    let global = cx.global().clone();
    let key = PropertyKey::Atom(cx.atom(name));
    global.insert_property(key, Property::method(Value::Object(ctor.clone())));
    ctor
}

/// Install a namespace object (`Math`, `JSON`, ...) on the global with a
/// `@@toStringTag`.
pub fn install_namespace(cx: &mut Context, name: &str) -> GcRef<JsObject> {
    let ns = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
    let tag = cx.well_known().to_string_tag.clone();
    ns.insert_property(
        PropertyKey::Symbol(tag),
        Property::data_with(Value::string(name), false, false, true),
    );
    let global = cx.global().clone();
    let key = PropertyKey::Atom(cx.atom(name));
    global.insert_property(key, Property::method(Value::Object(ns.clone())));
    ns
}
