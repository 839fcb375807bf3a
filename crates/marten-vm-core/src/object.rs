//! JavaScript objects
//!
//! Every object is a [`JsObject`]: prototype link, extensible flag, ordered
//! property store, and an [`ObjectKind`] discriminant carrying class-specific
//! internal slots. Ordinary behavior is the default; each exotic kind
//! overrides only the operations where it diverges (arrays for `length`,
//! typed arrays for integer-indexed access, proxies for everything).
//!
//! Objects are thread-confined to their owning context; interior mutability
//! uses `RefCell`/`Cell`, and borrows are dropped before re-entering JS.

use marten_vm_gc::{EphemeronTable, GcRef, ObjectId, Trace, WeakSlot};
use std::cell::{Cell, RefCell};

use crate::arguments::ArgumentsData;
use crate::array;
use crate::array_buffer::ArrayBufferData;
use crate::atom::atoms;
use crate::bound_function::BoundFunctionData;
use crate::context::Context;
use crate::data_view::DataViewData;
use crate::error::{JsErrorKind, VmError, VmResult};
use crate::function::{ClosureData, NativeFunctionData};
use crate::generator::GeneratorState;
use crate::interpreter;
use crate::map_data::{OrderedMap, OrderedSet};
use crate::promise::PromiseData;
use crate::property::{Property, PropertyDescriptor, PropertyKey, PropertyStore};
use crate::proxy::{self, ProxyData};
use crate::regexp::RegExpData;
use crate::shared_buffer::SharedBufferData;
use crate::typed_array::{self, TypedArrayData};
use crate::value::Value;
use crate::weak::RegistryState;

/// Internal slots of a `DisposableStack`/`AsyncDisposableStack`.
#[derive(Debug, Default)]
pub struct DisposableState {
    /// Registered disposers, run in reverse order
    pub disposers: Vec<Value>,
    /// Whether the stack has been disposed
    pub disposed: bool,
    /// Async variant flag
    pub is_async: bool,
}

/// Maximum proxy-chain depth for `IsArray`/`IsCallable`/`IsConstructor`
/// queries.
pub const PROXY_DEPTH_LIMIT: usize = 1000;

/// Class discriminant with class-specific internal slots.
pub enum ObjectKind {
    /// Plain object
    Ordinary,
    /// Array exotic (`length` invariant, index ordering)
    Array,
    /// Arguments exotic (mapped parameters in sloppy mode)
    Arguments(ArgumentsData),
    /// Error object of a given kind
    Error(JsErrorKind),
    /// Boolean/Number/String/Symbol/BigInt wrapper
    PrimitiveWrapper(Value),
    /// Date, time value in milliseconds since the epoch
    Date(Cell<f64>),
    /// RegExp backed by the external engine
    RegExp(Box<RegExpData>),
    /// Map
    Map(RefCell<OrderedMap>),
    /// Set
    Set(RefCell<OrderedSet>),
    /// WeakMap
    WeakMap(RefCell<EphemeronTable<JsObject, Value>>),
    /// WeakSet
    WeakSet(RefCell<EphemeronTable<JsObject, ()>>),
    /// WeakRef
    WeakRef(WeakSlot<JsObject>),
    /// FinalizationRegistry
    FinalizationRegistry(RefCell<RegistryState>),
    /// Promise
    Promise(RefCell<PromiseData>),
    /// Proxy (target/handler; revoked when cleared)
    Proxy(ProxyData),
    /// Bound function
    BoundFunction(Box<BoundFunctionData>),
    /// Native (Rust) function
    NativeFunction(Box<NativeFunctionData>),
    /// Bytecode closure
    BytecodeFunction(Box<ClosureData>),
    /// Generator object (suspended frame lives here)
    Generator(RefCell<GeneratorState>),
    /// DisposableStack / AsyncDisposableStack
    DisposableStack(RefCell<DisposableState>),
    /// ArrayBuffer
    ArrayBuffer(ArrayBufferData),
    /// SharedArrayBuffer
    SharedArrayBuffer(SharedBufferData),
    /// DataView over a buffer
    DataView(DataViewData),
    /// TypedArray view over a buffer
    TypedArray(TypedArrayData),
}

impl ObjectKind {
    /// Short class name for debugging and `Object.prototype.toString`.
    pub fn class_name(&self) -> &'static str {
        match self {
            ObjectKind::Ordinary => "Object",
            ObjectKind::Array => "Array",
            ObjectKind::Arguments(_) => "Arguments",
            ObjectKind::Error(_) => "Error",
            ObjectKind::PrimitiveWrapper(v) => match v {
                Value::Boolean(_) => "Boolean",
                Value::Number(_) => "Number",
                Value::String(_) => "String",
                Value::Symbol(_) => "Symbol",
                _ => "Object",
            },
            ObjectKind::Date(_) => "Date",
            ObjectKind::RegExp(_) => "RegExp",
            ObjectKind::Map(_) => "Map",
            ObjectKind::Set(_) => "Set",
            ObjectKind::WeakMap(_) => "WeakMap",
            ObjectKind::WeakSet(_) => "WeakSet",
            ObjectKind::WeakRef(_) => "WeakRef",
            ObjectKind::FinalizationRegistry(_) => "FinalizationRegistry",
            ObjectKind::Promise(_) => "Promise",
            ObjectKind::Proxy(_) => "Proxy",
            ObjectKind::BoundFunction(_) | ObjectKind::NativeFunction(_) => "Function",
            ObjectKind::BytecodeFunction(_) => "Function",
            ObjectKind::Generator(_) => "Generator",
            ObjectKind::DisposableStack(state) => {
                if state.borrow().is_async {
                    "AsyncDisposableStack"
                } else {
                    "DisposableStack"
                }
            }
            ObjectKind::ArrayBuffer(_) => "ArrayBuffer",
            ObjectKind::SharedArrayBuffer(_) => "SharedArrayBuffer",
            ObjectKind::DataView(_) => "DataView",
            ObjectKind::TypedArray(_) => "TypedArray",
        }
    }
}

/// A JavaScript object.
pub struct JsObject {
    kind: ObjectKind,
    proto: RefCell<Option<GcRef<JsObject>>>,
    extensible: Cell<bool>,
    properties: RefCell<PropertyStore>,
}

// SAFETY: JsObject is only accessed from the thread that owns its context.
// Thread confinement is enforced at the Runtime/Context level; no object
// reference may cross contexts.
unsafe impl Send for JsObject {}
unsafe impl Sync for JsObject {}

impl JsObject {
    /// Allocate an object of the given kind.
    pub fn new(kind: ObjectKind, proto: Option<GcRef<JsObject>>) -> GcRef<JsObject> {
        GcRef::new(JsObject {
            kind,
            proto: RefCell::new(proto),
            extensible: Cell::new(true),
            properties: RefCell::new(PropertyStore::new()),
        })
    }

    /// Allocate a plain object.
    pub fn ordinary(proto: Option<GcRef<JsObject>>) -> GcRef<JsObject> {
        Self::new(ObjectKind::Ordinary, proto)
    }

    /// The class discriminant.
    pub fn kind(&self) -> &ObjectKind {
        &self.kind
    }

    /// Whether the object can be called.
    pub fn is_callable(&self) -> bool {
        self.is_callable_depth(0)
    }

    fn is_callable_depth(&self, depth: usize) -> bool {
        if depth > PROXY_DEPTH_LIMIT {
            return false;
        }
        match &self.kind {
            ObjectKind::NativeFunction(_)
            | ObjectKind::BytecodeFunction(_)
            | ObjectKind::BoundFunction(_) => true,
            ObjectKind::Proxy(p) => match p.target() {
                Some(Value::Object(target)) => target.is_callable_depth(depth + 1),
                _ => false,
            },
            _ => false,
        }
    }

    /// Whether the object can be constructed.
    pub fn is_constructor(&self) -> bool {
        self.is_constructor_depth(0)
    }

    fn is_constructor_depth(&self, depth: usize) -> bool {
        if depth > PROXY_DEPTH_LIMIT {
            return false;
        }
        match &self.kind {
            ObjectKind::NativeFunction(n) => n.is_constructor,
            ObjectKind::BytecodeFunction(c) => c.is_constructor(),
            ObjectKind::BoundFunction(b) => match &b.target {
                Value::Object(t) => t.is_constructor_depth(depth + 1),
                _ => false,
            },
            ObjectKind::Proxy(p) => match p.target() {
                Some(Value::Object(target)) => target.is_constructor_depth(depth + 1),
                _ => false,
            },
            _ => false,
        }
    }

    /// Ordinary `[[GetPrototypeOf]]` (no proxy trap).
    pub fn proto(&self) -> Option<GcRef<JsObject>> {
        self.proto.borrow().clone()
    }

    /// Raw prototype write, bypassing extensibility and cycle checks. Used
    /// during global initialization only.
    pub fn set_proto_raw(&self, proto: Option<GcRef<JsObject>>) {
        *self.proto.borrow_mut() = proto;
    }

    /// Ordinary `[[IsExtensible]]`.
    pub fn extensible(&self) -> bool {
        self.extensible.get()
    }

    /// Raw extensibility write, bypassing the trap path. Used during global
    /// initialization only.
    pub(crate) fn set_extensible_raw(&self, value: bool) {
        self.extensible.set(value);
    }

    /// Direct property-store access (no exotic dispatch, no traps).
    pub fn store(&self) -> std::cell::Ref<'_, PropertyStore> {
        self.properties.borrow()
    }

    /// Mutable property-store access (no exotic dispatch, no traps).
    pub fn store_mut(&self) -> std::cell::RefMut<'_, PropertyStore> {
        self.properties.borrow_mut()
    }

    /// Insert a property directly, bypassing exotic dispatch. Used by
    /// intrinsics installation and internal bookkeeping.
    pub fn insert_property(&self, key: PropertyKey, property: Property) {
        self.properties.borrow_mut().insert(key, property);
    }

    // ================================================================
    // Meta-object protocol
    // ================================================================

    /// `[[GetOwnProperty]]`.
    pub fn get_own_property(
        &self,
        cx: &mut Context,
        key: &PropertyKey,
    ) -> VmResult<Option<Property>> {
        match &self.kind {
            ObjectKind::Proxy(_) => proxy::proxy_get_own_property(cx, self, key),
            ObjectKind::TypedArray(ta) => {
                if let PropertyKey::Index(i) = key {
                    return Ok(typed_array::element_property(ta, *i as usize));
                }
                Ok(self.properties.borrow().get(key).cloned())
            }
            ObjectKind::Arguments(args) => {
                let mut prop = self.properties.borrow().get(key).cloned();
                if let (Some(Property::Data { value, .. }), PropertyKey::Index(i)) =
                    (&mut prop, key)
                {
                    if let Some(mapped) = args.mapped_value(*i) {
                        *value = mapped;
                    }
                }
                Ok(prop)
            }
            _ => Ok(self.properties.borrow().get(key).cloned()),
        }
    }

    /// `[[Get]]` — walk the prototype chain; accessors run with `receiver`
    /// as `this`.
    pub fn get(&self, cx: &mut Context, key: &PropertyKey, receiver: &Value) -> VmResult<Value> {
        match &self.kind {
            ObjectKind::Proxy(_) => return proxy::proxy_get(cx, self, key, receiver),
            ObjectKind::TypedArray(ta) => {
                // Integer-indexed access never consults the prototype chain.
                if let PropertyKey::Index(i) = key {
                    return Ok(typed_array::get_index(ta, *i as usize));
                }
            }
            _ => {}
        }

        match self.get_own_property(cx, key)? {
            Some(Property::Data { value, .. }) => Ok(value),
            Some(Property::Accessor { get, .. }) => match get {
                Some(getter) => interpreter::call_value(cx, &getter, receiver, &[]),
                None => Ok(Value::Undefined),
            },
            None => match self.proto() {
                Some(parent) => parent.get(cx, key, receiver),
                None => Ok(Value::Undefined),
            },
        }
    }

    /// `[[Set]]` — OrdinarySetWithOwnDescriptor.
    pub fn set(
        &self,
        cx: &mut Context,
        key: &PropertyKey,
        value: Value,
        receiver: &Value,
    ) -> VmResult<bool> {
        match &self.kind {
            ObjectKind::Proxy(_) => return proxy::proxy_set(cx, self, key, value, receiver),
            ObjectKind::TypedArray(ta) => {
                if let PropertyKey::Index(i) = key {
                    // Conversion happens before the detached/OOB check; the
                    // write is silently ignored when it lands out of bounds.
                    typed_array::set_index(cx, ta, *i as usize, value)?;
                    return Ok(true);
                }
            }
            ObjectKind::Arguments(args) => {
                if let PropertyKey::Index(i) = key {
                    if args.set_mapped(*i, &value) {
                        // Keep the backing property in sync for enumeration.
                        if let Some(Property::Data { value: stored, .. }) =
                            self.properties.borrow_mut().get_mut(key)
                        {
                            *stored = value;
                        }
                        return Ok(true);
                    }
                }
            }
            _ => {}
        }

        let own = self.get_own_property(cx, key)?;
        match own {
            None => match self.proto() {
                Some(parent) => parent.set(cx, key, value, receiver),
                None => set_on_receiver(cx, key, value, receiver, None),
            },
            Some(Property::Data { writable, .. }) => {
                if !writable {
                    return Ok(false);
                }
                let existing = self.get_own_property(cx, key)?;
                set_on_receiver(cx, key, value, receiver, existing)
            }
            Some(Property::Accessor { set, .. }) => match set {
                Some(setter) => {
                    interpreter::call_value(cx, &setter, receiver, &[value])?;
                    Ok(true)
                }
                None => Ok(false),
            },
        }
    }

    /// `[[Has]]` — prototype chain walk.
    pub fn has(&self, cx: &mut Context, key: &PropertyKey) -> VmResult<bool> {
        match &self.kind {
            ObjectKind::Proxy(_) => return proxy::proxy_has(cx, self, key),
            ObjectKind::TypedArray(ta) => {
                if let PropertyKey::Index(i) = key {
                    return Ok(typed_array::in_bounds(ta, *i as usize));
                }
            }
            _ => {}
        }
        if self.get_own_property(cx, key)?.is_some() {
            return Ok(true);
        }
        match self.proto() {
            Some(parent) => parent.has(cx, key),
            None => Ok(false),
        }
    }

    /// `[[Delete]]` — own only; fails for non-configurable.
    pub fn delete(&self, cx: &mut Context, key: &PropertyKey) -> VmResult<bool> {
        match &self.kind {
            ObjectKind::Proxy(_) => return proxy::proxy_delete(cx, self, key),
            ObjectKind::TypedArray(ta) => {
                if let PropertyKey::Index(i) = key {
                    // In-bounds elements are never configurable; deleting an
                    // absent element succeeds vacuously.
                    return Ok(!typed_array::in_bounds(ta, *i as usize));
                }
            }
            ObjectKind::Arguments(args) => {
                if let PropertyKey::Index(i) = key {
                    args.sever(*i);
                }
            }
            _ => {}
        }
        let mut store = self.properties.borrow_mut();
        match store.get(key) {
            None => Ok(true),
            Some(p) if p.is_configurable() => {
                store.remove(key);
                Ok(true)
            }
            Some(_) => Ok(false),
        }
    }

    /// `[[DefineOwnProperty]]` — full partial-descriptor merge with
    /// non-configurable / non-writable transition validation.
    pub fn define_own_property(
        &self,
        cx: &mut Context,
        key: &PropertyKey,
        desc: PropertyDescriptor,
    ) -> VmResult<bool> {
        match &self.kind {
            ObjectKind::Proxy(_) => return proxy::proxy_define_own_property(cx, self, key, desc),
            ObjectKind::TypedArray(ta) => {
                if let PropertyKey::Index(i) = key {
                    return typed_array::define_index(cx, ta, *i as usize, desc);
                }
            }
            ObjectKind::Array => {
                if *key == PropertyKey::Atom(atoms::LENGTH) {
                    return array::define_length(cx, self, desc);
                }
                if let PropertyKey::Index(i) = key {
                    return array::define_index(self, *i, desc);
                }
            }
            ObjectKind::Arguments(args) => {
                if let PropertyKey::Index(i) = key {
                    args.on_define(*i, &desc);
                }
            }
            _ => {}
        }
        Ok(self.validate_and_apply(key, desc))
    }

    /// ValidateAndApplyPropertyDescriptor over the ordinary store.
    pub(crate) fn validate_and_apply(&self, key: &PropertyKey, desc: PropertyDescriptor) -> bool {
        let mut store = self.properties.borrow_mut();
        let current = store.get(key).cloned();

        let Some(current) = current else {
            if !self.extensible.get() {
                return false;
            }
            store.insert(key.clone(), desc.complete());
            return true;
        };

        // Every field absent: nothing to validate or change.
        if desc.value.is_none()
            && desc.writable.is_none()
            && desc.get.is_none()
            && desc.set.is_none()
            && desc.enumerable.is_none()
            && desc.configurable.is_none()
        {
            return true;
        }

        if !current.is_configurable() {
            if desc.configurable == Some(true) {
                return false;
            }
            if let Some(e) = desc.enumerable {
                if e != current.is_enumerable() {
                    return false;
                }
            }
            match (&current, desc.is_data(), desc.is_accessor()) {
                // Kind flips need configurability.
                (Property::Data { .. }, _, true) => return false,
                (Property::Accessor { .. }, true, _) => return false,
                (
                    Property::Data {
                        writable, value, ..
                    },
                    _,
                    _,
                ) => {
                    if !writable {
                        if desc.writable == Some(true) {
                            return false;
                        }
                        if let Some(v) = &desc.value {
                            if !v.same_value(value) {
                                return false;
                            }
                        }
                    }
                }
                (Property::Accessor { get, set, .. }, _, _) => {
                    let unchanged = |new: &Option<Value>, old: &Option<Value>| match new {
                        None => true,
                        Some(v) => {
                            let old = old.clone().unwrap_or(Value::Undefined);
                            v.same_value(&old)
                        }
                    };
                    if !unchanged(&desc.get, get) || !unchanged(&desc.set, set) {
                        return false;
                    }
                }
            }
        }

        let merged = merge_descriptor(&current, &desc);
        store.insert(key.clone(), merged);
        true
    }

    /// `[[OwnPropertyKeys]]`: integer indices ascending, then strings, then
    /// symbols, each in insertion order.
    pub fn own_keys(&self, cx: &mut Context) -> VmResult<Vec<PropertyKey>> {
        match &self.kind {
            ObjectKind::Proxy(_) => proxy::proxy_own_keys(cx, self),
            ObjectKind::TypedArray(ta) => {
                let mut keys: Vec<PropertyKey> = (0..typed_array::view_length(ta) as u32)
                    .map(PropertyKey::Index)
                    .collect();
                keys.extend(
                    self.properties
                        .borrow()
                        .own_keys()
                        .into_iter()
                        .filter(|k| !matches!(k, PropertyKey::Index(_))),
                );
                Ok(keys)
            }
            _ => Ok(self.properties.borrow().own_keys()),
        }
    }

    /// `[[GetPrototypeOf]]` (trap-aware).
    pub fn get_prototype_of(&self, cx: &mut Context) -> VmResult<Value> {
        match &self.kind {
            ObjectKind::Proxy(_) => proxy::proxy_get_prototype_of(cx, self),
            _ => Ok(match self.proto() {
                Some(p) => Value::Object(p),
                None => Value::Null,
            }),
        }
    }

    /// `[[SetPrototypeOf]]` — rejects cycles, respects non-extensibility.
    pub fn set_prototype_of(&self, cx: &mut Context, proto: Option<GcRef<JsObject>>) -> VmResult<bool> {
        if let ObjectKind::Proxy(_) = &self.kind {
            return proxy::proxy_set_prototype_of(cx, self, proto);
        }

        let current = self.proto();
        let same = match (&current, &proto) {
            (None, None) => true,
            (Some(a), Some(b)) => GcRef::ptr_eq(a, b),
            _ => false,
        };
        if same {
            return Ok(true);
        }
        if !self.extensible.get() {
            return Ok(false);
        }
        // Cycle check: walk the candidate chain; proxies terminate the walk.
        let mut cursor = proto.clone();
        while let Some(p) = cursor {
            if std::ptr::eq(&*p, self) {
                return Ok(false);
            }
            if matches!(p.kind(), ObjectKind::Proxy(_)) {
                break;
            }
            cursor = p.proto();
        }
        *self.proto.borrow_mut() = proto;
        Ok(true)
    }

    /// `[[PreventExtensions]]` — one-way flag.
    pub fn prevent_extensions(&self, cx: &mut Context) -> VmResult<bool> {
        match &self.kind {
            ObjectKind::Proxy(_) => proxy::proxy_prevent_extensions(cx, self),
            _ => {
                self.extensible.set(false);
                Ok(true)
            }
        }
    }

    /// `[[IsExtensible]]` (trap-aware).
    pub fn is_extensible(&self, cx: &mut Context) -> VmResult<bool> {
        match &self.kind {
            ObjectKind::Proxy(_) => proxy::proxy_is_extensible(cx, self),
            _ => Ok(self.extensible.get()),
        }
    }

    /// CreateDataPropertyOrThrow convenience.
    pub fn create_data_property(
        &self,
        cx: &mut Context,
        key: PropertyKey,
        value: Value,
    ) -> VmResult<()> {
        if !self.define_own_property(
            cx,
            &key,
            PropertyDescriptor::data(value, true, true, true),
        )? {
            return Err(VmError::type_error("Cannot define property"));
        }
        Ok(())
    }
}

/// `IsArray` with the proxy depth guard: revoked proxies and chains past
/// [`PROXY_DEPTH_LIMIT`] throw `TypeError`.
pub fn is_array(value: &Value) -> VmResult<bool> {
    is_array_depth(value, 0)
}

fn is_array_depth(value: &Value, depth: usize) -> VmResult<bool> {
    let Value::Object(obj) = value else {
        return Ok(false);
    };
    match obj.kind() {
        ObjectKind::Array => Ok(true),
        ObjectKind::Proxy(p) => {
            if depth >= PROXY_DEPTH_LIMIT {
                return Err(VmError::type_error("too much recursion"));
            }
            match p.target() {
                Some(target) => is_array_depth(&target, depth + 1),
                None => Err(VmError::type_error(
                    "Cannot perform 'IsArray' on a proxy that has been revoked",
                )),
            }
        }
        _ => Ok(false),
    }
}

/// The tail of OrdinarySet: define the value on the receiver.
fn set_on_receiver(
    cx: &mut Context,
    key: &PropertyKey,
    value: Value,
    receiver: &Value,
    _found: Option<Property>,
) -> VmResult<bool> {
    let Value::Object(receiver_obj) = receiver else {
        return Ok(false);
    };
    let existing = receiver_obj.get_own_property(cx, key)?;
    match existing {
        Some(Property::Accessor { .. }) => Ok(false),
        Some(Property::Data { writable, .. }) => {
            if !writable {
                return Ok(false);
            }
            receiver_obj.define_own_property(
                cx,
                key,
                PropertyDescriptor {
                    value: Some(value),
                    ..Default::default()
                },
            )
        }
        None => receiver_obj.define_own_property(
            cx,
            key,
            PropertyDescriptor::data(value, true, true, true),
        ),
    }
}

fn merge_descriptor(current: &Property, desc: &PropertyDescriptor) -> Property {
    // Kind flip replaces the whole shape, keeping shared attributes.
    if desc.is_accessor() {
        let (old_get, old_set) = match current {
            Property::Accessor { get, set, .. } => (get.clone(), set.clone()),
            Property::Data { .. } => (None, None),
        };
        Property::Accessor {
            get: match &desc.get {
                Some(v) if !v.is_undefined() => Some(v.clone()),
                Some(_) => None,
                None => old_get,
            },
            set: match &desc.set {
                Some(v) if !v.is_undefined() => Some(v.clone()),
                Some(_) => None,
                None => old_set,
            },
            enumerable: desc.enumerable.unwrap_or(current.is_enumerable()),
            configurable: desc.configurable.unwrap_or(current.is_configurable()),
        }
    } else if desc.is_data() {
        let (old_value, old_writable) = match current {
            Property::Data {
                value, writable, ..
            } => (value.clone(), *writable),
            Property::Accessor { .. } => (Value::Undefined, false),
        };
        Property::Data {
            value: desc.value.clone().unwrap_or(old_value),
            writable: desc.writable.unwrap_or(match current {
                Property::Data { .. } => old_writable,
                Property::Accessor { .. } => false,
            }),
            enumerable: desc.enumerable.unwrap_or(current.is_enumerable()),
            configurable: desc.configurable.unwrap_or(current.is_configurable()),
        }
    } else {
        // Generic descriptor: only attributes change.
        let mut merged = current.clone();
        match &mut merged {
            Property::Data {
                enumerable,
                configurable,
                ..
            }
            | Property::Accessor {
                enumerable,
                configurable,
                ..
            } => {
                if let Some(e) = desc.enumerable {
                    *enumerable = e;
                }
                if let Some(c) = desc.configurable {
                    *configurable = c;
                }
            }
        }
        merged
    }
}

impl Trace for JsObject {
    fn trace(&self, tracer: &mut dyn FnMut(ObjectId)) {
        if let Some(proto) = self.proto.borrow().as_ref() {
            tracer(proto.id());
        }
        for (_key, prop) in self.properties.borrow().iter() {
            match prop {
                Property::Data { value, .. } => trace_value(value, tracer),
                Property::Accessor { get, set, .. } => {
                    if let Some(g) = get {
                        trace_value(g, tracer);
                    }
                    if let Some(s) = set {
                        trace_value(s, tracer);
                    }
                }
            }
        }
        match &self.kind {
            ObjectKind::Map(m) => m.borrow().for_each(|k, v| {
                trace_value(k, tracer);
                trace_value(v, tracer);
            }),
            ObjectKind::Set(s) => s.borrow().for_each(|v| trace_value(v, tracer)),
            ObjectKind::WeakMap(t) => t.borrow().for_each_live(|v| trace_value(v, tracer)),
            ObjectKind::FinalizationRegistry(r) => {
                r.borrow().data.for_each_held(|v| trace_value(v, tracer));
                trace_value(&r.borrow().callback, tracer);
            }
            ObjectKind::Promise(p) => p.borrow().trace_contents(&mut |v| trace_value(v, tracer)),
            ObjectKind::Proxy(p) => {
                if let Some(t) = p.target() {
                    trace_value(&t, tracer);
                }
                if let Some(h) = p.handler() {
                    trace_value(&h, tracer);
                }
            }
            ObjectKind::BoundFunction(b) => {
                trace_value(&b.target, tracer);
                trace_value(&b.this, tracer);
                for arg in &b.args {
                    trace_value(arg, tracer);
                }
            }
            ObjectKind::TypedArray(ta) => tracer(ta.buffer_object().id()),
            ObjectKind::DataView(dv) => tracer(dv.buffer_object().id()),
            ObjectKind::DisposableStack(state) => {
                for disposer in &state.borrow().disposers {
                    trace_value(disposer, tracer);
                }
            }
            _ => {}
        }
    }
}

fn trace_value(value: &Value, tracer: &mut dyn FnMut(ObjectId)) {
    if let Value::Object(obj) = value {
        tracer(obj.id());
    }
}

impl std::fmt::Debug for JsObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsObject")
            .field("class", &self.kind.class_name())
            .field("properties", &self.properties.borrow().len())
            .field("extensible", &self.extensible.get())
            .finish()
    }
}
