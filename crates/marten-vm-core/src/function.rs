//! Function objects — native callbacks and bytecode closures
//!
//! Native functions follow the uniform calling convention
//! `(context, this, args) -> VmResult<Value>`; `is_constructor` and
//! `requires_new` live on the function object. Bytecode closures pair an
//! immutable compiled function with capture cells bound at `MakeClosure`
//! time.

use marten_vm_bytecode::Module;
use marten_vm_gc::GcRef;
use std::sync::Arc;

use crate::atom::atoms;
use crate::context::Context;
use crate::error::VmResult;
use crate::object::{JsObject, ObjectKind};
use crate::property::{Property, PropertyKey};
use crate::value::{CaptureCell, Value};

/// The native function calling convention.
pub type NativeFn =
    Arc<dyn Fn(&mut Context, &Value, &[Value]) -> VmResult<Value> + Send + Sync>;

/// Internal slots of a native function object.
pub struct NativeFunctionData {
    /// The handler
    pub func: NativeFn,
    /// May be invoked with `new`
    pub is_constructor: bool,
    /// Must be invoked with `new` (class-like constructors)
    pub requires_new: bool,
}

impl std::fmt::Debug for NativeFunctionData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeFunctionData")
            .field("is_constructor", &self.is_constructor)
            .finish()
    }
}

/// Internal slots of a bytecode closure.
pub struct ClosureData {
    /// The module owning the compiled function
    pub module: Arc<Module>,
    /// Index into the module's function table
    pub function_index: u32,
    /// Captured cells, in the order of the function's capture descriptors
    pub captures: Vec<CaptureCell>,
    /// Lexical `this` for arrow functions
    pub lexical_this: Option<Value>,
}

impl ClosureData {
    /// The compiled function.
    pub fn function(&self) -> &marten_vm_bytecode::Function {
        self.module
            .function(self.function_index)
            .expect("closure function index is validated at creation")
    }

    /// Whether this closure may be constructed.
    pub fn is_constructor(&self) -> bool {
        let f = self.function();
        f.flags.is_constructor && !f.flags.is_arrow && !f.flags.is_async && !f.flags.is_generator
    }
}

impl std::fmt::Debug for ClosureData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClosureData")
            .field("function_index", &self.function_index)
            .field("captures", &self.captures.len())
            .finish()
    }
}

/// Build a native function object with `name` and `length` installed.
pub fn native_function(
    cx: &mut Context,
    name: &str,
    length: u32,
    func: NativeFn,
) -> GcRef<JsObject> {
    native_function_with(cx, name, length, func, false, false)
}

/// Build a native constructor object.
pub fn native_constructor(
    cx: &mut Context,
    name: &str,
    length: u32,
    func: NativeFn,
    requires_new: bool,
) -> GcRef<JsObject> {
    native_function_with(cx, name, length, func, true, requires_new)
}

fn native_function_with(
    cx: &mut Context,
    name: &str,
    length: u32,
    func: NativeFn,
    is_constructor: bool,
    requires_new: bool,
) -> GcRef<JsObject> {
    let proto = cx.intrinsics().function_prototype.clone();
    let data = NativeFunctionData {
        func,
        is_constructor,
        requires_new,
    };
    let obj = JsObject::new(ObjectKind::NativeFunction(Box::new(data)), Some(proto));
    obj.insert_property(
        PropertyKey::Atom(atoms::NAME),
        Property::data_with(Value::string(name), false, false, true),
    );
    obj.insert_property(
        PropertyKey::Atom(atoms::LENGTH),
        Property::data_with(Value::number(length as f64), false, false, true),
    );
    obj
}

/// Build a closure object for a module function, with a fresh `prototype`
/// object when the function is constructable.
pub fn make_closure(
    cx: &mut Context,
    module: Arc<Module>,
    function_index: u32,
    captures: Vec<CaptureCell>,
    lexical_this: Option<Value>,
) -> GcRef<JsObject> {
    let function_proto = cx.intrinsics().function_prototype.clone();
    let data = ClosureData {
        module: module.clone(),
        function_index,
        captures,
        lexical_this,
    };
    let is_ctor = data.is_constructor();
    let func = module
        .function(function_index)
        .expect("MakeClosure index is validated by the compiler");
    let name = func.display_name().to_string();
    let param_count = func.param_count;

    let obj = JsObject::new(ObjectKind::BytecodeFunction(Box::new(data)), Some(function_proto));
    obj.insert_property(
        PropertyKey::Atom(atoms::NAME),
        Property::data_with(Value::string(name), false, false, true),
    );
    obj.insert_property(
        PropertyKey::Atom(atoms::LENGTH),
        Property::data_with(Value::number(param_count as f64), false, false, true),
    );

    if is_ctor {
        let prototype = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
        prototype.insert_property(
            PropertyKey::Atom(atoms::CONSTRUCTOR),
            Property::method(Value::Object(obj.clone())),
        );
        obj.insert_property(
            PropertyKey::Atom(atoms::PROTOTYPE),
            Property::data_with(Value::Object(prototype), true, false, false),
        );
    }
    obj
}
