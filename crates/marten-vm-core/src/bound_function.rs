//! Bound function exotic object

use marten_vm_gc::GcRef;

use crate::atom::atoms;
use crate::context::Context;
use crate::error::{VmError, VmResult};
use crate::object::{JsObject, ObjectKind};
use crate::property::{Property, PropertyKey};
use crate::value::Value;

/// Internal slots of a bound function: target, bound `this`, argument prefix.
#[derive(Debug)]
pub struct BoundFunctionData {
    /// [[BoundTargetFunction]]
    pub target: Value,
    /// [[BoundThis]]
    pub this: Value,
    /// [[BoundArguments]]
    pub args: Vec<Value>,
}

/// `Function.prototype.bind` — build the bound function, deriving `length`
/// and `name` from the target.
pub fn make_bound(
    cx: &mut Context,
    target: &Value,
    this: Value,
    args: Vec<Value>,
) -> VmResult<GcRef<JsObject>> {
    if !target.is_callable() {
        return Err(VmError::type_error("Bind must be called on a function"));
    }
    let target_obj = target.as_object().expect("callable implies object");

    let target_length = target_obj
        .get(cx, &PropertyKey::Atom(atoms::LENGTH), target)?
        .as_number()
        .unwrap_or(0.0);
    let remaining = (target_length - args.len() as f64).max(0.0);

    let target_name = match target_obj.get(cx, &PropertyKey::Atom(atoms::NAME), target)? {
        Value::String(s) => s.as_str().to_string(),
        _ => String::new(),
    };

    let proto = target_obj.proto();
    let data = BoundFunctionData {
        target: target.clone(),
        this,
        args,
    };
    let bound = JsObject::new(ObjectKind::BoundFunction(Box::new(data)), proto);
    bound.insert_property(
        PropertyKey::Atom(atoms::LENGTH),
        Property::data_with(Value::number(remaining), false, false, true),
    );
    bound.insert_property(
        PropertyKey::Atom(atoms::NAME),
        Property::data_with(Value::string(format!("bound {target_name}")), false, false, true),
    );
    Ok(bound)
}
