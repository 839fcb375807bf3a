//! The error hierarchy
//!
//! `Error` plus the native subclasses, each with its own prototype chained
//! through `Error.prototype`. Error objects carry `message` and the textual
//! `stack` snapshot captured when the pending exception was set.

use marten_vm_gc::GcRef;

use crate::atom::atoms;
use crate::context::Context;
use crate::convert;
use crate::error::{JsErrorKind, StackFrame, VmResult};
use crate::intrinsics::{self, method};
use crate::object::{JsObject, ObjectKind};
use crate::property::{Property, PropertyKey};
use crate::value::Value;

/// Install the whole error hierarchy.
pub fn install(cx: &mut Context) {
    let base_proto = cx.intrinsics().error_prototype(JsErrorKind::Error).clone();
    method(cx, &base_proto, "toString", 0, error_to_string);
    base_proto.insert_property(
        PropertyKey::Atom(atoms::NAME),
        Property::method(Value::string("Error")),
    );
    base_proto.insert_property(
        PropertyKey::Atom(atoms::MESSAGE),
        Property::method(Value::string("")),
    );

    for kind in JsErrorKind::all() {
        let proto = cx.intrinsics().error_prototype(kind).clone();
        if kind != JsErrorKind::Error {
            proto.insert_property(
                PropertyKey::Atom(atoms::NAME),
                Property::method(Value::string(kind.name())),
            );
            proto.insert_property(
                PropertyKey::Atom(atoms::MESSAGE),
                Property::method(Value::string("")),
            );
        }
        let ctor_fn: intrinsics::RawNative = match kind {
            JsErrorKind::Error => |cx, t, a| error_ctor_for(cx, t, a, JsErrorKind::Error),
            JsErrorKind::AggregateError => {
                |cx, t, a| aggregate_error_ctor(cx, t, a)
            }
            JsErrorKind::EvalError => |cx, t, a| error_ctor_for(cx, t, a, JsErrorKind::EvalError),
            JsErrorKind::RangeError => |cx, t, a| error_ctor_for(cx, t, a, JsErrorKind::RangeError),
            JsErrorKind::ReferenceError => {
                |cx, t, a| error_ctor_for(cx, t, a, JsErrorKind::ReferenceError)
            }
            JsErrorKind::SyntaxError => {
                |cx, t, a| error_ctor_for(cx, t, a, JsErrorKind::SyntaxError)
            }
            JsErrorKind::TypeError => |cx, t, a| error_ctor_for(cx, t, a, JsErrorKind::TypeError),
            JsErrorKind::URIError => |cx, t, a| error_ctor_for(cx, t, a, JsErrorKind::URIError),
            JsErrorKind::SuppressedError => |cx, t, a| suppressed_error_ctor(cx, t, a),
        };
        intrinsics::install_constructor(cx, kind.name(), 1, &proto, false, ctor_fn);
    }
}

/// Allocate an error object of `kind` with `message` and a rendered stack.
pub fn create_error_object(
    cx: &mut Context,
    kind: JsErrorKind,
    message: &str,
    stack: &[StackFrame],
) -> GcRef<JsObject> {
    let proto = cx.intrinsics().error_prototype(kind).clone();
    let obj = JsObject::new(ObjectKind::Error(kind), Some(proto));
    if !message.is_empty() {
        obj.insert_property(
            PropertyKey::Atom(atoms::MESSAGE),
            Property::method(Value::string(message)),
        );
    }
    obj.insert_property(
        PropertyKey::Atom(atoms::STACK),
        Property::method(Value::string(render_stack(kind, message, stack))),
    );
    obj
}

fn render_stack(kind: JsErrorKind, message: &str, stack: &[StackFrame]) -> String {
    let mut out = if message.is_empty() {
        kind.name().to_string()
    } else {
        format!("{}: {message}", kind.name())
    };
    for frame in stack {
        out.push('\n');
        out.push_str(&frame.render());
    }
    out
}

fn error_ctor_for(
    cx: &mut Context,
    _this: &Value,
    args: &[Value],
    kind: JsErrorKind,
) -> VmResult<Value> {
    let message = match args.first() {
        None | Some(Value::Undefined) => String::new(),
        Some(v) => convert::to_string_value(cx, v)?.as_str().to_string(),
    };
    let stack = cx.capture_stack();
    let obj = create_error_object(cx, kind, &message, &stack);
    if let Some(Value::Object(options)) = args.get(1) {
        let cause_key = PropertyKey::Atom(atoms::CAUSE);
        if options.has(cx, &cause_key)? {
            let cause = options.get(cx, &cause_key, &Value::Object(options.clone()))?;
            obj.insert_property(cause_key, Property::method(cause));
        }
    }
    Ok(Value::Object(obj))
}

fn aggregate_error_ctor(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let errors = args.first().cloned().unwrap_or(Value::Undefined);
    let message_args: Vec<Value> = args.iter().skip(1).cloned().collect();
    let result = error_ctor_for(cx, this, &message_args, JsErrorKind::AggregateError)?;
    let Value::Object(obj) = &result else {
        unreachable!()
    };
    let list = crate::interpreter::iterate_to_vec(cx, &errors)?;
    let errors_array = crate::array::new_array(cx, list);
    obj.insert_property(
        PropertyKey::Atom(atoms::ERRORS),
        Property::method(Value::Object(errors_array)),
    );
    Ok(result)
}

fn suppressed_error_ctor(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let error = args.first().cloned().unwrap_or(Value::Undefined);
    let suppressed = args.get(1).cloned().unwrap_or(Value::Undefined);
    let message_args: Vec<Value> = args.iter().skip(2).cloned().collect();
    let result = error_ctor_for(cx, this, &message_args, JsErrorKind::SuppressedError)?;
    let Value::Object(obj) = &result else {
        unreachable!()
    };
    obj.insert_property(PropertyKey::Atom(atoms::ERROR_SLOT), Property::method(error));
    obj.insert_property(
        PropertyKey::Atom(atoms::SUPPRESSED),
        Property::method(suppressed),
    );
    Ok(result)
}

fn error_to_string(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let Value::Object(obj) = this else {
        return Err(crate::error::VmError::type_error(
            "Error.prototype.toString called on non-object",
        ));
    };
    let name = match obj.get(cx, &PropertyKey::Atom(atoms::NAME), this)? {
        Value::Undefined => "Error".to_string(),
        v => convert::to_string_value(cx, &v)?.as_str().to_string(),
    };
    let message = match obj.get(cx, &PropertyKey::Atom(atoms::MESSAGE), this)? {
        Value::Undefined => String::new(),
        v => convert::to_string_value(cx, &v)?.as_str().to_string(),
    };
    Ok(Value::string(match (name.is_empty(), message.is_empty()) {
        (true, _) => message,
        (false, true) => name,
        (false, false) => format!("{name}: {message}"),
    }))
}
