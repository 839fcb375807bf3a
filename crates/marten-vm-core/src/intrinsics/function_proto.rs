//! `Function` constructor and `Function.prototype`

use crate::array;
use crate::atom::atoms;
use crate::bound_function;
use crate::context::Context;
use crate::convert;
use crate::error::{VmError, VmResult};
use crate::interpreter;
use crate::intrinsics::{method, symbol_method};
use crate::object::ObjectKind;
use crate::property::PropertyKey;
use crate::value::Value;

/// Install `Function.prototype` methods and the `Function`/`AsyncFunction`
/// constructors.
pub fn install(cx: &mut Context) {
    let proto = cx.intrinsics().function_prototype.clone();
    method(cx, &proto, "call", 1, function_call);
    method(cx, &proto, "apply", 2, function_apply);
    method(cx, &proto, "bind", 1, function_bind);
    method(cx, &proto, "toString", 0, function_to_string);
    let has_instance = cx.well_known().has_instance.clone();
    symbol_method(
        cx,
        &proto,
        has_instance,
        "[Symbol.hasInstance]",
        1,
        function_has_instance,
    );

    crate::intrinsics::install_constructor(cx, "Function", 1, &proto, false, function_ctor);

    // AsyncFunction chains through Function.prototype but must not rewire
    // Function.prototype.constructor, so it is installed by hand.
    let async_ctor = crate::function::native_constructor(
        cx,
        "AsyncFunction",
        1,
        std::sync::Arc::new(async_function_ctor) as crate::function::NativeFn,
        false,
    );
    async_ctor.insert_property(
        crate::property::PropertyKey::Atom(atoms::PROTOTYPE),
        crate::property::Property::data_with(Value::Object(proto.clone()), false, false, false),
    );
    let global = cx.global().clone();
    let async_key = crate::property::PropertyKey::Atom(cx.atom("AsyncFunction"));
    global.insert_property(
        async_key,
        crate::property::Property::method(Value::Object(async_ctor)),
    );
}

fn function_call(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let call_this = args.first().cloned().unwrap_or(Value::Undefined);
    let rest = if args.is_empty() { &[] } else { &args[1..] };
    interpreter::call_value(cx, this, &call_this, rest)
}

fn function_apply(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let call_this = args.first().cloned().unwrap_or(Value::Undefined);
    let call_args = match args.get(1) {
        None | Some(Value::Undefined) | Some(Value::Null) => Vec::new(),
        Some(Value::Object(list)) => array::elements_of(cx, list)?,
        Some(_) => {
            return Err(VmError::type_error(
                "CreateListFromArrayLike called on non-object",
            ));
        }
    };
    interpreter::call_value(cx, this, &call_this, &call_args)
}

fn function_bind(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let bound_this = args.first().cloned().unwrap_or(Value::Undefined);
    let prefix: Vec<Value> = args.iter().skip(1).cloned().collect();
    let bound = bound_function::make_bound(cx, this, bound_this, prefix)?;
    Ok(Value::Object(bound))
}

fn function_to_string(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let Value::Object(obj) = this else {
        return Err(VmError::type_error(
            "Function.prototype.toString requires a function",
        ));
    };
    let name = match obj.get(cx, &PropertyKey::Atom(atoms::NAME), this)? {
        Value::String(s) => s.as_str().to_string(),
        _ => String::new(),
    };
    match obj.kind() {
        ObjectKind::NativeFunction(_) | ObjectKind::BoundFunction(_) => Ok(Value::string(format!(
            "function {name}() {{ [native code] }}"
        ))),
        ObjectKind::BytecodeFunction(_) => {
            Ok(Value::string(format!("function {name}() {{ [bytecode] }}")))
        }
        _ => Err(VmError::type_error(
            "Function.prototype.toString requires a function",
        )),
    }
}

fn function_has_instance(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    if !this.is_callable() {
        return Ok(Value::Boolean(false));
    }
    let r = interpreter::ordinary_has_instance(cx, &value, this)?;
    Ok(Value::Boolean(r))
}

/// `new Function(arg1, ..., body)` — assembled into a source string and
/// routed through the compiler collaborator.
fn function_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    dynamic_function(cx, args, "function")
}

fn async_function_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    dynamic_function(cx, args, "async function")
}

fn dynamic_function(cx: &mut Context, args: &[Value], keyword: &str) -> VmResult<Value> {
    let mut params = Vec::new();
    for arg in args.iter().take(args.len().saturating_sub(1)) {
        params.push(convert::to_string_value(cx, arg)?.as_str().to_string());
    }
    let body = match args.last() {
        Some(v) => convert::to_string_value(cx, v)?.as_str().to_string(),
        None => String::new(),
    };
    let source = format!(
        "({keyword} anonymous({params}\n) {{\n{body}\n}})",
        params = params.join(",")
    );
    cx.eval_direct(&source, "<function-constructor>", Value::Undefined)
}
