//! `Iterator`, `%IteratorPrototype%`, and `Generator.prototype`

use crate::context::Context;
use crate::error::{VmError, VmResult};
use crate::generator::{ResumeMode, create_iter_result};
use crate::interpreter;
use crate::intrinsics::{self, method, symbol_method};
use crate::object::ObjectKind;
use crate::value::Value;

/// Install the iteration roots.
pub fn install(cx: &mut Context) {
    let iterator_prototype = cx.intrinsics().iterator_prototype.clone();
    let iterator_sym = cx.well_known().iterator.clone();
    symbol_method(
        cx,
        &iterator_prototype,
        iterator_sym,
        "[Symbol.iterator]",
        0,
        return_this,
    );

    // The abstract Iterator constructor.
    intrinsics::install_constructor(cx, "Iterator", 0, &iterator_prototype, true, iterator_ctor);

    let generator_prototype = cx.intrinsics().generator_prototype.clone();
    method(cx, &generator_prototype, "next", 1, generator_next);
    method(cx, &generator_prototype, "return", 1, generator_return);
    method(cx, &generator_prototype, "throw", 1, generator_throw);
    let tag = cx.well_known().to_string_tag.clone();
    generator_prototype.insert_property(
        crate::property::PropertyKey::Symbol(tag),
        crate::property::Property::data_with(Value::string("Generator"), false, false, true),
    );
}

fn return_this(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(this.clone())
}

fn iterator_ctor(_cx: &mut Context, _this: &Value, _args: &[Value]) -> VmResult<Value> {
    Err(VmError::type_error("Abstract class Iterator not directly constructable"))
}

fn this_generator(this: &Value) -> VmResult<&marten_vm_gc::GcRef<crate::object::JsObject>> {
    match this {
        Value::Object(obj) if matches!(obj.kind(), ObjectKind::Generator(_)) => Ok(obj),
        _ => Err(VmError::type_error(
            "Generator method called on incompatible receiver",
        )),
    }
}

fn generator_next(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let generator = this_generator(this)?.clone();
    let sent = args.first().cloned().unwrap_or(Value::Undefined);
    let (value, done) = interpreter::generator_resume(cx, &generator, ResumeMode::Next(sent))?;
    Ok(Value::Object(create_iter_result(cx, value, done)))
}

fn generator_return(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let generator = this_generator(this)?.clone();
    let sent = args.first().cloned().unwrap_or(Value::Undefined);
    let (value, done) = interpreter::generator_resume(cx, &generator, ResumeMode::Return(sent))?;
    Ok(Value::Object(create_iter_result(cx, value, done)))
}

fn generator_throw(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let generator = this_generator(this)?.clone();
    let error = args.first().cloned().unwrap_or(Value::Undefined);
    let (value, done) = interpreter::generator_resume(cx, &generator, ResumeMode::Throw(error))?;
    Ok(Value::Object(create_iter_result(cx, value, done)))
}
