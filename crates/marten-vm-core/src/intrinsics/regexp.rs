//! `RegExp` — surface over the external pattern engine

use crate::context::Context;
use crate::convert;
use crate::error::{VmError, VmResult};
use crate::intrinsics::{self, getter, method};
use crate::object::{JsObject, ObjectKind};
use crate::property::{Property, PropertyKey};
use crate::regexp::RegExpData;
use crate::value::Value;

/// Install `RegExp`.
pub fn install(cx: &mut Context) {
    let proto = cx.intrinsics().regexp_prototype.clone();
    method(cx, &proto, "test", 1, regexp_test);
    method(cx, &proto, "exec", 1, regexp_exec);
    method(cx, &proto, "toString", 0, regexp_to_string);
    getter(cx, &proto, "source", regexp_source);
    getter(cx, &proto, "flags", regexp_flags);
    getter(cx, &proto, "global", regexp_global);
    getter(cx, &proto, "sticky", regexp_sticky);
    intrinsics::install_constructor(cx, "RegExp", 2, &proto, false, regexp_ctor);
}

fn regexp_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let (source, flags) = match args.first() {
        Some(Value::Object(obj)) if matches!(obj.kind(), ObjectKind::RegExp(_)) => {
            let ObjectKind::RegExp(data) = obj.kind() else {
                unreachable!()
            };
            let flags = match args.get(1) {
                None | Some(Value::Undefined) => data.flags.clone(),
                Some(v) => convert::to_string_value(cx, v)?.as_str().to_string(),
            };
            (data.source.clone(), flags)
        }
        None | Some(Value::Undefined) => (String::new(), String::new()),
        Some(v) => {
            let source = convert::to_string_value(cx, v)?.as_str().to_string();
            let flags = match args.get(1) {
                None | Some(Value::Undefined) => String::new(),
                Some(f) => convert::to_string_value(cx, f)?.as_str().to_string(),
            };
            (source, flags)
        }
    };
    let data = RegExpData::compile(&source, &flags)?;
    let obj = JsObject::new(
        ObjectKind::RegExp(Box::new(data)),
        Some(cx.intrinsics().regexp_prototype.clone()),
    );
    let last_index_key = PropertyKey::Atom(cx.atom("lastIndex"));
    obj.insert_property(
        last_index_key,
        Property::data_with(Value::number(0.0), true, false, false),
    );
    Ok(Value::Object(obj))
}

fn this_regexp<'a>(this: &'a Value, op: &str) -> VmResult<&'a RegExpData> {
    match this {
        Value::Object(obj) => match obj.kind() {
            ObjectKind::RegExp(data) => Ok(data),
            _ => Err(VmError::type_error(format!(
                "RegExp.prototype.{op} called on incompatible receiver"
            ))),
        },
        _ => Err(VmError::type_error(format!(
            "RegExp.prototype.{op} called on incompatible receiver"
        ))),
    }
}

fn regexp_test(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let result = regexp_exec(cx, this, args)?;
    Ok(Value::Boolean(!result.is_null()))
}

fn regexp_exec(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let input = convert::to_string_value(cx, args.first().unwrap_or(&Value::Undefined))?;
    let units: Vec<u16> = input.as_str().encode_utf16().collect();

    let (start, use_last_index) = {
        let data = this_regexp(this, "exec")?;
        let tracked = data.is_global() || data.is_sticky();
        let start = if tracked {
            data.last_index.get() as usize
        } else {
            0
        };
        (start, tracked)
    };

    if start > units.len() {
        let data = this_regexp(this, "exec")?;
        data.last_index.set(0);
        return Ok(Value::Null);
    }

    let found = {
        let data = this_regexp(this, "exec")?;
        data.regex.find_from_utf16(&units, start).next()
    };

    let Some(m) = found else {
        let data = this_regexp(this, "exec")?;
        if use_last_index {
            data.last_index.set(0);
        }
        return Ok(Value::Null);
    };

    {
        let data = this_regexp(this, "exec")?;
        if data.is_sticky() && m.range.start != start {
            data.last_index.set(0);
            return Ok(Value::Null);
        }
        if use_last_index {
            data.last_index.set(m.range.end as u64);
        }
    }

    let mut captures: Vec<Value> = Vec::new();
    captures.push(Value::from_js_string(crate::string::JsString::from_utf16(
        &units[m.range.start..m.range.end],
    )));
    for group in m.captures.iter() {
        captures.push(match group {
            Some(range) => Value::from_js_string(crate::string::JsString::from_utf16(
                &units[range.start..range.end],
            )),
            None => Value::Undefined,
        });
    }
    let result = crate::array::new_array(cx, captures);
    let index_key = PropertyKey::Atom(cx.atom("index"));
    result.insert_property(index_key, Property::data(Value::number(m.range.start as f64)));
    let input_key = PropertyKey::Atom(cx.atom("input"));
    result.insert_property(input_key, Property::data(Value::from_js_string(input)));
    Ok(Value::Object(result))
}

fn regexp_to_string(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::string(this_regexp(this, "toString")?.to_pattern_string()))
}

fn regexp_source(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let data = this_regexp(this, "source")?;
    Ok(Value::string(if data.source.is_empty() {
        "(?:)".to_string()
    } else {
        data.source.clone()
    }))
}

fn regexp_flags(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::string(this_regexp(this, "flags")?.flags.clone()))
}

fn regexp_global(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::Boolean(this_regexp(this, "global")?.is_global()))
}

fn regexp_sticky(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::Boolean(this_regexp(this, "sticky")?.is_sticky()))
}
