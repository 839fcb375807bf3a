//! The `JSON` namespace, bridged through `serde_json`

use marten_vm_gc::GcRef;
use rustc_hash::FxHashSet;

use crate::array;
use crate::context::Context;
use crate::convert;
use crate::error::{VmError, VmResult};
use crate::intrinsics::{install_namespace, method};
use crate::object::{JsObject, ObjectKind};
use crate::property::PropertyKey;
use crate::value::Value;

/// Install `JSON`.
pub fn install(cx: &mut Context) {
    let json = install_namespace(cx, "JSON");
    method(cx, &json, "parse", 2, json_parse);
    method(cx, &json, "stringify", 3, json_stringify);
}

fn json_parse(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let text = convert::to_string_value(cx, args.first().unwrap_or(&Value::Undefined))?;
    let parsed: serde_json::Value = serde_json::from_str(text.as_str())
        .map_err(|e| VmError::syntax_error(format!("Unexpected token in JSON: {e}")))?;
    Ok(from_serde(cx, &parsed))
}

fn from_serde(cx: &mut Context, v: &serde_json::Value) -> Value {
    match v {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Boolean(*b),
        serde_json::Value::Number(n) => Value::number(n.as_f64().unwrap_or(f64::NAN)),
        serde_json::Value::String(s) => Value::string(s.clone()),
        serde_json::Value::Array(items) => {
            let elements = items.iter().map(|item| from_serde(cx, item)).collect();
            Value::Object(array::new_array(cx, elements))
        }
        serde_json::Value::Object(map) => {
            let obj = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
            for (k, value) in map {
                let key = convert::string_to_key(cx, k);
                let converted = from_serde(cx, value);
                obj.insert_property(key, crate::property::Property::data(converted));
            }
            Value::Object(obj)
        }
    }
}

fn json_stringify(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let value = args.first().cloned().unwrap_or(Value::Undefined);
    let indent = match args.get(2) {
        Some(Value::Number(n)) => " ".repeat((*n as usize).min(10)),
        Some(Value::String(s)) => s.as_str().chars().take(10).collect(),
        _ => String::new(),
    };
    let mut seen = FxHashSet::default();
    let Some(tree) = to_serde(cx, &value, &mut seen)? else {
        return Ok(Value::Undefined);
    };
    let rendered = if indent.is_empty() {
        serde_json::to_string(&tree)
    } else {
        // serde_json's pretty printer is fixed at two spaces; re-indent.
        serde_json::to_string_pretty(&tree).map(|s| reindent(&s, &indent))
    }
    .map_err(|e| VmError::type_error(format!("JSON.stringify failed: {e}")))?;
    Ok(Value::string(rendered))
}

fn reindent(pretty: &str, indent: &str) -> String {
    pretty
        .lines()
        .map(|line| {
            let depth = line.len() - line.trim_start().len();
            format!("{}{}", indent.repeat(depth / 2), line.trim_start())
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn to_serde(
    cx: &mut Context,
    value: &Value,
    seen: &mut FxHashSet<usize>,
) -> VmResult<Option<serde_json::Value>> {
    Ok(match value {
        Value::Undefined | Value::Symbol(_) => None,
        Value::Null => Some(serde_json::Value::Null),
        Value::Boolean(b) => Some(serde_json::Value::Bool(*b)),
        Value::Number(n) => Some(if n.is_finite() {
            serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null)
        } else {
            serde_json::Value::Null
        }),
        Value::BigInt(_) => {
            return Err(VmError::type_error("Do not know how to serialize a BigInt"));
        }
        Value::String(s) => Some(serde_json::Value::String(s.as_str().to_string())),
        Value::Object(obj) => {
            if obj.is_callable() {
                return Ok(None);
            }
            if !seen.insert(obj.id()) {
                return Err(VmError::type_error("Converting circular structure to JSON"));
            }
            let result = serialize_object(cx, obj, value, seen)?;
            seen.remove(&obj.id());
            Some(result)
        }
    })
}

fn serialize_object(
    cx: &mut Context,
    obj: &GcRef<JsObject>,
    receiver: &Value,
    seen: &mut FxHashSet<usize>,
) -> VmResult<serde_json::Value> {
    // Wrappers serialize as their primitive.
    if let ObjectKind::PrimitiveWrapper(p) = obj.kind() {
        let p = p.clone();
        return Ok(to_serde(cx, &p, seen)?.unwrap_or(serde_json::Value::Null));
    }
    if crate::object::is_array(receiver)? {
        let len = array::length_of(obj);
        let mut items = Vec::with_capacity(len as usize);
        for i in 0..len {
            let element = obj.get(cx, &PropertyKey::Index(i), receiver)?;
            items.push(to_serde(cx, &element, seen)?.unwrap_or(serde_json::Value::Null));
        }
        return Ok(serde_json::Value::Array(items));
    }

    let mut map = serde_json::Map::new();
    for key in obj.own_keys(cx)? {
        if matches!(key, PropertyKey::Symbol(_)) {
            continue;
        }
        let Some(prop) = obj.get_own_property(cx, &key)? else {
            continue;
        };
        if !prop.is_enumerable() {
            continue;
        }
        let v = obj.get(cx, &key, receiver)?;
        if let Some(serialized) = to_serde(cx, &v, seen)? {
            let name = match &key {
                PropertyKey::Index(i) => i.to_string(),
                PropertyKey::Atom(a) => cx.atom_name(*a).as_str().to_string(),
                PropertyKey::Symbol(_) => continue,
            };
            map.insert(name, serialized);
        }
    }
    Ok(serde_json::Value::Object(map))
}
