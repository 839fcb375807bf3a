//! Abstract operations — the ES type-conversion ladder
//!
//! `ToPrimitive` consults `@@toPrimitive` before the ordinary
//! `valueOf`/`toString` dance, so any conversion can run arbitrary JS — every
//! operation here takes the context. Number formatting rides on `ryu`/`itoa`
//! (the shortest-roundtrip formatter is a collaborator, not part of the
//! core).

use marten_vm_gc::GcRef;
use num_bigint::BigInt;
use num_traits::Zero;
use std::sync::Arc;

use crate::atom::atoms;
use crate::context::Context;
use crate::error::{VmError, VmResult};
use crate::interpreter;
use crate::object::{JsObject, ObjectKind};
use crate::property::{PropertyDescriptor, PropertyKey};
use crate::string::JsString;
use crate::value::Value;

/// Preferred type hint for `ToPrimitive`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreferredType {
    /// No hint ("default")
    Default,
    /// "number"
    Number,
    /// "string"
    String,
}

/// ToPrimitive.
pub fn to_primitive(cx: &mut Context, value: &Value, hint: PreferredType) -> VmResult<Value> {
    let Value::Object(obj) = value else {
        return Ok(value.clone());
    };

    let to_primitive_key = PropertyKey::Symbol(cx.well_known().to_primitive.clone());
    let exotic = obj.get(cx, &to_primitive_key, value)?;
    if !exotic.is_nullish() {
        let hint_str = match hint {
            PreferredType::Default => "default",
            PreferredType::Number => "number",
            PreferredType::String => "string",
        };
        let result = interpreter::call_value(cx, &exotic, value, &[Value::string(hint_str)])?;
        if !result.is_object() {
            return Ok(result);
        }
        return Err(VmError::type_error("Cannot convert object to primitive value"));
    }

    let methods: [crate::atom::Atom; 2] = if hint == PreferredType::String {
        [atoms::TO_STRING, atoms::VALUE_OF]
    } else {
        [atoms::VALUE_OF, atoms::TO_STRING]
    };
    for method in methods {
        let func = obj.get(cx, &PropertyKey::Atom(method), value)?;
        if func.is_callable() {
            let result = interpreter::call_value(cx, &func, value, &[])?;
            if !result.is_object() {
                return Ok(result);
            }
        }
    }
    Err(VmError::type_error("Cannot convert object to primitive value"))
}

/// ToNumber.
pub fn to_number(cx: &mut Context, value: &Value) -> VmResult<f64> {
    match value {
        Value::Undefined => Ok(f64::NAN),
        Value::Null => Ok(0.0),
        Value::Boolean(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => Ok(*n),
        Value::String(s) => Ok(string_to_number(s.as_str())),
        Value::BigInt(_) => Err(VmError::type_error("Cannot convert a BigInt to a number")),
        Value::Symbol(_) => Err(VmError::type_error("Cannot convert a Symbol to a number")),
        Value::Object(_) => {
            let prim = to_primitive(cx, value, PreferredType::Number)?;
            to_number(cx, &prim)
        }
    }
}

/// ToNumeric — Number or BigInt.
pub fn to_numeric(cx: &mut Context, value: &Value) -> VmResult<Value> {
    let prim = to_primitive(cx, value, PreferredType::Number)?;
    match prim {
        Value::BigInt(_) => Ok(prim),
        other => Ok(Value::number(to_number(cx, &other)?)),
    }
}

/// ToBigInt.
pub fn to_bigint(cx: &mut Context, value: &Value) -> VmResult<Arc<BigInt>> {
    let prim = to_primitive(cx, value, PreferredType::Number)?;
    match prim {
        Value::BigInt(b) => Ok(b),
        Value::Boolean(b) => Ok(Arc::new(BigInt::from(b as u8))),
        Value::String(s) => parse_bigint_literal(s.as_str())
            .map(Arc::new)
            .ok_or_else(|| {
                VmError::syntax_error(format!("Cannot convert {} to a BigInt", s.as_str()))
            }),
        Value::Number(_) => Err(VmError::type_error(
            "Cannot convert a Number to a BigInt; use BigInt() explicitly",
        )),
        other => Err(VmError::type_error(format!(
            "Cannot convert {} to a BigInt",
            other.type_of()
        ))),
    }
}

/// Parse a BigInt literal body (decimal, or 0x/0o/0b prefixed).
pub fn parse_bigint_literal(s: &str) -> Option<BigInt> {
    let t = s.trim();
    if t.is_empty() {
        return Some(BigInt::zero());
    }
    let (negative, t) = match t.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, t.strip_prefix('+').unwrap_or(t)),
    };
    let parsed = if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        BigInt::parse_bytes(hex.as_bytes(), 16)
    } else if let Some(oct) = t.strip_prefix("0o").or_else(|| t.strip_prefix("0O")) {
        BigInt::parse_bytes(oct.as_bytes(), 8)
    } else if let Some(bin) = t.strip_prefix("0b").or_else(|| t.strip_prefix("0B")) {
        BigInt::parse_bytes(bin.as_bytes(), 2)
    } else {
        BigInt::parse_bytes(t.as_bytes(), 10)
    }?;
    Some(if negative { -parsed } else { parsed })
}

/// The ToNumber algorithm over string data.
pub fn string_to_number(s: &str) -> f64 {
    let t = s.trim_matches(|c: char| c.is_whitespace() || c == '\u{FEFF}');
    if t.is_empty() {
        return 0.0;
    }
    match t {
        "Infinity" | "+Infinity" => return f64::INFINITY,
        "-Infinity" => return f64::NEG_INFINITY,
        _ => {}
    }
    if let Some(hex) = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")) {
        return u128::from_str_radix(hex, 16)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    if let Some(oct) = t.strip_prefix("0o").or_else(|| t.strip_prefix("0O")) {
        return u128::from_str_radix(oct, 8)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    if let Some(bin) = t.strip_prefix("0b").or_else(|| t.strip_prefix("0B")) {
        return u128::from_str_radix(bin, 2)
            .map(|v| v as f64)
            .unwrap_or(f64::NAN);
    }
    // Reject forms Rust accepts but JS does not ("inf", "nan", "1_000").
    if t.bytes()
        .any(|b| !matches!(b, b'0'..=b'9' | b'.' | b'e' | b'E' | b'+' | b'-'))
    {
        return f64::NAN;
    }
    t.parse::<f64>().unwrap_or(f64::NAN)
}

/// ToString, producing an interned-ready `JsString`.
pub fn to_string_value(cx: &mut Context, value: &Value) -> VmResult<Arc<JsString>> {
    match value {
        Value::Undefined => Ok(JsString::new("undefined")),
        Value::Null => Ok(JsString::new("null")),
        Value::Boolean(b) => Ok(JsString::new(if *b { "true" } else { "false" })),
        Value::Number(n) => Ok(JsString::new(number_to_string(*n))),
        Value::BigInt(b) => Ok(JsString::new(b.to_string())),
        Value::String(s) => Ok(s.clone()),
        Value::Symbol(_) => Err(VmError::type_error("Cannot convert a Symbol to a string")),
        Value::Object(_) => {
            let prim = to_primitive(cx, value, PreferredType::String)?;
            to_string_value(cx, &prim)
        }
    }
}

/// Number → string with JS formatting. Exact integers render through
/// `itoa`; the rest go through `ryu` with JS-style exponent spelling.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n == 0.0 {
        return "0".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    if n.fract() == 0.0 && n.abs() < 1e21 {
        if n.abs() <= i64::MAX as f64 {
            let mut buf = itoa::Buffer::new();
            return buf.format(n as i64).to_string();
        }
        // Integral but outside i64: fall through to ryu, expanding below.
    }
    let mut buf = ryu::Buffer::new();
    let shortest = buf.format(n).to_string();
    jsify_ryu(&shortest)
}

/// Rewrite ryu output ("1e300", "1.5e-7") into JS spelling ("1e+300",
/// "1.5e-7"), expanding small exponents the way JS does.
fn jsify_ryu(s: &str) -> String {
    let Some(e_pos) = s.find(['e', 'E']) else {
        // ryu writes "x.0" for integral doubles; JS drops the ".0".
        return s.strip_suffix(".0").unwrap_or(s).to_string();
    };
    let mantissa = &s[..e_pos];
    let exp: i32 = s[e_pos + 1..].parse().unwrap_or(0);
    // JS uses plain notation for exponents in (-7, 21).
    if exp > -7 && exp < 21 {
        return expand_exponent(mantissa, exp);
    }
    let mantissa = mantissa.strip_suffix(".0").unwrap_or(mantissa);
    if exp >= 0 {
        format!("{mantissa}e+{exp}")
    } else {
        format!("{mantissa}e-{}", -exp)
    }
}

fn expand_exponent(mantissa: &str, exp: i32) -> String {
    let negative = mantissa.starts_with('-');
    let digits_part = mantissa.trim_start_matches('-');
    let (int_part, frac_part) = match digits_part.split_once('.') {
        Some((i, f)) => (i.to_string(), f.trim_end_matches('0').to_string()),
        None => (digits_part.to_string(), String::new()),
    };
    let digits: String = format!("{int_part}{frac_part}");
    let point = int_part.len() as i32 + exp;
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    if point <= 0 {
        out.push_str("0.");
        for _ in 0..-point {
            out.push('0');
        }
        out.push_str(digits.trim_end_matches('0'));
    } else if (point as usize) >= digits.len() {
        out.push_str(&digits);
        for _ in 0..(point as usize - digits.len()) {
            out.push('0');
        }
    } else {
        out.push_str(&digits[..point as usize]);
        let tail = digits[point as usize..].trim_end_matches('0');
        if !tail.is_empty() {
            out.push('.');
            out.push_str(tail);
        }
    }
    out
}

/// ToInt32.
pub fn to_int32(n: f64) -> i32 {
    to_uint32(n) as i32
}

/// ToUint32.
pub fn to_uint32(n: f64) -> u32 {
    if !n.is_finite() || n == 0.0 {
        return 0;
    }
    let int = n.trunc();
    let modulus = 4294967296.0;
    let mut m = int % modulus;
    if m < 0.0 {
        m += modulus;
    }
    m as u32
}

/// ToLength: clamp to `[0, 2^53 - 1]`.
pub fn to_length(cx: &mut Context, value: &Value) -> VmResult<u64> {
    let n = to_number(cx, value)?;
    if n.is_nan() || n <= 0.0 {
        return Ok(0);
    }
    Ok(n.min(9007199254740991.0) as u64)
}

/// ToIndex: integer in `[0, 2^53 - 1]`, rejecting negatives.
pub fn to_index(cx: &mut Context, value: &Value) -> VmResult<usize> {
    if value.is_undefined() {
        return Ok(0);
    }
    let n = to_number(cx, value)?;
    if n.is_nan() {
        return Ok(0);
    }
    let int = n.trunc();
    if int < 0.0 || int > 9007199254740991.0 {
        return Err(VmError::range_error("Invalid index"));
    }
    Ok(int as usize)
}

/// ToObject: wrap primitives in their wrapper objects.
pub fn to_object(cx: &mut Context, value: &Value) -> VmResult<GcRef<JsObject>> {
    match value {
        Value::Undefined | Value::Null => Err(VmError::type_error(
            "Cannot convert undefined or null to object",
        )),
        Value::Object(o) => Ok(o.clone()),
        primitive => {
            let proto = match primitive {
                Value::Boolean(_) => cx.intrinsics().boolean_prototype.clone(),
                Value::Number(_) => cx.intrinsics().number_prototype.clone(),
                Value::String(_) => cx.intrinsics().string_prototype.clone(),
                Value::Symbol(_) => cx.intrinsics().symbol_prototype.clone(),
                Value::BigInt(_) => cx.intrinsics().bigint_prototype.clone(),
                _ => unreachable!(),
            };
            let obj = JsObject::new(
                ObjectKind::PrimitiveWrapper(primitive.clone()),
                Some(proto),
            );
            if let Value::String(s) = primitive {
                obj.insert_property(
                    PropertyKey::Atom(atoms::LENGTH),
                    crate::property::Property::data_with(
                        Value::number(s.len_utf16() as f64),
                        false,
                        false,
                        false,
                    ),
                );
            }
            Ok(obj)
        }
    }
}

/// ToPropertyKey.
pub fn to_property_key(cx: &mut Context, value: &Value) -> VmResult<PropertyKey> {
    if let Value::Symbol(sym) = value {
        return Ok(PropertyKey::Symbol(sym.clone()));
    }
    let prim = to_primitive(cx, value, PreferredType::String)?;
    if let Value::Symbol(sym) = &prim {
        return Ok(PropertyKey::Symbol(sym.clone()));
    }
    let s = to_string_value(cx, &prim)?;
    Ok(string_to_key(cx, s.as_str()))
}

/// A string as a property key, recognizing canonical array indices.
pub fn string_to_key(cx: &mut Context, s: &str) -> PropertyKey {
    match PropertyKey::index_from_str(s) {
        Some(i) => PropertyKey::Index(i),
        None => PropertyKey::Atom(cx.atom(s)),
    }
}

/// A property key as the Value a trap receives.
pub fn key_to_value(cx: &mut Context, key: &PropertyKey) -> Value {
    match key {
        PropertyKey::Index(i) => Value::string(i.to_string()),
        PropertyKey::Atom(a) => Value::from_js_string(cx.atom_name(*a)),
        PropertyKey::Symbol(s) => Value::Symbol(s.clone()),
    }
}

/// ToPropertyDescriptor: read a descriptor object.
pub fn to_property_descriptor(cx: &mut Context, value: &Value) -> VmResult<PropertyDescriptor> {
    let Value::Object(obj) = value else {
        return Err(VmError::type_error("Property description must be an object"));
    };
    let mut desc = PropertyDescriptor::new();

    let fields: [(crate::atom::Atom, &str); 6] = [
        (atoms::VALUE, "value"),
        (atoms::WRITABLE, "writable"),
        (atoms::GET, "get"),
        (atoms::SET, "set"),
        (atoms::ENUMERABLE, "enumerable"),
        (atoms::CONFIGURABLE, "configurable"),
    ];
    for (atom, name) in fields {
        let key = PropertyKey::Atom(atom);
        if !obj.has(cx, &key)? {
            continue;
        }
        let v = obj.get(cx, &key, value)?;
        match name {
            "value" => desc.value = Some(v),
            "writable" => desc.writable = Some(v.is_truthy()),
            "enumerable" => desc.enumerable = Some(v.is_truthy()),
            "configurable" => desc.configurable = Some(v.is_truthy()),
            "get" => {
                if !v.is_undefined() && !v.is_callable() {
                    return Err(VmError::type_error("Getter must be a function"));
                }
                desc.get = Some(v);
            }
            "set" => {
                if !v.is_undefined() && !v.is_callable() {
                    return Err(VmError::type_error("Setter must be a function"));
                }
                desc.set = Some(v);
            }
            _ => unreachable!(),
        }
    }
    if desc.is_data() && desc.is_accessor() {
        return Err(VmError::type_error(
            "Invalid property descriptor. Cannot both specify accessors and a value or writable attribute",
        ));
    }
    Ok(desc)
}

/// FromPropertyDescriptor: build a descriptor object.
pub fn from_property_descriptor(cx: &mut Context, desc: &PropertyDescriptor) -> Value {
    let obj = JsObject::ordinary(Some(cx.intrinsics().object_prototype.clone()));
    let mut put = |atom: crate::atom::Atom, v: Value| {
        obj.insert_property(PropertyKey::Atom(atom), crate::property::Property::data(v));
    };
    if let Some(v) = &desc.value {
        put(atoms::VALUE, v.clone());
    }
    if let Some(w) = desc.writable {
        put(atoms::WRITABLE, Value::Boolean(w));
    }
    if let Some(g) = &desc.get {
        put(atoms::GET, g.clone());
    }
    if let Some(s) = &desc.set {
        put(atoms::SET, s.clone());
    }
    if let Some(e) = desc.enumerable {
        put(atoms::ENUMERABLE, Value::Boolean(e));
    }
    if let Some(c) = desc.configurable {
        put(atoms::CONFIGURABLE, Value::Boolean(c));
    }
    Value::Object(obj)
}

/// Property read on an arbitrary base value: primitives answer through their
/// wrapper prototypes without allocating; strings expose `length` and
/// indexed code units directly.
pub fn get_property_of_value(cx: &mut Context, base: &Value, key: &PropertyKey) -> VmResult<Value> {
    match base {
        Value::Object(obj) => obj.get(cx, key, base),
        Value::Undefined | Value::Null => Err(VmError::type_error(format!(
            "Cannot read properties of {} (reading '{}')",
            if base.is_undefined() { "undefined" } else { "null" },
            describe_key(cx, key),
        ))),
        Value::String(s) => {
            if *key == PropertyKey::Atom(atoms::LENGTH) {
                return Ok(Value::number(s.len_utf16() as f64));
            }
            if let PropertyKey::Index(i) = key {
                return Ok(match s.code_unit_at(*i as usize) {
                    Some(unit) => Value::from_js_string(JsString::from_utf16(&[unit])),
                    None => Value::Undefined,
                });
            }
            cx.intrinsics().string_prototype.clone().get(cx, key, base)
        }
        Value::Number(_) => cx.intrinsics().number_prototype.clone().get(cx, key, base),
        Value::Boolean(_) => cx.intrinsics().boolean_prototype.clone().get(cx, key, base),
        Value::Symbol(_) => cx.intrinsics().symbol_prototype.clone().get(cx, key, base),
        Value::BigInt(_) => cx.intrinsics().bigint_prototype.clone().get(cx, key, base),
    }
}

fn describe_key(cx: &mut Context, key: &PropertyKey) -> String {
    match key {
        PropertyKey::Index(i) => i.to_string(),
        PropertyKey::Atom(a) => cx.atom_name(*a).as_str().to_string(),
        PropertyKey::Symbol(s) => s.to_display_string(),
    }
}

/// Abstract Equality `==`, including BigInt/Number mixed comparisons.
pub fn abstract_equals(cx: &mut Context, a: &Value, b: &Value) -> VmResult<bool> {
    match (a, b) {
        _ if std::mem::discriminant(a) == std::mem::discriminant(b) => Ok(a.strict_equals(b)),
        (Value::Null, Value::Undefined) | (Value::Undefined, Value::Null) => Ok(true),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            Ok(*n == string_to_number(s.as_str()))
        }
        (Value::BigInt(big), Value::String(s)) | (Value::String(s), Value::BigInt(big)) => {
            Ok(parse_bigint_literal(s.as_str()).map_or(false, |parsed| parsed == **big))
        }
        (Value::Boolean(_), _) => {
            let n = Value::number(to_number(cx, a)?);
            abstract_equals(cx, &n, b)
        }
        (_, Value::Boolean(_)) => {
            let n = Value::number(to_number(cx, b)?);
            abstract_equals(cx, a, &n)
        }
        (Value::Number(n), Value::BigInt(big)) | (Value::BigInt(big), Value::Number(n)) => {
            if !n.is_finite() || n.fract() != 0.0 {
                return Ok(false);
            }
            Ok(BigInt::from(*n as i128) == **big)
        }
        (Value::Object(_), Value::Number(_) | Value::String(_) | Value::BigInt(_) | Value::Symbol(_)) => {
            let prim = to_primitive(cx, a, PreferredType::Default)?;
            abstract_equals(cx, &prim, b)
        }
        (Value::Number(_) | Value::String(_) | Value::BigInt(_) | Value::Symbol(_), Value::Object(_)) => {
            let prim = to_primitive(cx, b, PreferredType::Default)?;
            abstract_equals(cx, a, &prim)
        }
        _ => Ok(false),
    }
}

/// Abstract Relational Comparison; `None` means an incomparable NaN operand.
pub fn abstract_less_than(
    cx: &mut Context,
    a: &Value,
    b: &Value,
    left_first: bool,
) -> VmResult<Option<bool>> {
    let (pa, pb) = if left_first {
        let pa = to_primitive(cx, a, PreferredType::Number)?;
        let pb = to_primitive(cx, b, PreferredType::Number)?;
        (pa, pb)
    } else {
        let pb = to_primitive(cx, b, PreferredType::Number)?;
        let pa = to_primitive(cx, a, PreferredType::Number)?;
        (pa, pb)
    };

    if let (Value::String(sa), Value::String(sb)) = (&pa, &pb) {
        return Ok(Some(sa.compare_utf16(sb) == std::cmp::Ordering::Less));
    }
    match (&pa, &pb) {
        (Value::BigInt(ba), Value::BigInt(bb)) => Ok(Some(ba < bb)),
        (Value::BigInt(ba), _) => {
            let nb = to_number(cx, &pb)?;
            Ok(compare_bigint_f64(ba, nb))
        }
        (_, Value::BigInt(bb)) => {
            let na = to_number(cx, &pa)?;
            Ok(compare_bigint_f64(bb, na).map(|r| !r && !bigint_equals_f64(bb, na)))
        }
        _ => {
            let na = to_number(cx, &pa)?;
            let nb = to_number(cx, &pb)?;
            if na.is_nan() || nb.is_nan() {
                Ok(None)
            } else {
                Ok(Some(na < nb))
            }
        }
    }
}

fn bigint_equals_f64(b: &BigInt, n: f64) -> bool {
    n.is_finite() && n.fract() == 0.0 && BigInt::from(n as i128) == *b
}

/// `b < n`, None when `n` is NaN.
fn compare_bigint_f64(b: &BigInt, n: f64) -> Option<bool> {
    if n.is_nan() {
        return None;
    }
    if n == f64::INFINITY {
        return Some(true);
    }
    if n == f64::NEG_INFINITY {
        return Some(false);
    }
    let floor = BigInt::from(n.floor() as i128);
    Some(b < &floor || (*b == floor && n.fract() > 0.0))
}

/// Display form used by `console` and host-side reporting.
pub fn display_value(cx: &mut Context, value: &Value) -> String {
    match value {
        Value::Symbol(s) => s.to_display_string(),
        Value::Object(obj) => match obj.kind() {
            ObjectKind::Error(_) => {
                let name = obj
                    .get(cx, &PropertyKey::Atom(atoms::NAME), value)
                    .ok()
                    .map(|v| to_string_value(cx, &v).map(|s| s.as_str().to_string()))
                    .and_then(Result::ok)
                    .unwrap_or_else(|| "Error".to_string());
                let msg = obj
                    .get(cx, &PropertyKey::Atom(atoms::MESSAGE), value)
                    .ok()
                    .map(|v| to_string_value(cx, &v).map(|s| s.as_str().to_string()))
                    .and_then(Result::ok)
                    .unwrap_or_default();
                if msg.is_empty() { name } else { format!("{name}: {msg}") }
            }
            _ => match to_string_value(cx, value) {
                Ok(s) => s.as_str().to_string(),
                Err(_) => format!("[object {}]", obj.kind().class_name()),
            },
        },
        other => match to_string_value(cx, other) {
            Ok(s) => s.as_str().to_string(),
            Err(_) => "<value>".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_to_number() {
        assert_eq!(string_to_number(""), 0.0);
        assert_eq!(string_to_number("  42  "), 42.0);
        assert_eq!(string_to_number("0x10"), 16.0);
        assert_eq!(string_to_number("0b101"), 5.0);
        assert_eq!(string_to_number("0o17"), 15.0);
        assert_eq!(string_to_number("-Infinity"), f64::NEG_INFINITY);
        assert!(string_to_number("12px").is_nan());
        assert!(string_to_number("inf").is_nan());
        assert_eq!(string_to_number("1e3"), 1000.0);
    }

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(0.0), "0");
        assert_eq!(number_to_string(-0.0), "0");
        assert_eq!(number_to_string(42.0), "42");
        assert_eq!(number_to_string(-1.5), "-1.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::INFINITY), "Infinity");
        assert_eq!(number_to_string(1e21), "1e+21");
        assert_eq!(number_to_string(1e-7), "1e-7");
        assert_eq!(number_to_string(0.001), "0.001");
    }

    #[test]
    fn test_to_uint32() {
        assert_eq!(to_uint32(f64::NAN), 0);
        assert_eq!(to_uint32(-1.0), u32::MAX);
        assert_eq!(to_uint32(4294967296.0), 0);
        assert_eq!(to_int32(2147483648.0), i32::MIN);
    }

    #[test]
    fn test_parse_bigint_literal() {
        assert_eq!(parse_bigint_literal("42"), Some(BigInt::from(42)));
        assert_eq!(parse_bigint_literal("-0x10"), Some(BigInt::from(-16)));
        assert_eq!(parse_bigint_literal(""), Some(BigInt::zero()));
        assert_eq!(parse_bigint_literal("1.5"), None);
    }
}
