//! Primitive wrapper constructors: `Boolean`, `Number`, `String`, `Symbol`,
//! `BigInt`

use num_bigint::BigInt;
use num_traits::ToPrimitive;

use crate::context::Context;
use crate::convert;
use crate::error::{VmError, VmResult};
use crate::intrinsics::{self, frozen_prop, getter, method, symbol_method};
use crate::object::ObjectKind;
use crate::property::{Property, PropertyKey};
use crate::string::JsString;
use crate::value::Value;

fn wrapped_primitive(this: &Value) -> Option<Value> {
    match this {
        Value::Object(obj) => match obj.kind() {
            ObjectKind::PrimitiveWrapper(v) => Some(v.clone()),
            _ => None,
        },
        primitive => Some(primitive.clone()),
    }
}

fn wrap(cx: &mut Context, value: Value) -> VmResult<Value> {
    if cx.new_target().is_some() {
        Ok(Value::Object(convert::to_object(cx, &value)?))
    } else {
        Ok(value)
    }
}

// ====================================================================
// Boolean
// ====================================================================

/// Install `Boolean`.
pub fn install_boolean(cx: &mut Context) {
    let proto = cx.intrinsics().boolean_prototype.clone();
    method(cx, &proto, "toString", 0, boolean_to_string);
    method(cx, &proto, "valueOf", 0, boolean_value_of);
    intrinsics::install_constructor(cx, "Boolean", 1, &proto, false, boolean_ctor);
}

fn boolean_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let b = args.first().map(Value::is_truthy).unwrap_or(false);
    wrap(cx, Value::Boolean(b))
}

fn boolean_this(this: &Value) -> VmResult<bool> {
    match wrapped_primitive(this) {
        Some(Value::Boolean(b)) => Ok(b),
        _ => Err(VmError::type_error(
            "Boolean.prototype method called on incompatible receiver",
        )),
    }
}

fn boolean_to_string(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::string(if boolean_this(this)? { "true" } else { "false" }))
}

fn boolean_value_of(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::Boolean(boolean_this(this)?))
}

// ====================================================================
// Number
// ====================================================================

/// Install `Number`.
pub fn install_number(cx: &mut Context) {
    let proto = cx.intrinsics().number_prototype.clone();
    method(cx, &proto, "toString", 1, number_to_string_method);
    method(cx, &proto, "valueOf", 0, number_value_of);
    method(cx, &proto, "toFixed", 1, number_to_fixed);

    let ctor = intrinsics::install_constructor(cx, "Number", 1, &proto, false, number_ctor);
    method(cx, &ctor, "isInteger", 1, number_is_integer);
    method(cx, &ctor, "isFinite", 1, number_is_finite);
    method(cx, &ctor, "isNaN", 1, number_is_nan);
    method(cx, &ctor, "isSafeInteger", 1, number_is_safe_integer);
    frozen_prop(cx, &ctor, "MAX_SAFE_INTEGER", Value::number(9007199254740991.0));
    frozen_prop(cx, &ctor, "MIN_SAFE_INTEGER", Value::number(-9007199254740991.0));
    frozen_prop(cx, &ctor, "MAX_VALUE", Value::number(f64::MAX));
    frozen_prop(cx, &ctor, "MIN_VALUE", Value::number(f64::MIN_POSITIVE));
    frozen_prop(cx, &ctor, "EPSILON", Value::number(f64::EPSILON));
    frozen_prop(cx, &ctor, "POSITIVE_INFINITY", Value::number(f64::INFINITY));
    frozen_prop(cx, &ctor, "NEGATIVE_INFINITY", Value::number(f64::NEG_INFINITY));
    frozen_prop(cx, &ctor, "NaN", Value::number(f64::NAN));
}

fn number_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let n = match args.first() {
        None => 0.0,
        Some(Value::BigInt(b)) => b.to_f64().unwrap_or(f64::NAN),
        Some(v) => convert::to_number(cx, v)?,
    };
    wrap(cx, Value::number(n))
}

fn number_this(this: &Value) -> VmResult<f64> {
    match wrapped_primitive(this) {
        Some(Value::Number(n)) => Ok(n),
        _ => Err(VmError::type_error(
            "Number.prototype method called on incompatible receiver",
        )),
    }
}

fn number_to_string_method(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let n = number_this(this)?;
    let radix = match args.first() {
        None | Some(Value::Undefined) => 10,
        Some(v) => {
            let r = convert::to_number(cx, v)? as u32;
            if !(2..=36).contains(&r) {
                return Err(VmError::range_error(
                    "toString() radix must be between 2 and 36",
                ));
            }
            r
        }
    };
    if radix == 10 {
        return Ok(Value::string(convert::number_to_string(n)));
    }
    Ok(Value::string(format_radix(n, radix)))
}

fn format_radix(n: f64, radix: u32) -> String {
    if n.is_nan() {
        return "NaN".to_string();
    }
    if n.is_infinite() {
        return if n > 0.0 { "Infinity" } else { "-Infinity" }.to_string();
    }
    let negative = n < 0.0;
    let mut int = n.abs().trunc() as u64;
    let mut digits = Vec::new();
    if int == 0 {
        digits.push(b'0');
    }
    while int > 0 {
        let d = (int % radix as u64) as u32;
        digits.push(char::from_digit(d, radix).unwrap_or('0') as u8);
        int /= radix as u64;
    }
    digits.reverse();
    let mut out = String::new();
    if negative {
        out.push('-');
    }
    out.push_str(std::str::from_utf8(&digits).unwrap_or("0"));
    // Fractional digits are approximated to a fixed precision.
    let mut frac = n.abs().fract();
    if frac > 0.0 {
        out.push('.');
        for _ in 0..20 {
            frac *= radix as f64;
            let d = frac.trunc() as u32;
            out.push(char::from_digit(d, radix).unwrap_or('0'));
            frac -= frac.trunc();
            if frac <= 0.0 {
                break;
            }
        }
    }
    out
}

fn number_value_of(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::number(number_this(this)?))
}

fn number_to_fixed(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let n = number_this(this)?;
    let digits = match args.first() {
        None | Some(Value::Undefined) => 0,
        Some(v) => convert::to_number(cx, v)? as i32,
    };
    if !(0..=100).contains(&digits) {
        return Err(VmError::range_error("toFixed() digits argument must be between 0 and 100"));
    }
    Ok(Value::string(format!("{n:.prec$}", prec = digits as usize)))
}

fn number_is_integer(_cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    Ok(Value::Boolean(matches!(
        args.first(),
        Some(Value::Number(n)) if n.is_finite() && n.fract() == 0.0
    )))
}

fn number_is_finite(_cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    Ok(Value::Boolean(matches!(
        args.first(),
        Some(Value::Number(n)) if n.is_finite()
    )))
}

fn number_is_nan(_cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    Ok(Value::Boolean(matches!(
        args.first(),
        Some(Value::Number(n)) if n.is_nan()
    )))
}

fn number_is_safe_integer(_cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    Ok(Value::Boolean(matches!(
        args.first(),
        Some(Value::Number(n))
            if n.is_finite() && n.fract() == 0.0 && n.abs() <= 9007199254740991.0
    )))
}

// ====================================================================
// String
// ====================================================================

/// Install `String`.
pub fn install_string(cx: &mut Context) {
    let proto = cx.intrinsics().string_prototype.clone();
    method(cx, &proto, "toString", 0, string_to_string);
    method(cx, &proto, "valueOf", 0, string_to_string);
    method(cx, &proto, "charAt", 1, string_char_at);
    method(cx, &proto, "charCodeAt", 1, string_char_code_at);
    method(cx, &proto, "indexOf", 1, string_index_of);
    method(cx, &proto, "includes", 1, string_includes);
    method(cx, &proto, "startsWith", 1, string_starts_with);
    method(cx, &proto, "endsWith", 1, string_ends_with);
    method(cx, &proto, "slice", 2, string_slice);
    method(cx, &proto, "substring", 2, string_substring);
    method(cx, &proto, "toUpperCase", 0, string_to_upper);
    method(cx, &proto, "toLowerCase", 0, string_to_lower);
    method(cx, &proto, "trim", 0, string_trim);
    method(cx, &proto, "split", 2, string_split);
    method(cx, &proto, "repeat", 1, string_repeat);
    method(cx, &proto, "concat", 1, string_concat);

    let ctor = intrinsics::install_constructor(cx, "String", 1, &proto, false, string_ctor);
    method(cx, &ctor, "fromCharCode", 1, string_from_char_code);
}

fn string_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = match args.first() {
        None => JsString::new(""),
        Some(Value::Symbol(sym)) if cx.new_target().is_none() => {
            JsString::new(sym.to_display_string())
        }
        Some(v) => convert::to_string_value(cx, v)?,
    };
    wrap(cx, Value::from_js_string(s))
}

fn string_this(cx: &mut Context, this: &Value) -> VmResult<std::sync::Arc<JsString>> {
    match wrapped_primitive(this) {
        Some(Value::String(s)) => Ok(s),
        Some(other) => convert::to_string_value(cx, &other),
        None => Err(VmError::type_error(
            "String.prototype method called on incompatible receiver",
        )),
    }
}

fn string_to_string(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    match wrapped_primitive(this) {
        Some(Value::String(s)) => Ok(Value::from_js_string(s)),
        _ => Err(VmError::type_error(
            "String.prototype.toString requires that 'this' be a String",
        )),
    }
}

fn string_char_at(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = string_this(cx, this)?;
    let i = match args.first() {
        None | Some(Value::Undefined) => 0.0,
        Some(v) => convert::to_number(cx, v)?,
    };
    if i < 0.0 || i.is_nan() {
        return Ok(Value::string(""));
    }
    match s.code_unit_at(i as usize) {
        Some(unit) => Ok(Value::from_js_string(JsString::from_utf16(&[unit]))),
        None => Ok(Value::string("")),
    }
}

fn string_char_code_at(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = string_this(cx, this)?;
    let i = match args.first() {
        None | Some(Value::Undefined) => 0.0,
        Some(v) => convert::to_number(cx, v)?,
    };
    if i < 0.0 || i.is_nan() {
        return Ok(Value::number(f64::NAN));
    }
    match s.code_unit_at(i as usize) {
        Some(unit) => Ok(Value::number(unit as f64)),
        None => Ok(Value::number(f64::NAN)),
    }
}

fn search_arg(cx: &mut Context, args: &[Value]) -> VmResult<String> {
    Ok(
        convert::to_string_value(cx, args.first().unwrap_or(&Value::Undefined))?
            .as_str()
            .to_string(),
    )
}

fn string_index_of(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = string_this(cx, this)?;
    let needle = search_arg(cx, args)?;
    // Positions are reported in UTF-16 units.
    let units: Vec<u16> = s.as_str().encode_utf16().collect();
    let needle_units: Vec<u16> = needle.encode_utf16().collect();
    if needle_units.is_empty() {
        return Ok(Value::number(0.0));
    }
    let pos = units
        .windows(needle_units.len())
        .position(|w| w == needle_units.as_slice());
    Ok(Value::number(pos.map(|p| p as f64).unwrap_or(-1.0)))
}

fn string_includes(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = string_this(cx, this)?;
    let needle = search_arg(cx, args)?;
    Ok(Value::Boolean(s.as_str().contains(&needle)))
}

fn string_starts_with(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = string_this(cx, this)?;
    let needle = search_arg(cx, args)?;
    Ok(Value::Boolean(s.as_str().starts_with(&needle)))
}

fn string_ends_with(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = string_this(cx, this)?;
    let needle = search_arg(cx, args)?;
    Ok(Value::Boolean(s.as_str().ends_with(&needle)))
}

fn utf16_relative(len: usize, v: Option<&Value>, default: f64, cx: &mut Context) -> VmResult<usize> {
    let n = match v {
        None | Some(Value::Undefined) => default,
        Some(v) => convert::to_number(cx, v)?,
    };
    if n.is_nan() {
        return Ok(0);
    }
    Ok(if n < 0.0 {
        (len as f64 + n).max(0.0) as usize
    } else {
        n.min(len as f64) as usize
    })
}

fn string_slice(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = string_this(cx, this)?;
    let len = s.len_utf16();
    let start = utf16_relative(len, args.first(), 0.0, cx)?;
    let end = utf16_relative(len, args.get(1), len as f64, cx)?;
    Ok(Value::from_js_string(s.substring_utf16(start, end.max(start))))
}

fn string_substring(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = string_this(cx, this)?;
    let len = s.len_utf16();
    let a = utf16_relative(len, args.first(), 0.0, cx)?;
    let b = utf16_relative(len, args.get(1), len as f64, cx)?;
    let (start, end) = if a <= b { (a, b) } else { (b, a) };
    Ok(Value::from_js_string(s.substring_utf16(start, end)))
}

fn string_to_upper(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let s = string_this(cx, this)?;
    Ok(Value::string(s.as_str().to_uppercase()))
}

fn string_to_lower(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let s = string_this(cx, this)?;
    Ok(Value::string(s.as_str().to_lowercase()))
}

fn string_trim(cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let s = string_this(cx, this)?;
    Ok(Value::string(s.as_str().trim()))
}

fn string_split(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = string_this(cx, this)?;
    let parts: Vec<Value> = match args.first() {
        None | Some(Value::Undefined) => vec![Value::from_js_string(s)],
        Some(separator) => {
            let sep = convert::to_string_value(cx, separator)?;
            if sep.is_empty() {
                s.as_str()
                    .encode_utf16()
                    .map(|u| Value::from_js_string(JsString::from_utf16(&[u])))
                    .collect()
            } else {
                s.as_str()
                    .split(sep.as_str())
                    .map(Value::string)
                    .collect()
            }
        }
    };
    Ok(Value::Object(crate::array::new_array(cx, parts)))
}

fn string_repeat(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = string_this(cx, this)?;
    let count = convert::to_number(cx, args.first().unwrap_or(&Value::Undefined))?;
    if count < 0.0 || count.is_infinite() {
        return Err(VmError::range_error("Invalid count value"));
    }
    Ok(Value::string(s.as_str().repeat(count as usize)))
}

fn string_concat(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let mut out = string_this(cx, this)?.as_str().to_string();
    for arg in args {
        out.push_str(convert::to_string_value(cx, arg)?.as_str());
    }
    Ok(Value::string(out))
}

fn string_from_char_code(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let mut units = Vec::with_capacity(args.len());
    for arg in args {
        units.push(convert::to_number(cx, arg)? as u16);
    }
    Ok(Value::from_js_string(JsString::from_utf16(&units)))
}

// ====================================================================
// Symbol
// ====================================================================

/// Install `Symbol`.
pub fn install_symbol(cx: &mut Context) {
    let proto = cx.intrinsics().symbol_prototype.clone();
    method(cx, &proto, "toString", 0, symbol_to_string);
    method(cx, &proto, "valueOf", 0, symbol_value_of);
    getter(cx, &proto, "description", symbol_description);
    let to_primitive = cx.well_known().to_primitive.clone();
    symbol_method(
        cx,
        &proto,
        to_primitive,
        "[Symbol.toPrimitive]",
        1,
        symbol_value_of,
    );

    let ctor = intrinsics::install_constructor(cx, "Symbol", 0, &proto, false, symbol_ctor);
    method(cx, &ctor, "for", 1, symbol_for);
    method(cx, &ctor, "keyFor", 1, symbol_key_for);

    let well_known = cx.well_known().clone();
    let pairs: [(&str, std::sync::Arc<crate::symbol::JsSymbol>); 15] = [
        ("iterator", well_known.iterator),
        ("asyncIterator", well_known.async_iterator),
        ("toStringTag", well_known.to_string_tag),
        ("toPrimitive", well_known.to_primitive),
        ("hasInstance", well_known.has_instance),
        ("isConcatSpreadable", well_known.is_concat_spreadable),
        ("species", well_known.species),
        ("match", well_known.r#match),
        ("matchAll", well_known.match_all),
        ("replace", well_known.replace),
        ("search", well_known.search),
        ("split", well_known.split),
        ("unscopables", well_known.unscopables),
        ("dispose", well_known.dispose),
        ("asyncDispose", well_known.async_dispose),
    ];
    for (name, sym) in pairs {
        let key = PropertyKey::Atom(cx.atom(name));
        ctor.insert_property(
            key,
            Property::data_with(Value::Symbol(sym), false, false, false),
        );
    }
}

fn symbol_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    if cx.new_target().is_some() {
        return Err(VmError::type_error("Symbol is not a constructor"));
    }
    let description = match args.first() {
        None | Some(Value::Undefined) => None,
        Some(v) => Some(convert::to_string_value(cx, v)?),
    };
    let sym = cx.runtime().symbols().create(description);
    Ok(Value::Symbol(sym))
}

fn symbol_this(this: &Value) -> VmResult<std::sync::Arc<crate::symbol::JsSymbol>> {
    match wrapped_primitive(this) {
        Some(Value::Symbol(s)) => Ok(s),
        _ => Err(VmError::type_error(
            "Symbol.prototype method called on incompatible receiver",
        )),
    }
}

fn symbol_to_string(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::string(symbol_this(this)?.to_display_string()))
}

fn symbol_value_of(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::Symbol(symbol_this(this)?))
}

fn symbol_description(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    match &symbol_this(this)?.description {
        Some(d) => Ok(Value::from_js_string(d.clone())),
        None => Ok(Value::Undefined),
    }
}

fn symbol_for(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let key = convert::to_string_value(cx, args.first().unwrap_or(&Value::Undefined))?;
    Ok(Value::Symbol(cx.runtime().symbols().for_key(key.as_str())))
}

fn symbol_key_for(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let Some(Value::Symbol(sym)) = args.first() else {
        return Err(VmError::type_error("Symbol.keyFor requires a symbol"));
    };
    match cx.runtime().symbols().key_for(sym) {
        Some(key) => Ok(Value::string(key)),
        None => Ok(Value::Undefined),
    }
}

// ====================================================================
// BigInt
// ====================================================================

/// Install `BigInt`.
pub fn install_bigint(cx: &mut Context) {
    let proto = cx.intrinsics().bigint_prototype.clone();
    method(cx, &proto, "toString", 1, bigint_to_string);
    method(cx, &proto, "valueOf", 0, bigint_value_of);
    intrinsics::install_constructor(cx, "BigInt", 1, &proto, false, bigint_ctor);
}

fn bigint_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    if cx.new_target().is_some() {
        return Err(VmError::type_error("BigInt is not a constructor"));
    }
    match args.first() {
        Some(Value::Number(n)) => {
            if !n.is_finite() || n.fract() != 0.0 {
                return Err(VmError::range_error(
                    "The number supplied is not a safe integer",
                ));
            }
            Ok(Value::bigint(BigInt::from(*n as i128)))
        }
        Some(v) => Ok(Value::BigInt(convert::to_bigint(cx, v)?)),
        None => Err(VmError::type_error("Cannot convert undefined to a BigInt")),
    }
}

fn bigint_this(this: &Value) -> VmResult<std::sync::Arc<BigInt>> {
    match wrapped_primitive(this) {
        Some(Value::BigInt(b)) => Ok(b),
        _ => Err(VmError::type_error(
            "BigInt.prototype method called on incompatible receiver",
        )),
    }
}

fn bigint_to_string(cx: &mut Context, this: &Value, args: &[Value]) -> VmResult<Value> {
    let b = bigint_this(this)?;
    let radix = match args.first() {
        None | Some(Value::Undefined) => 10,
        Some(v) => {
            let r = convert::to_number(cx, v)? as u32;
            if !(2..=36).contains(&r) {
                return Err(VmError::range_error(
                    "toString() radix must be between 2 and 36",
                ));
            }
            r
        }
    };
    Ok(Value::string(b.to_str_radix(radix)))
}

fn bigint_value_of(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::BigInt(bigint_this(this)?))
}
