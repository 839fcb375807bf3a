//! Global helper functions
//!
//! `eval`, the numeric parsers, the URI codecs, and the annex-B
//! `escape`/`unescape` pair, plus `queueMicrotask`.

use crate::context::Context;
use crate::convert;
use crate::error::{VmError, VmResult};
use crate::intrinsics::{data_prop, install_namespace, method};
use crate::value::Value;

/// Install the global functions.
pub fn install(cx: &mut Context) {
    let global = cx.global().clone();
    method(cx, &global, "eval", 1, global_eval);
    method(cx, &global, "isFinite", 1, global_is_finite);
    method(cx, &global, "isNaN", 1, global_is_nan);
    method(cx, &global, "parseFloat", 1, global_parse_float);
    method(cx, &global, "parseInt", 2, global_parse_int);
    method(cx, &global, "decodeURI", 1, decode_uri);
    method(cx, &global, "decodeURIComponent", 1, decode_uri_component);
    method(cx, &global, "encodeURI", 1, encode_uri);
    method(cx, &global, "encodeURIComponent", 1, encode_uri_component);
    method(cx, &global, "escape", 1, global_escape);
    method(cx, &global, "unescape", 1, global_unescape);
    method(cx, &global, "queueMicrotask", 1, queue_microtask);
}

/// Install the minimal `Intl` namespace stub (the collators and formatters
/// are collaborators).
pub fn install_intl_stub(cx: &mut Context) {
    let intl = install_namespace(cx, "Intl");
    method(cx, &intl, "getCanonicalLocales", 1, intl_get_canonical_locales);
    data_prop(cx, &intl, "supportedValuesOf", Value::Undefined);
}

fn intl_get_canonical_locales(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let locales = match args.first() {
        None | Some(Value::Undefined) => Vec::new(),
        Some(Value::String(s)) => vec![Value::from_js_string(s.clone())],
        Some(v) => crate::interpreter::iterate_to_vec(cx, v)?,
    };
    Ok(Value::Object(crate::array::new_array(cx, locales)))
}

/// Indirect `eval`: compiles as a script against the global environment.
fn global_eval(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let Some(Value::String(source)) = args.first() else {
        // Non-string arguments are returned unchanged.
        return Ok(args.first().cloned().unwrap_or(Value::Undefined));
    };
    let source = source.as_str().to_string();
    cx.eval_direct(&source, "<eval>", Value::Object(cx.global().clone()))
}

fn global_is_finite(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let n = convert::to_number(cx, args.first().unwrap_or(&Value::Undefined))?;
    Ok(Value::Boolean(n.is_finite()))
}

fn global_is_nan(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let n = convert::to_number(cx, args.first().unwrap_or(&Value::Undefined))?;
    Ok(Value::Boolean(n.is_nan()))
}

fn global_parse_float(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = convert::to_string_value(cx, args.first().unwrap_or(&Value::Undefined))?;
    Ok(Value::number(parse_float_prefix(s.as_str())))
}

/// Longest prefix of `s` that parses as a decimal literal.
fn parse_float_prefix(s: &str) -> f64 {
    let t = s.trim_start();
    if t.starts_with("Infinity") || t.starts_with("+Infinity") {
        return f64::INFINITY;
    }
    if t.starts_with("-Infinity") {
        return f64::NEG_INFINITY;
    }
    let bytes = t.as_bytes();
    let mut end = 0;
    let mut seen_dot = false;
    let mut seen_e = false;
    let mut seen_digit = false;
    while end < bytes.len() {
        match bytes[end] {
            b'0'..=b'9' => seen_digit = true,
            b'+' | b'-' if end == 0 => {}
            b'+' | b'-' if matches!(bytes[end - 1], b'e' | b'E') => {}
            b'.' if !seen_dot && !seen_e => seen_dot = true,
            b'e' | b'E' if !seen_e && seen_digit => seen_e = true,
            _ => break,
        }
        end += 1;
    }
    // Trim a trailing exponent marker with no digits.
    while end > 0 && matches!(bytes[end - 1], b'e' | b'E' | b'+' | b'-') {
        end -= 1;
    }
    t[..end].parse::<f64>().unwrap_or(f64::NAN)
}

fn global_parse_int(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = convert::to_string_value(cx, args.first().unwrap_or(&Value::Undefined))?;
    let radix_arg = match args.get(1) {
        None | Some(Value::Undefined) => 0,
        Some(v) => convert::to_int32(convert::to_number(cx, v)?),
    };
    Ok(Value::number(parse_int_impl(s.as_str(), radix_arg)))
}

fn parse_int_impl(s: &str, radix: i32) -> f64 {
    let mut t = s.trim_start();
    let mut sign = 1.0;
    if let Some(rest) = t.strip_prefix('-') {
        sign = -1.0;
        t = rest;
    } else if let Some(rest) = t.strip_prefix('+') {
        t = rest;
    }

    let mut radix = radix;
    if radix == 0 {
        if t.starts_with("0x") || t.starts_with("0X") {
            radix = 16;
            t = &t[2..];
        } else {
            radix = 10;
        }
    } else if radix == 16 && (t.starts_with("0x") || t.starts_with("0X")) {
        t = &t[2..];
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }

    let mut value = 0.0f64;
    let mut any = false;
    for c in t.chars() {
        let Some(digit) = c.to_digit(radix as u32) else {
            break;
        };
        value = value * radix as f64 + digit as f64;
        any = true;
    }
    if !any { f64::NAN } else { sign * value }
}

// ---- URI codecs ----

const URI_UNRESERVED: &str =
    "ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_.!~*'()";
const URI_RESERVED: &str = ";/?:@&=+$,#";

fn encode_with(s: &str, keep: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if keep.contains(c) {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for byte in c.encode_utf8(&mut buf).as_bytes() {
                out.push_str(&format!("%{byte:02X}"));
            }
        }
    }
    out
}

fn decode_with(s: &str, keep_encoded: &str) -> VmResult<String> {
    let bytes = s.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            if i + 2 >= bytes.len() + 1 {
                return Err(VmError::uri_error("URI malformed"));
            }
            let hex = s
                .get(i + 1..i + 3)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| VmError::uri_error("URI malformed"))?;
            // Reserved characters stay percent-encoded for decodeURI.
            if keep_encoded.contains(hex as char) {
                decoded.extend_from_slice(&bytes[i..i + 3]);
            } else {
                decoded.push(hex);
            }
            i += 3;
        } else {
            decoded.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(decoded).map_err(|_| VmError::uri_error("URI malformed"))
}

fn encode_uri(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = convert::to_string_value(cx, args.first().unwrap_or(&Value::Undefined))?;
    let keep: String = format!("{URI_UNRESERVED}{URI_RESERVED}");
    Ok(Value::string(encode_with(s.as_str(), &keep)))
}

fn encode_uri_component(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = convert::to_string_value(cx, args.first().unwrap_or(&Value::Undefined))?;
    Ok(Value::string(encode_with(s.as_str(), URI_UNRESERVED)))
}

fn decode_uri(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = convert::to_string_value(cx, args.first().unwrap_or(&Value::Undefined))?;
    Ok(Value::string(decode_with(s.as_str(), URI_RESERVED)?))
}

fn decode_uri_component(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = convert::to_string_value(cx, args.first().unwrap_or(&Value::Undefined))?;
    Ok(Value::string(decode_with(s.as_str(), "")?))
}

// ---- Annex B escape/unescape ----

fn global_escape(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = convert::to_string_value(cx, args.first().unwrap_or(&Value::Undefined))?;
    let mut out = String::new();
    for unit in s.as_str().encode_utf16() {
        let c = unit as u32;
        if c < 128
            && (char::from_u32(c)
                .map(|ch| ch.is_ascii_alphanumeric() || "@*_+-./".contains(ch))
                .unwrap_or(false))
        {
            out.push(char::from_u32(c).expect("ascii"));
        } else if c < 256 {
            out.push_str(&format!("%{c:02X}"));
        } else {
            out.push_str(&format!("%u{c:04X}"));
        }
    }
    Ok(Value::string(out))
}

fn global_unescape(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = convert::to_string_value(cx, args.first().unwrap_or(&Value::Undefined))?;
    let chars: Vec<char> = s.as_str().chars().collect();
    let mut units: Vec<u16> = Vec::with_capacity(chars.len());
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == '%' {
            if i + 5 < chars.len() + 1 && chars.get(i + 1) == Some(&'u') {
                if let Some(hex) = chars.get(i + 2..i + 6) {
                    let hex: String = hex.iter().collect();
                    if let Ok(unit) = u16::from_str_radix(&hex, 16) {
                        units.push(unit);
                        i += 6;
                        continue;
                    }
                }
            }
            if let Some(hex) = chars.get(i + 1..i + 3) {
                let hex: String = hex.iter().collect();
                if let Ok(unit) = u8::from_str_radix(&hex, 16) {
                    units.push(unit as u16);
                    i += 3;
                    continue;
                }
            }
        }
        let mut buf = [0u16; 2];
        units.extend_from_slice(chars[i].encode_utf16(&mut buf));
        i += 1;
    }
    Ok(Value::from_js_string(crate::string::JsString::from_utf16(
        &units,
    )))
}

fn queue_microtask(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let job = args.first().cloned().unwrap_or(Value::Undefined);
    if !job.is_callable() {
        return Err(VmError::type_error(
            "The callback provided as parameter 1 is not a function",
        ));
    }
    cx.enqueue_microtask(Box::new(move |cx: &mut Context| {
        if let Err(e) = crate::interpreter::call_value(cx, &job, &Value::Undefined, &[]) {
            let error = cx.make_error_value(&e);
            cx.report_unhandled_rejection(error);
        }
    }));
    Ok(Value::Undefined)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_impl() {
        assert_eq!(parse_int_impl("42", 0), 42.0);
        assert_eq!(parse_int_impl("  -17px", 0), -17.0);
        assert_eq!(parse_int_impl("0x1F", 0), 31.0);
        assert_eq!(parse_int_impl("1F", 16), 31.0);
        assert_eq!(parse_int_impl("101", 2), 5.0);
        assert!(parse_int_impl("zz", 10).is_nan());
        assert!(parse_int_impl("5", 1).is_nan());
    }

    #[test]
    fn test_parse_float_prefix() {
        assert_eq!(parse_float_prefix("3.14abc"), 3.14);
        assert_eq!(parse_float_prefix("  1e3"), 1000.0);
        assert_eq!(parse_float_prefix("-Infinity"), f64::NEG_INFINITY);
        assert!(parse_float_prefix("abc").is_nan());
        assert_eq!(parse_float_prefix("7e"), 7.0);
    }

    #[test]
    fn test_uri_roundtrip() {
        let keep: String = format!("{URI_UNRESERVED}{URI_RESERVED}");
        let encoded = encode_with("a b/ц", &keep);
        assert_eq!(encoded, "a%20b/%D1%86");
        assert_eq!(decode_with(&encoded, "").unwrap(), "a b/ц");
    }
}
