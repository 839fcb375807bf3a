//! The `Math` namespace

use std::sync::atomic::{AtomicU64, Ordering};

use crate::context::Context;
use crate::convert;
use crate::error::VmResult;
use crate::intrinsics::{frozen_prop, install_namespace, method};
use crate::value::Value;

/// Install `Math`.
pub fn install(cx: &mut Context) {
    let math = install_namespace(cx, "Math");
    frozen_prop(cx, &math, "PI", Value::number(std::f64::consts::PI));
    frozen_prop(cx, &math, "E", Value::number(std::f64::consts::E));
    frozen_prop(cx, &math, "LN2", Value::number(std::f64::consts::LN_2));
    frozen_prop(cx, &math, "LN10", Value::number(std::f64::consts::LN_10));
    frozen_prop(cx, &math, "LOG2E", Value::number(std::f64::consts::LOG2_E));
    frozen_prop(cx, &math, "LOG10E", Value::number(std::f64::consts::LOG10_E));
    frozen_prop(cx, &math, "SQRT2", Value::number(std::f64::consts::SQRT_2));
    frozen_prop(
        cx,
        &math,
        "SQRT1_2",
        Value::number(std::f64::consts::FRAC_1_SQRT_2),
    );

    method(cx, &math, "abs", 1, |cx, _t, a| unary(cx, a, f64::abs));
    method(cx, &math, "floor", 1, |cx, _t, a| unary(cx, a, f64::floor));
    method(cx, &math, "ceil", 1, |cx, _t, a| unary(cx, a, f64::ceil));
    method(cx, &math, "round", 1, |cx, _t, a| unary(cx, a, js_round));
    method(cx, &math, "trunc", 1, |cx, _t, a| unary(cx, a, f64::trunc));
    method(cx, &math, "sign", 1, |cx, _t, a| unary(cx, a, js_sign));
    method(cx, &math, "sqrt", 1, |cx, _t, a| unary(cx, a, f64::sqrt));
    method(cx, &math, "cbrt", 1, |cx, _t, a| unary(cx, a, f64::cbrt));
    method(cx, &math, "exp", 1, |cx, _t, a| unary(cx, a, f64::exp));
    method(cx, &math, "log", 1, |cx, _t, a| unary(cx, a, f64::ln));
    method(cx, &math, "log2", 1, |cx, _t, a| unary(cx, a, f64::log2));
    method(cx, &math, "log10", 1, |cx, _t, a| unary(cx, a, f64::log10));
    method(cx, &math, "sin", 1, |cx, _t, a| unary(cx, a, f64::sin));
    method(cx, &math, "cos", 1, |cx, _t, a| unary(cx, a, f64::cos));
    method(cx, &math, "tan", 1, |cx, _t, a| unary(cx, a, f64::tan));
    method(cx, &math, "asin", 1, |cx, _t, a| unary(cx, a, f64::asin));
    method(cx, &math, "acos", 1, |cx, _t, a| unary(cx, a, f64::acos));
    method(cx, &math, "atan", 1, |cx, _t, a| unary(cx, a, f64::atan));
    method(cx, &math, "atan2", 2, math_atan2);
    method(cx, &math, "pow", 2, math_pow);
    method(cx, &math, "hypot", 2, math_hypot);
    method(cx, &math, "min", 2, math_min);
    method(cx, &math, "max", 2, math_max);
    method(cx, &math, "random", 0, math_random);
}

fn unary(cx: &mut Context, args: &[Value], f: impl Fn(f64) -> f64) -> VmResult<Value> {
    let n = convert::to_number(cx, args.first().unwrap_or(&Value::Undefined))?;
    Ok(Value::number(f(n)))
}

/// `Math.round` rounds half toward +Infinity, unlike `f64::round`.
fn js_round(n: f64) -> f64 {
    if n.is_nan() || n.is_infinite() {
        return n;
    }
    let floor = n.floor();
    if n - floor >= 0.5 { floor + 1.0 } else { floor }
}

fn js_sign(n: f64) -> f64 {
    if n.is_nan() || n == 0.0 { n } else if n > 0.0 { 1.0 } else { -1.0 }
}

fn math_atan2(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let y = convert::to_number(cx, args.first().unwrap_or(&Value::Undefined))?;
    let x = convert::to_number(cx, args.get(1).unwrap_or(&Value::Undefined))?;
    Ok(Value::number(y.atan2(x)))
}

fn math_pow(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let base = convert::to_number(cx, args.first().unwrap_or(&Value::Undefined))?;
    let exp = convert::to_number(cx, args.get(1).unwrap_or(&Value::Undefined))?;
    Ok(Value::number(base.powf(exp)))
}

fn math_hypot(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let mut sum = 0.0;
    for arg in args {
        let n = convert::to_number(cx, arg)?;
        sum += n * n;
    }
    Ok(Value::number(sum.sqrt()))
}

fn math_min(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let mut best = f64::INFINITY;
    for arg in args {
        let n = convert::to_number(cx, arg)?;
        if n.is_nan() {
            return Ok(Value::number(f64::NAN));
        }
        if n < best || (n == 0.0 && best == 0.0 && n.is_sign_negative()) {
            best = n;
        }
    }
    Ok(Value::number(best))
}

fn math_max(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let mut best = f64::NEG_INFINITY;
    for arg in args {
        let n = convert::to_number(cx, arg)?;
        if n.is_nan() {
            return Ok(Value::number(f64::NAN));
        }
        if n > best || (n == 0.0 && best == 0.0 && best.is_sign_negative()) {
            best = n;
        }
    }
    Ok(Value::number(best))
}

/// xorshift64* seeded from the clock; statistically fine for `Math.random`.
fn math_random(_cx: &mut Context, _this: &Value, _args: &[Value]) -> VmResult<Value> {
    static STATE: AtomicU64 = AtomicU64::new(0);
    let mut s = STATE.load(Ordering::Relaxed);
    if s == 0 {
        s = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0x9E3779B97F4A7C15)
            | 1;
    }
    s ^= s >> 12;
    s ^= s << 25;
    s ^= s >> 27;
    STATE.store(s, Ordering::Relaxed);
    let bits = s.wrapping_mul(0x2545F4914F6CDD1D) >> 11;
    Ok(Value::number(bits as f64 / (1u64 << 53) as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_js_round_half_up() {
        assert_eq!(js_round(0.5), 1.0);
        assert_eq!(js_round(-0.5), 0.0);
        assert_eq!(js_round(2.4), 2.0);
        assert_eq!(js_round(-2.6), -3.0);
    }

    #[test]
    fn test_js_sign() {
        assert_eq!(js_sign(-3.0), -1.0);
        assert_eq!(js_sign(3.0), 1.0);
        assert_eq!(js_sign(0.0), 0.0);
        assert!(js_sign(f64::NAN).is_nan());
    }
}
