//! `Date` — minimal surface over `chrono`
//!
//! The time value is milliseconds since the epoch, NaN when invalid.
//! `Date.parse` accepts ISO-8601 only; the legacy lenient formats are a
//! compatibility surface, not implemented here.

use chrono::{DateTime, Datelike, TimeZone, Timelike, Utc};
use std::cell::Cell;

use crate::context::Context;
use crate::convert;
use crate::error::{VmError, VmResult};
use crate::intrinsics::{self, method};
use crate::object::{JsObject, ObjectKind};
use crate::value::Value;

/// Install `Date`.
pub fn install(cx: &mut Context) {
    let proto = cx.intrinsics().date_prototype.clone();
    method(cx, &proto, "getTime", 0, date_get_time);
    method(cx, &proto, "valueOf", 0, date_get_time);
    method(cx, &proto, "toISOString", 0, date_to_iso);
    method(cx, &proto, "toString", 0, date_to_string);
    method(cx, &proto, "getFullYear", 0, date_get_full_year);
    method(cx, &proto, "getMonth", 0, date_get_month);
    method(cx, &proto, "getDate", 0, date_get_date);
    method(cx, &proto, "getHours", 0, date_get_hours);
    method(cx, &proto, "getMinutes", 0, date_get_minutes);
    method(cx, &proto, "getSeconds", 0, date_get_seconds);
    method(cx, &proto, "getMilliseconds", 0, date_get_milliseconds);

    let ctor = intrinsics::install_constructor(cx, "Date", 7, &proto, false, date_ctor);
    method(cx, &ctor, "now", 0, date_now);
    method(cx, &ctor, "parse", 1, date_parse);
    method(cx, &ctor, "UTC", 7, date_utc);
}

fn now_millis() -> f64 {
    Utc::now().timestamp_millis() as f64
}

fn date_ctor(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    if cx.new_target().is_none() {
        // Called as a function: the current time as a string.
        return Ok(Value::string(
            render_date(now_millis()).unwrap_or_else(|| "Invalid Date".to_string()),
        ));
    }
    let millis = match args.len() {
        0 => now_millis(),
        1 => match &args[0] {
            Value::String(s) => parse_iso(s.as_str()),
            v => convert::to_number(cx, v)?,
        },
        _ => components_to_millis(cx, args, 1900)?,
    };
    Ok(Value::Object(JsObject::new(
        ObjectKind::Date(Cell::new(millis)),
        Some(cx.intrinsics().date_prototype.clone()),
    )))
}

fn components_to_millis(cx: &mut Context, args: &[Value], two_digit_base: i32) -> VmResult<f64> {
    let mut parts = [0.0f64; 7];
    parts[2] = 1.0; // day defaults to 1
    for (i, arg) in args.iter().take(7).enumerate() {
        parts[i] = convert::to_number(cx, arg)?;
    }
    if parts.iter().any(|p| p.is_nan()) {
        return Ok(f64::NAN);
    }
    let mut year = parts[0] as i32;
    if (0..=99).contains(&year) {
        year += two_digit_base;
    }
    let date = Utc
        .with_ymd_and_hms(
            year,
            parts[1] as u32 + 1,
            parts[2] as u32,
            parts[3] as u32,
            parts[4] as u32,
            parts[5] as u32,
        )
        .single();
    Ok(match date {
        Some(d) => d.timestamp_millis() as f64 + parts[6],
        None => f64::NAN,
    })
}

fn date_now(_cx: &mut Context, _this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::number(now_millis()))
}

fn parse_iso(s: &str) -> f64 {
    let t = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(t) {
        return dt.timestamp_millis() as f64;
    }
    // Date-only forms.
    if let Ok(date) = chrono::NaiveDate::parse_from_str(t, "%Y-%m-%d") {
        let dt = date.and_hms_opt(0, 0, 0).expect("midnight is valid");
        return Utc.from_utc_datetime(&dt).timestamp_millis() as f64;
    }
    f64::NAN
}

fn date_parse(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    let s = convert::to_string_value(cx, args.first().unwrap_or(&Value::Undefined))?;
    Ok(Value::number(parse_iso(s.as_str())))
}

fn date_utc(cx: &mut Context, _this: &Value, args: &[Value]) -> VmResult<Value> {
    if args.is_empty() {
        return Ok(Value::number(f64::NAN));
    }
    Ok(Value::number(components_to_millis(cx, args, 1900)?))
}

fn this_millis(this: &Value, op: &str) -> VmResult<f64> {
    match this {
        Value::Object(obj) => match obj.kind() {
            ObjectKind::Date(t) => Ok(t.get()),
            _ => Err(VmError::type_error(format!(
                "Date.prototype.{op} called on incompatible receiver"
            ))),
        },
        _ => Err(VmError::type_error(format!(
            "Date.prototype.{op} called on incompatible receiver"
        ))),
    }
}

fn as_datetime(millis: f64) -> Option<DateTime<Utc>> {
    if millis.is_nan() {
        return None;
    }
    Utc.timestamp_millis_opt(millis as i64).single()
}

fn render_date(millis: f64) -> Option<String> {
    as_datetime(millis).map(|dt| dt.format("%a %b %d %Y %H:%M:%S GMT+0000").to_string())
}

fn date_get_time(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    Ok(Value::number(this_millis(this, "getTime")?))
}

fn date_to_iso(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let millis = this_millis(this, "toISOString")?;
    match as_datetime(millis) {
        Some(dt) => Ok(Value::string(
            dt.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        )),
        None => Err(VmError::range_error("Invalid time value")),
    }
}

fn date_to_string(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
    let millis = this_millis(this, "toString")?;
    Ok(Value::string(
        render_date(millis).unwrap_or_else(|| "Invalid Date".to_string()),
    ))
}

macro_rules! component_getter {
    ($fn_name:ident, $op:literal, $extract:expr) => {
        fn $fn_name(_cx: &mut Context, this: &Value, _args: &[Value]) -> VmResult<Value> {
            let millis = this_millis(this, $op)?;
            Ok(match as_datetime(millis) {
                Some(dt) => Value::number($extract(dt)),
                None => Value::number(f64::NAN),
            })
        }
    };
}

component_getter!(date_get_full_year, "getFullYear", |dt: DateTime<Utc>| dt
    .year() as f64);
component_getter!(date_get_month, "getMonth", |dt: DateTime<Utc>| {
    (dt.month0()) as f64
});
component_getter!(date_get_date, "getDate", |dt: DateTime<Utc>| dt.day() as f64);
component_getter!(date_get_hours, "getHours", |dt: DateTime<Utc>| dt.hour() as f64);
component_getter!(date_get_minutes, "getMinutes", |dt: DateTime<Utc>| dt
    .minute() as f64);
component_getter!(date_get_seconds, "getSeconds", |dt: DateTime<Utc>| dt
    .second() as f64);
component_getter!(
    date_get_milliseconds,
    "getMilliseconds",
    |dt: DateTime<Utc>| (dt.timestamp_subsec_millis()) as f64
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_iso() {
        assert_eq!(parse_iso("1970-01-01T00:00:00Z"), 0.0);
        assert_eq!(parse_iso("1970-01-02"), 86_400_000.0);
        assert!(parse_iso("next tuesday").is_nan());
    }
}
