//! Time builtins.
//!
//! Timestamps are nanoseconds since the Unix epoch, in UTC.

use crate::args;
use crate::{BuiltinError, BuiltinResult};
use chrono::{DateTime, Datelike, NaiveDate, TimeDelta, Utc};
use serde_json::Value;

fn out_of_range(name: &str) -> BuiltinError {
    BuiltinError::invalid(name, "timestamp out of range")
}

/// `time.now_ns()`.
///
/// # Errors
///
/// Returns [`BuiltinError::Invalid`] if the clock is outside the
/// nanosecond-representable range.
pub fn now_ns(_args: &[Value]) -> BuiltinResult {
    let ns = Utc::now()
        .timestamp_nanos_opt()
        .ok_or_else(|| out_of_range("time.now_ns"))?;
    Ok(Some(Value::from(ns)))
}

/// `time.parse_rfc3339_ns(s)`.
///
/// # Errors
///
/// Returns [`BuiltinError::Invalid`] for malformed or out-of-range input.
pub fn parse_rfc3339_ns(args: &[Value]) -> BuiltinResult {
    const NAME: &str = "time.parse_rfc3339_ns";
    let s = args::string(NAME, args, 0)?;
    let ns = DateTime::parse_from_rfc3339(s)
        .map_err(|e| BuiltinError::invalid(NAME, e.to_string()))?
        .timestamp_nanos_opt()
        .ok_or_else(|| out_of_range(NAME))?;
    Ok(Some(Value::from(ns)))
}

/// `time.date(ns)`: `[year, month, day]`, with a 1-based month.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for a non-integer operand.
pub fn date(args: &[Value]) -> BuiltinResult {
    let ns = args::integer("time.date", args, 0)?;
    let dt = DateTime::from_timestamp_nanos(ns);
    Ok(Some(Value::Array(vec![
        Value::from(dt.year()),
        Value::from(dt.month()),
        Value::from(dt.day()),
    ])))
}

/// `time.add_date(ns, years, months, days)`.
///
/// Overflowing months and days roll forward into the following period, so
/// January 31st plus one month lands on March 3rd (2nd in leap years).
///
/// # Errors
///
/// Returns [`BuiltinError::Invalid`] when the result is out of range.
pub fn add_date(args: &[Value]) -> BuiltinResult {
    const NAME: &str = "time.add_date";
    let ns = args::integer(NAME, args, 0)?;
    let years = args::integer(NAME, args, 1)?;
    let months = args::integer(NAME, args, 2)?;
    let days = args::integer(NAME, args, 3)?;

    let shifted = shift(ns, years, months, days).ok_or_else(|| out_of_range(NAME))?;
    Ok(Some(Value::from(shifted)))
}

fn shift(ns: i64, years: i64, months: i64, days: i64) -> Option<i64> {
    let dt = DateTime::from_timestamp_nanos(ns);

    let total_months = i64::from(dt.year())
        .checked_mul(12)?
        .checked_add(i64::from(dt.month0()))?
        .checked_add(years.checked_mul(12)?)?
        .checked_add(months)?;
    let year = i32::try_from(total_months.div_euclid(12)).ok()?;
    let month = u32::try_from(total_months.rem_euclid(12)).ok()? + 1;

    let first = NaiveDate::from_ymd_opt(year, month, 1)?;
    let offset = i64::from(dt.day0()).checked_add(days)?;
    let day = first.checked_add_signed(TimeDelta::try_days(offset)?)?;

    day.and_time(dt.time()).and_utc().timestamp_nanos_opt()
}
