//! Operand extraction shared by the builtin implementations.

use crate::BuiltinError;
use serde_json::{Number, Value};

fn type_error(name: &str, expected: &'static str, position: usize) -> BuiltinError {
    BuiltinError::Type {
        name: name.to_string(),
        expected,
        position,
    }
}

pub(crate) fn value<'a>(name: &str, args: &'a [Value], position: usize) -> Result<&'a Value, BuiltinError> {
    args.get(position)
        .ok_or_else(|| type_error(name, "present", position))
}

pub(crate) fn string<'a>(name: &str, args: &'a [Value], position: usize) -> Result<&'a str, BuiltinError> {
    value(name, args, position)?
        .as_str()
        .ok_or_else(|| type_error(name, "string", position))
}

pub(crate) fn array<'a>(
    name: &str,
    args: &'a [Value],
    position: usize,
) -> Result<&'a [Value], BuiltinError> {
    value(name, args, position)?
        .as_array()
        .map(Vec::as_slice)
        .ok_or_else(|| type_error(name, "array", position))
}

pub(crate) fn number<'a>(name: &str, args: &'a [Value], position: usize) -> Result<&'a Number, BuiltinError> {
    match value(name, args, position)? {
        Value::Number(n) => Ok(n),
        _ => Err(type_error(name, "number", position)),
    }
}

/// Reads an integral operand; floats with no fractional part are accepted.
pub(crate) fn integer(name: &str, args: &[Value], position: usize) -> Result<i64, BuiltinError> {
    let n = number(name, args, position)?;
    n.as_i64()
        .or_else(|| n.as_f64().and_then(integral))
        .ok_or_else(|| type_error(name, "integer", position))
}

#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss)]
fn integral(f: f64) -> Option<i64> {
    (f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64).then(|| f as i64)
}

/// Converts a float result to a JSON number, preferring integers.
///
/// Non-finite results have no JSON form and yield `None`.
pub(crate) fn number_value(f: f64) -> Option<Value> {
    if let Some(i) = integral(f) {
        return Some(Value::from(i));
    }
    Number::from_f64(f).map(Value::Number)
}
