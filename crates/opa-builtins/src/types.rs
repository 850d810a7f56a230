//! Type predicate builtins.
//!
//! JSON has no set type, so `is_set` is always false for decoded operands.

use crate::BuiltinResult;
use crate::args;
use serde_json::Value;

fn predicate(name: &str, args: &[Value], test: fn(&Value) -> bool) -> BuiltinResult {
    let value = args::value(name, args, 0)?;
    Ok(Some(Value::Bool(test(value))))
}

/// `is_number(x)`.
///
/// # Errors
///
/// Fails only when the operand is missing.
pub fn is_number(args: &[Value]) -> BuiltinResult {
    predicate("is_number", args, Value::is_number)
}

/// `is_string(x)`.
///
/// # Errors
///
/// Fails only when the operand is missing.
pub fn is_string(args: &[Value]) -> BuiltinResult {
    predicate("is_string", args, Value::is_string)
}

/// `is_boolean(x)`.
///
/// # Errors
///
/// Fails only when the operand is missing.
pub fn is_boolean(args: &[Value]) -> BuiltinResult {
    predicate("is_boolean", args, Value::is_boolean)
}

/// `is_array(x)`.
///
/// # Errors
///
/// Fails only when the operand is missing.
pub fn is_array(args: &[Value]) -> BuiltinResult {
    predicate("is_array", args, Value::is_array)
}

/// `is_set(x)`.
///
/// # Errors
///
/// Fails only when the operand is missing.
pub fn is_set(args: &[Value]) -> BuiltinResult {
    predicate("is_set", args, |_| false)
}

/// `is_object(x)`.
///
/// # Errors
///
/// Fails only when the operand is missing.
pub fn is_object(args: &[Value]) -> BuiltinResult {
    predicate("is_object", args, Value::is_object)
}

/// `is_null(x)`.
///
/// # Errors
///
/// Fails only when the operand is missing.
pub fn is_null(args: &[Value]) -> BuiltinResult {
    predicate("is_null", args, Value::is_null)
}

/// Returns the policy-language type name of a JSON value.
#[must_use]
pub const fn name_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// `type_name(x)`.
///
/// # Errors
///
/// Fails only when the operand is missing.
pub fn type_name(args: &[Value]) -> BuiltinResult {
    let value = args::value("type_name", args, 0)?;
    Ok(Some(Value::String(name_of(value).to_string())))
}
