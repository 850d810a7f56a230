//! Regular expression builtins.

use crate::args;
use crate::{BuiltinError, BuiltinResult};
use regex::Regex;
use serde_json::Value;

fn compile(name: &str, pattern: &str) -> Result<Regex, BuiltinError> {
    Regex::new(pattern).map_err(|e| BuiltinError::invalid(name, e.to_string()))
}

/// `re_match(pattern, value)`: reports whether `value` matches anywhere.
///
/// # Errors
///
/// Returns [`BuiltinError::Invalid`] for a malformed pattern.
pub fn re_match(args: &[Value]) -> BuiltinResult {
    let pattern = args::string("re_match", args, 0)?;
    let value = args::string("re_match", args, 1)?;
    let re = compile("re_match", pattern)?;
    Ok(Some(Value::Bool(re.is_match(value))))
}

/// `regex.split(pattern, s)`: splits `s` on every match of `pattern`.
///
/// # Errors
///
/// Returns [`BuiltinError::Invalid`] for a malformed pattern.
pub fn regex_split(args: &[Value]) -> BuiltinResult {
    let pattern = args::string("regex.split", args, 0)?;
    let s = args::string("regex.split", args, 1)?;
    let re = compile("regex.split", pattern)?;
    let parts = re
        .split(s)
        .map(|part| Value::String(part.to_string()))
        .collect();
    Ok(Some(Value::Array(parts)))
}
