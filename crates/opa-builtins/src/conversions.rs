//! Conversion builtins.

use crate::args;
use crate::{BuiltinError, BuiltinResult};
use serde_json::Value;

/// `to_number(x)`.
///
/// Numeric strings parse to integers where possible, booleans map to 0/1
/// and null maps to 0. A string that is not a number yields no value.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for arrays and objects.
pub fn to_number(args: &[Value]) -> BuiltinResult {
    match args::value("to_number", args, 0)? {
        Value::Null | Value::Bool(false) => Ok(Some(Value::from(0))),
        Value::Bool(true) => Ok(Some(Value::from(1))),
        Value::Number(n) => Ok(Some(Value::Number(n.clone()))),
        Value::String(s) => Ok(parse_number(s.trim())),
        _ => Err(BuiltinError::Type {
            name: "to_number".to_string(),
            expected: "null, boolean, number, or string",
            position: 0,
        }),
    }
}

fn parse_number(s: &str) -> Option<Value> {
    if let Ok(i) = s.parse::<i64>() {
        return Some(Value::from(i));
    }
    s.parse::<f64>().ok().and_then(args::number_value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_to_number() {
        let cases = [
            (json!("-42.0"), json!(-42)),
            (json!(false), json!(0)),
            (json!(100.1), json!(100.1)),
            (json!(null), json!(0)),
            (json!(true), json!(1)),
            (json!("17"), json!(17)),
        ];
        for (input, expected) in cases {
            assert_eq!(to_number(&[input]).unwrap(), Some(expected));
        }
    }

    #[test]
    fn test_unparsable_string_has_no_value() {
        assert_eq!(to_number(&[json!("twelve")]).unwrap(), None);
        assert_eq!(to_number(&[json!("inf")]).unwrap(), None);
    }

    #[test]
    fn test_collections_rejected() {
        assert!(to_number(&[json!([1])]).is_err());
    }
}
