//! Builtin failure type.

use serde_json::Value;
use thiserror::Error;

/// Outcome of a builtin call.
///
/// `Ok(None)` means the builtin is intentionally undefined for these
/// arguments. It is distinct from both `Ok(Some(Value::Null))` and an error.
pub type BuiltinResult = Result<Option<Value>, BuiltinError>;

/// A builtin rejected its arguments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BuiltinError {
    /// An operand had the wrong JSON type.
    #[error("{name}: operand {} must be {expected}", .position + 1)]
    Type {
        /// Builtin name
        name: String,
        /// Expected type description
        expected: &'static str,
        /// Zero-based operand position
        position: usize,
    },

    /// Operands had the right types but an unusable value.
    #[error("{name}: {message}")]
    Invalid {
        /// Builtin name
        name: String,
        /// Failure description
        message: String,
    },

    /// The call carried the wrong number of operands.
    #[error("{name}: expected {expected} operand(s), got {actual}")]
    Arity {
        /// Builtin name
        name: String,
        /// Registered arity
        expected: usize,
        /// Operands supplied
        actual: usize,
    },
}

impl BuiltinError {
    /// Creates an [`BuiltinError::Invalid`] error.
    #[must_use]
    pub fn invalid(name: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_error_is_one_based() {
        let err = BuiltinError::Type {
            name: "concat".to_string(),
            expected: "string",
            position: 0,
        };
        assert_eq!(err.to_string(), "concat: operand 1 must be string");
    }

    #[test]
    fn test_invalid_helper() {
        let err = BuiltinError::invalid("re_match", "unclosed group");
        assert_eq!(err.to_string(), "re_match: unclosed group");
    }
}
