//! Aggregate builtins over arrays.
//!
//! Ordering across types follows the policy language's total order:
//! null < boolean < number < string < array < object.

use crate::args;
use crate::{BuiltinError, BuiltinResult};
use serde_json::Value;
use std::cmp::Ordering;

const fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Compares two JSON values in the policy language's total order.
#[must_use]
pub fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => x
                .as_f64()
                .unwrap_or_default()
                .total_cmp(&y.as_f64().unwrap_or_default()),
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => x
            .iter()
            .zip(y)
            .map(|(x, y)| compare(x, y))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| x.len().cmp(&y.len())),
        (Value::Object(x), Value::Object(y)) => {
            let mut xs: Vec<_> = x.iter().collect();
            let mut ys: Vec<_> = y.iter().collect();
            xs.sort_by(|a, b| a.0.cmp(b.0));
            ys.sort_by(|a, b| a.0.cmp(b.0));
            xs.iter()
                .zip(&ys)
                .map(|((xk, xv), (yk, yv))| xk.cmp(yk).then_with(|| compare(xv, yv)))
                .find(|o| o.is_ne())
                .unwrap_or_else(|| xs.len().cmp(&ys.len()))
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

fn numbers(name: &str, items: &[Value]) -> Result<Vec<f64>, BuiltinError> {
    items
        .iter()
        .map(|item| {
            item.as_f64()
                .ok_or_else(|| BuiltinError::invalid(name, format!("element {item} is not a number")))
        })
        .collect()
}

fn integers(items: &[Value]) -> Option<Vec<i64>> {
    items.iter().map(Value::as_i64).collect()
}

/// `all(array)`: true when every element is `true` (vacuously for `[]`).
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for a non-array operand.
pub fn all(args: &[Value]) -> BuiltinResult {
    let items = args::array("all", args, 0)?;
    Ok(Some(Value::Bool(items.iter().all(|v| v == &Value::Bool(true)))))
}

/// `any(array)`: true when some element is `true`.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for a non-array operand.
pub fn any(args: &[Value]) -> BuiltinResult {
    let items = args::array("any", args, 0)?;
    Ok(Some(Value::Bool(items.iter().any(|v| v == &Value::Bool(true)))))
}

/// `count(collection)`: length of an array, object, or string.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for other operand types.
pub fn count(args: &[Value]) -> BuiltinResult {
    let len = match args::value("count", args, 0)? {
        Value::Array(items) => items.len(),
        Value::Object(map) => map.len(),
        Value::String(s) => s.chars().count(),
        _ => {
            return Err(BuiltinError::Type {
                name: "count".to_string(),
                expected: "array, object, or string",
                position: 0,
            });
        }
    };
    Ok(Some(Value::from(len)))
}

/// `max(array)`: greatest element, no value for `[]`.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for a non-array operand.
pub fn max(args: &[Value]) -> BuiltinResult {
    let items = args::array("max", args, 0)?;
    Ok(items.iter().max_by(|a, b| compare(a, b)).cloned())
}

/// `min(array)`: least element, no value for `[]`.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for a non-array operand.
pub fn min(args: &[Value]) -> BuiltinResult {
    let items = args::array("min", args, 0)?;
    Ok(items.iter().min_by(|a, b| compare(a, b)).cloned())
}

/// `sum(array)`.
///
/// Integer inputs are summed exactly; anything else falls back to floats.
///
/// # Errors
///
/// Returns [`BuiltinError::Invalid`] if an element is not a number.
pub fn sum(args: &[Value]) -> BuiltinResult {
    let items = args::array("sum", args, 0)?;
    if let Some(total) = integers(items).and_then(|ints| {
        ints.into_iter().try_fold(0_i64, i64::checked_add)
    }) {
        return Ok(Some(Value::from(total)));
    }
    Ok(args::number_value(numbers("sum", items)?.into_iter().sum()))
}

/// `product(array)`.
///
/// # Errors
///
/// Returns [`BuiltinError::Invalid`] if an element is not a number.
pub fn product(args: &[Value]) -> BuiltinResult {
    let items = args::array("product", args, 0)?;
    if let Some(total) = integers(items).and_then(|ints| {
        ints.into_iter().try_fold(1_i64, i64::checked_mul)
    }) {
        return Ok(Some(Value::from(total)));
    }
    Ok(args::number_value(numbers("product", items)?.into_iter().product()))
}

/// `sort(array)`: a sorted copy.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for a non-array operand.
pub fn sort(args: &[Value]) -> BuiltinResult {
    let mut items = args::array("sort", args, 0)?.to_vec();
    items.sort_by(compare);
    Ok(Some(Value::Array(items)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_all_any() {
        assert_eq!(all(&[json!([])]).unwrap(), Some(json!(true)));
        assert_eq!(all(&[json!([true, true])]).unwrap(), Some(json!(true)));
        assert_eq!(all(&[json!([true, 1])]).unwrap(), Some(json!(false)));
        assert_eq!(any(&[json!([])]).unwrap(), Some(json!(false)));
        assert_eq!(any(&[json!([false, true])]).unwrap(), Some(json!(true)));
    }

    #[test]
    fn test_count() {
        assert_eq!(count(&[json!([1, 2, 3])]).unwrap(), Some(json!(3)));
        assert_eq!(count(&[json!({"a": 1})]).unwrap(), Some(json!(1)));
        assert_eq!(count(&[json!("héllo")]).unwrap(), Some(json!(5)));
        assert!(count(&[json!(7)]).is_err());
    }

    #[test]
    fn test_max_min() {
        assert_eq!(max(&[json!([3, 9, 1])]).unwrap(), Some(json!(9)));
        assert_eq!(min(&[json!([3, 9, 1])]).unwrap(), Some(json!(1)));
        assert_eq!(max(&[json!([])]).unwrap(), None);
        assert_eq!(min(&[json!([])]).unwrap(), None);
    }

    #[test]
    fn test_sum_product() {
        assert_eq!(sum(&[json!([1, 2, 3])]).unwrap(), Some(json!(6)));
        assert_eq!(sum(&[json!([])]).unwrap(), Some(json!(0)));
        assert_eq!(sum(&[json!([1.5, 1])]).unwrap(), Some(json!(2.5)));
        assert_eq!(product(&[json!([2, 3, 4])]).unwrap(), Some(json!(24)));
        assert_eq!(product(&[json!([0.5, 4])]).unwrap(), Some(json!(2)));
        assert!(sum(&[json!([1, "2"])]).is_err());
    }

    #[test]
    fn test_sort_mixed_types() {
        let res = sort(&[json!(["b", 2, null, [1], "a", true, 1, {"k": 0}])]).unwrap();
        assert_eq!(
            res,
            Some(json!([null, true, 1, 2, "a", "b", [1], {"k": 0}]))
        );
    }

    #[test]
    fn test_compare_arrays_and_objects() {
        assert_eq!(compare(&json!([1, 2]), &json!([1, 3])), Ordering::Less);
        assert_eq!(compare(&json!([1, 2]), &json!([1])), Ordering::Greater);
        assert_eq!(compare(&json!({"a": 1}), &json!({"a": 1})), Ordering::Equal);
        assert_eq!(compare(&json!({"a": 1}), &json!({"b": 0})), Ordering::Less);
    }
}
