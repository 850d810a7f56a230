//! String builtins.
//!
//! Positions and lengths count characters, not bytes.

use crate::args;
use crate::{BuiltinError, BuiltinResult};
use serde_json::Value;

/// `concat(delimiter, array)`: joins an array of strings.
///
/// # Errors
///
/// Returns [`BuiltinError::Invalid`] if an element is not a string.
pub fn concat(args: &[Value]) -> BuiltinResult {
    const NAME: &str = "concat";
    let delimiter = args::string(NAME, args, 0)?;
    let parts = args::array(NAME, args, 1)?
        .iter()
        .map(|item| {
            item.as_str().ok_or_else(|| BuiltinError::invalid(
                NAME,
                format!("array element {item} is not a string"),
            ))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Some(Value::String(parts.join(delimiter))))
}

/// `contains(s, search)`.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for non-string operands.
pub fn contains(args: &[Value]) -> BuiltinResult {
    let s = args::string("contains", args, 0)?;
    let search = args::string("contains", args, 1)?;
    Ok(Some(Value::Bool(s.contains(search))))
}

/// `endswith(s, search)`.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for non-string operands.
pub fn endswith(args: &[Value]) -> BuiltinResult {
    let s = args::string("endswith", args, 0)?;
    let search = args::string("endswith", args, 1)?;
    Ok(Some(Value::Bool(s.ends_with(search))))
}

/// `startswith(s, search)`.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for non-string operands.
pub fn startswith(args: &[Value]) -> BuiltinResult {
    let s = args::string("startswith", args, 0)?;
    let search = args::string("startswith", args, 1)?;
    Ok(Some(Value::Bool(s.starts_with(search))))
}

/// `indexof(s, search)`: character index of the first match, or -1.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for non-string operands.
pub fn indexof(args: &[Value]) -> BuiltinResult {
    let s = args::string("indexof", args, 0)?;
    let search = args::string("indexof", args, 1)?;
    let index = s.find(search).map_or(-1, |byte| {
        i64::try_from(s[..byte].chars().count()).unwrap_or(i64::MAX)
    });
    Ok(Some(Value::from(index)))
}

/// `lower(s)`.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for a non-string operand.
pub fn lower(args: &[Value]) -> BuiltinResult {
    let s = args::string("lower", args, 0)?;
    Ok(Some(Value::String(s.to_lowercase())))
}

/// `upper(s)`.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for a non-string operand.
pub fn upper(args: &[Value]) -> BuiltinResult {
    let s = args::string("upper", args, 0)?;
    Ok(Some(Value::String(s.to_uppercase())))
}

/// `replace(s, old, new)`: replaces every occurrence of `old`.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for non-string operands.
pub fn replace(args: &[Value]) -> BuiltinResult {
    let s = args::string("replace", args, 0)?;
    let old = args::string("replace", args, 1)?;
    let new = args::string("replace", args, 2)?;
    Ok(Some(Value::String(s.replace(old, new))))
}

/// `split(s, delimiter)`.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for non-string operands.
pub fn split(args: &[Value]) -> BuiltinResult {
    let s = args::string("split", args, 0)?;
    let delimiter = args::string("split", args, 1)?;
    let parts = s
        .split(delimiter)
        .map(|part| Value::String(part.to_string()))
        .collect();
    Ok(Some(Value::Array(parts)))
}

/// `substring(s, start, length)`.
///
/// A negative length takes everything after `start`; ranges past the end
/// are clamped.
///
/// # Errors
///
/// Returns [`BuiltinError::Invalid`] for a negative start.
pub fn substring(args: &[Value]) -> BuiltinResult {
    const NAME: &str = "substring";
    let s = args::string(NAME, args, 0)?;
    let start = args::integer(NAME, args, 1)?;
    let length = args::integer(NAME, args, 2)?;

    let start = usize::try_from(start)
        .map_err(|_| BuiltinError::invalid(NAME, "negative offset"))?;
    let chars = s.chars().skip(start);
    let out: String = match usize::try_from(length) {
        Ok(length) => chars.take(length).collect(),
        Err(_) => chars.collect(),
    };
    Ok(Some(Value::String(out)))
}

/// `trim_space(s)`.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for a non-string operand.
pub fn trim_space(args: &[Value]) -> BuiltinResult {
    let s = args::string("trim_space", args, 0)?;
    Ok(Some(Value::String(s.trim().to_string())))
}

/// `sprintf(format, values)`.
///
/// Supports `%v`, `%s`, `%d`, `%f` (with optional `.N` precision) and `%%`.
/// Missing operands render as `%!v(MISSING)`.
///
/// # Errors
///
/// Returns [`BuiltinError::Type`] for a non-string format or non-array values.
pub fn sprintf(args: &[Value]) -> BuiltinResult {
    let format = args::string("sprintf", args, 0)?;
    let values = args::array("sprintf", args, 1)?;
    Ok(Some(Value::String(render(format, values))))
}

fn render(format: &str, values: &[Value]) -> String {
    let mut out = String::with_capacity(format.len());
    let mut operands = values.iter();
    let mut chars = format.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }

        let mut precision = None;
        if chars.peek() == Some(&'.') {
            chars.next();
            let mut digits = String::new();
            while let Some(d) = chars.peek().copied().filter(char::is_ascii_digit) {
                digits.push(d);
                chars.next();
            }
            precision = digits.parse::<usize>().ok();
        }

        let Some(verb) = chars.next() else {
            out.push_str("%!(NOVERB)");
            break;
        };

        if verb == '%' {
            out.push('%');
            continue;
        }

        match operands.next() {
            Some(value) => out.push_str(&format_operand(verb, precision, value)),
            None => out.push_str(&format!("%!{verb}(MISSING)")),
        }
    }

    out
}

fn format_operand(verb: char, precision: Option<usize>, value: &Value) -> String {
    match (verb, value) {
        ('v' | 's', Value::String(s)) => s.clone(),
        ('v' | 's', other) => other.to_string(),
        ('d', Value::Number(n)) => n
            .as_i64()
            .map(|i| i.to_string())
            .or_else(|| {
                n.as_f64()
                    .filter(|f| f.fract() == 0.0)
                    .map(|f| format!("{f:.0}"))
            })
            .unwrap_or_else(|| format!("%!d({n})")),
        ('f', Value::Number(n)) => {
            let f = n.as_f64().unwrap_or_default();
            format!("{:.*}", precision.unwrap_or(6), f)
        }
        (verb, other) => format!("%!{verb}({other})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn call(f: fn(&[Value]) -> BuiltinResult, args: &[Value]) -> Value {
        f(args).unwrap().unwrap()
    }

    #[test]
    fn test_concat() {
        let res = call(concat, &[json!("/"), json!(["", "foo", "bar", "0", "baz"])]);
        assert_eq!(res, json!("/foo/bar/0/baz"));
    }

    #[test]
    fn test_concat_rejects_non_string_element() {
        let err = concat(&[json!(","), json!(["a", 1])]).unwrap_err();
        assert!(matches!(err, BuiltinError::Invalid { .. }));
    }

    #[test]
    fn test_contains() {
        assert_eq!(call(contains, &[json!("abcdefgh"), json!("defg")]), json!(true));
        assert_eq!(call(contains, &[json!("abcdefgh"), json!("ac")]), json!(false));
        assert_eq!(call(contains, &[json!("abcdefgh"), json!("zy")]), json!(false));
    }

    #[test]
    fn test_endswith_startswith() {
        assert_eq!(call(endswith, &[json!("abcdef"), json!("def")]), json!(true));
        assert_eq!(call(endswith, &[json!("abcdef"), json!("de")]), json!(false));
        assert_eq!(call(startswith, &[json!("abcdefg"), json!("abc")]), json!(true));
        assert_eq!(call(startswith, &[json!("abcdefg"), json!("ac")]), json!(false));
    }

    #[test]
    fn test_indexof() {
        assert_eq!(call(indexof, &[json!("abcdef"), json!("de")]), json!(3));
        assert_eq!(call(indexof, &[json!("abcdef"), json!("zy")]), json!(-1));
        assert_eq!(call(indexof, &[json!("héllo"), json!("llo")]), json!(2));
    }

    #[test]
    fn test_lower_upper() {
        assert_eq!(call(lower, &[json!("ONE,2,THREE,4")]), json!("one,2,three,4"));
        assert_eq!(call(upper, &[json!("one,2")]), json!("ONE,2"));
    }

    #[test]
    fn test_replace_all_occurrences() {
        assert_eq!(
            call(replace, &[json!("1,TWO,3,4"), json!("TWO"), json!("2")]),
            json!("1,2,3,4")
        );
        assert_eq!(
            call(replace, &[json!("a-b-c"), json!("-"), json!("+")]),
            json!("a+b+c")
        );
    }

    #[test]
    fn test_split() {
        assert_eq!(
            call(split, &[json!("ONE,TWO,THREE,FOUR"), json!(",")]),
            json!(["ONE", "TWO", "THREE", "FOUR"])
        );
    }

    #[test]
    fn test_substring() {
        let s = json!("one,two,three,four");
        assert_eq!(call(substring, &[s.clone(), json!(4), json!(3)]), json!("two"));
        assert_eq!(
            call(substring, &[s.clone(), json!(0), json!(20)]),
            json!("one,two,three,four")
        );
        assert_eq!(call(substring, &[s.clone(), json!(14), json!(-1)]), json!("four"));
        assert_eq!(call(substring, &[s.clone(), json!(40), json!(2)]), json!(""));
        assert!(substring(&[s, json!(-1), json!(2)]).is_err());
    }

    #[test]
    fn test_trim_space() {
        assert_eq!(call(trim_space, &[json!("  padded \n")]), json!("padded"));
    }

    #[test]
    fn test_sprintf_verbs() {
        let res = call(
            sprintf,
            &[
                json!("%s has %d items costing %.2f (%v) 100%%"),
                json!(["cart", 3, 9.5, {"a": 1}]),
            ],
        );
        assert_eq!(res, json!("cart has 3 items costing 9.50 ({\"a\":1}) 100%"));
    }

    #[test]
    fn test_sprintf_missing_operand() {
        let res = call(sprintf, &[json!("%s-%s"), json!(["only"])]);
        assert_eq!(res, json!("only-%!s(MISSING)"));
    }

    #[test]
    fn test_type_errors() {
        assert!(matches!(
            lower(&[json!(1)]).unwrap_err(),
            BuiltinError::Type { position: 0, .. }
        ));
        assert!(matches!(
            contains(&[json!("a"), json!(null)]).unwrap_err(),
            BuiltinError::Type { position: 1, .. }
        ));
    }
}
