//! Integration tests for the standard builtin registry.

use opa_builtins::{Builtin, BuiltinError, BuiltinRegistry};
use serde_json::{Value, json};

fn call(registry: &BuiltinRegistry, name: &str, args: &[Value]) -> Option<Value> {
    registry
        .get(name)
        .unwrap_or_else(|| panic!("{name} not registered"))
        .call(args)
        .unwrap_or_else(|e| panic!("{name} failed: {e}"))
}

/// Renamed builtins are reachable only under their dotted names.
#[test]
fn test_dotted_names_resolve() {
    let registry = BuiltinRegistry::standard();

    let ns = call(
        &registry,
        "time.parse_rfc3339_ns",
        &[json!("2021-02-28T09:36:18Z")],
    )
    .unwrap();
    assert_eq!(ns, json!(1_614_504_978_000_000_000_i64));

    let next_day = call(
        &registry,
        "time.add_date",
        &[ns.clone(), json!(0), json!(0), json!(1)],
    );
    assert_eq!(next_day, Some(json!(1_614_591_378_000_000_000_i64)));

    let next_year = call(&registry, "time.add_date", &[ns.clone(), json!(1), json!(0), json!(0)]);
    assert_eq!(next_year, Some(json!(1_646_040_978_000_000_000_i64)));

    assert_eq!(call(&registry, "time.date", &[ns]), Some(json!([2021, 2, 28])));

    let parts = call(&registry, "regex.split", &[json!("\\s+"), json!("a  b c")]);
    assert_eq!(parts, Some(json!(["a", "b", "c"])));

    for builtin in [Builtin::RegexSplit, Builtin::TimeNowNs, Builtin::TimeDate] {
        assert!(!registry.contains(builtin.ident()), "{builtin} leaked its ident");
    }
}

/// Absence and errors stay distinct from a null result.
#[test]
fn test_no_value_is_not_null() {
    let registry = BuiltinRegistry::standard();

    assert_eq!(call(&registry, "max", &[json!([])]), None);
    assert_eq!(call(&registry, "to_number", &[json!("n/a")]), None);
    assert_eq!(call(&registry, "to_number", &[json!(null)]), Some(json!(0)));

    let err = registry
        .get("concat")
        .unwrap()
        .call(&[json!(1), json!([])])
        .unwrap_err();
    assert!(matches!(err, BuiltinError::Type { position: 0, .. }));
}

/// Embedders can layer their own builtins over the standard set.
#[test]
fn test_custom_builtin() {
    let mut registry = BuiltinRegistry::standard();
    registry.register("custom.greet", 1, |args: &[Value]| {
        Ok(args[0].as_str().map(|who| json!(format!("hello, {who}"))))
    });

    assert_eq!(
        call(&registry, "custom.greet", &[json!("policy")]),
        Some(json!("hello, policy"))
    );
    assert_eq!(call(&registry, "custom.greet", &[json!(1)]), None);
    assert!(registry.names().contains(&"custom.greet"));
}

/// The documented string fixtures behave as expected end to end.
#[test]
fn test_string_fixtures() {
    let registry = BuiltinRegistry::standard();
    let s = json!("one,two,three,four");

    assert_eq!(
        call(&registry, "substring", &[s.clone(), json!(4), json!(3)]),
        Some(json!("two"))
    );
    assert_eq!(
        call(&registry, "split", &[s, json!(",")]),
        Some(json!(["one", "two", "three", "four"]))
    );
    assert_eq!(
        call(&registry, "sprintf", &[json!("%s=%d"), json!(["n", 7])]),
        Some(json!("n=7"))
    );
}
