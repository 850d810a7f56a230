//! Name-keyed builtin registry.

use crate::{BuiltinError, BuiltinResult};
use crate::{aggregates, conversions, patterns, strings, time, types};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Implementation identifiers whose guest-visible name differs.
///
/// Everything not listed here is exposed under its identifier unchanged.
const RENAMES: &[(&str, &str)] = &[
    ("regex_split", "regex.split"),
    ("time_add_date", "time.add_date"),
    ("time_date", "time.date"),
    ("time_now_ns", "time.now_ns"),
    ("time_parse_rfc3339_ns", "time.parse_rfc3339_ns"),
];

/// Maps an implementation identifier to the name policy modules use.
///
/// # Examples
///
/// ```
/// use opa_builtins::guest_name;
///
/// assert_eq!(guest_name("time_now_ns"), "time.now_ns");
/// assert_eq!(guest_name("concat"), "concat");
/// ```
#[must_use]
pub fn guest_name(ident: &str) -> &str {
    RENAMES
        .iter()
        .find_map(|&(from, to)| (from == ident).then_some(to))
        .unwrap_or(ident)
}

/// Shared builtin implementation.
pub type BuiltinFn = Arc<dyn Fn(&[Value]) -> BuiltinResult + Send + Sync>;

/// The builtins shipped with this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(missing_docs)]
pub enum Builtin {
    Concat,
    Contains,
    Endswith,
    Startswith,
    Indexof,
    Lower,
    Upper,
    Replace,
    Split,
    Substring,
    TrimSpace,
    Sprintf,
    ReMatch,
    RegexSplit,
    IsNumber,
    IsString,
    IsBoolean,
    IsArray,
    IsSet,
    IsObject,
    IsNull,
    TypeName,
    All,
    Any,
    Count,
    Max,
    Min,
    Product,
    Sum,
    Sort,
    ToNumber,
    TimeNowNs,
    TimeParseRfc3339Ns,
    TimeDate,
    TimeAddDate,
}

impl Builtin {
    /// Every shipped builtin.
    pub const ALL: [Self; 35] = [
        Self::Concat,
        Self::Contains,
        Self::Endswith,
        Self::Startswith,
        Self::Indexof,
        Self::Lower,
        Self::Upper,
        Self::Replace,
        Self::Split,
        Self::Substring,
        Self::TrimSpace,
        Self::Sprintf,
        Self::ReMatch,
        Self::RegexSplit,
        Self::IsNumber,
        Self::IsString,
        Self::IsBoolean,
        Self::IsArray,
        Self::IsSet,
        Self::IsObject,
        Self::IsNull,
        Self::TypeName,
        Self::All,
        Self::Any,
        Self::Count,
        Self::Max,
        Self::Min,
        Self::Product,
        Self::Sum,
        Self::Sort,
        Self::ToNumber,
        Self::TimeNowNs,
        Self::TimeParseRfc3339Ns,
        Self::TimeDate,
        Self::TimeAddDate,
    ];

    /// Implementation identifier, before renaming.
    #[must_use]
    pub const fn ident(self) -> &'static str {
        match self {
            Self::Concat => "concat",
            Self::Contains => "contains",
            Self::Endswith => "endswith",
            Self::Startswith => "startswith",
            Self::Indexof => "indexof",
            Self::Lower => "lower",
            Self::Upper => "upper",
            Self::Replace => "replace",
            Self::Split => "split",
            Self::Substring => "substring",
            Self::TrimSpace => "trim_space",
            Self::Sprintf => "sprintf",
            Self::ReMatch => "re_match",
            Self::RegexSplit => "regex_split",
            Self::IsNumber => "is_number",
            Self::IsString => "is_string",
            Self::IsBoolean => "is_boolean",
            Self::IsArray => "is_array",
            Self::IsSet => "is_set",
            Self::IsObject => "is_object",
            Self::IsNull => "is_null",
            Self::TypeName => "type_name",
            Self::All => "all",
            Self::Any => "any",
            Self::Count => "count",
            Self::Max => "max",
            Self::Min => "min",
            Self::Product => "product",
            Self::Sum => "sum",
            Self::Sort => "sort",
            Self::ToNumber => "to_number",
            Self::TimeNowNs => "time_now_ns",
            Self::TimeParseRfc3339Ns => "time_parse_rfc3339_ns",
            Self::TimeDate => "time_date",
            Self::TimeAddDate => "time_add_date",
        }
    }

    /// Name the guest uses for this builtin.
    #[must_use]
    pub fn name(self) -> &'static str {
        guest_name(self.ident())
    }

    /// Number of operands.
    #[must_use]
    pub const fn arity(self) -> usize {
        match self {
            Self::TimeNowNs => 0,
            Self::Lower
            | Self::Upper
            | Self::TrimSpace
            | Self::IsNumber
            | Self::IsString
            | Self::IsBoolean
            | Self::IsArray
            | Self::IsSet
            | Self::IsObject
            | Self::IsNull
            | Self::TypeName
            | Self::All
            | Self::Any
            | Self::Count
            | Self::Max
            | Self::Min
            | Self::Product
            | Self::Sum
            | Self::Sort
            | Self::ToNumber
            | Self::TimeParseRfc3339Ns
            | Self::TimeDate => 1,
            Self::Concat
            | Self::Contains
            | Self::Endswith
            | Self::Startswith
            | Self::Indexof
            | Self::Split
            | Self::Sprintf
            | Self::ReMatch
            | Self::RegexSplit => 2,
            Self::Replace | Self::Substring => 3,
            Self::TimeAddDate => 4,
        }
    }

    const fn func(self) -> fn(&[Value]) -> BuiltinResult {
        match self {
            Self::Concat => strings::concat,
            Self::Contains => strings::contains,
            Self::Endswith => strings::endswith,
            Self::Startswith => strings::startswith,
            Self::Indexof => strings::indexof,
            Self::Lower => strings::lower,
            Self::Upper => strings::upper,
            Self::Replace => strings::replace,
            Self::Split => strings::split,
            Self::Substring => strings::substring,
            Self::TrimSpace => strings::trim_space,
            Self::Sprintf => strings::sprintf,
            Self::ReMatch => patterns::re_match,
            Self::RegexSplit => patterns::regex_split,
            Self::IsNumber => types::is_number,
            Self::IsString => types::is_string,
            Self::IsBoolean => types::is_boolean,
            Self::IsArray => types::is_array,
            Self::IsSet => types::is_set,
            Self::IsObject => types::is_object,
            Self::IsNull => types::is_null,
            Self::TypeName => types::type_name,
            Self::All => aggregates::all,
            Self::Any => aggregates::any,
            Self::Count => aggregates::count,
            Self::Max => aggregates::max,
            Self::Min => aggregates::min,
            Self::Product => aggregates::product,
            Self::Sum => aggregates::sum,
            Self::Sort => aggregates::sort,
            Self::ToNumber => conversions::to_number,
            Self::TimeNowNs => time::now_ns,
            Self::TimeParseRfc3339Ns => time::parse_rfc3339_ns,
            Self::TimeDate => time::date,
            Self::TimeAddDate => time::add_date,
        }
    }

    /// Invokes the builtin directly.
    ///
    /// # Errors
    ///
    /// Returns whatever the implementation rejects the operands with.
    pub fn call(self, args: &[Value]) -> BuiltinResult {
        (self.func())(args)
    }
}

impl fmt::Display for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A registered builtin: guest-visible name, arity and implementation.
#[derive(Clone)]
pub struct BuiltinEntry {
    name: String,
    arity: usize,
    func: BuiltinFn,
}

impl BuiltinEntry {
    /// Creates an entry.
    pub fn new(
        name: impl Into<String>,
        arity: usize,
        func: impl Fn(&[Value]) -> BuiltinResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            arity,
            func: Arc::new(func),
        }
    }

    /// Guest-visible name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of operands the implementation expects.
    #[must_use]
    pub const fn arity(&self) -> usize {
        self.arity
    }

    /// Invokes the implementation after checking the operand count.
    ///
    /// # Errors
    ///
    /// Returns [`BuiltinError::Arity`] on an operand count mismatch, or the
    /// implementation's own error.
    pub fn call(&self, args: &[Value]) -> BuiltinResult {
        if args.len() != self.arity {
            return Err(BuiltinError::Arity {
                name: self.name.clone(),
                expected: self.arity,
                actual: args.len(),
            });
        }
        (self.func)(args)
    }
}

impl fmt::Debug for BuiltinEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuiltinEntry")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

impl From<Builtin> for BuiltinEntry {
    fn from(builtin: Builtin) -> Self {
        Self::new(builtin.name(), builtin.arity(), builtin.func())
    }
}

/// Builtin implementations keyed by guest-visible name.
///
/// # Examples
///
/// ```
/// use opa_builtins::BuiltinRegistry;
/// use serde_json::{Value, json};
///
/// let mut registry = BuiltinRegistry::standard();
/// registry.register("custom.double", 1, |args: &[Value]| {
///     Ok(args[0].as_i64().map(|n| json!(n * 2)))
/// });
///
/// let double = registry.get("custom.double").unwrap();
/// assert_eq!(double.call(&[json!(21)]).unwrap(), Some(json!(42)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct BuiltinRegistry {
    entries: HashMap<String, BuiltinEntry>,
}

impl BuiltinRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding every [`Builtin`].
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        for builtin in Builtin::ALL {
            registry.insert(BuiltinEntry::from(builtin));
        }
        registry
    }

    /// Registers an implementation, replacing any entry with the same name.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        arity: usize,
        func: impl Fn(&[Value]) -> BuiltinResult + Send + Sync + 'static,
    ) -> &mut Self {
        self.insert(BuiltinEntry::new(name, arity, func));
        self
    }

    /// Registers a prepared entry, replacing any entry with the same name.
    pub fn insert(&mut self, entry: BuiltinEntry) -> &mut Self {
        debug!(name = %entry.name, arity = entry.arity, "Registering builtin");
        self.entries.insert(entry.name.clone(), entry);
        self
    }

    /// Looks up an entry by guest-visible name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&BuiltinEntry> {
        self.entries.get(name)
    }

    /// Returns `true` if `name` is registered.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of registered builtins.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_renamed_builtins() {
        assert_eq!(Builtin::RegexSplit.name(), "regex.split");
        assert_eq!(Builtin::TimeAddDate.name(), "time.add_date");
        assert_eq!(Builtin::TimeDate.name(), "time.date");
        assert_eq!(Builtin::TimeNowNs.name(), "time.now_ns");
        assert_eq!(Builtin::TimeParseRfc3339Ns.name(), "time.parse_rfc3339_ns");
        assert_eq!(Builtin::TrimSpace.name(), "trim_space");
    }

    #[test]
    fn test_standard_registry_covers_all() {
        let registry = BuiltinRegistry::standard();
        assert_eq!(registry.len(), Builtin::ALL.len());
        for builtin in Builtin::ALL {
            let entry = registry.get(builtin.name()).unwrap();
            assert_eq!(entry.arity(), builtin.arity());
        }
        assert!(!registry.contains("regex_split"));
    }

    #[test]
    fn test_entry_checks_arity() {
        let registry = BuiltinRegistry::standard();
        let err = registry
            .get("upper")
            .unwrap()
            .call(&[json!("a"), json!("b")])
            .unwrap_err();
        assert_eq!(
            err,
            BuiltinError::Arity {
                name: "upper".to_string(),
                expected: 1,
                actual: 2,
            }
        );
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = BuiltinRegistry::standard();
        registry.register("upper", 1, |_: &[Value]| Ok(Some(json!("shadowed"))));
        let res = registry.get("upper").unwrap().call(&[json!("x")]).unwrap();
        assert_eq!(res, Some(json!("shadowed")));
        assert_eq!(registry.len(), Builtin::ALL.len());
    }

    #[test]
    fn test_names_sorted() {
        let mut registry = BuiltinRegistry::new();
        assert!(registry.is_empty());
        registry
            .register("b", 0, |_: &[Value]| Ok(None))
            .register("a", 0, |_: &[Value]| Ok(None));
        assert_eq!(registry.names(), ["a", "b"]);
    }

    #[test]
    fn test_entry_debug_omits_func() {
        let entry = BuiltinEntry::from(Builtin::Sum);
        let debug = format!("{entry:?}");
        assert!(debug.contains("sum"));
        assert!(debug.contains(".."));
    }
}
