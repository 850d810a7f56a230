//! Builtin table and dispatch.
//!
//! A policy module numbers the builtins it needs and reports the mapping
//! from its `builtins` export. The loader resolves those names against a
//! [`BuiltinRegistry`] once; every later guest callback is an id lookup.

use crate::host::HostState;
use opa_builtins::{BuiltinEntry, BuiltinError, BuiltinRegistry};
use opa_core::{Address, BuiltinId, Error, Result};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::{trace, warn};
use wasmtime::Caller;

/// One id from a module's builtin table.
#[derive(Debug, Clone)]
pub struct BuiltinSlot {
    name: String,
    entry: Option<BuiltinEntry>,
}

impl BuiltinSlot {
    /// Name the module knows the builtin by.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Host implementation, if the registry had one.
    #[must_use]
    pub const fn entry(&self) -> Option<&BuiltinEntry> {
        self.entry.as_ref()
    }

    /// Returns `true` if calls to this id can be answered.
    #[must_use]
    pub const fn is_implemented(&self) -> bool {
        self.entry.is_some()
    }
}

/// Bidirectional id/name mapping for one module instance.
///
/// Built once after instantiation and never modified.
#[derive(Debug, Clone, Default)]
pub struct BuiltinTable {
    slots: BTreeMap<BuiltinId, BuiltinSlot>,
    ids: HashMap<String, BuiltinId>,
}

impl BuiltinTable {
    /// Resolves a module's name→id object against `registry`.
    ///
    /// Names the registry lacks are kept so calls to them can report the
    /// name in [`Error::NotImplemented`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Serialization`] if `names` is not an object of
    /// non-negative integer ids.
    ///
    /// # Examples
    ///
    /// ```
    /// use opa_builtins::BuiltinRegistry;
    /// use opa_core::BuiltinId;
    /// use opa_wasm_runtime::BuiltinTable;
    /// use serde_json::json;
    ///
    /// let table = BuiltinTable::resolve(
    ///     json!({"concat": 0, "glob.match": 1}),
    ///     &BuiltinRegistry::standard(),
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(table.id_of("concat"), Some(BuiltinId::new(0)));
    /// assert!(table.get(BuiltinId::new(0)).unwrap().is_implemented());
    /// assert_eq!(table.unimplemented(), ["glob.match"]);
    /// ```
    pub fn resolve(names: Value, registry: &BuiltinRegistry) -> Result<Self> {
        let names: BTreeMap<String, u32> = serde_json::from_value(names)
            .map_err(|e| Error::serialization("malformed builtin table", e))?;

        let mut table = Self::default();
        for (name, id) in names {
            let id = BuiltinId::new(id);
            let entry = registry.get(&name).cloned();
            if entry.is_none() {
                warn!(builtin = %name, id = %id, "Policy requires a builtin the host does not implement");
            }
            table.ids.insert(name.clone(), id);
            table.slots.insert(id, BuiltinSlot { name, entry });
        }
        Ok(table)
    }

    /// Looks up a slot by id.
    #[must_use]
    pub fn get(&self, id: BuiltinId) -> Option<&BuiltinSlot> {
        self.slots.get(&id)
    }

    /// Looks up an id by name.
    #[must_use]
    pub fn id_of(&self, name: &str) -> Option<BuiltinId> {
        self.ids.get(name).copied()
    }

    /// Iterates slots in id order.
    pub fn iter(&self) -> impl Iterator<Item = (BuiltinId, &BuiltinSlot)> {
        self.slots.iter().map(|(&id, slot)| (id, slot))
    }

    /// Names the module requires that have no host implementation.
    #[must_use]
    pub fn unimplemented(&self) -> Vec<&str> {
        self.slots
            .values()
            .filter(|slot| !slot.is_implemented())
            .map(BuiltinSlot::name)
            .collect()
    }

    /// Number of ids in the table.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if the module needs no builtins.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// Answers one `opa_builtinN` callback.
///
/// Decodes every argument, invokes the implementation and encodes its
/// result. A builtin that produces no value returns the null address.
pub(crate) fn dispatch(
    caller: &mut Caller<'_, HostState>,
    id: BuiltinId,
    args: &[Address],
) -> Result<Address> {
    let (bridge, table) = caller.data().link()?;
    let strict = caller.data().strict_builtins();

    let slot = table
        .get(id)
        .ok_or(Error::NotImplemented { id: id.get(), name: None })?;
    let entry = slot.entry().ok_or_else(|| Error::NotImplemented {
        id: id.get(),
        name: Some(slot.name().to_string()),
    })?;

    let values = args
        .iter()
        .map(|&addr| bridge.dump_json(&mut *caller, addr))
        .collect::<Result<Vec<_>>>()?;
    trace!(builtin = entry.name(), id = %id, args = values.len(), "Dispatching builtin");

    match entry.call(&values) {
        Ok(Some(value)) => bridge.load_json(&mut *caller, &value),
        Ok(None) => Ok(Address::NULL),
        Err(BuiltinError::Arity {
            name,
            expected,
            actual,
        }) => Err(Error::BuiltinArity {
            name,
            expected,
            actual,
        }),
        Err(err) if strict => Err(Error::BuiltinFailed {
            name: entry.name().to_string(),
            message: err.to_string(),
        }),
        Err(err) => {
            warn!(builtin = entry.name(), error = %err, "Builtin failed; treating result as undefined");
            Ok(Address::NULL)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_resolve_marks_unimplemented() {
        let table = BuiltinTable::resolve(
            json!({"upper": 2, "custom.thing": 0, "time.now_ns": 1}),
            &BuiltinRegistry::standard(),
        )
        .unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.unimplemented(), ["custom.thing"]);
        assert_eq!(table.get(BuiltinId::new(1)).unwrap().name(), "time.now_ns");
        assert_eq!(table.id_of("upper"), Some(BuiltinId::new(2)));
        assert!(table.get(BuiltinId::new(7)).is_none());

        let ids: Vec<_> = table.iter().map(|(id, _)| id.get()).collect();
        assert_eq!(ids, [0, 1, 2]);
    }

    #[test]
    fn test_resolve_rejects_bad_ids() {
        let err = BuiltinTable::resolve(json!({"upper": -1}), &BuiltinRegistry::new()).unwrap_err();
        assert!(err.is_serialization_error());

        let err = BuiltinTable::resolve(json!(["upper"]), &BuiltinRegistry::new()).unwrap_err();
        assert!(err.is_serialization_error());
    }

    #[test]
    fn test_empty_table() {
        let table = BuiltinTable::resolve(json!({}), &BuiltinRegistry::standard()).unwrap();
        assert!(table.is_empty());
        assert!(table.unimplemented().is_empty());
    }
}
