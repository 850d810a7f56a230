//! Evaluation sessions.
//!
//! A session owns one module instance and its linear memory. The guest
//! allocator is a bump allocator, so the session keeps two heap
//! checkpoints and rewinds to them instead of freeing anything:
//!
//! - `base`, taken right after loading the initial empty data object;
//!   [`Session::set_data`] rewinds here before loading new data.
//! - `data`, taken after the current data value was loaded;
//!   every evaluation rewinds here, discarding the previous call's garbage.

use crate::bridge::{MemoryBridge, encode, invoke};
use crate::dispatch::BuiltinTable;
use crate::host::HostState;
use crate::loader::{LoadedPolicy, PolicyExports, refuel};
use opa_core::{Address, EntrypointId, Error, Result};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};
use wasmtime::Store;

/// Heap pointer snapshots bounding the persistent data region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeapCheckpoints {
    /// Heap pointer after the initial empty data value.
    pub base: Address,
    /// Heap pointer after the current data value.
    pub data: Address,
}

/// Interprets a result set as a boolean decision.
///
/// True only for exactly one result wrapper whose `result` is literally
/// `true`.
///
/// # Examples
///
/// ```
/// use opa_wasm_runtime::result_to_bool;
/// use serde_json::json;
///
/// assert!(result_to_bool(&json!([{"result": true}])));
/// assert!(!result_to_bool(&json!([])));
/// assert!(!result_to_bool(&json!([{"result": true}, {"result": true}])));
/// ```
#[must_use]
pub fn result_to_bool(results: &Value) -> bool {
    match results.as_array().map(Vec::as_slice) {
        Some([only]) => only.get("result") == Some(&Value::Bool(true)),
        _ => false,
    }
}

/// One loaded policy module with its own memory and data.
///
/// Sessions are `Send` but every operation takes `&mut self`: the guest
/// heap pointer is a single register shared by all calls. Use one session
/// per concurrent caller.
///
/// # Examples
///
/// ```no_run
/// use opa_wasm_runtime::load_policy;
/// use serde_json::json;
///
/// # fn example() -> opa_core::Result<()> {
/// let bytes = std::fs::read("policy.wasm").expect("policy file");
/// let mut session = load_policy(&bytes)?;
///
/// session.set_data(&json!({"world": "world"}))?;
/// let results = session.evaluate(&json!({"message": "world"}))?;
/// println!("{results}");
/// # Ok(())
/// # }
/// ```
pub struct Session {
    store: Store<HostState>,
    bridge: MemoryBridge,
    exports: PolicyExports,
    builtins: Arc<BuiltinTable>,
    entrypoints: BTreeMap<String, EntrypointId>,
    data: Address,
    checkpoints: HeapCheckpoints,
    fuel: Option<u64>,
    tainted: bool,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("builtins", &self.builtins.len())
            .field("entrypoints", &self.entrypoints)
            .field("checkpoints", &self.checkpoints)
            .field("tainted", &self.tainted)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Loads the empty data object and records the base checkpoint.
    pub(crate) fn new(policy: LoadedPolicy, fuel: Option<u64>) -> Result<Self> {
        let LoadedPolicy {
            mut store,
            bridge,
            exports,
            builtins,
            entrypoints,
        } = policy;

        refuel(&mut store, fuel)?;
        let data = bridge.load_json(&mut store, &json!({}))?;
        let base = Address::from_raw(invoke(&mut store, &exports.heap_ptr_get, ())?);
        debug!(base = %base, "Session constructed");

        Ok(Self {
            store,
            bridge,
            exports,
            builtins,
            entrypoints,
            data,
            checkpoints: HeapCheckpoints { base, data: base },
            fuel,
            tainted: false,
        })
    }

    /// Replaces the data value every evaluation sees.
    ///
    /// The value is encoded before the heap is touched, so an encoding
    /// failure leaves the previous data in place. If the guest rejects the
    /// text, the session falls back to a freshly loaded empty object.
    ///
    /// # Errors
    ///
    /// - [`Error::Serialization`] if the value cannot be encoded
    /// - [`Error::Parse`] if the guest rejects the encoded text
    pub fn set_data<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<()> {
        let bytes = encode(value)?;
        refuel(&mut self.store, self.fuel)?;
        self.set_heap_ptr(self.checkpoints.base)?;

        match self.bridge.load_bytes(&mut self.store, &bytes) {
            Ok(data) => {
                self.data = data;
                self.checkpoints.data = self.heap_ptr()?;
                self.tainted = false;
                debug!(data = %data, checkpoint = %self.checkpoints.data, "Data loaded");
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Failed to load data; falling back to empty data");
                self.tainted = err.taints_heap();
                if let Err(reload) = self.load_empty_data() {
                    warn!(error = %reload, "Failed to reload empty data");
                    self.tainted = true;
                }
                Err(err)
            }
        }
    }

    /// Evaluates the default entrypoint against `input`.
    ///
    /// Returns the guest's result set, conventionally an array of
    /// `{"result": ...}` wrappers.
    ///
    /// # Errors
    ///
    /// Any boundary failure: [`Error::Serialization`], [`Error::Parse`],
    /// [`Error::NotImplemented`], [`Error::GuestAbort`], builtin errors, or
    /// [`Error::Trap`]. Aborts and traps mark the session tainted.
    pub fn evaluate<T: Serialize + ?Sized>(&mut self, input: &T) -> Result<Value> {
        self.run(None, input)
    }

    /// Evaluates and interprets the result with [`result_to_bool`].
    ///
    /// # Errors
    ///
    /// Same as [`Session::evaluate`].
    pub fn evaluate_to_bool<T: Serialize + ?Sized>(&mut self, input: &T) -> Result<bool> {
        self.evaluate(input).map(|results| result_to_bool(&results))
    }

    /// Evaluates a named entrypoint.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigError`] if the module has no entrypoint by that name,
    /// otherwise the same as [`Session::evaluate`].
    pub fn evaluate_entrypoint<T: Serialize + ?Sized>(
        &mut self,
        name: &str,
        input: &T,
    ) -> Result<Value> {
        let id = self
            .entrypoints
            .get(name)
            .copied()
            .ok_or_else(|| Error::ConfigError {
                message: format!("policy has no entrypoint named '{name}'"),
            })?;
        self.run(Some(id), input)
    }

    /// Evaluates an entrypoint by id.
    ///
    /// # Errors
    ///
    /// [`Error::MissingExport`] if the module cannot select entrypoints,
    /// otherwise the same as [`Session::evaluate`].
    pub fn evaluate_entrypoint_id<T: Serialize + ?Sized>(
        &mut self,
        id: EntrypointId,
        input: &T,
    ) -> Result<Value> {
        self.run(Some(id), input)
    }

    /// Sets `value` at `path` inside the loaded data.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingExport`] if the module has no `opa_value_add_path`
    /// - [`Error::Trap`] if the guest reports a non-zero error code
    /// - serialization and parse errors as for [`Session::set_data`]
    pub fn add_data_path<T: Serialize + ?Sized>(&mut self, path: &[&str], value: &T) -> Result<()> {
        let add_path = self.exports.add_path.clone().ok_or_else(|| missing("opa_value_add_path"))?;
        let value = encode(value)?;
        self.patch_data(path, |session, path_addr| {
            let value_addr = session.bridge.load_bytes(&mut session.store, &value)?;
            invoke(
                &mut session.store,
                &add_path,
                (session.data.as_raw(), path_addr.as_raw(), value_addr.as_raw()),
            )
        })
    }

    /// Removes the value at `path` from the loaded data.
    ///
    /// # Errors
    ///
    /// - [`Error::MissingExport`] if the module has no `opa_value_remove_path`
    /// - [`Error::Trap`] if the guest reports a non-zero error code
    pub fn remove_data_path(&mut self, path: &[&str]) -> Result<()> {
        let remove_path = self
            .exports
            .remove_path
            .clone()
            .ok_or_else(|| missing("opa_value_remove_path"))?;
        self.patch_data(path, |session, path_addr| {
            invoke(
                &mut session.store,
                &remove_path,
                (session.data.as_raw(), path_addr.as_raw()),
            )
        })
    }

    /// The module's builtin table.
    #[must_use]
    pub fn builtins(&self) -> &BuiltinTable {
        &self.builtins
    }

    /// The module's entrypoints by name; empty if it exports none.
    #[must_use]
    pub const fn entrypoints(&self) -> &BTreeMap<String, EntrypointId> {
        &self.entrypoints
    }

    /// Current heap checkpoints.
    #[must_use]
    pub const fn heap_checkpoints(&self) -> HeapCheckpoints {
        self.checkpoints
    }

    /// Reads the guest's current heap pointer.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Trap`] if the guest traps.
    pub fn heap_ptr(&mut self) -> Result<Address> {
        invoke(&mut self.store, &self.exports.heap_ptr_get, ()).map(Address::from_raw)
    }

    /// Returns `true` after an abort or trap, until the next successful
    /// [`Session::set_data`].
    #[must_use]
    pub const fn is_tainted(&self) -> bool {
        self.tainted
    }

    /// Largest linear memory size this session has reached, in bytes.
    #[must_use]
    pub fn peak_memory_bytes(&self) -> usize {
        self.store.data().peak_memory_bytes()
    }

    /// Replaces the data with a new `{}` allocated at the base checkpoint.
    ///
    /// The object created at construction is never reused: path updates
    /// may have linked it to allocations above base.
    fn load_empty_data(&mut self) -> Result<()> {
        self.set_heap_ptr(self.checkpoints.base)?;
        self.data = self.bridge.load_json(&mut self.store, &json!({}))?;
        self.checkpoints.data = self.heap_ptr()?;
        Ok(())
    }

    fn set_heap_ptr(&mut self, ptr: Address) -> Result<()> {
        invoke(&mut self.store, &self.exports.heap_ptr_set, ptr.as_raw())
    }

    fn run<T: Serialize + ?Sized>(&mut self, entrypoint: Option<EntrypointId>, input: &T) -> Result<Value> {
        let bytes = encode(input)?;
        refuel(&mut self.store, self.fuel)?;
        self.set_heap_ptr(self.checkpoints.data)?;

        let result = self.eval_bytes(entrypoint, &bytes);
        if let Err(err) = &result
            && err.taints_heap()
        {
            warn!(error = %err, "Evaluation stopped mid-flight; heap state is unreliable");
            self.tainted = true;
        }
        result
    }

    fn eval_bytes(&mut self, entrypoint: Option<EntrypointId>, input: &[u8]) -> Result<Value> {
        let input = self.bridge.load_bytes(&mut self.store, input)?;
        let ctx = invoke(&mut self.store, &self.exports.ctx_new, ())?;
        invoke(&mut self.store, &self.exports.ctx_set_input, (ctx, input.as_raw()))?;
        invoke(&mut self.store, &self.exports.ctx_set_data, (ctx, self.data.as_raw()))?;

        if let Some(id) = entrypoint {
            let set_entrypoint = self
                .exports
                .ctx_set_entrypoint
                .as_ref()
                .ok_or_else(|| missing("opa_eval_ctx_set_entrypoint"))?;
            invoke(&mut self.store, set_entrypoint, (ctx, id.as_raw()))?;
        }

        let code = invoke(&mut self.store, &self.exports.eval, ctx)?;
        if code != 0 {
            return Err(Error::Trap {
                message: format!("eval returned error code {code}"),
            });
        }

        let result = Address::from_raw(invoke(&mut self.store, &self.exports.ctx_get_result, ctx)?);
        self.bridge.dump_json(&mut self.store, result)
    }

    /// Loads `path`, runs `apply` and records the grown data checkpoint.
    fn patch_data(
        &mut self,
        path: &[&str],
        apply: impl FnOnce(&mut Self, Address) -> Result<i32>,
    ) -> Result<()> {
        let path = encode(path)?;
        refuel(&mut self.store, self.fuel)?;
        self.set_heap_ptr(self.checkpoints.data)?;

        let path_addr = self.bridge.load_bytes(&mut self.store, &path)?;
        let code = apply(self, path_addr)?;
        if code != 0 {
            self.set_heap_ptr(self.checkpoints.data)?;
            return Err(Error::Trap {
                message: format!("data path update returned error code {code}"),
            });
        }

        self.checkpoints.data = self.heap_ptr()?;
        debug!(checkpoint = %self.checkpoints.data, "Data patched");
        Ok(())
    }
}

fn missing(name: &str) -> Error {
    Error::MissingExport {
        name: name.to_string(),
        message: "not exported by this policy module".to_string(),
    }
}
