//! Module instantiation.
//!
//! Loading is a single step: create the store and shared memory, link the
//! host imports, instantiate, resolve the guest exports, then read the
//! builtin and entrypoint tables the module reports about itself.

use crate::bridge::{MemoryBridge, guest_error, invoke};
use crate::dispatch::BuiltinTable;
use crate::host::{self, HostState};
use crate::limits::MemoryLimiter;
use opa_builtins::BuiltinRegistry;
use opa_core::{Address, EntrypointId, Error, Result, RuntimeConfig};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use wasmtime::{
    Engine, Instance, Linker, Memory, MemoryType, Module, Store, TypedFunc, WasmParams,
    WasmResults,
};

/// Guest exports the session drives directly.
#[derive(Clone)]
pub(crate) struct PolicyExports {
    pub(crate) eval: TypedFunc<i32, i32>,
    pub(crate) ctx_new: TypedFunc<(), i32>,
    pub(crate) ctx_set_input: TypedFunc<(i32, i32), ()>,
    pub(crate) ctx_set_data: TypedFunc<(i32, i32), ()>,
    pub(crate) ctx_get_result: TypedFunc<i32, i32>,
    pub(crate) heap_ptr_get: TypedFunc<(), i32>,
    pub(crate) heap_ptr_set: TypedFunc<i32, ()>,
    pub(crate) ctx_set_entrypoint: Option<TypedFunc<(i32, i32), ()>>,
    pub(crate) add_path: Option<TypedFunc<(i32, i32, i32), i32>>,
    pub(crate) remove_path: Option<TypedFunc<(i32, i32), i32>>,
}

impl std::fmt::Debug for PolicyExports {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyExports")
            .field("ctx_set_entrypoint", &self.ctx_set_entrypoint.is_some())
            .field("add_path", &self.add_path.is_some())
            .field("remove_path", &self.remove_path.is_some())
            .finish_non_exhaustive()
    }
}

/// Everything a session needs from a freshly instantiated module.
#[derive(Debug)]
pub(crate) struct LoadedPolicy {
    pub(crate) store: Store<HostState>,
    pub(crate) bridge: MemoryBridge,
    pub(crate) exports: PolicyExports,
    pub(crate) builtins: Arc<BuiltinTable>,
    pub(crate) entrypoints: BTreeMap<String, EntrypointId>,
}

fn required<P, R>(instance: &Instance, store: &mut Store<HostState>, name: &str) -> Result<TypedFunc<P, R>>
where
    P: WasmParams,
    R: WasmResults,
{
    instance
        .get_typed_func::<P, R>(&mut *store, name)
        .map_err(|e| Error::MissingExport {
            name: name.to_string(),
            message: format!("{e:#}"),
        })
}

fn optional<P, R>(
    instance: &Instance,
    store: &mut Store<HostState>,
    name: &str,
) -> Result<Option<TypedFunc<P, R>>>
where
    P: WasmParams,
    R: WasmResults,
{
    if instance.get_func(&mut *store, name).is_none() {
        return Ok(None);
    }
    required(instance, store, name).map(Some)
}

/// Resets the fuel budget when metering is enabled.
pub(crate) fn refuel(store: &mut Store<HostState>, fuel: Option<u64>) -> Result<()> {
    if let Some(fuel) = fuel {
        store.set_fuel(fuel).map_err(|e| Error::WasmError {
            message: format!("Failed to set fuel: {e}"),
        })?;
    }
    Ok(())
}

/// Instantiates `module` in a fresh store with its own linear memory.
///
/// # Errors
///
/// - [`Error::WasmError`] if memory creation, linking or instantiation fails
/// - [`Error::MissingExport`] if a required export is absent or mistyped
/// - [`Error::Serialization`] if the builtin or entrypoint table is malformed
pub(crate) fn instantiate(
    engine: &Engine,
    module: &Module,
    config: &RuntimeConfig,
    registry: &BuiltinRegistry,
) -> Result<LoadedPolicy> {
    let state = HostState::new(
        MemoryLimiter::new(config.memory_limit),
        config.strict_builtin_errors,
    );
    let mut store = Store::new(engine, state);
    store.limiter(|state| state.limiter());
    refuel(&mut store, config.max_fuel)?;

    let memory = Memory::new(
        &mut store,
        MemoryType::new(config.initial_memory_pages, None),
    )
    .map_err(|e| Error::WasmError {
        message: format!(
            "Failed to create {} page linear memory: {e}",
            config.initial_memory_pages
        ),
    })?;

    let mut linker = Linker::new(engine);
    linker
        .define(&store, "env", "memory", memory)
        .map_err(|e| Error::WasmError {
            message: format!("Failed to link memory: {e}"),
        })?;
    host::link_imports(&mut linker, memory)?;

    let instance = linker
        .instantiate(&mut store, module)
        .map_err(|e| match guest_error(e) {
            Error::Trap { message } => Error::WasmError {
                message: format!("Failed to instantiate policy module: {message}"),
            },
            other => other,
        })?;

    let bridge = MemoryBridge::new(
        memory,
        required(&instance, &mut store, "opa_malloc")?,
        required(&instance, &mut store, "opa_json_parse")?,
        required(&instance, &mut store, "opa_json_dump")?,
    );
    let exports = PolicyExports {
        eval: required(&instance, &mut store, "eval")?,
        ctx_new: required(&instance, &mut store, "opa_eval_ctx_new")?,
        ctx_set_input: required(&instance, &mut store, "opa_eval_ctx_set_input")?,
        ctx_set_data: required(&instance, &mut store, "opa_eval_ctx_set_data")?,
        ctx_get_result: required(&instance, &mut store, "opa_eval_ctx_get_result")?,
        heap_ptr_get: required(&instance, &mut store, "opa_heap_ptr_get")?,
        heap_ptr_set: required(&instance, &mut store, "opa_heap_ptr_set")?,
        ctx_set_entrypoint: optional(&instance, &mut store, "opa_eval_ctx_set_entrypoint")?,
        add_path: optional(&instance, &mut store, "opa_value_add_path")?,
        remove_path: optional(&instance, &mut store, "opa_value_remove_path")?,
    };

    let list_builtins: TypedFunc<(), i32> = required(&instance, &mut store, "builtins")?;
    let names = Address::from_raw(invoke(&mut store, &list_builtins, ())?);
    let builtins = Arc::new(BuiltinTable::resolve(
        bridge.dump_json(&mut store, names)?,
        registry,
    )?);

    let entrypoints = match optional::<(), i32>(&instance, &mut store, "entrypoints")? {
        Some(list) => {
            let addr = Address::from_raw(invoke(&mut store, &list, ())?);
            let ids: BTreeMap<String, u32> = serde_json::from_value(bridge.dump_json(&mut store, addr)?)
                .map_err(|e| Error::serialization("malformed entrypoint table", e))?;
            ids.into_iter()
                .map(|(name, id)| (name, EntrypointId::new(id)))
                .collect()
        }
        None => BTreeMap::new(),
    };

    debug!(
        builtins = builtins.len(),
        unimplemented = builtins.unimplemented().len(),
        entrypoints = entrypoints.len(),
        "Policy module instantiated"
    );

    store.data_mut().attach(bridge.clone(), Arc::clone(&builtins));

    Ok(LoadedPolicy {
        store,
        bridge,
        exports,
        builtins,
        entrypoints,
    })
}
