//! Engine ownership and policy loading.
//!
//! # Examples
//!
//! ```no_run
//! use opa_core::RuntimeConfig;
//! use opa_wasm_runtime::PolicyRuntime;
//! use serde_json::json;
//!
//! # fn example() -> opa_core::Result<()> {
//! let config = RuntimeConfig::builder()
//!     .memory_limit_mb(64)
//!     .max_fuel(50_000_000)
//!     .build()?;
//! let runtime = PolicyRuntime::new(config)?;
//!
//! let bytes = std::fs::read("policy.wasm").expect("policy file");
//! let mut session = runtime.load_policy(&bytes)?;
//! let allowed = session.evaluate_to_bool(&json!({"user": "alice"}))?;
//! # Ok(())
//! # }
//! ```

use crate::cache::ModuleCache;
use crate::loader;
use crate::session::Session;
use opa_builtins::BuiltinRegistry;
use opa_core::{Error, Result, RuntimeConfig};
use std::time::Instant;
use tracing::{debug, info};
use wasmtime::{Config, Engine, Module, Strategy, WasmBacktraceDetails};

/// Compiles policy modules and creates sessions from them.
///
/// `Send` and `Sync`: one runtime can load policies for many threads, each
/// of which gets an independent [`Session`].
pub struct PolicyRuntime {
    engine: Engine,
    config: RuntimeConfig,
    registry: BuiltinRegistry,
    module_cache: ModuleCache,
}

impl std::fmt::Debug for PolicyRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PolicyRuntime")
            .field("config", &self.config)
            .field("builtins", &self.registry.len())
            .field("module_cache", &self.module_cache)
            .finish_non_exhaustive()
    }
}

impl PolicyRuntime {
    /// Creates a runtime with the standard builtins.
    ///
    /// # Errors
    ///
    /// [`Error::ConfigError`] for an invalid configuration,
    /// [`Error::WasmError`] if the engine cannot be created.
    pub fn new(config: RuntimeConfig) -> Result<Self> {
        Self::with_registry(config, BuiltinRegistry::standard())
    }

    /// Creates a runtime answering builtin calls from `registry`.
    ///
    /// # Errors
    ///
    /// Same as [`PolicyRuntime::new`].
    pub fn with_registry(config: RuntimeConfig, registry: BuiltinRegistry) -> Result<Self> {
        config.validate()?;

        let mut wasmtime_config = Config::new();
        wasmtime_config.wasm_backtrace_details(WasmBacktraceDetails::Enable);
        wasmtime_config.strategy(Strategy::Cranelift);
        if config.max_fuel.is_some() {
            wasmtime_config.consume_fuel(true);
        }

        let engine = Engine::new(&wasmtime_config).map_err(|e| Error::WasmError {
            message: format!("Failed to create Wasmtime engine: {e}"),
        })?;
        let module_cache = ModuleCache::new(config.module_cache_capacity);

        debug!(builtins = registry.len(), "Policy runtime created");
        Ok(Self {
            engine,
            config,
            registry,
            module_cache,
        })
    }

    /// Compiles `bytes`, or reuses a cached compilation of identical bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::WasmError`] if the bytes are not a valid module.
    pub fn compile(&self, bytes: &[u8]) -> Result<Module> {
        let key = ModuleCache::key_for(bytes);
        if let Some(module) = self.module_cache.get(&key) {
            debug!(key = %key, "Using cached policy module");
            return Ok(module);
        }

        debug!("Compiling policy module ({} bytes)", bytes.len());
        let started = Instant::now();
        let module = Module::new(&self.engine, bytes).map_err(|e| Error::WasmError {
            message: format!("Failed to compile policy module: {e}"),
        })?;
        info!("Policy module compiled in {:?}", started.elapsed());

        self.module_cache.insert(key, module.clone());
        Ok(module)
    }

    /// Compiles (or reuses) `bytes` and opens a fresh session on it.
    ///
    /// # Errors
    ///
    /// Compilation, instantiation and export errors, plus any failure
    /// loading the initial empty data value.
    pub fn load_policy(&self, bytes: &[u8]) -> Result<Session> {
        let module = self.compile(bytes)?;
        let policy = loader::instantiate(&self.engine, &module, &self.config, &self.registry)?;
        Session::new(policy, self.config.max_fuel)
    }

    /// Configuration sessions are created with.
    #[must_use]
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Builtins sessions resolve their modules against.
    #[must_use]
    pub const fn registry(&self) -> &BuiltinRegistry {
        &self.registry
    }

    /// Compiled module cache.
    #[must_use]
    pub const fn module_cache(&self) -> &ModuleCache {
        &self.module_cache
    }

    /// Drops every cached compilation.
    pub fn clear_cache(&self) {
        self.module_cache.clear();
    }
}

/// Loads a policy with the default configuration and standard builtins.
///
/// Creates a throwaway [`PolicyRuntime`]; keep a runtime around instead
/// when loading the same policy repeatedly.
///
/// # Errors
///
/// Same as [`PolicyRuntime::load_policy`].
pub fn load_policy(bytes: &[u8]) -> Result<Session> {
    PolicyRuntime::new(RuntimeConfig::default())?.load_policy(bytes)
}
