//! Host imports offered to policy modules.
//!
//! Every policy module imports the same `env` namespace:
//!
//! - `memory`: linear memory created by the host
//! - `opa_abort(addr)`: stop evaluation with a message
//! - `opa_println(addr)`: diagnostic output
//! - `opa_builtin0` to `opa_builtin4`: builtin calls by id, with an
//!   evaluation context and zero to four value arguments

use crate::bridge::{MemoryBridge, decode_c_string};
use crate::dispatch::{self, BuiltinTable};
use crate::limits::MemoryLimiter;
use opa_core::{Address, BuiltinId, Error, Result};
use std::sync::Arc;
use tracing::{info, warn};
use wasmtime::{Caller, Linker, Memory};

/// Target diagnostic guest output is logged under.
pub const GUEST_LOG_TARGET: &str = "opa_wasm_runtime::guest";

/// Store data for one policy session.
#[derive(Debug)]
pub(crate) struct HostState {
    limiter: MemoryLimiter,
    strict_builtins: bool,
    link: Option<GuestLink>,
}

/// Guest exports and builtin table, available once instantiation is done.
#[derive(Debug, Clone)]
struct GuestLink {
    bridge: MemoryBridge,
    builtins: Arc<BuiltinTable>,
}

impl HostState {
    pub(crate) const fn new(limiter: MemoryLimiter, strict_builtins: bool) -> Self {
        Self {
            limiter,
            strict_builtins,
            link: None,
        }
    }

    pub(crate) const fn limiter(&mut self) -> &mut MemoryLimiter {
        &mut self.limiter
    }

    pub(crate) const fn peak_memory_bytes(&self) -> usize {
        self.limiter.peak_bytes()
    }

    pub(crate) const fn strict_builtins(&self) -> bool {
        self.strict_builtins
    }

    /// Completes the host side once the guest's exports are known.
    pub(crate) fn attach(&mut self, bridge: MemoryBridge, builtins: Arc<BuiltinTable>) {
        self.link = Some(GuestLink { bridge, builtins });
    }

    /// Returns the bridge and builtin table for a callback.
    ///
    /// # Errors
    ///
    /// Fails with [`Error::Trap`] if the guest calls a builtin before the
    /// loader has read its builtin table.
    pub(crate) fn link(&self) -> Result<(MemoryBridge, Arc<BuiltinTable>)> {
        self.link
            .as_ref()
            .map(|link| (link.bridge.clone(), Arc::clone(&link.builtins)))
            .ok_or_else(|| Error::Trap {
                message: "builtin called before the module finished loading".to_string(),
            })
    }
}

fn link_error(name: &'static str) -> impl FnOnce(wasmtime::Error) -> Error {
    move |e| Error::WasmError {
        message: format!("Failed to link {name}: {e}"),
    }
}

fn call_builtin(caller: &mut Caller<'_, HostState>, id: i32, args: &[i32]) -> wasmtime::Result<i32> {
    let args: Vec<Address> = args.iter().copied().map(Address::from_raw).collect();
    dispatch::dispatch(caller, BuiltinId::from_raw(id), &args)
        .map(Address::as_raw)
        .map_err(wasmtime::Error::new)
}

/// Registers the `env` function imports against the shared memory.
///
/// # Errors
///
/// Returns [`Error::WasmError`] if a definition clashes with an existing one.
pub(crate) fn link_imports(linker: &mut Linker<HostState>, memory: Memory) -> Result<()> {
    linker
        .func_wrap(
            "env",
            "opa_abort",
            move |caller: Caller<'_, HostState>, addr: i32| -> wasmtime::Result<()> {
                let addr = Address::from_raw(addr);
                let message = decode_c_string(memory.data(&caller), addr)
                    .unwrap_or_else(|e| format!("<unreadable abort message at {addr}: {e}>"));
                warn!(%message, "Policy aborted");
                Err(wasmtime::Error::new(Error::GuestAbort { message }))
            },
        )
        .map_err(link_error("opa_abort"))?;

    linker
        .func_wrap(
            "env",
            "opa_println",
            move |caller: Caller<'_, HostState>, addr: i32| {
                let addr = Address::from_raw(addr);
                match decode_c_string(memory.data(&caller), addr) {
                    Ok(text) => info!(target: GUEST_LOG_TARGET, "{}", text),
                    Err(e) => warn!(%addr, error = %e, "Unreadable guest print"),
                }
            },
        )
        .map_err(link_error("opa_println"))?;

    linker
        .func_wrap(
            "env",
            "opa_builtin0",
            |mut caller: Caller<'_, HostState>, id: i32, _ctx: i32| {
                call_builtin(&mut caller, id, &[])
            },
        )
        .map_err(link_error("opa_builtin0"))?;

    linker
        .func_wrap(
            "env",
            "opa_builtin1",
            |mut caller: Caller<'_, HostState>, id: i32, _ctx: i32, a: i32| {
                call_builtin(&mut caller, id, &[a])
            },
        )
        .map_err(link_error("opa_builtin1"))?;

    linker
        .func_wrap(
            "env",
            "opa_builtin2",
            |mut caller: Caller<'_, HostState>, id: i32, _ctx: i32, a: i32, b: i32| {
                call_builtin(&mut caller, id, &[a, b])
            },
        )
        .map_err(link_error("opa_builtin2"))?;

    linker
        .func_wrap(
            "env",
            "opa_builtin3",
            |mut caller: Caller<'_, HostState>, id: i32, _ctx: i32, a: i32, b: i32, c: i32| {
                call_builtin(&mut caller, id, &[a, b, c])
            },
        )
        .map_err(link_error("opa_builtin3"))?;

    linker
        .func_wrap(
            "env",
            "opa_builtin4",
            |mut caller: Caller<'_, HostState>,
             id: i32,
             _ctx: i32,
             a: i32,
             b: i32,
             c: i32,
             d: i32| { call_builtin(&mut caller, id, &[a, b, c, d]) },
        )
        .map_err(link_error("opa_builtin4"))?;

    tracing::debug!("Host imports linked: opa_abort, opa_println, opa_builtin0..4");
    Ok(())
}
