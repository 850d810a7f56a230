//! Sandboxed host for compiled OPA policy modules.
//!
//! A policy module carries its own evaluator. This crate stands up the
//! linear memory and imports it expects, moves JSON values across the
//! boundary, answers its builtin callbacks, and manages evaluation
//! sessions with heap checkpointing.
//!
//! # Examples
//!
//! ```no_run
//! use opa_wasm_runtime::load_policy;
//! use serde_json::json;
//!
//! # fn example() -> opa_core::Result<()> {
//! let bytes = std::fs::read("policy.wasm").expect("policy file");
//! let mut session = load_policy(&bytes)?;
//!
//! session.set_data(&json!({"roles": {"alice": ["admin"]}}))?;
//! if session.evaluate_to_bool(&json!({"user": "alice"}))? {
//!     println!("allowed");
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs, missing_debug_implementations)]

mod bridge;
mod dispatch;
mod host;
mod limits;
mod loader;
mod runtime;
mod session;

pub mod cache;

pub use cache::{CacheStats, ModuleCache};
pub use dispatch::{BuiltinSlot, BuiltinTable};
pub use host::GUEST_LOG_TARGET;
pub use runtime::{PolicyRuntime, load_policy};
pub use session::{HeapCheckpoints, Session, result_to_bool};
