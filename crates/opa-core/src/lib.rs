//! Core types, configuration, and errors for hosting compiled OPA policies.
//!
//! This crate provides the foundational types shared by the builtin,
//! runtime, and CLI crates of the workspace.
//!
//! # Architecture
//!
//! The core consists of:
//! - Strong domain types (`Address`, `BuiltinId`, `EntrypointId`, `MemoryLimit`)
//! - One structured error taxonomy covering every boundary failure
//! - Runtime configuration with a builder and TOML-friendly serde support

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod config;
mod error;
mod types;

pub use config::{RuntimeConfig, RuntimeConfigBuilder};
pub use error::{Error, Result};
pub use types::{Address, BuiltinId, EntrypointId, MemoryLimit};
