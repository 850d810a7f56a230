//! Host implementations of OPA builtin functions.
//!
//! Compiled policy modules cannot implement every builtin themselves; they
//! call back into the host by numeric id. This crate provides the functions
//! the host answers those calls with, plus the name-keyed
//! [`BuiltinRegistry`] the runtime resolves a module's builtin table against.
//!
//! Every builtin is a pure function over decoded JSON arguments that either
//! produces a value, produces *no value* (`Ok(None)`, the expression is
//! undefined), or rejects its arguments with a [`BuiltinError`].
//!
//! # Examples
//!
//! ```
//! use opa_builtins::{Builtin, BuiltinRegistry};
//! use serde_json::json;
//!
//! let registry = BuiltinRegistry::standard();
//! let concat = registry.get("concat").unwrap();
//! assert_eq!(concat.arity(), 2);
//!
//! let joined = concat.call(&[json!("/"), json!(["", "foo", "bar"])]).unwrap();
//! assert_eq!(joined, Some(json!("/foo/bar")));
//!
//! assert_eq!(Builtin::RegexSplit.name(), "regex.split");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs, missing_debug_implementations)]

mod args;
mod error;
mod registry;

pub mod aggregates;
pub mod conversions;
pub mod patterns;
pub mod strings;
pub mod time;
pub mod types;

pub use error::{BuiltinError, BuiltinResult};
pub use registry::{Builtin, BuiltinEntry, BuiltinFn, BuiltinRegistry, guest_name};
