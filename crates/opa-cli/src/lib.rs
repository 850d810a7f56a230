//! Command-line evaluator for compiled OPA policy modules.
//!
//! The library half of `opa-eval`, split out so argument handling and
//! evaluation can be tested without spawning the binary.
//!
//! # Examples
//!
//! ```bash
//! # Evaluate the default entrypoint
//! opa-eval --policy policy.wasm --data @data.json --input '{"user": "alice"}'
//!
//! # Decision only
//! opa-eval -p policy.wasm -e authz/allow -i @input.json --bool
//!
//! # Inspect what the module needs from the host
//! opa-eval -p policy.wasm --list
//! ```

pub mod cli;
pub mod input;
pub mod run;

pub use cli::Cli;
pub use run::{PolicyListing, run};
