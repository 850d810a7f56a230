//! Command execution.

use crate::cli::Cli;
use crate::input::{load_config, parse_json_arg};
use anyhow::{Context, Result};
use opa_wasm_runtime::{PolicyRuntime, Session, result_to_bool};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use tracing::{debug, info};

/// Builtin and entrypoint tables of a loaded module.
#[derive(Debug, Serialize)]
pub struct PolicyListing {
    /// Builtin names by the id the module calls them with
    pub builtins: BTreeMap<u32, String>,
    /// Entrypoint ids by name
    pub entrypoints: BTreeMap<String, u32>,
    /// Builtins the module requires that the host does not implement
    pub unimplemented: Vec<String>,
}

impl PolicyListing {
    /// Collects the tables of `session`.
    #[must_use]
    pub fn from_session(session: &Session) -> Self {
        Self {
            builtins: session
                .builtins()
                .iter()
                .map(|(id, slot)| (id.get(), slot.name().to_string()))
                .collect(),
            entrypoints: session
                .entrypoints()
                .iter()
                .map(|(name, id)| (name.clone(), id.get()))
                .collect(),
            unimplemented: session
                .builtins()
                .unimplemented()
                .into_iter()
                .map(str::to_string)
                .collect(),
        }
    }
}

/// Loads the policy and performs what `cli` asks for, writing to `out`.
///
/// # Errors
///
/// Returns an error if an argument cannot be read, or if loading,
/// setting data, or evaluating fails.
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    let runtime = PolicyRuntime::new(config)?;

    let bytes = std::fs::read(&cli.policy)
        .with_context(|| format!("Failed to read policy {}", cli.policy.display()))?;
    let mut session = runtime
        .load_policy(&bytes)
        .with_context(|| format!("Failed to load policy {}", cli.policy.display()))?;
    info!(policy = %cli.policy.display(), "Policy loaded");

    if cli.list {
        let listing = PolicyListing::from_session(&session);
        writeln!(out, "{}", serde_json::to_string_pretty(&listing)?)?;
        return Ok(());
    }

    if let Some(data) = &cli.data {
        session
            .set_data(&parse_json_arg(data)?)
            .context("Failed to set data")?;
    }

    let input = cli
        .input
        .as_deref()
        .map_or(Ok(Value::Null), parse_json_arg)?;
    let results = match &cli.entrypoint {
        Some(name) => session.evaluate_entrypoint(name, &input),
        None => session.evaluate(&input),
    }
    .context("Evaluation failed")?;
    debug!(peak_memory = session.peak_memory_bytes(), "Evaluation finished");

    if cli.as_bool {
        writeln!(out, "{}", result_to_bool(&results))?;
    } else {
        writeln!(out, "{}", serde_json::to_string_pretty(&results)?)?;
    }
    Ok(())
}
