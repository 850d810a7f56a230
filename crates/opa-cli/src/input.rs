//! Reading JSON documents and configuration from arguments.

use anyhow::{Context, Result};
use opa_core::RuntimeConfig;
use serde_json::Value;
use std::fs;
use std::path::Path;

/// Parses a `--data`/`--input` argument.
///
/// `@path` reads the document from a file; anything else is parsed as
/// JSON text.
///
/// # Errors
///
/// Returns an error if the file cannot be read or the text is not JSON.
///
/// # Examples
///
/// ```
/// use opa_cli::input::parse_json_arg;
/// use serde_json::json;
///
/// assert_eq!(parse_json_arg(r#"{"user": "alice"}"#)?, json!({"user": "alice"}));
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn parse_json_arg(arg: &str) -> Result<Value> {
    if let Some(path) = arg.strip_prefix('@') {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read JSON document from {path}"))?;
        return serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {path}"));
    }
    serde_json::from_str(arg).context("Argument is not valid JSON (use @file to read a file)")
}

/// Loads the runtime configuration, or the defaults without a file.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not valid TOML for
/// [`RuntimeConfig`], or fails validation.
pub fn load_config(path: Option<&Path>) -> Result<RuntimeConfig> {
    let Some(path) = path else {
        return Ok(RuntimeConfig::default());
    };

    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    let config: RuntimeConfig = toml::from_str(&text)
        .with_context(|| format!("Invalid config file {}", path.display()))?;
    config.validate()?;
    tracing::debug!(?config, "Loaded runtime configuration");
    Ok(config)
}
