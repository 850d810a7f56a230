//! Command-line arguments.

use clap::Parser;
use std::path::PathBuf;

/// Evaluate a compiled OPA policy module.
///
/// JSON arguments take either a literal document or `@path` to read one
/// from a file.
#[derive(Parser, Debug)]
#[command(name = "opa-eval")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Compiled policy module (.wasm)
    #[arg(short, long)]
    pub policy: PathBuf,

    /// Data document, as JSON or @file
    #[arg(short, long)]
    pub data: Option<String>,

    /// Input document, as JSON or @file (default: null)
    #[arg(short, long)]
    pub input: Option<String>,

    /// Entrypoint to evaluate instead of the default
    #[arg(short, long)]
    pub entrypoint: Option<String>,

    /// Print only whether the policy produced a single `true` result
    #[arg(long = "bool")]
    pub as_bool: bool,

    /// Runtime configuration file (TOML)
    #[arg(short, long, env = "OPA_EVAL_CONFIG")]
    pub config: Option<PathBuf>,

    /// List the module's builtins and entrypoints instead of evaluating
    #[arg(long, conflicts_with_all = ["input", "entrypoint", "as_bool"])]
    pub list: bool,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    pub verbose: bool,
}
