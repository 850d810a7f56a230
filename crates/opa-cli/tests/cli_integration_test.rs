//! End-to-end tests of `opa-eval` argument handling against a real module.

use clap::Parser;
use opa_cli::{Cli, run};
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    policy: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let wasm = wat::parse_str(include_str!("../../opa-wasm-runtime/tests/wasm/policy.wat"))
            .expect("Failed to parse WAT");
        let policy = dir.path().join("policy.wasm");
        fs::write(&policy, wasm).unwrap();
        Self { dir, policy }
    }

    fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn run(&self, args: &[&str]) -> anyhow::Result<String> {
        let policy = self.policy.display().to_string();
        let mut argv = vec!["opa-eval", "--policy", policy.as_str()];
        argv.extend_from_slice(args);

        let cli = Cli::try_parse_from(argv)?;
        let mut out = Vec::new();
        run(&cli, &mut out)?;
        Ok(String::from_utf8(out)?)
    }
}

fn parse(output: &str) -> Value {
    serde_json::from_str(output).expect("output is JSON")
}

#[test]
fn test_evaluate_default_entrypoint() {
    let fixture = Fixture::new();

    let output = fixture.run(&["--input", r#"{"user": "alice"}"#]).unwrap();
    assert_eq!(parse(&output), json!([{"result": {"user": "alice"}}]));
}

#[test]
fn test_input_defaults_to_null() {
    let fixture = Fixture::new();

    let output = fixture.run(&[]).unwrap();
    assert_eq!(parse(&output), json!([{"result": null}]));
}

#[test]
fn test_data_from_file_and_entrypoint() {
    let fixture = Fixture::new();
    let data = fixture.write("data.json", r#"{"world": "world"}"#);
    let data_arg = format!("@{}", data.display());

    let output = fixture
        .run(&["--data", &data_arg, "--entrypoint", "data"])
        .unwrap();
    assert_eq!(parse(&output), json!([{"result": {"world": "world"}}]));
}

#[test]
fn test_bool_output() {
    let fixture = Fixture::new();

    assert_eq!(fixture.run(&["--input", "true", "--bool"]).unwrap(), "true\n");
    assert_eq!(fixture.run(&["--input", "false", "--bool"]).unwrap(), "false\n");
}

#[test]
fn test_list_tables() {
    let fixture = Fixture::new();

    let listing = parse(&fixture.run(&["--list"]).unwrap());
    assert_eq!(listing["builtins"]["0"], "concat");
    assert_eq!(listing["entrypoints"]["echo"], 0);
    assert_eq!(listing["unimplemented"], json!(["custom.missing"]));
}

#[test]
fn test_strict_config_file() {
    let fixture = Fixture::new();
    let config = fixture.write("opa.toml", "strict_builtin_errors = true\n");
    let config_arg = config.display().to_string();

    let lenient = fixture.run(&["--entrypoint", "contains", "--input", "\"x\""]).unwrap();
    assert_eq!(parse(&lenient), json!([]));

    let err = fixture
        .run(&[
            "--config",
            &config_arg,
            "--entrypoint",
            "contains",
            "--input",
            "\"x\"",
        ])
        .unwrap_err();
    let cause = err
        .downcast_ref::<opa_core::Error>()
        .expect("structured error");
    assert!(cause.is_builtin_error());
}

#[test]
fn test_unknown_entrypoint_fails() {
    let fixture = Fixture::new();

    let err = fixture.run(&["--entrypoint", "nope"]).unwrap_err();
    assert!(format!("{err:#}").contains("nope"));
}

#[test]
fn test_missing_policy_file() {
    let fixture = Fixture::new();
    let missing = fixture.dir.path().join("missing.wasm");

    let cli = Cli::parse_from(["opa-eval", "--policy", missing.to_str().unwrap()]);
    let err = run(&cli, &mut Vec::new()).unwrap_err();
    assert!(err.to_string().contains("Failed to read policy"));
}

#[test]
fn test_invalid_data_argument() {
    let fixture = Fixture::new();

    let err = fixture.run(&["--data", "{not json"]).unwrap_err();
    assert!(err.to_string().contains("not valid JSON"));
}
