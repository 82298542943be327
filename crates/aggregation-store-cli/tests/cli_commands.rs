// crates/aggregation-store-cli/tests/cli_commands.rs
// ============================================================================
// Module: CLI Command Tests
// Description: Integration tests for recovery sweep and repair commands.
// Purpose: Ensure commands act on the configured store and fail closed.
// Dependencies: aggregation-store-cli binary, aggregation-store-config, tempfile
// ============================================================================

//! ## Overview
//! Seeds a SQLite-backed store through the config crate, then runs the CLI
//! binary against the same config file and checks its JSON-line output.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::process::Command;
use std::process::Output;

use aggregation_store_config::AggregationStoreConfig;
use aggregation_store_config::build_repository;
use aggregation_store_core::AggregationKey;
use aggregation_store_core::Exchange;
use aggregation_store_core::JsonCodec;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn cli_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_aggregation-store"))
}

fn write_config(root: &Path) -> PathBuf {
    let db = root.join("aggregation.db");
    let config = format!(
        r#"
[repository]
table = "aggregation"
fixed_prefix = [{{ column = "repository", value = "orders" }}]

[session]
backend = "sqlite"
[session.options]
path = "{}"
"#,
        db.to_string_lossy()
    );
    let path = root.join("aggregation-store.toml");
    fs::write(&path, config).unwrap();
    path
}

fn seed(config_path: &Path, groups: &[(&str, &str)]) {
    let config = AggregationStoreConfig::load(Some(config_path)).unwrap();
    let repository =
        build_repository(&config, JsonCodec::<Exchange>::new()).unwrap().start().unwrap();
    for (key, exchange_id) in groups {
        repository
            .add(&AggregationKey::new(*key), Exchange::new(*exchange_id, json!({ "key": key })))
            .unwrap();
    }
    repository.stop().unwrap();
}

fn run(config_path: &Path, args: &[&str]) -> Output {
    let mut command = Command::new(cli_bin());
    command.args(args).arg("--config").arg(config_path);
    command.output().unwrap()
}

fn json_lines(output: &Output) -> Vec<Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[test]
fn keys_lists_in_flight_groups() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    seed(&config, &[("k1", "e1"), ("k2", "e2")]);

    let output = run(&config, &["keys"]);
    assert!(output.status.success());
    let mut lines = json_lines(&output);
    lines.sort_by_key(|line| line["aggregation_key"].as_str().map(str::to_string));
    assert_eq!(
        lines,
        vec![
            json!({ "aggregation_key": "k1", "exchange_id": "e1" }),
            json!({ "aggregation_key": "k2", "exchange_id": "e2" }),
        ]
    );
}

#[test]
fn get_reports_presence_and_absence() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    seed(&config, &[("k1", "e1")]);

    let found = json_lines(&run(&config, &["get", "k1"]));
    assert_eq!(found[0]["found"], json!(true));
    assert_eq!(found[0]["exchange"]["exchange_id"], json!("e1"));
    assert_eq!(found[0]["exchange"]["body"], json!({ "key": "k1" }));

    let missing = run(&config, &["get", "nope"]);
    assert!(missing.status.success());
    assert_eq!(json_lines(&missing), vec![json!({ "aggregation_key": "nope", "found": false })]);
}

#[test]
fn confirm_and_remove_delete_rows() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    seed(&config, &[("k1", "e1"), ("k2", "e2")]);

    let confirmed = json_lines(&run(&config, &["confirm", "e1"]));
    assert_eq!(
        confirmed,
        vec![json!({ "exchange_id": "e1", "matched": 1, "deleted": 1, "stale": 0 })]
    );

    let removed = json_lines(&run(&config, &["remove", "k2"]));
    assert_eq!(removed, vec![json!({ "aggregation_key": "k2", "removed": true })]);

    let absent = run(&config, &["remove", "never"]);
    assert!(absent.status.success());

    let keys = run(&config, &["keys"]);
    assert!(json_lines(&keys).is_empty());
}

#[test]
fn config_validate_accepts_and_rejects() {
    let temp = TempDir::new().unwrap();
    let config = write_config(temp.path());
    let output = run(&config, &["config", "validate"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("config valid"));

    let invalid = temp.path().join("invalid.toml");
    fs::write(&invalid, "[repository]\ntable = \"aggregation\"\n[session]\nbackend = \"cassandra\"\n")
        .unwrap();
    let output = run(&invalid, &["config", "validate"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown session backend"));

    let bad_option = temp.path().join("bad-option.toml");
    fs::write(
        &bad_option,
        "[repository]\ntable = \"aggregation\"\n[session]\nbackend = \"sqlite\"\n[session.options]\npath = \"a.db\"\njournal_mode = \"bogus\"\n",
    )
    .unwrap();
    let output = run(&bad_option, &["config", "validate"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("journal_mode must be wal or delete"));
}

#[test]
fn missing_config_fails_closed() {
    let temp = TempDir::new().unwrap();
    let output = run(&temp.path().join("missing.toml"), &["keys"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to load config"));
}
