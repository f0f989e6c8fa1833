//! CLI E2E tests.
//!
//! Validates:
//! - JSON envelope shape of command output
//! - Exit codes: 0 clean, 1 findings, 10 config error, 12 catalog error
//! - Errors on stderr as JSON under `--format json`
//! - Text output for humans

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::{tempdir, TempDir};

// ============================================================================
// Helpers
// ============================================================================

/// A pm-core command isolated from the caller's environment.
fn pm_core(home: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("pm-core");
    cmd.timeout(Duration::from_secs(60))
        .env_remove("PM_CONFIG")
        .env_remove("PM_DATA_DIR")
        .env_remove("PM_SIMILARITY_THRESHOLD")
        .env_remove("PM_MIN_OCCURRENCES")
        .env_remove("PM_OBSOLETE_DAYS")
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"));
    cmd
}

fn seeded_data_dir() -> TempDir {
    let dir = tempdir().unwrap();
    let root = dir.path();
    fs::write(
        root.join("work_units.json"),
        json!([
            {"id": "wu-1", "key": "SD-301"},
            {"id": "wu-2", "key": "SD-302"}
        ])
        .to_string(),
    )
    .unwrap();
    fs::create_dir_all(root.join("retrospectives")).unwrap();
    for wu in ["wu-1", "wu-2"] {
        fs::write(
            root.join(format!("retrospectives/{wu}.json")),
            json!({"improvement_items": ["schema drift broke the orders table"]}).to_string(),
        )
        .unwrap();
    }
    dir
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

fn run_analyses(data: &Path) {
    pm_core(data)
        .args(["--data-dir"])
        .arg(data)
        .args(["analyze", "wu-1"])
        .assert()
        .code(0);
    pm_core(data)
        .args(["--data-dir"])
        .arg(data)
        .args(["analyze", "wu-2"])
        .assert()
        .code(1);
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn config_show_reports_defaults() {
    let home = tempdir().unwrap();
    let output = pm_core(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .get_output()
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["command"], "config show");
    assert!(json.get("schema_version").is_some());
    assert!(json.get("generated_at").is_some());
    assert_eq!(json["snapshot"]["source"]["kind"], "defaults");
    assert_eq!(
        json["snapshot"]["config"]["matching"]["similarity_threshold"],
        0.7
    );
}

#[test]
fn missing_explicit_config_exits_10() {
    let home = tempdir().unwrap();
    let missing = home.path().join("nope.toml");
    pm_core(home.path())
        .arg("--config")
        .arg(&missing)
        .args(["config", "validate"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("\"code\":10"));
}

#[test]
fn invalid_threshold_in_config_exits_10() {
    let home = tempdir().unwrap();
    let path = home.path().join("config.json");
    fs::write(&path, r#"{"matching": {"similarity_threshold": 1.5}}"#).unwrap();
    pm_core(home.path())
        .arg("--config")
        .arg(&path)
        .args(["--format", "text", "config", "validate"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("similarity_threshold"));
}

#[test]
fn config_schema_is_json() {
    let home = tempdir().unwrap();
    let output = pm_core(home.path())
        .args(["config", "schema"])
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert!(json.get("properties").is_some());
}

// ============================================================================
// Analyze and catalog
// ============================================================================

#[test]
fn analyze_exit_code_reflects_findings() {
    let data = seeded_data_dir();
    run_analyses(data.path());

    let output = pm_core(data.path())
        .arg("--data-dir")
        .arg(data.path())
        .args(["patterns", "list"])
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert_eq!(json["count"], 1);
    assert_eq!(json["patterns"][0]["patternId"], "PAT-001");
    assert_eq!(json["patterns"][0]["category"], "database");
    assert_eq!(json["patterns"][0]["severity"], "high");
}

#[test]
fn analyze_unknown_work_unit_is_clean() {
    let data = seeded_data_dir();
    let output = pm_core(data.path())
        .arg("--data-dir")
        .arg(data.path())
        .args(["analyze", "wu-404"])
        .assert()
        .code(0)
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert_eq!(json["command"], "analyze");
    assert_eq!(json["result"]["workUnitId"], "wu-404");
    assert_eq!(json["result"]["issuesFound"], json!([]));
}

#[test]
fn analyze_text_output() {
    let data = seeded_data_dir();
    pm_core(data.path())
        .arg("--data-dir")
        .arg(data.path())
        .args(["--format", "text", "analyze", "wu-1"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("# Analysis: wu-1"))
        .stdout(predicate::str::contains("Issues found: 1"));
}

#[test]
fn show_pattern_and_missing_pattern() {
    let data = seeded_data_dir();
    run_analyses(data.path());

    let output = pm_core(data.path())
        .arg("--data-dir")
        .arg(data.path())
        .args(["patterns", "show", "PAT-001"])
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert_eq!(json["pattern"]["occurrenceCount"], 2);
    assert_eq!(json["links"].as_array().unwrap().len(), 1);

    pm_core(data.path())
        .arg("--data-dir")
        .arg(data.path())
        .args(["patterns", "show", "PAT-009"])
        .assert()
        .code(12)
        .stderr(predicate::str::contains("PAT-009"));
}

#[test]
fn related_finds_similar_pattern() {
    let data = seeded_data_dir();
    run_analyses(data.path());

    let output = pm_core(data.path())
        .arg("--data-dir")
        .arg(data.path())
        .args(["related", "schema drift broke the orders table again"])
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output);
    let related = json["related"].as_array().unwrap();
    assert_eq!(related.len(), 1);
    assert_eq!(json["threshold"], 0.7);
}

#[test]
fn maintenance_commands_run_on_empty_catalog() {
    let data = tempdir().unwrap();
    pm_core(data.path())
        .arg("--data-dir")
        .arg(data.path())
        .args(["--format", "text", "maintain", "audit"])
        .assert()
        .success()
        .stdout(predicate::str::contains("# Audit: 0 patterns"));

    let output = pm_core(data.path())
        .arg("--data-dir")
        .arg(data.path())
        .args(["maintain", "dedup", "--dry-run"])
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert_eq!(json["report"]["groups_merged"], 0);
    assert_eq!(json["report"]["dry_run"], true);
}

#[test]
fn surface_on_empty_catalog_is_empty() {
    let data = tempdir().unwrap();
    let output = pm_core(data.path())
        .arg("--data-dir")
        .arg(data.path())
        .args(["surface", "--limit", "3"])
        .assert()
        .success()
        .get_output()
        .clone();
    let json = stdout_json(&output);
    assert_eq!(json["surfaced"]["patterns"], json!([]));
}

#[test]
fn completions_generate() {
    let home = tempdir().unwrap();
    pm_core(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pm-core"));
}
