//! End-to-end tests for the pa-core binary.
//!
//! Every test writes a real dataset file and runs the compiled binary with
//! an isolated configuration environment.

mod support;

use assert_cmd::Command;
use pa_common::ProcessInstanceRecord;
use pa_core::store::{AccessGrant, Dataset};
use predicates::prelude::*;
use serde_json::Value;
use std::path::{Path, PathBuf};
use support::fixtures::{definition, instances};
use tempfile::TempDir;

const KEY: &str = "invoice";

/// Temp directory holding a dataset, also used as config home.
struct Sandbox {
    dir: TempDir,
    dataset: PathBuf,
}

impl Sandbox {
    fn new(dataset: &Dataset) -> Self {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("dataset.json");
        std::fs::write(&path, serde_json::to_string(dataset).unwrap()).unwrap();
        Self { dir, dataset: path }
    }

    fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("pa-core").expect("pa-core binary should exist");
        cmd.env_remove("PA_ANALYSIS_CONFIG")
            .env_remove("PA_USER")
            .env_remove("RUST_LOG")
            .env("PA_CONFIG_DIR", self.dir.path())
            .env("XDG_CONFIG_HOME", self.dir.path())
            .env("HOME", self.dir.path())
            .env("PA_DATASET", &self.dataset);
        cmd
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }
}

fn branch_dataset() -> Dataset {
    let flows = [
        ("start", "gw"),
        ("gw", "A"),
        ("gw", "B"),
        ("A", "end"),
        ("B", "dead"),
    ];
    let mut records = instances(KEY, "a", 10, &["start", "gw", "A", "end"]);
    records.extend(instances(KEY, "b", 5, &["start", "gw", "B", "dead"]));
    Dataset {
        definitions: vec![definition(KEY, &flows)],
        instances: records,
        grants: Vec::new(),
    }
}

fn duration_dataset() -> Dataset {
    let records = (0..10)
        .map(|i| {
            ProcessInstanceRecord::new(format!("i-{i}"), KEY)
                .with_flow_node("approve", if i == 9 { 10_000 } else { 100 })
                .with_variable("region", "emea")
        })
        .collect();
    Dataset {
        definitions: vec![definition(KEY, &[("start", "approve")])],
        instances: records,
        grants: Vec::new(),
    }
}

fn stdout_json(output: &[u8]) -> Value {
    serde_json::from_slice(output).expect("stdout should be JSON")
}

fn write_config(path: &Path, json: &str) {
    std::fs::write(path, json).unwrap();
}

// ============================================================================
// Branch analysis
// ============================================================================

#[test]
fn branch_json_envelope() {
    let sandbox = Sandbox::new(&branch_dataset());
    let output = sandbox
        .cmd()
        .args(["branch", "--key", KEY, "--gateway", "gw", "--end-event", "end"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json = stdout_json(&output);
    assert_eq!(json["command"], "branch");
    assert!(json["request_id"].as_str().is_some());
    let result = &json["result"];
    assert_eq!(result["total"], 10);
    assert_eq!(result["follow_node_distribution"]["A"]["activities_reached"], 10);
    assert_eq!(result["follow_node_distribution"]["B"]["activity_count"], 5);
    assert_eq!(result["follow_node_distribution"]["B"]["activities_reached"], 0);
}

#[test]
fn branch_summary_lines() {
    let sandbox = Sandbox::new(&branch_dataset());
    sandbox
        .cmd()
        .args([
            "branch", "--key", KEY, "--gateway", "gw", "--end-event", "end", "-f", "summary",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("gw -> end: 10 instances reached the target"))
        .stdout(predicate::str::contains("B: 5 took the branch, 0 reached"));
}

#[test]
fn branch_unknown_gateway_is_validation_error() {
    let sandbox = Sandbox::new(&branch_dataset());
    sandbox
        .cmd()
        .args(["branch", "--key", KEY, "--gateway", "nope", "--end-event", "end"])
        .assert()
        .code(13)
        .stderr(predicate::str::contains("ERR_VALIDATION"));
}

#[test]
fn branch_without_grant_is_denied() {
    let mut dataset = branch_dataset();
    dataset.grants = vec![AccessGrant {
        user_id: "gonzo".to_string(),
        tenant_id: None,
    }];
    let sandbox = Sandbox::new(&dataset);

    sandbox
        .cmd()
        .args(["--user", "kermit"])
        .args(["branch", "--key", KEY, "--gateway", "gw", "--end-event", "end"])
        .assert()
        .code(12)
        .stderr(predicate::str::contains("ERR_ACCESS_DENIED"));

    sandbox
        .cmd()
        .args(["--user", "gonzo"])
        .args(["branch", "--key", KEY, "--gateway", "gw", "--end-event", "end"])
        .assert()
        .success();
}

#[test]
fn invalid_filters_are_rejected() {
    let sandbox = Sandbox::new(&branch_dataset());
    sandbox
        .cmd()
        .args(["branch", "--key", KEY, "--gateway", "gw", "--end-event", "end"])
        .args(["--filters", "{not json"])
        .assert()
        .code(13);
}

#[test]
fn missing_dataset_file_is_io_error() {
    let sandbox = Sandbox::new(&branch_dataset());
    sandbox
        .cmd()
        .env("PA_DATASET", sandbox.path("absent.json"))
        .args(["branch", "--key", KEY, "--gateway", "gw", "--end-event", "end"])
        .assert()
        .code(21);
}

// ============================================================================
// Outliers
// ============================================================================

#[test]
fn outlier_findings_report_the_slow_execution() {
    let sandbox = Sandbox::new(&duration_dataset());
    let output = sandbox
        .cmd()
        .args(["outliers", "findings", "--key", KEY])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json = stdout_json(&output);
    let approve = &json["result"]["approve"];
    assert_eq!(approve["higher_outlier"]["count"], 1);
    assert!(approve["lower_outlier"].is_null());
    assert_eq!(approve["heat"], 1.0);
}

#[test]
fn outlier_chart_summary_marks_outliers() {
    let sandbox = Sandbox::new(&duration_dataset());
    sandbox
        .cmd()
        .args(["outliers", "chart", "--key", KEY, "--flow-node", "approve", "-f", "summary"])
        .assert()
        .success()
        .stdout(predicate::str::contains(" *"));
}

#[test]
fn outlier_terms_need_a_bound() {
    let sandbox = Sandbox::new(&duration_dataset());
    sandbox
        .cmd()
        .args(["outliers", "terms", "--key", KEY, "--flow-node", "approve"])
        .assert()
        .code(13)
        .stderr(predicate::str::contains("higher_bound"));
}

#[test]
fn outlier_terms_with_bound_succeed() {
    let sandbox = Sandbox::new(&duration_dataset());
    let output = sandbox
        .cmd()
        .args(["outliers", "terms", "--key", KEY, "--flow-node", "approve"])
        .args(["--higher-bound", "5000"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    // One outlier instance is below the term doc count floor.
    assert_eq!(stdout_json(&output)["result"], serde_json::json!([]));
}

// ============================================================================
// Configuration
// ============================================================================

#[test]
fn config_check_accepts_valid_file() {
    let sandbox = Sandbox::new(&Dataset::default());
    let path = sandbox.path("custom.json");
    write_config(&path, r#"{"outlier": {"std_dev_multiplier": 2.0}}"#);

    sandbox
        .cmd()
        .args(["config", "check"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"status\": \"valid\""));
}

#[test]
fn config_check_rejects_invalid_file() {
    let sandbox = Sandbox::new(&Dataset::default());
    let path = sandbox.path("broken.json");
    write_config(&path, r#"{"outlier": {"significance_level": 3.0}}"#);

    sandbox
        .cmd()
        .args(["config", "check"])
        .arg(&path)
        .assert()
        .code(10);
}

#[test]
fn config_show_defaults_without_file() {
    let sandbox = Sandbox::new(&Dataset::default());
    let output = sandbox
        .cmd()
        .args(["config", "show"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json = stdout_json(&output);
    assert!(json["path"].is_null());
    assert_eq!(json["config"]["outlier"]["min_term_doc_count"], 3);
}

#[test]
fn config_multiplier_changes_findings() {
    let sandbox = Sandbox::new(&duration_dataset());
    // With k = 3 the single slow execution stays inside mean + 3σ.
    write_config(
        &sandbox.path("analysis.json"),
        r#"{"outlier": {"std_dev_multiplier": 3.0}}"#,
    );
    let output = sandbox
        .cmd()
        .args(["outliers", "findings", "--key", KEY])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    assert_eq!(stdout_json(&output)["result"], serde_json::json!({}));
}

// ============================================================================
// Schema, version, completions
// ============================================================================

#[test]
fn schema_list_names_result_types() {
    Sandbox::new(&Dataset::default())
        .cmd()
        .args(["schema", "--list", "-f", "summary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BranchAnalysisResult"))
        .stdout(predicate::str::contains("FindingsDto"));
}

#[test]
fn schema_unknown_type_is_args_error() {
    Sandbox::new(&Dataset::default())
        .cmd()
        .args(["schema", "NoSuchType"])
        .assert()
        .code(10);
}

#[test]
fn version_reports_schema_versions() {
    let output = Sandbox::new(&Dataset::default())
        .cmd()
        .arg("version")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json = stdout_json(&output);
    assert_eq!(json["pa_core"], env!("CARGO_PKG_VERSION"));
    assert!(json["schema_version"].is_string());
}

#[test]
fn completions_for_bash() {
    Sandbox::new(&Dataset::default())
        .cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pa-core"));
}
