//! End-to-end tests for the fleetgate binary.

#![allow(deprecated)] // Command::cargo_bin is deprecated but replacement requires newer assert_cmd

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const FLEET: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/fleet.json");
const AT: &str = "2025-06-01T00:00:00Z";

/// A fleetgate invocation isolated from the caller's config and environment.
fn fleetgate(project: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("fleetgate").unwrap();
    cmd.env_remove("RUST_LOG")
        .env("HOME", project.path())
        .env("XDG_CONFIG_HOME", project.path())
        .arg("--project-dir")
        .arg(project.path());
    cmd
}

fn check(project: &TempDir, actor: &str, target: &str, level: &str) -> Command {
    let mut cmd = fleetgate(project);
    cmd.args([
        "check", "--snapshot", FLEET, "--actor", actor, "--target", target, "--level", level,
        "--at", AT,
    ]);
    cmd
}

// ============================================================================
// Check
// ============================================================================

#[test]
fn owner_is_allowed() {
    let project = TempDir::new().unwrap();
    check(&project, "alice", "driver-a", "read")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""allowed": true"#))
        .stdout(predicate::str::contains(r#""path": "direct_owner""#));
}

#[test]
fn master_delegation_is_reported() {
    let project = TempDir::new().unwrap();
    check(&project, "bob", "driver-d", "read")
        .assert()
        .success()
        .stdout(predicate::str::contains("master_delegation"));
}

#[test]
fn location_manager_may_read_but_not_delete() {
    let project = TempDir::new().unwrap();
    check(&project, "carol", "driver-e", "read")
        .assert()
        .success()
        .stdout(predicate::str::contains("location_manager"));

    check(&project, "carol", "driver-e", "delete")
        .assert()
        .code(3)
        .stdout(predicate::str::contains(r#""outcome": "forbidden""#));
}

#[test]
fn expired_affiliation_is_denied() {
    let project = TempDir::new().unwrap();
    check(&project, "dave", "driver-h", "read")
        .assert()
        .code(3)
        .stdout(predicate::str::contains(r#""allowed": false"#));

    check(&project, "dave", "driver-d", "read")
        .assert()
        .success()
        .stdout(predicate::str::contains("org_manager"));
}

#[test]
fn missing_subject_is_denied() {
    let project = TempDir::new().unwrap();
    check(&project, "alice", "ghost", "read")
        .assert()
        .code(3)
        .stdout(predicate::str::contains("subject_not_found"));
}

#[test]
fn check_rejects_bad_instant() {
    let project = TempDir::new().unwrap();
    fleetgate(&project)
        .args([
            "check", "--snapshot", FLEET, "--actor", "alice", "--target", "driver-a", "--at",
            "last tuesday",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("RFC 3339"));
}

#[test]
fn check_rejects_unknown_level() {
    let project = TempDir::new().unwrap();
    check(&project, "alice", "driver-a", "admin")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid action level"));
}

#[test]
fn memory_audit_sink_is_included_in_output() {
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join("fleetgate.toml"),
        "[audit]\nsinks = [\"memory\"]\n",
    )
    .unwrap();

    check(&project, "bob", "driver-d", "read")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""audit": ["#))
        .stdout(predicate::str::contains(r#""cached": false"#));
}

#[test]
fn policy_from_config_applies() {
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join("fleetgate.toml"),
        "[policy]\nread = [\"direct_owner\"]\n",
    )
    .unwrap();

    check(&project, "bob", "driver-d", "read").assert().code(3);
    check(&project, "alice", "driver-a", "read").assert().success();
}

// ============================================================================
// Validate
// ============================================================================

#[test]
fn validate_accepts_fixture() {
    let project = TempDir::new().unwrap();
    fleetgate(&project)
        .args(["validate", "--snapshot", FLEET])
        .assert()
        .success()
        .stdout(predicate::str::contains("10 parties"))
        .stdout(predicate::str::contains("7 roles"));
}

#[test]
fn validate_rejects_dangling_references() {
    let project = TempDir::new().unwrap();
    let snapshot = project.path().join("broken.json");
    fs::write(
        &snapshot,
        r#"{"roles": [{"id": "r", "holder": "nobody", "roleType": "driver", "isActive": true}]}"#,
    )
    .unwrap();

    fleetgate(&project)
        .args(["validate", "--snapshot"])
        .arg(&snapshot)
        .assert()
        .failure()
        .stderr(predicate::str::contains("nobody"));
}

// ============================================================================
// Sidecar
// ============================================================================

#[test]
fn sidecar_answers_each_line() {
    let project = TempDir::new().unwrap();
    let input = [
        r#"{"actingUserId": "carol", "targetPartyId": "driver-e"}"#,
        r#"{"actingUserId": "carol", "targetPartyId": "driver-e", "level": "delete"}"#,
        r#"{"targetPartyId": "driver-e"}"#,
        r#"{"actingUserId": "carol", "targetPartyId": ""}"#,
        "not json",
    ]
    .join("\n");

    let output = fleetgate(&project)
        .args(["sidecar", "--snapshot", FLEET, "--at", AT])
        .write_stdin(input)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let lines: Vec<serde_json::Value> = String::from_utf8(output)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0]["status"], 200);
    assert_eq!(lines[0]["body"]["allowed"], true);
    assert_eq!(lines[0]["body"]["path"], "location_manager");
    assert_eq!(lines[1]["status"], 200);
    assert_eq!(lines[1]["body"]["allowed"], false);
    assert_eq!(lines[1]["body"]["path"], "none");
    assert_eq!(lines[2]["status"], 401);
    assert_eq!(lines[3]["status"], 400);
    assert_eq!(lines[4]["status"], 400);
    assert!(lines[4]["body"].is_null());
}

// ============================================================================
// Config
// ============================================================================

#[test]
fn config_shows_layered_values() {
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join("fleetgate.toml"),
        "[engine]\nstore_timeout_ms = 750\n",
    )
    .unwrap();

    fleetgate(&project)
        .args(["config", "--format", "json"])
        .env("FLEETGATE_ENGINE__CACHE_DECISIONS", "false")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""store_timeout_ms": 750"#))
        .stdout(predicate::str::contains(r#""cache_decisions": false"#));
}

#[test]
fn config_defaults_to_toml() {
    let project = TempDir::new().unwrap();

    let output = fleetgate(&project)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("[engine]"))
        .get_output()
        .stdout
        .clone();

    let shown: toml::Value = toml::from_str(&String::from_utf8(output).unwrap()).unwrap();
    assert_eq!(shown["engine"]["store_timeout_ms"].as_integer(), Some(2000));
    assert_eq!(shown["audit"]["sinks"][0].as_str(), Some("tracing"));
}

#[test]
fn config_text_format_is_still_available() {
    let project = TempDir::new().unwrap();
    fleetgate(&project)
        .args(["config", "--format", "text"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fleetgate Configuration"));
}

#[test]
fn invalid_config_is_rejected() {
    let project = TempDir::new().unwrap();
    fs::write(
        project.path().join("fleetgate.toml"),
        "[engine]\nstore_timeout_ms = 0\n",
    )
    .unwrap();

    fleetgate(&project)
        .arg("config")
        .assert()
        .failure()
        .stderr(predicate::str::contains("store_timeout_ms"));
}

#[test]
fn no_command_shows_help() {
    let project = TempDir::new().unwrap();
    fleetgate(&project)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}
