//! Integration tests for the dashstate CLI
//!
//! These tests run the actual CLI binary and verify output.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use dashstate::params::ENTITY_ID;
use dashstate::token::encode_path;
use dashstate::{EntityId, StateObject, StateParams};

const DASHBOARD: &str = r#"
title: Boiler room
states:
  default:
    name: Plant
    root: true
  boiler:
    name: "${entityName}"
entityAliases:
  a1:
    alias: Current boiler
    filter:
      type: stateEntity
  a2:
    alias: All boilers
    filter:
      type: entityList
      resolveMultiple: true
      entityType: DEVICE
      entityList: [b1, b2]
  a3:
    alias: Nearby
    filter:
      type: relationsQuery
      rootStateEntity: true
      maxLevel: 2
"#;

const RULES: &str = r#"
- value: 0
  label: "Off"
  sourceType: constant
  sourceValue: false
- value: 1
  label: "On"
  sourceType: constant
  sourceValue: true
- value: 2
  label: Hot
  sourceType: range
  sourceRangeFrom: 80
"#;

/// Get the binary to test
fn dash_cmd() -> Command {
    Command::cargo_bin("dashstate").unwrap()
}

fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

fn boiler_token() -> String {
    encode_path(&[
        StateObject::new("default", StateParams::new()),
        StateObject::new(
            "boiler",
            StateParams::new().with(ENTITY_ID, EntityId::new("DEVICE", "b7")),
        ),
    ])
    .unwrap()
}

#[test]
fn test_help_flag() {
    dash_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("validate"))
        .stdout(predicate::str::contains("decode"));
}

// ============================================================================
// Validation
// ============================================================================

#[test]
fn test_validate_valid_dashboard() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(&temp_dir, "dash.yaml", DASHBOARD);

    dash_cmd()
        .arg("validate")
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("Root: default"))
        .stdout(predicate::str::contains("Aliases: 3"));
}

#[test]
fn test_validate_without_root_fails_with_fix() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(&temp_dir, "dash.yaml", "states:\n  a:\n    name: A\n");

    dash_cmd()
        .arg("validate")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("DASH-003"))
        .stderr(predicate::str::contains("Fix:"));
}

#[test]
fn test_validate_missing_file() {
    dash_cmd()
        .args(["validate", "/no/such/dashboard.yaml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DASH-090"));
}

// ============================================================================
// Tokens
// ============================================================================

#[test]
fn test_encode_then_decode() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(
        &temp_dir,
        "path.json",
        r#"[{"id":"default","params":{}},{"id":"boiler","params":{"entityId":{"entityType":"DEVICE","id":"b7"}}}]"#,
    );

    let output = dash_cmd().arg("encode").arg(&file).output().unwrap();
    assert!(output.status.success());
    let token = String::from_utf8(output.stdout).unwrap().trim().to_string();
    assert_eq!(token, boiler_token());

    dash_cmd()
        .args(["decode", token.as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"boiler\""))
        .stdout(predicate::str::contains("\"b7\""));
}

#[test]
fn test_encode_uri_escapes() {
    let temp_dir = TempDir::new().unwrap();
    let file = write(&temp_dir, "path.json", r#"[{"id":"default","params":{}}]"#);

    dash_cmd()
        .args(["encode", "--uri"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains("%3D"));
}

#[test]
fn test_decode_garbage_fails() {
    dash_cmd()
        .args(["decode", "!!!"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DASH-020"));
}

#[test]
fn test_decode_against_dashboard() {
    let temp_dir = TempDir::new().unwrap();
    let dash = write(&temp_dir, "dash.yaml", DASHBOARD);

    dash_cmd()
        .args(["decode", boiler_token().as_str(), "--dashboard"])
        .arg(&dash)
        .assert()
        .success()
        .stdout(predicate::str::contains("Restored 2 state(s)"))
        .stdout(predicate::str::contains("default > boiler"));
}

#[test]
fn test_decode_garbage_against_dashboard_falls_back() {
    let temp_dir = TempDir::new().unwrap();
    let dash = write(&temp_dir, "dash.yaml", DASHBOARD);

    dash_cmd()
        .args(["decode", "not-a-token", "--dashboard"])
        .arg(&dash)
        .assert()
        .success()
        .stdout(predicate::str::contains("Fell back to root"))
        .stdout(predicate::str::contains("Path: default"));
}

// ============================================================================
// Value-state mapping
// ============================================================================

#[test]
fn test_map_values() {
    let temp_dir = TempDir::new().unwrap();
    let rules = write(&temp_dir, "rules.yaml", RULES);

    dash_cmd()
        .arg("map")
        .arg(&rules)
        .args(["true", "\"false\"", "95", "42.123", "--decimals", "1", "--units", "°C"])
        .assert()
        .success()
        .stdout(predicate::str::contains("On"))
        .stdout(predicate::str::contains("Off"))
        .stdout(predicate::str::contains("Hot"))
        .stdout(predicate::str::contains("42.1 °C"));
}

#[test]
fn test_map_rejects_incomplete_rule() {
    let temp_dir = TempDir::new().unwrap();
    let rules = write(
        &temp_dir,
        "rules.yaml",
        "- value: 1\n  label: Broken\n  sourceType: constant\n",
    );

    dash_cmd()
        .arg("map")
        .arg(&rules)
        .arg("1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DASH-050"));
}

// ============================================================================
// Alias resolution
// ============================================================================

#[test]
fn test_resolve_entity_list() {
    let temp_dir = TempDir::new().unwrap();
    let dash = write(&temp_dir, "dash.yaml", DASHBOARD);

    dash_cmd()
        .arg("resolve")
        .arg(&dash)
        .arg("All boilers")
        .assert()
        .success()
        .stdout(predicate::str::contains("2 entity(ies)"))
        .stdout(predicate::str::contains("DEVICE:b1"));
}

#[test]
fn test_resolve_state_entity_from_token() {
    let temp_dir = TempDir::new().unwrap();
    let dash = write(&temp_dir, "dash.yaml", DASHBOARD);

    dash_cmd()
        .arg("resolve")
        .arg(&dash)
        .arg("Current boiler")
        .args(["--token", boiler_token().as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("DEVICE:b7"));
}

#[test]
fn test_resolve_state_entity_without_entity_is_unresolved() {
    let temp_dir = TempDir::new().unwrap();
    let dash = write(&temp_dir, "dash.yaml", DASHBOARD);

    dash_cmd()
        .arg("resolve")
        .arg(&dash)
        .arg("a1")
        .assert()
        .success()
        .stdout(predicate::str::contains("Unresolved"));
}

#[test]
fn test_resolve_relations_query() {
    let temp_dir = TempDir::new().unwrap();
    let dash = write(&temp_dir, "dash.yaml", DASHBOARD);

    dash_cmd()
        .arg("resolve")
        .arg(&dash)
        .arg("Nearby")
        .args(["--token", boiler_token().as_str()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Server-side query"))
        .stdout(predicate::str::contains("relationsQuery"));
}

#[test]
fn test_resolve_unknown_alias_and_state() {
    let temp_dir = TempDir::new().unwrap();
    let dash = write(&temp_dir, "dash.yaml", DASHBOARD);

    dash_cmd()
        .arg("resolve")
        .arg(&dash)
        .arg("ghost")
        .assert()
        .failure()
        .stderr(predicate::str::contains("DASH-030"));

    dash_cmd()
        .arg("resolve")
        .arg(&dash)
        .arg("a2")
        .args(["--state", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DASH-010"));
}
