//! Integration tests for the hempflow binary.
//!
//! These tests verify end-to-end behavior including:
//! - The console report of a default run
//! - CSV and JSON export
//! - Queries against final streams and losses
//! - Configuration handling

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Helper to create a scratch directory
fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

/// Helper to get the path to the CLI binary
fn cli() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("hempflow"))
}

#[test]
fn test_cli_help() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Mass balance simulation of hemp biomass fractionation",
        ));
}

#[test]
fn test_default_run_prints_report() {
    cli()
        .assert()
        .success()
        .stdout(predicate::str::contains("Harvesting Biomass"))
        .stdout(predicate::str::contains("Packaging Production"))
        .stdout(predicate::str::contains("Total Mass Input:  156.21 kg/hr"))
        .stdout(predicate::str::contains("Total Mass Output: 64.00 kg/hr"))
        .stdout(predicate::str::contains("Total Waste:       92.21 kg/hr"))
        .stdout(predicate::str::contains("Mass Balance Difference"));
}

#[test]
fn test_run_lists_losses_and_products() {
    cli()
        .arg("run")
        .assert()
        .success()
        .stdout(predicate::str::contains("Leaf Waste"))
        .stdout(predicate::str::contains("Processed Seeds Waste"))
        .stdout(predicate::str::contains("Cream Jars"))
        .stdout(predicate::str::contains("Outer Packaging"));
}

#[test]
fn test_json_output() {
    let output = cli().arg("run").arg("--json").output().unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["steps"].as_array().unwrap().len(), 11);
    assert_eq!(report["steps"][0]["Step"], "Harvesting Biomass");
    assert!(report["warnings"].as_array().unwrap().is_empty());

    let input = report["balance"]["total_input"].as_f64().unwrap();
    assert!((input - 156.212).abs() < 1e-3);
}

#[test]
fn test_export_writes_tables() {
    let temp_dir = setup_test_dir();
    let out_dir = temp_dir.path().join("out");

    cli()
        .arg("run")
        .arg("--export")
        .arg(&out_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported report"));

    for file in ["streams.csv", "losses.csv", "steps.csv", "report.json"] {
        assert!(out_dir.join(file).exists(), "missing {}", file);
    }

    let streams = fs::read_to_string(out_dir.join("streams.csv")).unwrap();
    let header = streams.lines().next().unwrap();
    assert!(header.starts_with("Name,Seeds,Stems,Leaves,Moisture,CBD,Oil"));
    assert!(header.ends_with("Additives,Water,Glycerol"));
    assert!(streams.contains("Cream Product"));

    let steps = fs::read_to_string(out_dir.join("steps.csv")).unwrap();
    assert!(steps.starts_with("Step,Mass Input,Mass Output,Waste Output"));
}

#[test]
fn test_export_uses_configured_dir() {
    let temp_dir = setup_test_dir();
    let out_dir = temp_dir.path().join("configured");
    let config_path = temp_dir.path().join("config.toml");
    fs::write(
        &config_path,
        format!("[output]\ndir = {:?}\n", out_dir.to_string_lossy()),
    )
    .unwrap();

    cli()
        .arg("--config")
        .arg(&config_path)
        .arg("run")
        .arg("--export")
        .assert()
        .success();

    assert!(out_dir.join("report.json").exists());
}

#[test]
fn test_query_stream_component() {
    cli()
        .arg("query")
        .arg("Cream Product")
        .arg("cbd")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.05517"));
}

#[test]
fn test_query_loss() {
    cli()
        .arg("query")
        .arg("Leaf Waste")
        .arg("Moisture")
        .assert()
        .success()
        .stdout(predicate::str::contains("21.000000"));
}

#[test]
fn test_query_unknown_stream_fails() {
    cli()
        .arg("query")
        .arg("Nonexistent")
        .arg("Seeds")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Nonexistent"));
}

#[test]
fn test_query_unknown_component_fails() {
    cli()
        .arg("query")
        .arg("Cream Product")
        .arg("Plutonium")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Plutonium"));
}

#[test]
fn test_stages_listing() {
    cli()
        .arg("stages")
        .assert()
        .success()
        .stdout(predicate::str::contains("Feed: Hemp Biomass"))
        .stdout(predicate::str::contains(
            "Seed Drying: Separated Seeds → Dried Seeds",
        ))
        .stdout(predicate::str::contains(
            "Products: Cream Product, Cream Jars, Outer Packaging",
        ));
}

#[test]
fn test_defaults_round_trip() {
    let temp_dir = setup_test_dir();
    let config_path = temp_dir.path().join("config.toml");

    let output = cli().arg("defaults").output().unwrap();
    assert!(output.status.success());
    let toml = String::from_utf8(output.stdout).unwrap();
    assert!(toml.contains("[moisture]"));
    assert!(toml.contains("seed_target = 0.05"));

    fs::write(&config_path, toml).unwrap();
    cli()
        .arg("--config")
        .arg(&config_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("Total Mass Input:  156.21 kg/hr"));
}

#[test]
fn test_partial_config_changes_feed() {
    let temp_dir = setup_test_dir();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[feed]\nrate = 200.0\n").unwrap();

    cli()
        .arg("--config")
        .arg(&config_path)
        .arg("query")
        .arg("Hemp Biomass")
        .arg("Leaves")
        .assert()
        .success()
        .stdout(predicate::str::contains("60.000000"));
}

#[test]
fn test_invalid_config_rejected() {
    let temp_dir = setup_test_dir();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[yields]\nseed = 0.9\n").unwrap();

    cli()
        .arg("--config")
        .arg(&config_path)
        .arg("run")
        .assert()
        .failure()
        .stdout(predicate::str::contains("Mass Balance Difference").not());
}

#[test]
fn test_unreachable_moisture_target_fails() {
    let temp_dir = setup_test_dir();
    let config_path = temp_dir.path().join("config.toml");
    fs::write(&config_path, "[moisture]\nstem_target = 0.9\n").unwrap();

    cli()
        .arg("--config")
        .arg(&config_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Separated Stems"));
}

#[test]
fn test_strict_run_passes_when_balanced() {
    cli().arg("run").arg("--strict").assert().success();
}
