//! Integration tests for the `aquadata` binary.
//!
//! Argument parsing, config inspection, the offline simulator and shell
//! completions. Nothing here starts the agent or opens a socket.
#![allow(clippy::unwrap_used)]

use std::io::Write;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::NamedTempFile;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `aquadata` binary with env isolation.
///
/// Points config directories at a nonexistent path and clears the
/// variables the binary reads, so tests never see a real configuration.
fn aquadata_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("aquadata");
    cmd.env("HOME", "/tmp/aquadata-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/aquadata-cli-test-nonexistent")
        .env_remove("AQUADATA_CONFIG")
        .env_remove("AQUADATA_DEVICE__MODE")
        .env_remove("AQUADATA_WIFI__SSID")
        .env_remove("AQUADATA_WIFI__PASSWORD")
        .env_remove("AQUADATA_BROKER__HOST")
        .env_remove("AQUADATA_BROKER__PORT")
        .env_remove("RUST_LOG");
    cmd
}

fn config_file(body: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(body.as_bytes()).unwrap();
    file
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const SAMPLE: &str = r#"
[device]
name = "AQUADATA-POND"
mode = "mqtt_only"

[wifi]
ssid = "pond"
password = "hunter22"

[broker]
host = "mqtt.local"
port = 1884
"#;

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = aquadata_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn test_help_flag() {
    aquadata_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("broker")
            .and(predicate::str::contains("run"))
            .and(predicate::str::contains("simulate"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    aquadata_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("aquadata"));
}

#[test]
fn test_unknown_mode_is_a_usage_error() {
    aquadata_cmd()
        .args(["--mode", "warp", "config", "show"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("warp"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_default_location() {
    aquadata_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("aquadata").and(predicate::str::contains("config.toml")));
}

#[test]
fn test_config_path_follows_flag() {
    let file = config_file(SAMPLE);
    let path = file.path().to_str().unwrap();
    aquadata_cmd()
        .args(["config", "path", "--config", path])
        .assert()
        .success()
        .stdout(predicate::str::contains(path));
}

#[test]
fn test_config_show_masks_passwords() {
    let file = config_file(SAMPLE);
    aquadata_cmd()
        .args(["config", "show"])
        .arg("--config")
        .arg(file.path())
        .assert()
        .success()
        .stdout(
            predicate::str::contains("mqtt.local")
                .and(predicate::str::contains("AQUADATA-POND"))
                .and(predicate::str::contains("hunter22").not()),
        );
}

#[test]
fn test_config_show_applies_mode_override() {
    let file = config_file(SAMPLE);
    aquadata_cmd()
        .args(["--mode", "ble_only", "config", "show"])
        .arg("--config")
        .arg(file.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("mode = \"ble_only\""));
}

#[test]
fn test_config_check_summarizes() {
    let file = config_file(SAMPLE);
    aquadata_cmd()
        .args(["config", "check"])
        .env("AQUADATA_CONFIG", file.path())
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Configuration OK")
                .and(predicate::str::contains("mqtt_only"))
                .and(predicate::str::contains("mqtt.local:1884"))
                .and(predicate::str::contains("pond")),
        );
}

#[test]
fn test_config_check_without_file_uses_defaults() {
    aquadata_cmd()
        .args(["config", "check"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("built-in defaults")
                .and(predicate::str::contains("broker.hivemq.com:1883"))
                .and(predicate::str::contains("not configured")),
        );
}

#[test]
fn test_config_check_rejects_invalid_values() {
    let file = config_file("[peripheral]\nreceive_cap = 0\n");
    aquadata_cmd()
        .args(["config", "check"])
        .arg("--config")
        .arg(file.path())
        .assert()
        .code(3)
        .stderr(predicate::str::contains("peripheral.receive_cap"));
}

#[test]
fn test_missing_explicit_config_fails() {
    aquadata_cmd()
        .args(["config", "check", "--config", "/tmp/aquadata-cli-test-nonexistent/x.toml"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_environment_overrides_reach_the_config() {
    aquadata_cmd()
        .args(["config", "show"])
        .env("AQUADATA_BROKER__HOST", "env.example")
        .assert()
        .success()
        .stdout(predicate::str::contains("env.example"));
}

// ── Simulate ────────────────────────────────────────────────────────

#[test]
fn test_simulate_prints_one_json_line_per_cycle() {
    let output = aquadata_cmd()
        .args(["simulate", "--cycles", "3", "--seed", "7"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let lines: Vec<serde_json::Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(lines.len(), 3);

    for (i, line) in lines.iter().enumerate() {
        let cycle = i as u64 + 1;
        assert_eq!(line["simulation_cycle"], cycle);
        assert_eq!(line["wifi_status"], "disconnected");

        let ph_total = line["readings_count"]["ph"].as_u64().unwrap()
            + line["errors_count"]["ph"].as_u64().unwrap();
        assert_eq!(ph_total, cycle);
    }
    assert_eq!(lines[0]["timestamp"], "00:00:00");
    assert_eq!(lines[2]["timestamp"], "00:00:06");
}

#[test]
fn test_simulate_is_repeatable_with_a_seed() {
    let run = || {
        aquadata_cmd()
            .args(["simulate", "-n", "5", "--seed", "42"])
            .output()
            .unwrap()
            .stdout
    };
    assert_eq!(run(), run());
}

#[test]
fn test_simulate_rejects_zero_cycles() {
    aquadata_cmd()
        .args(["simulate", "--cycles", "0"])
        .assert()
        .code(2);
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    aquadata_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    aquadata_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}
