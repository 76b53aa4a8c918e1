//! Integration tests for the `vigil` CLI binary.
//!
//! Argument parsing, help output, shell completions, config handling, and
//! the REST-backed commands against a wiremock backend. No broker is
//! contacted.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::{Value, json};
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `vigil` binary with env isolation.
///
/// Clears all `VIGIL_*` env vars and points config directories at `home`
/// so tests never touch the user's real configuration.
fn vigil_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("vigil");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG")
        .env_remove("VIGIL_PROFILE")
        .env_remove("VIGIL_API_URL")
        .env_remove("VIGIL_BROKER_HOST")
        .env_remove("VIGIL_USERNAME")
        .env_remove("VIGIL_PASSWORD")
        .env_remove("VIGIL_OUTPUT")
        .env_remove("VIGIL_INSECURE")
        .env_remove("VIGIL_TIMEOUT");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

/// Run the binary off the async runtime so the mock server keeps serving.
async fn run(home: &Path, args: Vec<String>) -> std::process::Output {
    let mut cmd = vigil_cmd(home);
    cmd.args(args);
    tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap()
}

fn backend_args(server: &MockServer, rest: &[&str]) -> Vec<String> {
    let mut args = vec![
        "--api-url".to_owned(),
        server.uri(),
        "--broker-host".to_owned(),
        "broker.invalid".to_owned(),
    ];
    args.extend(rest.iter().map(|s| (*s).to_owned()));
    args
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = vigil_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = tempfile::tempdir().unwrap();
    vigil_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("home-security")
                .and(predicate::str::contains("logs"))
                .and(predicate::str::contains("watch"))
                .and(predicate::str::contains("arm"))
                .and(predicate::str::contains("disarm"))
                .and(predicate::str::contains("devices"))
                .and(predicate::str::contains("rename")),
        );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    vigil_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("vigil"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    vigil_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    vigil_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let home = tempfile::tempdir().unwrap();
    let output = vigil_cmd(home.path()).arg("foobar").output().unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_logs_without_config() {
    let home = tempfile::tempdir().unwrap();
    vigil_cmd(home.path())
        .arg("logs")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration").or(predicate::str::contains("config")));
}

#[test]
fn test_unknown_profile() {
    let home = tempfile::tempdir().unwrap();
    vigil_cmd(home.path())
        .args(["--profile", "cabin", "devices"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cabin"));
}

#[test]
fn test_invalid_output_format() {
    let home = tempfile::tempdir().unwrap();
    let output = vigil_cmd(home.path())
        .args(["--output", "invalid", "devices"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

#[test]
fn test_invalid_api_url_is_a_usage_error() {
    let home = tempfile::tempdir().unwrap();
    vigil_cmd(home.path())
        .args(["--api-url", "not a url", "--broker-host", "b", "devices"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("api_base_url"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_show_no_config() {
    let home = tempfile::tempdir().unwrap();
    vigil_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("page_size = 6"));
}

#[test]
fn test_config_set_creates_profile() {
    let home = tempfile::tempdir().unwrap();
    for (key, value) in [
        ("api_base_url", "https://vigil.example.com"),
        ("broker_host", "mqtt.example.com"),
        ("device.d300", "Garage Door"),
    ] {
        vigil_cmd(home.path())
            .args(["config", "set", key, value])
            .assert()
            .success();
    }

    vigil_cmd(home.path())
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default *"));
    vigil_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("broker_host = \"mqtt.example.com\"")
                .and(predicate::str::contains("d300 = \"Garage Door\"")),
        );
}

#[test]
fn test_config_use_unknown_profile() {
    let home = tempfile::tempdir().unwrap();
    vigil_cmd(home.path())
        .args(["config", "use", "nowhere"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nowhere"));
}

#[test]
fn test_config_subcommands_exist() {
    let home = tempfile::tempdir().unwrap();
    vigil_cmd(home.path())
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("init")
                .and(predicate::str::contains("show"))
                .and(predicate::str::contains("set-password"))
                .and(predicate::str::contains("profiles")),
        );
}

// ── Backend commands ────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_logs_json_follows_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .and(query_param("limit", "2"))
        .and(query_param("cursor", "c1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "logs": [{ "id": "h3", "origin": "system", "msg": "System armed",
                       "timestamp": "2024-06-15T08:00:00Z" }],
            "nextCursor": null
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/logs"))
        .and(query_param("limit", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "logs": [
                { "id": "h1", "origin": "device", "msg": "Door opened", "deviceId": "d239",
                  "isOpen": true, "timestamp": "2024-06-15T10:00:00Z" },
                { "id": "h2", "origin": "device", "msg": "Motion detected", "deviceId": "d254",
                  "timestamp": "2024-06-15T09:00:00Z" }
            ],
            "nextCursor": "c1"
        })))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let output = run(
        home.path(),
        backend_args(&server, &["-o", "json", "logs", "--limit", "2", "--all"]),
    )
    .await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let records: Value = serde_json::from_slice(&output.stdout).unwrap();
    let ids: Vec<&str> = records
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["h1", "h2", "h3"]);
    assert_eq!(records[0]["device_name"], "Door Sensor");
    assert_eq!(records[0]["door_open"], true);
    assert_eq!(records[1]["device_name"], "Motion Detector");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_plain_lists_names() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/devices"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "devices": [
                { "dName": "Front Door", "dType": "contact" },
                { "dName": "Hallway", "dType": "motion" }
            ]
        })))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let output = run(home.path(), backend_args(&server, &["-o", "plain", "devices"])).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "Front Door\nHallway\n");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_status_reports_name_and_mode() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/sysName"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "sysName": "Cabin" })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/sysMode"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "isArmed": true })))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let output = run(home.path(), backend_args(&server, &["-o", "json", "status"])).await;

    assert!(output.status.success(), "{}", combined_output(&output));
    let status: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["system_name"], "Cabin");
    assert_eq!(status["armed"], true);
    assert!(status.get("broker_state").is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rename_device_sends_both_names() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/dName"))
        .and(body_json(json!({ "dName": "Hallway", "newdName": "Landing" })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let output = run(
        home.path(),
        backend_args(&server, &["rename", "device", "Hallway", "Landing"]),
    )
    .await;

    assert!(output.status.success(), "{}", combined_output(&output));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_rename_unknown_device_exits_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/dName"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such device"))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let output = run(
        home.path(),
        backend_args(&server, &["rename", "device", "Attic", "Loft"]),
    )
    .await;

    assert_eq!(output.status.code(), Some(4), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("Attic"));
}
