//! CLI integration tests

use std::path::Path;
use std::process::{Command, Output};

/// Run fleetctl with an isolated home directory
fn fleetctl(home: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_fleetctl"))
        .args(args)
        .env("HOME", home)
        .env_remove("FLEETCTL_API_URL")
        .env("NO_COLOR", "1")
        .output()
        .expect("Failed to execute fleetctl")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).to_string()
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let home = tempfile::tempdir().unwrap();
    let output = fleetctl(home.path(), &["--help"]);
    let stdout = stdout(&output);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Fleet Advisor"), "Should show app name");
    for command in ["accounts", "get", "chat", "trigger", "email", "config"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
    assert!(stdout.contains("--api-url"), "Should show api-url option");
    assert!(stdout.contains("FLEETCTL_API_URL"), "Should show env var");
    assert!(stdout.contains("--format"), "Should show format option");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let home = tempfile::tempdir().unwrap();
    let output = fleetctl(home.path(), &["--version"]);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout(&output).contains("fleetctl"), "Should show binary name");
}

#[test]
fn test_get_help_lists_views() {
    let home = tempfile::tempdir().unwrap();
    let output = fleetctl(home.path(), &["get", "--help"]);
    let stdout = stdout(&output);

    assert!(output.status.success());
    for view in ["recommendations", "service", "clusters", "services", "details", "knowledge"] {
        assert!(stdout.contains(view), "Should show {} view", view);
    }
}

#[test]
fn test_trigger_rejects_unknown_job() {
    let home = tempfile::tempdir().unwrap();
    let output = fleetctl(home.path(), &["trigger", "hourly-report"]);

    assert!(!output.status.success(), "Unknown job should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("daily-recommendations"), "Should list valid jobs");
}

#[test]
fn test_missing_argument() {
    let home = tempfile::tempdir().unwrap();
    let output = fleetctl(home.path(), &["accounts", "add", "111122223333"]);

    assert!(!output.status.success(), "Missing --name should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("--name"), "Should name the missing option");
}

#[test]
fn test_config_set_url_persists() {
    let home = tempfile::tempdir().unwrap();

    let output = fleetctl(home.path(), &["config", "set-url", "http://advisor.internal:8000"]);
    assert!(output.status.success(), "set-url should succeed");

    let saved = home.path().join(".config").join("fleetctl").join("config.json");
    let content = std::fs::read_to_string(&saved).unwrap();
    assert!(content.contains("http://advisor.internal:8000"));

    let output = fleetctl(home.path(), &["--format", "json", "config", "show"]);
    assert!(output.status.success());
    let shown: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(shown["effective_api_url"], "http://advisor.internal:8000");
}

#[test]
fn test_config_set_url_rejects_garbage() {
    let home = tempfile::tempdir().unwrap();
    let output = fleetctl(home.path(), &["config", "set-url", "not a url"]);

    assert!(!output.status.success());
    assert!(!home.path().join(".config").join("fleetctl").exists());
}

#[test]
fn test_accounts_list_against_server() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/accounts")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"[{"account_id":"111122223333","account_name":"prod","status":"active",
                "clusters":["web","batch"],"cluster_details":{},
                "last_updated":"2024-05-01T10:00:00Z"}]"#,
        )
        .create();

    let home = tempfile::tempdir().unwrap();
    let output = fleetctl(home.path(), &["--api-url", &server.url(), "accounts", "list"]);

    mock.assert();
    assert!(output.status.success());
    let stdout = stdout(&output);
    assert!(stdout.contains("111122223333"));
    assert!(stdout.contains("web, batch"));
    assert!(stdout.contains("Total: 1 accounts"));
}

#[test]
fn test_api_error_exits_nonzero() {
    let mut server = mockito::Server::new();
    server
        .mock("GET", "/recommendations/999")
        .with_status(404)
        .with_body(r#"{"error":"account 999 not found","code":"not_found"}"#)
        .create();

    let home = tempfile::tempdir().unwrap();
    let output = fleetctl(
        home.path(),
        &["--api-url", &server.url(), "get", "recommendations", "999"],
    );

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("account 999 not found"));
}
