use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

fn hubaudit_cmd() -> Command {
    Command::cargo_bin("hubaudit-cli").expect("binary should be built")
}

#[test]
fn help_flag_prints_usage() {
    hubaudit_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Audits an SCA server"));
}

#[test]
fn version_flag_prints_version() {
    hubaudit_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("hubaudit"));
}

#[test]
fn missing_hub_url_fails() {
    hubaudit_cmd()
        .assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn invalid_mode_value_fails() {
    hubaudit_cmd()
        .arg("https://hub.example.com")
        .arg("--mode")
        .arg("continue")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn zero_page_size_fails() {
    hubaudit_cmd()
        .arg("https://hub.example.com")
        .arg("--page-size")
        .arg("0")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn missing_credentials_fails_before_any_connection() {
    let dir = tempdir().expect("create temp dir");

    hubaudit_cmd()
        .arg("https://hub.example.com")
        .arg("-f")
        .arg(dir.path().join("report.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("credentials not specified"));
}

#[test]
fn unreadable_token_file_fails() {
    let dir = tempdir().expect("create temp dir");

    hubaudit_cmd()
        .arg("https://hub.example.com")
        .arg("--api-token-file")
        .arg(dir.path().join("no_such_token_file"))
        .arg("-f")
        .arg(dir.path().join("report.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading token file"));
}

#[test]
fn empty_token_file_fails() {
    let dir = tempdir().expect("create temp dir");
    let token_path = dir.path().join("token");
    fs::write(&token_path, "\n").expect("write token file");

    hubaudit_cmd()
        .arg("https://hub.example.com")
        .arg("--api-token-file")
        .arg(&token_path)
        .arg("-f")
        .arg(dir.path().join("report.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("token file is empty"));
}

#[test]
fn username_without_password_fails() {
    let dir = tempdir().expect("create temp dir");

    hubaudit_cmd()
        .arg("https://hub.example.com")
        .arg("--username")
        .arg("sysadmin")
        .arg("-f")
        .arg(dir.path().join("report.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("credentials not specified"));
}

#[test]
fn read_only_destination_fails_before_any_connection() {
    let dir = tempdir().expect("create temp dir");
    let report_path = dir.path().join("report.json");
    fs::write(&report_path, "{}").expect("write report file");

    let mut permissions = fs::metadata(&report_path).unwrap().permissions();
    permissions.set_readonly(true);
    fs::set_permissions(&report_path, permissions).unwrap();

    // The URL is unreachable on purpose: the destination check must fail
    // first, without the server ever being contacted.
    hubaudit_cmd()
        .arg("http://127.0.0.1:9")
        .arg("an-api-token")
        .arg("-f")
        .arg(&report_path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("write access"));
}

#[test]
fn unreachable_server_fails_with_connection_error() {
    let dir = tempdir().expect("create temp dir");

    hubaudit_cmd()
        .arg("http://127.0.0.1:9")
        .arg("an-api-token")
        .arg("--retries")
        .arg("0")
        .arg("-f")
        .arg(dir.path().join("report.json"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("connecting to the server"));
}
