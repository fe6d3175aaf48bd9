//! End-to-end CLI tests for the netfetch binary.

use assert_cmd::Command;
use predicates::prelude::*;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

mod support;
use support::socket_guard::start_mock_server_or_skip;

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("netfetch").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Send one HTTP request"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("netfetch").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("netfetch"));
}

/// Test that a missing URL causes non-zero exit.
#[test]
fn test_binary_missing_url_returns_error() {
    let mut cmd = Command::cargo_bin("netfetch").unwrap();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test that an unsupported scheme fails before any network activity.
#[test]
fn test_binary_unsupported_scheme_fails() {
    let mut cmd = Command::cargo_bin("netfetch").unwrap();
    cmd.args(["-q", "ftp://example.com/file"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported protocol"));
}

#[tokio::test]
async fn test_binary_prints_body_to_stdout() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/greeting"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("X-Served-By", "mock")
                .set_body_string("hi there"),
        )
        .mount(&mock_server)
        .await;

    let url = format!("{}/greeting", mock_server.uri());
    let assert = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("netfetch")
            .unwrap()
            .args(["-i", "-q", &url])
            .assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("HTTP 200"))
        .stdout(predicate::str::contains("x-served-by: mock"))
        .stdout(predicate::str::ends_with("hi there"));
}

#[tokio::test]
async fn test_binary_writes_output_file_with_checksum() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/hello.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&mock_server)
        .await;

    let temp_dir = tempfile::TempDir::new().unwrap();
    let output = temp_dir.path().join("hello.txt");
    let url = format!("{}/hello.txt", mock_server.uri());
    let output_arg = output.to_string_lossy().to_string();

    let assert = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("netfetch")
            .unwrap()
            .args([
                "-q",
                "-o",
                &output_arg,
                "--checksum",
                "XUFAKrxLKna5cZ2REBfFkg==",
                &url,
            ])
            .assert()
    })
    .await
    .unwrap();

    assert.success();
    assert_eq!(std::fs::read(&output).unwrap(), b"hello");
}

#[tokio::test]
async fn test_binary_checksum_mismatch_fails() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/hello.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .mount(&mock_server)
        .await;

    let temp_dir = tempfile::TempDir::new().unwrap();
    let output_arg = temp_dir.path().join("hello.txt").to_string_lossy().to_string();
    let url = format!("{}/hello.txt", mock_server.uri());

    let assert = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("netfetch")
            .unwrap()
            .args(["-q", "-o", &output_arg, "--checksum", "wrong", &url])
            .assert()
    })
    .await
    .unwrap();

    assert
        .failure()
        .stderr(predicate::str::contains("checksum mismatch"));
}

#[tokio::test]
async fn test_binary_body_over_size_cap_fails() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/big"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 101]))
        .mount(&mock_server)
        .await;

    let url = format!("{}/big", mock_server.uri());
    let assert = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("netfetch")
            .unwrap()
            .args(["-q", "--max-body-bytes", "100", &url])
            .assert()
    })
    .await
    .unwrap();

    assert
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("over limit: 100"));
}

#[tokio::test]
async fn test_binary_body_at_size_cap_succeeds() {
    let Some(mock_server) = start_mock_server_or_skip().await else {
        return;
    };
    Mock::given(method("GET"))
        .and(path("/exact"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b'x'; 100]))
        .mount(&mock_server)
        .await;

    let url = format!("{}/exact", mock_server.uri());
    let assert = tokio::task::spawn_blocking(move || {
        Command::cargo_bin("netfetch")
            .unwrap()
            .args(["-q", "--max-body-bytes", "100", &url])
            .assert()
    })
    .await
    .unwrap();

    assert.success().stdout(vec![b'x'; 100]);
}
