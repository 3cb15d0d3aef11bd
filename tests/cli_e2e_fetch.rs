//! End-to-end tests for the `fetch` command.
//!
//! These tests invoke the actual CLI binary and validate the behavior of the
//! `fetch` subcommand from a user's perspective.

mod common;
use common::prelude::*;

/// Test that fetch --help flag shows help information
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_fetch_help() {
    let mut cmd = cargo_bin_cmd!("path-fetcher");

    cmd.arg("fetch")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Copy an input into the store"));
}

/// Test that fetching a directory prints its store path
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_fetch_directory() {
    let fixture = TestFixture::new().with_file("README.md", "# hello\n");

    fixture
        .command()
        .arg("fetch")
        .arg(fixture.source_url())
        .assert()
        .success()
        .stdout(predicate::str::contains("-source"))
        .stdout(predicate::str::contains("locked URL:"))
        .stdout(predicate::str::contains("last modified:"))
        .stdout(predicate::str::contains("NAR hash:      sha256:"));

    assert!(fixture.store_root().join("store").is_dir());
}

/// Test that --json emits a parseable object
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_fetch_json() {
    let fixture = TestFixture::new().with_file("a.txt", "a");

    let output = fixture
        .command()
        .arg("fetch")
        .arg("--json")
        .arg(format!("{}?lastModified=42", fixture.source_url()))
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["lastModified"], 42);
    let store_path = json["storePath"].as_str().unwrap();
    assert!(store_path.ends_with("-source"));
    assert_eq!(
        std::fs::read_to_string(std::path::Path::new(store_path).join("a.txt")).unwrap(),
        "a"
    );
}

/// Test that fetching the same content twice yields the same store path
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_fetch_is_deterministic() {
    let fixture = TestFixture::new().with_file("a.txt", "a");

    let run = || {
        let output = fixture
            .command()
            .arg("fetch")
            .arg("--json")
            .arg(fixture.source_url())
            .output()
            .unwrap();
        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        json["storePath"].as_str().unwrap().to_string()
    };

    let first = run();
    assert_eq!(run(), first);

    // Fetching the store object itself reuses it
    fixture
        .command()
        .arg("fetch")
        .arg(format!("path:{}", first))
        .assert()
        .success()
        .stdout(predicate::str::starts_with(first.clone()));
}

/// Test that a relative path is resolved against the working directory
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_fetch_relative_path_uses_current_dir() {
    let fixture = TestFixture::new().with_file("a.txt", "a");

    let store_path = |url: String| {
        let output = fixture
            .command()
            .arg("fetch")
            .arg("--json")
            .arg(url)
            .output()
            .unwrap();
        assert!(output.status.success());
        let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        json["storePath"].as_str().unwrap().to_string()
    };

    assert_eq!(
        store_path("path:./src".to_string()),
        store_path(fixture.source_url())
    );

    fixture
        .command()
        .arg("fetch")
        .arg("path:missing")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to fetch"));
}

/// Test that a missing directory is reported
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_fetch_missing_directory_fails() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("fetch")
        .arg(format!("path:{}/missing", fixture.path().display()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to fetch"));
}

/// Test that a disabled feature in the settings file blocks the scheme
#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_fetch_with_flakes_disabled_fails() {
    let fixture = TestFixture::new().with_file("a.txt", "a");
    let config = fixture.path().join("settings.yaml");
    std::fs::write(&config, "experimental-features: []\n").unwrap();

    fixture
        .command()
        .arg("--config")
        .arg(&config)
        .arg("fetch")
        .arg(fixture.source_url())
        .assert()
        .failure()
        .stderr(predicate::str::contains("flakes"));
}
