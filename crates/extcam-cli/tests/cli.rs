// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 Au-Zone Technologies

//! Integration tests for the extcam CLI
//!
//! These tests verify CLI commands work correctly end-to-end using the
//! assert_cmd crate pattern. Device directories are faked with plain files,
//! which never answer V4L2 ioctls; tests needing real cameras are ignored.

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use std::{env, fs, path::PathBuf};

/// Helper to create a Command for the extcam binary
/// Uses EXTCAM_BIN environment variable if set, otherwise uses cargo run
fn extcam_cmd() -> Command {
    if let Ok(bin_path) = env::var("EXTCAM_BIN") {
        Command::new(bin_path)
    } else {
        let mut c = Command::new("cargo");
        c.args(["run", "--quiet", "--bin", "extcam", "--"]);
        c
    }
}

/// Get a fresh test data directory (target/testdata/extcam-cli/<name>)
fn test_dir(name: &str) -> PathBuf {
    let dir = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("target")
        .join("testdata")
        .join("extcam-cli")
        .join(name);

    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).expect("Failed to create test data directory");
    dir
}

/// Build a fake device directory holding `entries` as empty files and a
/// configuration file pointing at it. Returns the configuration path.
fn fake_devices(name: &str, entries: &[&str], extra: &str) -> PathBuf {
    let root = test_dir(name);
    let dev = root.join("dev");
    fs::create_dir_all(&dev).unwrap();
    for entry in entries {
        fs::write(dev.join(entry), b"").unwrap();
    }

    let config = root.join("extcam.json");
    let mut body = format!(
        r#""device_dir": "{}", "sysfs_root": "{}""#,
        dev.display(),
        root.join("sys").display()
    );
    if !extra.is_empty() {
        body.push_str(", ");
        body.push_str(extra);
    }
    fs::write(&config, format!("{{ {} }}", body)).unwrap();
    config
}

// =============================================================================
// Basic CLI Tests (No Hardware Required)
// =============================================================================

#[test]
fn test_cli_help() {
    extcam_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("monitor"))
        .stdout(predicate::str::contains("parse"));
}

#[test]
fn test_cli_version() {
    extcam_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("extcam"));
}

#[test]
fn test_parse_valid() {
    extcam_cmd()
        .args(["--offset", "2", "parse", "device@3.4/external/7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/dev/video5"));
}

#[test]
fn test_parse_json() {
    let output = extcam_cmd()
        .args(["--json", "parse", "device@3.6/external/105"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["id"], "device@3.6/external/105");
    assert_eq!(json["version"], "3.6");
    assert_eq!(json["number"], 105);
    assert_eq!(json["node"], "/dev/video5");
    assert_eq!(json["current_version"], false);
}

#[test]
fn test_parse_below_offset() {
    extcam_cmd()
        .args(["parse", "device@3.4/external/7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("below offset 100"));
}

#[test]
fn test_parse_invalid_exit_code() {
    extcam_cmd()
        .args(["parse", "device@3.4/external/07"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid device name"));
}

#[test]
fn test_missing_config_exit_code() {
    extcam_cmd()
        .args(["--config", "/nonexistent/extcam.json", "scan"])
        .assert()
        .code(2);
}

#[test]
#[serial]
fn test_scan_fake_directory() {
    let config = fake_devices(
        "scan",
        &["video0", "video3", "video01", "cec0", "media0"],
        r#""internal_devices": [0], "camera_id_offset": 2"#,
    );

    let output = extcam_cmd()
        .arg("--json")
        .arg("--config")
        .arg(&config)
        .arg("scan")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let devices = json["devices"].as_array().unwrap();
    assert_eq!(devices.len(), 2);
    assert_eq!(devices[0]["class"], "internal");
    assert_eq!(devices[0]["id"], "device@3.4/external/2");
    assert_eq!(devices[1]["class"], "not-external");
    assert_eq!(devices[1]["id"], "device@3.4/external/5");
    assert_eq!(json["summary"]["total"], 2);
    assert_eq!(json["summary"]["external"], 0);
}

#[test]
#[serial]
fn test_scan_missing_directory() {
    let root = test_dir("scan-missing");
    let config = root.join("extcam.json");
    fs::write(
        &config,
        format!(
            r#"{{ "device_dir": "{}" }}"#,
            root.join("missing").display()
        ),
    )
    .unwrap();

    extcam_cmd()
        .arg("--config")
        .arg(&config)
        .arg("scan")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("Discovery failed"));
}

#[test]
#[serial]
fn test_monitor_missing_directory() {
    let root = test_dir("monitor-missing");
    let config = root.join("extcam.json");
    fs::write(
        &config,
        format!(
            r#"{{ "device_dir": "{}", "poll_timeout_ms": 20 }}"#,
            root.join("missing").display()
        ),
    )
    .unwrap();

    extcam_cmd()
        .arg("--config")
        .arg(&config)
        .args(["monitor", "--duration", "5"])
        .assert()
        .code(4);
}

#[test]
#[serial]
fn test_monitor_duration() {
    let config = fake_devices("monitor", &["video1"], r#""poll_timeout_ms": 20"#);

    extcam_cmd()
        .arg("--config")
        .arg(&config)
        .args(["monitor", "--duration", "1"])
        .assert()
        .success();
}

// =============================================================================
// Hardware Tests (Require V4L2 devices)
// =============================================================================

#[test]
#[ignore = "requires V4L2 devices under /dev"]
#[serial]
fn test_scan_hardware() {
    extcam_cmd()
        .args(["scan"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Summary:"));
}
