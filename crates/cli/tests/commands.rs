// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! CLI integration tests for kv get/put/delete/status/shutdown

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(deprecated)]

mod common;

use assert_cmd::Command;
use common::TestDaemon;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn kv(state_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("kv").unwrap();
    cmd.arg("--state-dir").arg(state_dir);
    cmd
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("kv")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("get"))
        .stdout(predicate::str::contains("put"))
        .stdout(predicate::str::contains("delete"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_without_daemon_fails_gracefully() {
    let temp = TempDir::new().unwrap();

    kv(temp.path())
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Daemon not running"));
}

#[test]
fn test_put_get_delete() {
    let temp = TempDir::new().unwrap();
    let daemon = TestDaemon::start(temp.path());

    kv(daemon.state_dir())
        .args(["put", "rob", "was here"])
        .assert()
        .success();

    kv(daemon.state_dir())
        .args(["get", "rob"])
        .assert()
        .success()
        .stdout("was here\n");

    kv(daemon.state_dir())
        .args(["delete", "rob"])
        .assert()
        .success();

    kv(daemon.state_dir())
        .args(["get", "rob"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no such key: rob"));
}

#[test]
fn test_empty_key_is_rejected() {
    let temp = TempDir::new().unwrap();
    let daemon = TestDaemon::start(temp.path());

    kv(daemon.state_dir())
        .args(["put", "", "v"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid key"));
}

#[test]
fn test_get_json_output() {
    let temp = TempDir::new().unwrap();
    let daemon = TestDaemon::start(temp.path());

    kv(daemon.state_dir())
        .args(["put", "x", "42"])
        .assert()
        .success();

    let output = kv(daemon.state_dir())
        .args(["--output", "json", "get", "x"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["key"], "x");
    assert_eq!(json["value"], "42");
}

#[test]
fn test_status_counts_keys() {
    let temp = TempDir::new().unwrap();
    let daemon = TestDaemon::start(temp.path());

    for key in ["a", "b", "c"] {
        kv(daemon.state_dir())
            .args(["put", key, "v"])
            .assert()
            .success();
    }

    kv(daemon.state_dir())
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("keys:           3"));
}

#[test]
fn test_values_survive_daemon_restart() {
    let temp = TempDir::new().unwrap();

    let daemon = TestDaemon::start(temp.path());
    kv(temp.path())
        .args(["put", "rob", "v1"])
        .assert()
        .success();
    kv(temp.path())
        .args(["put", "rob", "v2"])
        .assert()
        .success();
    kv(temp.path())
        .args(["put", "x", "42"])
        .assert()
        .success();
    kv(temp.path())
        .args(["delete", "x"])
        .assert()
        .success();
    kv(temp.path())
        .arg("shutdown")
        .assert()
        .success()
        .stdout(predicate::str::contains("shutting down"));
    daemon.join();

    let _daemon = TestDaemon::start(temp.path());
    kv(temp.path())
        .args(["get", "rob"])
        .assert()
        .success()
        .stdout("v2\n");
    kv(temp.path())
        .args(["get", "x"])
        .assert()
        .failure();
}
