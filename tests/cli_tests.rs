//! CLI integration tests

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn trackcast_bin() -> Command {
    Command::cargo_bin("trackcast").unwrap()
}

/// Binary isolated from the user's config and runtime dirs
fn isolated(dir: &TempDir) -> Command {
    let mut cmd = trackcast_bin();
    cmd.env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env("XDG_RUNTIME_DIR", dir.path())
        .env_remove("TRACKCAST_RECOGNITION_KEY")
        .env_remove("TRACKCAST_GENERATION_KEY");
    cmd
}

#[test]
fn help_output() {
    trackcast_bin().arg("--help").assert().success().stdout(
        predicate::str::contains("OSC")
            .and(predicate::str::contains("--duration"))
            .and(predicate::str::contains("--interval"))
            .and(predicate::str::contains("--recognizer"))
            .and(predicate::str::contains("--generator"))
            .and(predicate::str::contains("--osc-host"))
            .and(predicate::str::contains("--daemon")),
    );
}

#[test]
fn version_output() {
    trackcast_bin()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("trackcast").and(predicate::str::contains(env!(
            "CARGO_PKG_VERSION"
        ))));
}

#[test]
fn config_path_command() {
    let dir = TempDir::new().unwrap();
    isolated(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("trackcast").and(predicate::str::contains("config.toml")));
}

#[test]
fn config_help() {
    let mut assert = trackcast_bin().args(["config", "--help"]).assert().success();
    for action in ["init", "set", "get", "list", "path"] {
        assert = assert.stdout(predicate::str::contains(action));
    }
}

#[test]
fn daemon_help_lists_actions() {
    let mut assert = trackcast_bin().args(["daemon", "--help"]).assert().success();
    for action in ["start", "stop", "status", "ping", "manual"] {
        assert = assert.stdout(predicate::str::contains(action));
    }
}

#[test]
fn config_set_then_get() {
    let dir = TempDir::new().unwrap();

    isolated(&dir)
        .args(["config", "set", "osc.host", "192.168.0.50"])
        .assert()
        .success();

    isolated(&dir)
        .args(["config", "get", "osc.host"])
        .assert()
        .success()
        .stdout(predicate::str::diff("192.168.0.50").trim());

    let file = dir.path().join("config").join("trackcast").join("config.toml");
    let contents = std::fs::read_to_string(file).unwrap();
    assert!(contents.contains("[osc]"));
}

#[test]
fn config_list_masks_api_keys() {
    let dir = TempDir::new().unwrap();

    isolated(&dir)
        .args(["config", "set", "recognition.api_key", "abcd1234efgh5678"])
        .assert()
        .success();

    isolated(&dir)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("abcd...5678")
                .and(predicate::str::contains("abcd1234efgh5678").not()),
        );
}

#[test]
fn config_init_twice_fails() {
    let dir = TempDir::new().unwrap();

    isolated(&dir).args(["config", "init"]).assert().success();

    isolated(&dir)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn daemon_no_publish_conflict() {
    trackcast_bin()
        .args(["--daemon", "--no-publish"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot be used with").or(predicate::str::contains("conflict")));
}

#[test]
fn interval_without_daemon_is_rejected() {
    trackcast_bin().args(["--interval", "2m"]).assert().code(2);
}

// Runs with valid arguments and credentials would start capturing audio,
// so the one-shot path is only exercised up to its early failures here.
