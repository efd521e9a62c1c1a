//! CLI integration tests for all implemented subcommands.
//!
//! Uses `assert_cmd` to spawn the `remotecard` binary and verify
//! exit codes, stdout content, and stderr content. Element configs and
//! state snapshots are written to a temp directory per test.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn remotecard() -> Command {
    cargo_bin_cmd!("remotecard")
}

fn write_file(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

/// A dimmer element bound to a light entity through its tap action.
fn dimmer_fixture(dir: &Path) -> (String, String) {
    let config = write_file(
        dir,
        "config.json",
        r#"{
            "tap_action": { "action": "more-info", "data": { "entity_id": "light.bedroom" } },
            "value_attribute": "brightness"
        }"#,
    );
    let states = write_file(
        dir,
        "states.json",
        r#"{ "light.bedroom": { "state": "on", "attributes": { "brightness": 128 } } }"#,
    );
    (config, states)
}

// ──────────────────────────────────────────────
// 1. Help and version
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    remotecard()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Remote-control panel engine CLI"));
}

#[test]
fn version_exits_0() {
    remotecard()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("remotecard"));
}

// ──────────────────────────────────────────────
// 2. Value subcommand
// ──────────────────────────────────────────────

#[test]
fn value_derives_scaled_brightness() {
    let tmp = TempDir::new().unwrap();
    let (config, states) = dimmer_fixture(tmp.path());

    remotecard()
        .args(["value", &config, "--states", &states])
        .assert()
        .success()
        .stdout(predicate::str::contains("50"));
}

#[test]
fn value_json_output_carries_entity_id() {
    let tmp = TempDir::new().unwrap();
    let (config, states) = dimmer_fixture(tmp.path());

    remotecard()
        .args(["--output", "json", "value", &config, "--states", &states])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"entity_id\": \"light.bedroom\""));
}

#[test]
fn value_accepts_yaml_config() {
    let tmp = TempDir::new().unwrap();
    let config = write_file(
        tmp.path(),
        "config.yaml",
        concat!(
            "tap_action:\n",
            "  action: more-info\n",
            "  data:\n",
            "    entity_id: light.bedroom\n",
            "value_attribute: brightness\n",
        ),
    );
    let states = write_file(
        tmp.path(),
        "states.json",
        r#"{ "light.bedroom": { "state": "on", "attributes": { "brightness": 255 } } }"#,
    );

    remotecard()
        .args(["value", &config, "--states", &states])
        .assert()
        .success()
        .stdout(predicate::str::contains("100"));
}

#[test]
fn value_nonexistent_config_exits_1() {
    let tmp = TempDir::new().unwrap();
    let states = write_file(tmp.path(), "states.json", "{}");

    remotecard()
        .args(["value", "no_such_config.json", "--states", &states])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("error reading"));
}

// ──────────────────────────────────────────────
// 3. Render subcommand
// ──────────────────────────────────────────────

#[test]
fn render_substitutes_the_value_token() {
    let tmp = TempDir::new().unwrap();
    let (config, states) = dimmer_fixture(tmp.path());

    remotecard()
        .args(["render", &config, "--states", &states, "VALUE"])
        .assert()
        .success()
        .stdout(predicate::str::contains("50"));
}

// ──────────────────────────────────────────────
// 4. Simulate subcommand
// ──────────────────────────────────────────────

#[test]
fn simulate_tap_sends_the_key_command() {
    let tmp = TempDir::new().unwrap();
    let config = write_file(
        tmp.path(),
        "config.json",
        r#"{ "tap_action": { "action": "key", "key": "DPAD_UP" } }"#,
    );
    let states = write_file(tmp.path(), "states.json", "{}");

    remotecard()
        .args([
            "simulate",
            &config,
            "--states",
            &states,
            "--remote-id",
            "remote.living_room_tv",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("remote.send_command"))
        .stdout(predicate::str::contains("DPAD_UP"));
}

#[test]
fn simulate_json_output_records_the_call() {
    let tmp = TempDir::new().unwrap();
    let config = write_file(
        tmp.path(),
        "config.json",
        r#"{ "tap_action": { "action": "key", "key": "ENTER" } }"#,
    );
    let states = write_file(tmp.path(), "states.json", "{}");

    remotecard()
        .args([
            "--output",
            "json",
            "simulate",
            &config,
            "--states",
            &states,
            "--remote-id",
            "remote.living_room_tv",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"ok\": true"))
        .stdout(predicate::str::contains("\"domain\": \"remote\""));
}

#[test]
fn simulate_denied_confirmation_dispatches_nothing() {
    let tmp = TempDir::new().unwrap();
    let config = write_file(
        tmp.path(),
        "config.json",
        r#"{ "tap_action": { "action": "key", "key": "POWER", "confirmation": true } }"#,
    );
    let states = write_file(tmp.path(), "states.json", "{}");

    remotecard()
        .args([
            "simulate",
            &config,
            "--states",
            &states,
            "--remote-id",
            "remote.living_room_tv",
            "--deny",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("no service calls"))
        .stdout(predicate::str::contains("prompt:"));
}

#[test]
fn simulate_unknown_interaction_exits_1() {
    let tmp = TempDir::new().unwrap();
    let config = write_file(tmp.path(), "config.json", "{}");
    let states = write_file(tmp.path(), "states.json", "{}");

    remotecard()
        .args([
            "simulate",
            &config,
            "--states",
            &states,
            "--interaction",
            "wiggle",
        ])
        .assert()
        .failure()
        .code(1);
}
