//! End-to-end runs of the `liszt` binary against a SQLite file.

use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn liszt(data_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_liszt"))
        .current_dir(data_dir)
        .env_remove("DATABASE_URL")
        .env_remove("LISZT_BACKEND")
        .env_remove("RUST_LOG")
        .env("LISZT_DATA_DIR", data_dir)
        .args(args)
        .output()
        .expect("failed to run liszt")
}

fn json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "liszt failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is not json")
}

#[test]
fn test_registry_persists_between_invocations() {
    let dir = tempfile::tempdir().unwrap();

    let building = json(&liszt(dir.path(), &["building", "register", "The White House"]));
    let building_id = building["id"].as_str().unwrap();

    let unit = json(&liszt(
        dir.path(),
        &["unit", "register", "Oval Office", "--building", building_id],
    ));
    let unit_id = unit["id"].as_str().unwrap();

    let resident = json(&liszt(
        dir.path(),
        &["resident", "register", "--first", "Josiah", "--middle", "Edward", "--last", "Bartlet"],
    ));
    let resident_id = resident["id"].as_str().unwrap();

    json(&liszt(dir.path(), &["resident", "move", resident_id, unit_id]));

    let residents = json(&liszt(dir.path(), &["resident", "list", "--unit", unit_id]));
    assert_eq!(residents.as_array().map(Vec::len), Some(1));
    assert_eq!(residents[0]["lastname"], "Bartlet");

    let found = json(&liszt(dir.path(), &["unit", "find", "Oval Office"]));
    assert_eq!(found, unit);
}

#[test]
fn test_missing_entity_exits_with_two() {
    let dir = tempfile::tempdir().unwrap();

    let output = liszt(dir.path(), &["building", "get", "nonexistent"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(output.stdout.is_empty());

    let output = liszt(dir.path(), &["resident", "move", "nobody", "nowhere"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_invalid_input_exits_with_one() {
    let dir = tempfile::tempdir().unwrap();

    let output = liszt(dir.path(), &["building", "register", ""]);
    assert_eq!(output.status.code(), Some(1));

    json(&liszt(dir.path(), &["unit", "register", "Mural Room"]));
    let output = liszt(dir.path(), &["unit", "register", "Mural Room"]);
    assert_eq!(output.status.code(), Some(1));
}
