//! Integration tests for the `slots` CLI binary.
//!
//! These tests use `assert_cmd` and `predicates` to exercise the query, check,
//! and reserve subcommands through the actual binary, with JSON fixtures for the
//! engine configuration and existing bookings.

// `Command::cargo_bin` was deprecated in assert_cmd 2.1.2 in favor of
// `cargo::cargo_bin_cmd!`. Allow it until we migrate.
#![allow(deprecated)]

use assert_cmd::Command;
use chrono::{DateTime, TimeZone, Utc};
use predicates::prelude::*;
use serde_json::Value;

const NOW: &str = "2026-03-01T00:00:00Z";

/// Helper: path to the config.json fixture.
fn config_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/config.json")
}

/// Helper: path to the bookings.json fixture.
fn bookings_path() -> &'static str {
    concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/bookings.json")
}

fn slots() -> Command {
    let mut cmd = Command::cargo_bin("slots").unwrap();
    cmd.args(["--config", config_path()]);
    cmd
}

/// Helper: parse an RFC 3339 field back into an instant, whatever offset style
/// the serializer picked.
fn instant(value: &Value) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value.as_str().expect("timestamp must be a string"))
        .expect("timestamp must be RFC 3339")
        .with_timezone(&Utc)
}

fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, day, h, m, 0).unwrap()
}

fn stdout_json(output: &std::process::Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout must be JSON")
}

// ─────────────────────────────────────────────────────────────────────────────
// query
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn query_groups_slots_by_date() {
    let output = slots()
        .args(["query", "-l", "downtown", "-d", "30", "--days", "2", "--start", "2026-03-02"])
        .args(["--now", NOW])
        .output()
        .unwrap();
    assert!(output.status.success());

    let days = stdout_json(&output);
    let days = days.as_array().unwrap();
    assert_eq!(days.len(), 2);
    assert_eq!(days[0]["date"], "2026-03-02");
    assert_eq!(days[0]["slots"].as_array().unwrap().len(), 20);
    assert_eq!(instant(&days[0]["slots"][0]["start"]), at(2, 9, 0));
    assert_eq!(days[0]["slots"][0]["duration_minutes"], 30);
}

#[test]
fn query_excludes_booked_time() {
    let output = slots()
        .args(["query", "-l", "downtown", "-d", "30", "--days", "1", "--start", "2026-03-03"])
        .args(["-b", bookings_path(), "--now", NOW])
        .output()
        .unwrap();
    assert!(output.status.success());

    let days = stdout_json(&output);
    let starts: Vec<DateTime<Utc>> = days[0]["slots"]
        .as_array()
        .unwrap()
        .iter()
        .map(|s| instant(&s["start"]))
        .collect();
    // The cancelled 15:00 item does not block anything.
    assert_eq!(starts.len(), 18);
    assert!(starts.contains(&at(3, 9, 30)));
    assert!(!starts.contains(&at(3, 10, 30)));
    assert!(starts.contains(&at(3, 11, 0)));
    assert!(starts.contains(&at(3, 15, 0)));
}

#[test]
fn query_unknown_location_fails() {
    slots()
        .args(["query", "-l", "uptown", "-d", "30", "--now", NOW])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown location: uptown"));
}

#[test]
fn query_too_many_days_fails() {
    slots()
        .args(["query", "-l", "downtown", "-d", "30", "--days", "100", "--now", NOW])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid day count 100"));
}

// ─────────────────────────────────────────────────────────────────────────────
// check
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn check_free_window() {
    slots()
        .args(["check", "-l", "downtown"])
        .args(["--start", "2026-03-03T14:00", "--end", "2026-03-03T14:30"])
        .args(["-b", bookings_path(), "--now", NOW])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""available": true"#))
        .stdout(predicate::str::contains("reason").not());
}

#[test]
fn check_booked_window_names_the_conflict() {
    let output = slots()
        .args(["check", "-l", "downtown"])
        .args(["--start", "2026-03-03T10:30", "--end", "2026-03-03T11:00"])
        .args(["-b", bookings_path(), "--now", NOW])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report = stdout_json(&output);
    assert_eq!(report["available"], false);
    assert_eq!(report["reason"]["reason"], "already_booked");
    assert_eq!(report["reason"]["conflicting"]["id"], "evt-1");
}

#[test]
fn check_closed_and_past_windows() {
    slots()
        .args(["check", "-l", "seaside"])
        .args(["--start", "2026-03-14T10:00", "--end", "2026-03-14T10:30"])
        .args(["--now", NOW])
        .assert()
        .success()
        .stdout(predicate::str::contains("closed_day"));

    slots()
        .args(["check", "-l", "downtown"])
        .args(["--start", "2026-02-24T10:00", "--end", "2026-02-24T10:30"])
        .args(["--now", NOW])
        .assert()
        .success()
        .stdout(predicate::str::contains("in_the_past"));
}

#[test]
fn check_malformed_timestamp_fails() {
    slots()
        .args(["check", "-l", "downtown", "--start", "soon", "--end", "2026-03-03T10:30"])
        .args(["--now", NOW])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid timestamp 'soon'"));
}

// ─────────────────────────────────────────────────────────────────────────────
// reserve
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn reserve_appends_then_rejects_duplicate() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bookings.json");
    std::fs::copy(bookings_path(), &path).unwrap();
    let path = path.to_str().unwrap();

    let reserve = || {
        let mut cmd = slots();
        cmd.args(["reserve", "-l", "downtown"])
            .args(["--start", "2026-03-03T14:00", "--end", "2026-03-03T14:30"])
            .args(["--title", "Haircut", "-b", path, "--now", NOW]);
        cmd
    };

    reserve()
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""status": "committed""#))
        .stdout(predicate::str::contains("Haircut"));

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    let items = saved["items"].as_array().unwrap();
    assert_eq!(items.len(), 3);
    assert_eq!(instant(&items[2]["start"]), at(3, 14, 0));

    reserve()
        .assert()
        .code(2)
        .stdout(predicate::str::contains(r#""status": "rejected""#))
        .stdout(predicate::str::contains("already_booked"));
}

#[test]
fn reserve_leaves_existing_items_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bookings.json");
    std::fs::write(
        &path,
        r#"{"items": [
            {"id": "x", "status": "cancelled",
             "start": "2026-03-04T10:00:00Z", "end": "2026-03-04T11:00:00Z"},
            {"id": "y", "colorId": "7",
             "start": {"date": "2026-03-05"}, "end": {"date": "2026-03-06"}}
        ]}"#,
    )
    .unwrap();

    slots()
        .args(["reserve", "-l", "downtown"])
        .args(["--start", "2026-03-04T10:00", "--end", "2026-03-04T10:30"])
        .args(["-b", path.to_str().unwrap(), "--now", NOW])
        .assert()
        .success();

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let items = saved["items"].as_array().expect("envelope must survive");
    assert_eq!(items.len(), 3);
    assert_eq!(items[0]["id"], "x");
    assert_eq!(items[0]["status"], "cancelled");
    assert_eq!(items[1]["colorId"], "7");
    assert_eq!(items[1]["start"], serde_json::json!({"date": "2026-03-05"}));
    assert_eq!(instant(&items[2]["start"]), at(4, 10, 0));
}

#[test]
fn reserve_sees_bookings_already_in_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bookings.json");
    let path = path.to_str().unwrap();
    let reserve = |start: &str, end: &str| {
        let mut cmd = slots();
        cmd.args(["reserve", "-l", "seaside", "--start", start, "--end", end])
            .args(["-b", path, "--now", NOW]);
        cmd
    };

    reserve("2026-03-07T09:00", "2026-03-07T10:00").assert().success();
    reserve("2026-03-07T09:30", "2026-03-07T10:30")
        .assert()
        .code(2)
        .stdout(predicate::str::contains("already_booked"));

    let saved: Value = serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(saved.as_array().unwrap().len(), 1);
}

#[test]
fn malformed_bookings_file_fails_closed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bookings.json");
    std::fs::write(&path, "[{\"start\": 42}]").unwrap();

    slots()
        .args(["query", "-l", "downtown", "-d", "30", "--days", "1", "--start", "2026-03-02"])
        .args(["-b", path.to_str().unwrap(), "--now", NOW])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Booking source unavailable"));
}

#[test]
fn reserve_into_new_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fresh.json");

    slots()
        .args(["reserve", "-l", "seaside"])
        .args(["--start", "2026-03-07T09:00", "--end", "2026-03-07T10:00"])
        .args(["-b", path.to_str().unwrap(), "--now", NOW])
        .assert()
        .success();

    assert!(path.exists());
}

#[test]
fn missing_config_fails() {
    Command::cargo_bin("slots")
        .unwrap()
        .args(["--config", "/nonexistent/config.json", "query", "-l", "downtown", "-d", "30"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config"));
}
