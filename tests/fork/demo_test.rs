//! End-to-end fork round trips through the forkline binary.

use std::process::Command;

use forkline::process::{ProcessBridge, ProcessBuilder};
use forkline::stream::{OutputLine, ProcessEvent};

use crate::process::collect;

const BIN: &str = env!("CARGO_BIN_EXE_forkline");

#[tokio::test]
async fn fork_role_multiplies_sent_numbers() {
    let bridge = ProcessBridge::new(BIN, ["demo", "--forked"]);
    let events = bridge.events();
    bridge.start().unwrap();

    bridge.send_line("5").await.unwrap();
    bridge.send_line("6").await.unwrap();

    let events = collect(events).await;
    assert_eq!(
        events,
        vec![
            ProcessEvent::Line(OutputLine::out("5 * 6 = 30")),
            ProcessEvent::Completed,
        ]
    );
    assert_eq!(bridge.wait_for_exit().await.unwrap(), Some(0));
}

#[tokio::test]
async fn env_marker_selects_fork_role() {
    let bridge = ProcessBridge::create(
        ProcessBuilder::new(BIN)
            .arg("demo")
            .env("FORKLINE_FORKED", "1"),
    );
    let events = bridge.events();
    bridge.start().unwrap();
    bridge.send_line("7").await.unwrap();
    bridge.send_line("8").await.unwrap();

    let lines: Vec<String> = collect(events)
        .await
        .into_iter()
        .filter_map(|e| e.line().map(|l| l.text().to_string()))
        .collect();
    assert_eq!(lines, ["7 * 8 = 56"]);
}

#[test]
fn master_demo_forks_and_collects_results() {
    let output = Command::new(BIN)
        .args(["demo", "--forks", "2"])
        .env_remove("FORKLINE_FORKED")
        .output()
        .expect("Failed to execute forkline");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "demo failed: {stdout}");
    assert!(stdout.contains("Starting forks..."));
    assert!(stdout.contains("FORK1: 5 * 6 = 30"), "stdout: {stdout}");
    assert!(stdout.contains("FORK2: 7 * 8 = 56"), "stdout: {stdout}");
    assert!(stdout.contains("FORK1 exited with code = 0"));
    assert!(stdout.contains("FORK2 exited with code = 0"));
    // Forks must not fork again.
    assert!(!stdout.contains("FORK1: FORK"));
}

#[test]
fn run_relays_child_output_and_exit_code() {
    let output = Command::new(BIN)
        .args(["run", "sh", "-c", "echo hi; echo bad 1>&2; exit 4"])
        .output()
        .expect("Failed to execute forkline");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(output.status.code(), Some(4));
    assert!(stdout.contains("sh: hi"));
    assert!(stdout.contains("sh [stderr]: bad"));
}

#[test]
fn run_json_emits_one_object_per_event() {
    let output = Command::new(BIN)
        .args(["run", "--json", "sh", "-c", "echo hi"])
        .output()
        .expect("Failed to execute forkline");

    let stdout = String::from_utf8_lossy(&output.stdout);
    let records: Vec<serde_json::Value> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();

    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["type"], "line");
    assert_eq!(records[0]["text"], "hi");
    assert_eq!(records[1]["type"], "completed");
}
