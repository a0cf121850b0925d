//! Lifecycle rules against real child processes.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use forkline::process::{ProcessBridge, ProcessBuilder, ProcessError, ProcessState, SpawnError};
use forkline::stream::listener;

use super::TIMEOUT;

fn sleeper() -> ProcessBridge {
    ProcessBridge::new("sleep", ["10"])
}

fn completion_counter(bridge: &ProcessBridge) -> Arc<AtomicUsize> {
    let count = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&count);
    bridge.subscribe(listener(
        |_| {},
        move || {
            c.fetch_add(1, Ordering::SeqCst);
        },
    ));
    count
}

#[tokio::test]
async fn exit_code_is_reported() {
    let bridge = ProcessBridge::new("sh", ["-c", "exit 3"]);
    bridge.start().unwrap();

    let code = tokio::time::timeout(TIMEOUT, bridge.wait_for_exit())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(code, Some(3));
    assert_eq!(bridge.exit_code(), Some(3));
}

#[tokio::test]
async fn kill_running_process_completes_once() {
    let bridge = sleeper();
    let completions = completion_counter(&bridge);
    bridge.start().unwrap();
    assert!(bridge.id().is_some());

    bridge.kill().unwrap();
    bridge.kill().unwrap();
    let code = tokio::time::timeout(TIMEOUT, bridge.wait_for_exit())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(code, None);
    assert_eq!(completions.load(Ordering::SeqCst), 1);
    assert!(bridge.kill().is_ok());
    assert!(bridge.id().is_none());
}

#[tokio::test]
async fn terminate_stops_process() {
    let bridge = sleeper();
    bridge.start().unwrap();

    bridge.terminate(Duration::from_millis(200)).await.unwrap();
    let code = tokio::time::timeout(TIMEOUT, bridge.wait_for_exit())
        .await
        .unwrap()
        .unwrap();
    assert_ne!(code, Some(0));
}

#[tokio::test]
async fn send_line_after_exit_is_silent() {
    let bridge = ProcessBridge::new("true", Vec::<String>::new());
    bridge.start().unwrap();
    tokio::time::timeout(TIMEOUT, bridge.wait_for_exit())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(bridge.state(), ProcessState::Exited);
    bridge.send_line("ignored").await.unwrap();
}

#[tokio::test]
async fn operations_before_start_are_illegal() {
    let bridge = sleeper();
    assert!(matches!(
        bridge.kill(),
        Err(ProcessError::IllegalState {
            state: ProcessState::Unstarted,
            ..
        })
    ));
    assert!(bridge.send_line("x").await.is_err());
    assert!(bridge.wait_for_exit().await.is_err());
}

#[tokio::test]
async fn start_twice_fails() {
    let bridge = ProcessBridge::new("true", Vec::<String>::new());
    bridge.start().unwrap();
    let err = bridge.start().unwrap_err();
    assert_eq!(err.illegal_state().map(|s| s != ProcessState::Unstarted), Some(true));
    bridge.dispose();
}

#[tokio::test]
async fn missing_program_fails_and_stays_unstarted() {
    let bridge = ProcessBridge::new("/nonexistent/forkline-test-binary", Vec::<String>::new());
    let err = bridge.start().unwrap_err();

    assert!(matches!(err, ProcessError::Spawn(SpawnError::NotFound)));
    assert_eq!(bridge.state(), ProcessState::Unstarted);
}

#[test]
fn start_without_runtime_fails() {
    let bridge = ProcessBridge::new("true", Vec::<String>::new());
    let err = bridge.start().unwrap_err();
    assert!(matches!(err, ProcessError::Spawn(SpawnError::NoRuntime)));
    assert_eq!(bridge.state(), ProcessState::Unstarted);
}

#[tokio::test]
async fn dispose_running_process_emits_no_completion() {
    let bridge = ProcessBridge::create(ProcessBuilder::new("sleep").arg("10").kill_on_dispose(true));
    let completions = completion_counter(&bridge);
    bridge.start().unwrap();

    bridge.dispose();
    bridge.dispose();
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(bridge.state(), ProcessState::Disposed);
    assert_eq!(completions.load(Ordering::SeqCst), 0);
    assert_eq!(bridge.subscriber_count(), 0);
    assert!(bridge.start().is_err());
}

#[tokio::test]
async fn working_dir_and_env_reach_child() {
    let dir = tempfile::tempdir().unwrap();
    let expected = dir.path().canonicalize().unwrap();
    let bridge = ProcessBridge::create(
        ProcessBuilder::new("sh")
            .args(["-c", "pwd -P; echo $FORKLINE_TEST_VALUE"])
            .env("FORKLINE_TEST_VALUE", "hello")
            .working_dir(&expected),
    );
    let events = bridge.events();
    bridge.start().unwrap();

    let lines: Vec<String> = super::collect(events)
        .await
        .into_iter()
        .filter_map(|e| e.line().map(|l| l.text().to_string()))
        .collect();
    assert_eq!(lines, [expected.to_str().unwrap(), "hello"]);
}
