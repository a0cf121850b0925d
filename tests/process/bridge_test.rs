//! Line delivery from real child processes.

use std::sync::{Arc, Mutex};

use futures_util::StreamExt;

use forkline::process::{ProcessBridge, ProcessState};
use forkline::stream::{listener, OutputLine, ProcessEvent};

use super::{collect, TIMEOUT};

fn sh(script: &str) -> ProcessBridge {
    ProcessBridge::new("sh", ["-c", script])
}

#[tokio::test]
async fn stdout_lines_then_completion() {
    let bridge = sh("echo a; echo b");
    let events = bridge.events();
    bridge.start().unwrap();

    assert_eq!(
        collect(events).await,
        vec![
            ProcessEvent::Line(OutputLine::out("a")),
            ProcessEvent::Line(OutputLine::out("b")),
            ProcessEvent::Completed,
        ]
    );
    assert_eq!(bridge.state(), ProcessState::Exited);
    assert_eq!(bridge.exit_code(), Some(0));
}

#[tokio::test]
async fn stderr_lines_are_tagged() {
    let bridge = sh("echo oops 1>&2");
    let events = bridge.events();
    bridge.start().unwrap();

    let events = collect(events).await;
    assert_eq!(events[0], ProcessEvent::Line(OutputLine::err("oops")));
    assert!(events[0].line().unwrap().is_err());
    assert_eq!(events.last(), Some(&ProcessEvent::Completed));
}

#[tokio::test]
async fn each_stream_keeps_its_order() {
    let bridge = sh("for i in 1 2 3; do echo out$i; echo err$i 1>&2; done");
    let events = bridge.events();
    bridge.start().unwrap();

    let lines: Vec<OutputLine> = collect(events)
        .await
        .into_iter()
        .filter_map(|e| e.line().cloned())
        .collect();
    let out: Vec<&str> = lines.iter().filter(|l| l.is_out()).map(OutputLine::text).collect();
    let err: Vec<&str> = lines.iter().filter(|l| l.is_err()).map(OutputLine::text).collect();

    assert_eq!(out, ["out1", "out2", "out3"]);
    assert_eq!(err, ["err1", "err2", "err3"]);
}

#[tokio::test]
async fn cat_echoes_sent_lines() {
    let bridge = ProcessBridge::new("cat", Vec::<String>::new());
    let mut events = bridge.events();
    bridge.start().unwrap();

    bridge.send_line("6").await.unwrap();
    let event = tokio::time::timeout(TIMEOUT, events.next()).await.unwrap();
    assert_eq!(event, Some(ProcessEvent::Line(OutputLine::out("6"))));

    bridge.kill().unwrap();
    let rest = collect(events).await;
    assert_eq!(rest, vec![ProcessEvent::Completed]);
}

#[tokio::test]
async fn several_subscribers_see_the_same_lines() {
    let bridge = sh("echo one; echo two");
    let first = bridge.events();
    let second = bridge.events();
    bridge.start().unwrap();

    let (a, b) = tokio::join!(collect(first), collect(second));
    assert_eq!(a, b);
    assert_eq!(a.len(), 3);
}

#[tokio::test]
async fn callback_listener_receives_completion_last() {
    let bridge = sh("echo x");
    let log = Arc::new(Mutex::new(Vec::new()));
    let (on_line, on_done) = (Arc::clone(&log), Arc::clone(&log));
    bridge.subscribe(listener(
        move |line| on_line.lock().unwrap().push(line.text().to_string()),
        move || on_done.lock().unwrap().push("<completed>".to_string()),
    ));

    bridge.start().unwrap();
    tokio::time::timeout(TIMEOUT, bridge.wait_for_exit())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(*log.lock().unwrap(), ["x", "<completed>"]);
    assert_eq!(bridge.subscriber_count(), 0);
}

#[tokio::test]
async fn late_subscriber_gets_only_completion() {
    let bridge = sh("echo early");
    bridge.start().unwrap();
    tokio::time::timeout(TIMEOUT, bridge.wait_for_exit())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(collect(bridge.events()).await, vec![ProcessEvent::Completed]);
}

#[tokio::test]
async fn blank_lines_are_delivered_empty() {
    let bridge = sh("echo; printf 'no newline'");
    let events = bridge.events();
    bridge.start().unwrap();

    assert_eq!(
        collect(events).await,
        vec![
            ProcessEvent::Line(OutputLine::out("")),
            ProcessEvent::Line(OutputLine::out("no newline")),
            ProcessEvent::Completed,
        ]
    );
}
