//! Process bridge tests against real child processes.

mod bridge_test;
mod lifecycle_test;

use std::time::Duration;

use futures_util::StreamExt;

use forkline::stream::{EventStream, ProcessEvent};

/// Upper bound for any single wait in these tests.
pub const TIMEOUT: Duration = Duration::from_secs(10);

/// Collect events until the stream ends.
pub async fn collect(mut events: EventStream) -> Vec<ProcessEvent> {
    let mut out = Vec::new();
    while let Some(event) = tokio::time::timeout(TIMEOUT, events.next())
        .await
        .expect("stream timed out")
    {
        out.push(event);
    }
    out
}

/// Verify the public process types are exported from the library.
#[test]
fn test_all_process_types_exported() {
    use forkline::process::{
        AtomicProcessState, OsProcess, ProcessBridge, ProcessBuilder, ProcessError,
        ProcessEvents, ProcessState, SpawnError, TokioProcess,
    };
    use forkline::stream::{
        ChannelListener, Listener, OutputLine, StreamKind, SubscriberRegistry, Subscription,
    };

    let _ = AtomicProcessState::default();
    let _ = TokioProcess::new(ProcessBuilder::new("true"));
    let _ = ProcessBridge::new("true", ["x"]);
    let _ = SubscriberRegistry::new();
    let _ = Subscription::inert();
    let _ = OutputLine::new("x", StreamKind::Out);
    let _: fn() -> SpawnError = || SpawnError::NotFound;
    let _: fn() -> ProcessError = || ProcessError::Spawn(SpawnError::NoRuntime);
    let _ = ProcessState::Unstarted;

    fn assert_listener<L: Listener>() {}
    assert_listener::<ChannelListener>();
    fn assert_driver<T: OsProcess>() {}
    assert_driver::<TokioProcess>();
    fn assert_events<T: ProcessEvents + ?Sized>() {}
    assert_events::<dyn ProcessEvents>();
}
