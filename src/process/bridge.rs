//! Process lifecycle bridge.
//!
//! A [`ProcessBridge`] owns one OS process and turns it into a
//! multi-subscriber line stream. Lines from stdout and stderr are
//! broadcast to every current subscriber; the exit is delivered as a
//! single completion, after which subscribers are detached.

use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use tokio::sync::watch;

use super::{
    AtomicProcessState, OsProcess, ProcessBuilder, ProcessError, ProcessEvents, ProcessState,
    TokioProcess,
};
use crate::stream::{EventStream, Listener, OutputLine, SubscriberRegistry, Subscription};

struct BridgeInner {
    label: String,
    state: AtomicProcessState,
    state_tx: watch::Sender<ProcessState>,
    exit_code: OnceLock<Option<i32>>,
    registry: SubscriberRegistry,
    os: Box<dyn OsProcess>,
}

impl BridgeInner {
    /// Mirror the atomic state into the watch channel.
    fn publish(&self) {
        self.state_tx.send_modify(|s| *s = self.state.load());
    }

    fn on_line(&self, line: &OutputLine) {
        if self.state.load() != ProcessState::Running {
            return;
        }
        self.registry.broadcast(line);
    }

    fn on_exit(&self, code: Option<i32>) {
        if self
            .state
            .transition(ProcessState::Running, ProcessState::Exited)
            .is_err()
        {
            return;
        }
        let _ = self.exit_code.set(code);
        tracing::info!(program = %self.label, code = ?code, "Process exited");
        // Claim every member before anything else can dispose the bridge.
        self.registry.complete_all();
        self.os.detach();
        self.publish();
    }
}

/// Callback target handed to the OS driver. Holds the bridge weakly so a
/// dropped bridge stops receiving.
struct BridgeEvents(Weak<BridgeInner>);

impl ProcessEvents for BridgeEvents {
    fn on_line(&self, line: OutputLine) {
        if let Some(inner) = self.0.upgrade() {
            inner.on_line(&line);
        }
    }

    fn on_exit(&self, code: Option<i32>) {
        if let Some(inner) = self.0.upgrade() {
            inner.on_exit(code);
        }
    }
}

/// A child process exposed as a line stream with an explicit lifecycle.
///
/// Cloning gives another handle to the same process. All operations are
/// safe to call concurrently from any thread.
#[derive(Clone)]
pub struct ProcessBridge {
    inner: Arc<BridgeInner>,
}

impl ProcessBridge {
    /// Create an unstarted bridge for `program args...`.
    #[must_use]
    pub fn new<I, S>(program: impl AsRef<std::ffi::OsStr>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<std::ffi::OsStr>,
    {
        Self::create(ProcessBuilder::new(program).args(args))
    }

    /// Create an unstarted bridge from a builder. Nothing is spawned yet.
    #[must_use]
    pub fn create(builder: ProcessBuilder) -> Self {
        let label = builder.program().to_string_lossy().into_owned();
        Self::with_os(label, TokioProcess::new(builder))
    }

    /// Create an unstarted bridge over a custom OS driver.
    #[must_use]
    pub fn with_os(label: impl Into<String>, os: impl OsProcess) -> Self {
        let (state_tx, _) = watch::channel(ProcessState::Unstarted);
        Self {
            inner: Arc::new(BridgeInner {
                label: label.into(),
                state: AtomicProcessState::new(ProcessState::Unstarted),
                state_tx,
                exit_code: OnceLock::new(),
                registry: SubscriberRegistry::new(),
                os: Box::new(os),
            }),
        }
    }

    /// Program name, for display.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.inner.label
    }

    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.inner.state.load()
    }

    /// OS process id, while running.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.inner.os.id()
    }

    /// Exit code once exited. `None` before exit or when killed by a signal.
    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.inner.exit_code.get().copied().flatten()
    }

    /// Spawn the process and start reading its output.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` unless the bridge is `Unstarted`, and `Spawn`
    /// if the OS refuses to create the process; the bridge then stays
    /// `Unstarted`.
    pub fn start(&self) -> Result<(), ProcessError> {
        self.inner
            .state
            .transition(ProcessState::Unstarted, ProcessState::Running)
            .map_err(|state| ProcessError::illegal("start", state))?;
        self.inner.publish();

        let events: Arc<dyn ProcessEvents> = Arc::new(BridgeEvents(Arc::downgrade(&self.inner)));
        if let Err(err) = self.inner.os.spawn(events) {
            tracing::warn!(program = %self.inner.label, error = %err, "Failed to spawn process");
            if self
                .inner
                .state
                .transition(ProcessState::Running, ProcessState::Unstarted)
                .is_ok()
            {
                self.inner.publish();
            }
            return Err(err.into());
        }

        tracing::info!(program = %self.inner.label, pid = ?self.id(), "Process started");
        Ok(())
    }

    /// Forcefully kill the process.
    ///
    /// Completion follows once the OS reports the exit. Killing an exited
    /// process does nothing.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if the bridge is `Unstarted` or `Disposed`.
    pub fn kill(&self) -> Result<(), ProcessError> {
        match self.state() {
            ProcessState::Running => {
                tracing::debug!(program = %self.inner.label, "Killing process");
                self.inner.os.kill();
                Ok(())
            }
            ProcessState::Exited => Ok(()),
            state => Err(ProcessError::illegal("kill", state)),
        }
    }

    /// Ask the process to stop, then kill it after `timeout`.
    ///
    /// On Unix, sends SIGTERM first, then SIGKILL after the timeout.
    /// On other platforms, falls back to immediate kill.
    ///
    /// # Errors
    ///
    /// Same state rules as [`kill`](Self::kill).
    pub async fn terminate(&self, timeout: Duration) -> Result<(), ProcessError> {
        match self.state() {
            ProcessState::Running => {
                tracing::debug!(program = %self.inner.label, ?timeout, "Terminating process");
                self.inner.os.terminate(timeout).await;
                Ok(())
            }
            ProcessState::Exited => Ok(()),
            state => Err(ProcessError::illegal("terminate", state)),
        }
    }

    /// Write `text` plus a newline to the process's stdin and flush.
    ///
    /// Sending to an exited process does nothing.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if the bridge is `Unstarted` or `Disposed`,
    /// and `Io` if the write fails while the process is still running.
    pub async fn send_line(&self, text: &str) -> Result<(), ProcessError> {
        match self.state() {
            ProcessState::Running => match self.inner.os.write_line(text).await {
                Ok(()) => Ok(()),
                Err(_) if self.state() == ProcessState::Exited => Ok(()),
                Err(e) => Err(e.into()),
            },
            ProcessState::Exited => Ok(()),
            state => Err(ProcessError::illegal("send a line to", state)),
        }
    }

    /// Attach a listener. Allowed in any state.
    ///
    /// Lines produced after this call are delivered. Subscribing to an
    /// exited process yields only the completion; nothing is replayed.
    ///
    /// Subscribing to a disposed bridge returns an inert handle.
    pub fn subscribe(&self, listener: impl Listener) -> Subscription {
        if self.state() == ProcessState::Disposed {
            return Subscription::inert();
        }
        let subscription = self.inner.registry.add(listener);
        match self.state() {
            ProcessState::Exited => subscription.deliver_completed(),
            ProcessState::Disposed => {
                subscription.dispose();
                return Subscription::inert();
            }
            _ => {}
        }
        subscription
    }

    /// Subscribe through an async stream of events.
    #[must_use]
    pub fn events(&self) -> EventStream {
        EventStream::attach(|listener| self.subscribe(listener))
    }

    /// Number of active subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.registry.len()
    }

    /// Wait until the process exits and return its exit code.
    ///
    /// # Errors
    ///
    /// Returns `IllegalState` if the bridge is not started, or is disposed
    /// before the process exits.
    pub async fn wait_for_exit(&self) -> Result<Option<i32>, ProcessError> {
        let mut rx = self.inner.state_tx.subscribe();
        if self.state() == ProcessState::Running {
            // Exited is published only after every completion was delivered.
            let _ = rx
                .wait_for(|s| {
                    matches!(s, ProcessState::Exited | ProcessState::Disposed)
                        || self.state() == ProcessState::Unstarted
                })
                .await;
        }
        if let Some(code) = self.inner.exit_code.get() {
            return Ok(*code);
        }
        Err(ProcessError::illegal("wait for", self.state()))
    }

    /// Detach from the OS process and drop all subscribers.
    ///
    /// No completion is delivered: disposing a running bridge is an abrupt
    /// detach. After an exit the completions already belong to the exit
    /// path, so only resources are released. Disposing twice does nothing.
    pub fn dispose(&self) {
        let previous = self.inner.state.dispose();
        if previous == ProcessState::Disposed {
            return;
        }
        self.inner.publish();
        self.inner.os.detach();
        if previous != ProcessState::Exited {
            self.inner.registry.clear();
        }
        tracing::debug!(program = %self.inner.label, from = ?previous, "Process disposed");
    }
}

impl std::fmt::Debug for ProcessBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessBridge")
            .field("label", &self.inner.label)
            .field("state", &self.state())
            .field("subscribers", &self.inner.registry.len())
            .finish_non_exhaustive()
    }
}
