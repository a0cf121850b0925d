//! OS process driver.
//!
//! The bridge talks to the operating system only through [`OsProcess`]:
//! start the child, write to its stdin, kill it, and receive line and exit
//! callbacks through [`ProcessEvents`]. [`TokioProcess`] is the real
//! implementation on top of `tokio::process`.

use std::io;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWriteExt, BufReader};
use tokio::process::ChildStdin;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{ProcessBuilder, SpawnError};
use crate::stream::{OutputLine, StreamKind};

/// Callbacks from a running OS process.
///
/// Called from driver-owned tasks, concurrently with each other and with
/// the caller's threads.
pub trait ProcessEvents: Send + Sync {
    /// A complete line arrived on stdout or stderr.
    fn on_line(&self, line: OutputLine);

    /// The process exited. `code` is `None` when it was killed by a signal.
    fn on_exit(&self, code: Option<i32>);
}

/// A single OS child process, as seen by the bridge.
#[async_trait]
pub trait OsProcess: Send + Sync + 'static {
    /// Create the process and begin delivering callbacks to `events`.
    ///
    /// # Errors
    ///
    /// Returns `SpawnError` if the process cannot be created.
    fn spawn(&self, events: Arc<dyn ProcessEvents>) -> Result<(), SpawnError>;

    /// Forcefully kill the process.
    fn kill(&self);

    /// Ask the process to stop, killing it if it is still alive after `timeout`.
    async fn terminate(&self, timeout: Duration);

    /// Write `text` and a newline to stdin and flush.
    ///
    /// # Errors
    ///
    /// Returns an error if stdin is closed or the write fails.
    async fn write_line(&self, text: &str) -> io::Result<()>;

    /// OS process id, while running.
    fn id(&self) -> Option<u32>;

    /// Stop delivering callbacks and release stdin. Idempotent.
    fn detach(&self);
}

/// Slot holding the current callback target; emptied on detach.
#[derive(Default)]
struct EventSlot(Mutex<Option<Arc<dyn ProcessEvents>>>);

impl EventSlot {
    fn guard(&self) -> MutexGuard<'_, Option<Arc<dyn ProcessEvents>>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&self) -> Option<Arc<dyn ProcessEvents>> {
        self.guard().clone()
    }

    fn set(&self, events: Arc<dyn ProcessEvents>) {
        *self.guard() = Some(events);
    }

    fn clear(&self) {
        self.guard().take();
    }
}

type SharedStdin = Arc<tokio::sync::Mutex<ChildStdin>>;

/// [`OsProcess`] backed by `tokio::process`.
///
/// Spawning needs a tokio runtime; three tasks are started per child: one
/// reader per output stream and a waiter that reports the exit once both
/// streams have reached end of file.
pub struct TokioProcess {
    builder: ProcessBuilder,
    events: Arc<EventSlot>,
    stdin: Mutex<Option<SharedStdin>>,
    pid: Arc<AtomicU32>,
    kill: Mutex<CancellationToken>,
    exited: CancellationToken,
}

impl TokioProcess {
    #[must_use]
    pub fn new(builder: ProcessBuilder) -> Self {
        Self {
            builder,
            events: Arc::new(EventSlot::default()),
            stdin: Mutex::new(None),
            pid: Arc::new(AtomicU32::new(0)),
            kill: Mutex::new(CancellationToken::new()),
            exited: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn builder(&self) -> &ProcessBuilder {
        &self.builder
    }

    fn stdin(&self) -> MutexGuard<'_, Option<SharedStdin>> {
        self.stdin.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn kill_token(&self) -> MutexGuard<'_, CancellationToken> {
        self.kill.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget a kill requested while a failed spawn was in flight, so a
    /// retried start does not kill the new child.
    fn spawn_failed(&self, error: SpawnError) -> SpawnError {
        *self.kill_token() = CancellationToken::new();
        error
    }

    #[cfg(unix)]
    fn signal_terminate(&self) -> bool {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let Some(pid) = self.id() else { return false };
        let nix_pid = Pid::from_raw(i32::try_from(pid).unwrap_or(i32::MAX));
        kill(nix_pid, Signal::SIGTERM).is_ok()
    }

    #[cfg(not(unix))]
    fn signal_terminate(&self) -> bool {
        false
    }
}

impl std::fmt::Debug for TokioProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokioProcess")
            .field("builder", &self.builder)
            .field("pid", &self.id())
            .finish_non_exhaustive()
    }
}

/// Read `reader` line by line until end of file, forwarding each line.
fn read_lines<R>(reader: R, kind: StreamKind, events: Arc<EventSlot>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                        if buf.last() == Some(&b'\r') {
                            buf.pop();
                        }
                    }
                    let text = String::from_utf8_lossy(&buf).into_owned();
                    if let Some(events) = events.get() {
                        events.on_line(OutputLine::new(text, kind));
                    }
                }
                Err(e) => {
                    tracing::debug!(stream = %kind, error = %e, "Stopped reading child output");
                    break;
                }
            }
        }
    })
}

#[async_trait]
impl OsProcess for TokioProcess {
    fn spawn(&self, events: Arc<dyn ProcessEvents>) -> Result<(), SpawnError> {
        if tokio::runtime::Handle::try_current().is_err() {
            return Err(self.spawn_failed(SpawnError::NoRuntime));
        }

        let mut child = self
            .builder
            .build_command()
            .spawn()
            .map_err(|e| self.spawn_failed(SpawnError::from_io(e)))?;

        self.events.set(events);
        self.pid.store(child.id().unwrap_or(0), Ordering::SeqCst);
        if let Some(stdin) = child.stdin.take() {
            *self.stdin() = Some(Arc::new(tokio::sync::Mutex::new(stdin)));
        }

        let stdout = child
            .stdout
            .take()
            .map(|out| read_lines(out, StreamKind::Out, Arc::clone(&self.events)));
        let stderr = child
            .stderr
            .take()
            .map(|err| read_lines(err, StreamKind::Err, Arc::clone(&self.events)));

        let events = Arc::clone(&self.events);
        let pid = Arc::clone(&self.pid);
        let kill = self.kill_token().clone();
        let exited = self.exited.clone();
        tokio::spawn(async move {
            let natural = tokio::select! {
                status = child.wait() => Some(status),
                () = kill.cancelled() => None,
            };
            let status = match natural {
                Some(status) => status,
                None => {
                    if let Err(e) = child.start_kill() {
                        tracing::debug!(error = %e, "Kill signal not delivered");
                    }
                    child.wait().await
                }
            };

            for reader in [stdout, stderr].into_iter().flatten() {
                let _ = reader.await;
            }

            let code = match status {
                Ok(status) => status.code(),
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to wait for child process");
                    None
                }
            };
            pid.store(0, Ordering::SeqCst);
            exited.cancel();

            if let Some(events) = events.get() {
                events.on_exit(code);
            }
        });

        Ok(())
    }

    fn kill(&self) {
        self.kill_token().cancel();
    }

    async fn terminate(&self, timeout: Duration) {
        if !self.signal_terminate() {
            self.kill();
            return;
        }
        if tokio::time::timeout(timeout, self.exited.cancelled())
            .await
            .is_err()
        {
            tracing::debug!(?timeout, "Child ignored SIGTERM, killing");
            self.kill();
        }
    }

    async fn write_line(&self, text: &str) -> io::Result<()> {
        let stdin = self
            .stdin()
            .clone()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotConnected, "stdin is closed"))?;

        let mut stdin = stdin.lock().await;
        stdin.write_all(text.as_bytes()).await?;
        stdin.write_all(b"\n").await?;
        stdin.flush().await
    }

    fn id(&self) -> Option<u32> {
        match self.pid.load(Ordering::SeqCst) {
            0 => None,
            pid => Some(pid),
        }
    }

    fn detach(&self) {
        self.events.clear();
        self.stdin().take();
        if self.builder.kills_on_dispose() {
            self.kill_token().cancel();
        }
    }
}

impl Drop for TokioProcess {
    fn drop(&mut self) {
        self.detach();
    }
}
