//! Channel-backed event streams over a process's lines.

use std::pin::Pin;
use std::sync::{Mutex, PoisonError};
use std::task::{Context, Poll};

use futures_core::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;

use super::{Listener, OutputLine, Subscription};

/// One event of a process line stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProcessEvent {
    /// A line from stdout or stderr.
    Line(OutputLine),
    /// The process exited. Always the last event.
    Completed,
}

impl ProcessEvent {
    /// The line carried by this event, if any.
    #[must_use]
    pub fn line(&self) -> Option<&OutputLine> {
        match self {
            Self::Line(line) => Some(line),
            Self::Completed => None,
        }
    }
}

/// Listener that queues events on an unbounded channel.
///
/// The sender is dropped on completion so the receiving stream ends.
#[derive(Debug)]
pub struct ChannelListener {
    tx: Mutex<Option<mpsc::UnboundedSender<ProcessEvent>>>,
}

impl ChannelListener {
    #[must_use]
    pub fn new(tx: mpsc::UnboundedSender<ProcessEvent>) -> Self {
        Self {
            tx: Mutex::new(Some(tx)),
        }
    }
}

impl Listener for ChannelListener {
    fn on_next(&self, line: &OutputLine) {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(tx) = guard.as_ref() {
            let _ = tx.send(ProcessEvent::Line(line.clone()));
        }
    }

    fn on_completed(&self) {
        let tx = self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(tx) = tx {
            let _ = tx.send(ProcessEvent::Completed);
        }
    }
}

/// Async stream of [`ProcessEvent`]s for one subscription.
///
/// Ends after [`ProcessEvent::Completed`]. Dropping the stream disposes
/// its subscription.
#[derive(Debug)]
pub struct EventStream {
    rx: UnboundedReceiverStream<ProcessEvent>,
    subscription: Subscription,
}

impl EventStream {
    /// Create the channel, hand its listener to `subscribe`, and wrap the receiver.
    pub(crate) fn attach(subscribe: impl FnOnce(ChannelListener) -> Subscription) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let subscription = subscribe(ChannelListener::new(tx));
        Self {
            rx: UnboundedReceiverStream::new(rx),
            subscription,
        }
    }

    /// A stream that has already ended.
    #[must_use]
    pub fn empty() -> Self {
        let (_, rx) = mpsc::unbounded_channel();
        Self {
            rx: UnboundedReceiverStream::new(rx),
            subscription: Subscription::inert(),
        }
    }

    /// The subscription feeding this stream.
    #[must_use]
    pub fn subscription(&self) -> &Subscription {
        &self.subscription
    }
}

impl Stream for EventStream {
    type Item = ProcessEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.rx).poll_next(cx)
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.subscription.dispose();
    }
}
