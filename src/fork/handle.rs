//! Fork handles.

use std::future::Future;
use std::time::Duration;

use crate::process::{ProcessBridge, ProcessError};
use crate::stream::{EventStream, Listener, Subscription};

/// A fork of the current process.
///
/// `Live` exists only in the master and forwards to its bridge. `Inert` is
/// what a fork gets when it tries to fork again: every operation succeeds
/// and does nothing.
#[derive(Debug, Clone, Default)]
pub enum ForkHandle {
    Live(ProcessBridge),
    #[default]
    Inert,
}

impl ForkHandle {
    #[must_use]
    pub fn is_live(&self) -> bool {
        matches!(self, Self::Live(_))
    }

    #[must_use]
    pub fn is_inert(&self) -> bool {
        matches!(self, Self::Inert)
    }

    /// The underlying bridge, in the master.
    #[must_use]
    pub fn bridge(&self) -> Option<&ProcessBridge> {
        match self {
            Self::Live(bridge) => Some(bridge),
            Self::Inert => None,
        }
    }

    /// Start the forked process.
    ///
    /// # Errors
    ///
    /// See [`ProcessBridge::start`].
    pub fn start(&self) -> Result<(), ProcessError> {
        match self {
            Self::Live(bridge) => bridge.start(),
            Self::Inert => Ok(()),
        }
    }

    /// Kill the forked process.
    ///
    /// # Errors
    ///
    /// See [`ProcessBridge::kill`].
    pub fn kill(&self) -> Result<(), ProcessError> {
        match self {
            Self::Live(bridge) => bridge.kill(),
            Self::Inert => Ok(()),
        }
    }

    /// Gracefully stop the forked process.
    ///
    /// # Errors
    ///
    /// See [`ProcessBridge::terminate`].
    pub async fn terminate(&self, timeout: Duration) -> Result<(), ProcessError> {
        match self {
            Self::Live(bridge) => bridge.terminate(timeout).await,
            Self::Inert => Ok(()),
        }
    }

    /// Send a line to the fork's stdin.
    ///
    /// # Errors
    ///
    /// See [`ProcessBridge::send_line`].
    pub async fn send_line(&self, text: &str) -> Result<(), ProcessError> {
        match self {
            Self::Live(bridge) => bridge.send_line(text).await,
            Self::Inert => Ok(()),
        }
    }

    /// Attach a listener to the fork's output.
    pub fn subscribe(&self, listener: impl Listener) -> Subscription {
        match self {
            Self::Live(bridge) => bridge.subscribe(listener),
            Self::Inert => Subscription::inert(),
        }
    }

    /// Stream the fork's output. Inert forks yield a finished stream.
    #[must_use]
    pub fn events(&self) -> EventStream {
        match self {
            Self::Live(bridge) => bridge.events(),
            Self::Inert => EventStream::empty(),
        }
    }

    /// Run `action` with the bridge, in the master only.
    pub fn run_as_master<T>(&self, action: impl FnOnce(&ProcessBridge) -> T) -> Option<T> {
        self.bridge().map(action)
    }

    /// Run and await `action` with the bridge, in the master only.
    pub async fn run_as_master_async<F, Fut>(&self, action: F) -> Option<Fut::Output>
    where
        F: FnOnce(ProcessBridge) -> Fut,
        Fut: Future,
    {
        match self {
            Self::Live(bridge) => Some(action(bridge.clone()).await),
            Self::Inert => None,
        }
    }

    /// Dispose the underlying bridge.
    pub fn dispose(&self) {
        if let Self::Live(bridge) = self {
            bridge.dispose();
        }
    }
}
