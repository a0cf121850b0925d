//! Process lifecycle state machine.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

/// Lifecycle state of a process bridge.
///
/// `Unstarted -> Running -> Exited`, with `Disposed` reachable from any
/// state and absorbing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ProcessState {
    #[default]
    Unstarted = 0,
    Running = 1,
    Exited = 2,
    Disposed = 3,
}

impl ProcessState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Unstarted,
            1 => Self::Running,
            2 => Self::Exited,
            _ => Self::Disposed,
        }
    }

    /// Whether `self -> to` is an allowed transition.
    #[must_use]
    pub fn can_transition(self, to: Self) -> bool {
        matches!(
            (self, to),
            (Self::Unstarted, Self::Running)
                | (Self::Running, Self::Exited)
                // A failed spawn leaves the bridge where it was.
                | (Self::Running, Self::Unstarted)
                | (Self::Unstarted | Self::Running | Self::Exited, Self::Disposed)
        )
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Atomic cell holding a [`ProcessState`].
///
/// Every change goes through compare-and-set or swap so that racing
/// callers get a single well-defined winner.
#[derive(Debug, Default)]
pub struct AtomicProcessState(AtomicU8);

impl AtomicProcessState {
    #[must_use]
    pub fn new(state: ProcessState) -> Self {
        Self(AtomicU8::new(state as u8))
    }

    #[must_use]
    pub fn load(&self) -> ProcessState {
        ProcessState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move from `from` to `to`.
    ///
    /// # Errors
    ///
    /// Returns the actual state if it was not `from`, or if the transition
    /// is not in the table.
    pub fn transition(&self, from: ProcessState, to: ProcessState) -> Result<(), ProcessState> {
        if !from.can_transition(to) {
            return Err(self.load());
        }
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| tracing::debug!(from = ?from, to = ?to, "State transition"))
            .map_err(ProcessState::from_u8)
    }

    /// Move to `Disposed` from any state, returning the previous one.
    pub fn dispose(&self) -> ProcessState {
        let previous = ProcessState::from_u8(self.0.swap(ProcessState::Disposed as u8, Ordering::SeqCst));
        if previous != ProcessState::Disposed {
            tracing::debug!(from = ?previous, to = ?ProcessState::Disposed, "State transition");
        }
        previous
    }
}
