//! Process error types.

use super::ProcessState;

/// Error type for process spawning operations.
#[derive(thiserror::Error, Debug)]
pub enum SpawnError {
    /// The program was not found.
    #[error("Program not found")]
    NotFound,
    /// Permission denied when spawning.
    #[error("Permission denied")]
    PermissionDenied,
    /// Spawning requires a running tokio runtime.
    #[error("No tokio runtime available to drive the process")]
    NoRuntime,
    /// Other I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SpawnError {
    /// Create a `SpawnError` from an I/O error, classifying common cases.
    #[must_use]
    pub fn from_io(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound,
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            _ => Self::Io(err),
        }
    }
}

/// Error type for process lifecycle operations.
#[derive(thiserror::Error, Debug)]
pub enum ProcessError {
    /// The operation is not allowed in the current state.
    #[error("Cannot {operation} a process in state {state}")]
    IllegalState {
        operation: &'static str,
        state: ProcessState,
    },
    /// The OS process could not be created.
    #[error("Failed to spawn process: {0}")]
    Spawn(#[from] SpawnError),
    /// Writing to or signalling the process failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProcessError {
    pub(crate) fn illegal(operation: &'static str, state: ProcessState) -> Self {
        Self::IllegalState { operation, state }
    }

    /// The offending state, for `IllegalState` errors.
    #[must_use]
    pub fn illegal_state(&self) -> Option<ProcessState> {
        match self {
            Self::IllegalState { state, .. } => Some(*state),
            _ => None,
        }
    }
}
