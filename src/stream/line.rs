//! Output line values produced by a child process.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Standard stream a line was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    /// Standard output.
    Out,
    /// Standard error.
    Err,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Out => f.write_str("stdout"),
            Self::Err => f.write_str("stderr"),
        }
    }
}

/// A single line of text written by a child process.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutputLine {
    text: String,
    kind: StreamKind,
}

impl OutputLine {
    /// Create a line tagged with the given stream.
    #[must_use]
    pub fn new(text: impl Into<String>, kind: StreamKind) -> Self {
        Self {
            text: text.into(),
            kind,
        }
    }

    /// A line read from standard output.
    #[must_use]
    pub fn out(text: impl Into<String>) -> Self {
        Self::new(text, StreamKind::Out)
    }

    /// A line read from standard error.
    #[must_use]
    pub fn err(text: impl Into<String>) -> Self {
        Self::new(text, StreamKind::Err)
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn kind(&self) -> StreamKind {
        self.kind
    }

    /// True if the line came from standard output.
    #[must_use]
    pub fn is_out(&self) -> bool {
        self.kind == StreamKind::Out
    }

    /// True if the line came from standard error.
    #[must_use]
    pub fn is_err(&self) -> bool {
        self.kind == StreamKind::Err
    }

    /// Consume the line, returning its text.
    #[must_use]
    pub fn into_text(self) -> String {
        self.text
    }
}

impl fmt::Display for OutputLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
