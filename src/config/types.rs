//! Configuration types.

use std::ffi::OsStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default command-line flag marking a forked process.
pub const DEFAULT_FORK_FLAG: &str = "--forked";

/// Default environment variable marking a forked process.
pub const DEFAULT_FORK_ENV_VAR: &str = "FORKLINE_FORKED";

/// How a forked child is told that it is a fork.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerMode {
    /// Append the fork flag to the child's arguments.
    #[default]
    Arg,
    /// Set the fork environment variable in the child.
    Env,
    /// Both.
    Both,
}

impl MarkerMode {
    #[must_use]
    pub fn uses_arg(self) -> bool {
        matches!(self, Self::Arg | Self::Both)
    }

    #[must_use]
    pub fn uses_env(self) -> bool {
        matches!(self, Self::Env | Self::Both)
    }
}

/// Fork role marker configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForkConfig {
    /// Command-line flag marking a fork. Matched case-insensitively.
    pub flag: String,
    /// Environment variable marking a fork when set to a non-empty value.
    pub env_var: String,
    /// How children are marked.
    pub marker: MarkerMode,
}

impl ForkConfig {
    /// True if `arg` is the fork flag.
    #[must_use]
    pub fn is_flag(&self, arg: &OsStr) -> bool {
        arg.to_str()
            .is_some_and(|a| a.eq_ignore_ascii_case(&self.flag))
    }
}

impl Default for ForkConfig {
    fn default() -> Self {
        Self {
            flag: DEFAULT_FORK_FLAG.to_string(),
            env_var: DEFAULT_FORK_ENV_VAR.to_string(),
            marker: MarkerMode::default(),
        }
    }
}

/// Child process configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Kill children when their bridge is disposed.
    pub kill_on_dispose: bool,
    /// Grace period between SIGTERM and SIGKILL.
    pub terminate_timeout_ms: u64,
}

impl ProcessConfig {
    #[must_use]
    pub fn terminate_timeout(&self) -> Duration {
        Duration::from_millis(self.terminate_timeout_ms)
    }
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            kill_on_dispose: false,
            terminate_timeout_ms: 5000,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub fork: ForkConfig,
    pub process: ProcessConfig,
}
