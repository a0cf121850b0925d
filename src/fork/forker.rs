//! Fork coordinator.

use std::ffi::OsString;
use std::future::Future;
use std::path::PathBuf;

use super::{ForkHandle, Role};
use crate::config::Config;
use crate::process::{ProcessBridge, ProcessBuilder};

/// Error type for fork creation.
#[derive(thiserror::Error, Debug)]
pub enum ForkError {
    /// The path of the running executable could not be resolved.
    #[error("Cannot resolve current executable: {0}")]
    CurrentExe(#[source] std::io::Error),
}

/// Creates forks of the current executable and gates code by role.
///
/// The role is fixed at construction. Build one at startup and pass it
/// down; a fork never creates further forks.
#[derive(Debug, Clone)]
pub struct Forker {
    role: Role,
    config: Config,
}

impl Forker {
    #[must_use]
    pub fn new(role: Role, config: Config) -> Self {
        Self { role, config }
    }

    /// Detect the role from this process's arguments and environment.
    #[must_use]
    pub fn from_env(config: Config) -> Self {
        let role = Role::detect(&config.fork);
        Self::new(role, config)
    }

    #[must_use]
    pub fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn is_fork(&self) -> bool {
        self.role.is_fork()
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create an unstarted fork of the current executable.
    ///
    /// The child gets this process's arguments plus the fork marker. In a
    /// fork, returns [`ForkHandle::Inert`] and spawns nothing.
    ///
    /// # Errors
    ///
    /// Returns `ForkError::CurrentExe` if the executable path is unavailable.
    pub fn fork(&self) -> Result<ForkHandle, ForkError> {
        if self.is_fork() {
            tracing::debug!("Already running as a fork, not forking again");
            return Ok(ForkHandle::Inert);
        }

        let exe = std::env::current_exe().map_err(ForkError::CurrentExe)?;
        let builder = self.fork_builder(exe, std::env::args_os().skip(1));
        tracing::debug!(program = ?builder.program(), args = ?builder.get_args(), "Fork created");
        Ok(ForkHandle::Live(ProcessBridge::create(builder)))
    }

    /// The command a fork of `exe` runs, given the arguments to forward.
    #[must_use]
    pub fn fork_builder<I>(&self, exe: PathBuf, args: I) -> ProcessBuilder
    where
        I: IntoIterator<Item = OsString>,
    {
        let fork = &self.config.fork;
        let mut builder = ProcessBuilder::new(exe)
            .args(args)
            .kill_on_dispose(self.config.process.kill_on_dispose);

        if fork.marker.uses_arg() {
            builder = builder.arg(&fork.flag);
        }
        if fork.marker.uses_env() {
            builder = builder.env(&fork.env_var, "1");
        }
        builder
    }

    /// Run `action` only in the master.
    pub fn run_as_master<T>(&self, action: impl FnOnce() -> T) -> Option<T> {
        self.role.is_master().then(action)
    }

    /// Run `action` only in a fork.
    pub fn run_as_fork<T>(&self, action: impl FnOnce() -> T) -> Option<T> {
        self.role.is_fork().then(action)
    }

    /// Run and await `action` only in the master. In a fork, returns
    /// `None` without calling or awaiting anything.
    pub async fn run_as_master_async<F, Fut>(&self, action: F) -> Option<Fut::Output>
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        if self.role.is_master() {
            Some(action().await)
        } else {
            None
        }
    }

    /// Run and await `action` only in a fork. In the master, returns
    /// `None` without calling or awaiting anything.
    pub async fn run_as_fork_async<F, Fut>(&self, action: F) -> Option<Fut::Output>
    where
        F: FnOnce() -> Fut,
        Fut: Future,
    {
        if self.role.is_fork() {
            Some(action().await)
        } else {
            None
        }
    }
}

impl Default for Forker {
    /// Uses the process-wide [`Role::current`] and default configuration.
    fn default() -> Self {
        Self::new(Role::current(), Config::default())
    }
}
