//! Master/fork role detection.

use std::ffi::OsString;
use std::sync::OnceLock;

use crate::config::ForkConfig;

/// The role the current process plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Started directly; may create forks.
    Master,
    /// Started by a master through `fork()`.
    Fork,
}

impl Role {
    /// Decide the role from arguments and the marker variable's value.
    ///
    /// The process is a fork if any argument is the fork flag, or if the
    /// marker variable is set to a non-empty value.
    #[must_use]
    pub fn from_parts<I, S>(args: I, env_value: Option<OsString>, config: &ForkConfig) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        let flagged = args
            .into_iter()
            .map(Into::into)
            .any(|arg| config.is_flag(&arg));
        let marked = env_value.is_some_and(|v| !v.is_empty());

        if flagged || marked {
            Self::Fork
        } else {
            Self::Master
        }
    }

    /// Read the role from this process's arguments and environment.
    ///
    /// This re-reads every time; read it once at startup and pass it down,
    /// or use [`Role::current`].
    #[must_use]
    pub fn detect(config: &ForkConfig) -> Self {
        Self::from_parts(
            std::env::args_os().skip(1),
            std::env::var_os(&config.env_var),
            config,
        )
    }

    /// The role under the default marker, read on first use and fixed for
    /// the rest of the process's life.
    #[must_use]
    pub fn current() -> Self {
        static CURRENT: OnceLock<Role> = OnceLock::new();
        *CURRENT.get_or_init(|| Self::detect(&ForkConfig::default()))
    }

    #[must_use]
    pub fn is_fork(self) -> bool {
        self == Self::Fork
    }

    #[must_use]
    pub fn is_master(self) -> bool {
        self == Self::Master
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Master => f.write_str("master"),
            Self::Fork => f.write_str("fork"),
        }
    }
}
