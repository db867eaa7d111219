//! Error types.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result alias for plugin operations.
pub type Result<T> = std::result::Result<T, DnsnameError>;

/// Errors returned by plugin operations.
#[derive(Debug, Error)]
pub enum DnsnameError {
    /// Filesystem or process-spawn I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The resolver daemon could not be located on `PATH`.
    #[error("the dnsname plugin requires the {binary} binary to be in PATH")]
    BinaryNotFound {
        /// Name or path that was searched for.
        binary: String,
    },

    /// Another invocation held the shared root lock for too long.
    #[error("timed out after {waited:?} waiting for lock on {}", .path.display())]
    LockTimeout {
        /// The locked directory.
        path: PathBuf,
        /// How long acquisition was attempted.
        waited: Duration,
    },

    /// A sibling instance already publishes servers for this domain.
    #[error("domain {domain} already exists (claimed by network {network})")]
    DomainCollision {
        /// The contested domain.
        domain: String,
        /// The sibling network that owns it.
        network: String,
    },

    /// The daemon exited non-zero on startup.
    #[error("failed to start resolver daemon: {output}")]
    StartFailure {
        /// Combined stdout and stderr of the failed invocation.
        output: String,
    },

    /// The signalled process no longer exists (`ESRCH`).
    #[error("process {pid} already finished")]
    ProcessAlreadyGone {
        /// Target pid.
        pid: i32,
    },

    /// Signal delivery failed for a reason other than a vanished process.
    #[error("failed to signal process {pid}: {source}")]
    Signal {
        /// Target pid.
        pid: i32,
        /// Underlying OS error.
        source: std::io::Error,
    },

    /// The daemon for a network is expected to be running but is not.
    #[error("dnsmasq instance for network {network} not running")]
    NotRunning {
        /// The network whose daemon is down.
        network: String,
    },

    /// A file required by a running instance is missing.
    #[error("{} file missing from configuration", .path.display())]
    MissingFile {
        /// The missing path.
        path: PathBuf,
    },

    /// Invalid configuration values.
    #[error("invalid config: {0}")]
    InvalidConfig(String),
}

impl DnsnameError {
    /// Returns `true` if a signal target had already exited.
    #[must_use]
    pub const fn is_process_already_gone(&self) -> bool {
        matches!(self, Self::ProcessAlreadyGone { .. })
    }

    /// Returns `true` if propagation was rejected over a duplicate domain.
    #[must_use]
    pub const fn is_domain_collision(&self) -> bool {
        matches!(self, Self::DomainCollision { .. })
    }
}
