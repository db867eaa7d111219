//! Lifecycle of one resolver daemon instance.
//!
//! Liveness comes from the pid file plus a signal-0 probe. The answer is
//! only good for the next call; every operation here stays correct if the
//! process exits in between.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use crate::error::{DnsnameError, Result};
use crate::util::{SIG_PROBE, SIG_RELOAD, SIG_TERMINATE, is_process_alive, send_signal};

/// Upper bound on waiting for a killed daemon to exit before restarting.
const EXIT_WAIT: Duration = Duration::from_secs(2);
const EXIT_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Observed daemon state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    /// No pid file, unreadable pid, or the probe failed.
    NotRunning,
    /// The pid file names a process that accepted the probe.
    Running {
        /// Pid read from the pid file.
        pid: i32,
    },
}

impl ProcessState {
    /// Returns `true` for [`ProcessState::Running`].
    #[must_use]
    pub const fn is_running(self) -> bool {
        matches!(self, Self::Running { .. })
    }
}

/// Starts, stops and reloads the daemon for one instance.
#[derive(Debug, Clone)]
pub struct Supervisor {
    binary: PathBuf,
    config_file: PathBuf,
    pid_file: PathBuf,
    user: String,
}

impl Supervisor {
    /// Creates a supervisor for the daemon described by `config_file`.
    #[must_use]
    pub fn new(
        binary: impl Into<PathBuf>,
        config_file: impl Into<PathBuf>,
        pid_file: impl Into<PathBuf>,
        user: impl Into<String>,
    ) -> Self {
        Self {
            binary: binary.into(),
            config_file: config_file.into(),
            pid_file: pid_file.into(),
            user: user.into(),
        }
    }

    /// Returns the pid file path.
    #[must_use]
    pub fn pid_file(&self) -> &Path {
        &self.pid_file
    }

    /// Probes the daemon.
    ///
    /// Missing or corrupt pid files and dead processes all read as
    /// [`ProcessState::NotRunning`].
    #[must_use]
    pub fn state(&self) -> ProcessState {
        match read_pid(&self.pid_file) {
            Ok(Some(pid)) if send_signal(pid, SIG_PROBE).is_ok() => ProcessState::Running { pid },
            _ => ProcessState::NotRunning,
        }
    }

    /// Shorthand for `self.state().is_running()`.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().is_running()
    }

    /// Runs the daemon binary and waits for it to daemonize.
    ///
    /// # Errors
    ///
    /// Returns [`DnsnameError::StartFailure`] with the combined output if the
    /// binary exits non-zero, or [`DnsnameError::Io`] if it cannot be spawned.
    pub fn start(&self) -> Result<()> {
        let output = Command::new(&self.binary)
            .arg("-u")
            .arg(&self.user)
            .arg(format!("--conf-file={}", self.config_file.display()))
            .output()?;

        if !output.status.success() {
            let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
            combined.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(DnsnameError::StartFailure { output: combined });
        }

        tracing::info!(
            config = %self.config_file.display(),
            "Started resolver daemon"
        );
        Ok(())
    }

    /// Kills the daemon named by the pid file.
    ///
    /// A missing pid file, an unparseable pid and an already-exited process
    /// all count as stopped.
    ///
    /// # Errors
    ///
    /// Returns [`DnsnameError::Io`] if the pid file cannot be read, or
    /// [`DnsnameError::Signal`] if the signal is refused.
    pub fn stop(&self) -> Result<()> {
        let pid = match read_pid(&self.pid_file) {
            Ok(Some(pid)) => pid,
            Ok(None) => {
                tracing::debug!(pid_file = %self.pid_file.display(), "No pid file, nothing to stop");
                return Ok(());
            }
            Err(PidError::Io(e)) => return Err(e.into()),
            Err(PidError::Corrupt(content)) => {
                tracing::warn!(
                    pid_file = %self.pid_file.display(),
                    content = %content,
                    "Ignoring corrupt pid file"
                );
                return Ok(());
            }
        };

        match send_signal(pid, SIG_TERMINATE) {
            Ok(()) => {
                tracing::info!(pid, "Stopped resolver daemon");
                Ok(())
            }
            Err(e) if e.is_process_already_gone() => {
                tracing::debug!(pid, "Resolver daemon already gone");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Reloads a running daemon with SIGHUP, or starts it if it is down.
    ///
    /// # Errors
    ///
    /// Propagates [`start`](Self::start) and signal errors.
    pub fn hup(&self) -> Result<()> {
        let ProcessState::Running { pid } = self.state() else {
            return self.start();
        };
        match send_signal(pid, SIG_RELOAD) {
            Err(e) if e.is_process_already_gone() => self.start(),
            other => other,
        }
    }

    /// Stops and restarts the daemon, but only if it is running.
    ///
    /// Forwarder-set changes go through here rather than [`hup`](Self::hup).
    /// The old process gets a bounded grace period to exit and release its
    /// sockets before the new one starts.
    ///
    /// # Errors
    ///
    /// Propagates [`stop`](Self::stop) and [`start`](Self::start) errors.
    pub fn restart_if_running(&self) -> Result<()> {
        let ProcessState::Running { pid } = self.state() else {
            return Ok(());
        };
        self.stop()?;
        if !wait_for_exit(pid, EXIT_WAIT) {
            tracing::warn!(pid, "Resolver daemon still alive after kill, starting anyway");
        }
        self.start()
    }
}

/// Polls until `pid` is gone. Returns `false` if it outlived `timeout`.
fn wait_for_exit(pid: i32, timeout: Duration) -> bool {
    let started = Instant::now();
    while is_process_alive(pid) {
        if started.elapsed() >= timeout {
            return false;
        }
        std::thread::sleep(EXIT_POLL_INTERVAL);
    }
    true
}

#[derive(Debug)]
enum PidError {
    Io(std::io::Error),
    Corrupt(String),
}

/// Reads a trimmed decimal pid. `Ok(None)` means no pid file.
fn read_pid(path: &Path) -> std::result::Result<Option<i32>, PidError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(PidError::Io(e)),
    };
    match content.trim().parse::<i32>() {
        Ok(pid) if pid > 0 => Ok(Some(pid)),
        _ => Err(PidError::Corrupt(content.trim().to_string())),
    }
}
