//! Internal process-signalling utilities.

use crate::error::{DnsnameError, Result};

/// Liveness probe.
pub const SIG_PROBE: libc::c_int = 0;
/// Asks dnsmasq to re-read its hosts files.
pub const SIG_RELOAD: libc::c_int = libc::SIGHUP;
/// Terminates a daemon instance.
pub const SIG_TERMINATE: libc::c_int = libc::SIGKILL;

/// Sends `signal` to `pid`.
///
/// `ESRCH` is reported as [`DnsnameError::ProcessAlreadyGone`] so callers
/// can treat a vanished process as a distinct outcome. Non-positive pids
/// are rejected: `kill` would address a whole process group.
///
/// # Errors
///
/// Returns [`DnsnameError::ProcessAlreadyGone`] or [`DnsnameError::Signal`].
pub fn send_signal(pid: i32, signal: libc::c_int) -> Result<()> {
    if pid <= 0 {
        return Err(DnsnameError::Signal {
            pid,
            source: std::io::Error::from(std::io::ErrorKind::InvalidInput),
        });
    }

    // SAFETY: `kill` has no memory-safety preconditions; the pid is
    // strictly positive so only a single process is addressed.
    let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if rc == 0 {
        return Ok(());
    }

    let source = std::io::Error::last_os_error();
    if source.raw_os_error() == Some(libc::ESRCH) {
        Err(DnsnameError::ProcessAlreadyGone { pid })
    } else {
        Err(DnsnameError::Signal { pid, source })
    }
}

/// Checks whether the process with the given PID is still alive.
///
/// Uses `kill(pid, 0)`: signal 0 checks existence without delivering a signal.
#[must_use]
pub fn is_process_alive(pid: i32) -> bool {
    send_signal(pid, SIG_PROBE).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::cast_possible_wrap)]
    fn own_pid() -> i32 {
        std::process::id() as i32
    }

    #[test]
    fn current_process_is_alive() {
        assert!(is_process_alive(own_pid()));
    }

    #[test]
    fn dead_pid_is_not_alive() {
        assert!(!is_process_alive(999_999_999));
    }

    #[test]
    fn dead_pid_is_classified_as_gone() {
        let err = send_signal(999_999_999, SIG_PROBE).unwrap_err();
        assert!(err.is_process_already_gone());
    }

    #[test]
    fn non_positive_pid_is_rejected() {
        assert!(matches!(
            send_signal(0, SIG_PROBE),
            Err(DnsnameError::Signal { pid: 0, .. })
        ));
        assert!(!is_process_alive(-1));
    }
}
