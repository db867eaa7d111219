//! Plugin configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default shared root holding one directory per network.
pub const DEFAULT_ROOT_DIR: &str = "/run/containers/cni/dnsname";

/// Root suffix appended to `$XDG_RUNTIME_DIR` for rootless invocations.
const ROOTLESS_SUFFIX: &str = "containers/cni/dnsname";

/// Default resolver daemon looked up on `PATH`.
pub const DEFAULT_BINARY: &str = "dnsmasq";

/// Default user the daemon drops privileges to.
pub const DEFAULT_USER: &str = "root";

/// Default bound on waiting for the shared root lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// Per-instance file names.
pub const CONF_FILE_NAME: &str = "dnsmasq.conf";
pub const PID_FILE_NAME: &str = "pidfile";
pub const HOSTS_FILE_NAME: &str = "addnhosts";
pub const LOCAL_SERVERS_FILE_NAME: &str = "local-servers.conf";
pub const OWN_SERVERS_FILE_NAME: &str = "own-servers.conf";

/// Host-wide settings shared by every invocation.
///
/// # Example
///
/// ```
/// use dnsname::PluginConfig;
/// use std::time::Duration;
///
/// let config = PluginConfig::new()
///     .with_root_dir("/tmp/dnsname")
///     .with_lock_timeout(Duration::from_secs(5));
///
/// assert_eq!(config.binary, "dnsmasq");
/// assert_eq!(config.root_dir.to_str(), Some("/tmp/dnsname"));
/// ```
#[derive(Debug, Clone)]
pub struct PluginConfig {
    /// Directory containing one subdirectory per network.
    pub root_dir: PathBuf,

    /// Daemon binary name (searched on `PATH`) or absolute path.
    pub binary: String,

    /// Value passed to the daemon's `-u` option.
    pub user: String,

    /// Upper bound on waiting for the shared root lock.
    pub lock_timeout: Duration,
}

impl PluginConfig {
    /// Creates a config rooted at [`DEFAULT_ROOT_DIR`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            root_dir: PathBuf::from(DEFAULT_ROOT_DIR),
            binary: DEFAULT_BINARY.to_string(),
            user: DEFAULT_USER.to_string(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Creates a config whose root follows the invoking user.
    ///
    /// Rootless callers with `XDG_RUNTIME_DIR` set get
    /// `$XDG_RUNTIME_DIR/containers/cni/dnsname`; everyone else gets
    /// [`DEFAULT_ROOT_DIR`].
    #[must_use]
    pub fn detect() -> Self {
        // SAFETY: `geteuid` cannot fail and has no preconditions.
        let euid = unsafe { libc::geteuid() };
        let runtime_dir = std::env::var_os("XDG_RUNTIME_DIR");
        Self::new().with_root_dir(root_for(euid, runtime_dir.map(PathBuf::from)))
    }

    /// Overrides the shared root.
    #[must_use]
    pub fn with_root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = root_dir.into();
        self
    }

    /// Overrides the daemon binary.
    #[must_use]
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    /// Overrides the privilege-drop user.
    #[must_use]
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = user.into();
        self
    }

    /// Overrides the lock timeout.
    #[must_use]
    pub const fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }
}

impl Default for PluginConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn root_for(euid: u32, runtime_dir: Option<PathBuf>) -> PathBuf {
    match runtime_dir {
        Some(dir) if euid != 0 && !dir.as_os_str().is_empty() => dir.join(ROOTLESS_SUFFIX),
        _ => PathBuf::from(DEFAULT_ROOT_DIR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_sets_defaults() {
        let c = PluginConfig::new();
        assert_eq!(c.root_dir, PathBuf::from(DEFAULT_ROOT_DIR));
        assert_eq!(c.binary, "dnsmasq");
        assert_eq!(c.user, "root");
        assert_eq!(c.lock_timeout, DEFAULT_LOCK_TIMEOUT);
    }

    #[test]
    fn builders_override() {
        let c = PluginConfig::new()
            .with_binary("/usr/sbin/dnsmasq")
            .with_user("nobody")
            .with_lock_timeout(Duration::from_millis(10));
        assert_eq!(c.binary, "/usr/sbin/dnsmasq");
        assert_eq!(c.user, "nobody");
        assert_eq!(c.lock_timeout, Duration::from_millis(10));
    }

    #[test]
    fn rootless_root_uses_runtime_dir() {
        assert_eq!(
            root_for(1000, Some(PathBuf::from("/run/user/1000"))),
            PathBuf::from("/run/user/1000/containers/cni/dnsname")
        );
        assert_eq!(root_for(1000, None), PathBuf::from(DEFAULT_ROOT_DIR));
        assert_eq!(
            root_for(0, Some(PathBuf::from("/run/user/0"))),
            PathBuf::from(DEFAULT_ROOT_DIR)
        );
    }
}
