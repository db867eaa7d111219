//! Per-network instances and their on-disk layout.
//!
//! Each network gets `<root>/<network>/` holding the daemon config, pid
//! file, hosts file and the two forwarder files.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::config::{
    CONF_FILE_NAME, HOSTS_FILE_NAME, LOCAL_SERVERS_FILE_NAME, OWN_SERVERS_FILE_NAME,
    PID_FILE_NAME, PluginConfig,
};
use crate::error::{DnsnameError, Result};
use crate::supervisor::Supervisor;

/// Marker line heading every generated daemon config.
const GENERATED_MARKER: &str = "## WARNING: THIS IS AN AUTOGENERATED FILE\n\
## AND SHOULD NOT BE EDITED MANUALLY AS IT\n\
## LIKELY TO AUTOMATICALLY BE REPLACED.";

/// One resolver deployment, keyed by network name.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Network name; also the directory name under the root.
    pub network: String,
    /// DNS suffix served by this instance. May be empty.
    pub domain: String,
    /// Whether propagation across siblings is active.
    pub multi_domain: bool,
    /// `<root>/<network>`.
    pub dir: PathBuf,
    /// Generated dnsmasq configuration.
    pub config_file: PathBuf,
    /// Pid file written by the daemon.
    pub pid_file: PathBuf,
    /// Additional hosts file listing the network's containers.
    pub hosts_file: PathBuf,
    /// Sibling domains plus caller-supplied upstream servers.
    pub local_servers_file: PathBuf,
    /// This instance's own scoped lines.
    pub own_servers_file: PathBuf,
    supervisor: Supervisor,
}

impl Instance {
    /// Returns the daemon supervisor for this instance.
    #[must_use]
    pub const fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    /// Writes the daemon config unless one already exists.
    ///
    /// Also creates an empty local-servers file so the daemon can load it
    /// before any server has been propagated.
    ///
    /// # Errors
    ///
    /// Returns [`DnsnameError::Io`] if either file cannot be written.
    pub fn ensure_config_file(&self, interface: &str) -> Result<()> {
        if !self.local_servers_file.exists() {
            std::fs::write(&self.local_servers_file, "")?;
        }
        if self.config_file.exists() {
            return Ok(());
        }
        std::fs::write(&self.config_file, self.generate_config(interface))?;
        tracing::debug!(
            network = %self.network,
            path = %self.config_file.display(),
            "Wrote resolver config"
        );
        Ok(())
    }

    fn generate_config(&self, interface: &str) -> String {
        let mut content = format!("{GENERATED_MARKER}\nstrict-order\n");
        if !self.domain.is_empty() {
            content.push_str(&format!(
                "local=/{d}/\ndomain={d}\nexpand-hosts\n",
                d = self.domain
            ));
        }
        content.push_str(&format!(
            "pid-file={pid}\nexcept-interface=lo\nbind-dynamic\nno-hosts\n\
             interface={interface}\naddn-hosts={hosts}\nservers-file={servers}\n",
            pid = self.pid_file.display(),
            hosts = self.hosts_file.display(),
            servers = self.local_servers_file.display(),
        ));
        content
    }
}

/// Resolves instances under the shared root.
#[derive(Debug, Clone)]
pub struct InstanceRegistry {
    config: PluginConfig,
}

impl InstanceRegistry {
    /// Creates a registry for `config.root_dir`.
    #[must_use]
    pub const fn new(config: PluginConfig) -> Self {
        Self { config }
    }

    /// Returns the shared root.
    #[must_use]
    pub fn root_dir(&self) -> &Path {
        &self.config.root_dir
    }

    /// Returns the configuration this registry was built with.
    #[must_use]
    pub const fn config(&self) -> &PluginConfig {
        &self.config
    }

    /// Builds the [`Instance`] for `network`. Nothing is created on disk.
    ///
    /// # Errors
    ///
    /// Returns [`DnsnameError::BinaryNotFound`] if the daemon binary is not
    /// on `PATH`, or [`DnsnameError::InvalidConfig`] if `network` is not a
    /// plain directory name.
    pub fn resolve(&self, network: &str, domain: &str, multi_domain: bool) -> Result<Instance> {
        if network.is_empty() || network.contains('/') || network == "." || network == ".." {
            return Err(DnsnameError::InvalidConfig(format!(
                "invalid network name {network:?}"
            )));
        }
        let binary = which::which(&self.config.binary).map_err(|_| DnsnameError::BinaryNotFound {
            binary: self.config.binary.clone(),
        })?;

        let dir = self.config.root_dir.join(network);
        let config_file = dir.join(CONF_FILE_NAME);
        let pid_file = dir.join(PID_FILE_NAME);
        let supervisor = Supervisor::new(binary, &config_file, &pid_file, &self.config.user);

        Ok(Instance {
            network: network.to_string(),
            domain: domain.to_string(),
            multi_domain,
            hosts_file: dir.join(HOSTS_FILE_NAME),
            local_servers_file: dir.join(LOCAL_SERVERS_FILE_NAME),
            own_servers_file: dir.join(OWN_SERVERS_FILE_NAME),
            config_file,
            pid_file,
            dir,
            supervisor,
        })
    }

    /// Lists every network directory under the root except `current_dir`.
    ///
    /// Names are returned sorted so propagation visits siblings in a stable
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`DnsnameError::Io`] if the root cannot be read.
    pub fn list_siblings(&self, current_dir: &Path) -> Result<Vec<String>> {
        let current = current_dir.file_name();
        let entries = match std::fs::read_dir(&self.config.root_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() || Some(entry.file_name().as_os_str()) == current {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}
