//! Add, del and check entry points.
//!
//! Each operation holds the root [`LockGuard`] for its whole body. A failed
//! add runs the same teardown as del before the lock is released, so the
//! caller only ever sees the original error.

use std::net::IpAddr;

use crate::chain::{NoopChain, PortChain};
use crate::config::PluginConfig;
use crate::error::{DnsnameError, Result};
use crate::hosts;
use crate::instance::{Instance, InstanceRegistry};
use crate::lock::LockGuard;
use crate::propagation::{add_local_servers, remove_local_servers};
use crate::servers::add_upstream_servers;

/// One container joining or leaving a network.
#[derive(Debug, Clone, Default)]
pub struct Attachment {
    /// Network name.
    pub network: String,
    /// DNS suffix for the network. May be empty.
    pub domain: String,
    /// Link this network's resolver with every other network's.
    pub multi_domain: bool,
    /// Bridge interface the daemon listens on.
    pub interface: String,
    /// Container (pod) name written to the hosts file.
    pub pod_name: String,
    /// Extra names for the container.
    pub aliases: Vec<String>,
    /// Addresses assigned to the container.
    pub container_ips: Vec<IpAddr>,
    /// Addresses the daemon answers on; published to siblings.
    pub nameservers: Vec<IpAddr>,
    /// Unscoped upstream forwarders.
    pub upstream_servers: Vec<String>,
    /// Nameservers reported by the previous plugin in the chain.
    pub prev_nameservers: Vec<String>,
}

/// The chained plugin.
#[derive(Debug)]
pub struct Plugin<C = NoopChain> {
    registry: InstanceRegistry,
    chain: C,
}

impl Plugin<NoopChain> {
    /// Creates a plugin that leaves packet filtering alone.
    #[must_use]
    pub const fn new(config: PluginConfig) -> Self {
        Self::with_chain(config, NoopChain)
    }
}

impl<C: PortChain> Plugin<C> {
    /// Creates a plugin using `chain` for forwarding rules.
    #[must_use]
    pub const fn with_chain(config: PluginConfig, chain: C) -> Self {
        Self {
            registry: InstanceRegistry::new(config),
            chain,
        }
    }

    /// Returns the instance registry.
    #[must_use]
    pub const fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    /// Returns the forwarding-chain hook.
    #[must_use]
    pub const fn chain(&self) -> &C {
        &self.chain
    }

    /// Registers a container and makes sure its network's daemon serves it.
    ///
    /// Returns the nameservers the container should use: the instance's
    /// own addresses followed by those from the previous result.
    ///
    /// # Errors
    ///
    /// Returns the first error hit while provisioning. Compensating cleanup
    /// has already run by the time it is returned.
    pub fn add(&self, attachment: &Attachment) -> Result<Vec<String>> {
        let instance = self.resolve(attachment)?;
        let _lock = self.lock()?;

        match self.provision(&instance, attachment) {
            Ok(()) => Ok(attachment
                .nameservers
                .iter()
                .map(ToString::to_string)
                .chain(attachment.prev_nameservers.iter().cloned())
                .collect()),
            Err(err) => {
                if let Err(cleanup_err) = self.clean_up(&instance, attachment) {
                    tracing::error!(
                        network = %instance.network,
                        error = %cleanup_err,
                        "Can't clean up after failed add"
                    );
                }
                Err(err)
            }
        }
    }

    /// Unregisters a container, tearing the instance down if it was the last.
    ///
    /// # Errors
    ///
    /// Returns resolve, lock or teardown errors.
    pub fn del(&self, attachment: &Attachment) -> Result<()> {
        let instance = self.resolve(attachment)?;
        let _lock = self.lock()?;
        self.clean_up(&instance, attachment)
    }

    /// Verifies the network's daemon is up and its files are present.
    ///
    /// Never creates or modifies anything, including the shared root.
    ///
    /// # Errors
    ///
    /// Returns [`DnsnameError::NotRunning`] or [`DnsnameError::MissingFile`].
    pub fn check(&self, attachment: &Attachment) -> Result<()> {
        let instance = self.resolve(attachment)?;
        let config = self.registry.config();
        if !config.root_dir.is_dir() {
            return Err(DnsnameError::NotRunning {
                network: instance.network,
            });
        }
        let _lock = LockGuard::acquire_existing(&config.root_dir, config.lock_timeout)?;

        if !instance.supervisor().is_running() {
            return Err(DnsnameError::NotRunning {
                network: instance.network,
            });
        }
        for path in [&instance.hosts_file, &instance.config_file] {
            if !path.is_file() {
                return Err(DnsnameError::MissingFile { path: path.clone() });
            }
        }
        Ok(())
    }

    fn resolve(&self, attachment: &Attachment) -> Result<Instance> {
        self.registry.resolve(
            &attachment.network,
            &attachment.domain,
            attachment.multi_domain,
        )
    }

    fn lock(&self) -> Result<LockGuard> {
        let config = self.registry.config();
        LockGuard::acquire(&config.root_dir, config.lock_timeout)
    }

    fn provision(&self, instance: &Instance, attachment: &Attachment) -> Result<()> {
        create_private_dir(instance)?;
        instance.ensure_config_file(&attachment.interface)?;
        self.chain.ensure(&attachment.interface)?;
        hosts::append(
            &instance.hosts_file,
            &attachment.pod_name,
            &attachment.aliases,
            &attachment.container_ips,
        )?;

        if !attachment.upstream_servers.is_empty() {
            add_upstream_servers(&instance.local_servers_file, &attachment.upstream_servers)?;
        }

        let supervisor = instance.supervisor();
        if instance.multi_domain && !supervisor.is_running() {
            add_local_servers(&self.registry, instance, &attachment.nameservers)?;
        }
        supervisor.hup()
    }

    fn clean_up(&self, instance: &Instance, attachment: &Attachment) -> Result<()> {
        if let Err(e) = self.chain.remove(&attachment.interface) {
            tracing::warn!(
                interface = %attachment.interface,
                error = %e,
                "Failed to remove forwarding chain"
            );
        }

        if hosts::remove_pod(&instance.hosts_file, &attachment.pod_name)? {
            return instance.supervisor().hup();
        }

        // No containers left on this network.
        if instance.multi_domain {
            remove_local_servers(&self.registry, instance, &attachment.nameservers)?;
        }
        instance.supervisor().stop()?;
        match std::fs::remove_dir_all(&instance.dir) {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }
        tracing::info!(network = %instance.network, "Removed resolver instance");
        Ok(())
    }
}

fn create_private_dir(instance: &Instance) -> Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(&instance.dir)?;
    Ok(())
}
