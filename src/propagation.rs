//! Cross-instance forwarder propagation for multi-domain mode.
//!
//! Both entry points expect the caller to hold the root
//! [`LockGuard`](crate::LockGuard).

use std::fmt::Display;

use crate::error::{DnsnameError, Result};
use crate::instance::{Instance, InstanceRegistry};
use crate::server_set;
use crate::servers::{read_lines, scoped_lines, write_lines};

/// Planned rewrite of one sibling's local-servers file.
struct SiblingUpdate {
    instance: Instance,
    lines: Vec<String>,
}

impl SiblingUpdate {
    fn apply(&self) -> Result<()> {
        write_lines(&self.instance.local_servers_file, &self.lines)?;
        tracing::debug!(sibling = %self.instance.network, "Updated sibling local servers");
        self.instance.supervisor().restart_if_running()
    }
}

/// Publishes `instance`'s servers to every sibling and collects theirs.
///
/// Writes the instance's own-servers file first, then reads every sibling
/// before writing any of them: a domain collision aborts with no sibling
/// touched. Changed siblings that are running get restarted. Finally the
/// instance's local-servers file is rewritten with everything the siblings
/// publish or know about, minus its own lines.
///
/// # Errors
///
/// Returns [`DnsnameError::DomainCollision`] if a sibling already owns the
/// domain, or any I/O, resolve or restart error. A failure while applying
/// leaves the siblings written so far updated; rerunning converges.
pub fn add_local_servers<T: Display>(
    registry: &InstanceRegistry,
    instance: &Instance,
    servers: &[T],
) -> Result<()> {
    let own = scoped_lines(&instance.domain, servers);
    write_lines(&instance.own_servers_file, &own)?;

    let mut local = read_lines(&instance.local_servers_file)?;
    let mut plan = Vec::new();

    for name in registry.list_siblings(&instance.dir)? {
        let sibling = registry.resolve(&name, "", true)?;

        let sibling_own = read_lines(&sibling.own_servers_file)?;
        if server_set::contains_domain(&sibling_own, &instance.domain) {
            return Err(DnsnameError::DomainCollision {
                domain: instance.domain.clone(),
                network: name,
            });
        }

        let sibling_local = read_lines(&sibling.local_servers_file)?;
        let (merged, changed) = server_set::merge(&sibling_local, &own);

        local = server_set::merge(&local, &sibling_own).0;
        local = server_set::merge(&local, &sibling_local).0;

        if changed {
            plan.push(SiblingUpdate {
                instance: sibling,
                lines: merged,
            });
        } else {
            tracing::debug!(sibling = %name, "Sibling already knows our servers");
        }
    }

    for update in &plan {
        update.apply()?;
    }

    let (local, _) = server_set::remove(&local, &own);
    write_lines(&instance.local_servers_file, &local)?;

    tracing::info!(
        network = %instance.network,
        domain = %instance.domain,
        siblings_updated = plan.len(),
        "Propagated local servers"
    );
    Ok(())
}

/// Withdraws `instance`'s servers from every sibling.
///
/// The instance's own files are left alone; the caller is tearing it down.
///
/// # Errors
///
/// Returns any I/O, resolve or restart error. Siblings already processed
/// stay updated; rerunning is safe.
pub fn remove_local_servers<T: Display>(
    registry: &InstanceRegistry,
    instance: &Instance,
    servers: &[T],
) -> Result<()> {
    let own = scoped_lines(&instance.domain, servers);

    for name in registry.list_siblings(&instance.dir)? {
        let sibling = registry.resolve(&name, "", true)?;
        let current = read_lines(&sibling.local_servers_file)?;
        let (lines, changed) = server_set::remove(&current, &own);
        if changed {
            SiblingUpdate {
                instance: sibling,
                lines,
            }
            .apply()?;
        }
    }

    tracing::info!(
        network = %instance.network,
        domain = %instance.domain,
        "Withdrew local servers"
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PluginConfig;
    use std::os::unix::process::ExitStatusExt;
    use std::path::Path;
    use std::process::{Command, ExitStatus};
    use std::thread::JoinHandle;

    fn registry(root: &Path) -> InstanceRegistry {
        InstanceRegistry::new(PluginConfig::new().with_root_dir(root).with_binary("true"))
    }

    fn seed(root: &Path, network: &str, local: &str, own: &str) {
        let dir = root.join(network);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("local-servers.conf"), local).unwrap();
        std::fs::write(dir.join("own-servers.conf"), own).unwrap();
    }

    fn read(root: &Path, network: &str, file: &str) -> String {
        std::fs::read_to_string(root.join(network).join(file)).unwrap()
    }

    /// Records a live `sleep` as `network`'s daemon; the handle reaps it.
    fn run_fake_daemon(root: &Path, network: &str) -> JoinHandle<ExitStatus> {
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        std::fs::write(root.join(network).join("pidfile"), child.id().to_string()).unwrap();
        std::thread::spawn(move || child.wait().unwrap())
    }

    #[test]
    fn first_instance_has_no_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let r = registry(dir.path());
        let inst = r.resolve("net1", "net1", true).unwrap();
        std::fs::create_dir_all(&inst.dir).unwrap();

        add_local_servers(&r, &inst, &["10.0.0.1"]).unwrap();

        assert_eq!(read(dir.path(), "net1", "own-servers.conf"), "server=/net1/10.0.0.1\n");
        assert_eq!(read(dir.path(), "net1", "local-servers.conf"), "");
    }

    #[test]
    fn upstream_lines_survive_propagation() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "net1", "", "server=/net1/192.168.1.1\n");
        seed(dir.path(), "net2", "server=8.8.8.8\n", "");
        let r = registry(dir.path());
        let inst = r.resolve("net2", "net2", true).unwrap();

        add_local_servers(&r, &inst, &["192.168.2.1"]).unwrap();

        assert_eq!(
            read(dir.path(), "net2", "local-servers.conf"),
            "server=/net1/192.168.1.1\nserver=8.8.8.8\n"
        );
        assert_eq!(read(dir.path(), "net1", "local-servers.conf"), "server=/net2/192.168.2.1\n");
    }

    #[test]
    fn collision_leaves_every_sibling_untouched() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "net1", "", "server=/net1/192.168.1.1\n");
        seed(dir.path(), "net2", "server=/net1/192.168.1.1\n", "server=/shared/192.168.2.1\n");
        let r = registry(dir.path());
        let inst = r.resolve("net3", "shared", true).unwrap();
        std::fs::create_dir_all(&inst.dir).unwrap();

        let err = add_local_servers(&r, &inst, &["192.168.3.1"]).unwrap_err();
        assert!(err.is_domain_collision());

        assert_eq!(read(dir.path(), "net1", "local-servers.conf"), "");
        assert_eq!(
            read(dir.path(), "net2", "local-servers.conf"),
            "server=/net1/192.168.1.1\n"
        );
    }

    #[test]
    fn running_sibling_is_restarted_on_add() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "net1", "", "server=/net1/192.168.1.1\n");
        seed(dir.path(), "net2", "", "");
        let daemon = run_fake_daemon(dir.path(), "net1");
        let r = registry(dir.path());
        let inst = r.resolve("net2", "net2", true).unwrap();

        add_local_servers(&r, &inst, &["192.168.2.1"]).unwrap();

        assert_eq!(daemon.join().unwrap().signal(), Some(libc::SIGKILL));
        assert_eq!(read(dir.path(), "net1", "local-servers.conf"), "server=/net2/192.168.2.1\n");
    }

    #[test]
    fn unchanged_running_sibling_is_left_alone() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "net1", "server=/net2/192.168.2.1\n", "server=/net1/192.168.1.1\n");
        seed(dir.path(), "net2", "", "");
        let mut child = Command::new("sleep").arg("30").spawn().unwrap();
        std::fs::write(dir.path().join("net1/pidfile"), child.id().to_string()).unwrap();
        let r = registry(dir.path());
        let inst = r.resolve("net2", "net2", true).unwrap();

        add_local_servers(&r, &inst, &["192.168.2.1"]).unwrap();

        assert!(child.try_wait().unwrap().is_none());
        child.kill().unwrap();
        child.wait().unwrap();
    }

    #[test]
    fn restart_failure_on_remove_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        seed(
            dir.path(),
            "net1",
            "server=/net2/192.168.2.1\nserver=8.8.8.8\n",
            "server=/net1/192.168.1.1\n",
        );
        let daemon = run_fake_daemon(dir.path(), "net1");
        let r = InstanceRegistry::new(
            PluginConfig::new().with_root_dir(dir.path()).with_binary("false"),
        );
        let inst = r.resolve("net2", "net2", true).unwrap();

        let err = remove_local_servers(&r, &inst, &["192.168.2.1"]).unwrap_err();

        assert!(matches!(err, DnsnameError::StartFailure { .. }));
        assert_eq!(daemon.join().unwrap().signal(), Some(libc::SIGKILL));
        assert_eq!(read(dir.path(), "net1", "local-servers.conf"), "server=8.8.8.8\n");
    }

    #[test]
    fn remove_skips_siblings_without_our_lines() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path(), "net1", "server=8.8.8.8\n", "server=/net1/192.168.1.1\n");
        let r = registry(dir.path());
        let inst = r.resolve("net2", "net2", true).unwrap();

        remove_local_servers(&r, &inst, &["192.168.2.1"]).unwrap();
        assert_eq!(read(dir.path(), "net1", "local-servers.conf"), "server=8.8.8.8\n");
    }
}
