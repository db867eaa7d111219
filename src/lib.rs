//! # dnsname
//!
//! Per-network name resolution for chained container-network plugins.
//!
//! Every container network gets a dnsmasq instance living under
//! `<root>/<network>/`. Containers are published to it through an
//! additional hosts file. In multi-domain mode each instance also publishes
//! `server=/<domain>/<ip>` forwarders for its own domain into every other
//! instance's servers file, so containers can resolve names across
//! networks.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use dnsname::{Attachment, Plugin, PluginConfig};
//!
//! let plugin = Plugin::new(PluginConfig::detect());
//! let attachment = Attachment {
//!     network: "podman".into(),
//!     domain: "dns.podman".into(),
//!     multi_domain: true,
//!     interface: "cni-podman0".into(),
//!     pod_name: "web".into(),
//!     container_ips: vec!["10.88.0.5".parse()?],
//!     nameservers: vec!["10.88.0.1".parse()?],
//!     ..Attachment::default()
//! };
//!
//! let nameservers = plugin.add(&attachment)?;
//! plugin.check(&attachment)?;
//! plugin.del(&attachment)?;
//! ```
//!
//! ## Concurrency
//!
//! Independent plugin processes coordinate through an exclusive `flock` on
//! the shared root ([`LockGuard`]). Propagation rewrites sibling files only
//! while that lock is held, and every merge and removal is idempotent, so a
//! run interrupted halfway is repaired by the next add or del.
//!
//! ## Permissions
//!
//! Starting dnsmasq and writing under `/run` requires root. Rootless
//! callers should use [`PluginConfig::detect`], which moves the root under
//! `$XDG_RUNTIME_DIR`.

#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod chain;
pub mod config;
pub mod error;
pub mod hosts;
pub mod instance;
pub mod lock;
pub mod plugin;
pub mod propagation;
pub mod server_set;
pub mod servers;
pub mod supervisor;
pub mod util;

pub use chain::{NoopChain, PortChain};
pub use config::PluginConfig;
pub use error::{DnsnameError, Result};
pub use instance::{Instance, InstanceRegistry};
pub use lock::LockGuard;
pub use plugin::{Attachment, Plugin};
pub use propagation::{add_local_servers, remove_local_servers};
pub use supervisor::{ProcessState, Supervisor};
