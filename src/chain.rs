//! Packet-filter chain hook.
//!
//! Port-forwarding rules are installed by an external tool. The plugin only
//! needs to set a chain up on add and tear it down on cleanup.

use crate::error::Result;

/// Installs and removes the per-interface forwarding chain.
pub trait PortChain {
    /// Ensures the chain for `interface` exists.
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn ensure(&self, interface: &str) -> Result<()>;

    /// Deletes the chain for `interface`. Must succeed if it is absent.
    ///
    /// # Errors
    ///
    /// Implementation-defined.
    fn remove(&self, interface: &str) -> Result<()>;
}

/// A [`PortChain`] that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopChain;

impl PortChain for NoopChain {
    fn ensure(&self, _interface: &str) -> Result<()> {
        Ok(())
    }

    fn remove(&self, _interface: &str) -> Result<()> {
        Ok(())
    }
}
