//! Host-port reservation shared across concurrent container starts.
//!
//! The registry tracks which host ports this process has handed out, so
//! two containers started at the same time can never claim the same
//! port even before their iptables rules land. A bind probe then
//! catches ports held by unrelated host processes.

use std::collections::HashSet;
use std::sync::Mutex;

use vessel_common::error::{Result, VesselError};
use vessel_common::types::{PortMapping, Protocol};
use vessel_core::network::port::ensure_host_port_free;

/// In-process registry of reserved host ports.
#[derive(Debug, Default)]
pub struct PortRegistry {
    reserved: Mutex<HashSet<u16>>,
}

impl PortRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `port` as in use without probing, for ports already held
    /// by running containers discovered at startup.
    pub fn seed(&self, port: u16) {
        self.lock().insert(port);
    }

    /// Reserves the host side of `mapping`.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::PortUnavailable`] when the port is zero,
    /// already reserved, or bound by another process on the host.
    pub fn reserve(&self, mapping: &PortMapping) -> Result<()> {
        let port = mapping.host_port;
        {
            let mut reserved = self.lock();
            if reserved.contains(&port) {
                return Err(VesselError::PortUnavailable { port });
            }
            reserved.insert(port);
        }
        // Probe outside the lock; undo the claim if the host says no.
        if let Err(e) = ensure_host_port_free(port, mapping.protocol) {
            self.lock().remove(&port);
            return Err(e);
        }
        Ok(())
    }

    /// Reserves every mapping in `mappings`, releasing any earlier
    /// reservations from the same call on failure.
    ///
    /// # Errors
    ///
    /// Returns the first reservation failure.
    pub fn reserve_all(&self, mappings: &[PortMapping]) -> Result<()> {
        let mut taken: Vec<u16> = Vec::new();
        for mapping in mappings {
            if let Err(e) = self.reserve(mapping) {
                for port in taken {
                    self.release(port);
                }
                return Err(e);
            }
            taken.push(mapping.host_port);
        }
        Ok(())
    }

    /// Returns a previously reserved port to the pool.
    pub fn release(&self, port: u16) {
        self.lock().remove(&port);
    }

    /// Returns whether `port` is currently reserved.
    #[must_use]
    pub fn is_reserved(&self, port: u16) -> bool {
        self.lock().contains(&port)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashSet<u16>> {
        self.reserved
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

/// Convenience check used by the CLI before any resources are built.
///
/// # Errors
///
/// Returns [`VesselError::PortUnavailable`] for the first unusable port.
pub fn probe_mappings(mappings: &[PortMapping]) -> Result<()> {
    for mapping in mappings {
        ensure_host_port_free(mapping.host_port, mapping.protocol)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    fn tcp(host: u16, container: u16) -> PortMapping {
        PortMapping {
            host_port: host,
            container_port: container,
            protocol: Protocol::Tcp,
        }
    }

    fn free_port() -> u16 {
        TcpListener::bind("127.0.0.1:0")
            .expect("bind")
            .local_addr()
            .expect("addr")
            .port()
    }

    #[test]
    fn reserve_release_cycle() {
        let registry = PortRegistry::new();
        let port = free_port();

        registry.reserve(&tcp(port, 80)).expect("reserve");
        assert!(registry.is_reserved(port));
        let err = registry.reserve(&tcp(port, 81)).expect_err("double reserve");
        assert!(matches!(err, VesselError::PortUnavailable { .. }));

        registry.release(port);
        registry.reserve(&tcp(port, 80)).expect("reserve again");
    }

    #[test]
    fn bound_port_fails_and_is_not_left_reserved() {
        let registry = PortRegistry::new();
        let listener = TcpListener::bind("0.0.0.0:0").expect("bind");
        let port = listener.local_addr().expect("addr").port();

        assert!(registry.reserve(&tcp(port, 80)).is_err());
        assert!(!registry.is_reserved(port));
    }

    #[test]
    fn reserve_all_rolls_back_on_failure() {
        let registry = PortRegistry::new();
        let listener = TcpListener::bind("0.0.0.0:0").expect("bind");
        let busy = listener.local_addr().expect("addr").port();
        let free = free_port();

        let mappings = vec![tcp(free, 80), tcp(busy, 81)];
        assert!(registry.reserve_all(&mappings).is_err());
        assert!(!registry.is_reserved(free));
        assert!(!registry.is_reserved(busy));
    }

    #[test]
    fn seeded_ports_block_reservation_without_probe() {
        let registry = PortRegistry::new();
        let port = free_port();
        registry.seed(port);
        assert!(registry.reserve(&tcp(port, 80)).is_err());
    }
}
