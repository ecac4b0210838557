//! Container address allocation.
//!
//! A mutex-guarded allocation table replaces the unsafe random pick:
//! concurrent container starts contend on one lock and can never be
//! handed the same address. The table is in-memory; the orchestrator
//! seeds it from persisted running containers at startup so reservations
//! survive process restarts.

use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::sync::Mutex;

use vessel_common::constants::SUBNET_CIDR;
use vessel_common::error::{Result, VesselError};

/// Host-part range handed out inside the /24: `.2` through `.254`.
/// `.0` (network), `.1` (gateway), and `.255` (broadcast) are never
/// allocated.
const FIRST_HOST: u8 = 2;
const LAST_HOST: u8 = 254;

/// Allocation table for the bridge subnet.
#[derive(Debug)]
pub struct IpAllocator {
    base: Ipv4Addr,
    prefix_len: u8,
    reserved: Mutex<HashSet<Ipv4Addr>>,
}

impl IpAllocator {
    /// Creates an allocator for the runtime's fixed subnet.
    #[must_use]
    pub fn new() -> Self {
        // SUBNET_CIDR is a compile-time constant; parsing cannot fail.
        Self::for_subnet(SUBNET_CIDR).unwrap_or_else(|_| Self {
            base: Ipv4Addr::new(172, 30, 0, 0),
            prefix_len: 24,
            reserved: Mutex::new(HashSet::new()),
        })
    }

    /// Creates an allocator for an explicit `/24` subnet in CIDR form.
    ///
    /// # Errors
    ///
    /// Returns an error if the CIDR string is malformed or not a `/24`.
    pub fn for_subnet(cidr: &str) -> Result<Self> {
        let (base, prefix_len) = parse_cidr(cidr)?;
        if prefix_len != 24 {
            return Err(VesselError::config(format!(
                "unsupported subnet prefix /{prefix_len}: allocator requires /24"
            )));
        }
        Ok(Self {
            base,
            prefix_len,
            reserved: Mutex::new(HashSet::new()),
        })
    }

    /// Reserves and returns the lowest free address in the subnet.
    ///
    /// # Errors
    ///
    /// Returns an error when every host address is taken.
    pub fn allocate(&self) -> Result<Ipv4Addr> {
        let mut reserved = self.reserved.lock().map_err(poisoned)?;
        let [a, b, c, _] = self.base.octets();
        for host in FIRST_HOST..=LAST_HOST {
            let candidate = Ipv4Addr::new(a, b, c, host);
            if reserved.insert(candidate) {
                tracing::debug!(ip = %candidate, "address allocated");
                return Ok(candidate);
            }
        }
        Err(VesselError::config(format!(
            "subnet {SUBNET_CIDR} exhausted: no free container addresses"
        )))
    }

    /// Marks an address as taken (used to seed the table from persisted
    /// running containers).
    pub fn reserve(&self, ip: Ipv4Addr) {
        if let Ok(mut reserved) = self.reserved.lock() {
            let _ = reserved.insert(ip);
        }
    }

    /// Returns an address to the pool.
    pub fn release(&self, ip: Ipv4Addr) {
        if let Ok(mut reserved) = self.reserved.lock() {
            let _ = reserved.remove(&ip);
        }
    }

    /// Formats an allocated address with the subnet prefix, as handed to
    /// `ip addr add`.
    #[must_use]
    pub fn cidr(&self, ip: Ipv4Addr) -> String {
        format!("{ip}/{}", self.prefix_len)
    }
}

impl Default for IpAllocator {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(_: std::sync::PoisonError<T>) -> VesselError {
    VesselError::config("address allocation table lock poisoned")
}

/// Parses `a.b.c.d/len` into its address and prefix length.
pub(crate) fn parse_cidr(cidr: &str) -> Result<(Ipv4Addr, u8)> {
    let bad = || VesselError::config(format!("invalid CIDR: {cidr}"));
    let (addr, len) = cidr.split_once('/').ok_or_else(bad)?;
    let addr: Ipv4Addr = addr.parse().map_err(|_| bad())?;
    let len: u8 = len.parse().map_err(|_| bad())?;
    if len > 32 {
        return Err(bad());
    }
    Ok((addr, len))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_allocates_gateway_network_or_broadcast() {
        let alloc = IpAllocator::for_subnet("172.30.0.0/24").expect("subnet");
        let mut seen = HashSet::new();
        while let Ok(ip) = alloc.allocate() {
            assert!(seen.insert(ip), "duplicate allocation: {ip}");
            let host = ip.octets()[3];
            assert!(host >= 2, "allocated network or gateway address: {ip}");
            assert!(host <= 254, "allocated broadcast address: {ip}");
        }
        assert_eq!(seen.len(), 253);
    }

    #[test]
    fn release_makes_address_reusable() {
        let alloc = IpAllocator::for_subnet("172.30.0.0/24").expect("subnet");
        let first = alloc.allocate().expect("first");
        alloc.release(first);
        let again = alloc.allocate().expect("again");
        assert_eq!(first, again);
    }

    #[test]
    fn seeded_addresses_are_skipped() {
        let alloc = IpAllocator::for_subnet("172.30.0.0/24").expect("subnet");
        alloc.reserve(Ipv4Addr::new(172, 30, 0, 2));
        alloc.reserve(Ipv4Addr::new(172, 30, 0, 3));
        assert_eq!(alloc.allocate().expect("allocate"), Ipv4Addr::new(172, 30, 0, 4));
    }

    #[test]
    fn concurrent_allocations_are_distinct() {
        use std::sync::Arc;

        let alloc = Arc::new(IpAllocator::for_subnet("172.30.0.0/24").expect("subnet"));
        let handles: Vec<_> = (0..32)
            .map(|_| {
                let alloc = Arc::clone(&alloc);
                std::thread::spawn(move || alloc.allocate().expect("allocate"))
            })
            .collect();
        let mut seen = HashSet::new();
        for h in handles {
            assert!(seen.insert(h.join().expect("join")));
        }
    }

    #[test]
    fn cidr_formatting_appends_prefix() {
        let alloc = IpAllocator::for_subnet("172.30.0.0/24").expect("subnet");
        assert_eq!(alloc.cidr(Ipv4Addr::new(172, 30, 0, 7)), "172.30.0.7/24");
    }

    #[test]
    fn non_slash_24_subnets_are_rejected() {
        assert!(IpAllocator::for_subnet("10.0.0.0/16").is_err());
        assert!(IpAllocator::for_subnet("garbage").is_err());
    }
}
