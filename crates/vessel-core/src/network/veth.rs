//! Per-container veth wiring.
//!
//! Creates a veth pair, attaches the host end to the bridge, moves the
//! peer into the container's network namespace, and configures address,
//! loopback, and default route inside that namespace via `nsenter`.

use std::net::Ipv4Addr;

use vessel_common::constants::{BRIDGE_NAME, CONTAINER_IFNAME, GATEWAY_IP};
use vessel_common::error::{Result, VesselError};

use super::ipam::parse_cidr;
use super::{run, run_tolerant};

/// Host-side state of one container's network attachment.
#[derive(Debug, Clone)]
pub struct ContainerNetwork {
    /// Allocated address with subnet prefix (e.g. `172.30.0.7/24`).
    pub ip_cidr: String,
    /// Name of the bridge-attached host end of the veth pair.
    pub veth_host: String,
}

/// Wires a running process into the bridge network.
///
/// The address must already be reserved by the allocator. Before
/// configuring anything inside the namespace, the target process is
/// verified to actually hold a private network namespace; a process still
/// in the host namespace fails with
/// [`VesselError::NetworkIsolationNotApplied`] rather than silently
/// reconfiguring the host.
///
/// # Errors
///
/// Returns an error if the address/gateway pair is invalid, the process
/// is not isolated, or any `ip` invocation fails.
pub fn connect(pid: u32, ip: Ipv4Addr, prefix_len: u8) -> Result<ContainerNetwork> {
    let ip_cidr = format!("{ip}/{prefix_len}");
    validate_address(&ip_cidr, GATEWAY_IP)?;
    ensure_private_netns(pid)?;

    let suffix = interface_suffix();
    let veth_host = format!("veth{suffix}");
    let veth_peer = format!("vethc{suffix}");

    run(
        "ip",
        &[
            "link", "add", &veth_host, "type", "veth", "peer", "name", &veth_peer,
        ],
    )?;
    run("ip", &["link", "set", &veth_host, "master", BRIDGE_NAME])?;
    run("ip", &["link", "set", &veth_host, "up"])?;

    let ns_path = format!("/proc/{pid}/ns/net");
    run("ip", &["link", "set", &veth_peer, "netns", &ns_path])?;

    configure_inside(pid, &veth_peer, &ip_cidr)?;

    tracing::info!(pid, ip = %ip_cidr, veth = %veth_host, "container network connected");
    Ok(ContainerNetwork { ip_cidr, veth_host })
}

/// Runs `ip` inside the target's network namespace.
fn ns_exec(pid: u32, args: &[&str]) -> Result<()> {
    let target = pid.to_string();
    let mut full = vec!["--target", target.as_str(), "--net", "--", "ip"];
    full.extend_from_slice(args);
    run("nsenter", &full)
}

/// Renames the moved peer to the canonical name, assigns the address,
/// brings the interfaces up, and installs the default route.
fn configure_inside(pid: u32, veth_peer: &str, ip_cidr: &str) -> Result<()> {
    ns_exec(pid, &["link", "set", veth_peer, "name", CONTAINER_IFNAME])?;
    ns_exec(pid, &["addr", "add", ip_cidr, "dev", CONTAINER_IFNAME])?;
    ns_exec(pid, &["link", "set", CONTAINER_IFNAME, "up"])?;
    ns_exec(pid, &["link", "set", "lo", "up"])?;

    // A pre-existing default route is fine; anything else is not.
    if let Err(e) = ns_exec(
        pid,
        &["route", "add", "default", "via", GATEWAY_IP, "dev", CONTAINER_IFNAME],
    ) {
        if !e.to_string().contains("File exists") {
            return Err(e);
        }
    }
    Ok(())
}

/// Checks that the address is valid CIDR and that the gateway lies inside
/// its subnet.
pub fn validate_address(ip_cidr: &str, gateway: &str) -> Result<()> {
    let (addr, prefix_len) = parse_cidr(ip_cidr)?;
    let gw: Ipv4Addr = gateway
        .parse()
        .map_err(|_| VesselError::config(format!("invalid gateway address: {gateway}")))?;

    let mask = if prefix_len == 0 {
        0
    } else {
        u32::MAX << (32 - u32::from(prefix_len))
    };
    if (u32::from(addr) & mask) != (u32::from(gw) & mask) {
        return Err(VesselError::config(format!(
            "gateway {gateway} is not inside the subnet of {ip_cidr}"
        )));
    }
    Ok(())
}

/// Verifies the target process holds a network namespace different from
/// the host's.
///
/// # Errors
///
/// Returns [`VesselError::NetworkIsolationNotApplied`] when both readlinks
/// resolve to the same namespace identity.
pub fn ensure_private_netns(pid: u32) -> Result<()> {
    let host = std::fs::read_link("/proc/self/ns/net")
        .map_err(|e| VesselError::io("/proc/self/ns/net", e))?;
    let target_path = format!("/proc/{pid}/ns/net");
    let target = std::fs::read_link(&target_path).map_err(|e| VesselError::io(&target_path, e))?;
    if host == target {
        return Err(VesselError::NetworkIsolationNotApplied { pid });
    }
    Ok(())
}

/// Deletes the host end of a container's veth pair.
///
/// Tolerates "already deleted": the kernel removes the pair with the
/// namespace when the process exits, so by teardown time the interface is
/// frequently gone.
pub fn disconnect(veth_host: &str) {
    run_tolerant("ip", &["link", "delete", veth_host]);
}

/// Random six-hex-character suffix for veth interface names, keeping them
/// within the kernel's 15-character interface name limit.
fn interface_suffix() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..6].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gateway_inside_subnet_is_accepted() {
        assert!(validate_address("172.30.0.7/24", "172.30.0.1").is_ok());
        assert!(validate_address("10.1.2.3/16", "10.1.0.1").is_ok());
    }

    #[test]
    fn gateway_outside_subnet_is_rejected() {
        assert!(validate_address("172.30.0.7/24", "172.31.0.1").is_err());
        assert!(validate_address("10.1.2.3/24", "10.1.3.1").is_err());
    }

    #[test]
    fn malformed_cidr_is_rejected() {
        assert!(validate_address("172.30.0.7", "172.30.0.1").is_err());
        assert!(validate_address("172.30.0.7/33", "172.30.0.1").is_err());
        assert!(validate_address("not-an-ip/24", "172.30.0.1").is_err());
        assert!(validate_address("172.30.0.7/24", "not-an-ip").is_err());
    }

    #[test]
    fn interface_suffix_fits_ifname_limit() {
        let suffix = interface_suffix();
        assert_eq!(suffix.len(), 6);
        assert!(format!("vethc{suffix}").len() <= 15);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn own_process_fails_isolation_check() {
        // This test process runs in the host network namespace.
        let result = ensure_private_netns(std::process::id());
        assert!(matches!(
            result,
            Err(VesselError::NetworkIsolationNotApplied { .. })
        ));
    }
}
