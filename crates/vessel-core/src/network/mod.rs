//! Virtual network subsystem.
//!
//! The host side is a single shared bridge ([`bridge`]) with NAT to the
//! detected external interface; each container gets a veth pair wired
//! into it ([`veth`]), an address from the mutex-guarded allocator
//! ([`ipam`]), and optional DNAT port forwards ([`port`]).
//!
//! All host network state is driven through the conventional string
//! command surface (`ip`, `iptables`, `sysctl`).

pub mod bridge;
pub mod ipam;
pub mod port;
pub mod veth;

use std::process::Command;

use vessel_common::error::{Result, VesselError};

/// Runs a host network command, failing with its captured output.
pub(crate) fn run(program: &str, args: &[&str]) -> Result<()> {
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| VesselError::Command {
            program: program.to_string(),
            message: e.to_string(),
        })?;
    if output.status.success() {
        return Ok(());
    }
    Err(VesselError::Command {
        program: program.to_string(),
        message: format!(
            "{} ({})",
            String::from_utf8_lossy(&output.stderr).trim(),
            args.join(" ")
        ),
    })
}

/// Runs a host network command where failure is tolerable; logs instead
/// of failing.
pub(crate) fn run_tolerant(program: &str, args: &[&str]) {
    if let Err(e) = run(program, args) {
        tracing::warn!(error = %e, "tolerated network command failure");
    }
}

/// Runs a command that answers a yes/no question via its exit status
/// (e.g. `iptables -C`, `ip link show`).
pub(crate) fn probe(program: &str, args: &[&str]) -> bool {
    Command::new(program)
        .args(args)
        .output()
        .map(|o| o.status.success())
        .unwrap_or(false)
}
