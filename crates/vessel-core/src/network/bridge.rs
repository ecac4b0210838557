//! Shared bridge setup.
//!
//! The bridge device, its gateway address, IP forwarding, and the subnet
//! MASQUERADE rule are process-wide host state with a create-if-absent
//! contract: setup is idempotent and safe to call before every container
//! start.

use std::process::Command;

use vessel_common::constants::{BRIDGE_NAME, GATEWAY_CIDR, SUBNET_CIDR};
use vessel_common::error::{Result, VesselError};

use super::{probe, run, run_tolerant};

/// Creates the bridge if absent, assigns the gateway address, brings it
/// up, enables IP forwarding, and installs NAT and FORWARD rules.
///
/// # Errors
///
/// Returns an error if the bridge cannot be created or brought up, if IP
/// forwarding cannot be enabled, or if the external interface for the
/// MASQUERADE rule cannot be detected.
pub fn setup() -> Result<()> {
    if !probe("ip", &["link", "show", BRIDGE_NAME]) {
        run("ip", &["link", "add", BRIDGE_NAME, "type", "bridge"])?;
        run("ip", &["addr", "add", GATEWAY_CIDR, "dev", BRIDGE_NAME])?;
        tracing::info!(bridge = BRIDGE_NAME, "bridge created");
    }

    // Bringing the device up and enabling forwarding are idempotent.
    run("ip", &["link", "set", BRIDGE_NAME, "up"])?;
    run("sysctl", &["-w", "net.ipv4.ip_forward=1"])?;

    setup_masquerade()?;

    // Allow traffic across the bridge in both directions; duplicates are
    // avoided with a check-then-append.
    for dir in ["-i", "-o"] {
        let rule = ["FORWARD", dir, BRIDGE_NAME, "-j", "ACCEPT"];
        if !probe("iptables", &as_strs(&with_action(&rule, "-C"))) {
            run_tolerant("iptables", &as_strs(&with_action(&rule, "-A")));
        }
    }

    Ok(())
}

/// Installs the subnet MASQUERADE rule on the detected external
/// interface, unless already present.
fn setup_masquerade() -> Result<()> {
    let ext_if = detect_external_interface()?;
    let rule = [
        "-t",
        "nat",
        "POSTROUTING",
        "-s",
        SUBNET_CIDR,
        "-o",
        &ext_if,
        "-j",
        "MASQUERADE",
    ];
    if probe("iptables", &as_strs(&with_nat_action(&rule, "-C"))) {
        return Ok(());
    }
    run("iptables", &as_strs(&with_nat_action(&rule, "-A")))
}

/// Finds the interface the default route to a public address uses.
///
/// # Errors
///
/// Detection failure is a hard error: without the external interface the
/// MASQUERADE rule cannot be installed and containers would silently lack
/// egress.
pub fn detect_external_interface() -> Result<String> {
    let output = Command::new("ip")
        .args(["route", "get", "8.8.8.8"])
        .output()
        .map_err(|e| VesselError::Command {
            program: "ip".into(),
            message: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(VesselError::Command {
            program: "ip".into(),
            message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }
    parse_route_device(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        VesselError::config("cannot detect external interface from default route")
    })
}

/// Extracts the token following `dev` from `ip route get` output.
fn parse_route_device(route_output: &str) -> Option<String> {
    let mut tokens = route_output.split_whitespace();
    while let Some(tok) = tokens.next() {
        if tok == "dev" {
            return tokens.next().map(ToString::to_string);
        }
    }
    None
}

/// Splices the iptables action flag in front of a chain rule.
fn with_action(rule: &[&str], action: &str) -> Vec<String> {
    let mut args = vec![action.to_string()];
    args.extend(rule.iter().map(ToString::to_string));
    args
}

/// Splices the action flag after the `-t nat` table selector.
fn with_nat_action(rule: &[&str], action: &str) -> Vec<String> {
    let mut args: Vec<String> = rule[..2].iter().map(ToString::to_string).collect();
    args.push(action.to_string());
    args.extend(rule[2..].iter().map(ToString::to_string));
    args
}

#[allow(clippy::ptr_arg)]
pub(crate) fn as_strs(args: &Vec<String>) -> Vec<&str> {
    args.iter().map(String::as_str).collect()
}
