//! Host port validation and DNAT port forwarding.
//!
//! Each mapping installs six iptables rules in a fixed order: DNAT for
//! externally arriving traffic, DNAT for loopback-originated traffic,
//! SNAT for loopback-to-container traffic (best-effort), FORWARD accepts
//! for both directions of the flow (reverse is best-effort), and a
//! MASQUERADE for the container's return traffic. Removal replays the
//! same rules with `-D` and tolerates rules that are already gone.

use std::net::{Ipv4Addr, TcpListener, UdpSocket};

use vessel_common::error::{Result, VesselError};
use vessel_common::types::{PortMapping, Protocol};

use super::{run, run_tolerant};

/// One iptables invocation belonging to a port forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    /// Arguments after the action flag, starting with any `-t` selector
    /// and the chain name.
    pub table: Option<&'static str>,
    /// Chain the rule lives in.
    pub chain: &'static str,
    /// Match and target arguments.
    pub args: Vec<String>,
    /// Installation failure is logged, not propagated.
    pub best_effort: bool,
}

impl RuleSpec {
    fn to_args(&self, action: &str) -> Vec<String> {
        let mut out = Vec::new();
        if let Some(table) = self.table {
            out.push("-t".into());
            out.push(table.into());
        }
        out.push(action.into());
        out.push(self.chain.into());
        out.extend(self.args.iter().cloned());
        out
    }
}

/// Builds the ordered rule set for one mapping to one container address.
#[must_use]
pub fn rule_specs(mapping: PortMapping, container_ip: Ipv4Addr) -> Vec<RuleSpec> {
    let proto = mapping.protocol.to_string();
    let host_port = mapping.host_port.to_string();
    let container_port = mapping.container_port.to_string();
    let destination = format!("{container_ip}:{container_port}");
    let ip = container_ip.to_string();

    vec![
        // Externally arriving traffic.
        RuleSpec {
            table: Some("nat"),
            chain: "PREROUTING",
            args: str_args(&[
                "-p", &proto, "--dport", &host_port, "-j", "DNAT", "--to-destination",
                &destination,
            ]),
            best_effort: false,
        },
        // Loopback-originated traffic never hits PREROUTING.
        RuleSpec {
            table: Some("nat"),
            chain: "OUTPUT",
            args: str_args(&[
                "-p", &proto, "-d", "127.0.0.1", "--dport", &host_port, "-j", "DNAT",
                "--to-destination", &destination,
            ]),
            best_effort: false,
        },
        RuleSpec {
            table: Some("nat"),
            chain: "POSTROUTING",
            args: str_args(&[
                "-p", &proto, "-s", "127.0.0.1", "-d", &ip, "--dport", &container_port, "-j",
                "MASQUERADE",
            ]),
            best_effort: true,
        },
        RuleSpec {
            table: None,
            chain: "FORWARD",
            args: str_args(&["-p", &proto, "-d", &ip, "--dport", &container_port, "-j", "ACCEPT"]),
            best_effort: false,
        },
        RuleSpec {
            table: None,
            chain: "FORWARD",
            args: str_args(&["-p", &proto, "-s", &ip, "--sport", &container_port, "-j", "ACCEPT"]),
            best_effort: true,
        },
        // Return traffic from the container.
        RuleSpec {
            table: Some("nat"),
            chain: "POSTROUTING",
            args: str_args(&[
                "-p", &proto, "-s", &ip, "--sport", &container_port, "-j", "MASQUERADE",
            ]),
            best_effort: false,
        },
    ]
}

fn str_args(args: &[&str]) -> Vec<String> {
    args.iter().map(ToString::to_string).collect()
}

/// Installs the forwarding rules for one mapping.
///
/// # Errors
///
/// Returns an error when a non-best-effort rule fails to install;
/// best-effort rules only log.
pub fn forward(mapping: PortMapping, container_ip: Ipv4Addr) -> Result<()> {
    for rule in rule_specs(mapping, container_ip) {
        let args = rule.to_args("-A");
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        if rule.best_effort {
            run_tolerant("iptables", &argv);
        } else {
            run("iptables", &argv)?;
        }
    }
    tracing::info!(%mapping, ip = %container_ip, "port forwarding installed");
    Ok(())
}

/// Removes the forwarding rules for one mapping.
///
/// Every deletion is tolerated: a rule may already be gone, and removal
/// must never abort the overall teardown.
pub fn unforward(mapping: PortMapping, container_ip: Ipv4Addr) {
    for rule in rule_specs(mapping, container_ip) {
        let args = rule.to_args("-D");
        let argv: Vec<&str> = args.iter().map(String::as_str).collect();
        run_tolerant("iptables", &argv);
    }
    tracing::debug!(%mapping, ip = %container_ip, "port forwarding removed");
}

/// Checks that a host port is inside the valid range and currently free,
/// probing with a bind of the mapping's own protocol.
///
/// # Errors
///
/// Returns [`VesselError::PortUnavailable`] when the port is zero or
/// already bound on the host.
pub fn ensure_host_port_free(port: u16, protocol: Protocol) -> Result<()> {
    if port == 0 {
        return Err(VesselError::PortUnavailable { port });
    }
    let free = match protocol {
        Protocol::Tcp => TcpListener::bind(("0.0.0.0", port)).is_ok(),
        Protocol::Udp => UdpSocket::bind(("0.0.0.0", port)).is_ok(),
    };
    if !free {
        return Err(VesselError::PortUnavailable { port });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping() -> PortMapping {
        PortMapping {
            host_port: 8080,
            container_port: 80,
            protocol: Protocol::Tcp,
        }
    }

    #[test]
    fn rules_are_installed_in_documented_order() {
        let rules = rule_specs(mapping(), Ipv4Addr::new(172, 30, 0, 5));
        let chains: Vec<_> = rules.iter().map(|r| (r.table, r.chain)).collect();
        assert_eq!(
            chains,
            vec![
                (Some("nat"), "PREROUTING"),
                (Some("nat"), "OUTPUT"),
                (Some("nat"), "POSTROUTING"),
                (None, "FORWARD"),
                (None, "FORWARD"),
                (Some("nat"), "POSTROUTING"),
            ]
        );
    }

    #[test]
    fn dnat_rule_targets_container_address() {
        let rules = rule_specs(mapping(), Ipv4Addr::new(172, 30, 0, 5));
        let dnat = rules[0].to_args("-A");
        assert_eq!(
            dnat,
            vec![
                "-t", "nat", "-A", "PREROUTING", "-p", "tcp", "--dport", "8080", "-j", "DNAT",
                "--to-destination", "172.30.0.5:80",
            ]
        );
    }

    #[test]
    fn removal_replays_rules_with_delete_action() {
        let rules = rule_specs(mapping(), Ipv4Addr::new(172, 30, 0, 5));
        let del = rules[0].to_args("-D");
        assert_eq!(del[2], "-D");
        assert_eq!(&del[3..], &rules[0].to_args("-A")[3..]);
    }

    #[test]
    fn only_loopback_snat_and_reverse_forward_are_best_effort() {
        let flags: Vec<bool> = rule_specs(mapping(), Ipv4Addr::new(172, 30, 0, 5))
            .iter()
            .map(|r| r.best_effort)
            .collect();
        assert_eq!(flags, vec![false, false, true, false, true, false]);
    }

    #[test]
    fn udp_mapping_uses_udp_matches() {
        let m = PortMapping {
            host_port: 5353,
            container_port: 53,
            protocol: Protocol::Udp,
        };
        let rules = rule_specs(m, Ipv4Addr::new(172, 30, 0, 9));
        assert!(rules[0].args.contains(&"udp".to_string()));
    }

    #[test]
    fn bound_port_is_reported_unavailable() {
        let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind");
        let port = listener.local_addr().expect("addr").port();
        // Binding 0.0.0.0:<port> collides with the live listener.
        assert!(matches!(
            ensure_host_port_free(port, Protocol::Tcp),
            Err(VesselError::PortUnavailable { .. })
        ));
        drop(listener);
        assert!(ensure_host_port_free(port, Protocol::Tcp).is_ok());
    }

    #[test]
    fn bound_udp_port_is_reported_unavailable() {
        let socket = UdpSocket::bind(("127.0.0.1", 0)).expect("bind");
        let port = socket.local_addr().expect("addr").port();
        assert!(matches!(
            ensure_host_port_free(port, Protocol::Udp),
            Err(VesselError::PortUnavailable { .. })
        ));
        drop(socket);
        assert!(ensure_host_port_free(port, Protocol::Udp).is_ok());
    }

    #[test]
    fn port_zero_is_rejected() {
        assert!(ensure_host_port_free(0, Protocol::Tcp).is_err());
        assert!(ensure_host_port_free(0, Protocol::Udp).is_err());
    }
}
