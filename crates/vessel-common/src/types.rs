//! Domain primitive types used across the Vessel workspace.

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VesselError};

/// Unique identifier for a container instance.
///
/// Identifiers are time-derived (`c` followed by the creation instant in
/// nanoseconds) so they sort by creation order and never collide between
/// sequential starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId(String);

impl ContainerId {
    /// Creates a container ID from an existing string value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh time-derived container ID.
    #[must_use]
    pub fn generate() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        Self(format!("c{nanos}"))
    }

    /// Returns the inner string representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns a short form suitable for hostnames and display columns.
    #[must_use]
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Content-addressed identifier for a filesystem layer.
///
/// The identifier is the hex-encoded SHA-256 digest over the layer's
/// relative paths, file types, and regular-file contents, so identical
/// trees always produce identical IDs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LayerId(String);

impl LayerId {
    /// Creates a layer ID from a hex-encoded digest string.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a 64-character hex string.
    pub fn from_hex(hex: impl Into<String>) -> Result<Self> {
        let hex = hex.into();
        if hex.len() != 64 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(VesselError::Config {
                message: format!("invalid SHA-256 hex string: {hex}"),
            });
        }
        Ok(Self(hex))
    }

    /// Returns the hex-encoded digest.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle state of a container.
///
/// Transitions only move forward: `created → running → {exited | stopped}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    /// Record persisted, no resources allocated yet.
    Created,
    /// A real process has been launched.
    Running,
    /// The launched process terminated on its own.
    Exited,
    /// A termination request was issued while running.
    Stopped,
}

impl fmt::Display for ContainerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Running => write!(f, "running"),
            Self::Exited => write!(f, "exited"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Network attachment mode for a container.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkMode {
    /// Private network namespace wired to the shared bridge.
    #[default]
    Bridge,
    /// No network namespace isolation and no wiring.
    None,
}

impl fmt::Display for NetworkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bridge => write!(f, "bridge"),
            Self::None => write!(f, "none"),
        }
    }
}

impl FromStr for NetworkMode {
    type Err = VesselError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "bridge" => Ok(Self::Bridge),
            "none" => Ok(Self::None),
            other => Err(VesselError::Config {
                message: format!("invalid network mode: {other} (use 'bridge' or 'none')"),
            }),
        }
    }
}

/// Transport protocol for a port mapping.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Stream transport.
    #[default]
    Tcp,
    /// Datagram transport.
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tcp => write!(f, "tcp"),
            Self::Udp => write!(f, "udp"),
        }
    }
}

impl FromStr for Protocol {
    type Err = VesselError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            other => Err(VesselError::Config {
                message: format!("invalid protocol: {other} (use 'tcp' or 'udp')"),
            }),
        }
    }
}

/// A host-to-container port mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PortMapping {
    /// Port bound on the host.
    pub host_port: u16,
    /// Port inside the container the traffic is forwarded to.
    pub container_port: u16,
    /// Transport protocol.
    pub protocol: Protocol,
}

impl fmt::Display for PortMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}/{}",
            self.host_port, self.container_port, self.protocol
        )
    }
}

impl FromStr for PortMapping {
    type Err = VesselError;

    /// Parses `HOST:CONTAINER[/PROTOCOL]`, e.g. `8080:80/tcp`.
    fn from_str(s: &str) -> Result<Self> {
        let bad = || VesselError::Config {
            message: format!("invalid port mapping: {s} (expected HOST:CONTAINER[/tcp|udp])"),
        };
        let (ports, protocol) = match s.split_once('/') {
            Some((ports, proto)) => (ports, proto.parse()?),
            None => (s, Protocol::Tcp),
        };
        let (host, container) = ports.split_once(':').ok_or_else(bad)?;
        let host_port: u16 = host.parse().map_err(|_| bad())?;
        let container_port: u16 = container.parse().map_err(|_| bad())?;
        if host_port == 0 || container_port == 0 {
            return Err(bad());
        }
        Ok(Self {
            host_port,
            container_port,
            protocol,
        })
    }
}

/// Kind of a container mount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MountKind {
    /// A host path mounted directly.
    Bind,
    /// A named volume managed by the runtime.
    Volume,
}

/// A single mount attached to a container.
///
/// Immutable once attached to a container record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountSpec {
    /// Whether the source is a host path or a named volume.
    pub kind: MountKind,
    /// Host path (bind) or volume name (volume).
    pub source: String,
    /// Absolute destination path inside the container.
    pub destination: String,
    /// Mount read-only.
    pub read_only: bool,
}

impl FromStr for MountSpec {
    type Err = VesselError;

    /// Parses `SOURCE:DEST[:ro]` where an absolute source is a bind mount
    /// and anything else names a volume.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(':').collect();
        let (source, destination, read_only) = match parts.as_slice() {
            [src, dst] => (*src, *dst, false),
            [src, dst, "ro"] => (*src, *dst, true),
            [src, dst, "rw"] => (*src, *dst, false),
            _ => {
                return Err(VesselError::Config {
                    message: format!("invalid mount spec: {s} (expected SOURCE:DEST[:ro])"),
                });
            }
        };
        if source.is_empty() || !destination.starts_with('/') {
            return Err(VesselError::Config {
                message: format!("invalid mount spec: {s} (destination must be absolute)"),
            });
        }
        let kind = if source.starts_with('/') {
            MountKind::Bind
        } else {
            MountKind::Volume
        };
        Ok(Self {
            kind,
            source: source.to_string(),
            destination: destination.to_string(),
            read_only,
        })
    }
}

/// Resource limits for a container.
///
/// A missing (or zero) value means the corresponding controller file is
/// left untouched; when neither limit is set, no accounting group is
/// created at all.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    /// Memory limit in megabytes.
    pub memory_mb: Option<u64>,
    /// CPU limit as a fraction of one core (0.5 = half a core).
    pub cpu_fraction: Option<f64>,
}

impl ResourceLimits {
    /// Returns whether any limit is actually requested.
    #[must_use]
    pub fn any(&self) -> bool {
        self.memory_mb.is_some_and(|m| m > 0) || self.cpu_fraction.is_some_and(|c| c > 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_id_is_time_derived_and_unique() {
        let a = ContainerId::generate();
        let b = ContainerId::generate();
        assert!(a.as_str().starts_with('c'));
        assert_ne!(a, b);
    }

    #[test]
    fn container_id_short_truncates() {
        let id = ContainerId::new("c1234567890123456789");
        assert_eq!(id.short(), "c12345678901");
        let tiny = ContainerId::new("c1");
        assert_eq!(tiny.short(), "c1");
    }

    #[test]
    fn layer_id_rejects_bad_hex() {
        assert!(LayerId::from_hex("abc").is_err());
        assert!(LayerId::from_hex("g".repeat(64)).is_err());
        assert!(LayerId::from_hex("a".repeat(64)).is_ok());
    }

    #[test]
    fn port_mapping_parses_with_and_without_protocol() {
        let m: PortMapping = "8080:80/tcp".parse().expect("tcp mapping");
        assert_eq!(m.host_port, 8080);
        assert_eq!(m.container_port, 80);
        assert_eq!(m.protocol, Protocol::Tcp);

        let m: PortMapping = "5353:53/udp".parse().expect("udp mapping");
        assert_eq!(m.protocol, Protocol::Udp);

        let m: PortMapping = "9000:9000".parse().expect("default protocol");
        assert_eq!(m.protocol, Protocol::Tcp);
    }

    #[test]
    fn port_mapping_rejects_garbage() {
        assert!("80".parse::<PortMapping>().is_err());
        assert!("0:80".parse::<PortMapping>().is_err());
        assert!("8080:80/icmp".parse::<PortMapping>().is_err());
        assert!("99999:80".parse::<PortMapping>().is_err());
    }

    #[test]
    fn mount_spec_distinguishes_bind_and_volume() {
        let bind: MountSpec = "/host/data:/data:ro".parse().expect("bind");
        assert_eq!(bind.kind, MountKind::Bind);
        assert!(bind.read_only);

        let vol: MountSpec = "mydata:/data".parse().expect("volume");
        assert_eq!(vol.kind, MountKind::Volume);
        assert_eq!(vol.source, "mydata");
        assert!(!vol.read_only);
    }

    #[test]
    fn mount_spec_requires_absolute_destination() {
        assert!("mydata:data".parse::<MountSpec>().is_err());
        assert!("a:b:c:d".parse::<MountSpec>().is_err());
    }

    #[test]
    fn network_mode_parses() {
        assert_eq!("bridge".parse::<NetworkMode>().ok(), Some(NetworkMode::Bridge));
        assert_eq!("none".parse::<NetworkMode>().ok(), Some(NetworkMode::None));
        assert!("host".parse::<NetworkMode>().is_err());
    }

    #[test]
    fn limits_any_ignores_zero_values() {
        assert!(!ResourceLimits::default().any());
        assert!(!ResourceLimits { memory_mb: Some(0), cpu_fraction: Some(0.0) }.any());
        assert!(ResourceLimits { memory_mb: Some(128), cpu_fraction: None }.any());
        assert!(ResourceLimits { memory_mb: None, cpu_fraction: Some(0.5) }.any());
    }
}
