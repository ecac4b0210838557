//! System-wide constants and default paths.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Default base directory for Vessel data when running as root.
pub const SYSTEM_DATA_DIR: &str = "/var/lib/vessel";

/// Cgroups v2 unified hierarchy mount point.
pub const CGROUP_V2_PATH: &str = "/sys/fs/cgroup";

/// Directory-name prefix for per-container cgroups.
pub const CGROUP_PREFIX: &str = "vessel-";

/// Fixed CPU bandwidth period in microseconds; a quota equal to this value
/// grants one full core.
pub const CPU_PERIOD_US: u64 = 100_000;

/// Name of the shared bridge device on the host.
pub const BRIDGE_NAME: &str = "vessel0";

/// Subnet all container addresses are allocated from.
pub const SUBNET_CIDR: &str = "172.30.0.0/24";

/// Bridge (gateway) address with prefix, assigned to the bridge device.
pub const GATEWAY_CIDR: &str = "172.30.0.1/24";

/// Bare gateway address, used as the containers' default route.
pub const GATEWAY_IP: &str = "172.30.0.1";

/// Canonical interface name inside a container's network namespace.
pub const CONTAINER_IFNAME: &str = "eth0";

/// Application name used in CLI output and state files.
pub const APP_NAME: &str = "vessel";

/// Returns the data directory, preferring `$VESSEL_DATA_DIR`, then
/// `$HOME/.vessel` when it is creatable, falling back to
/// `/var/lib/vessel`.
fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("VESSEL_DATA_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(home) = std::env::var("HOME") {
        let user_dir = PathBuf::from(home).join(".vessel");
        if std::fs::create_dir_all(&user_dir).is_ok() {
            return user_dir;
        }
    }
    PathBuf::from(SYSTEM_DATA_DIR)
}

static DATA_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the resolved data directory for this session.
pub fn data_dir() -> &'static PathBuf {
    DATA_DIR.get_or_init(resolve_data_dir)
}

/// Per-container metadata records.
#[must_use]
pub fn containers_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("containers")
}

/// Content-addressed layer store.
#[must_use]
pub fn layers_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("layers")
}

/// Image manifests and plain rootfs images.
#[must_use]
pub fn images_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("images")
}

/// Per-container overlay mounts (diff/work/merged).
#[must_use]
pub fn overlay_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("overlay")
}

/// Named volume data and metadata.
#[must_use]
pub fn volumes_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("volumes")
}

/// Captured container stdout/stderr.
#[must_use]
pub fn logs_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_helpers_nest_under_data_dir() {
        let base = Path::new("/var/lib/vessel");
        assert_eq!(containers_dir(base), base.join("containers"));
        assert_eq!(layers_dir(base), base.join("layers"));
        assert_eq!(overlay_dir(base), base.join("overlay"));
        assert_eq!(volumes_dir(base), base.join("volumes"));
        assert_eq!(logs_dir(base), base.join("logs"));
    }
}
