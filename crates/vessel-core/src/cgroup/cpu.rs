//! CPU resource control via cgroups v2.

use std::path::Path;

use vessel_common::error::{Result, VesselError};

/// Sets the CPU bandwidth limit by writing `quota_us period_us` to
/// `cpu.max`.
///
/// With the runtime's fixed period of 100 000 µs, a quota of 50 000 grants
/// half a core.
///
/// # Errors
///
/// Returns an error if writing to `cpu.max` fails.
pub fn set_cpu_max(cgroup_path: &Path, quota_us: u64, period_us: u64) -> Result<()> {
    let file = cgroup_path.join("cpu.max");
    let value = format!("{quota_us} {period_us}");
    std::fs::write(&file, value).map_err(|e| VesselError::io(&file, e))?;
    tracing::debug!(quota_us, period_us, "CPU max quota set");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_max_file_holds_quota_and_period() {
        let dir = tempfile::tempdir().expect("tempdir");
        set_cpu_max(dir.path(), 25_000, 100_000).expect("set");
        let raw = std::fs::read_to_string(dir.path().join("cpu.max")).expect("read");
        assert_eq!(raw, "25000 100000");
    }
}
