//! Memory resource control via cgroups v2.

use std::path::Path;

use vessel_common::error::{Result, VesselError};

/// Sets the hard memory limit by writing the byte count to `memory.max`.
///
/// # Errors
///
/// Returns an error if writing to `memory.max` fails.
pub fn set_memory_max(cgroup_path: &Path, bytes: u64) -> Result<()> {
    let file = cgroup_path.join("memory.max");
    std::fs::write(&file, bytes.to_string()).map_err(|e| VesselError::io(&file, e))?;
    tracing::debug!(bytes, "memory max set");
    Ok(())
}

/// Reads the current memory usage from `memory.current`.
///
/// # Errors
///
/// Returns an error if `memory.current` cannot be read or parsed.
pub fn read_memory_current(cgroup_path: &Path) -> Result<u64> {
    let file = cgroup_path.join("memory.current");
    let raw = std::fs::read_to_string(&file).map_err(|e| VesselError::io(&file, e))?;
    raw.trim()
        .parse()
        .map_err(|_| VesselError::config(format!("unparseable memory.current: {}", raw.trim())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_max_file_holds_exact_byte_count() {
        let dir = tempfile::tempdir().expect("tempdir");
        set_memory_max(dir.path(), 134_217_728).expect("set");
        let raw = std::fs::read_to_string(dir.path().join("memory.max")).expect("read");
        assert_eq!(raw, "134217728");
    }

    #[test]
    fn memory_current_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("memory.current"), "4096\n").expect("write");
        assert_eq!(read_memory_current(dir.path()).expect("read"), 4096);
    }
}
