//! Container log capture and retrieval.
//!
//! Detached containers have their stdout/stderr redirected into one
//! append-only file per container; these helpers manage that file.

use std::fs;
use std::path::{Path, PathBuf};

use vessel_common::error::{Result, VesselError};
use vessel_common::types::ContainerId;

/// Returns the log file path for a container.
#[must_use]
pub fn log_path(logs_dir: &Path, id: &ContainerId) -> PathBuf {
    logs_dir.join(format!("{id}.log"))
}

/// Creates the log file for a container, truncating any earlier run,
/// and returns its path.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created.
pub fn create_log(logs_dir: &Path, id: &ContainerId) -> Result<PathBuf> {
    fs::create_dir_all(logs_dir).map_err(|e| VesselError::io(logs_dir, e))?;
    let path = log_path(logs_dir, id);
    fs::write(&path, b"").map_err(|e| VesselError::io(&path, e))?;
    Ok(path)
}

/// Reads the captured output of a container.
///
/// Returns an empty string if the log file does not exist yet.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read.
pub fn read_logs(logs_dir: &Path, id: &ContainerId) -> Result<String> {
    let path = log_path(logs_dir, id);
    if !path.exists() {
        return Ok(String::new());
    }
    fs::read_to_string(&path).map_err(|e| VesselError::io(&path, e))
}

/// Deletes the log file for a container, tolerating a missing file.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be removed.
pub fn remove_log(logs_dir: &Path, id: &ContainerId) -> Result<()> {
    let path = log_path(logs_dir, id);
    if path.exists() {
        fs::remove_file(&path).map_err(|e| VesselError::io(&path, e))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_path_is_constructed_correctly() {
        let p = log_path(Path::new("/var/lib/vessel/logs"), &ContainerId::new("c42"));
        assert_eq!(p.to_str().unwrap(), "/var/lib/vessel/logs/c42.log");
    }

    #[test]
    fn read_missing_log_returns_empty() {
        let dir = tempfile::tempdir().expect("tempdir");
        let content = read_logs(dir.path(), &ContainerId::new("c0")).expect("read");
        assert!(content.is_empty());
    }

    #[test]
    fn create_truncates_previous_run() {
        let dir = tempfile::tempdir().expect("tempdir");
        let id = ContainerId::new("c1");

        let path = create_log(dir.path(), &id).expect("create");
        fs::write(&path, "old output\n").expect("write");
        assert!(!read_logs(dir.path(), &id).expect("read").is_empty());

        create_log(dir.path(), &id).expect("recreate");
        assert!(read_logs(dir.path(), &id).expect("read").is_empty());
    }

    #[test]
    fn remove_is_tolerant_of_missing_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let id = ContainerId::new("c2");
        remove_log(dir.path(), &id).expect("remove missing");

        create_log(dir.path(), &id).expect("create");
        remove_log(dir.path(), &id).expect("remove");
        assert!(!log_path(dir.path(), &id).exists());
    }
}
