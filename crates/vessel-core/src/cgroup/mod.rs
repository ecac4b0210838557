//! Cgroups v2 resource management.
//!
//! Creates one accounting group per container under the unified hierarchy
//! at `/sys/fs/cgroup` and sets memory and CPU limits through the
//! subsystem-specific writers in [`memory`] and [`cpu`].

pub mod cpu;
pub mod memory;

use std::path::{Path, PathBuf};

use vessel_common::constants::{CGROUP_PREFIX, CGROUP_V2_PATH, CPU_PERIOD_US};
use vessel_common::error::{Result, VesselError};
use vessel_common::types::ResourceLimits;

/// Memory accounting snapshot for a running container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryStats {
    /// Bytes currently charged to the group.
    pub used_bytes: u64,
    /// Configured limit, or `None` when the group is unlimited (`max`).
    pub limit_bytes: Option<u64>,
}

/// Handle to the accounting group of a specific container.
#[derive(Debug, Clone)]
pub struct CgroupManager {
    path: PathBuf,
}

impl CgroupManager {
    /// Creates a group for the container under the unified hierarchy and
    /// applies the requested limits.
    ///
    /// Returns `None` when no limit is actually requested; a container
    /// with no limits runs without an accounting group. Creation is
    /// idempotent on the directory-exists case.
    ///
    /// # Errors
    ///
    /// Returns an error if the group directory cannot be created or a
    /// limit file cannot be written.
    pub fn create(container_id: &str, limits: &ResourceLimits) -> Result<Option<Self>> {
        Self::create_in(Path::new(CGROUP_V2_PATH), container_id, limits)
    }

    /// Like [`CgroupManager::create`] but rooted at an explicit hierarchy
    /// path.
    ///
    /// # Errors
    ///
    /// Returns an error if the group directory cannot be created or a
    /// limit file cannot be written.
    pub fn create_in(root: &Path, container_id: &str, limits: &ResourceLimits) -> Result<Option<Self>> {
        if !limits.any() {
            return Ok(None);
        }

        let path = root.join(format!("{CGROUP_PREFIX}{container_id}"));
        std::fs::create_dir_all(&path).map_err(|e| VesselError::io(&path, e))?;

        if let Some(mb) = limits.memory_mb.filter(|&mb| mb > 0) {
            memory::set_memory_max(&path, mb * 1024 * 1024)?;
        }
        if let Some(fraction) = limits.cpu_fraction.filter(|&f| f > 0.0) {
            #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let quota = (fraction * CPU_PERIOD_US as f64) as u64;
            cpu::set_cpu_max(&path, quota, CPU_PERIOD_US)?;
        }

        tracing::info!(path = %path.display(), "cgroup created");
        Ok(Some(Self { path }))
    }

    /// Opens a handle to an existing (or never-created) group by
    /// container ID without touching the filesystem.
    #[must_use]
    pub fn open(container_id: &str) -> Self {
        Self::open_in(Path::new(CGROUP_V2_PATH), container_id)
    }

    /// Like [`CgroupManager::open`] but rooted at an explicit hierarchy path.
    #[must_use]
    pub fn open_in(root: &Path, container_id: &str) -> Self {
        Self {
            path: root.join(format!("{CGROUP_PREFIX}{container_id}")),
        }
    }

    /// Returns whether the group directory exists on disk.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Path to this group's `cgroup.procs` file.
    ///
    /// The launcher hands this path to the child, which joins the group
    /// itself (by writing `0`) before any user code runs.
    #[must_use]
    pub fn procs_path(&self) -> PathBuf {
        self.path.join("cgroup.procs")
    }

    /// Reads the current memory usage and limit of the group.
    ///
    /// # Errors
    ///
    /// Returns an error if `memory.current` cannot be read or parsed.
    pub fn stats(&self) -> Result<MemoryStats> {
        let used_bytes = memory::read_memory_current(&self.path)?;
        let limit_bytes = std::fs::read_to_string(self.path.join("memory.max"))
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok());

        Ok(MemoryStats {
            used_bytes,
            limit_bytes,
        })
    }

    /// Removes the group directory.
    ///
    /// Removal is best-effort: by teardown time the accounted process tree
    /// is already gone, so failures are logged and swallowed rather than
    /// propagated into the caller's cleanup path.
    pub fn remove(&self) {
        if !self.path.exists() {
            return;
        }
        // An empty v2 cgroup is removed with rmdir, not recursive delete.
        if let Err(e) = std::fs::remove_dir(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "cgroup removal failed");
        } else {
            tracing::info!(path = %self.path.display(), "cgroup removed");
        }
    }

    /// Returns the group's directory path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}
