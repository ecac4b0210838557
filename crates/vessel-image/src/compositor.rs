//! Overlay compositor: stacks layers into one mounted rootfs.
//!
//! Layer lists arrive in creation order (bottom to top); the overlay
//! mount mechanism wants them topmost-first, so the compositor reverses
//! the list when building `lowerdir=`. Each container gets a `diff`
//! (writable upper), `work` (overlay scratch), and `merged` (effective
//! rootfs) directory under the overlay root.

use std::path::{Path, PathBuf};

use vessel_common::error::{Result, VesselError};
use vessel_common::types::ContainerId;
use vessel_core::filesystem::overlayfs;

/// A live (or reconstructable) overlay mount for one container.
#[derive(Debug, Clone)]
pub struct OverlayMount {
    /// Owning container.
    pub container_id: ContainerId,
    /// Read-only lower layers in creation order, bottom to top.
    pub lower_dirs: Vec<PathBuf>,
    /// Writable upper directory; the container's only persisted writes.
    pub upper_dir: PathBuf,
    /// Overlay scratch space; never read.
    pub work_dir: PathBuf,
    /// The merged view used as the container's rootfs.
    pub merged_dir: PathBuf,
}

impl OverlayMount {
    /// Creates the directory scaffold and mounts the overlay.
    ///
    /// Refuses to create a second live overlay for the same container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container already has an overlay, a
    /// directory cannot be created, or the mount fails (in which case the
    /// scaffold is rolled back).
    pub fn create(
        overlay_root: &Path,
        container_id: ContainerId,
        layer_paths: Vec<PathBuf>,
    ) -> Result<Self> {
        if layer_paths.is_empty() {
            return Err(VesselError::config("overlay needs at least one layer"));
        }

        let base = overlay_root.join(container_id.as_str());
        if base.exists() {
            return Err(VesselError::config(format!(
                "container {container_id} already has a live overlay mount"
            )));
        }

        let mount = Self {
            container_id,
            lower_dirs: layer_paths,
            upper_dir: base.join("diff"),
            work_dir: base.join("work"),
            merged_dir: base.join("merged"),
        };

        for dir in [&mount.upper_dir, &mount.work_dir, &mount.merged_dir] {
            std::fs::create_dir_all(dir).map_err(|e| VesselError::io(dir, e))?;
        }

        if let Err(e) = overlayfs::mount_overlay(
            &mount.lowerdir_option(),
            &mount.upper_dir,
            &mount.work_dir,
            &mount.merged_dir,
        ) {
            // Roll back the scaffold so a retry does not see a phantom
            // live overlay.
            let _ = std::fs::remove_dir_all(&base);
            return Err(e);
        }

        Ok(mount)
    }

    /// Reconstructs the handle for an existing overlay (teardown path).
    #[must_use]
    pub fn open(overlay_root: &Path, container_id: ContainerId) -> Self {
        let base = overlay_root.join(container_id.as_str());
        Self {
            container_id,
            lower_dirs: Vec::new(),
            upper_dir: base.join("diff"),
            work_dir: base.join("work"),
            merged_dir: base.join("merged"),
        }
    }

    /// Builds the `lowerdir=` value: creation order reversed so the
    /// topmost layer comes first.
    #[must_use]
    pub fn lowerdir_option(&self) -> String {
        self.lower_dirs
            .iter()
            .rev()
            .map(|p| p.display().to_string())
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Unmounts the overlay and removes the scaffold directories.
    ///
    /// Unmount failure does not stop directory removal; by teardown time
    /// the merged view may already be gone.
    pub fn cleanup(&self, overlay_root: &Path) {
        if let Err(e) = overlayfs::unmount_overlay(&self.merged_dir) {
            tracing::warn!(container = %self.container_id, error = %e, "overlay unmount failed");
        }
        let base = overlay_root.join(self.container_id.as_str());
        if base.exists() {
            if let Err(e) = std::fs::remove_dir_all(&base) {
                tracing::warn!(container = %self.container_id, error = %e, "overlay directory removal failed");
            }
        }
    }

    /// Returns whether this container currently has overlay directories
    /// on disk.
    #[must_use]
    pub fn exists(overlay_root: &Path, container_id: &ContainerId) -> bool {
        overlay_root.join(container_id.as_str()).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mount_for(lowers: &[&str]) -> OverlayMount {
        OverlayMount {
            container_id: ContainerId::new("c1"),
            lower_dirs: lowers.iter().map(PathBuf::from).collect(),
            upper_dir: PathBuf::from("/o/c1/diff"),
            work_dir: PathBuf::from("/o/c1/work"),
            merged_dir: PathBuf::from("/o/c1/merged"),
        }
    }

    #[test]
    fn lowerdir_reverses_creation_order() {
        let mount = mount_for(&["/layers/L1", "/layers/L2", "/layers/L3"]);
        assert_eq!(mount.lowerdir_option(), "/layers/L3:/layers/L2:/layers/L1");
    }

    #[test]
    fn single_layer_lowerdir_has_no_separator() {
        let mount = mount_for(&["/layers/only"]);
        assert_eq!(mount.lowerdir_option(), "/layers/only");
    }

    #[test]
    fn create_rejects_empty_layer_list() {
        let root = tempfile::tempdir().expect("tempdir");
        let result = OverlayMount::create(root.path(), ContainerId::new("c1"), Vec::new());
        assert!(matches!(result, Err(VesselError::Config { .. })));
    }

    #[test]
    fn second_live_overlay_for_same_container_is_refused() {
        let root = tempfile::tempdir().expect("tempdir");
        let id = ContainerId::new("c1");
        // Simulate a live overlay by pre-creating the scaffold.
        std::fs::create_dir_all(root.path().join(id.as_str()).join("merged")).expect("mkdir");

        let result = OverlayMount::create(root.path(), id, vec![PathBuf::from("/layers/L1")]);
        assert!(matches!(result, Err(VesselError::Config { .. })));
    }

    #[test]
    fn open_reconstructs_scaffold_paths() {
        let root = Path::new("/data/overlay");
        let mount = OverlayMount::open(root, ContainerId::new("c42"));
        assert_eq!(mount.upper_dir, root.join("c42/diff"));
        assert_eq!(mount.work_dir, root.join("c42/work"));
        assert_eq!(mount.merged_dir, root.join("c42/merged"));
    }

    #[test]
    fn cleanup_removes_scaffold_even_without_mount() {
        let root = tempfile::tempdir().expect("tempdir");
        let id = ContainerId::new("c1");
        std::fs::create_dir_all(root.path().join(id.as_str()).join("diff")).expect("mkdir");

        let mount = OverlayMount::open(root.path(), id.clone());
        mount.cleanup(root.path());
        assert!(!OverlayMount::exists(root.path(), &id));
    }
}
