//! `OverlayFS` mount primitives.
//!
//! The compositor in `vessel-image` decides layer ordering and directory
//! layout; this module only issues the mount and unmount syscalls.

use std::path::Path;

use vessel_common::error::Result;

/// Mounts an overlay at `merged`.
///
/// `lowerdir` must already be in mount order (topmost layer first); use
/// the compositor to derive it from creation order.
///
/// # Errors
///
/// Returns an error if the mount syscall fails.
#[cfg(target_os = "linux")]
pub fn mount_overlay(lowerdir: &str, upper: &Path, work: &Path, merged: &Path) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    use vessel_common::error::VesselError;

    let opts = format!(
        "lowerdir={lowerdir},upperdir={},workdir={}",
        upper.display(),
        work.display()
    );

    mount(
        Some("overlay"),
        merged,
        Some("overlay"),
        MsFlags::empty(),
        Some(opts.as_str()),
    )
    .map_err(|e| VesselError::Command {
        program: "mount".into(),
        message: format!("overlay at {}: {e}", merged.display()),
    })?;

    tracing::info!(merged = %merged.display(), "overlayfs mounted");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — `OverlayFS` requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn mount_overlay(_lowerdir: &str, _upper: &Path, _work: &Path, _merged: &Path) -> Result<()> {
    Err(vessel_common::error::VesselError::config(
        "Linux required for native container operations",
    ))
}

/// Unmounts an overlay, tolerating busy targets via lazy detach.
///
/// # Errors
///
/// Returns an error when both ordinary and lazy unmount fail.
pub fn unmount_overlay(merged: &Path) -> Result<()> {
    super::mount::unmount(merged)
}
