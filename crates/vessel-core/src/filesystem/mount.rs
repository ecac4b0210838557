//! Bind mounts and unmount helpers.

use std::path::Path;

use vessel_common::error::{Result, VesselError};

/// Bind-mounts `source` at `target`, optionally read-only.
///
/// The target directory is created if missing. Read-only binds need a
/// second remount because the kernel ignores `MS_RDONLY` on the initial
/// bind.
///
/// # Errors
///
/// Returns an error if the target cannot be created or a mount syscall
/// fails.
#[cfg(target_os = "linux")]
pub fn bind_mount(source: &Path, target: &Path, read_only: bool) -> Result<()> {
    use nix::mount::{MsFlags, mount};

    std::fs::create_dir_all(target).map_err(|e| VesselError::io(target, e))?;

    mount(
        Some(source),
        target,
        None::<&str>,
        MsFlags::MS_BIND,
        None::<&str>,
    )
    .map_err(|e| VesselError::Command {
        program: "mount".into(),
        message: format!("bind {} -> {}: {e}", source.display(), target.display()),
    })?;

    if read_only {
        mount(
            None::<&str>,
            target,
            None::<&str>,
            MsFlags::MS_BIND | MsFlags::MS_REMOUNT | MsFlags::MS_RDONLY,
            None::<&str>,
        )
        .map_err(|e| VesselError::Command {
            program: "mount".into(),
            message: format!("read-only remount of {}: {e}", target.display()),
        })?;
    }

    tracing::debug!(source = %source.display(), target = %target.display(), read_only, "bind mounted");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — bind mounting requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn bind_mount(_source: &Path, _target: &Path, _read_only: bool) -> Result<()> {
    Err(VesselError::config(
        "Linux required for native container operations",
    ))
}

/// Unmounts a path, falling back to a lazy detach when the ordinary
/// unmount is refused (target still busy).
///
/// # Errors
///
/// Returns an error only when both attempts fail.
#[cfg(target_os = "linux")]
pub fn unmount(target: &Path) -> Result<()> {
    use nix::mount::{MntFlags, umount, umount2};

    if umount(target).is_ok() {
        return Ok(());
    }
    umount2(target, MntFlags::MNT_DETACH).map_err(|e| VesselError::Command {
        program: "umount".into(),
        message: format!("{}: {e}", target.display()),
    })?;
    tracing::debug!(target = %target.display(), "lazy unmount used");
    Ok(())
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — unmounting requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn unmount(_target: &Path) -> Result<()> {
    Err(VesselError::config(
        "Linux required for native container operations",
    ))
}
