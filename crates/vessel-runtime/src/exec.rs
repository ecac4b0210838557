//! Namespace joining for executing commands in running containers.

use vessel_common::error::{Result, VesselError};
use vessel_common::types::ContainerId;

/// Output from an exec command.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    /// Standard output from the command.
    pub stdout: String,
    /// Standard error from the command.
    pub stderr: String,
    /// Exit code returned by the command.
    pub exit_code: i32,
}

/// Joins the namespaces of a running container and executes a command.
///
/// Uses `nsenter` to enter the target's mount, UTS, network, and PID
/// namespaces, with `--root` so the command sees the container's
/// chrooted filesystem rather than the host's.
///
/// # Errors
///
/// Returns an error if the command is empty or `nsenter` cannot be
/// spawned.
#[cfg(target_os = "linux")]
pub fn exec_in_container(id: &ContainerId, pid: u32, command: &[String]) -> Result<ExecOutput> {
    tracing::info!(id = %id, pid, cmd = ?command, "exec into container");

    if command.is_empty() {
        return Err(VesselError::config("exec command is empty"));
    }

    let output = std::process::Command::new("nsenter")
        .args([
            "--target",
            &pid.to_string(),
            "--mount",
            "--uts",
            "--net",
            "--pid",
            "--root",
            "--wd=/",
            "--",
        ])
        .args(command)
        .output()
        .map_err(|e| VesselError::io("nsenter", e))?;

    Ok(ExecOutput {
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        exit_code: output.status.code().unwrap_or(-1),
    })
}

/// Joins the namespaces of a running container and executes a command.
///
/// On non-Linux platforms, returns an error because namespace
/// operations require the Linux kernel.
///
/// # Errors
///
/// Always returns an error on non-Linux platforms.
#[cfg(not(target_os = "linux"))]
pub fn exec_in_container(_id: &ContainerId, _pid: u32, _command: &[String]) -> Result<ExecOutput> {
    Err(VesselError::config("exec requires Linux"))
}
