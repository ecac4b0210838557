//! Namespace launcher: starts a process inside a fresh isolation domain.
//!
//! The launcher issues a direct `clone(2)` with new PID, mount, and UTS
//! namespaces (plus a network namespace when requested), so the child is a
//! member of every namespace from its first instruction and no shared
//! launch script or shell wrapper sits between the isolation boundary and
//! the user command.
//!
//! Inside the child, strictly in this order: join the pre-created
//! accounting group (first, so no user code ever runs unconstrained),
//! redirect stdio, set the hostname, switch the filesystem root, apply the
//! working directory, signal readiness on a pipe, and `execvpe` the user
//! command. The parent blocks only on the readiness byte, then returns the
//! child's PID without waiting for the command itself.

use std::path::PathBuf;

use vessel_common::error::{Result, VesselError};

/// Everything the launcher needs to start one isolated process.
#[derive(Debug, Clone)]
pub struct LaunchSpec {
    /// Command vector to execute; `command[0]` is resolved via `PATH`.
    pub command: Vec<String>,
    /// Prepared root filesystem the child is confined to.
    pub rootfs: PathBuf,
    /// `cgroup.procs` file of the pre-created accounting group, if any.
    pub cgroup_procs: Option<PathBuf>,
    /// Also unshare the network stack (bridge mode).
    pub isolate_network: bool,
    /// Environment of the child; the host environment is not inherited.
    pub env: Vec<(String, String)>,
    /// Working directory inside the rootfs; defaults to `/`.
    pub working_dir: Option<String>,
    /// Hostname inside the UTS namespace.
    pub hostname: String,
    /// Redirect the child's stdout/stderr to this file (detached mode).
    pub stdio_log: Option<PathBuf>,
}

/// Starts the isolated process and returns its PID on the host.
///
/// Returns as soon as the child has signalled readiness (namespaces
/// entered, cgroup joined, root switched); it does not wait for the user
/// command to finish.
///
/// # Errors
///
/// Returns [`VesselError::RootfsRequired`] when no rootfs path is given
/// and [`VesselError::LaunchFailed`] when the clone or the child-side
/// setup fails.
#[cfg(target_os = "linux")]
pub fn launch(spec: &LaunchSpec) -> Result<u32> {
    use std::io::Read;

    use nix::fcntl::OFlag;
    use nix::sched::{CloneFlags, clone};

    if spec.rootfs.as_os_str().is_empty() {
        return Err(VesselError::RootfsRequired);
    }
    if spec.command.is_empty() {
        return Err(VesselError::config("container command is empty"));
    }

    let mut flags = CloneFlags::CLONE_NEWPID | CloneFlags::CLONE_NEWNS | CloneFlags::CLONE_NEWUTS;
    if spec.isolate_network {
        flags |= CloneFlags::CLONE_NEWNET;
    }

    // Readiness handshake: the child writes one byte once it has joined
    // its cgroup and switched root; O_CLOEXEC closes the write end at exec
    // so a child that dies early yields EOF instead of a hang.
    let (ready_rx, ready_tx) = nix::unistd::pipe2(OFlag::O_CLOEXEC)
        .map_err(|e| VesselError::LaunchFailed {
            message: format!("readiness pipe: {e}"),
        })?;

    let mut stack = vec![0u8; 1024 * 1024];
    let cb = Box::new(|| child_main(spec, &ready_tx));

    // SAFETY: the child callback only touches memory owned by this call
    // frame (copied at clone time) and replaces itself via exec; the stack
    // buffer outlives the clone call.
    let pid = unsafe { clone(cb, &mut stack, flags, Some(libc::SIGCHLD)) }.map_err(|e| {
        VesselError::LaunchFailed {
            message: format!("clone: {e}"),
        }
    })?;
    drop(ready_tx);

    let mut byte = [0u8; 1];
    let mut rx = std::fs::File::from(ready_rx);
    let n = rx.read(&mut byte).map_err(|e| VesselError::LaunchFailed {
        message: format!("readiness read: {e}"),
    })?;
    if n == 0 {
        return Err(VesselError::LaunchFailed {
            message: "container process exited before signalling readiness".into(),
        });
    }

    tracing::info!(pid = pid.as_raw(), rootfs = %spec.rootfs.display(), "isolated process launched");
    #[allow(clippy::cast_sign_loss)]
    Ok(pid.as_raw() as u32)
}

/// Child-side setup; runs inside the fresh namespaces and never returns
/// on success.
#[cfg(target_os = "linux")]
fn child_main(spec: &LaunchSpec, ready_tx: &std::os::fd::OwnedFd) -> isize {
    match child_setup(spec, ready_tx) {
        Ok(never) => match never {},
        Err(e) => {
            // Stderr may already point at the log file; either way this is
            // the only channel left.
            eprintln!("vessel: container setup failed: {e}");
            127
        }
    }
}

#[cfg(target_os = "linux")]
fn child_setup(
    spec: &LaunchSpec,
    ready_tx: &std::os::fd::OwnedFd,
) -> Result<std::convert::Infallible> {
    use std::ffi::CString;
    use std::os::fd::AsRawFd;

    use nix::mount::MsFlags;

    let launch = |message: String| VesselError::LaunchFailed { message };

    // Join the accounting group before anything else; "0" moves the
    // writing process itself.
    if let Some(procs) = &spec.cgroup_procs {
        std::fs::write(procs, "0").map_err(|e| launch(format!("cgroup join: {e}")))?;
    }

    if let Some(log) = &spec.stdio_log {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log)
            .map_err(|e| launch(format!("log open: {e}")))?;
        // SAFETY: file holds a valid open descriptor; stdout/stderr are
        // always valid targets for dup2.
        unsafe {
            let _ = libc::dup2(file.as_raw_fd(), libc::STDOUT_FILENO);
            let _ = libc::dup2(file.as_raw_fd(), libc::STDERR_FILENO);
        }
        std::mem::forget(file);
    }

    nix::unistd::sethostname(&spec.hostname)
        .map_err(|e| launch(format!("sethostname: {e}")))?;

    // Keep the host mount table untouched by mount events in this
    // namespace.
    let _ = nix::mount::mount(
        None::<&str>,
        "/",
        None::<&str>,
        MsFlags::MS_REC | MsFlags::MS_PRIVATE,
        None::<&str>,
    );

    nix::unistd::chroot(&spec.rootfs).map_err(|e| launch(format!("chroot: {e}")))?;

    let workdir = spec.working_dir.as_deref().unwrap_or("/");
    nix::unistd::chdir(workdir).map_err(|e| launch(format!("chdir {workdir}: {e}")))?;

    let _ = std::fs::create_dir_all("/proc");
    let _ = nix::mount::mount(
        Some("proc"),
        "/proc",
        Some("proc"),
        MsFlags::empty(),
        None::<&str>,
    );

    nix::unistd::write(ready_tx, b"1").map_err(|e| launch(format!("readiness write: {e}")))?;

    let cstr = |s: &str| {
        CString::new(s).map_err(|_| launch(format!("NUL byte in argument: {s:?}")))
    };
    let argv = spec
        .command
        .iter()
        .map(|a| cstr(a))
        .collect::<Result<Vec<_>>>()?;
    let envp = spec
        .env
        .iter()
        .map(|(k, v)| cstr(&format!("{k}={v}")))
        .collect::<Result<Vec<_>>>()?;

    match nix::unistd::execvpe(&argv[0], &argv, &envp) {
        Ok(infallible) => match infallible {},
        Err(e) => Err(launch(format!("exec {:?}: {e}", spec.command[0]))),
    }
}

/// Stub for non-Linux platforms.
///
/// # Errors
///
/// Always returns an error — namespace isolation requires Linux.
#[cfg(not(target_os = "linux"))]
pub fn launch(_spec: &LaunchSpec) -> Result<u32> {
    Err(VesselError::config(
        "Linux required for native container operations",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> LaunchSpec {
        LaunchSpec {
            command: vec!["/bin/true".into()],
            rootfs: PathBuf::from("/tmp/rootfs"),
            cgroup_procs: None,
            isolate_network: false,
            env: Vec::new(),
            working_dir: None,
            hostname: "c1".into(),
            stdio_log: None,
        }
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn launch_without_rootfs_is_rejected() {
        let mut s = spec();
        s.rootfs = PathBuf::new();
        assert!(matches!(launch(&s), Err(VesselError::RootfsRequired)));
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn launch_without_command_is_rejected() {
        let mut s = spec();
        s.command.clear();
        assert!(matches!(launch(&s), Err(VesselError::Config { .. })));
    }
}
