//! Container lifecycle orchestration.
//!
//! The [`Engine`] owns every store and allocator and drives containers
//! through `created → running → {exited | stopped}`. Resource setup and
//! teardown are funneled through single code paths so an attached run,
//! a detached run, and a forced removal all build and release the same
//! things in the same order.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;

use vessel_common::constants;
use vessel_common::error::{Result, VesselError};
use vessel_common::types::{
    ContainerId, ContainerState, MountKind, MountSpec, NetworkMode, PortMapping, ResourceLimits,
};
use vessel_core::cgroup::{CgroupManager, MemoryStats};
use vessel_core::filesystem::mount as host_mount;
use vessel_core::namespace::LaunchSpec;
use vessel_core::network::ipam::IpAllocator;
use vessel_core::network::{bridge, port as portfwd, veth};
use vessel_image::compositor::OverlayMount;
use vessel_image::manifest::{ImageStore, ResolvedImage};
use vessel_image::store::LayerStore;

use crate::container::ContainerRecord;
use crate::exec::{self, ExecOutput};
use crate::logs;
use crate::ports::PortRegistry;
use crate::store::ContainerStore;
use crate::volume::VolumeStore;

/// Parameters for starting a new container.
#[derive(Debug, Clone, Default)]
pub struct RunConfig {
    /// Image reference to run.
    pub image: String,
    /// Command override; falls back to the image's configured command.
    pub command: Vec<String>,
    /// Optional container name; defaults to the short ID.
    pub name: Option<String>,
    /// Whether stdout/stderr are captured to a log file instead of
    /// inherited.
    pub detach: bool,
    /// Resource limits to enforce through cgroups.
    pub limits: ResourceLimits,
    /// Network attachment mode.
    pub network: NetworkMode,
    /// Bind and volume mounts.
    pub mounts: Vec<MountSpec>,
    /// Host-to-container port mappings (bridge mode only).
    pub ports: Vec<PortMapping>,
}

/// A started container together with its supervisor.
#[derive(Debug)]
pub struct RunningContainer {
    /// The persisted record, in the `running` state.
    pub record: ContainerRecord,
    /// Thread that reaps the init process and tears down its
    /// resources; yields the container's exit code.
    pub supervisor: thread::JoinHandle<i32>,
}

/// The container runtime engine.
#[derive(Clone)]
pub struct Engine {
    data_dir: PathBuf,
    containers: ContainerStore,
    images: ImageStore,
    layers: LayerStore,
    volumes: VolumeStore,
    ipam: Arc<IpAllocator>,
    port_registry: Arc<PortRegistry>,
}

impl Engine {
    /// Opens the engine over `data_dir`, creating the store layout on
    /// first use and re-seeding the address and port allocators from
    /// containers that are still running.
    ///
    /// # Errors
    ///
    /// Returns an error if any store directory cannot be created or the
    /// container records cannot be listed.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        let data_dir = data_dir.into();
        let engine = Self {
            containers: ContainerStore::open(constants::containers_dir(&data_dir))?,
            images: ImageStore::open(constants::images_dir(&data_dir))?,
            layers: LayerStore::open(constants::layers_dir(&data_dir))?,
            volumes: VolumeStore::open(constants::volumes_dir(&data_dir))?,
            ipam: Arc::new(IpAllocator::new()),
            port_registry: Arc::new(PortRegistry::new()),
            data_dir,
        };
        engine.seed_allocators()?;
        Ok(engine)
    }

    /// Opens the engine over the default data directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the store layout cannot be created.
    pub fn open_default() -> Result<Self> {
        Self::open(constants::data_dir())
    }

    /// Creates and starts a container, returning the running record and
    /// the supervisor handle. On any failure everything already built
    /// for the container is released before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be resolved, a requested
    /// port or address is unavailable, or any resource or launch step
    /// fails.
    pub fn run(&self, config: &RunConfig) -> Result<RunningContainer> {
        let resolved = self.images.resolve(&config.image, &self.layers)?;

        let command = if config.command.is_empty() {
            resolved.config.cmd.clone()
        } else {
            config.command.clone()
        };
        if command.is_empty() {
            return Err(VesselError::config(format!(
                "image '{}' has no command and none was given",
                config.image
            )));
        }

        let id = ContainerId::generate();
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| id.short().to_string());
        self.ensure_name_free(&name)?;

        let mut record = ContainerRecord::new(id.clone(), name, config.image.clone(), command);
        record.network_mode = config.network;
        record.mounts = config.mounts.clone();
        record.ports = config.ports.clone();
        self.containers.save(&record)?;
        tracing::info!(id = %record.id, image = %record.image, "created container");

        match self.start(&mut record, config, &resolved) {
            Ok(supervisor) => Ok(RunningContainer { record, supervisor }),
            Err(e) => {
                // Release whatever the failed start left behind and drop
                // the record so the name becomes reusable. A process
                // launched before the failure is reaped here.
                if record.is_running() {
                    let _ = signal_process(record.pid, KILL);
                    let _ = wait_for_exit(record.pid);
                }
                self.release_resources(&record);
                release_cgroup(&record.id);
                let _ = self.containers.remove(&record.id);
                Err(e)
            }
        }
    }

    /// Requests termination of a running container with SIGTERM.
    ///
    /// The record moves to `stopped` immediately; the supervisor owning
    /// the init process reaps it and releases its resources.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be resolved, is not
    /// running, or the signal cannot be delivered.
    pub fn stop(&self, reference: &str) -> Result<ContainerRecord> {
        let mut record = self.reconciled(self.containers.resolve(reference)?);
        if !record.is_running() {
            return Err(VesselError::config(format!(
                "container {} is not running",
                record.id
            )));
        }
        let pid = record.pid;
        record.mark_stopped()?;
        self.containers.save(&record)?;
        tracing::info!(id = %record.id, pid, "stopping container");

        signal_process(pid, TERM)?;
        Ok(record)
    }

    /// Removes a container and everything it owns: resources, log file,
    /// and the record itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be resolved, or if it
    /// is still running and `force` is false.
    pub fn remove(&self, reference: &str, force: bool) -> Result<ContainerRecord> {
        let record = self.reconciled(self.containers.resolve(reference)?);
        if record.is_running() {
            if !force {
                return Err(VesselError::config(format!(
                    "container {} is running; stop it first or use force",
                    record.id
                )));
            }
            let _ = signal_process(record.pid, TERM);
            let _ = signal_process(record.pid, KILL);
        }

        self.release_resources(&record);
        release_cgroup(&record.id);
        logs::remove_log(&self.logs_dir(), &record.id)?;
        self.containers.remove(&record.id)?;
        tracing::info!(id = %record.id, "removed container");
        Ok(record)
    }

    /// Lists all containers, newest first, with `running` records whose
    /// process has vanished reported as `exited`.
    ///
    /// # Errors
    ///
    /// Returns an error if the records cannot be listed.
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        Ok(self
            .containers
            .list()?
            .into_iter()
            .map(|r| self.reconciled(r))
            .collect())
    }

    /// Returns the captured output of a container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be resolved or its log
    /// cannot be read.
    pub fn logs(&self, reference: &str) -> Result<String> {
        let record = self.containers.resolve(reference)?;
        logs::read_logs(&self.logs_dir(), &record.id)
    }

    /// Executes a command inside a running container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is not running or the command
    /// cannot be executed.
    pub fn exec(&self, reference: &str, command: &[String]) -> Result<ExecOutput> {
        let record = self.reconciled(self.containers.resolve(reference)?);
        if !record.is_running() {
            return Err(VesselError::config(format!(
                "container {} is not running",
                record.id
            )));
        }
        exec::exec_in_container(&record.id, record.pid, command)
    }

    /// Reads memory usage for a running container from its cgroup.
    ///
    /// # Errors
    ///
    /// Returns an error if the container is not running or has no
    /// cgroup.
    pub fn stats(&self, reference: &str) -> Result<MemoryStats> {
        let record = self.reconciled(self.containers.resolve(reference)?);
        if !record.is_running() {
            return Err(VesselError::config(format!(
                "container {} is not running",
                record.id
            )));
        }
        let cgroup = CgroupManager::open(record.id.as_str());
        if !cgroup.exists() {
            return Err(VesselError::NotFound {
                kind: "cgroup",
                id: record.id.to_string(),
            });
        }
        cgroup.stats()
    }

    /// Returns the port mappings of a container.
    ///
    /// # Errors
    ///
    /// Returns an error if the container cannot be resolved.
    pub fn port_mappings(&self, reference: &str) -> Result<Vec<PortMapping>> {
        Ok(self.containers.resolve(reference)?.ports)
    }

    /// The volume store, for direct volume management commands.
    #[must_use]
    pub fn volumes(&self) -> &VolumeStore {
        &self.volumes
    }

    /// Removes a named volume, refusing while a running container
    /// mounts it.
    ///
    /// # Errors
    ///
    /// Returns an error if the volume does not exist or is still in use.
    pub fn remove_volume(&self, name: &str) -> Result<()> {
        for record in self.list()? {
            let in_use = record.is_running()
                && record
                    .mounts
                    .iter()
                    .any(|m| m.kind == MountKind::Volume && m.source == name);
            if in_use {
                return Err(VesselError::config(format!(
                    "volume {name} is in use by container {}",
                    record.id.short()
                )));
            }
        }
        self.volumes.remove(name)
    }

    /// The image store, for image listing and import commands.
    #[must_use]
    pub fn images(&self) -> &ImageStore {
        &self.images
    }

    /// The layer store backing the images.
    #[must_use]
    pub fn layers(&self) -> &LayerStore {
        &self.layers
    }

    /// Root data directory this engine operates on.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    // ---- start path ----

    /// Builds resources and launches the init process for `record`,
    /// then spawns the supervisor that reaps and tears it down.
    fn start(
        &self,
        record: &mut ContainerRecord,
        config: &RunConfig,
        resolved: &ResolvedImage,
    ) -> Result<thread::JoinHandle<i32>> {
        // Claim shared resources first so nothing on the host is
        // touched when a port or address is unavailable.
        if config.network == NetworkMode::Bridge {
            self.port_registry.reserve_all(&record.ports)?;
        } else if !record.ports.is_empty() {
            return Err(VesselError::config(
                "port mappings require bridge networking",
            ));
        }

        let ip = if config.network == NetworkMode::Bridge {
            bridge::setup()?;
            let ip = self.ipam.allocate()?;
            // Recorded before wiring, so a failed start still releases
            // the address through the record.
            record.ip_address = Some(self.ipam.cidr(ip));
            Some(ip)
        } else {
            None
        };

        let overlay = OverlayMount::create(
            &self.overlay_dir(),
            record.id.clone(),
            resolved.layer_paths.clone(),
        )?;
        self.attach_mounts(&overlay.merged_dir, &record.mounts)?;

        let cgroup = CgroupManager::create(record.id.as_str(), &config.limits)?;

        if config.detach {
            record.log_path = Some(logs::create_log(&self.logs_dir(), &record.id)?);
        }

        let spec = LaunchSpec {
            command: record.command.clone(),
            rootfs: overlay.merged_dir.clone(),
            cgroup_procs: cgroup.as_ref().map(CgroupManager::procs_path),
            isolate_network: config.network == NetworkMode::Bridge,
            env: launch_env(&resolved.config.env),
            working_dir: resolved.config.working_dir.clone(),
            hostname: record.id.short().to_string(),
            stdio_log: record.log_path.clone(),
        };
        let pid = vessel_core::namespace::launch(&spec)?;

        // Running is entered the moment a real process exists, before
        // any network wiring: a failure from here on concerns a live,
        // observable container, not a half-created record.
        record.mark_running(pid)?;
        self.containers.save(record)?;
        tracing::info!(id = %record.id, pid, "container running");

        if let Some(ip) = ip {
            let network = veth::connect(pid, ip, 24)?;
            record.veth_host = Some(network.veth_host);
            self.containers.save(record)?;
            for mapping in &record.ports {
                portfwd::forward(*mapping, ip)?;
            }
        }

        let engine = self.clone();
        let id = record.id.clone();
        let handle = thread::Builder::new()
            .name(format!("supervise-{}", id.short()))
            .spawn(move || engine.supervise(&id, pid))
            .map_err(|e| VesselError::io("thread", e))?;
        Ok(handle)
    }

    /// Reaps the init process and releases the container's resources.
    /// Runs on the supervisor thread.
    fn supervise(&self, id: &ContainerId, pid: u32) -> i32 {
        let exit_code = wait_for_exit(pid);
        tracing::info!(id = %id, pid, exit_code, "container exited");
        self.conclude(id, exit_code);
        exit_code
    }

    /// Final teardown after the init process is gone: releases port
    /// rules, network wiring, mounts and overlay, persists the final
    /// record, then removes the accounting group.
    fn conclude(&self, id: &ContainerId, exit_code: i32) {
        // Reload rather than trusting the starting snapshot: a stop
        // request may have moved the record to `stopped` meanwhile.
        match self.containers.load(id) {
            Ok(mut record) => {
                self.release_resources(&record);
                // A `stopped` record keeps its state; only a natural
                // exit records the code.
                if record.state == ContainerState::Running
                    && record.mark_exited(exit_code).is_ok()
                {
                    if let Err(e) = self.containers.save(&record) {
                        tracing::warn!(id = %id, error = %e, "failed to persist final state");
                    }
                }
                release_cgroup(&record.id);
            }
            Err(e) => {
                tracing::warn!(id = %id, error = %e, "container record vanished during teardown");
            }
        }
    }

    // ---- shared teardown ----

    /// Releases the host resources a container may hold, in reverse
    /// order of construction. Each step tolerates the resource already
    /// being gone, so this is safe to call on partial failures and on
    /// repeated removals. The accounting group is removed separately
    /// with [`release_cgroup`], after the caller has persisted the
    /// final record.
    fn release_resources(&self, record: &ContainerRecord) {
        if let Some(ip_cidr) = &record.ip_address {
            if let Some(ip) = parse_ip(ip_cidr) {
                for mapping in &record.ports {
                    portfwd::unforward(*mapping, ip);
                }
                self.ipam.release(ip);
            }
        }
        for mapping in &record.ports {
            self.port_registry.release(mapping.host_port);
        }
        if let Some(veth_host) = &record.veth_host {
            veth::disconnect(veth_host);
        }

        let overlay_root = self.overlay_dir();
        if OverlayMount::exists(&overlay_root, &record.id) {
            let overlay = OverlayMount::open(&overlay_root, record.id.clone());
            self.detach_mounts(&overlay.merged_dir, &record.mounts);
            overlay.cleanup(&overlay_root);
        }
    }

    // ---- helpers ----

    fn attach_mounts(&self, merged: &Path, mounts: &[MountSpec]) -> Result<()> {
        for spec in mounts {
            let source = match spec.kind {
                MountKind::Bind => PathBuf::from(&spec.source),
                MountKind::Volume => self.volumes.mountpoint(&spec.source)?,
            };
            let target = mount_target(merged, &spec.destination);
            std::fs::create_dir_all(&target).map_err(|e| VesselError::io(&target, e))?;
            host_mount::bind_mount(&source, &target, spec.read_only)?;
        }
        Ok(())
    }

    fn detach_mounts(&self, merged: &Path, mounts: &[MountSpec]) {
        // Reverse order, so nested mount points unwind cleanly.
        for spec in mounts.iter().rev() {
            let target = mount_target(merged, &spec.destination);
            if let Err(e) = host_mount::unmount(&target) {
                tracing::warn!(target = %target.display(), error = %e, "failed to unmount");
            }
        }
    }

    /// Marks a `running` record whose process no longer exists as
    /// `exited`, persisting the correction.
    fn reconciled(&self, mut record: ContainerRecord) -> ContainerRecord {
        if record.is_running() && !process_alive(record.pid) {
            tracing::warn!(id = %record.id, pid = record.pid, "running container has no process; marking exited");
            if record.mark_exited(-1).is_ok() {
                let _ = self.containers.save(&record);
            }
        }
        record
    }

    fn ensure_name_free(&self, name: &str) -> Result<()> {
        if self.containers.list()?.iter().any(|r| r.name == name) {
            return Err(VesselError::config(format!(
                "container name '{name}' is already in use"
            )));
        }
        Ok(())
    }

    fn seed_allocators(&self) -> Result<()> {
        for record in self.containers.list()? {
            if !record.is_running() || !process_alive(record.pid) {
                continue;
            }
            if let Some(ip) = record.ip_address.as_deref().and_then(parse_ip) {
                self.ipam.reserve(ip);
            }
            for mapping in &record.ports {
                self.port_registry.seed(mapping.host_port);
            }
        }
        Ok(())
    }

    fn overlay_dir(&self) -> PathBuf {
        constants::overlay_dir(&self.data_dir)
    }

    fn logs_dir(&self) -> PathBuf {
        constants::logs_dir(&self.data_dir)
    }
}

/// Maps an absolute in-container destination onto the merged rootfs.
fn mount_target(merged: &Path, destination: &str) -> PathBuf {
    merged.join(destination.trim_start_matches('/'))
}

/// Builds the child environment: the image's `K=V` pairs plus a sane
/// default `PATH` when the image does not set one.
fn launch_env(image_env: &[String]) -> Vec<(String, String)> {
    let mut env: Vec<(String, String)> = image_env
        .iter()
        .filter_map(|pair| {
            pair.split_once('=')
                .map(|(k, v)| (k.to_string(), v.to_string()))
        })
        .collect();
    if !env.iter().any(|(k, _)| k == "PATH") {
        env.push((
            "PATH".to_string(),
            "/usr/local/sbin:/usr/local/bin:/usr/sbin:/usr/bin:/sbin:/bin".to_string(),
        ));
    }
    env.push(("HOME".to_string(), "/root".to_string()));
    env
}

/// Removes a container's accounting group, if one exists. Kept apart
/// from [`Engine::release_resources`] so the final record is always
/// persisted before the group disappears.
fn release_cgroup(id: &ContainerId) {
    let cgroup = CgroupManager::open(id.as_str());
    if cgroup.exists() {
        cgroup.remove();
    }
}

fn parse_ip(ip_cidr: &str) -> Option<std::net::Ipv4Addr> {
    ip_cidr
        .split('/')
        .next()
        .and_then(|s| s.parse().ok())
}

#[cfg(unix)]
const TERM: nix::sys::signal::Signal = nix::sys::signal::Signal::SIGTERM;
#[cfg(unix)]
const KILL: nix::sys::signal::Signal = nix::sys::signal::Signal::SIGKILL;

#[cfg(unix)]
fn signal_process(pid: u32, signal: nix::sys::signal::Signal) -> Result<()> {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    kill(Pid::from_raw(pid_as_raw(pid)), signal).map_err(|e| VesselError::LaunchFailed {
        message: format!("failed to signal pid {pid}: {e}"),
    })
}

/// Blocks until the child exits and maps its status to a shell-style
/// exit code (`128 + signal` for signal deaths).
#[cfg(unix)]
fn wait_for_exit(pid: u32) -> i32 {
    use nix::sys::wait::{waitpid, WaitStatus};
    use nix::unistd::Pid;

    let target = Pid::from_raw(pid_as_raw(pid));
    loop {
        match waitpid(target, None) {
            Ok(WaitStatus::Exited(_, code)) => return code,
            Ok(WaitStatus::Signaled(_, signal, _)) => return 128 + signal as i32,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(pid, error = %e, "waitpid failed");
                return 1;
            }
        }
    }
}

#[cfg(unix)]
fn process_alive(pid: u32) -> bool {
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    pid != 0 && kill(Pid::from_raw(pid_as_raw(pid)), None).is_ok()
}

#[cfg(not(unix))]
const TERM: () = ();
#[cfg(not(unix))]
const KILL: () = ();

#[cfg(not(unix))]
fn signal_process(_pid: u32, _signal: ()) -> Result<()> {
    Err(VesselError::config("signaling requires a Unix host"))
}

#[cfg(not(unix))]
fn wait_for_exit(_pid: u32) -> i32 {
    1
}

#[cfg(not(unix))]
fn process_alive(_pid: u32) -> bool {
    false
}

#[cfg(unix)]
#[allow(clippy::cast_possible_wrap)]
fn pid_as_raw(pid: u32) -> i32 {
    pid as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_opens_store_layout() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::open(dir.path()).expect("open");
        assert!(constants::containers_dir(engine.data_dir()).is_dir());
        assert!(constants::images_dir(engine.data_dir()).is_dir());
        assert!(constants::layers_dir(engine.data_dir()).is_dir());
        assert!(constants::volumes_dir(engine.data_dir()).is_dir());
    }

    #[test]
    fn run_rejects_unknown_image() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::open(dir.path()).expect("open");
        let config = RunConfig {
            image: "missing".into(),
            command: vec!["/bin/true".into()],
            ..RunConfig::default()
        };
        let err = engine.run(&config).expect_err("unknown image");
        assert!(matches!(err, VesselError::NotFound { kind: "image", .. }));
    }

    #[test]
    fn stop_rejects_non_running_container() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::open(dir.path()).expect("open");
        let record = ContainerRecord::new(
            ContainerId::new("c1"),
            "idle".into(),
            "alpine".into(),
            vec!["/bin/true".into()],
        );
        engine.containers.save(&record).expect("save");
        assert!(engine.stop("c1").is_err());
    }

    #[test]
    fn list_reconciles_dead_running_containers() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::open(dir.path()).expect("open");

        let mut record = ContainerRecord::new(
            ContainerId::new("c2"),
            "ghost".into(),
            "alpine".into(),
            vec!["/bin/sleep".into()],
        );
        // A PID that cannot exist, so the record reads as stale.
        record.mark_running(u32::MAX / 2).expect("running");
        engine.containers.save(&record).expect("save");

        let listed = engine.list().expect("list");
        assert_eq!(listed[0].state, ContainerState::Exited);
        assert_eq!(listed[0].exit_code, -1);
        // The correction is persisted, not just reported.
        let reloaded = engine.containers.load(&record.id).expect("load");
        assert_eq!(reloaded.state, ContainerState::Exited);
    }

    #[test]
    fn remove_refuses_running_without_force() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::open(dir.path()).expect("open");

        let mut record = ContainerRecord::new(
            ContainerId::new("c3"),
            "busy".into(),
            "alpine".into(),
            vec!["/bin/sleep".into()],
        );
        record.mark_running(std::process::id()).expect("running");
        engine.containers.save(&record).expect("save");

        assert!(engine.remove("c3", false).is_err());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::open(dir.path()).expect("open");
        let record = ContainerRecord::new(
            ContainerId::new("c4"),
            "web".into(),
            "alpine".into(),
            vec!["/bin/true".into()],
        );
        engine.containers.save(&record).expect("save");
        assert!(engine.ensure_name_free("web").is_err());
        assert!(engine.ensure_name_free("db").is_ok());
    }

    #[test]
    #[cfg(unix)]
    fn running_container_is_stoppable_before_network_wiring() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::open(dir.path()).expect("open");

        // A record exactly as persisted right after launch: a live
        // process, no address or veth recorded yet.
        let mut child = std::process::Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("spawn");
        let mut record = ContainerRecord::new(
            ContainerId::new("c7"),
            "early".into(),
            "alpine".into(),
            vec!["/bin/sleep".into()],
        );
        record.mark_running(child.id()).expect("running");
        engine.containers.save(&record).expect("save");

        let stopped = engine.stop("c7").expect("stop");
        assert_eq!(stopped.state, ContainerState::Stopped);
        let _ = child.wait();
    }

    #[test]
    fn conclude_persists_exit_code_of_natural_exit() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::open(dir.path()).expect("open");

        let mut record = ContainerRecord::new(
            ContainerId::new("c8"),
            "done".into(),
            "alpine".into(),
            vec!["/bin/false".into()],
        );
        record.mark_running(u32::MAX / 2).expect("running");
        engine.containers.save(&record).expect("save");

        engine.conclude(&record.id, 7);
        let reloaded = engine.containers.load(&record.id).expect("load");
        assert_eq!(reloaded.state, ContainerState::Exited);
        assert_eq!(reloaded.exit_code, 7);
        assert_eq!(reloaded.pid, 0);
    }

    #[test]
    fn conclude_never_overwrites_an_explicit_stop() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::open(dir.path()).expect("open");

        let mut record = ContainerRecord::new(
            ContainerId::new("c9"),
            "halted".into(),
            "alpine".into(),
            vec!["/bin/sleep".into()],
        );
        record.mark_running(u32::MAX / 2).expect("running");
        record.mark_stopped().expect("stopped");
        engine.containers.save(&record).expect("save");

        engine.conclude(&record.id, 143);
        let reloaded = engine.containers.load(&record.id).expect("load");
        assert_eq!(reloaded.state, ContainerState::Stopped);
    }

    #[test]
    fn volume_removal_refused_while_mounted_by_running_container() {
        let dir = tempfile::tempdir().expect("tempdir");
        let engine = Engine::open(dir.path()).expect("open");
        let _ = engine.volumes().create("shared").expect("create");

        let mut record = ContainerRecord::new(
            ContainerId::new("c5"),
            "writer".into(),
            "alpine".into(),
            vec!["/bin/sleep".into()],
        );
        record.mounts = vec!["shared:/data".parse().expect("mount")];
        record.mark_running(std::process::id()).expect("running");
        engine.containers.save(&record).expect("save");

        assert!(engine.remove_volume("shared").is_err());
        // Exited containers free the volume.
        let mut record = engine.containers.load(&record.id).expect("load");
        record.mark_exited(0).expect("exited");
        engine.containers.save(&record).expect("save");
        assert!(engine.remove_volume("shared").is_ok());
        assert!(!engine.volumes().exists("shared"));
    }

    #[test]
    fn launch_env_fills_in_path_and_home() {
        let env = launch_env(&["FOO=bar".into()]);
        assert!(env.iter().any(|(k, v)| k == "FOO" && v == "bar"));
        assert!(env.iter().any(|(k, _)| k == "PATH"));
        assert!(env.iter().any(|(k, v)| k == "HOME" && v == "/root"));

        let env = launch_env(&["PATH=/custom".into()]);
        let paths: Vec<&str> = env
            .iter()
            .filter(|(k, _)| k == "PATH")
            .map(|(_, v)| v.as_str())
            .collect();
        assert_eq!(paths, vec!["/custom"]);
    }

    #[test]
    fn ip_cidr_parsing() {
        assert_eq!(
            parse_ip("172.30.0.7/24"),
            Some(std::net::Ipv4Addr::new(172, 30, 0, 7))
        );
        assert!(parse_ip("not-an-ip/24").is_none());
    }
}
