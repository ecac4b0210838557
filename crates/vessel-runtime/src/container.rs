//! The container record and its state machine.
//!
//! A record is owned exclusively by the orchestrator and mutated only
//! through the transition methods below, never field-by-field from the
//! outside. Transitions move strictly forward:
//! `created → running → {exited | stopped}`.

use serde::{Deserialize, Serialize};
use vessel_common::error::{Result, VesselError};
use vessel_common::types::{ContainerId, ContainerState, MountSpec, NetworkMode, PortMapping};

/// Persisted record of one container.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContainerRecord {
    /// Unique time-derived identifier.
    pub id: ContainerId,
    /// Human-readable name.
    pub name: String,
    /// Source image reference.
    pub image: String,
    /// Command vector executed inside the container.
    pub command: Vec<String>,
    /// Current lifecycle state.
    pub state: ContainerState,
    /// PID of the init process; 0 when not running.
    pub pid: u32,
    /// Exit code observed at termination.
    pub exit_code: i32,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
    /// ISO-8601 start timestamp, set on entering `running`.
    pub started_at: Option<String>,
    /// ISO-8601 finish timestamp, set on entering `exited`.
    pub finished_at: Option<String>,
    /// Captured stdout/stderr, when the container runs detached.
    pub log_path: Option<std::path::PathBuf>,
    /// Network attachment mode.
    pub network_mode: NetworkMode,
    /// Assigned address with subnet prefix, while running in bridge mode.
    pub ip_address: Option<String>,
    /// Host end of the veth pair, while running in bridge mode.
    pub veth_host: Option<String>,
    /// Mounts attached at creation; immutable afterwards.
    pub mounts: Vec<MountSpec>,
    /// Port mappings requested at creation.
    pub ports: Vec<PortMapping>,
}

impl ContainerRecord {
    /// Creates a record in the `created` state.
    #[must_use]
    pub fn new(id: ContainerId, name: String, image: String, command: Vec<String>) -> Self {
        Self {
            id,
            name,
            image,
            command,
            state: ContainerState::Created,
            pid: 0,
            exit_code: 0,
            created_at: chrono::Utc::now().to_rfc3339(),
            started_at: None,
            finished_at: None,
            log_path: None,
            network_mode: NetworkMode::default(),
            ip_address: None,
            veth_host: None,
            mounts: Vec::new(),
            ports: Vec::new(),
        }
    }

    /// Transition `created → running` once a real process exists.
    ///
    /// # Errors
    ///
    /// Returns an error when the record is not in `created`.
    pub fn mark_running(&mut self, pid: u32) -> Result<()> {
        if self.state != ContainerState::Created {
            return Err(self.bad_transition(ContainerState::Running));
        }
        self.state = ContainerState::Running;
        self.pid = pid;
        self.started_at = Some(chrono::Utc::now().to_rfc3339());
        Ok(())
    }

    /// Transition `running → exited` when the process terminated on its
    /// own; clears the PID and network assignment.
    ///
    /// # Errors
    ///
    /// Returns an error when the record is not in `running`.
    pub fn mark_exited(&mut self, exit_code: i32) -> Result<()> {
        if self.state != ContainerState::Running {
            return Err(self.bad_transition(ContainerState::Exited));
        }
        self.state = ContainerState::Exited;
        self.exit_code = exit_code;
        self.pid = 0;
        self.ip_address = None;
        self.veth_host = None;
        self.finished_at = Some(chrono::Utc::now().to_rfc3339());
        Ok(())
    }

    /// Transition `running → stopped` on an explicit termination
    /// request; takes effect immediately, without waiting for the
    /// process to confirm exit.
    ///
    /// # Errors
    ///
    /// Returns an error when the record is not in `running`.
    pub fn mark_stopped(&mut self) -> Result<()> {
        if self.state != ContainerState::Running {
            return Err(self.bad_transition(ContainerState::Stopped));
        }
        self.state = ContainerState::Stopped;
        self.finished_at = Some(chrono::Utc::now().to_rfc3339());
        Ok(())
    }

    /// Returns whether the container is currently running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state == ContainerState::Running
    }

    fn bad_transition(&self, target: ContainerState) -> VesselError {
        VesselError::config(format!(
            "container {} cannot transition {} -> {target}",
            self.id, self.state
        ))
    }
}
