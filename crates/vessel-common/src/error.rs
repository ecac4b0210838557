//! Unified error types for the Vessel workspace.
//!
//! Library crates return [`VesselError`] everywhere; the CLI converts it
//! into `anyhow` at the boundary and exits non-zero.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type shared across the workspace.
#[derive(Debug, Error)]
pub enum VesselError {
    /// An I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// Path where the I/O error occurred.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// A configuration value is invalid.
    #[error("invalid configuration: {message}")]
    Config {
        /// Description of the invalid configuration.
        message: String,
    },

    /// A required resource was not found.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Type of the missing resource.
        kind: &'static str,
        /// Identifier of the missing resource.
        id: String,
    },

    /// An identifier prefix matched more than one resource.
    #[error("{kind} prefix is ambiguous: {prefix}")]
    Ambiguous {
        /// Type of the resource being looked up.
        kind: &'static str,
        /// Prefix that matched multiple resources.
        prefix: String,
    },

    /// A container launch was requested without a prepared rootfs.
    #[error("cannot launch container: no rootfs path given")]
    RootfsRequired,

    /// The isolated process could not be started.
    #[error("launching isolated process failed: {message}")]
    LaunchFailed {
        /// Underlying OS error description.
        message: String,
    },

    /// Network isolation was requested but the target process is still in
    /// the host network namespace.
    #[error("process {pid} is still in the host network namespace; network isolation was not applied")]
    NetworkIsolationNotApplied {
        /// PID of the process that failed verification.
        pid: u32,
    },

    /// A requested host port is outside the valid range or already bound.
    #[error("host port {port} is unavailable")]
    PortUnavailable {
        /// The rejected host port.
        port: u16,
    },

    /// An external control command (`ip`, `iptables`, `sysctl`) failed.
    #[error("`{program}` failed: {message}")]
    Command {
        /// Program that was invoked.
        program: String,
        /// Captured failure output.
        message: String,
    },

    /// Serialization or deserialization failed.
    #[error("serialization error: {source}")]
    Serialization {
        /// Underlying serialization error.
        #[from]
        source: serde_json::Error,
    },
}

/// Convenience alias used throughout the workspace.
pub type Result<T> = std::result::Result<T, VesselError>;

impl VesselError {
    /// Wraps an I/O error with the path it occurred at.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Builds a configuration error from a message.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
