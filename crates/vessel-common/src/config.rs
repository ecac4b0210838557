//! Global configuration model for the Vessel runtime.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, VesselError};

/// Root configuration for the Vessel runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VesselConfig {
    /// Base directory for Vessel state and data.
    pub data_dir: PathBuf,
    /// Default resource limits applied when `run` passes none.
    pub default_limits: crate::types::ResourceLimits,
    /// Default network mode for new containers.
    pub default_network: crate::types::NetworkMode,
}

impl Default for VesselConfig {
    fn default() -> Self {
        Self {
            data_dir: crate::constants::data_dir().clone(),
            default_limits: crate::types::ResourceLimits::default(),
            default_network: crate::types::NetworkMode::Bridge,
        }
    }
}

impl VesselConfig {
    /// Loads the configuration from `path`, falling back to defaults
    /// when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or
    /// parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(|e| VesselError::io(path, e))?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Persists the configuration to `path` as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or write failure.
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| VesselError::io(path, e))
    }
}
