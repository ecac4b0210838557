//! Named volumes with host-side data directories.
//!
//! A volume lives at `<root>/<name>/` with its metadata in
//! `volume.json` and its writable payload under `_data/`. Containers
//! bind-mount the `_data` directory, so volume contents survive
//! container removal.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vessel_common::error::{Result, VesselError};

const METADATA_FILE: &str = "volume.json";
const DATA_DIR: &str = "_data";

/// Metadata describing one named volume.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Volume {
    /// Unique volume name.
    pub name: String,
    /// Host path of the writable data directory.
    pub mountpoint: PathBuf,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
    /// Storage driver; always `local`.
    pub driver: String,
}

/// Directory-backed store of named volumes.
#[derive(Debug, Clone)]
pub struct VolumeStore {
    root: PathBuf,
}

impl VolumeStore {
    /// Opens the store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| VesselError::io(&root, e))?;
        Ok(Self { root })
    }

    /// Creates a volume, or returns the existing one when the name is
    /// already taken.
    ///
    /// # Errors
    ///
    /// Returns an error when the name is empty or contains a path
    /// separator, or on filesystem failure.
    pub fn create(&self, name: &str) -> Result<Volume> {
        if name.is_empty() || name.contains('/') {
            return Err(VesselError::config(format!("invalid volume name '{name}'")));
        }
        if self.exists(name) {
            return self.get(name);
        }

        let data = self.root.join(name).join(DATA_DIR);
        fs::create_dir_all(&data).map_err(|e| VesselError::io(&data, e))?;
        let volume = Volume {
            name: name.to_string(),
            mountpoint: data,
            created_at: chrono::Utc::now().to_rfc3339(),
            driver: "local".to_string(),
        };
        let meta = self.metadata_path(name);
        let json = serde_json::to_string_pretty(&volume)?;
        fs::write(&meta, json).map_err(|e| VesselError::io(&meta, e))?;
        tracing::info!(name, "created volume");
        Ok(volume)
    }

    /// Loads the metadata for `name`.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::NotFound`] when no such volume exists.
    pub fn get(&self, name: &str) -> Result<Volume> {
        let meta = self.metadata_path(name);
        if !meta.exists() {
            return Err(VesselError::NotFound {
                kind: "volume",
                id: name.to_string(),
            });
        }
        let json = fs::read_to_string(&meta).map_err(|e| VesselError::io(&meta, e))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Returns whether a volume named `name` exists.
    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.metadata_path(name).exists()
    }

    /// Lists all volumes sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the store directory cannot be read.
    pub fn list(&self) -> Result<Vec<Volume>> {
        let mut volumes = Vec::new();
        let entries = fs::read_dir(&self.root).map_err(|e| VesselError::io(&self.root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| VesselError::io(&self.root, e))?;
            let name = entry.file_name();
            if let Some(name) = name.to_str() {
                if self.exists(name) {
                    volumes.push(self.get(name)?);
                }
            }
        }
        volumes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(volumes)
    }

    /// Deletes the volume and all of its data.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::NotFound`] when no such volume exists.
    pub fn remove(&self, name: &str) -> Result<()> {
        if !self.exists(name) {
            return Err(VesselError::NotFound {
                kind: "volume",
                id: name.to_string(),
            });
        }
        let dir = self.root.join(name);
        fs::remove_dir_all(&dir).map_err(|e| VesselError::io(&dir, e))?;
        tracing::info!(name, "removed volume");
        Ok(())
    }

    /// Returns the writable data directory for `name`, creating the
    /// volume on first use.
    ///
    /// # Errors
    ///
    /// Returns an error on volume creation failure.
    pub fn mountpoint(&self, name: &str) -> Result<PathBuf> {
        Ok(self.create(name)?.mountpoint)
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn metadata_path(&self, name: &str) -> PathBuf {
        self.root.join(name).join(METADATA_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_and_mountpoint() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = VolumeStore::open(dir.path()).expect("open");

        let v = store.create("data").expect("create");
        assert_eq!(v.name, "data");
        assert_eq!(v.driver, "local");
        assert!(v.mountpoint.is_dir());
        assert!(v.mountpoint.ends_with("data/_data"));

        let again = store.create("data").expect("idempotent");
        assert_eq!(again.created_at, v.created_at);
        assert_eq!(store.mountpoint("data").expect("mountpoint"), v.mountpoint);
    }

    #[test]
    fn invalid_names_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = VolumeStore::open(dir.path()).expect("open");
        assert!(store.create("").is_err());
        assert!(store.create("a/b").is_err());
    }

    #[test]
    fn list_and_remove() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = VolumeStore::open(dir.path()).expect("open");
        store.create("beta").expect("create");
        store.create("alpha").expect("create");

        let names: Vec<String> = store
            .list()
            .expect("list")
            .into_iter()
            .map(|v| v.name)
            .collect();
        assert_eq!(names, vec!["alpha", "beta"]);

        store.remove("alpha").expect("remove");
        assert!(!store.exists("alpha"));
        assert!(store.remove("alpha").is_err());
        assert_eq!(store.list().expect("list").len(), 1);
    }
}
