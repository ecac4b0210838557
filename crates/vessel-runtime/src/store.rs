//! JSON metadata store for container records.
//!
//! One file per container at `<root>/<id>.json`, written atomically via
//! a temp file rename so a crash mid-write never leaves a truncated
//! record behind.

use std::fs;
use std::path::{Path, PathBuf};

use vessel_common::error::{Result, VesselError};
use vessel_common::types::ContainerId;

use crate::container::ContainerRecord;

/// Directory-backed store of [`ContainerRecord`]s.
#[derive(Debug, Clone)]
pub struct ContainerStore {
    root: PathBuf,
}

impl ContainerStore {
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

    /// Persists `record`, replacing any previous version.
    ///
    /// # Errors
    ///
    /// Returns an error on serialization or filesystem failure.
    pub fn save(&self, record: &ContainerRecord) -> Result<()> {
        let path = self.record_path(&record.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&tmp, json).map_err(|e| VesselError::io(&tmp, e))?;
        fs::rename(&tmp, &path).map_err(|e| VesselError::io(&path, e))?;
        Ok(())
    }

    /// Loads the record for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::NotFound`] when no record exists.
    pub fn load(&self, id: &ContainerId) -> Result<ContainerRecord> {
        let path = self.record_path(id);
        if !path.exists() {
            return Err(VesselError::NotFound {
                kind: "container",
                id: id.to_string(),
            });
        }
        let json = fs::read_to_string(&path).map_err(|e| VesselError::io(&path, e))?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Lists all records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store directory cannot be read. Files
    /// that fail to parse are skipped.
    pub fn list(&self) -> Result<Vec<ContainerRecord>> {
        let mut records = Vec::new();
        let entries = fs::read_dir(&self.root).map_err(|e| VesselError::io(&self.root, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| VesselError::io(&self.root, e))?;
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            match fs::read_to_string(&path) {
                Ok(json) => match serde_json::from_str::<ContainerRecord>(&json) {
                    Ok(record) => records.push(record),
                    Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable container record"),
                },
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "skipping unreadable container record"),
            }
        }
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    /// Resolves a full ID, unique ID prefix, or exact name to a record.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::NotFound`] when nothing matches and
    /// [`VesselError::Ambiguous`] when a prefix matches more than one
    /// container.
    pub fn resolve(&self, reference: &str) -> Result<ContainerRecord> {
        let exact = ContainerId::new(reference);
        if self.record_path(&exact).exists() {
            return self.load(&exact);
        }

        let mut matches: Vec<ContainerRecord> = self
            .list()?
            .into_iter()
            .filter(|r| r.id.as_str().starts_with(reference) || r.name == reference)
            .collect();
        match matches.len() {
            0 => Err(VesselError::NotFound {
                kind: "container",
                id: reference.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            _ => Err(VesselError::Ambiguous {
                kind: "container",
                prefix: reference.to_string(),
            }),
        }
    }

    /// Deletes the record for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::NotFound`] when no record exists.
    pub fn remove(&self, id: &ContainerId) -> Result<()> {
        let path = self.record_path(id);
        if !path.exists() {
            return Err(VesselError::NotFound {
                kind: "container",
                id: id.to_string(),
            });
        }
        fs::remove_file(&path).map_err(|e| VesselError::io(&path, e))
    }

    /// Root directory of the store.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, id: &ContainerId) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vessel_common::types::ContainerState;

    fn record(id: &str, name: &str) -> ContainerRecord {
        ContainerRecord::new(
            ContainerId::new(id),
            name.into(),
            "alpine".into(),
            vec!["/bin/sh".into()],
        )
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ContainerStore::open(dir.path()).expect("open");

        let mut r = record("c100", "web");
        r.mark_running(42).expect("running");
        store.save(&r).expect("save");

        let loaded = store.load(&r.id).expect("load");
        assert_eq!(loaded.state, ContainerState::Running);
        assert_eq!(loaded.pid, 42);
        assert_eq!(loaded.name, "web");
    }

    #[test]
    fn load_missing_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ContainerStore::open(dir.path()).expect("open");
        let err = store.load(&ContainerId::new("c999")).expect_err("missing");
        assert!(matches!(err, VesselError::NotFound { kind: "container", .. }));
    }

    #[test]
    fn resolve_by_prefix_and_name() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ContainerStore::open(dir.path()).expect("open");
        store.save(&record("c17000001", "web")).expect("save");
        store.save(&record("c17000002", "db")).expect("save");

        assert_eq!(store.resolve("c17000001").expect("full").name, "web");
        assert_eq!(store.resolve("c17000002").expect("prefix").name, "db");
        assert_eq!(store.resolve("db").expect("name").name, "db");

        let err = store.resolve("c17").expect_err("ambiguous");
        assert!(matches!(err, VesselError::Ambiguous { .. }));
        let err = store.resolve("nope").expect_err("missing");
        assert!(matches!(err, VesselError::NotFound { .. }));
    }

    #[test]
    fn list_is_newest_first_and_remove_works() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = ContainerStore::open(dir.path()).expect("open");

        let mut older = record("c1", "older");
        older.created_at = "2026-01-01T00:00:00Z".into();
        let mut newer = record("c2", "newer");
        newer.created_at = "2026-02-01T00:00:00Z".into();
        store.save(&older).expect("save");
        store.save(&newer).expect("save");

        let all = store.list().expect("list");
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "newer");

        store.remove(&older.id).expect("remove");
        assert_eq!(store.list().expect("list").len(), 1);
        assert!(store.remove(&older.id).is_err());
    }
}
