//! Content-addressed layer store.
//!
//! Layers live at `<root>/<layer-id>/`, each holding a `metadata.json`
//! and a `content/` directory with the snapshot itself. Creation copies
//! the source tree — the caller's directory stays usable — and is a
//! no-op when a layer with the same content hash already exists.

use std::path::{Path, PathBuf};

use vessel_common::error::{Result, VesselError};
use vessel_common::types::LayerId;

use crate::hash;
use crate::layer::{Layer, StoredLayer};

const METADATA_FILE: &str = "metadata.json";
const CONTENT_DIR: &str = "content";

/// On-disk layer store.
#[derive(Debug, Clone)]
pub struct LayerStore {
    root: PathBuf,
}

impl LayerStore {
    /// Opens (or initializes) the store at the given root.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| VesselError::io(&root, e))?;
        Ok(Self { root })
    }

    /// Creates a layer from a directory tree.
    ///
    /// The tree is hashed first; when a layer with that identifier
    /// already exists its stored record is returned unchanged
    /// (deduplication). Otherwise the content is copied into the store
    /// and a metadata record written.
    ///
    /// # Errors
    ///
    /// Returns an error if hashing, copying, or metadata persistence
    /// fails.
    pub fn create_layer(
        &self,
        source: &Path,
        parent_id: Option<LayerId>,
        created_by: &str,
        comment: &str,
    ) -> Result<Layer> {
        let id = hash::hash_tree(source)?;

        if let Ok(existing) = self.get(&id) {
            tracing::debug!(id = %id, "layer content already stored");
            return Ok(existing.layer);
        }

        let layer = Layer {
            id: id.clone(),
            parent_id,
            size_bytes: hash::tree_size(source)?,
            created_at: chrono::Utc::now().to_rfc3339(),
            created_by: created_by.to_string(),
            comment: comment.to_string(),
        };

        let layer_dir = self.root.join(id.as_str());
        let content_dir = layer_dir.join(CONTENT_DIR);
        std::fs::create_dir_all(&content_dir).map_err(|e| VesselError::io(&content_dir, e))?;
        copy_tree(source, &content_dir)?;

        let metadata_path = layer_dir.join(METADATA_FILE);
        let json = serde_json::to_string_pretty(&layer)?;
        std::fs::write(&metadata_path, json).map_err(|e| VesselError::io(&metadata_path, e))?;

        tracing::info!(id = %layer.id, size = layer.size_bytes, "layer created");
        Ok(layer)
    }

    /// Imports a `.tar` / `.tar.gz` archive as a layer.
    ///
    /// The archive is unpacked into a staging directory first so the
    /// resulting identifier hashes the extracted tree, not the archive
    /// bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if extraction or layer creation fails.
    pub fn import_archive(&self, archive: &Path, created_by: &str) -> Result<Layer> {
        let staging = tempfile::tempdir().map_err(|e| VesselError::io(archive, e))?;
        let file = std::fs::File::open(archive).map_err(|e| VesselError::io(archive, e))?;

        if is_gzip_archive(archive) {
            let decoder = flate2::read::GzDecoder::new(file);
            tar::Archive::new(decoder)
                .unpack(staging.path())
                .map_err(|e| VesselError::io(archive, e))?;
        } else {
            tar::Archive::new(file)
                .unpack(staging.path())
                .map_err(|e| VesselError::io(archive, e))?;
        }

        self.create_layer(
            staging.path(),
            None,
            created_by,
            &format!("imported from {}", archive.display()),
        )
    }

    /// Looks up a layer by its full identifier.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::NotFound`] when no such layer exists.
    pub fn get(&self, id: &LayerId) -> Result<StoredLayer> {
        let layer_dir = self.root.join(id.as_str());
        let metadata_path = layer_dir.join(METADATA_FILE);
        let raw = std::fs::read_to_string(&metadata_path).map_err(|_| VesselError::NotFound {
            kind: "layer",
            id: id.to_string(),
        })?;
        let layer: Layer = serde_json::from_str(&raw)?;
        Ok(StoredLayer {
            layer,
            path: layer_dir.join(CONTENT_DIR),
        })
    }

    /// Looks up a layer by full identifier or unambiguous prefix.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::NotFound`] on zero matches and
    /// [`VesselError::Ambiguous`] on more than one.
    pub fn resolve(&self, id_or_prefix: &str) -> Result<StoredLayer> {
        if let Ok(id) = LayerId::from_hex(id_or_prefix) {
            return self.get(&id);
        }

        let mut matches: Vec<StoredLayer> = self
            .list()?
            .into_iter()
            .filter(|l| l.layer.id.as_str().starts_with(id_or_prefix))
            .collect();
        match matches.len() {
            0 => Err(VesselError::NotFound {
                kind: "layer",
                id: id_or_prefix.to_string(),
            }),
            1 => Ok(matches.remove(0)),
            _ => Err(VesselError::Ambiguous {
                kind: "layer",
                prefix: id_or_prefix.to_string(),
            }),
        }
    }

    /// Returns every stored layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the store root cannot be read.
    pub fn list(&self) -> Result<Vec<StoredLayer>> {
        let mut layers = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(|e| VesselError::io(&self.root, e))? {
            let entry = entry.map_err(|e| VesselError::io(&self.root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let Ok(id) = LayerId::from_hex(entry.file_name().to_string_lossy()) else {
                continue;
            };
            if let Ok(stored) = self.get(&id) {
                layers.push(stored);
            }
        }
        layers.sort_by(|a, b| a.layer.created_at.cmp(&b.layer.created_at));
        Ok(layers)
    }

    /// Deletes a layer's content and metadata.
    ///
    /// # Errors
    ///
    /// Returns an error if the layer directory cannot be removed.
    pub fn remove(&self, id: &LayerId) -> Result<()> {
        let layer_dir = self.root.join(id.as_str());
        std::fs::remove_dir_all(&layer_dir).map_err(|e| VesselError::io(&layer_dir, e))?;
        tracing::info!(id = %id, "layer removed");
        Ok(())
    }

    /// Returns the content directory of a layer without checking metadata.
    #[must_use]
    pub fn content_path(&self, id: &LayerId) -> PathBuf {
        self.root.join(id.as_str()).join(CONTENT_DIR)
    }
}

/// Recursively copies a tree, preserving symlinks and file permissions.
fn copy_tree(source: &Path, dest: &Path) -> Result<()> {
    for entry in std::fs::read_dir(source).map_err(|e| VesselError::io(source, e))? {
        let entry = entry.map_err(|e| VesselError::io(source, e))?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let file_type = entry.file_type().map_err(|e| VesselError::io(&from, e))?;

        if file_type.is_symlink() {
            let target = std::fs::read_link(&from).map_err(|e| VesselError::io(&from, e))?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(&target, &to).map_err(|e| VesselError::io(&to, e))?;
        } else if file_type.is_dir() {
            std::fs::create_dir_all(&to).map_err(|e| VesselError::io(&to, e))?;
            copy_tree(&from, &to)?;
        } else if file_type.is_file() {
            let _ = std::fs::copy(&from, &to).map_err(|e| VesselError::io(&to, e))?;
        }
        // Device nodes and sockets are skipped; base images for this
        // runtime do not carry them.
    }
    Ok(())
}

fn is_gzip_archive(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz") || ext.eq_ignore_ascii_case("tgz"))
}
