//! Image manifests and the image catalog.
//!
//! An image is either *layered* — a manifest naming its layers in
//! creation order (bottom to top) plus runtime defaults — or a *plain*
//! directory image carrying a `rootfs/` tree directly. Both kinds
//! resolve to an ordered list of lower-dir paths for the compositor.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use vessel_common::error::{Result, VesselError};
use vessel_common::types::LayerId;

use crate::store::LayerStore;

const MANIFEST_FILE: &str = "manifest.json";
const PLAIN_ROOTFS_DIR: &str = "rootfs";

/// Runtime defaults baked into an image.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Default command when `run` passes none.
    #[serde(default)]
    pub cmd: Vec<String>,
    /// Default environment variables (`KEY=VALUE`).
    #[serde(default)]
    pub env: Vec<String>,
    /// Default working directory.
    #[serde(default)]
    pub working_dir: Option<String>,
}

/// Manifest of a layered image.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageManifest {
    /// Image name.
    pub name: String,
    /// Image tag.
    pub tag: String,
    /// Layer identifiers in creation order, bottom to top.
    pub layers: Vec<LayerId>,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
    /// Runtime defaults.
    #[serde(default)]
    pub config: ImageConfig,
    /// Total size of all layers in bytes.
    pub size_bytes: u64,
}

/// An image resolved to something the compositor can mount.
#[derive(Debug, Clone)]
pub struct ResolvedImage {
    /// Lower-dir paths in creation order (bottom to top).
    pub layer_paths: Vec<PathBuf>,
    /// Runtime defaults, when the image carries a manifest.
    pub config: ImageConfig,
}

/// One row of the image catalog listing.
#[derive(Debug, Clone)]
pub struct ImageSummary {
    /// Image name.
    pub name: String,
    /// Number of layers (1 for plain images).
    pub layers: usize,
    /// Whether the image is layered or a plain rootfs directory.
    pub layered: bool,
    /// Total size in bytes, when known.
    pub size_bytes: Option<u64>,
}

/// On-disk image catalog.
#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    /// Opens (or initializes) the catalog at the given root.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be created.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root).map_err(|e| VesselError::io(&root, e))?;
        Ok(Self { root })
    }

    /// Persists a manifest for a layered image.
    ///
    /// # Errors
    ///
    /// Returns an error if the manifest cannot be written.
    pub fn save_manifest(&self, manifest: &ImageManifest) -> Result<()> {
        let dir = self.root.join(&manifest.name);
        std::fs::create_dir_all(&dir).map_err(|e| VesselError::io(&dir, e))?;
        let path = dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(manifest)?;
        std::fs::write(&path, json).map_err(|e| VesselError::io(&path, e))?;
        tracing::info!(name = %manifest.name, layers = manifest.layers.len(), "image manifest saved");
        Ok(())
    }

    /// Loads the manifest of a layered image.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::NotFound`] when the image has no manifest.
    pub fn manifest(&self, name: &str) -> Result<ImageManifest> {
        let path = self.root.join(name).join(MANIFEST_FILE);
        let raw = std::fs::read_to_string(&path).map_err(|_| VesselError::NotFound {
            kind: "image",
            id: name.to_string(),
        })?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Resolves an image name to lower-dir paths and runtime defaults.
    ///
    /// Layered images resolve through the layer store; plain images
    /// resolve to their single `rootfs/` directory.
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::NotFound`] for unknown images or missing
    /// layers.
    pub fn resolve(&self, name: &str, layers: &LayerStore) -> Result<ResolvedImage> {
        if let Ok(manifest) = self.manifest(name) {
            let mut layer_paths = Vec::with_capacity(manifest.layers.len());
            for id in &manifest.layers {
                layer_paths.push(layers.get(id)?.path);
            }
            if layer_paths.is_empty() {
                return Err(VesselError::config(format!("image {name} has no layers")));
            }
            return Ok(ResolvedImage {
                layer_paths,
                config: manifest.config,
            });
        }

        let plain = self.root.join(name).join(PLAIN_ROOTFS_DIR);
        if plain.is_dir() {
            return Ok(ResolvedImage {
                layer_paths: vec![plain],
                config: ImageConfig::default(),
            });
        }

        Err(VesselError::NotFound {
            kind: "image",
            id: name.to_string(),
        })
    }

    /// Lists every image in the catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog root cannot be read.
    pub fn list(&self) -> Result<Vec<ImageSummary>> {
        let mut images = Vec::new();
        for entry in std::fs::read_dir(&self.root).map_err(|e| VesselError::io(&self.root, e))? {
            let entry = entry.map_err(|e| VesselError::io(&self.root, e))?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Ok(manifest) = self.manifest(&name) {
                images.push(ImageSummary {
                    name,
                    layers: manifest.layers.len(),
                    layered: true,
                    size_bytes: Some(manifest.size_bytes),
                });
            } else if entry.path().join(PLAIN_ROOTFS_DIR).is_dir() {
                images.push(ImageSummary {
                    name,
                    layers: 1,
                    layered: false,
                    size_bytes: None,
                });
            }
        }
        images.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(images)
    }

    /// Removes an image from the catalog (layers are not touched).
    ///
    /// # Errors
    ///
    /// Returns [`VesselError::NotFound`] for unknown images.
    pub fn remove(&self, name: &str) -> Result<()> {
        let dir = self.root.join(name);
        if !dir.exists() {
            return Err(VesselError::NotFound {
                kind: "image",
                id: name.to_string(),
            });
        }
        std::fs::remove_dir_all(&dir).map_err(|e| VesselError::io(&dir, e))
    }

    /// Returns the catalog root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stores() -> (tempfile::TempDir, ImageStore, LayerStore) {
        let dir = tempfile::tempdir().expect("tempdir");
        let images = ImageStore::open(dir.path().join("images")).expect("images");
        let layers = LayerStore::open(dir.path().join("layers")).expect("layers");
        (dir, images, layers)
    }

    fn make_layer(layers: &LayerStore, contents: &str) -> crate::layer::Layer {
        let src = tempfile::tempdir().expect("tempdir");
        std::fs::write(src.path().join("data"), contents).expect("write");
        layers.create_layer(src.path(), None, "test", "").expect("layer")
    }

    #[test]
    fn layered_image_resolves_in_creation_order() {
        let (_dir, images, layers) = stores();
        let base = make_layer(&layers, "base");
        let top = make_layer(&layers, "top");

        images
            .save_manifest(&ImageManifest {
                name: "app".into(),
                tag: "latest".into(),
                layers: vec![base.id.clone(), top.id.clone()],
                created_at: chrono::Utc::now().to_rfc3339(),
                config: ImageConfig::default(),
                size_bytes: base.size_bytes + top.size_bytes,
            })
            .expect("save");

        let resolved = images.resolve("app", &layers).expect("resolve");
        assert_eq!(
            resolved.layer_paths,
            vec![layers.content_path(&base.id), layers.content_path(&top.id)]
        );
    }

    #[test]
    fn plain_rootfs_image_resolves_to_single_path() {
        let (_dir, images, layers) = stores();
        let rootfs = images.root().join("plain").join("rootfs");
        std::fs::create_dir_all(&rootfs).expect("mkdir");

        let resolved = images.resolve("plain", &layers).expect("resolve");
        assert_eq!(resolved.layer_paths, vec![rootfs]);
        assert_eq!(resolved.config, ImageConfig::default());
    }

    #[test]
    fn unknown_image_is_not_found() {
        let (_dir, images, layers) = stores();
        assert!(matches!(
            images.resolve("ghost", &layers),
            Err(VesselError::NotFound { .. })
        ));
    }

    #[test]
    fn missing_layer_fails_resolution() {
        let (_dir, images, layers) = stores();
        let id = LayerId::from_hex("a".repeat(64)).expect("id");
        images
            .save_manifest(&ImageManifest {
                name: "broken".into(),
                tag: "latest".into(),
                layers: vec![id],
                created_at: chrono::Utc::now().to_rfc3339(),
                config: ImageConfig::default(),
                size_bytes: 0,
            })
            .expect("save");
        assert!(images.resolve("broken", &layers).is_err());
    }

    #[test]
    fn list_reports_layered_flag() {
        let (_dir, images, layers) = stores();
        let layer = make_layer(&layers, "x");
        images
            .save_manifest(&ImageManifest {
                name: "layered".into(),
                tag: "latest".into(),
                layers: vec![layer.id],
                created_at: chrono::Utc::now().to_rfc3339(),
                config: ImageConfig::default(),
                size_bytes: layer.size_bytes,
            })
            .expect("save");
        std::fs::create_dir_all(images.root().join("plain").join("rootfs")).expect("mkdir");

        let listing = images.list().expect("list");
        assert_eq!(listing.len(), 2);
        assert!(listing.iter().any(|i| i.name == "layered" && i.layered));
        assert!(listing.iter().any(|i| i.name == "plain" && !i.layered));
    }

    #[test]
    fn manifest_config_roundtrips() {
        let (_dir, images, _layers) = stores();
        let config = ImageConfig {
            cmd: vec!["/bin/server".into()],
            env: vec!["PORT=80".into()],
            working_dir: Some("/srv".into()),
        };
        images
            .save_manifest(&ImageManifest {
                name: "svc".into(),
                tag: "v1".into(),
                layers: Vec::new(),
                created_at: chrono::Utc::now().to_rfc3339(),
                config: config.clone(),
                size_bytes: 0,
            })
            .expect("save");
        assert_eq!(images.manifest("svc").expect("manifest").config, config);
    }
}
