//! Layer metadata model.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use vessel_common::types::LayerId;

/// An immutable, content-addressed filesystem snapshot.
///
/// Identity *is* the content hash: creating a layer from identical
/// content always yields the same record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    /// Content-addressed identifier.
    pub id: LayerId,
    /// Parent layer, when this layer was built on top of another.
    /// Chains are only ever built by appending, so no cycles can occur.
    pub parent_id: Option<LayerId>,
    /// Total bytes of regular-file content.
    pub size_bytes: u64,
    /// ISO-8601 creation timestamp.
    pub created_at: String,
    /// Command or action that produced this layer.
    pub created_by: String,
    /// Free-form provenance text.
    pub comment: String,
}

/// A layer together with its on-disk location in the store.
#[derive(Debug, Clone)]
pub struct StoredLayer {
    /// The layer record.
    pub layer: Layer,
    /// Directory holding the layer's content.
    pub path: PathBuf,
}
