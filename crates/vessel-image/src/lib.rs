//! # vessel-image
//!
//! Content-addressed filesystem layers and their composition into
//! container root filesystems: the deterministic tree hasher, the layer
//! store, image manifests, and the overlay compositor.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod compositor;
pub mod hash;
pub mod layer;
pub mod manifest;
pub mod store;
