//! Filesystem control surface: bind mounts and the overlay union mount.

pub mod mount;
pub mod overlayfs;
