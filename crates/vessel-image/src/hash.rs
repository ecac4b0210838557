//! Deterministic content hashing of directory trees.
//!
//! A layer's identity is the SHA-256 digest over its entries walked in
//! sorted relative-path order. Each entry contributes its relative path,
//! a file-type tag, and — for regular files — its byte content; symlinks
//! contribute their target instead. The type tag keeps trees with
//! identical paths but different file types from colliding.

use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use vessel_common::error::{Result, VesselError};
use vessel_common::types::LayerId;

/// File-type tags mixed into the digest.
const TAG_FILE: &[u8] = b"f";
const TAG_DIR: &[u8] = b"d";
const TAG_SYMLINK: &[u8] = b"l";
const TAG_OTHER: &[u8] = b"o";

/// Computes the content-addressed identifier of a directory tree.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked or a file cannot be
/// read.
pub fn hash_tree(root: &Path) -> Result<LayerId> {
    let mut hasher = Sha256::new();
    let mut entries = Vec::new();
    collect(root, root, &mut entries)?;
    entries.sort();

    for rel in &entries {
        let full = root.join(rel);
        let meta = std::fs::symlink_metadata(&full).map_err(|e| VesselError::io(&full, e))?;

        hasher.update(rel.to_string_lossy().as_bytes());
        let file_type = meta.file_type();
        if file_type.is_symlink() {
            hasher.update(TAG_SYMLINK);
            let target = std::fs::read_link(&full).map_err(|e| VesselError::io(&full, e))?;
            hasher.update(target.to_string_lossy().as_bytes());
        } else if file_type.is_dir() {
            hasher.update(TAG_DIR);
        } else if file_type.is_file() {
            hasher.update(TAG_FILE);
            hash_file_contents(&full, &mut hasher)?;
        } else {
            hasher.update(TAG_OTHER);
        }
    }

    let digest = hasher.finalize();
    LayerId::from_hex(hex_encode(&digest))
}

fn hash_file_contents(path: &Path, hasher: &mut Sha256) -> Result<()> {
    let mut file = std::fs::File::open(path).map_err(|e| VesselError::io(path, e))?;
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf).map_err(|e| VesselError::io(path, e))?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(())
}

fn collect(root: &Path, dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    for entry in std::fs::read_dir(dir).map_err(|e| VesselError::io(dir, e))? {
        let entry = entry.map_err(|e| VesselError::io(dir, e))?;
        let path = entry.path();
        if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_path_buf());
        }
        // Do not follow symlinked directories.
        if path.is_dir() && !entry.file_type().map(|t| t.is_symlink()).unwrap_or(false) {
            collect(root, &path, out)?;
        }
    }
    Ok(())
}

/// Sums the byte sizes of all regular files under a directory.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked.
pub fn tree_size(root: &Path) -> Result<u64> {
    let mut entries = Vec::new();
    collect(root, root, &mut entries)?;
    let mut size = 0u64;
    for rel in entries {
        let full = root.join(rel);
        let meta = std::fs::symlink_metadata(&full).map_err(|e| VesselError::io(&full, e))?;
        if meta.file_type().is_file() {
            size += meta.len();
        }
    }
    Ok(size)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;

    bytes.iter().fold(String::with_capacity(64), |mut s, b| {
        let _ = write!(s, "{b:02x}");
        s
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("mkdir");
        }
        std::fs::write(path, contents).expect("write");
    }

    #[test]
    fn identical_trees_hash_identically() {
        let a = tempfile::tempdir().expect("tempdir");
        let b = tempfile::tempdir().expect("tempdir");
        for dir in [a.path(), b.path()] {
            write(dir, "bin/sh", "#!/bin/sh");
            write(dir, "etc/hosts", "127.0.0.1 localhost");
        }
        assert_eq!(hash_tree(a.path()).expect("a"), hash_tree(b.path()).expect("b"));
    }

    #[test]
    fn content_change_changes_the_hash() {
        let a = tempfile::tempdir().expect("tempdir");
        let b = tempfile::tempdir().expect("tempdir");
        write(a.path(), "etc/hosts", "127.0.0.1 localhost");
        write(b.path(), "etc/hosts", "127.0.0.1 localghost");
        assert_ne!(hash_tree(a.path()).expect("a"), hash_tree(b.path()).expect("b"));
    }

    #[test]
    fn path_rename_changes_the_hash() {
        let a = tempfile::tempdir().expect("tempdir");
        let b = tempfile::tempdir().expect("tempdir");
        write(a.path(), "one", "same");
        write(b.path(), "two", "same");
        assert_ne!(hash_tree(a.path()).expect("a"), hash_tree(b.path()).expect("b"));
    }

    #[test]
    #[cfg(unix)]
    fn file_type_distinguishes_symlink_from_file() {
        let a = tempfile::tempdir().expect("tempdir");
        let b = tempfile::tempdir().expect("tempdir");
        write(a.path(), "target", "x");
        write(a.path(), "entry", "target");
        write(b.path(), "target", "x");
        std::os::unix::fs::symlink("target", b.path().join("entry")).expect("symlink");
        assert_ne!(hash_tree(a.path()).expect("a"), hash_tree(b.path()).expect("b"));
    }

    #[test]
    fn empty_directories_contribute_to_identity() {
        let a = tempfile::tempdir().expect("tempdir");
        let b = tempfile::tempdir().expect("tempdir");
        std::fs::create_dir(a.path().join("var")).expect("mkdir");
        assert_ne!(hash_tree(a.path()).expect("a"), hash_tree(b.path()).expect("b"));
    }

    #[test]
    fn tree_size_counts_regular_file_bytes() {
        let dir = tempfile::tempdir().expect("tempdir");
        write(dir.path(), "a", "12345");
        write(dir.path(), "sub/b", "123");
        assert_eq!(tree_size(dir.path()).expect("size"), 8);
    }
}
