//! BLAKE3 content digests for downloaded bundles

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use blake3::Hasher;
use walkdir::WalkDir;

use crate::error::{BundleError, Result};

/// Hash prefix for BLAKE3 hashes
pub const HASH_PREFIX: &str = "blake3:";

/// Directories that never contribute to a bundle digest
const EXCLUDED_DIRS: &[&str] = &[".git"];

fn hash_reader(hasher: &mut Hasher, path: &Path) -> Result<()> {
    let file = File::open(path).map_err(|e| BundleError::IoError {
        message: format!("Failed to open {}: {}", path.display(), e),
    })?;

    let mut reader = BufReader::new(file);
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer).map_err(|e| BundleError::IoError {
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;

        if bytes_read == 0 {
            break;
        }

        hasher.update(&buffer[..bytes_read]);
    }
    Ok(())
}

/// Calculate BLAKE3 hash of a single file
pub fn hash_file(path: &Path) -> Result<String> {
    let mut hasher = Hasher::new();
    hash_reader(&mut hasher, path)?;
    Ok(format!("{}{}", HASH_PREFIX, hasher.finalize().to_hex()))
}

/// Calculate BLAKE3 hash of a directory's contents
///
/// This hashes all files in the directory recursively, sorted by path
/// for deterministic results. VCS metadata (`.git/`) is excluded so a
/// cloned bundle and the same bundle from a tarball hash identically.
pub fn hash_directory(path: &Path) -> Result<String> {
    if !path.is_dir() {
        return Err(BundleError::FileNotFound {
            path: path.display().to_string(),
        });
    }

    let mut hasher = Hasher::new();
    let mut files: Vec<_> = WalkDir::new(path)
        .into_iter()
        .filter_entry(|e| {
            e.depth() == 0 || !EXCLUDED_DIRS.contains(&e.file_name().to_string_lossy().as_ref())
        })
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .collect();

    // Sort for deterministic hashing
    files.sort_by_key(|e| e.path().to_path_buf());

    for entry in files {
        let file_path = entry.path();

        // Include relative path in hash for uniqueness
        let relative_path = file_path
            .strip_prefix(path)
            .unwrap_or(file_path)
            .to_string_lossy()
            .replace('\\', "/");
        hasher.update(relative_path.as_bytes());
        hasher.update(b"\0"); // null separator

        hash_reader(&mut hasher, file_path)?;

        hasher.update(b"\0"); // null separator between files
    }

    Ok(format!("{}{}", HASH_PREFIX, hasher.finalize().to_hex()))
}
