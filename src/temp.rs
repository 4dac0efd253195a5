//! Scratch directories for downloads and archive extraction
//!
//! Temp dirs are never created under the current working directory (e.g. when
//! TMPDIR=tmp or TMPDIR=./tmp), and all of them share [`SCRATCH_PREFIX`] so
//! leaked helper processes from an earlier run can be recognised by the
//! paths in their arguments.

use std::env;
use std::path::PathBuf;

use tempfile::TempDir;

use crate::error::{Result, io_error};

/// Name prefix of every scratch directory this crate creates
pub const SCRATCH_PREFIX: &str = "bundlegate-";

/// Returns a directory path suitable for creating temporary directories.
/// Never returns a relative path.
pub fn temp_dir_base() -> PathBuf {
    let t = env::temp_dir();
    if t.is_absolute() {
        t
    } else {
        #[cfg(windows)]
        {
            env::var("TEMP")
                .or_else(|_| env::var("TMP"))
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("C:\\Windows\\Temp"))
        }
        #[cfg(not(windows))]
        {
            PathBuf::from("/tmp")
        }
    }
}

/// Path prefix shared by all scratch directories (`<tmp>/bundlegate-`)
pub fn scratch_path_prefix() -> PathBuf {
    temp_dir_base().join(SCRATCH_PREFIX)
}

/// Create a fresh scratch directory, removed when the returned guard drops
pub fn scratch_dir(purpose: &str) -> Result<TempDir> {
    tempfile::Builder::new()
        .prefix(&format!("{SCRATCH_PREFIX}{purpose}-"))
        .tempdir_in(temp_dir_base())
        .map_err(|e| io_error(format!("Failed to create temp directory: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_temp_dir_base_is_absolute() {
        assert!(temp_dir_base().is_absolute());
    }

    #[test]
    fn test_scratch_dir_uses_prefix_and_is_removed() {
        let dir = scratch_dir("download").unwrap();
        let path = dir.path().to_path_buf();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("bundlegate-download-"));
        assert!(path.starts_with(temp_dir_base()));
        drop(dir);
        assert!(!path.exists());
    }
}
