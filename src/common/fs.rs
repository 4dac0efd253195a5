//! Common file system operations with unified error handling

use std::fs;
use std::path::Path;

use walkdir::WalkDir;

use crate::error::{Result, io_error};

#[derive(Default, Clone)]
pub struct CopyOptions {
    pub exclude: Vec<String>,
}

impl CopyOptions {
    pub fn exclude_git() -> Self {
        Self {
            exclude: vec![".git".to_string()],
        }
    }

    fn is_excluded(&self, name: &std::ffi::OsStr) -> bool {
        self.exclude
            .iter()
            .any(|excluded| name.to_str() == Some(excluded.as_str()))
    }
}

/// Copy a directory tree into `dst`, which must be absent or empty.
/// Symlinks are not followed or copied. Returns the number of files copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path, options: &CopyOptions) -> Result<usize> {
    if dst.exists() {
        let mut entries = fs::read_dir(dst)
            .map_err(|e| io_error(format!("Failed to read {}: {}", dst.display(), e)))?;
        if entries.next().is_some() {
            return Err(io_error(format!(
                "Refusing to copy into non-empty directory {}",
                dst.display()
            )));
        }
    }
    fs::create_dir_all(dst)
        .map_err(|e| io_error(format!("Failed to create {}: {}", dst.display(), e)))?;

    let walker = WalkDir::new(src)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !options.is_excluded(e.file_name()));

    let mut copied = 0;
    for entry in walker {
        let entry = entry.map_err(|e| io_error(format!("Failed to walk {}: {}", src.display(), e)))?;
        let Ok(relative) = entry.path().strip_prefix(src) else {
            continue;
        };
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = dst.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| io_error(format!("Failed to create {}: {}", target.display(), e)))?;
        } else if entry.file_type().is_file() {
            fs::copy(entry.path(), &target)
                .map_err(|e| io_error(format!("Failed to copy {}: {}", relative.display(), e)))?;
            copied += 1;
        }
    }
    Ok(copied)
}
