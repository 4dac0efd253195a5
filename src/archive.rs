//! Archive format sniffing and safe tar.gz unpacking
//!
//! Shared by the package-registry download strategy (which strips the
//! `package/` wrapper) and the content reader (which keeps paths as-is and
//! relies on root rebasing).

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tracing::debug;

use crate::error::{Result, archive_read_failed, io_error};

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZIP_MAGIC: [u8; 4] = [b'P', b'K', 0x03, 0x04];

pub fn is_gzip(bytes: &[u8]) -> bool {
    bytes.starts_with(&GZIP_MAGIC)
}

pub fn is_zip(bytes: &[u8]) -> bool {
    bytes.starts_with(&ZIP_MAGIC)
}

/// First bytes of a file, for magic-number sniffing
pub fn read_magic(path: &Path) -> Result<Vec<u8>> {
    let mut file = File::open(path)
        .map_err(|e| archive_read_failed(path.display().to_string(), e.to_string()))?;
    let mut buffer = [0u8; 4];
    let mut filled = 0;
    while filled < buffer.len() {
        match file.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) => return Err(archive_read_failed(path.display().to_string(), e.to_string())),
        }
    }
    Ok(buffer[..filled].to_vec())
}

/// Reject absolute paths, drive prefixes and `..` components
pub fn safe_entry_path(path: &Path) -> std::result::Result<(), String> {
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::ParentDir => {
                return Err(format!("unsafe archive entry path: {}", path.display()));
            }
            Component::CurDir | Component::Normal(_) => {}
        }
    }
    Ok(())
}

/// Drop the first `count` normal components; `None` when nothing is left
fn strip_components(path: &Path, count: usize) -> Option<PathBuf> {
    let stripped: PathBuf = path
        .components()
        .filter(|c| matches!(c, Component::Normal(_)))
        .skip(count)
        .collect();
    if stripped.as_os_str().is_empty() {
        None
    } else {
        Some(stripped)
    }
}

/// Unpack a gzipped tarball into `dest`, dropping the first
/// `strip_prefix_components` path components of every entry.
///
/// Only regular files and directories are materialized; links and special
/// entries are skipped. Returns the number of files written.
pub fn unpack_tar_gz(archive: &Path, dest: &Path, strip_prefix_components: usize) -> Result<usize> {
    let label = archive.display().to_string();
    let file = File::open(archive).map_err(|e| archive_read_failed(&label, e.to_string()))?;
    fs::create_dir_all(dest)
        .map_err(|e| io_error(format!("Failed to create {}: {}", dest.display(), e)))?;

    let mut tar = Archive::new(GzDecoder::new(BufReader::new(file)));
    let entries = tar
        .entries()
        .map_err(|e| archive_read_failed(&label, format!("failed to read tar entries: {e}")))?;

    let mut written = 0;
    for entry in entries {
        let mut entry = entry
            .map_err(|e| archive_read_failed(&label, format!("failed to read tar entry: {e}")))?;
        let path = entry
            .path()
            .map_err(|e| archive_read_failed(&label, format!("bad tar entry path: {e}")))?
            .to_path_buf();
        safe_entry_path(&path).map_err(|reason| archive_read_failed(&label, reason))?;

        let Some(relative) = strip_components(&path, strip_prefix_components) else {
            continue;
        };
        let target = dest.join(&relative);
        let entry_type = entry.header().entry_type();

        if entry_type.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|e| io_error(format!("Failed to create {}: {}", target.display(), e)))?;
        } else if entry_type.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent).map_err(|e| {
                    io_error(format!("Failed to create {}: {}", parent.display(), e))
                })?;
            }
            entry.unpack(&target).map_err(|e| {
                archive_read_failed(&label, format!("failed to unpack {}: {e}", path.display()))
            })?;
            written += 1;
        } else {
            debug!(entry = %path.display(), kind = ?entry_type, "Skipping non-regular tar entry");
        }
    }

    debug!(archive = %label, files = written, "Unpacked tarball");
    Ok(written)
}
