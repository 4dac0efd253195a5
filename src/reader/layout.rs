//! Physical bundle layouts and how each one is loaded into an entry table

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf};

use tempfile::TempDir;
use tracing::debug;
use walkdir::WalkDir;

use crate::archive::{is_gzip, is_zip, read_magic, safe_entry_path, unpack_tar_gz};
use crate::error::{Result, archive_read_failed, file_not_found};
use crate::temp::scratch_dir;

/// How a bundle is packaged on disk
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveLayout {
    Directory,
    TarGz,
    Zip,
}

impl ArchiveLayout {
    /// Directory, then file extension, then magic bytes
    pub fn detect(path: &Path) -> Result<Self> {
        if path.is_dir() {
            return Ok(Self::Directory);
        }
        if !path.is_file() {
            return Err(file_not_found(path.display().to_string()));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if name.ends_with(".tgz") || name.ends_with(".tar.gz") {
            return Ok(Self::TarGz);
        }
        if name.ends_with(".zip") {
            return Ok(Self::Zip);
        }

        let magic = read_magic(path)?;
        if is_gzip(&magic) {
            Ok(Self::TarGz)
        } else if is_zip(&magic) {
            Ok(Self::Zip)
        } else {
            Err(archive_read_failed(
                path.display().to_string(),
                "not a directory, gzipped tarball or zip archive",
            ))
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Directory => "directory",
            Self::TarGz => "tar.gz",
            Self::Zip => "zip",
        }
    }
}

impl fmt::Display for ArchiveLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a file's bytes live
#[derive(Debug, Clone)]
pub(crate) enum Entry {
    Disk(PathBuf),
    Memory(Vec<u8>),
}

/// Everything a layout yields before root rebasing
#[derive(Debug, Default)]
pub(crate) struct Contents {
    pub files: BTreeMap<String, Entry>,
    pub folders: BTreeSet<String>,
    pub scratch: Option<TempDir>,
}

/// `/`-joined normal components of a relative path
pub(crate) fn path_key(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub(crate) fn load(path: &Path, layout: ArchiveLayout) -> Result<Contents> {
    match layout {
        ArchiveLayout::Directory => load_directory(path),
        ArchiveLayout::TarGz => load_tar_gz(path),
        ArchiveLayout::Zip => load_zip(path),
    }
}

fn load_directory(root: &Path) -> Result<Contents> {
    let mut contents = Contents::default();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git");

    for entry in walker {
        let entry = entry
            .map_err(|e| archive_read_failed(root.display().to_string(), e.to_string()))?;
        let Ok(relative) = entry.path().strip_prefix(root) else {
            continue;
        };
        let key = path_key(relative);
        if key.is_empty() {
            continue;
        }
        let file_type = entry.file_type();
        if file_type.is_dir() {
            contents.folders.insert(key);
        } else if file_type.is_file() {
            contents
                .files
                .insert(key, Entry::Disk(entry.path().to_path_buf()));
        }
    }
    Ok(contents)
}

fn load_tar_gz(archive: &Path) -> Result<Contents> {
    let scratch = scratch_dir("reader")?;
    let written = unpack_tar_gz(archive, scratch.path(), 0)?;
    debug!(archive = %archive.display(), files = written, "Extracted tarball for reading");
    let mut contents = load_directory(scratch.path())?;
    contents.scratch = Some(scratch);
    Ok(contents)
}

fn load_zip(archive: &Path) -> Result<Contents> {
    let label = archive.display().to_string();
    let file = File::open(archive).map_err(|e| archive_read_failed(&label, e.to_string()))?;
    let mut zip = zip::ZipArchive::new(BufReader::new(file))
        .map_err(|e| archive_read_failed(&label, e.to_string()))?;

    let mut contents = Contents::default();
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|e| archive_read_failed(&label, e.to_string()))?;
        let raw_name = entry.name().to_string();
        safe_entry_path(Path::new(&raw_name)).map_err(|reason| archive_read_failed(&label, reason))?;
        let Some(enclosed) = entry.enclosed_name() else {
            return Err(archive_read_failed(
                &label,
                format!("unsafe archive entry path: {raw_name}"),
            ));
        };
        let key = path_key(&enclosed);
        if key.is_empty() {
            continue;
        }
        if entry.is_dir() {
            contents.folders.insert(key);
        } else {
            let mut bytes = Vec::new();
            entry.read_to_end(&mut bytes).map_err(|e| {
                archive_read_failed(&label, format!("failed to read {raw_name}: {e}"))
            })?;
            contents.files.insert(key, Entry::Memory(bytes));
        }
    }
    Ok(contents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_detect_directory() {
        let temp = TempDir::new().unwrap();
        assert_eq!(
            ArchiveLayout::detect(temp.path()).unwrap(),
            ArchiveLayout::Directory
        );
    }

    #[test]
    fn test_detect_by_extension_and_magic() {
        let temp = TempDir::new().unwrap();
        let tgz = temp.path().join("bundle.tgz");
        fs::write(&tgz, b"whatever").unwrap();
        assert_eq!(ArchiveLayout::detect(&tgz).unwrap(), ArchiveLayout::TarGz);

        let sniffed = temp.path().join("bundle.bin");
        fs::write(&sniffed, [b'P', b'K', 3, 4, 0, 0]).unwrap();
        assert_eq!(ArchiveLayout::detect(&sniffed).unwrap(), ArchiveLayout::Zip);

        let gz = temp.path().join("payload");
        fs::write(&gz, [0x1f, 0x8b, 8, 0]).unwrap();
        assert_eq!(ArchiveLayout::detect(&gz).unwrap(), ArchiveLayout::TarGz);
    }

    #[test]
    fn test_detect_rejects_unknown_and_missing() {
        let temp = TempDir::new().unwrap();
        let text = temp.path().join("notes.txt");
        fs::write(&text, "plain text").unwrap();
        assert!(ArchiveLayout::detect(&text).is_err());

        let err = ArchiveLayout::detect(&temp.path().join("missing.zip")).unwrap_err();
        assert!(matches!(err, crate::error::BundleError::FileNotFound { .. }));
    }

    #[test]
    fn test_directory_skips_git() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join(".git/objects")).unwrap();
        fs::write(temp.path().join(".git/HEAD"), "ref").unwrap();
        fs::write(temp.path().join("descriptor.yaml"), "name: a").unwrap();

        let contents = load(temp.path(), ArchiveLayout::Directory).unwrap();
        assert_eq!(
            contents.files.keys().collect::<Vec<_>>(),
            vec!["descriptor.yaml"]
        );
        assert!(contents.folders.is_empty());
    }

    #[test]
    fn test_path_key() {
        assert_eq!(path_key(Path::new("./a/b/c.txt")), "a/b/c.txt");
        assert_eq!(path_key(Path::new("")), "");
    }
}
