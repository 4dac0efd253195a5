//! Uniform read-only view over bundle contents
//!
//! A [`BundleReader`] loads a plain directory, a gzipped tarball or a zip
//! archive into one entry table keyed by `/`-separated paths. The table is
//! rebased onto the shallowest folder holding a [`DESCRIPTOR_FILE`], so a
//! bundle wrapped in `package/` (or any number of folders) reads exactly like
//! one that is not.
//!
//! Tarballs are extracted to a scratch directory owned by the reader; zip
//! entries are held in memory. [`BundleReader::close`] removes the scratch
//! directory and reports failures; dropping the reader removes it silently.

mod layout;

pub use layout::ArchiveLayout;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, warn};

use crate::descriptor::{BundleDescriptor, ComponentDescriptor, DescriptorKind};
use crate::error::{
    Result, archive_read_failed, descriptor_not_found, descriptor_parse_failed, file_not_found,
    io_error,
};
use layout::{Contents, Entry};

/// Root descriptor file name
pub const DESCRIPTOR_FILE: &str = "descriptor.yaml";

/// Reserved top-level folder for static resources
pub const RESOURCES_FOLDER: &str = "resources/";

/// A file shipped onward as base64, split into folder and file name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileDescriptor {
    /// Folder below `resources/`; empty for files directly inside it
    pub folder: String,
    pub filename: String,
    pub base64: String,
}

pub struct BundleReader {
    source: PathBuf,
    layout: ArchiveLayout,
    root_prefix: String,
    files: BTreeMap<String, Entry>,
    folders: BTreeSet<String>,
    scratch: Option<TempDir>,
}

impl fmt::Debug for BundleReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BundleReader")
            .field("source", &self.source)
            .field("layout", &self.layout)
            .field("root_prefix", &self.root_prefix)
            .field("files", &self.files.len())
            .finish_non_exhaustive()
    }
}

/// Strip `./`, leading slashes and Windows separators from a lookup path
fn normalize(path: &str) -> String {
    let path = path.trim().replace('\\', "/");
    let mut path = path.as_str();
    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest;
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest;
        } else {
            break;
        }
    }
    path.trim_end_matches('/').to_string()
}

/// Folder prefix (`""` or ending in `/`) of the shallowest descriptor
fn find_root_prefix<'a>(keys: impl Iterator<Item = &'a String>) -> Option<String> {
    keys.filter(|key| {
        key.as_str() == DESCRIPTOR_FILE || key.ends_with(&format!("/{DESCRIPTOR_FILE}"))
    })
    .min_by_key(|key| (key.split('/').count(), key.len()))
    .map(|key| key[..key.len() - DESCRIPTOR_FILE.len()].to_string())
}

/// Every ancestor of `folder`, itself included (`a/b/c` -> `a`, `a/b`, `a/b/c`)
fn with_ancestors(folder: &str) -> impl Iterator<Item = String> + '_ {
    folder
        .match_indices('/')
        .map(|(index, _)| folder[..index].to_string())
        .chain(std::iter::once(folder.to_string()))
}

impl BundleReader {
    /// Open a bundle directory or archive and rebase it onto its root descriptor
    pub fn open(path: &Path) -> Result<Self> {
        let layout = ArchiveLayout::detect(path)?;
        let contents = layout::load(path, layout)?;
        let reader = Self::from_contents(path, layout, contents);
        debug!(
            source = %path.display(),
            layout = %layout,
            root = %reader.root_prefix,
            files = reader.files.len(),
            "Opened bundle"
        );
        Ok(reader)
    }

    fn from_contents(source: &Path, layout: ArchiveLayout, contents: Contents) -> Self {
        let Contents {
            files,
            folders,
            scratch,
        } = contents;

        let root_prefix = find_root_prefix(files.keys()).unwrap_or_else(|| {
            warn!(source = %source.display(), "No {} found in bundle", DESCRIPTOR_FILE);
            String::new()
        });

        let files = files
            .into_iter()
            .filter_map(|(key, entry)| {
                key.strip_prefix(root_prefix.as_str())
                    .filter(|rest| !rest.is_empty())
                    .map(|rest| (rest.to_string(), entry))
            })
            .collect();
        let folders = folders
            .into_iter()
            .filter_map(|folder| {
                format!("{folder}/")
                    .strip_prefix(root_prefix.as_str())
                    .map(|rest| rest.trim_end_matches('/').to_string())
                    .filter(|rest| !rest.is_empty())
            })
            .collect();

        Self {
            source: source.to_path_buf(),
            layout,
            root_prefix,
            files,
            folders,
            scratch,
        }
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn layout(&self) -> ArchiveLayout {
        self.layout
    }

    /// Folder the descriptor was found in, relative to the source (`""` at the top)
    pub fn root_prefix(&self) -> &str {
        &self.root_prefix
    }

    /// All file paths, relative to the bundle root
    pub fn file_names(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(&normalize(path))
    }

    pub fn read_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let key = normalize(path);
        match self.files.get(&key) {
            Some(Entry::Memory(bytes)) => Ok(bytes.clone()),
            Some(Entry::Disk(location)) => std::fs::read(location)
                .map_err(|e| io_error(format!("Failed to read {key}: {e}"))),
            None => Err(file_not_found(key)),
        }
    }

    pub fn read_file_as_string(&self, path: &str) -> Result<String> {
        let bytes = self.read_bytes(path)?;
        String::from_utf8(bytes)
            .map_err(|_| archive_read_failed(normalize(path), "file is not valid UTF-8"))
    }

    /// Parse a YAML descriptor into `D`
    pub fn read_descriptor_file<D: DeserializeOwned>(&self, path: &str) -> Result<D> {
        let key = normalize(path);
        if !self.files.contains_key(&key) {
            return Err(descriptor_not_found(key));
        }
        let text = self.read_file_as_string(&key)?;
        serde_yaml::from_str(&text).map_err(|e| descriptor_parse_failed(key, e.to_string()))
    }

    pub fn bundle_descriptor(&self) -> Result<BundleDescriptor> {
        self.read_descriptor_file(DESCRIPTOR_FILE)
    }

    /// Read `path` as a free-form descriptor of `kind`
    pub fn read_component_descriptor(
        &self,
        path: &str,
        kind: DescriptorKind,
    ) -> Result<ComponentDescriptor> {
        let key = normalize(path);
        if !self.files.contains_key(&key) {
            return Err(descriptor_not_found(key));
        }
        let text = self.read_file_as_string(&key)?;
        ComponentDescriptor::from_yaml(kind, &key, &text)
    }

    pub fn read_file_as_descriptor(&self, path: &str) -> Result<FileDescriptor> {
        let key = normalize(path);
        let bytes = self.read_bytes(&key)?;
        let within = key.strip_prefix(RESOURCES_FOLDER).unwrap_or(&key);
        let (folder, filename) = match within.rsplit_once('/') {
            Some((folder, filename)) => (folder.to_string(), filename.to_string()),
            None => (String::new(), within.to_string()),
        };
        Ok(FileDescriptor {
            folder,
            filename,
            base64: STANDARD.encode(bytes),
        })
    }

    pub fn contains_resource_folder(&self) -> bool {
        let folder = RESOURCES_FOLDER.trim_end_matches('/');
        self.folders.contains(folder)
            || self.files.keys().any(|key| key.starts_with(RESOURCES_FOLDER))
    }

    /// Folders under `resources/`, relative to it, ancestors included,
    /// shallowest first
    pub fn resource_folders(&self) -> Vec<String> {
        let from_files = self
            .files
            .keys()
            .filter_map(|key| key.rsplit_once('/').map(|(parent, _)| parent));
        let leaves = self.folders.iter().map(String::as_str).chain(from_files);

        let unique: BTreeSet<String> = leaves
            .filter_map(|folder| folder.strip_prefix(RESOURCES_FOLDER))
            .filter(|rest| !rest.is_empty())
            .flat_map(with_ancestors)
            .collect();

        let mut folders: Vec<String> = unique.into_iter().collect();
        folders.sort_by(|a, b| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));
        folders
    }

    /// Files under `resources/`, as full bundle-relative paths
    pub fn resource_files(&self) -> Vec<String> {
        self.files
            .keys()
            .filter(|key| key.starts_with(RESOURCES_FOLDER))
            .cloned()
            .collect()
    }

    /// Remove any extraction scratch space
    pub fn close(mut self) -> Result<()> {
        match self.scratch.take() {
            Some(scratch) => {
                let location = scratch.path().display().to_string();
                scratch
                    .close()
                    .map_err(|e| io_error(format!("Failed to remove {location}: {e}")))?;
                debug!(path = %location, "Removed reader scratch directory");
                Ok(())
            }
            None => Ok(()),
        }
    }
}
