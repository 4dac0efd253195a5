//! Download, read and validate a bundle in one call

use std::sync::Arc;

use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::download::{BundleDownloader, BundleReference, DownloadedBundle};
use crate::error::Result;
use crate::inspect::{BundleInspector, InspectedBundle};
use crate::process::CancelFlag;
use crate::reader::BundleReader;
use crate::validation::ValidatorRegistry;

/// A downloaded bundle that passed validation
///
/// Holds the reader and the download directory it reads from; both are
/// released together by [`close`](Self::close) or on drop.
#[derive(Debug)]
pub struct AcquiredBundle {
    inspected: InspectedBundle,
    // Declared before `downloaded` so it drops first
    reader: Option<BundleReader>,
    downloaded: Option<DownloadedBundle>,
}

impl AcquiredBundle {
    pub fn inspected(&self) -> &InspectedBundle {
        &self.inspected
    }

    pub fn reader(&self) -> Option<&BundleReader> {
        self.reader.as_ref()
    }

    pub fn downloaded(&self) -> Option<&DownloadedBundle> {
        self.downloaded.as_ref()
    }

    /// Release the reader, then the download directory
    pub fn close(mut self) -> Result<()> {
        if let Some(reader) = self.reader.take() {
            reader.close()?;
        }
        match self.downloaded.take() {
            Some(downloaded) => downloaded.close(),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    downloader: BundleDownloader,
    inspector: BundleInspector,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Ok(Self {
            downloader: BundleDownloader::new(config)?,
            inspector: BundleInspector::with_registry(Arc::new(ValidatorRegistry::new())),
        })
    }

    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.downloader = self.downloader.with_cancel_flag(cancel);
        self
    }

    pub fn downloader(&self) -> &BundleDownloader {
        &self.downloader
    }

    pub fn inspector(&self) -> &BundleInspector {
        &self.inspector
    }

    /// Download `reference`, open it and validate every descriptor
    pub fn acquire(&self, reference: &BundleReference) -> Result<AcquiredBundle> {
        let downloaded = self.downloader.download(reference)?;
        let reader = BundleReader::open(downloaded.path())?;
        let inspected = match self.inspector.inspect(&reader) {
            Ok(inspected) => inspected,
            Err(e) => {
                if let Err(cleanup) = reader.close() {
                    warn!("{}", cleanup);
                }
                return Err(e);
            }
        };
        info!(
            reference = %reference,
            components = inspected.components.len(),
            digest = downloaded.digest(),
            "Bundle acquired"
        );
        Ok(AcquiredBundle {
            inspected,
            reader: Some(reader),
            downloaded: Some(downloaded),
        })
    }

    /// Open and validate a bundle already on disk
    pub fn inspect_local(&self, path: &std::path::Path) -> Result<InspectedBundle> {
        let reader = BundleReader::open(path)?;
        let inspected = self.inspector.inspect(&reader);
        reader.close()?;
        inspected
    }

    pub fn list_tags(&self, source_url: &str) -> Result<Vec<String>> {
        self.downloader.list_tags(source_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_inspect_local_directory() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("descriptor.yaml"), "code: legacy\n").unwrap();
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        let inspected = pipeline.inspect_local(temp.path()).unwrap();
        assert_eq!(inspected.descriptor.identifier(), Some("legacy"));
        assert!(inspected.components.is_empty());
    }

    #[test]
    fn test_inspect_local_missing_path() {
        let temp = TempDir::new().unwrap();
        let pipeline = Pipeline::new(PipelineConfig::default()).unwrap();
        assert!(pipeline.inspect_local(&temp.path().join("missing")).is_err());
    }
}
