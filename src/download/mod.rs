//! Bundle acquisition
//!
//! This module handles:
//! - Choosing exactly one strategy (git, npm tarball, container image) per reference
//! - Materializing the bundle into a fresh scratch directory
//! - Owning that directory and every helper process spawned for it
//! - Listing the versions a source offers
//!
//! Every failure leaves through [`BundleError::DownloadFailed`] (or one of
//! the reference validation errors); process and I/O errors never escape raw.

pub mod docker;
pub mod git;
pub mod npm;

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::config::{PipelineConfig, RegistryCredentialStore};
use crate::error::{BundleError, Result, cause_chain, download_failed, unsupported_source};
use crate::hash::hash_directory;
use crate::image::is_docker_url;
use crate::process::{CancelFlag, ProcessError, ProcessOutcome, ProcessRunner, ProcessTracker};
use crate::temp::scratch_dir;

/// Name of the bundle directory inside a download's scratch directory
const BUNDLE_DIR: &str = "bundle";

/// Where to fetch a bundle from, and which version
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleReference {
    source_url: String,
    version: String,
}

impl BundleReference {
    pub fn new(source_url: impl Into<String>, version: impl Into<String>) -> Result<Self> {
        let source_url = source_url.into().trim().to_string();
        if source_url.is_empty() {
            return Err(unsupported_source(source_url));
        }
        Ok(Self {
            source_url,
            version: version.into().trim().to_string(),
        })
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    /// Tag, branch or digest; may be empty (source default)
    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn strategy(&self) -> DownloadStrategy {
        DownloadStrategy::detect(&self.source_url)
    }
}

impl fmt::Display for BundleReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.version.is_empty() {
            write!(f, "{}", self.source_url)
        } else {
            write!(f, "{}#{}", self.source_url, self.version)
        }
    }
}

/// Acquisition mechanism for one reference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStrategy {
    Git,
    Npm,
    Docker,
}

impl DownloadStrategy {
    /// Container transport wins, then explicit git markers, then npm-style
    /// tarball URLs; anything else is treated as a git remote.
    pub fn detect(url: &str) -> Self {
        let url = url.trim();
        if is_docker_url(url) {
            Self::Docker
        } else if is_git_protocol(url) {
            Self::Git
        } else if is_npm_tarball(url) {
            Self::Npm
        } else {
            Self::Git
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Git => "git",
            Self::Npm => "npm",
            Self::Docker => "docker",
        }
    }
}

impl fmt::Display for DownloadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn is_git_protocol(url: &str) -> bool {
    url.starts_with("git@")
        || url.starts_with("git://")
        || url.starts_with("ssh://")
        || url.starts_with("git+ssh://")
        || url.starts_with("git+https://")
        || url.starts_with("file://")
        || url.trim_end_matches('/').ends_with(".git")
}

fn is_npm_tarball(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    (lower.starts_with("https://") || lower.starts_with("http://"))
        && (lower.ends_with(".tgz") || lower.ends_with(".tar.gz"))
}

/// An unpacked bundle on local disk
///
/// Owns its scratch directory and the helper processes spawned while
/// producing it. Dropping the value (or calling [`close`](Self::close))
/// kills any helper still running, then removes the directory.
pub struct DownloadedBundle {
    scratch: Option<TempDir>,
    path: PathBuf,
    digest: String,
    strategy: DownloadStrategy,
    tracker: ProcessTracker,
    grace_period: Duration,
}

impl DownloadedBundle {
    /// Directory holding the bundle contents
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// BLAKE3 digest of the unpacked tree (`blake3:<hex>`)
    pub fn digest(&self) -> &str {
        &self.digest
    }

    pub fn strategy(&self) -> DownloadStrategy {
        self.strategy
    }

    /// Kill leftover helpers and remove the directory, reporting removal errors
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        let killed = self.tracker.kill_all(self.grace_period);
        if killed > 0 {
            warn!(killed, "Killed helper processes still running at cleanup");
        }
        match self.scratch.take() {
            Some(scratch) => {
                let location = scratch.path().display().to_string();
                scratch.close().map_err(|e| {
                    BundleError::IoError {
                        message: format!("Failed to remove {location}: {e}"),
                    }
                })?;
                debug!(path = %location, "Removed download directory");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl fmt::Debug for DownloadedBundle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DownloadedBundle")
            .field("path", &self.path)
            .field("digest", &self.digest)
            .field("strategy", &self.strategy)
            .finish_non_exhaustive()
    }
}

impl Drop for DownloadedBundle {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("{}", e);
        }
    }
}

/// Shared state handed to a strategy for one invocation
pub(crate) struct DownloadContext<'a> {
    pub config: &'a PipelineConfig,
    pub credentials: &'a RegistryCredentialStore,
    pub tracker: &'a ProcessTracker,
    pub cancel: Option<&'a CancelFlag>,
    /// Scratch directory; strategies may put intermediate files here
    pub work_dir: &'a Path,
    /// Directory that must hold the bundle root when the strategy returns
    pub target: &'a Path,
}

impl DownloadContext<'_> {
    pub fn runner(&self, timeout: Duration) -> ProcessRunner {
        let runner = ProcessRunner::new(timeout)
            .with_grace_period(self.config.kill_grace_period())
            .with_tracker(self.tracker.clone());
        match self.cancel {
            Some(cancel) => runner.with_cancel_flag(cancel.clone()),
            None => runner,
        }
    }

    /// Remove anything a previous attempt left in the target, then recreate it
    pub fn reset_target(&self, create: bool) -> Result<()> {
        if self.target.exists() {
            std::fs::remove_dir_all(self.target).map_err(|e| {
                BundleError::IoError {
                    message: format!("Failed to clear {}: {}", self.target.display(), e),
                }
            })?;
        }
        if create {
            std::fs::create_dir_all(self.target).map_err(|e| BundleError::IoError {
                message: format!("Failed to create {}: {}", self.target.display(), e),
            })?;
        }
        Ok(())
    }
}

/// Map a runner failure onto the download error for `reference`
pub(crate) fn process_failure(reference: &str, err: &ProcessError) -> BundleError {
    download_failed(reference, cause_chain(err))
}

/// Map an unsuccessful outcome onto the download error for `reference`
pub(crate) fn outcome_failure(reference: &str, step: &str, outcome: &ProcessOutcome) -> BundleError {
    let reason = if outcome.timed_out {
        format!("{step} timed out")
    } else {
        match outcome.exit_code {
            Some(code) => format!("{step} exited with status {code}"),
            None => format!("{step} was killed by a signal"),
        }
    };
    download_failed(reference, reason)
}

/// Kill whatever `tracker` still holds when `result` is a failure
fn stop_helpers_on_error<T>(result: Result<T>, tracker: &ProcessTracker, grace: Duration) -> Result<T> {
    if result.is_err() {
        let killed = tracker.kill_all(grace);
        if killed > 0 {
            warn!(killed, "Stopped helper processes of a failed download");
        }
    }
    result
}

/// Captured lines of a successful `step`, refusing to pass an unread pipe
/// off as empty output
pub(crate) fn captured_lines<'a>(
    reference: &str,
    step: &str,
    outcome: &'a ProcessOutcome,
) -> Result<&'a [String]> {
    if !outcome.stdout_complete && outcome.stdout_lines.is_empty() {
        return Err(download_failed(
            reference,
            format!("{step} output could not be read to the end"),
        ));
    }
    if !outcome.stdout_complete {
        warn!(reference, step, lines = outcome.stdout_lines.len(), "Using partial output");
    }
    Ok(&outcome.stdout_lines)
}

/// Fetches bundles with the strategy each reference calls for
#[derive(Debug, Clone)]
pub struct BundleDownloader {
    config: PipelineConfig,
    credentials: RegistryCredentialStore,
    cancel: Option<CancelFlag>,
}

impl BundleDownloader {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        let credentials = config.credentials()?;
        Ok(Self {
            config,
            credentials,
            cancel: None,
        })
    }

    /// Abort running helper processes when `cancel` is raised
    pub fn with_cancel_flag(mut self, cancel: CancelFlag) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Download and unpack `reference` into a new scratch directory
    pub fn download(&self, reference: &BundleReference) -> Result<DownloadedBundle> {
        let strategy = reference.strategy();
        info!(reference = %reference, strategy = %strategy, "Downloading bundle");

        let scratch = scratch_dir(strategy.name())?;
        let target = scratch.path().join(BUNDLE_DIR);
        let tracker = ProcessTracker::new();
        let ctx = DownloadContext {
            config: &self.config,
            credentials: &self.credentials,
            tracker: &tracker,
            cancel: self.cancel.as_ref(),
            work_dir: scratch.path(),
            target: &target,
        };

        let fetched = match strategy {
            DownloadStrategy::Git => git::download(&ctx, reference),
            DownloadStrategy::Npm => npm::download(&ctx, reference),
            DownloadStrategy::Docker => docker::download(&ctx, reference),
        };
        let digest = stop_helpers_on_error(
            fetched.and_then(|()| hash_directory(&target)),
            &tracker,
            self.config.kill_grace_period(),
        )?;
        info!(reference = %reference, digest = %digest, "Bundle downloaded");

        Ok(DownloadedBundle {
            scratch: Some(scratch),
            path: target,
            digest,
            strategy,
            tracker,
            grace_period: self.config.kill_grace_period(),
        })
    }

    /// Versions available at `source_url`; an empty list is not an error
    pub fn list_tags(&self, source_url: &str) -> Result<Vec<String>> {
        let source_url = source_url.trim();
        if source_url.is_empty() {
            return Err(unsupported_source(source_url));
        }
        let strategy = DownloadStrategy::detect(source_url);
        debug!(url = %source_url, strategy = %strategy, "Listing tags");

        let scratch = scratch_dir("tags")?;
        let tracker = ProcessTracker::new();
        let ctx = DownloadContext {
            config: &self.config,
            credentials: &self.credentials,
            tracker: &tracker,
            cancel: self.cancel.as_ref(),
            work_dir: scratch.path(),
            target: scratch.path(),
        };

        let tags = match strategy {
            DownloadStrategy::Git => git::list_tags(&ctx, source_url),
            DownloadStrategy::Npm => npm::list_tags(&ctx, source_url),
            DownloadStrategy::Docker => docker::list_tags(&ctx, source_url),
        };
        tracker.kill_all(self.config.kill_grace_period());
        tags
    }
}
