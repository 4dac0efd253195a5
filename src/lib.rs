//! bundlegate - bundle acquisition and validation
//!
//! Fetches component bundles from git remotes, npm tarballs and container
//! registries into scratch space, reads them uniformly whatever their
//! packaging, and validates every descriptor against versioned rules before
//! an installer touches them. Install plans for re-installs are checked
//! against the diff status of each component.

pub mod archive;
pub mod cli;
pub mod commands;
pub mod common;
pub mod config;
pub mod descriptor;
pub mod download;
pub mod error;
pub mod hash;
pub mod image;
pub mod inspect;
pub mod pipeline;
pub mod plan;
pub mod process;
pub mod progress;
pub mod reader;
pub mod retry;
pub mod temp;
pub mod ui;
pub mod validation;

pub use download::{BundleDownloader, BundleReference, DownloadStrategy, DownloadedBundle};
pub use error::{BundleError, Result};
pub use inspect::{BundleInspector, InspectedBundle};
pub use pipeline::{AcquiredBundle, Pipeline};
pub use plan::{InstallPlan, validate_install_plan};
pub use reader::BundleReader;
pub use validation::ValidatorRegistry;
