//! Error types and handling for bundlegate
//!
//! Uses `thiserror` for error definitions and `miette` for pretty diagnostics.
//!
//! This module is organized into sub-modules by error domain:
//! - [`download`]: Bundle acquisition errors
//! - [`bundle`]: Descriptor validation errors
//! - [`fs`]: Archive and file access errors
//! - [`plan`]: Install plan errors
//! - [`config`]: Configuration errors
//!
//! The variants below are the whole error surface exposed to callers. Process
//! exit codes and raw I/O errors are always folded into one of them.

pub mod bundle;
pub mod config;
pub mod download;
pub mod fs;
pub mod plan;

pub use bundle::{invalid as invalid_bundle, unsupported_version};
pub use config::{
    invalid as config_invalid, parse_failed as config_parse_failed,
    read_failed as config_read_failed,
};
pub use download::{
    failed as download_failed, invalid_image_reference, unsupported_source,
};
pub use fs::{
    archive_read_failed, descriptor_not_found, descriptor_parse_failed, io_error,
    not_found as file_not_found,
};
pub use plan::{invalid as invalid_install_plan, violation as install_plan_violation};

use miette::Diagnostic;
use thiserror::Error;

/// Main error type for bundlegate operations
#[derive(Error, Diagnostic, Debug)]
pub enum BundleError {
    // Download errors
    #[error("Failed to download bundle '{reference}': {reason}")]
    #[diagnostic(
        code(bundlegate::download::failed),
        help("Check that the source URL and tag exist and that the registry is reachable")
    )]
    DownloadFailed { reference: String, reason: String },

    #[error("Invalid {label}: {field} '{value}' is not valid")]
    #[diagnostic(
        code(bundlegate::download::invalid_image_reference),
        help("Expected docker://<registry>/[<organization>/]<repository>[:<tag>|@sha256:<digest>]")
    )]
    InvalidImageReference {
        label: String,
        field: String,
        value: String,
    },

    #[error("Unsupported bundle source: '{url}'")]
    #[diagnostic(
        code(bundlegate::download::unsupported_source),
        help("Valid formats: git@host:org/repo.git, https://host/org/repo.git, https://registry/pkg/-/pkg-1.0.0.tgz, docker://registry/org/repo")
    )]
    UnsupportedSource { url: String },

    // File system errors
    #[error("File not found: {path}")]
    #[diagnostic(code(bundlegate::fs::not_found))]
    FileNotFound { path: String },

    #[error("Descriptor not found: {path}")]
    #[diagnostic(
        code(bundlegate::fs::descriptor_not_found),
        help("Every bundle needs a descriptor.yaml at its root and one per listed component")
    )]
    DescriptorNotFound { path: String },

    #[error("Failed to parse descriptor {path}: {reason}")]
    #[diagnostic(code(bundlegate::fs::descriptor_parse_failed))]
    DescriptorParseFailed { path: String, reason: String },

    #[error("Failed to read archive {path}: {reason}")]
    #[diagnostic(code(bundlegate::fs::archive_read_failed))]
    ArchiveReadFailed { path: String, reason: String },

    #[error("IO error: {message}")]
    #[diagnostic(code(bundlegate::fs::io_error))]
    IoError { message: String },

    // Validation errors
    #[error("Invalid {kind} descriptor (descriptorVersion {version}): {message}")]
    #[diagnostic(code(bundlegate::bundle::invalid))]
    InvalidBundle {
        kind: String,
        version: String,
        message: String,
    },

    #[error(
        "Unsupported descriptorVersion '{version}' for {kind} descriptor; accepted versions: {accepted}"
    )]
    #[diagnostic(
        code(bundlegate::bundle::unsupported_version),
        help("Set descriptorVersion to one of the accepted versions or omit it")
    )]
    UnsupportedDescriptorVersion {
        kind: String,
        version: String,
        accepted: String,
    },

    // Install plan errors
    #[error(
        "Invalid install plan for {category} '{component}': status {status} does not allow action {action}"
    )]
    #[diagnostic(
        code(bundlegate::plan::violation),
        help("NEW components must be created; DIFF and EQUAL components can only be skipped or overridden")
    )]
    InstallPlanViolation {
        category: String,
        component: String,
        status: String,
        action: String,
    },

    #[error("Invalid install plan: {message}")]
    #[diagnostic(code(bundlegate::plan::invalid))]
    InvalidInstallPlan { message: String },

    // Configuration errors
    #[error("Failed to read configuration file: {path}: {reason}")]
    #[diagnostic(code(bundlegate::config::read_failed))]
    ConfigReadFailed { path: String, reason: String },

    #[error("Failed to parse configuration file: {path}: {reason}")]
    #[diagnostic(code(bundlegate::config::parse_failed))]
    ConfigParseFailed { path: String, reason: String },

    #[error("Invalid configuration: {message}")]
    #[diagnostic(code(bundlegate::config::invalid))]
    ConfigInvalid { message: String },
}

impl From<std::io::Error> for BundleError {
    fn from(err: std::io::Error) -> Self {
        BundleError::IoError {
            message: err.to_string(),
        }
    }
}

impl From<serde_yaml::Error> for BundleError {
    fn from(err: serde_yaml::Error) -> Self {
        BundleError::DescriptorParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for BundleError {
    fn from(err: serde_json::Error) -> Self {
        BundleError::DescriptorParseFailed {
            path: "unknown".to_string(),
            reason: err.to_string(),
        }
    }
}

/// Result type alias using miette for error handling
pub type Result<T> = miette::Result<T, BundleError>;

/// Flatten an error and its `source()` chain into `outer: inner: ...`
pub fn cause_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(cause) = current {
        let text = cause.to_string();
        if parts.last() != Some(&text) {
            parts.push(text);
        }
        current = cause.source();
    }
    parts.join(": ")
}
