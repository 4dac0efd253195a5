//! Bundle acquisition errors

use super::BundleError;

/// Creates a download failed error
pub fn failed(reference: impl Into<String>, reason: impl Into<String>) -> BundleError {
    BundleError::DownloadFailed {
        reference: reference.into(),
        reason: reason.into(),
    }
}

/// Creates an invalid image reference error naming the offending field
pub fn invalid_image_reference(
    label: impl Into<String>,
    field: impl Into<String>,
    value: impl Into<String>,
) -> BundleError {
    BundleError::InvalidImageReference {
        label: label.into(),
        field: field.into(),
        value: value.into(),
    }
}

/// Creates an unsupported source error
pub fn unsupported_source(url: impl Into<String>) -> BundleError {
    BundleError::UnsupportedSource { url: url.into() }
}
