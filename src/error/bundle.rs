//! Descriptor validation errors

use super::BundleError;

/// Creates an invalid bundle error for a descriptor of the given kind and version
pub fn invalid(
    kind: impl Into<String>,
    version: impl Into<String>,
    message: impl Into<String>,
) -> BundleError {
    BundleError::InvalidBundle {
        kind: kind.into(),
        version: version.into(),
        message: message.into(),
    }
}

/// Creates an unsupported descriptor version error
pub fn unsupported_version(
    kind: impl Into<String>,
    version: impl Into<String>,
    accepted: impl Into<String>,
) -> BundleError {
    BundleError::UnsupportedDescriptorVersion {
        kind: kind.into(),
        version: version.into(),
        accepted: accepted.into(),
    }
}
