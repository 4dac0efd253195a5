//! Archive and file access errors

use super::BundleError;

/// Creates a file not found error
pub fn not_found(path: impl Into<String>) -> BundleError {
    BundleError::FileNotFound { path: path.into() }
}

/// Creates a descriptor not found error
pub fn descriptor_not_found(path: impl Into<String>) -> BundleError {
    BundleError::DescriptorNotFound { path: path.into() }
}

/// Creates a descriptor parse failed error
pub fn descriptor_parse_failed(path: impl Into<String>, reason: impl Into<String>) -> BundleError {
    BundleError::DescriptorParseFailed {
        path: path.into(),
        reason: reason.into(),
    }
}

/// Creates an archive read failed error
pub fn archive_read_failed(path: impl Into<String>, reason: impl Into<String>) -> BundleError {
    BundleError::ArchiveReadFailed {
        path: path.into(),
        reason: reason.into(),
    }
}

/// Creates an IO error
pub fn io_error(message: impl Into<String>) -> BundleError {
    BundleError::IoError {
        message: message.into(),
    }
}
