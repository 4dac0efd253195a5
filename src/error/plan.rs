//! Install plan errors

use super::BundleError;

/// Creates an install plan invariant violation error
pub fn violation(
    category: impl Into<String>,
    component: impl Into<String>,
    status: impl Into<String>,
    action: impl Into<String>,
) -> BundleError {
    BundleError::InstallPlanViolation {
        category: category.into(),
        component: component.into(),
        status: status.into(),
        action: action.into(),
    }
}

/// Creates an invalid install plan error
pub fn invalid(message: impl Into<String>) -> BundleError {
    BundleError::InvalidInstallPlan {
        message: message.into(),
    }
}
