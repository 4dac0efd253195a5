//! Plugin descriptor rules
//!
//! Each version builds on the previous one: v3 lets the plugin pick its
//! name and deployment base name, v4 adds environment variables, v5
//! constrains the security level and v6 adds resource requests.

use std::sync::LazyLock;

use regex::Regex;

use super::{Check, CheckResult, DescriptorValidator, Field, ValidationRuleSet};
use crate::descriptor::{DescriptorVersion, PluginDescriptor, Presence};
use crate::image::{DOCKER_TRANSPORT, ImageReference};

pub const DBMS_VALUES: &[&str] = &["none", "embedded", "postgresql", "mysql", "oracle"];

pub const SECURITY_LEVELS: &[&str] = &["strict", "lenient"];

/// Longest deployment base name that still leaves room for generated suffixes
pub const MAX_DEPLOYMENT_BASE_NAME_LENGTH: usize = 50;

// Literal patterns; compiled on first use and covered by tests
#[allow(clippy::expect_used)]
static DNS_LABEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("valid DNS label regex")
});

/// Kubernetes resource quantity (`512Mi`, `500m`, `1.5`, `1e3`)
#[allow(clippy::expect_used)]
static QUANTITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([+-]?[0-9.]+)([eEinumkKMGTP]*[-+]?[0-9]*)$").expect("valid quantity regex")
});

fn spec() -> Field<PluginDescriptor> {
    Field::new("spec", |d: &PluginDescriptor| d.spec.is_present())
}

fn image() -> Field<PluginDescriptor> {
    Field::new("image", |d: &PluginDescriptor| d.image.is_present())
}

fn dbms() -> Field<PluginDescriptor> {
    Field::new("dbms", |d: &PluginDescriptor| d.dbms.is_present())
}

fn health_check_path() -> Field<PluginDescriptor> {
    Field::new("healthCheckPath", |d: &PluginDescriptor| {
        d.health_check_path.is_present()
    })
}

fn name() -> Field<PluginDescriptor> {
    Field::new("name", |d: &PluginDescriptor| d.name.is_present())
}

fn deployment_base_name() -> Field<PluginDescriptor> {
    Field::new("deploymentBaseName", |d: &PluginDescriptor| {
        d.deployment_base_name.is_present()
    })
}

fn environment_variables() -> Field<PluginDescriptor> {
    Field::new("environmentVariables", |d: &PluginDescriptor| {
        d.environment_variables.is_present()
    })
}

fn resources() -> Field<PluginDescriptor> {
    Field::new("resources", |d: &PluginDescriptor| d.resources.is_present())
}

/// Plugin images are written without transport and may omit the registry
/// (`org/repo:tag` means `docker.io/org/repo:tag`)
pub fn plugin_image_reference(image: &str) -> ImageReference {
    let image = image.trim();
    let first = image.split('/').next().unwrap_or_default();
    let has_registry = image.contains('/')
        && (first.contains('.') || first.contains(':') || first == "localhost");
    let qualified = if has_registry {
        format!("{DOCKER_TRANSPORT}://{image}")
    } else {
        format!("{DOCKER_TRANSPORT}://docker.io/{image}")
    };
    ImageReference::parse(&qualified)
}

fn check_image_format(image: &str) -> Result<(), String> {
    plugin_image_reference(image)
        .validate_or_err("plugin image")
        .map_err(|e| format!("image '{image}' is not a valid image reference: {e}"))
}

fn check_dbms(dbms: &str) -> Result<(), String> {
    if DBMS_VALUES.contains(&dbms.trim().to_ascii_lowercase().as_str()) {
        Ok(())
    } else {
        Err(format!(
            "dbms '{dbms}' is not one of {}",
            DBMS_VALUES.join(", ")
        ))
    }
}

fn legacy_spec(descriptor: PluginDescriptor) -> CheckResult<PluginDescriptor> {
    let Some(spec) = descriptor.spec.as_ref() else {
        return Ok(descriptor);
    };
    let image = spec
        .image
        .as_deref()
        .filter(|image| !image.trim().is_empty())
        .ok_or_else(|| "spec.image is required".to_string())?;
    check_image_format(image)?;
    if let Some(dbms) = spec.dbms.as_deref() {
        check_dbms(dbms)?;
    }
    Ok(descriptor)
}

fn image_format(descriptor: PluginDescriptor) -> CheckResult<PluginDescriptor> {
    if let Some(image) = descriptor.image.as_deref() {
        check_image_format(image)?;
    }
    Ok(descriptor)
}

fn dbms_value(descriptor: PluginDescriptor) -> CheckResult<PluginDescriptor> {
    if let Some(dbms) = descriptor.dbms.as_deref() {
        check_dbms(dbms)?;
    }
    Ok(descriptor)
}

fn deployment_base_name_shape(descriptor: PluginDescriptor) -> CheckResult<PluginDescriptor> {
    if let Some(base_name) = descriptor.deployment_base_name.as_deref() {
        if base_name.len() > MAX_DEPLOYMENT_BASE_NAME_LENGTH {
            return Err(format!(
                "deploymentBaseName '{base_name}' is longer than {MAX_DEPLOYMENT_BASE_NAME_LENGTH} characters"
            ));
        }
        if !DNS_LABEL_RE.is_match(base_name) {
            return Err(format!(
                "deploymentBaseName '{base_name}' must contain only lowercase letters, digits and '-', and start and end with a letter or digit"
            ));
        }
    }
    Ok(descriptor)
}

fn environment_variable_shape(descriptor: PluginDescriptor) -> CheckResult<PluginDescriptor> {
    for (index, variable) in descriptor
        .environment_variables
        .iter()
        .flatten()
        .enumerate()
    {
        if variable.name.trim().is_empty() {
            return Err(format!("environmentVariables[{index}] has no name"));
        }
        let has_value = variable.value.is_some();
        let secret = variable.secret_key_ref();
        match (has_value, secret) {
            (true, Some(_)) => {
                return Err(format!(
                    "environment variable '{}' sets both value and valueFrom.secretKeyRef",
                    variable.name
                ));
            }
            (false, None) => {
                return Err(format!(
                    "environment variable '{}' needs either value or valueFrom.secretKeyRef",
                    variable.name
                ));
            }
            (false, Some(secret)) if secret.name.trim().is_empty() || secret.key.trim().is_empty() => {
                return Err(format!(
                    "environment variable '{}' has a secretKeyRef without name or key",
                    variable.name
                ));
            }
            _ => {}
        }
    }
    Ok(descriptor)
}

fn security_level(descriptor: PluginDescriptor) -> CheckResult<PluginDescriptor> {
    match descriptor.security_level.as_deref() {
        Some(level) if !SECURITY_LEVELS.contains(&level.trim().to_ascii_lowercase().as_str()) => {
            Err(format!(
                "securityLevel '{level}' is not one of {}",
                SECURITY_LEVELS.join(", ")
            ))
        }
        _ => Ok(descriptor),
    }
}

fn resource_quantities(descriptor: PluginDescriptor) -> CheckResult<PluginDescriptor> {
    if let Some(resources) = descriptor.resources.as_ref() {
        if let Some((name, value)) = resources
            .quantities()
            .into_iter()
            .find(|(_, value)| !QUANTITY_RE.is_match(value.trim()))
        {
            return Err(format!(
                "resources.{name} '{value}' is not a valid resource quantity"
            ));
        }
    }
    Ok(descriptor)
}

fn v1() -> ValidationRuleSet<PluginDescriptor> {
    ValidationRuleSet::new()
        .require(spec())
        .forbid(image())
        .forbid(dbms())
        .forbid(health_check_path())
        .forbid(name())
        .forbid(deployment_base_name())
        .forbid(environment_variables())
        .forbid(resources())
        .check(Check::new("legacy-spec", legacy_spec))
}

fn v2() -> ValidationRuleSet<PluginDescriptor> {
    ValidationRuleSet::new()
        .require(image())
        .require(dbms())
        .require(health_check_path())
        .forbid(spec())
        .forbid(name())
        .forbid(deployment_base_name())
        .forbid(environment_variables())
        .forbid(resources())
        .check(Check::new("image-format", image_format))
        .check(Check::new("dbms", dbms_value))
}

fn v3() -> ValidationRuleSet<PluginDescriptor> {
    v2().allow("name")
        .allow("deploymentBaseName")
        .check(Check::new("deployment-base-name", deployment_base_name_shape))
}

fn v4() -> ValidationRuleSet<PluginDescriptor> {
    v3().allow("environmentVariables")
        .check(Check::new("environment-variables", environment_variable_shape))
}

fn v5() -> ValidationRuleSet<PluginDescriptor> {
    v4().check(Check::new("security-level", security_level))
}

fn v6() -> ValidationRuleSet<PluginDescriptor> {
    v5().allow("resources")
        .check(Check::new("resources", resource_quantities))
}

pub fn validator() -> DescriptorValidator<PluginDescriptor> {
    DescriptorValidator::new()
        .with_rule_set(DescriptorVersion::V1, v1())
        .with_rule_set(DescriptorVersion::V2, v2())
        .with_rule_set(DescriptorVersion::V3, v3())
        .with_rule_set(DescriptorVersion::V4, v4())
        .with_rule_set(DescriptorVersion::V5, v5())
        .with_rule_set(DescriptorVersion::V6, v6())
}
