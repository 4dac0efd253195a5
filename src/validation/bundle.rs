//! Bundle descriptor rules

use super::{Check, CheckResult, DescriptorValidator, Field, ValidationRuleSet, is_safe_relative_path};
use crate::descriptor::{BundleDescriptor, DescriptorVersion, Presence};

pub const BUNDLE_TYPES: &[&str] = &["standard-bundle", "system-level-bundle"];

fn code() -> Field<BundleDescriptor> {
    Field::new("code", |d: &BundleDescriptor| d.code.is_present())
}

fn name() -> Field<BundleDescriptor> {
    Field::new("name", |d: &BundleDescriptor| d.name.is_present())
}

fn component_paths(descriptor: BundleDescriptor) -> CheckResult<BundleDescriptor> {
    if let Some((kind, path)) = descriptor
        .components
        .entries()
        .into_iter()
        .find(|(_, path)| !is_safe_relative_path(path))
    {
        return Err(format!(
            "{kind} component path '{path}' must be a non-empty relative path inside the bundle"
        ));
    }
    Ok(descriptor)
}

fn bundle_type(descriptor: BundleDescriptor) -> CheckResult<BundleDescriptor> {
    match descriptor.bundle_type.as_deref() {
        Some(value) if !BUNDLE_TYPES.contains(&value) => Err(format!(
            "type '{value}' is not one of {}",
            BUNDLE_TYPES.join(", ")
        )),
        _ => Ok(descriptor),
    }
}

fn thumbnail(descriptor: BundleDescriptor) -> CheckResult<BundleDescriptor> {
    match descriptor.thumbnail.as_deref() {
        Some(path) if !path.trim().is_empty() && !is_safe_relative_path(path) => Err(format!(
            "thumbnail '{path}' must be a relative path inside the bundle"
        )),
        _ => Ok(descriptor),
    }
}

fn v1() -> ValidationRuleSet<BundleDescriptor> {
    ValidationRuleSet::new()
        .require(code())
        .forbid(name())
        .check(Check::new("component-paths", component_paths))
}

fn v5() -> ValidationRuleSet<BundleDescriptor> {
    ValidationRuleSet::new()
        .require(name())
        .forbid(code())
        .check(Check::new("component-paths", component_paths))
        .check(Check::new("bundle-type", bundle_type))
}

pub fn validator() -> DescriptorValidator<BundleDescriptor> {
    DescriptorValidator::new()
        .with_rule_set(DescriptorVersion::V1, v1())
        .with_rule_set(DescriptorVersion::V5, v5())
        .with_rule_set(
            DescriptorVersion::V6,
            v5().check(Check::new("thumbnail", thumbnail)),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BundleError;

    fn parse(yaml: &str) -> BundleDescriptor {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_v1_bundle_is_valid() {
        let descriptor = parse("code: legacy-bundle\ncomponents:\n  widgets: [widgets/a.yaml]\n");
        let validated = validator().validate(descriptor).unwrap();
        assert_eq!(validated.descriptor_version.as_deref(), Some("v1"));
    }

    #[test]
    fn test_v5_bundle_with_code_is_rejected() {
        let descriptor = parse("descriptorVersion: v5\nname: demo\ncode: demo\n");
        let err = validator().validate(descriptor).unwrap_err();
        assert!(matches!(err, BundleError::InvalidBundle { .. }));
        assert!(err.to_string().contains("code"));
    }

    #[test]
    fn test_undeclared_v5_bundle_defaults_to_v1_and_fails() {
        let err = validator().validate(parse("name: demo\n")).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("v1"));
        assert!(message.contains("missing required fields: code"));
    }

    #[test]
    fn test_unsafe_component_path_is_rejected() {
        let descriptor =
            parse("descriptorVersion: v5\nname: demo\ncomponents:\n  pages: [../outside.yaml]\n");
        let err = validator().validate(descriptor).unwrap_err();
        assert!(err.to_string().contains("../outside.yaml"));
    }

    #[test]
    fn test_unknown_bundle_type_is_rejected() {
        let descriptor = parse("descriptorVersion: v5\nname: demo\ntype: mega-bundle\n");
        let err = validator().validate(descriptor).unwrap_err();
        assert!(err.to_string().contains("mega-bundle"));
    }

    #[test]
    fn test_v6_thumbnail_must_be_relative() {
        let ok = parse("descriptorVersion: v6\nname: demo\nthumbnail: thumbnail.png\n");
        assert!(validator().validate(ok).is_ok());

        let bad = parse("descriptorVersion: v6\nname: demo\nthumbnail: /etc/thumb.png\n");
        assert!(validator().validate(bad).is_err());
    }

    #[test]
    fn test_v5_ignores_thumbnail_shape() {
        let descriptor = parse("descriptorVersion: v5\nname: demo\nthumbnail: /abs.png\n");
        assert!(validator().validate(descriptor).is_ok());
    }

    #[test]
    fn test_unregistered_bundle_version() {
        let err = validator()
            .validate(parse("descriptorVersion: v3\ncode: demo\n"))
            .unwrap_err();
        assert!(err.to_string().contains("v1, v5, v6"));
    }
}
