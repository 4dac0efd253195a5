//! Versioned descriptor validation
//!
//! This module provides:
//! - [`ValidationRuleSet`]: required fields, forbidden fields and ordered
//!   semantic checks for one (kind, version) pair
//! - [`DescriptorValidator`]: version resolution plus the rule set table
//!   for one descriptor kind
//! - [`ValidatorRegistry`]: every registered validator, built eagerly and
//!   read-only afterwards
//!
//! A validation call resolves the version (defaulting it when absent), runs
//! the structural checks, then the semantic checks in registration order.
//! Structural checks report every violated field of the rule set at once;
//! semantic checks stop at the first failure.

pub mod bundle;
pub mod component;
pub mod plugin;
pub mod widget;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::descriptor::{
    BundleDescriptor, ComponentDescriptor, Descriptor, DescriptorKind, DescriptorVersion,
    PluginDescriptor, WidgetDescriptor,
};
use crate::error::{Result, invalid_bundle, unsupported_version};

/// Message of a failed semantic check
pub type CheckResult<D> = std::result::Result<D, String>;

/// Named accessor telling whether a descriptor field is set
pub struct Field<D> {
    name: &'static str,
    is_present: Arc<dyn Fn(&D) -> bool + Send + Sync>,
}

impl<D> Field<D> {
    pub fn new(name: &'static str, is_present: impl Fn(&D) -> bool + Send + Sync + 'static) -> Self {
        Self {
            name,
            is_present: Arc::new(is_present),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_present(&self, descriptor: &D) -> bool {
        (self.is_present)(descriptor)
    }
}

impl<D> Clone for Field<D> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            is_present: Arc::clone(&self.is_present),
        }
    }
}

impl<D> fmt::Debug for Field<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Semantic check; may return a further-defaulted descriptor
pub struct Check<D> {
    name: &'static str,
    run: Arc<dyn Fn(D) -> CheckResult<D> + Send + Sync>,
}

impl<D> Check<D> {
    pub fn new(name: &'static str, run: impl Fn(D) -> CheckResult<D> + Send + Sync + 'static) -> Self {
        Self {
            name,
            run: Arc::new(run),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<D> Clone for Check<D> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            run: Arc::clone(&self.run),
        }
    }
}

impl<D> fmt::Debug for Check<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Constraints for one (kind, version) pair
pub struct ValidationRuleSet<D> {
    required: Vec<Field<D>>,
    forbidden: Vec<Field<D>>,
    checks: Vec<Check<D>>,
}

impl<D> Default for ValidationRuleSet<D> {
    fn default() -> Self {
        Self {
            required: Vec::new(),
            forbidden: Vec::new(),
            checks: Vec::new(),
        }
    }
}

impl<D> Clone for ValidationRuleSet<D> {
    fn clone(&self) -> Self {
        Self {
            required: self.required.clone(),
            forbidden: self.forbidden.clone(),
            checks: self.checks.clone(),
        }
    }
}

impl<D> fmt::Debug for ValidationRuleSet<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationRuleSet")
            .field("required", &self.required)
            .field("forbidden", &self.forbidden)
            .field("checks", &self.checks)
            .finish()
    }
}

impl<D> ValidationRuleSet<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, field: Field<D>) -> Self {
        self.forbidden.retain(|f| f.name != field.name);
        self.required.push(field);
        self
    }

    pub fn forbid(mut self, field: Field<D>) -> Self {
        self.required.retain(|f| f.name != field.name);
        self.forbidden.push(field);
        self
    }

    /// Drop any constraint on the named field
    pub fn allow(mut self, name: &str) -> Self {
        self.required.retain(|f| f.name != name);
        self.forbidden.retain(|f| f.name != name);
        self
    }

    pub fn check(mut self, check: Check<D>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn required_fields(&self) -> Vec<&'static str> {
        self.required.iter().map(Field::name).collect()
    }

    pub fn forbidden_fields(&self) -> Vec<&'static str> {
        self.forbidden.iter().map(Field::name).collect()
    }

    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(Check::name).collect()
    }

    /// Violated structural constraints, as a human-readable message
    fn structural_violations(&self, descriptor: &D) -> Option<String> {
        let missing: Vec<&str> = self
            .required
            .iter()
            .filter(|field| !field.is_present(descriptor))
            .map(Field::name)
            .collect();
        let unexpected: Vec<&str> = self
            .forbidden
            .iter()
            .filter(|field| field.is_present(descriptor))
            .map(Field::name)
            .collect();

        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("missing required fields: {}", missing.join(", ")));
        }
        if !unexpected.is_empty() {
            parts.push(format!(
                "fields not allowed in this version: {}",
                unexpected.join(", ")
            ));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join("; "))
        }
    }
}

/// Version table and validation entry point for one descriptor type
pub struct DescriptorValidator<D> {
    rule_sets: BTreeMap<DescriptorVersion, ValidationRuleSet<D>>,
}

impl<D> Default for DescriptorValidator<D> {
    fn default() -> Self {
        Self {
            rule_sets: BTreeMap::new(),
        }
    }
}

impl<D> fmt::Debug for DescriptorValidator<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.rule_sets.iter()).finish()
    }
}

impl<D: Descriptor> DescriptorValidator<D> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rule_set(mut self, version: DescriptorVersion, rules: ValidationRuleSet<D>) -> Self {
        self.rule_sets.insert(version, rules);
        self
    }

    pub fn accepted_versions(&self) -> Vec<DescriptorVersion> {
        self.rule_sets.keys().copied().collect()
    }

    pub fn rule_set(&self, version: DescriptorVersion) -> Option<&ValidationRuleSet<D>> {
        self.rule_sets.get(&version)
    }

    fn accepted_list(&self) -> String {
        self.rule_sets
            .keys()
            .map(|v| v.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Resolve the descriptor's version, defaulting it when absent, and
    /// return it with the version filled in
    pub fn resolve_version(&self, mut descriptor: D) -> Result<(DescriptorVersion, D)> {
        let kind = descriptor.kind();
        if let Some(raw) = descriptor.malformed_version() {
            return Err(unsupported_version(kind.display_name(), &raw, self.accepted_list()));
        }
        let declared = descriptor
            .descriptor_version()
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
            .map(str::to_string);

        let version = match &declared {
            Some(raw) => DescriptorVersion::parse(raw)
                .filter(|v| self.rule_sets.contains_key(v))
                .ok_or_else(|| unsupported_version(kind.display_name(), raw, self.accepted_list()))?,
            None => {
                let version = descriptor.default_version();
                if !self.rule_sets.contains_key(&version) {
                    return Err(unsupported_version(
                        kind.display_name(),
                        version.as_str(),
                        self.accepted_list(),
                    ));
                }
                debug!(kind = %kind, version = %version, "Defaulted descriptorVersion");
                version
            }
        };
        descriptor.set_descriptor_version(version);
        Ok((version, descriptor))
    }

    /// Validate `descriptor`, returning it with its version resolved
    pub fn validate(&self, descriptor: D) -> Result<D> {
        let (version, descriptor) = self.resolve_version(descriptor)?;
        let kind = descriptor.kind();
        let rules = self.rule_sets.get(&version).ok_or_else(|| {
            unsupported_version(kind.display_name(), version.as_str(), self.accepted_list())
        })?;

        if let Some(message) = rules.structural_violations(&descriptor) {
            return Err(invalid_bundle(kind.display_name(), version.as_str(), message));
        }

        let mut descriptor = descriptor;
        for check in &rules.checks {
            descriptor = (check.run)(descriptor)
                .map_err(|message| invalid_bundle(kind.display_name(), version.as_str(), message))?;
        }

        debug!(kind = %kind, version = %version, "Descriptor is valid");
        Ok(descriptor)
    }
}

/// Every validator, built once up front
#[derive(Debug)]
pub struct ValidatorRegistry {
    bundle: DescriptorValidator<BundleDescriptor>,
    plugin: DescriptorValidator<PluginDescriptor>,
    widget: DescriptorValidator<WidgetDescriptor>,
    components: BTreeMap<DescriptorKind, DescriptorValidator<ComponentDescriptor>>,
}

impl Default for ValidatorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self {
            bundle: bundle::validator(),
            plugin: plugin::validator(),
            widget: widget::validator(),
            components: component::validators(),
        }
    }

    pub fn bundle(&self) -> &DescriptorValidator<BundleDescriptor> {
        &self.bundle
    }

    pub fn plugin(&self) -> &DescriptorValidator<PluginDescriptor> {
        &self.plugin
    }

    pub fn widget(&self) -> &DescriptorValidator<WidgetDescriptor> {
        &self.widget
    }

    /// Validator for a generic component kind (not bundle, plugin or widget)
    pub fn component(&self, kind: DescriptorKind) -> Option<&DescriptorValidator<ComponentDescriptor>> {
        self.components.get(&kind)
    }

    pub fn validate_component(&self, descriptor: ComponentDescriptor) -> Result<ComponentDescriptor> {
        let kind = descriptor.kind();
        match self.components.get(&kind) {
            Some(validator) => validator.validate(descriptor),
            None => Err(invalid_bundle(
                kind.display_name(),
                descriptor.descriptor_version().unwrap_or("unknown"),
                "no generic rules are registered for this kind",
            )),
        }
    }

    /// Versions accepted for `kind`
    pub fn accepted_versions(&self, kind: DescriptorKind) -> Vec<DescriptorVersion> {
        match kind {
            DescriptorKind::Bundle => self.bundle.accepted_versions(),
            DescriptorKind::Plugin => self.plugin.accepted_versions(),
            DescriptorKind::Widget => self.widget.accepted_versions(),
            other => self
                .components
                .get(&other)
                .map(DescriptorValidator::accepted_versions)
                .unwrap_or_default(),
        }
    }
}

/// Exactly one of two optional values must be set
pub(crate) fn exactly_one_of(first: (&str, bool), second: (&str, bool)) -> std::result::Result<(), String> {
    match (first.1, second.1) {
        (true, false) | (false, true) => Ok(()),
        (true, true) => Err(format!(
            "only one of {} and {} may be set",
            first.0, second.0
        )),
        (false, false) => Err(format!("one of {} or {} is required", first.0, second.0)),
    }
}

/// Relative, non-empty, no `..` segments
pub(crate) fn is_safe_relative_path(path: &str) -> bool {
    let path = path.trim();
    !path.is_empty()
        && !path.starts_with('/')
        && !path.starts_with('\\')
        && !path.chars().nth(1).is_some_and(|c| c == ':')
        && !path.split(['/', '\\']).any(|segment| segment == "..")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Presence;

    #[derive(Debug, Clone, Default)]
    struct Sample {
        version: Option<String>,
        code: Option<String>,
        name: Option<String>,
        visits: u32,
    }

    impl Descriptor for Sample {
        fn kind(&self) -> DescriptorKind {
            DescriptorKind::Group
        }

        fn descriptor_version(&self) -> Option<&str> {
            self.version.as_deref()
        }

        fn set_descriptor_version(&mut self, version: DescriptorVersion) {
            self.version = Some(version.as_str().to_string());
        }
    }

    fn code() -> Field<Sample> {
        Field::new("code", |d: &Sample| d.code.is_present())
    }

    fn name() -> Field<Sample> {
        Field::new("name", |d: &Sample| d.name.is_present())
    }

    fn validator() -> DescriptorValidator<Sample> {
        DescriptorValidator::new()
            .with_rule_set(
                DescriptorVersion::V1,
                ValidationRuleSet::new().require(code()).forbid(name()),
            )
            .with_rule_set(
                DescriptorVersion::V5,
                ValidationRuleSet::new()
                    .require(name())
                    .forbid(code())
                    .check(Check::new("count", |mut d: Sample| {
                        d.visits += 1;
                        Ok(d)
                    }))
                    .check(Check::new("count-again", |mut d: Sample| {
                        d.visits += 1;
                        Ok(d)
                    })),
            )
    }

    #[test]
    fn test_missing_version_is_defaulted() {
        let sample = Sample {
            code: Some("a".into()),
            ..Sample::default()
        };
        let validated = validator().validate(sample).unwrap();
        assert_eq!(validated.version.as_deref(), Some("v1"));
    }

    #[test]
    fn test_unregistered_version_lists_accepted() {
        let sample = Sample {
            version: Some("v3".into()),
            code: Some("a".into()),
            ..Sample::default()
        };
        let err = validator().validate(sample).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("'v3'"));
        assert!(message.contains("v1, v5"));
    }

    #[test]
    fn test_malformed_version_is_unsupported() {
        let sample = Sample {
            version: Some("version-one".into()),
            ..Sample::default()
        };
        let err = validator().validate(sample).unwrap_err();
        assert!(matches!(
            err,
            crate::error::BundleError::UnsupportedDescriptorVersion { .. }
        ));
    }

    #[test]
    fn test_structural_violations_are_collected() {
        let sample = Sample {
            version: Some("v1".into()),
            name: Some("n".into()),
            ..Sample::default()
        };
        let message = validator().validate(sample).unwrap_err().to_string();
        assert!(message.contains("missing required fields: code"));
        assert!(message.contains("fields not allowed in this version: name"));
        assert!(message.contains("v1"));
    }

    #[test]
    fn test_checks_run_in_order_and_thread_descriptor() {
        let sample = Sample {
            version: Some("V5".into()),
            name: Some("n".into()),
            ..Sample::default()
        };
        let validated = validator().validate(sample).unwrap();
        assert_eq!(validated.visits, 2);
        assert_eq!(validated.version.as_deref(), Some("v5"));
    }

    #[test]
    fn test_check_failure_stops_validation() {
        let validator = DescriptorValidator::new().with_rule_set(
            DescriptorVersion::V1,
            ValidationRuleSet::new()
                .check(Check::new("fails", |_: Sample| Err("first failure".to_string())))
                .check(Check::new("never", |_: Sample| Err("second failure".to_string()))),
        );
        let message = validator.validate(Sample::default()).unwrap_err().to_string();
        assert!(message.contains("first failure"));
        assert!(!message.contains("second failure"));
    }

    #[test]
    fn test_rule_set_allow_and_replace() {
        let rules = ValidationRuleSet::new()
            .require(code())
            .forbid(name())
            .allow("name")
            .forbid(code());
        assert!(rules.required_fields().is_empty());
        assert_eq!(rules.forbidden_fields(), vec!["code"]);
    }

    #[test]
    fn test_exactly_one_of() {
        assert!(exactly_one_of(("a", true), ("b", false)).is_ok());
        assert!(exactly_one_of(("a", false), ("b", true)).is_ok());
        assert!(exactly_one_of(("a", true), ("b", true)).is_err());
        assert!(exactly_one_of(("a", false), ("b", false)).is_err());
    }

    #[test]
    fn test_is_safe_relative_path() {
        assert!(is_safe_relative_path("widgets/banner.yaml"));
        assert!(!is_safe_relative_path(""));
        assert!(!is_safe_relative_path("/etc/passwd"));
        assert!(!is_safe_relative_path("widgets/../../x.yaml"));
        assert!(!is_safe_relative_path("C:\\bundle\\x.yaml"));
    }

    #[test]
    fn test_registry_is_complete() {
        let registry = ValidatorRegistry::new();
        for kind in DescriptorKind::COMPONENT_KINDS {
            assert!(
                !registry.accepted_versions(kind).is_empty(),
                "no rules for {kind}"
            );
        }
        assert!(!registry.accepted_versions(DescriptorKind::Bundle).is_empty());
        assert!(registry.component(DescriptorKind::Plugin).is_none());
    }
}
