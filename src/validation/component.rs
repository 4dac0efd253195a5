//! Rules for component kinds read as free-form descriptors

use std::collections::BTreeMap;

use super::{Check, CheckResult, DescriptorValidator, Field, ValidationRuleSet, exactly_one_of};
use crate::descriptor::{ComponentDescriptor, DescriptorKind, DescriptorVersion};

/// Fields every descriptor of a generic kind must set
pub fn required_fields(kind: DescriptorKind) -> &'static [&'static str] {
    match kind {
        DescriptorKind::Page => &["code", "parentCode", "titles"],
        DescriptorKind::PageTemplate => &["code", "description"],
        DescriptorKind::Fragment => &["code"],
        DescriptorKind::Category => &["code", "titles"],
        DescriptorKind::Group => &["code", "name"],
        DescriptorKind::Language => &["code", "description"],
        DescriptorKind::Label => &["key", "titles"],
        DescriptorKind::Content => &["id", "typeCode"],
        DescriptorKind::ContentTemplate => &["id", "contentType"],
        DescriptorKind::ContentType => &["code", "name"],
        DescriptorKind::Asset => &["correlationCode", "type", "name"],
        DescriptorKind::Bundle | DescriptorKind::Plugin | DescriptorKind::Widget => &[],
    }
}

fn field(name: &'static str) -> Field<ComponentDescriptor> {
    Field::new(name, move |d: &ComponentDescriptor| d.has_field(name))
}

fn fragment_gui_source(descriptor: ComponentDescriptor) -> CheckResult<ComponentDescriptor> {
    exactly_one_of(
        ("guiCode", descriptor.has_field("guiCode")),
        ("guiCodePath", descriptor.has_field("guiCodePath")),
    )?;
    Ok(descriptor)
}

fn rule_set(kind: DescriptorKind) -> ValidationRuleSet<ComponentDescriptor> {
    let rules = required_fields(kind)
        .iter()
        .copied()
        .fold(ValidationRuleSet::new(), |rules, name| rules.require(field(name)));
    match kind {
        DescriptorKind::Fragment => rules.check(Check::new("gui-source", fragment_gui_source)),
        _ => rules,
    }
}

/// One v1-only validator per generic kind
pub fn validators() -> BTreeMap<DescriptorKind, DescriptorValidator<ComponentDescriptor>> {
    DescriptorKind::COMPONENT_KINDS
        .into_iter()
        .filter(|kind| !matches!(kind, DescriptorKind::Plugin | DescriptorKind::Widget))
        .map(|kind| {
            (
                kind,
                DescriptorValidator::new().with_rule_set(DescriptorVersion::V1, rule_set(kind)),
            )
        })
        .collect()
}
