//! Widget descriptor rules

use super::{Check, CheckResult, DescriptorValidator, Field, ValidationRuleSet, exactly_one_of};
use crate::descriptor::{DescriptorVersion, Presence, WidgetDescriptor};

pub const WIDGET_TYPES: &[&str] = &["widget", "widget-config", "app-builder"];

const WIDGET_CONFIG_TYPE: &str = "widget-config";

fn code() -> Field<WidgetDescriptor> {
    Field::new("code", |d: &WidgetDescriptor| d.code.is_present())
}

fn name() -> Field<WidgetDescriptor> {
    Field::new("name", |d: &WidgetDescriptor| d.name.is_present())
}

fn titles() -> Field<WidgetDescriptor> {
    Field::new("titles", |d: &WidgetDescriptor| d.titles.is_present())
}

fn widget_type() -> Field<WidgetDescriptor> {
    Field::new("type", |d: &WidgetDescriptor| d.widget_type.is_present())
}

fn custom_ui_source(descriptor: WidgetDescriptor) -> CheckResult<WidgetDescriptor> {
    exactly_one_of(
        ("customUi", descriptor.custom_ui.is_present()),
        ("customUiPath", descriptor.custom_ui_path.is_present()),
    )?;
    Ok(descriptor)
}

fn type_value(descriptor: WidgetDescriptor) -> CheckResult<WidgetDescriptor> {
    match descriptor.widget_type.as_deref() {
        Some(value) if !WIDGET_TYPES.contains(&value) => Err(format!(
            "type '{value}' is not one of {}",
            WIDGET_TYPES.join(", ")
        )),
        _ => Ok(descriptor),
    }
}

fn parent_reference(descriptor: WidgetDescriptor) -> CheckResult<WidgetDescriptor> {
    let has_parent_name = descriptor.parent_name.is_present();
    let has_parent_code = descriptor.parent_code.is_present();
    if has_parent_name && has_parent_code {
        return Err("only one of parentName and parentCode may be set".to_string());
    }
    if descriptor.widget_type.as_deref() == Some(WIDGET_CONFIG_TYPE)
        && (has_parent_name || has_parent_code)
    {
        return Err(format!("a {WIDGET_CONFIG_TYPE} widget cannot have a parent"));
    }
    Ok(descriptor)
}

fn v1() -> ValidationRuleSet<WidgetDescriptor> {
    ValidationRuleSet::new()
        .require(code())
        .require(titles())
        .forbid(name())
        .forbid(widget_type())
        .check(Check::new("custom-ui-source", custom_ui_source))
}

fn v5() -> ValidationRuleSet<WidgetDescriptor> {
    ValidationRuleSet::new()
        .require(name())
        .require(titles())
        .require(widget_type())
        .forbid(code())
        .check(Check::new("type", type_value))
        .check(Check::new("parent", parent_reference))
}

pub fn validator() -> DescriptorValidator<WidgetDescriptor> {
    DescriptorValidator::new()
        .with_rule_set(DescriptorVersion::V1, v1())
        .with_rule_set(DescriptorVersion::V5, v5())
}
