//! Widget descriptor (v1 through v5 shapes)

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Descriptor, DescriptorKind, DescriptorVersion};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor_version: Option<String>,

    /// Widget identifier up to v4
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Widget identifier from v5 on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub titles: Option<BTreeMap<String, String>>,

    /// `widget`, `widget-config` or `app-builder` (v5+)
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub widget_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_ui: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_ui_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_element: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_widget: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_code: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<serde_yaml::Value>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_params: Vec<String>,
}

impl WidgetDescriptor {
    pub fn identifier(&self) -> Option<&str> {
        self.name.as_deref().or(self.code.as_deref())
    }
}

impl Descriptor for WidgetDescriptor {
    fn kind(&self) -> DescriptorKind {
        DescriptorKind::Widget
    }

    fn descriptor_version(&self) -> Option<&str> {
        self.descriptor_version.as_deref()
    }

    fn set_descriptor_version(&mut self, version: DescriptorVersion) {
        self.descriptor_version = Some(version.as_str().to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_v5_widget() {
        let yaml = r#"
descriptorVersion: v5
name: banner
type: widget
titles:
  en: Banner
  it: Banner
customElement: x-banner
"#;
        let widget: WidgetDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(widget.identifier(), Some("banner"));
        assert_eq!(widget.widget_type.as_deref(), Some("widget"));
        assert_eq!(widget.titles.as_ref().map(BTreeMap::len), Some(2));
    }
}
