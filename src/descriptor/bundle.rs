//! Root bundle descriptor (`descriptor.yaml` at the bundle root)

use serde::{Deserialize, Serialize};

use super::{Descriptor, DescriptorKind, DescriptorVersion};

/// Component descriptor paths, grouped the way the bundle lists them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BundleComponents {
    pub plugins: Vec<String>,
    pub widgets: Vec<String>,
    pub fragments: Vec<String>,
    pub pages: Vec<String>,
    pub page_templates: Vec<String>,
    pub content_types: Vec<String>,
    pub content_templates: Vec<String>,
    pub contents: Vec<String>,
    pub assets: Vec<String>,
    pub groups: Vec<String>,
    pub categories: Vec<String>,
    pub languages: Vec<String>,
    pub labels: Vec<String>,
}

impl BundleComponents {
    /// Every listed path with the kind of descriptor it points to
    pub fn entries(&self) -> Vec<(DescriptorKind, &str)> {
        let groups: [(DescriptorKind, &Vec<String>); 13] = [
            (DescriptorKind::Plugin, &self.plugins),
            (DescriptorKind::Widget, &self.widgets),
            (DescriptorKind::Fragment, &self.fragments),
            (DescriptorKind::Page, &self.pages),
            (DescriptorKind::PageTemplate, &self.page_templates),
            (DescriptorKind::ContentType, &self.content_types),
            (DescriptorKind::ContentTemplate, &self.content_templates),
            (DescriptorKind::Content, &self.contents),
            (DescriptorKind::Asset, &self.assets),
            (DescriptorKind::Group, &self.groups),
            (DescriptorKind::Category, &self.categories),
            (DescriptorKind::Language, &self.languages),
            (DescriptorKind::Label, &self.labels),
        ];
        groups
            .into_iter()
            .flat_map(|(kind, paths)| paths.iter().map(move |path| (kind, path.as_str())))
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor_version: Option<String>,

    /// Bundle identifier up to v4
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,

    /// Bundle identifier from v5 on
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,

    /// `standard-bundle` or `system-level-bundle`
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub bundle_type: Option<String>,

    #[serde(default)]
    pub components: BundleComponents,
}

impl BundleDescriptor {
    /// `name` for v5+ bundles, `code` for older ones
    pub fn identifier(&self) -> Option<&str> {
        self.name.as_deref().or(self.code.as_deref())
    }
}

impl Descriptor for BundleDescriptor {
    fn kind(&self) -> DescriptorKind {
        DescriptorKind::Bundle
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
    fn test_parse_bundle_descriptor() {
        let yaml = r#"
descriptorVersion: v5
name: demo-bundle
type: standard-bundle
components:
  widgets:
    - widgets/banner.yaml
  pageTemplates:
    - pageTemplates/main.yaml
"#;
        let descriptor: BundleDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(descriptor.descriptor_version(), Some("v5"));
        assert_eq!(descriptor.identifier(), Some("demo-bundle"));
        assert_eq!(descriptor.bundle_type.as_deref(), Some("standard-bundle"));
        assert_eq!(
            descriptor.components.entries(),
            vec![
                (DescriptorKind::Widget, "widgets/banner.yaml"),
                (DescriptorKind::PageTemplate, "pageTemplates/main.yaml"),
            ]
        );
    }

    #[test]
    fn test_missing_components_is_empty() {
        let descriptor: BundleDescriptor = serde_yaml::from_str("code: legacy").unwrap();
        assert!(descriptor.components.is_empty());
        assert_eq!(descriptor.identifier(), Some("legacy"));
    }
}
