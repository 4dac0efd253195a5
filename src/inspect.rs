//! Validate a bundle's root descriptor and every component it lists

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::descriptor::{
    BundleDescriptor, ComponentDescriptor, Descriptor, DescriptorKind, PluginDescriptor,
    WidgetDescriptor,
};
use crate::error::Result;
use crate::reader::BundleReader;
use crate::validation::ValidatorRegistry;

/// A validated component descriptor in its typed shape
#[derive(Debug, Clone, PartialEq)]
pub enum ComponentEntry {
    Plugin(PluginDescriptor),
    Widget(WidgetDescriptor),
    Generic(ComponentDescriptor),
}

impl ComponentEntry {
    pub fn kind(&self) -> DescriptorKind {
        match self {
            Self::Plugin(d) => d.kind(),
            Self::Widget(d) => d.kind(),
            Self::Generic(d) => d.kind(),
        }
    }

    /// Resolved `descriptorVersion`
    pub fn version(&self) -> Option<&str> {
        match self {
            Self::Plugin(d) => d.descriptor_version(),
            Self::Widget(d) => d.descriptor_version(),
            Self::Generic(d) => d.descriptor_version(),
        }
    }

    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Plugin(d) => d.name.as_deref().or_else(|| d.effective_image()),
            Self::Widget(d) => d.identifier(),
            Self::Generic(d) => d.identifier(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InspectedComponent {
    /// Descriptor path, relative to the bundle root
    pub path: String,
    pub entry: ComponentEntry,
}

/// Everything learned from a bundle that passed validation
#[derive(Debug, Clone, PartialEq)]
pub struct InspectedBundle {
    pub descriptor: BundleDescriptor,
    pub components: Vec<InspectedComponent>,
    pub resource_files: Vec<String>,
    pub resource_folders: Vec<String>,
}

/// Flat, serializable view of one inspected component
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSummary {
    pub kind: DescriptorKind,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub descriptor_version: String,
}

/// Flat, serializable view of an inspected bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BundleSummary {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<String>,
    pub descriptor_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    pub components: Vec<ComponentSummary>,
    pub resource_files: Vec<String>,
    pub resource_folders: Vec<String>,
}

impl InspectedBundle {
    pub fn summary(&self, digest: Option<&str>) -> BundleSummary {
        BundleSummary {
            bundle: self.descriptor.identifier().map(str::to_string),
            descriptor_version: self
                .descriptor
                .descriptor_version()
                .unwrap_or_default()
                .to_string(),
            digest: digest.map(str::to_string),
            components: self
                .components
                .iter()
                .map(|component| ComponentSummary {
                    kind: component.entry.kind(),
                    path: component.path.clone(),
                    identifier: component.entry.identifier().map(str::to_string),
                    descriptor_version: component.entry.version().unwrap_or_default().to_string(),
                })
                .collect(),
            resource_files: self.resource_files.clone(),
            resource_folders: self.resource_folders.clone(),
        }
    }

    pub fn components_of(&self, kind: DescriptorKind) -> impl Iterator<Item = &InspectedComponent> {
        self.components
            .iter()
            .filter(move |component| component.entry.kind() == kind)
    }
}

#[derive(Debug, Clone, Default)]
pub struct BundleInspector {
    registry: Arc<ValidatorRegistry>,
}

impl BundleInspector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_registry(registry: Arc<ValidatorRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ValidatorRegistry {
        &self.registry
    }

    /// Validate the root descriptor, then each listed component in order;
    /// the first invalid descriptor aborts the inspection
    pub fn inspect(&self, reader: &BundleReader) -> Result<InspectedBundle> {
        let descriptor = self.registry.bundle().validate(reader.bundle_descriptor()?)?;
        info!(
            bundle = descriptor.identifier().unwrap_or("unnamed"),
            version = descriptor.descriptor_version().unwrap_or_default(),
            "Bundle descriptor is valid"
        );

        let mut components = Vec::new();
        for (kind, path) in descriptor.components.entries() {
            let entry = self.read_component(reader, kind, path)?;
            debug!(kind = %kind, path, version = entry.version().unwrap_or_default(), "Component is valid");
            components.push(InspectedComponent {
                path: path.to_string(),
                entry,
            });
        }

        Ok(InspectedBundle {
            components,
            resource_files: reader.resource_files(),
            resource_folders: reader.resource_folders(),
            descriptor,
        })
    }

    fn read_component(
        &self,
        reader: &BundleReader,
        kind: DescriptorKind,
        path: &str,
    ) -> Result<ComponentEntry> {
        match kind {
            DescriptorKind::Plugin => {
                let plugin = reader.read_descriptor_file::<PluginDescriptor>(path)?;
                Ok(ComponentEntry::Plugin(self.registry.plugin().validate(plugin)?))
            }
            DescriptorKind::Widget => {
                let widget = reader.read_descriptor_file::<WidgetDescriptor>(path)?;
                Ok(ComponentEntry::Widget(self.registry.widget().validate(widget)?))
            }
            _ => {
                let component = reader.read_component_descriptor(path, kind)?;
                Ok(ComponentEntry::Generic(
                    self.registry.validate_component(component)?,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BundleError;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn write_bundle(root: &Path, files: &[(&str, &str)]) {
        for (name, content) in files {
            let path = root.join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, content).unwrap();
        }
    }

    const DESCRIPTOR: &str = "descriptorVersion: v5\nname: demo\ncomponents:\n  plugins: [plugins/ms.yaml]\n  widgets: [widgets/banner.yaml]\n  pages: [pages/home.yaml]\n";

    #[test]
    fn test_inspect_valid_bundle() {
        let temp = TempDir::new().unwrap();
        write_bundle(
            temp.path(),
            &[
                ("descriptor.yaml", DESCRIPTOR),
                (
                    "plugins/ms.yaml",
                    "image: entando/todo-ms:1.0.0\ndbms: postgresql\nhealthCheckPath: /health\n",
                ),
                (
                    "widgets/banner.yaml",
                    "descriptorVersion: v5\nname: banner\ntype: widget\ntitles:\n  en: Banner\n",
                ),
                ("pages/home.yaml", "code: home\nparentCode: homepage\ntitles:\n  en: Home\n"),
                ("resources/css/app.css", "body{}"),
            ],
        );
        let reader = BundleReader::open(temp.path()).unwrap();
        let inspected = BundleInspector::new().inspect(&reader).unwrap();

        assert_eq!(inspected.components.len(), 3);
        assert_eq!(inspected.components[0].entry.version(), Some("v2"));
        assert_eq!(
            inspected.components[0].entry.identifier(),
            Some("entando/todo-ms:1.0.0")
        );
        assert_eq!(inspected.components_of(DescriptorKind::Page).count(), 1);
        assert_eq!(inspected.resource_files, vec!["resources/css/app.css"]);
        assert_eq!(inspected.resource_folders, vec!["css"]);

        let summary = serde_json::to_value(inspected.summary(Some("blake3:00"))).unwrap();
        assert_eq!(summary["bundle"], "demo");
        assert_eq!(summary["descriptorVersion"], "v5");
        assert_eq!(summary["components"][1]["kind"], "widget");
        assert_eq!(summary["components"][2]["identifier"], "home");
    }

    #[test]
    fn test_missing_component_descriptor() {
        let temp = TempDir::new().unwrap();
        write_bundle(temp.path(), &[("descriptor.yaml", DESCRIPTOR)]);
        let reader = BundleReader::open(temp.path()).unwrap();
        let err = BundleInspector::new().inspect(&reader).unwrap_err();
        assert!(matches!(err, BundleError::DescriptorNotFound { .. }));
        assert!(err.to_string().contains("plugins/ms.yaml"));
    }

    #[test]
    fn test_invalid_component_stops_inspection() {
        let temp = TempDir::new().unwrap();
        write_bundle(
            temp.path(),
            &[
                ("descriptor.yaml", "name: old-style\n"),
                ("pages/home.yaml", "code: home\n"),
            ],
        );
        let reader = BundleReader::open(temp.path()).unwrap();
        let err = BundleInspector::new().inspect(&reader).unwrap_err();
        assert!(err.to_string().contains("bundle descriptor"));
    }
}
