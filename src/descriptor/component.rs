//! Free-form descriptor for kinds without a typed shape

use serde_yaml::{Mapping, Value};

use super::{Descriptor, DescriptorKind, DescriptorVersion, Presence};
use crate::error::{Result, descriptor_parse_failed};

const VERSION_KEY: &str = "descriptorVersion";

/// Page, fragment, label, ... descriptors read as a YAML mapping
#[derive(Debug, Clone, PartialEq)]
pub struct ComponentDescriptor {
    kind: DescriptorKind,
    fields: Mapping,
}

impl ComponentDescriptor {
    pub fn new(kind: DescriptorKind, fields: Mapping) -> Self {
        Self { kind, fields }
    }

    /// Parse `yaml` (read from `path`) as a `kind` descriptor
    pub fn from_yaml(kind: DescriptorKind, path: &str, yaml: &str) -> Result<Self> {
        match serde_yaml::from_str::<Value>(yaml) {
            Ok(Value::Mapping(fields)) => Ok(Self::new(kind, fields)),
            Ok(Value::Null) => Ok(Self::new(kind, Mapping::new())),
            Ok(_) => Err(descriptor_parse_failed(path, "expected a mapping")),
            Err(e) => Err(descriptor_parse_failed(path, e.to_string())),
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_str(&self, name: &str) -> Option<&str> {
        self.field(name).and_then(Value::as_str)
    }

    /// Whether `name` holds a non-empty value
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some_and(Presence::is_present)
    }

    /// Identifying value: `code`, else `key`, `id`, `correlationCode`, `name`
    pub fn identifier(&self) -> Option<&str> {
        ["code", "key", "id", "correlationCode", "name"]
            .into_iter()
            .find_map(|name| self.field_str(name))
    }

    pub fn fields(&self) -> &Mapping {
        &self.fields
    }
}

impl Descriptor for ComponentDescriptor {
    fn kind(&self) -> DescriptorKind {
        self.kind
    }

    fn descriptor_version(&self) -> Option<&str> {
        self.field_str(VERSION_KEY)
    }

    fn malformed_version(&self) -> Option<String> {
        match self.field(VERSION_KEY)? {
            Value::Null | Value::String(_) => None,
            other => Some(
                serde_yaml::to_string(other)
                    .map(|rendered| rendered.trim().replace('\n', " "))
                    .unwrap_or_else(|_| format!("{other:?}")),
            ),
        }
    }

    fn set_descriptor_version(&mut self, version: DescriptorVersion) {
        self.fields.insert(
            Value::String(VERSION_KEY.to_string()),
            Value::String(version.as_str().to_string()),
        );
    }
}
