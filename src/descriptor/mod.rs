//! Descriptor model
//!
//! A descriptor is a versioned YAML document describing the bundle itself
//! or one of its components. The bundle, plugin and widget kinds have typed
//! shapes; every other kind is read into a [`ComponentDescriptor`], a
//! free-form mapping with field lookup by name.

pub mod bundle;
pub mod component;
pub mod plugin;
pub mod widget;

pub use bundle::{BundleComponents, BundleDescriptor};
pub use component::ComponentDescriptor;
pub use plugin::{EnvironmentVariable, PluginDescriptor, PluginResources, PluginSpec};
pub use widget::WidgetDescriptor;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Kind of descriptor, as named in error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DescriptorKind {
    Bundle,
    Plugin,
    Widget,
    Page,
    PageTemplate,
    Fragment,
    Category,
    Group,
    Language,
    Label,
    Content,
    ContentTemplate,
    ContentType,
    Asset,
}

impl DescriptorKind {
    /// Every kind except `Bundle` has a generic rule set or a typed one
    pub const COMPONENT_KINDS: [DescriptorKind; 13] = [
        Self::Plugin,
        Self::Widget,
        Self::Page,
        Self::PageTemplate,
        Self::Fragment,
        Self::Category,
        Self::Group,
        Self::Language,
        Self::Label,
        Self::Content,
        Self::ContentTemplate,
        Self::ContentType,
        Self::Asset,
    ];

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Bundle => "bundle",
            Self::Plugin => "plugin",
            Self::Widget => "widget",
            Self::Page => "page",
            Self::PageTemplate => "page template",
            Self::Fragment => "fragment",
            Self::Category => "category",
            Self::Group => "group",
            Self::Language => "language",
            Self::Label => "label",
            Self::Content => "content",
            Self::ContentTemplate => "content template",
            Self::ContentType => "content type",
            Self::Asset => "asset",
        }
    }

    /// Key of this kind's list under the bundle descriptor's `components`
    pub fn components_key(self) -> Option<&'static str> {
        match self {
            Self::Bundle => None,
            Self::Plugin => Some("plugins"),
            Self::Widget => Some("widgets"),
            Self::Page => Some("pages"),
            Self::PageTemplate => Some("pageTemplates"),
            Self::Fragment => Some("fragments"),
            Self::Category => Some("categories"),
            Self::Group => Some("groups"),
            Self::Language => Some("languages"),
            Self::Label => Some("labels"),
            Self::Content => Some("contents"),
            Self::ContentTemplate => Some("contentTemplates"),
            Self::ContentType => Some("contentTypes"),
            Self::Asset => Some("assets"),
        }
    }
}

impl fmt::Display for DescriptorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

/// Descriptor schema version; later versions supersede earlier ones
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptorVersion {
    V1,
    V2,
    V3,
    V4,
    V5,
    V6,
}

impl DescriptorVersion {
    pub const ALL: [DescriptorVersion; 6] = [
        Self::V1,
        Self::V2,
        Self::V3,
        Self::V4,
        Self::V5,
        Self::V6,
    ];

    /// Parse `v1`..`v6`, ignoring case and surrounding whitespace
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Self::ALL
            .into_iter()
            .find(|version| version.as_str().eq_ignore_ascii_case(raw))
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::V1 => "v1",
            Self::V2 => "v2",
            Self::V3 => "v3",
            Self::V4 => "v4",
            Self::V5 => "v5",
            Self::V6 => "v6",
        }
    }
}

impl fmt::Display for DescriptorVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common surface of every descriptor the validator can check
pub trait Descriptor {
    fn kind(&self) -> DescriptorKind;

    /// `descriptorVersion` as written, if any
    fn descriptor_version(&self) -> Option<&str>;

    /// `descriptorVersion` rendered as written when it is set but not a string
    fn malformed_version(&self) -> Option<String> {
        None
    }

    fn set_descriptor_version(&mut self, version: DescriptorVersion);

    /// Version assumed when `descriptorVersion` is absent
    fn default_version(&self) -> DescriptorVersion {
        DescriptorVersion::V1
    }
}

/// Whether a field carries a non-empty value
pub trait Presence {
    fn is_present(&self) -> bool;
}

impl Presence for String {
    fn is_present(&self) -> bool {
        !self.trim().is_empty()
    }
}

impl<T> Presence for Vec<T> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl<K, V> Presence for BTreeMap<K, V> {
    fn is_present(&self) -> bool {
        !self.is_empty()
    }
}

impl Presence for serde_yaml::Value {
    fn is_present(&self) -> bool {
        match self {
            serde_yaml::Value::Null => false,
            serde_yaml::Value::String(s) => s.is_present(),
            serde_yaml::Value::Sequence(items) => !items.is_empty(),
            serde_yaml::Value::Mapping(map) => !map.is_empty(),
            serde_yaml::Value::Tagged(tagged) => tagged.value.is_present(),
            serde_yaml::Value::Bool(_) | serde_yaml::Value::Number(_) => true,
        }
    }
}

impl<T: Presence> Presence for Option<T> {
    fn is_present(&self) -> bool {
        self.as_ref().is_some_and(Presence::is_present)
    }
}
