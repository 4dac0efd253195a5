//! Install plan model and validation
//!
//! An install plan pairs every component of a bundle, grouped by category,
//! with the diff status detected against the installed version and the
//! action a re-install should take. Valid pairings:
//!
//! | status        | allowed actions      |
//! |---------------|----------------------|
//! | `NEW`         | `CREATE`             |
//! | `DIFF`/`EQUAL`| `SKIP`, `OVERRIDE`   |

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{
    Result, config_read_failed, descriptor_parse_failed, install_plan_violation,
    invalid_install_plan,
};

/// Diff status of a component against what is installed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstallStatus {
    New,
    Diff,
    Equal,
}

impl InstallStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Diff => "DIFF",
            Self::Equal => "EQUAL",
        }
    }
}

impl fmt::Display for InstallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum InstallAction {
    Create,
    Skip,
    Override,
}

impl InstallAction {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Skip => "SKIP",
            Self::Override => "OVERRIDE",
        }
    }

    /// Whether a component with `status` may take this action
    pub fn is_allowed_for(self, status: InstallStatus) -> bool {
        match status {
            InstallStatus::New => self == Self::Create,
            InstallStatus::Diff | InstallStatus::Equal => {
                matches!(self, Self::Skip | Self::Override)
            }
        }
    }
}

impl fmt::Display for InstallAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentInstallPlan {
    pub status: InstallStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<InstallAction>,
}

impl ComponentInstallPlan {
    pub fn new(status: InstallStatus, action: Option<InstallAction>) -> Self {
        Self { status, action }
    }
}

type Category = BTreeMap<String, ComponentInstallPlan>;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InstallPlan {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub widgets: Category,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fragments: Category,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub pages: Category,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub page_templates: Category,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub contents: Category,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub content_templates: Category,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub content_types: Category,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub assets: Category,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub resources: Category,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub plugins: Category,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub categories: Category,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub groups: Category,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: Category,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub languages: Category,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub directories: Category,
}

impl InstallPlan {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| descriptor_parse_failed("install plan", e.to_string()))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| descriptor_parse_failed("install plan", e.to_string()))
    }

    /// Load a plan file; `.json` is read as JSON, anything else as YAML
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| config_read_failed(path.display().to_string(), e.to_string()))?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let parsed = if is_json {
            serde_json::from_str(&text).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&text).map_err(|e| e.to_string())
        };
        parsed.map_err(|reason| descriptor_parse_failed(path.display().to_string(), reason))
    }

    /// Every category with its serialized name, in a fixed order
    pub fn categories(&self) -> [(&'static str, &Category); 15] {
        [
            ("widgets", &self.widgets),
            ("fragments", &self.fragments),
            ("pages", &self.pages),
            ("pageTemplates", &self.page_templates),
            ("contents", &self.contents),
            ("contentTemplates", &self.content_templates),
            ("contentTypes", &self.content_types),
            ("assets", &self.assets),
            ("resources", &self.resources),
            ("plugins", &self.plugins),
            ("categories", &self.categories),
            ("groups", &self.groups),
            ("labels", &self.labels),
            ("languages", &self.languages),
            ("directories", &self.directories),
        ]
    }

    fn categories_mut(&mut self) -> [&mut Category; 15] {
        [
            &mut self.widgets,
            &mut self.fragments,
            &mut self.pages,
            &mut self.page_templates,
            &mut self.contents,
            &mut self.content_templates,
            &mut self.content_types,
            &mut self.assets,
            &mut self.resources,
            &mut self.plugins,
            &mut self.categories,
            &mut self.groups,
            &mut self.labels,
            &mut self.languages,
            &mut self.directories,
        ]
    }

    pub fn component_count(&self) -> usize {
        self.categories().iter().map(|(_, items)| items.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.component_count() == 0
    }

    /// Give every component without an action the one its status implies:
    /// `CREATE` for new components, `conflict_strategy` for the rest
    pub fn fill_missing_actions(&mut self, conflict_strategy: InstallAction) -> Result<()> {
        if conflict_strategy == InstallAction::Create {
            return Err(invalid_install_plan(
                "CREATE is not a conflict strategy; use SKIP or OVERRIDE",
            ));
        }
        for category in self.categories_mut() {
            for item in category.values_mut() {
                if item.action.is_none() {
                    item.action = Some(match item.status {
                        InstallStatus::New => InstallAction::Create,
                        InstallStatus::Diff | InstallStatus::Equal => conflict_strategy,
                    });
                }
            }
        }
        Ok(())
    }

    /// Check every component's status/action pairing
    pub fn validate(&self) -> Result<()> {
        for (category, items) in self.categories() {
            for (key, item) in items {
                if key.trim().is_empty() {
                    return Err(invalid_install_plan(format!(
                        "{category} contains a component with an empty key"
                    )));
                }
                let Some(action) = item.action else {
                    return Err(install_plan_violation(
                        category,
                        key,
                        item.status.as_str(),
                        "none",
                    ));
                };
                if !action.is_allowed_for(item.status) {
                    return Err(install_plan_violation(
                        category,
                        key,
                        item.status.as_str(),
                        action.as_str(),
                    ));
                }
            }
        }
        debug!(components = self.component_count(), "Install plan is valid");
        Ok(())
    }
}

/// An absent plan is valid
pub fn validate_install_plan(plan: Option<&InstallPlan>) -> Result<()> {
    plan.map_or(Ok(()), InstallPlan::validate)
}
