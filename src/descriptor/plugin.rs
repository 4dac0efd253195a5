//! Plugin (microservice) descriptor

use serde::{Deserialize, Serialize};

use super::{Descriptor, DescriptorKind, DescriptorVersion, Presence};

/// Legacy v1 shape: everything nested under `spec`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbms: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_path: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_level: Option<String>,
}

impl Presence for PluginSpec {
    fn is_present(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretKeyRef {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub key: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueFrom {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key_ref: Option<SecretKeyRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariable {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_from: Option<ValueFrom>,
}

impl EnvironmentVariable {
    pub fn secret_key_ref(&self) -> Option<&SecretKeyRef> {
        self.value_from.as_ref()?.secret_key_ref.as_ref()
    }
}

/// Kubernetes resource quantities (`256Mi`, `500m`, ...)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginResources {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<String>,
}

impl PluginResources {
    pub fn quantities(&self) -> Vec<(&'static str, &str)> {
        [
            ("storage", &self.storage),
            ("memory", &self.memory),
            ("cpu", &self.cpu),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.as_deref().map(|v| (name, v)))
        .collect()
    }
}

impl Presence for PluginResources {
    fn is_present(&self) -> bool {
        !self.quantities().is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDescriptor {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub descriptor_version: Option<String>,

    /// Present only in the legacy v1 shape
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub spec: Option<PluginSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deployment_base_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dbms: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check_path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ingress_path: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_level: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub environment_variables: Option<Vec<EnvironmentVariable>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<PluginResources>,
}

impl PluginDescriptor {
    /// Image from the flat field, or from `spec` for legacy descriptors
    pub fn effective_image(&self) -> Option<&str> {
        self.image
            .as_deref()
            .or_else(|| self.spec.as_ref()?.image.as_deref())
    }

    pub fn effective_dbms(&self) -> Option<&str> {
        self.dbms
            .as_deref()
            .or_else(|| self.spec.as_ref()?.dbms.as_deref())
    }
}

impl Descriptor for PluginDescriptor {
    fn kind(&self) -> DescriptorKind {
        DescriptorKind::Plugin
    }

    fn descriptor_version(&self) -> Option<&str> {
        self.descriptor_version.as_deref()
    }

    fn set_descriptor_version(&mut self, version: DescriptorVersion) {
        self.descriptor_version = Some(version.as_str().to_string());
    }

    /// The nested `spec` block only exists in v1 descriptors
    fn default_version(&self) -> DescriptorVersion {
        if self.spec.is_some() {
            DescriptorVersion::V1
        } else {
            DescriptorVersion::V2
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_shape_defaults_to_v1() {
        let yaml = "spec:\n  image: entando/todo:1.0.0\n  dbms: none\n";
        let descriptor: PluginDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(descriptor.default_version(), DescriptorVersion::V1);
        assert_eq!(descriptor.effective_image(), Some("entando/todo:1.0.0"));
        assert_eq!(descriptor.effective_dbms(), Some("none"));
    }

    #[test]
    fn test_flat_shape_defaults_to_v2() {
        let yaml = r#"
image: entando/todo:1.0.0
dbms: postgresql
healthCheckPath: /health
environmentVariables:
  - name: SPRING_PROFILE
    value: prod
  - name: DB_PASSWORD
    valueFrom:
      secretKeyRef:
        name: todo-secret
        key: password
resources:
  memory: 512Mi
"#;
        let descriptor: PluginDescriptor = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(descriptor.default_version(), DescriptorVersion::V2);
        let env = descriptor.environment_variables.as_ref().unwrap();
        assert_eq!(env[0].value.as_deref(), Some("prod"));
        assert_eq!(env[1].secret_key_ref().unwrap().key, "password");
        assert_eq!(
            descriptor.resources.as_ref().unwrap().quantities(),
            vec![("memory", "512Mi")]
        );
    }
}
