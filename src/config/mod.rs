//! Operator configuration
//!
//! Settings are read from a YAML file (explicit path, or
//! `<config dir>/bundlegate/config.yaml` when present), then overridden by
//! `BUNDLEGATE_*` environment variables, then validated.

pub mod credentials;

pub use credentials::{RegistryCredentialStore, RegistryCredentials};

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, config_invalid, config_parse_failed, config_read_failed};

pub const ENV_DOWNLOAD_TIMEOUT: &str = "BUNDLEGATE_DOWNLOAD_TIMEOUT_SECONDS";
pub const ENV_DOWNLOAD_RETRIES: &str = "BUNDLEGATE_DOWNLOAD_RETRIES";
pub const ENV_DECOMPRESS_TIMEOUT: &str = "BUNDLEGATE_DECOMPRESS_TIMEOUT_SECONDS";
pub const ENV_REGISTRY_CREDENTIALS: &str = "BUNDLEGATE_REGISTRY_CREDENTIALS";
pub const ENV_REGISTRY_CREDENTIALS_FILE: &str = "BUNDLEGATE_REGISTRY_CREDENTIALS_FILE";

/// File name looked up under the user config directory
const CONFIG_FILE_NAME: &str = "config.yaml";

/// External executables the downloader drives
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct ToolsConfig {
    pub git: String,
    pub registry: String,
    pub tar: String,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            git: "git".to_string(),
            registry: "crane".to_string(),
            tar: "tar".to_string(),
        }
    }
}

/// Pipeline settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields, default)]
pub struct PipelineConfig {
    /// Wall-clock limit for each clone/fetch/export process
    pub download_timeout_seconds: u64,

    /// Attempts for retried registry calls (export, tag listing)
    pub download_retries: u32,

    /// Wall-clock limit for unpacking an exported image
    pub decompress_timeout_seconds: u64,

    /// Inline `{"auths": {...}}` JSON document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_credentials: Option<String>,

    /// Path to a `{"auths": {...}}` JSON document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registry_credentials_file: Option<PathBuf>,

    /// Delay between graceful stop and forced kill of a timed out helper
    pub kill_grace_period_millis: u64,

    pub tools: ToolsConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            download_timeout_seconds: 300,
            download_retries: 3,
            decompress_timeout_seconds: 20,
            registry_credentials: None,
            registry_credentials_file: None,
            kill_grace_period_millis: 2_000,
            tools: ToolsConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Load configuration from `explicit`, or the default location when it
    /// exists, then apply environment overrides and validate
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => default_config_path().filter(|p| p.is_file()),
        };

        let mut config = match path {
            Some(path) => {
                debug!(path = %path.display(), "Loading configuration");
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| config_read_failed(path.display().to_string(), e.to_string()))?;
        serde_yaml::from_str(&raw)
            .map_err(|e| config_parse_failed(path.display().to_string(), e.to_string()))
    }

    /// Parse configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)
            .map_err(|e| config_parse_failed("<inline>", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(value) = env_number(ENV_DOWNLOAD_TIMEOUT)? {
            self.download_timeout_seconds = value;
        }
        if let Some(value) = env_number(ENV_DOWNLOAD_RETRIES)? {
            self.download_retries = u32::try_from(value)
                .map_err(|_| config_invalid(format!("{ENV_DOWNLOAD_RETRIES} is too large")))?;
        }
        if let Some(value) = env_number(ENV_DECOMPRESS_TIMEOUT)? {
            self.decompress_timeout_seconds = value;
        }
        if let Some(value) = env_text(ENV_REGISTRY_CREDENTIALS) {
            self.registry_credentials = Some(value);
        }
        if let Some(value) = env_text(ENV_REGISTRY_CREDENTIALS_FILE) {
            self.registry_credentials_file = Some(PathBuf::from(value));
        }
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.download_timeout_seconds == 0 {
            return Err(config_invalid("downloadTimeoutSeconds must be greater than 0"));
        }
        if self.decompress_timeout_seconds == 0 {
            return Err(config_invalid(
                "decompressTimeoutSeconds must be greater than 0",
            ));
        }
        if self.download_retries == 0 {
            return Err(config_invalid("downloadRetries must be at least 1"));
        }
        for (name, value) in [
            ("tools.git", &self.tools.git),
            ("tools.registry", &self.tools.registry),
            ("tools.tar", &self.tools.tar),
        ] {
            if value.trim().is_empty() {
                return Err(config_invalid(format!("{name} cannot be empty")));
            }
        }
        Ok(())
    }

    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_seconds)
    }

    pub fn decompress_timeout(&self) -> Duration {
        Duration::from_secs(self.decompress_timeout_seconds)
    }

    pub fn kill_grace_period(&self) -> Duration {
        Duration::from_millis(self.kill_grace_period_millis)
    }

    /// Build the credential store; inline JSON wins over the file
    pub fn credentials(&self) -> Result<RegistryCredentialStore> {
        if let Some(json) = &self.registry_credentials {
            return RegistryCredentialStore::from_json(json);
        }
        if let Some(path) = &self.registry_credentials_file {
            let raw = std::fs::read_to_string(path)
                .map_err(|e| config_read_failed(path.display().to_string(), e.to_string()))?;
            return RegistryCredentialStore::from_json(&raw);
        }
        Ok(RegistryCredentialStore::empty())
    }
}

/// `<config dir>/bundlegate/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("bundlegate").join(CONFIG_FILE_NAME))
}

fn env_text(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn env_number(name: &str) -> Result<Option<u64>> {
    env_text(name)
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|_| config_invalid(format!("{name} must be a number, got '{raw}'")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for name in [
            ENV_DOWNLOAD_TIMEOUT,
            ENV_DOWNLOAD_RETRIES,
            ENV_DECOMPRESS_TIMEOUT,
            ENV_REGISTRY_CREDENTIALS,
            ENV_REGISTRY_CREDENTIALS_FILE,
        ] {
            // SAFETY: tests touching these variables are serialized
            unsafe { std::env::remove_var(name) };
        }
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.download_retries, 3);
        assert_eq!(config.tools.registry, "crane");
    }

    #[test]
    fn test_from_yaml_camel_case() {
        let config = PipelineConfig::from_yaml(
            "downloadTimeoutSeconds: 60\ndownloadRetries: 5\ntools:\n  registry: /opt/crane\n",
        )
        .unwrap();
        assert_eq!(config.download_timeout_seconds, 60);
        assert_eq!(config.download_retries, 5);
        assert_eq!(config.decompress_timeout_seconds, 20);
        assert_eq!(config.tools.registry, "/opt/crane");
        assert_eq!(config.tools.git, "git");
    }

    #[test]
    fn test_unknown_keys_are_rejected() {
        assert!(PipelineConfig::from_yaml("downloadTimeout: 60\n").is_err());
    }

    #[test]
    fn test_zero_retries_is_invalid() {
        let err = PipelineConfig::from_yaml("downloadRetries: 0\n").unwrap_err();
        assert!(err.to_string().contains("downloadRetries"));
    }

    #[test]
    fn test_zero_timeout_is_invalid() {
        assert!(PipelineConfig::from_yaml("downloadTimeoutSeconds: 0\n").is_err());
        assert!(PipelineConfig::from_yaml("decompressTimeoutSeconds: 0\n").is_err());
    }

    #[test]
    #[serial]
    fn test_env_overrides_file_values() {
        clear_env();
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "downloadTimeoutSeconds: 60\n").unwrap();

        // SAFETY: serialized test
        unsafe {
            std::env::set_var(ENV_DOWNLOAD_TIMEOUT, "90");
            std::env::set_var(ENV_DOWNLOAD_RETRIES, "7");
        }
        let config = PipelineConfig::load(Some(&path)).unwrap();
        clear_env();

        assert_eq!(config.download_timeout_seconds, 90);
        assert_eq!(config.download_retries, 7);
    }

    #[test]
    #[serial]
    fn test_env_non_numeric_is_invalid() {
        clear_env();
        // SAFETY: serialized test
        unsafe { std::env::set_var(ENV_DOWNLOAD_RETRIES, "many") };
        let mut config = PipelineConfig::default();
        let result = config.apply_env_overrides();
        clear_env();
        assert!(result.is_err());
    }

    #[test]
    #[serial]
    fn test_missing_explicit_file_fails() {
        clear_env();
        let result = PipelineConfig::load(Some(Path::new("/nonexistent/bundlegate.yaml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_credentials_inline_wins_over_file() {
        let config = PipelineConfig {
            registry_credentials: Some(
                r#"{"auths": {"quay.io": {"username": "a", "password": "b"}}}"#.to_string(),
            ),
            registry_credentials_file: Some(PathBuf::from("/nonexistent/auths.json")),
            ..PipelineConfig::default()
        };
        let store = config.credentials().unwrap();
        assert!(store.lookup("quay.io").is_some());
    }

    #[test]
    fn test_credentials_from_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("auths.json");
        std::fs::write(
            &path,
            r#"{"auths": {"registry.local": {"username": "a", "password": "b"}}}"#,
        )
        .unwrap();
        let config = PipelineConfig {
            registry_credentials_file: Some(path),
            ..PipelineConfig::default()
        };
        assert_eq!(config.credentials().unwrap().domains(), vec!["registry.local"]);
    }

    #[test]
    fn test_no_credentials_configured() {
        assert!(PipelineConfig::default().credentials().unwrap().is_empty());
    }
}
