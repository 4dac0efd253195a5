//! Registry credentials lookup
//!
//! Credentials come from an operator-supplied JSON document in the usual
//! container-tool shape:
//!
//! ```json
//! {"auths": {"registry.example.com": {"username": "bot", "password": "s3cret"}}}
//! ```
//!
//! An entry may carry `auth` (base64 of `username:password`) instead of the
//! two plain fields. A registry without an entry simply has no credentials.

use std::collections::BTreeMap;
use std::fmt;

use base64::{Engine as _, engine::general_purpose};
use serde::Deserialize;

use crate::error::{Result, config_invalid, config_parse_failed};

#[derive(Debug, Default, Deserialize)]
struct AuthsDocument {
    #[serde(default)]
    auths: BTreeMap<String, AuthEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct AuthEntry {
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    auth: Option<String>,
}

/// Credentials for one registry domain
#[derive(Clone, PartialEq, Eq)]
pub struct RegistryCredentials {
    pub domain_registry: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("domain_registry", &self.domain_registry)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Credentials keyed by normalized registry domain
#[derive(Debug, Clone, Default)]
pub struct RegistryCredentialStore {
    entries: BTreeMap<String, RegistryCredentials>,
}

impl RegistryCredentialStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse the `{"auths": {...}}` document
    pub fn from_json(json: &str) -> Result<Self> {
        if json.trim().is_empty() {
            return Ok(Self::empty());
        }
        let document: AuthsDocument = serde_json::from_str(json)
            .map_err(|e| config_parse_failed("registry credentials", e.to_string()))?;

        let mut entries = BTreeMap::new();
        for (key, entry) in document.auths {
            let domain = normalize_domain(&key);
            let (username, password) = decode_entry(&domain, entry)?;
            entries.insert(
                domain.clone(),
                RegistryCredentials {
                    domain_registry: domain,
                    username,
                    password,
                },
            );
        }
        Ok(Self { entries })
    }

    /// Credentials for `domain_registry`, if configured
    pub fn lookup(&self, domain_registry: &str) -> Option<&RegistryCredentials> {
        let domain = normalize_domain(domain_registry);
        self.entries.get(&domain).or_else(|| {
            if is_docker_hub(&domain) {
                self.entries.iter().find(|(k, _)| is_docker_hub(k)).map(|(_, v)| v)
            } else {
                None
            }
        })
    }

    pub fn domains(&self) -> Vec<&str> {
        self.entries.keys().map(String::as_str).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn decode_entry(domain: &str, entry: AuthEntry) -> Result<(String, String)> {
    match (entry.username, entry.password, entry.auth) {
        (Some(username), Some(password), _) => Ok((username, password)),
        (_, _, Some(auth)) => {
            let raw = general_purpose::STANDARD
                .decode(auth.trim())
                .map_err(|e| config_invalid(format!("registry '{domain}': auth is not base64: {e}")))?;
            let text = String::from_utf8(raw)
                .map_err(|_| config_invalid(format!("registry '{domain}': auth is not UTF-8")))?;
            text.split_once(':')
                .map(|(u, p)| (u.to_string(), p.to_string()))
                .ok_or_else(|| {
                    config_invalid(format!("registry '{domain}': auth must be username:password"))
                })
        }
        _ => Err(config_invalid(format!(
            "registry '{domain}': both username and password are required"
        ))),
    }
}

/// Strip scheme and API path so `https://index.docker.io/v1/` matches `index.docker.io`
fn normalize_domain(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    without_scheme
        .split('/')
        .next()
        .unwrap_or_default()
        .to_ascii_lowercase()
}

fn is_docker_hub(domain: &str) -> bool {
    matches!(
        domain,
        "docker.io" | "index.docker.io" | "registry-1.docker.io"
    )
}
