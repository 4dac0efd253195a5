//! Container image reference parsing
//!
//! Parses `docker://<registry>/[<organization>/]<repository>[:<tag>|@<digest>]`
//! without contacting any registry. Parsing only splits the string; the
//! `validate_*` methods check individual fields so callers can validate just
//! what an operation needs (listing tags does not need a tag).

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Result, invalid_image_reference};

/// Transport marker for container-registry sources
pub const DOCKER_TRANSPORT: &str = "docker";

/// Namespace used when a reference names no organization
pub const OFFICIAL_ORGANIZATION: &str = "library";

/// Tag implied by a reference without `:` or `@`
pub const DEFAULT_TAG: &str = "latest";

const TRANSPORT_SEPARATOR: &str = "://";

// Literal patterns; compiled on first use and covered by tests
#[allow(clippy::expect_used)]
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").expect("valid tag regex")
});

#[allow(clippy::expect_used)]
static DIGEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^sha256:[a-z0-9]{32,}$").expect("valid digest regex")
});

#[allow(clippy::expect_used)]
static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9.:_-]*[A-Za-z0-9])?$").expect("valid domain regex")
});

#[allow(clippy::expect_used)]
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9](?:[a-z0-9._-]*[a-z0-9])?$").expect("valid name regex")
});

/// Parsed container image reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    transport: String,
    domain_registry: String,
    organization: String,
    repository: String,
    tag_or_digest: String,
    is_digest: bool,
    conflicting_separators: bool,
}

impl ImageReference {
    /// Split `input` into its components. Never fails; use
    /// [`ImageReference::validate_or_err`] to check the result.
    pub fn parse(input: &str) -> Self {
        let input = input.trim();
        let (transport, rest) = match input.find(TRANSPORT_SEPARATOR) {
            Some(pos) => (
                input[..pos].to_string(),
                &input[pos + TRANSPORT_SEPARATOR.len()..],
            ),
            None => (String::new(), input),
        };

        let mut segments: Vec<&str> = rest.split('/').collect();
        let domain_registry = segments.remove(0).to_string();
        let last = segments.pop().unwrap_or_default();
        let organization = if segments.is_empty() {
            OFFICIAL_ORGANIZATION.to_string()
        } else {
            segments.join("/")
        };

        let conflicting_separators = last.find('@').is_some_and(|pos| last[..pos].contains(':'));
        let (repository, tag_or_digest, is_digest) = if let Some(pos) = last.find('@') {
            (last[..pos].to_string(), last[pos + 1..].to_string(), true)
        } else if let Some(pos) = last.find(':') {
            (last[..pos].to_string(), last[pos + 1..].to_string(), false)
        } else {
            (last.to_string(), DEFAULT_TAG.to_string(), false)
        };

        Self {
            transport,
            domain_registry,
            organization,
            repository,
            tag_or_digest,
            is_digest,
            conflicting_separators,
        }
    }

    /// Parse and fully validate
    pub fn parse_valid(input: &str, label: &str) -> Result<Self> {
        let reference = Self::parse(input);
        reference.validate_or_err(label)?;
        Ok(reference)
    }

    pub fn transport(&self) -> &str {
        &self.transport
    }

    pub fn domain_registry(&self) -> &str {
        &self.domain_registry
    }

    pub fn organization(&self) -> &str {
        &self.organization
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag_or_digest(&self) -> &str {
        &self.tag_or_digest
    }

    pub fn is_digest(&self) -> bool {
        self.is_digest
    }

    /// Same image with a different tag, or digest when `version` is `sha256:...`
    pub fn with_tag_or_digest(&self, version: &str) -> Self {
        let version = version.trim();
        let is_digest = version.starts_with("sha256:");
        Self {
            tag_or_digest: version.to_string(),
            is_digest,
            conflicting_separators: false,
            ..self.clone()
        }
    }

    pub fn validate_transport(&self, label: &str) -> Result<()> {
        if self.transport == DOCKER_TRANSPORT {
            Ok(())
        } else {
            Err(invalid_image_reference(label, "transport", &self.transport))
        }
    }

    pub fn validate_domain_registry(&self, label: &str) -> Result<()> {
        if DOMAIN_RE.is_match(&self.domain_registry) {
            Ok(())
        } else {
            Err(invalid_image_reference(
                label,
                "domain registry",
                &self.domain_registry,
            ))
        }
    }

    pub fn validate_organization(&self, label: &str) -> Result<()> {
        if self.organization.split('/').all(|part| NAME_RE.is_match(part)) {
            Ok(())
        } else {
            Err(invalid_image_reference(
                label,
                "organization",
                &self.organization,
            ))
        }
    }

    pub fn validate_repository(&self, label: &str) -> Result<()> {
        if NAME_RE.is_match(&self.repository) {
            Ok(())
        } else {
            Err(invalid_image_reference(label, "repository", &self.repository))
        }
    }

    pub fn validate_tag(&self, label: &str) -> Result<()> {
        let valid = !self.conflicting_separators
            && if self.is_digest {
                DIGEST_RE.is_match(&self.tag_or_digest)
            } else {
                TAG_RE.is_match(&self.tag_or_digest)
            };
        if valid {
            Ok(())
        } else {
            let field = if self.is_digest { "digest" } else { "tag" };
            Err(invalid_image_reference(label, field, &self.tag_or_digest))
        }
    }

    /// Everything needed to address the repository (no tag)
    pub fn validate_repository_address(&self, label: &str) -> Result<()> {
        self.validate_transport(label)?;
        self.validate_domain_registry(label)?;
        self.validate_organization(label)?;
        self.validate_repository(label)
    }

    pub fn validate_or_err(&self, label: &str) -> Result<()> {
        self.validate_repository_address(label)?;
        self.validate_tag(label)
    }

    pub fn is_valid(&self) -> bool {
        self.validate_or_err("image reference").is_ok()
    }

    /// `docker://registry/org/repo:tag` (or `@digest`)
    pub fn compose_common_url(&self) -> Result<String> {
        self.validate_or_err("image reference")?;
        Ok(format!(
            "{}{}{}",
            self.transport,
            TRANSPORT_SEPARATOR,
            self.tagged_address()
        ))
    }

    /// `registry/org/repo:tag` (or `@digest`), as passed to a registry CLI
    pub fn compose_url_without_transport(&self) -> Result<String> {
        self.validate_or_err("image reference")?;
        Ok(self.tagged_address())
    }

    /// `registry/org/repo`, as used to list tags
    pub fn compose_url_without_transport_without_tag(&self) -> Result<String> {
        self.validate_repository_address("image reference")?;
        Ok(self.repository_address())
    }

    fn repository_address(&self) -> String {
        format!(
            "{}/{}/{}",
            self.domain_registry, self.organization, self.repository
        )
    }

    fn tagged_address(&self) -> String {
        let separator = if self.is_digest { '@' } else { ':' };
        format!(
            "{}{}{}",
            self.repository_address(),
            separator,
            self.tag_or_digest
        )
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.transport,
            TRANSPORT_SEPARATOR,
            self.tagged_address()
        )
    }
}

/// Whether `url` carries the container-registry transport marker
pub fn is_docker_url(url: &str) -> bool {
    url.trim()
        .strip_prefix(DOCKER_TRANSPORT)
        .is_some_and(|rest| rest.starts_with(TRANSPORT_SEPARATOR))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BundleError;

    const DIGEST: &str = "sha256:92ae85a2740161f8b534e0b85ad267624ea88def5691742008f9353cc72ec060";

    #[test]
    fn test_parse_full_reference() {
        let r = ImageReference::parse("docker://quay.io/centos7/nginx-116-centos7:1.2.3");
        assert_eq!(r.transport(), "docker");
        assert_eq!(r.domain_registry(), "quay.io");
        assert_eq!(r.organization(), "centos7");
        assert_eq!(r.repository(), "nginx-116-centos7");
        assert_eq!(r.tag_or_digest(), "1.2.3");
        assert!(!r.is_digest());
        assert!(r.is_valid());
    }

    #[test]
    fn test_parse_digest_with_official_namespace() {
        let r = ImageReference::parse(&format!("docker://docker.io/nginx@{DIGEST}"));
        assert!(r.is_digest());
        assert_eq!(r.organization(), OFFICIAL_ORGANIZATION);
        assert_eq!(r.tag_or_digest(), DIGEST);
        assert_eq!(
            r.compose_url_without_transport().unwrap(),
            format!("docker.io/library/nginx@{DIGEST}")
        );
    }

    #[test]
    fn test_missing_tag_defaults_to_latest() {
        let r = ImageReference::parse("docker://registry.example.com:5000/team/app");
        assert_eq!(r.tag_or_digest(), DEFAULT_TAG);
        assert_eq!(r.domain_registry(), "registry.example.com:5000");
        assert!(r.is_valid());
    }

    #[test]
    fn test_trailing_colon_is_invalid() {
        let r = ImageReference::parse("docker://docker.io/org/app:");
        let err = r.validate_or_err("bundle image").unwrap_err();
        assert!(
            matches!(err, BundleError::InvalidImageReference { ref field, .. } if field == "tag")
        );
    }

    #[test]
    fn test_empty_repository_names_repository_field() {
        let r = ImageReference::parse("docker://docker.io/");
        let err = r.validate_or_err("bundle image").unwrap_err();
        assert!(
            matches!(err, BundleError::InvalidImageReference { ref field, .. } if field == "repository")
        );
        assert!(err.to_string().contains("repository"));
    }

    #[test]
    fn test_wrong_transport_is_rejected() {
        let r = ImageReference::parse("oci://docker.io/org/app:1.0");
        let err = r.validate_transport("bundle image").unwrap_err();
        assert!(err.to_string().contains("transport"));
    }

    #[test]
    fn test_both_separators_are_rejected() {
        let r = ImageReference::parse(&format!("docker://docker.io/org/app:1.0@{DIGEST}"));
        assert!(r.validate_tag("bundle image").is_err());
    }

    #[test]
    fn test_tags_are_ascii_only() {
        let r = ImageReference::parse("docker://docker.io/org/app:v1.é");
        assert!(r.validate_tag("bundle image").is_err());
        let r = ImageReference::parse("docker://docker.io/org/app:_v1.0-rc.1");
        assert!(r.validate_tag("bundle image").is_ok());
    }

    #[test]
    fn test_short_digest_is_rejected() {
        let r = ImageReference::parse("docker://docker.io/org/app@sha256:abc");
        assert!(r.validate_tag("bundle image").is_err());
    }

    #[test]
    fn test_names_must_start_and_end_alphanumeric() {
        assert!(!ImageReference::parse("docker://docker.io/-org/app").is_valid());
        assert!(!ImageReference::parse("docker://docker.io/org/app-").is_valid());
        assert!(!ImageReference::parse("docker://.docker.io/org/app").is_valid());
    }

    #[test]
    fn test_partial_validation_ignores_tag() {
        let r = ImageReference::parse("docker://docker.io/org/app:");
        assert!(r.validate_repository_address("tag listing").is_ok());
        assert_eq!(
            r.compose_url_without_transport_without_tag().unwrap(),
            "docker.io/org/app"
        );
    }

    #[test]
    fn test_with_tag_or_digest() {
        let base = ImageReference::parse("docker://docker.io/org/app");
        let tagged = base.with_tag_or_digest("v2.0.1");
        assert_eq!(tagged.compose_common_url().unwrap(), "docker://docker.io/org/app:v2.0.1");

        let pinned = base.with_tag_or_digest(DIGEST);
        assert!(pinned.is_digest());
        assert_eq!(
            pinned.compose_url_without_transport().unwrap(),
            format!("docker.io/org/app@{DIGEST}")
        );
    }

    #[test]
    fn test_compose_round_trip() {
        for input in [
            "docker://quay.io/centos7/nginx-116-centos7:1.2.3",
            "docker://docker.io/nginx",
            "docker://ghcr.io/acme/platform/widgets:0.1.0-rc.1",
            "docker://localhost:5000/org/app@sha256:92ae85a2740161f8b534e0b85ad267624ea88def5691742008f9353cc72ec060",
        ] {
            let first = ImageReference::parse(input);
            let composed = first.compose_common_url().unwrap();
            let second = ImageReference::parse(&composed);
            assert_eq!(first.transport(), second.transport(), "{input}");
            assert_eq!(first.domain_registry(), second.domain_registry(), "{input}");
            assert_eq!(first.organization(), second.organization(), "{input}");
            assert_eq!(first.repository(), second.repository(), "{input}");
            assert_eq!(first.tag_or_digest(), second.tag_or_digest(), "{input}");
            assert_eq!(first.is_digest(), second.is_digest(), "{input}");
        }
    }

    #[test]
    fn test_is_docker_url() {
        assert!(is_docker_url("docker://docker.io/org/app"));
        assert!(!is_docker_url("dockerhub.io/org/app"));
        assert!(!is_docker_url("https://docker.io/org/app"));
    }
}
