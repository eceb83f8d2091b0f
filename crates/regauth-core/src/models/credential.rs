use std::fmt;

use base64::Engine;
use chrono::{DateTime, Utc};

use crate::error::{Result, StoreError};

/// Canonical host for Docker Hub. Legacy keys written by `docker login`
/// use one of the aliases below.
pub const DOCKER_HUB_HOST: &str = "docker.io";

const DOCKER_HUB_ALIASES: &[&str] = &["index.docker.io", "registry-1.docker.io"];

/// The scope a credential applies to: a whole registry, or one repository
/// (namespace) inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeKey {
    host: String,
    repository: Option<String>,
}

impl ScopeKey {
    /// Registry-wide scope for `host`. The host is normalized the same way
    /// [`ScopeKey::parse`] does.
    pub fn registry(host: &str) -> Result<Self> {
        let key = Self::parse(host)?;
        if key.repository.is_some() {
            return Err(StoreError::InvalidTarget {
                target: host.to_string(),
                reason: "expected a registry host without a path".to_string(),
            });
        }
        Ok(key)
    }

    /// Parse `host` or `host/repo/path`, accepting the legacy key spellings
    /// found in auth files (`https://` prefix, trailing `/v1/`).
    ///
    /// A `/v1` or `/v2` path is only treated as the legacy API suffix when
    /// the key carries a URL scheme; `quay.io/v2` is a repository.
    pub fn parse(raw: &str) -> Result<Self> {
        let invalid = |reason: &str| StoreError::InvalidTarget {
            target: raw.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = raw.trim();
        let without_scheme = trimmed
            .strip_prefix("https://")
            .or_else(|| trimmed.strip_prefix("http://"))
            .unwrap_or(trimmed);
        let has_scheme = without_scheme.len() != trimmed.len();
        let stripped = without_scheme.trim_end_matches('/');

        if stripped.is_empty() {
            return Err(invalid("empty registry"));
        }
        if stripped.contains('@') {
            return Err(invalid("digests are not allowed, use a registry or repository"));
        }
        if stripped.chars().any(char::is_whitespace) {
            return Err(invalid("whitespace is not allowed"));
        }

        let (host, path) = match stripped.split_once('/') {
            Some((host, path)) => (host, Some(path)),
            None => (stripped, None),
        };

        if host.is_empty() {
            return Err(invalid("empty registry host"));
        }

        let mut host = host.to_ascii_lowercase();
        if DOCKER_HUB_ALIASES.contains(&host.as_str()) {
            host = DOCKER_HUB_HOST.to_string();
        }

        let repository = match path {
            None => None,
            Some("v1") | Some("v2") if has_scheme => None,
            Some(path) => {
                if path.split('/').any(str::is_empty) {
                    return Err(invalid("empty path component"));
                }
                if path.contains(':') {
                    return Err(invalid("tags are not allowed, use a registry or repository"));
                }
                Some(path.to_string())
            }
        };

        Ok(Self { host, repository })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn repository(&self) -> Option<&str> {
        self.repository.as_deref()
    }

    pub fn is_registry_wide(&self) -> bool {
        self.repository.is_none()
    }

    /// The registry-wide scope of the same host.
    pub fn registry_scope(&self) -> Self {
        Self {
            host: self.host.clone(),
            repository: None,
        }
    }

    /// This scope followed by each enclosing namespace, ending with the
    /// registry-wide scope: `h/a/b` yields `h/a/b`, `h/a`, `h`.
    pub fn ancestors(&self) -> Vec<ScopeKey> {
        let mut scopes = Vec::new();
        if let Some(ref repo) = self.repository {
            let mut path = repo.as_str();
            loop {
                scopes.push(Self {
                    host: self.host.clone(),
                    repository: Some(path.to_string()),
                });
                match path.rsplit_once('/') {
                    Some((parent, _)) => path = parent,
                    None => break,
                }
            }
        }
        scopes.push(self.registry_scope());
        scopes
    }
}

impl fmt::Display for ScopeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.repository {
            Some(ref repo) => write!(f, "{}/{}", self.host, repo),
            None => f.write_str(&self.host),
        }
    }
}

/// Opaque encoded credential. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AuthToken(String);

impl AuthToken {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    /// Encode `username:secret` the way container auth files store it.
    pub fn basic(username: &str, secret: &str) -> Self {
        let raw = format!("{}:{}", username, secret);
        Self(base64::engine::general_purpose::STANDARD.encode(raw))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Decode a basic token into `(username, secret)`.
    pub fn decode_basic(&self) -> Option<(String, String)> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(self.0.trim())
            .ok()?;
        let decoded = String::from_utf8(decoded).ok()?;
        let (username, secret) = decoded.split_once(':')?;
        Some((username.to_string(), secret.to_string()))
    }
}

impl fmt::Debug for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AuthToken(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    pub scope: ScopeKey,
    pub auth_token: AuthToken,
    pub expiry: Option<DateTime<Utc>>,
}

impl CredentialEntry {
    pub fn new(scope: ScopeKey, auth_token: AuthToken) -> Self {
        Self {
            scope,
            auth_token,
            expiry: None,
        }
    }

    pub fn new_basic(scope: ScopeKey, username: &str, secret: &str) -> Self {
        Self::new(scope, AuthToken::basic(username, secret))
    }

    pub fn with_expiry(mut self, expiry: DateTime<Utc>) -> Self {
        self.expiry = Some(expiry);
        self
    }

    pub fn registry_host(&self) -> &str {
        self.scope.host()
    }

    pub fn repository_path(&self) -> Option<&str> {
        self.scope.repository()
    }

    pub fn is_expired(&self) -> bool {
        self.expiry.map(|at| Utc::now() > at).unwrap_or(false)
    }

    pub fn basic_credentials(&self) -> Option<(String, String)> {
        self.auth_token.decode_basic()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_parse_registry() {
        let key = ScopeKey::parse("quay.io").unwrap();
        assert_eq!(key.host(), "quay.io");
        assert!(key.is_registry_wide());
        assert_eq!(key.to_string(), "quay.io");
    }

    #[test]
    fn test_parse_repository() {
        let key = ScopeKey::parse("quay.io/myorg/myrepo").unwrap();
        assert_eq!(key.host(), "quay.io");
        assert_eq!(key.repository(), Some("myorg/myrepo"));
        assert_eq!(key.to_string(), "quay.io/myorg/myrepo");
    }

    #[test]
    fn test_parse_legacy_spellings() {
        assert_eq!(ScopeKey::parse("https://quay.io/").unwrap().to_string(), "quay.io");
        assert_eq!(ScopeKey::parse("http://localhost:5000").unwrap().to_string(), "localhost:5000");
        assert_eq!(
            ScopeKey::parse("https://index.docker.io/v1/").unwrap().to_string(),
            "docker.io"
        );
        assert_eq!(ScopeKey::parse("Registry-1.Docker.IO").unwrap().to_string(), "docker.io");
    }

    #[test]
    fn test_api_suffix_without_scheme_is_a_repository() {
        let key = ScopeKey::parse("quay.io/v2").unwrap();
        assert_eq!(key.host(), "quay.io");
        assert_eq!(key.repository(), Some("v2"));
        assert!(!key.is_registry_wide());

        let key = ScopeKey::parse("index.docker.io/v1/").unwrap();
        assert_eq!(key.to_string(), "docker.io/v1");

        assert!(ScopeKey::parse("https://quay.io/v2/").unwrap().is_registry_wide());
    }

    #[test]
    fn test_parse_rejects_tags_and_digests() {
        assert!(matches!(
            ScopeKey::parse("quay.io/repo:latest"),
            Err(StoreError::InvalidTarget { .. })
        ));
        assert!(matches!(
            ScopeKey::parse("quay.io/repo@sha256:abcd"),
            Err(StoreError::InvalidTarget { .. })
        ));
        assert!(ScopeKey::parse("").is_err());
        assert!(ScopeKey::parse("https://").is_err());
        assert!(ScopeKey::parse("quay.io//repo").is_err());
        assert!(ScopeKey::parse("/repo").is_err());
    }

    #[test]
    fn test_port_is_not_a_tag() {
        let key = ScopeKey::parse("localhost:5000/team/app").unwrap();
        assert_eq!(key.host(), "localhost:5000");
        assert_eq!(key.repository(), Some("team/app"));
    }

    #[test]
    fn test_registry_rejects_path() {
        assert!(ScopeKey::registry("quay.io/repo").is_err());
        assert!(ScopeKey::registry("quay.io").is_ok());
    }

    #[test]
    fn test_ancestors() {
        let key = ScopeKey::parse("ghcr.io/a/b/c").unwrap();
        let names: Vec<String> = key.ancestors().iter().map(|k| k.to_string()).collect();
        assert_eq!(names, vec!["ghcr.io/a/b/c", "ghcr.io/a/b", "ghcr.io/a", "ghcr.io"]);

        let host_only = ScopeKey::parse("ghcr.io").unwrap();
        assert_eq!(host_only.ancestors(), vec![host_only.clone()]);
    }

    #[test]
    fn test_basic_token_round_trip() {
        // "username:password"
        let token = AuthToken::new("dXNlcm5hbWU6cGFzc3dvcmQ=");
        let (user, secret) = token.decode_basic().unwrap();
        assert_eq!(user, "username");
        assert_eq!(secret, "password");
        assert_eq!(AuthToken::basic("username", "password"), token);
    }

    #[test]
    fn test_secret_with_colon() {
        let token = AuthToken::basic("robot$ci", "pa:ss");
        assert_eq!(
            token.decode_basic(),
            Some(("robot$ci".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn test_debug_hides_token() {
        let token = AuthToken::basic("user", "hunter2");
        assert_eq!(format!("{:?}", token), "AuthToken(***)");
    }

    #[test]
    fn test_expiry() {
        let scope = ScopeKey::parse("quay.io").unwrap();
        let fresh = CredentialEntry::new_basic(scope.clone(), "u", "p")
            .with_expiry(Utc::now() + Duration::minutes(30));
        assert!(!fresh.is_expired());

        let stale = CredentialEntry::new_basic(scope.clone(), "u", "p")
            .with_expiry(Utc::now() - Duration::minutes(1));
        assert!(stale.is_expired());

        assert!(!CredentialEntry::new_basic(scope, "u", "p").is_expired());
    }
}
