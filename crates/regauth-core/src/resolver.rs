//! Scope resolution for registry targets and image references.

use tracing::debug;

use crate::error::{Result, StoreError};
use crate::models::{CredentialEntry, ScopeKey, DOCKER_HUB_HOST};
use crate::store::CredentialBackend;

/// Maps user-supplied targets to credential scopes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionResolver {
    accept_repositories: bool,
}

impl SessionResolver {
    pub fn new(accept_repositories: bool) -> Self {
        Self {
            accept_repositories,
        }
    }

    pub fn accepts_repositories(&self) -> bool {
        self.accept_repositories
    }

    /// Scope that a login/logout of `target` acts on.
    ///
    /// `target` is `host` or `host/repository`. Repository targets are only
    /// allowed when repository scopes are accepted.
    pub fn resolve_target(&self, target: &str) -> Result<ScopeKey> {
        let scope = ScopeKey::parse(target)?;
        if !scope.is_registry_wide() && !self.accept_repositories {
            return Err(StoreError::ScopeNotSupported {
                target: target.to_string(),
            });
        }
        debug!(registry = target, scope = %scope, "resolved target scope");
        Ok(scope)
    }

    /// Find the credential that applies to `image`, most specific scope first.
    ///
    /// Expired entries are skipped. Only the registry-wide scope is consulted
    /// when repository scopes are not accepted.
    pub fn lookup<B: CredentialBackend + ?Sized>(
        &self,
        store: &B,
        image: &str,
    ) -> Result<Option<CredentialEntry>> {
        let scope = Self::image_scope(image)?;
        let candidates = if self.accept_repositories {
            scope.ancestors()
        } else {
            vec![scope.registry_scope()]
        };

        for candidate in candidates {
            match store.get(&candidate) {
                Ok(entry) if entry.is_expired() => {
                    debug!(scope = %candidate, "skipping expired credentials");
                }
                Ok(entry) => {
                    debug!(image, scope = %candidate, "matched credentials");
                    return Ok(Some(entry));
                }
                Err(StoreError::NotFound(_)) => {}
                Err(e) => return Err(e),
            }
        }

        debug!(image, "no credentials found");
        Ok(None)
    }

    /// Repository scope of an image reference.
    ///
    /// Examples:
    /// - "ubuntu:latest" -> "docker.io/library/ubuntu"
    /// - "ghcr.io/owner/repo:tag" -> "ghcr.io/owner/repo"
    /// - "localhost:5000/image@sha256:..." -> "localhost:5000/image"
    pub fn image_scope(image: &str) -> Result<ScopeKey> {
        // Remove digest, then tag (a ':' after the last '/')
        let without_digest = image.split('@').next().unwrap_or(image);
        let name = match without_digest.rsplit_once(':') {
            Some((name, tag)) if !tag.contains('/') => name,
            _ => without_digest,
        };
        if name.is_empty() {
            return Err(StoreError::InvalidTarget {
                target: image.to_string(),
                reason: "empty image name".to_string(),
            });
        }

        let parts: Vec<&str> = name.split('/').collect();
        let first = parts[0];
        let has_host = parts.len() > 1
            && (first.contains('.') || first.contains(':') || first == "localhost");

        let qualified = if has_host {
            name.to_string()
        } else if parts.len() == 1 {
            format!("{}/library/{}", DOCKER_HUB_HOST, name)
        } else {
            format!("{}/{}", DOCKER_HUB_HOST, name)
        };

        ScopeKey::parse(&qualified)
    }
}
