//! Login/logout orchestration.
//!
//! `SessionManager` drives a [`CredentialBackend`] on behalf of the CLI. It
//! never aborts a batch: every target is attempted and its outcome written
//! to the output sink, and the caller decides the exit status from the
//! returned [`LogoutReport`].

use std::io::Write;

use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::models::{CredentialEntry, ScopeKey, SystemContext};
use crate::resolver::SessionResolver;
use crate::store::{CredentialBackend, FileCredentialStore};

#[derive(Debug)]
pub enum LogoutOutcome {
    Removed,
    /// Nothing was stored for the target. `via_docker` is set when the
    /// Docker config holds credentials for it instead.
    NotLoggedIn { via_docker: bool },
    Failed(StoreError),
}

#[derive(Debug)]
pub struct TargetResult {
    pub target: String,
    pub outcome: LogoutOutcome,
}

#[derive(Debug, Default)]
pub struct LogoutReport {
    pub results: Vec<TargetResult>,
}

impl LogoutReport {
    /// True unless some target failed. Targets that were not logged in count
    /// as success.
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &StoreError)> {
        self.results.iter().filter_map(|r| match r.outcome {
            LogoutOutcome::Failed(ref e) => Some((r.target.as_str(), e)),
            _ => None,
        })
    }

    pub fn removed_count(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, LogoutOutcome::Removed))
            .count()
    }
}

#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub target: String,
    pub username: String,
    pub secret: String,
    pub expires_in: Option<Duration>,
    pub accept_repositories: bool,
}

pub struct SessionManager<B: CredentialBackend> {
    store: B,
    context: SystemContext,
    docker_config: Option<FileCredentialStore>,
}

impl<B: CredentialBackend> SessionManager<B> {
    pub fn new(store: B, context: SystemContext) -> Self {
        Self {
            store,
            context,
            docker_config: None,
        }
    }

    /// Consult a Docker `config.json` (read-only) when explaining why a
    /// target is not logged in.
    pub fn with_docker_config(mut self, docker_config: FileCredentialStore) -> Self {
        self.docker_config = Some(docker_config);
        self
    }

    pub fn store(&self) -> &B {
        &self.store
    }

    pub fn context(&self) -> &SystemContext {
        &self.context
    }

    /// Remove the credentials of each target, writing one line per target.
    ///
    /// Only a failure to write to `out` is returned as an error; per-target
    /// failures are collected in the report.
    pub fn logout<W: Write>(
        &mut self,
        targets: &[String],
        accept_repositories: bool,
        out: &mut W,
    ) -> Result<LogoutReport> {
        let resolver = SessionResolver::new(accept_repositories);
        debug!(
            targets = targets.len(),
            accept_repositories,
            insecure_skip_tls_verify = ?self.context.insecure_skip_tls_verify,
            "logging out"
        );

        let mut report = LogoutReport::default();
        for target in targets {
            let outcome = self.logout_one(&resolver, target);
            Self::write_logout_line(out, target, &outcome)?;
            report.results.push(TargetResult {
                target: target.clone(),
                outcome,
            });
        }

        info!(
            removed = report.removed_count(),
            failed = report.failures().count(),
            "logout finished"
        );
        Ok(report)
    }

    fn logout_one(&mut self, resolver: &SessionResolver, target: &str) -> LogoutOutcome {
        let scope = match resolver.resolve_target(target) {
            Ok(scope) => scope,
            Err(e) => return LogoutOutcome::Failed(e),
        };

        match self.store.remove(&scope) {
            Ok(true) => LogoutOutcome::Removed,
            Ok(false) => LogoutOutcome::NotLoggedIn {
                via_docker: self.has_docker_credentials(&scope),
            },
            Err(StoreError::NotFound(_)) => LogoutOutcome::NotLoggedIn { via_docker: false },
            Err(e) => {
                warn!(registry = target, error = %e, "failed to remove credentials");
                LogoutOutcome::Failed(e)
            }
        }
    }

    fn has_docker_credentials(&self, scope: &ScopeKey) -> bool {
        let Some(ref docker) = self.docker_config else {
            return false;
        };
        match docker.get(scope) {
            Ok(_) => true,
            Err(StoreError::NotFound(_)) => false,
            Err(e) => {
                debug!(error = %e, "ignoring unreadable Docker config");
                false
            }
        }
    }

    fn write_logout_line<W: Write>(out: &mut W, target: &str, outcome: &LogoutOutcome) -> Result<()> {
        let written = match outcome {
            LogoutOutcome::Removed => writeln!(out, "Removed login credentials for {}", target),
            LogoutOutcome::NotLoggedIn { via_docker: false } => {
                writeln!(out, "Not logged into {}", target)
            }
            LogoutOutcome::NotLoggedIn { via_docker: true } => writeln!(
                out,
                "Not logged into {} with regauth. Existing credentials were established via docker login. Please use docker logout instead.",
                target
            ),
            LogoutOutcome::Failed(e) => writeln!(out, "Failed to log out of {}: {}", target, e),
        };
        written.map_err(StoreError::Output)
    }

    /// Remove every stored credential.
    pub fn logout_all<W: Write>(&mut self, out: &mut W) -> Result<usize> {
        let count = self.store.remove_all()?;
        writeln!(out, "Removed login credentials for all registries").map_err(StoreError::Output)?;
        Ok(count)
    }

    /// Store credentials for `request.target`, replacing any existing ones.
    pub fn login<W: Write>(&mut self, request: &LoginRequest, out: &mut W) -> Result<()> {
        if request.username.is_empty() {
            return Err(StoreError::InvalidCredentials("username must not be empty".into()));
        }
        if request.username.contains(':') {
            return Err(StoreError::InvalidCredentials("username must not contain ':'".into()));
        }
        if request.secret.is_empty() {
            return Err(StoreError::InvalidCredentials("password must not be empty".into()));
        }

        let resolver = SessionResolver::new(request.accept_repositories);
        let scope = resolver.resolve_target(&request.target)?;

        let mut entry = CredentialEntry::new_basic(scope, &request.username, &request.secret);
        if let Some(ttl) = request.expires_in {
            let expiry = Utc::now().checked_add_signed(ttl).ok_or_else(|| {
                StoreError::InvalidCredentials("expiry is out of range".into())
            })?;
            entry = entry.with_expiry(expiry);
        }

        self.store.put(entry)?;
        debug!(registry = %request.target, "login stored");

        writeln!(out, "Login Succeeded!").map_err(StoreError::Output)
    }

    /// Username stored for exactly the scope of `target`.
    pub fn get_login(&self, target: &str, accept_repositories: bool) -> Result<String> {
        let scope = SessionResolver::new(accept_repositories).resolve_target(target)?;
        let entry = match self.store.get(&scope) {
            Ok(entry) => entry,
            Err(StoreError::NotFound(_)) => {
                return Err(StoreError::NotLoggedIn {
                    target: target.to_string(),
                })
            }
            Err(e) => return Err(e),
        };

        entry
            .basic_credentials()
            .map(|(username, _)| username)
            .ok_or_else(|| StoreError::NotLoggedIn {
                target: target.to_string(),
            })
    }
}
