//! regauth core
//!
//! Credential storage and session lifecycle for container registry logins:
//! - `store`: per-scope credentials persisted in a shared auth file
//! - `resolver`: maps targets and image references to credential scopes
//! - `session`: login/logout orchestration with per-target reporting

pub mod config;
pub mod error;
pub mod models;
pub mod resolver;
pub mod session;
pub mod store;

pub use config::{Config, PathSources};
pub use error::{Result, StoreError};
pub use models::{AuthToken, CredentialEntry, OptionalBool, ScopeKey, SystemContext};
pub use resolver::SessionResolver;
pub use session::{LoginRequest, LogoutOutcome, LogoutReport, SessionManager, TargetResult};
pub use store::{CredentialBackend, FileCredentialStore};
