//! Data models for registry credentials.
//!
//! - `ScopeKey`: registry-wide or repository scope a credential applies to
//! - `CredentialEntry`, `AuthToken`: a stored credential and its encoded secret
//! - `OptionalBool`, `SystemContext`: per-invocation settings

pub mod context;
pub mod credential;

pub use context::{OptionalBool, SystemContext};
pub use credential::{AuthToken, CredentialEntry, ScopeKey, DOCKER_HUB_HOST};
