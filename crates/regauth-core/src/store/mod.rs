//! Persistent credential storage.
//!
//! This module provides:
//! - `CredentialBackend`: the store contract the session layer depends on
//! - `FileCredentialStore`: a JSON auth file shared between processes
//! - `FileLock`: the cross-process writer lock used by the file store

pub mod file;
pub mod lock;

pub use file::{FileCredentialStore, DEFAULT_LOCK_TIMEOUT, DEFAULT_STALE_LOCK_AFTER};
pub use lock::FileLock;

use crate::error::Result;
use crate::models::{CredentialEntry, ScopeKey};

/// Storage for per-scope registry credentials.
pub trait CredentialBackend {
    /// Fetch the entry stored for exactly `key`, or `StoreError::NotFound`.
    fn get(&self, key: &ScopeKey) -> Result<CredentialEntry>;

    /// Insert or replace the entry for `entry.scope`.
    fn put(&mut self, entry: CredentialEntry) -> Result<()>;

    /// Remove the entry for exactly `key`. Returns `false` when there was none.
    fn remove(&mut self, key: &ScopeKey) -> Result<bool>;

    /// Remove every entry, returning how many were removed.
    fn remove_all(&mut self) -> Result<usize>;

    /// All stored scopes, sorted.
    fn keys(&self) -> Result<Vec<ScopeKey>>;
}
