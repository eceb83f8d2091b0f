use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::lock::FileLock;
use super::CredentialBackend;
use crate::error::{Result, StoreError};
use crate::models::{AuthToken, CredentialEntry, ScopeKey};

/// Default time a writer waits for another process to release the lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// A lock file older than this is assumed to belong to a crashed process.
pub const DEFAULT_STALE_LOCK_AFTER: Duration = Duration::from_secs(60);

/// On-disk layout of the auth file:
/// `{"auths": {"quay.io": {"auth": "<base64 user:secret>"}}}`.
///
/// Fields this tool does not manage (e.g. `credHelpers`) are carried through
/// rewrites untouched.
#[derive(Debug, Default, Serialize, Deserialize)]
struct AuthFile {
    #[serde(default)]
    auths: BTreeMap<String, AuthRecord>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct AuthRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    auth: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    expires_at: Option<DateTime<Utc>>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl AuthRecord {
    fn from_entry(entry: &CredentialEntry) -> Self {
        Self {
            auth: Some(entry.auth_token.expose().to_string()),
            expires_at: entry.expiry,
            extra: Map::new(),
        }
    }

    fn to_entry(&self, scope: ScopeKey) -> CredentialEntry {
        CredentialEntry {
            scope,
            auth_token: AuthToken::new(self.auth.clone().unwrap_or_default()),
            expiry: self.expires_at,
        }
    }
}

impl AuthFile {
    /// Raw keys under `auths` that name `scope`, canonical spelling first.
    fn raw_keys_for(&self, scope: &ScopeKey) -> Vec<String> {
        let canonical = scope.to_string();
        let mut keys: Vec<String> = self
            .auths
            .keys()
            .filter(|raw| **raw != canonical)
            .filter(|raw| ScopeKey::parse(raw).map(|k| k == *scope).unwrap_or(false))
            .cloned()
            .collect();
        if self.auths.contains_key(&canonical) {
            keys.insert(0, canonical);
        }
        keys
    }
}

/// Credential store backed by a JSON auth file.
///
/// Every call reads the file from disk; nothing is cached between calls so
/// separate processes always see each other's writes. Mutations hold
/// [`FileLock`] for the read-modify-write cycle and replace the file by
/// writing a temp file and renaming it over the original.
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
    lock_timeout: Duration,
    stale_lock_after: Duration,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            stale_lock_after: DEFAULT_STALE_LOCK_AFTER,
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn with_stale_lock_after(mut self, age: Duration) -> Self {
        self.stale_lock_after = age;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<AuthFile> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "auth file does not exist yet");
                return Ok(AuthFile::default());
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Err(StoreError::corrupt(&self.path, e.to_string()));
            }
            Err(e) => return Err(StoreError::from_io(&self.path, e)),
        };

        if contents.trim().is_empty() {
            return Ok(AuthFile::default());
        }

        let file: AuthFile = serde_json::from_str(&contents)
            .map_err(|e| StoreError::corrupt(&self.path, e.to_string()))?;

        for raw in file.auths.keys() {
            ScopeKey::parse(raw).map_err(|e| {
                StoreError::corrupt(&self.path, format!("invalid key {:?}: {}", raw, e))
            })?;
        }

        Ok(file)
    }

    fn save(&self, file: &AuthFile) -> Result<()> {
        let contents = serde_json::to_string_pretty(file)
            .map_err(|e| StoreError::corrupt(&self.path, e.to_string()))?;

        // Each writer gets its own temp file next to the target, so a rename
        // only ever moves a completely written file into place.
        let dir = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        let mut temp = NamedTempFile::new_in(dir).map_err(|e| StoreError::from_io(dir, e))?;

        let write_temp = |temp: &mut NamedTempFile| -> std::io::Result<()> {
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                temp.as_file()
                    .set_permissions(fs::Permissions::from_mode(0o600))?;
            }
            temp.write_all(contents.as_bytes())?;
            temp.write_all(b"\n")?;
            temp.as_file().sync_all()
        };
        write_temp(&mut temp).map_err(|e| StoreError::from_io(temp.path(), e))?;

        // A failed persist drops the temp file, which deletes it.
        temp.persist(&self.path)
            .map_err(|e| StoreError::from_io(&self.path, e.error))?;

        debug!(path = %self.path.display(), entries = file.auths.len(), "auth file written");
        Ok(())
    }

    fn ensure_parent(&self) -> Result<()> {
        let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return Ok(());
        };
        if parent.is_dir() {
            return Ok(());
        }

        let mut builder = fs::DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder
            .create(parent)
            .map_err(|e| StoreError::from_io(parent, e))
    }

    /// Run a read-modify-write cycle under the lock. The file is only
    /// rewritten when `mutate` reports a change.
    fn update<T>(&self, mutate: impl FnOnce(&mut AuthFile) -> (T, bool)) -> Result<T> {
        self.ensure_parent()?;
        let _lock = FileLock::acquire(&self.path, self.lock_timeout, self.stale_lock_after)?;

        let mut file = self.load()?;
        let (result, changed) = mutate(&mut file);
        if changed {
            self.save(&file)?;
        }
        Ok(result)
    }
}

impl CredentialBackend for FileCredentialStore {
    fn get(&self, key: &ScopeKey) -> Result<CredentialEntry> {
        let file = self.load()?;
        file.raw_keys_for(key)
            .first()
            .and_then(|raw| file.auths.get(raw))
            .map(|record| record.to_entry(key.clone()))
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn put(&mut self, entry: CredentialEntry) -> Result<()> {
        let canonical = entry.scope.to_string();
        self.update(|file| {
            for raw in file.raw_keys_for(&entry.scope) {
                file.auths.remove(&raw);
            }
            file.auths.insert(canonical.clone(), AuthRecord::from_entry(&entry));
            ((), true)
        })?;
        info!(scope = %canonical, "stored credentials");
        Ok(())
    }

    fn remove(&mut self, key: &ScopeKey) -> Result<bool> {
        let removed = self.update(|file| {
            let raw_keys = file.raw_keys_for(key);
            for raw in &raw_keys {
                file.auths.remove(raw);
            }
            let removed = !raw_keys.is_empty();
            (removed, removed)
        })?;

        if removed {
            info!(scope = %key, "removed credentials");
        } else {
            debug!(scope = %key, "no credentials to remove");
        }
        Ok(removed)
    }

    fn remove_all(&mut self) -> Result<usize> {
        let count = self.update(|file| {
            let count = file.auths.len();
            file.auths.clear();
            (count, count > 0)
        })?;
        info!(count, "removed all stored credentials");
        Ok(count)
    }

    fn keys(&self) -> Result<Vec<ScopeKey>> {
        let file = self.load()?;
        let mut keys = file
            .auths
            .keys()
            .map(|raw| ScopeKey::parse(raw))
            .collect::<Result<Vec<_>>>()?;
        keys.sort();
        keys.dedup();
        Ok(keys)
    }
}
