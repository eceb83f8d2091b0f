use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::error::{Result, StoreError};

/// How often a waiting writer re-checks the lock file.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Distinguishes lock holders that share a pid (threads of one process).
static LOCK_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Exclusive cross-process lock held as `<auth file>.lock`.
///
/// The lock file is created with `create_new`, so only one holder can exist
/// at a time, and it records an owner token (pid plus a per-acquisition
/// sequence). The guard only removes the file on drop while it still holds
/// its own token.
///
/// A lock file left behind by a crashed process is reclaimed once it is
/// older than `stale_after`. Reclaiming is serialized through a second
/// `<auth file>.lock.reclaim` file, and staleness is re-checked under it, so
/// two waiters can never both delete a lock and end up holding it together.
#[derive(Debug)]
pub struct FileLock {
    path: PathBuf,
    token: String,
}

impl FileLock {
    pub fn lock_path_for(target: &Path) -> PathBuf {
        Self::sibling(target, ".lock")
    }

    fn sibling(target: &Path, suffix: &str) -> PathBuf {
        let mut name = target
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(suffix);
        target.with_file_name(name)
    }

    fn owner_token() -> String {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        format!(
            "{}:{}:{}",
            std::process::id(),
            LOCK_SEQUENCE.fetch_add(1, Ordering::Relaxed),
            nanos
        )
    }

    pub fn acquire(target: &Path, timeout: Duration, stale_after: Duration) -> Result<Self> {
        let path = Self::lock_path_for(target);
        let token = Self::owner_token();
        let started = Instant::now();

        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    if let Err(e) = writeln!(file, "{}", token).and_then(|_| file.sync_all()) {
                        let _ = fs::remove_file(&path);
                        return Err(StoreError::from_io(&path, e));
                    }
                    debug!(path = %path.display(), "acquired auth file lock");
                    return Ok(Self { path, token });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if Self::is_stale(&path, stale_after) && Self::reclaim(&path, stale_after)? {
                        continue;
                    }
                }
                Err(e) => return Err(StoreError::from_io(&path, e)),
            }

            if started.elapsed() >= timeout {
                return Err(StoreError::LockTimeout { path });
            }
            std::thread::sleep(LOCK_POLL_INTERVAL);
        }
    }

    /// Remove a stale lock file while holding the reclaim guard. Returns
    /// `true` when the stale lock was removed by this call.
    fn reclaim(path: &Path, stale_after: Duration) -> Result<bool> {
        let guard = Self::sibling(path, ".reclaim");
        match OpenOptions::new().write(true).create_new(true).open(&guard) {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                // Another waiter is reclaiming. A guard only lives for a few
                // syscalls, so an old one was left by a crash.
                if Self::is_stale(&guard, stale_after) {
                    let _ = fs::remove_file(&guard);
                }
                return Ok(false);
            }
            Err(e) => return Err(StoreError::from_io(&guard, e)),
        }

        // The lock may have been released and taken again since it was
        // first seen as stale.
        let removed = Self::is_stale(path, stale_after) && fs::remove_file(path).is_ok();
        if removed {
            warn!(path = %path.display(), "removed stale auth file lock");
        }

        let _ = fs::remove_file(&guard);
        Ok(removed)
    }

    fn is_stale(path: &Path, stale_after: Duration) -> bool {
        fs::metadata(path)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|modified| SystemTime::now().duration_since(modified).ok())
            .map(|age| age > stale_after)
            .unwrap_or(false)
    }

    fn is_owned(&self) -> bool {
        fs::read_to_string(&self.path)
            .map(|contents| contents.trim() == self.token)
            .unwrap_or(false)
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        if !self.is_owned() {
            warn!(path = %self.path.display(), "auth file lock was taken over, not removing it");
            return;
        }
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to release auth file lock");
        }
    }
}
