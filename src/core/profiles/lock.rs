use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::core::error::{UpdaterError, UpdaterResult};

/// A lock older than this is assumed to belong to a crashed process.
const LOCK_STALE_SECS: i64 = 120;
const LOCK_RETRY: Duration = Duration::from_millis(100);
const LOCK_MAX_ATTEMPTS: u32 = 100;

/// Sibling lock file for `target` (`<file>.lock`).
pub fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(".lock");
    PathBuf::from(name)
}

/// Held while the profile database is being rewritten. Removes the lock file on drop.
#[derive(Debug)]
pub struct FileLockGuard {
    path: PathBuf,
}

impl FileLockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for FileLockGuard {
    fn drop(&mut self) {
        if let Err(source) = std::fs::remove_file(&self.path) {
            warn!("Failed to remove lock {:?}: {}", self.path, source);
        }
    }
}

/// Take the lock file next to `target`, waiting up to ~10s for another holder.
pub async fn acquire(target: &Path) -> UpdaterResult<FileLockGuard> {
    let lock_path = lock_path_for(target);
    let mut attempts = 0_u32;
    loop {
        attempts += 1;
        match tokio::fs::OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&lock_path)
            .await
        {
            Ok(mut file) => {
                let payload = serde_json::json!({
                    "pid": std::process::id(),
                    "timestamp": Utc::now().timestamp(),
                });
                file.write_all(payload.to_string().as_bytes())
                    .await
                    .map_err(|e| UpdaterError::io(&lock_path, e))?;
                debug!("Acquired {:?}", lock_path);
                return Ok(FileLockGuard { path: lock_path });
            }
            Err(err) if err.kind() == std::io::ErrorKind::AlreadyExists => {
                if attempts >= LOCK_MAX_ATTEMPTS {
                    return Err(UpdaterError::ProfileLock {
                        path: lock_path,
                        reason: "held by another process".into(),
                    });
                }
                cleanup_stale_lock(&lock_path).await;
                if attempts % 20 == 0 {
                    info!("Waiting for profile lock at {:?}", lock_path);
                }
                tokio::time::sleep(LOCK_RETRY).await;
            }
            Err(source) => return Err(UpdaterError::io(&lock_path, source)),
        }
    }
}

async fn cleanup_stale_lock(lock_path: &Path) {
    let Ok(content) = tokio::fs::read_to_string(lock_path).await else {
        return;
    };
    let Ok(value) = serde_json::from_str::<serde_json::Value>(&content) else {
        return;
    };

    let pid = value
        .get("pid")
        .and_then(|v| v.as_u64())
        .unwrap_or_default() as u32;
    let timestamp = value
        .get("timestamp")
        .and_then(|v| v.as_i64())
        .unwrap_or_default();
    let expired = Utc::now().timestamp().saturating_sub(timestamp) > LOCK_STALE_SECS;

    #[cfg(target_os = "linux")]
    let dead = pid != std::process::id() && !PathBuf::from(format!("/proc/{pid}")).exists();
    #[cfg(not(target_os = "linux"))]
    let dead = {
        let _ = pid;
        false
    };

    if expired || dead {
        warn!("Removing stale profile lock {:?} (pid {})", lock_path, pid);
        let _ = tokio::fs::remove_file(lock_path).await;
    }
}
