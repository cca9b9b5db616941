use std::path::{Path, PathBuf};

use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::lock;
use super::model::{ProfileDatabase, ProfileSet, PROFILES_FILE};
use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::version::VersionInfo;

/// Why the profile database can or cannot be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready { profiles: usize },
    Missing,
    Malformed(String),
    SchemaMismatch { found: i64 },
    Empty,
}

impl Readiness {
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready { .. })
    }
}

/// Reads, caches, backs up and rewrites `launcher_profiles.json`.
pub struct ProfileRepository {
    path: PathBuf,
    loader_prefix: String,
    cache: Mutex<Option<ProfileSet>>,
    /// Serialises read-modify-write cycles inside this process.
    write_gate: Mutex<()>,
}

impl ProfileRepository {
    pub fn new(install_dir: &Path, loader_prefix: String) -> Self {
        Self {
            path: install_dir.join(PROFILES_FILE),
            loader_prefix,
            cache: Mutex::new(None),
            write_gate: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn loader_prefix(&self) -> &str {
        &self.loader_prefix
    }

    async fn load_database(&self) -> UpdaterResult<ProfileDatabase> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| UpdaterError::io(&self.path, e))?;
        ProfileDatabase::parse(&raw)
    }

    /// Classify the database on disk. Also primes the profile cache when usable.
    pub async fn readiness(&self) -> Readiness {
        if !self.path.is_file() {
            return Readiness::Missing;
        }

        let profiles = match self.load_database().await.and_then(|db| db.profiles()) {
            Ok(profiles) => profiles,
            Err(UpdaterError::SchemaMismatch { found, .. }) => {
                return Readiness::SchemaMismatch { found }
            }
            Err(e) => return Readiness::Malformed(e.to_string()),
        };

        if profiles.is_empty() {
            return Readiness::Empty;
        }

        let count = profiles.len();
        *self.cache.lock().await = Some(profiles);
        Readiness::Ready { profiles: count }
    }

    /// Best-effort check: `true` only for a readable v3 database with at least one profile.
    pub async fn ensure_ready(&self) -> bool {
        let readiness = self.readiness().await;
        if !readiness.is_ready() {
            warn!("Profile database {:?} not usable: {:?}", self.path, readiness);
        }
        readiness.is_ready()
    }

    /// All profiles, served from the cache after the first read.
    pub async fn list_profiles(&self) -> UpdaterResult<ProfileSet> {
        let mut cache = self.cache.lock().await;
        if let Some(profiles) = cache.as_ref() {
            return Ok(profiles.clone());
        }

        let profiles = self.load_database().await?.profiles()?;
        debug!("Cached {} profiles from {:?}", profiles.len(), self.path);
        *cache = Some(profiles.clone());
        Ok(profiles)
    }

    pub async fn get_profile(&self, id: &str) -> UpdaterResult<Option<super::Profile>> {
        Ok(self.list_profiles().await?.get(id).cloned())
    }

    pub async fn invalidate_cache(&self) {
        *self.cache.lock().await = None;
    }

    /// `<file>.backup-<YYYYMMDDHHmmss>` for the current UTC time.
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(format!(".backup-{}", Utc::now().format("%Y%m%d%H%M%S")));
        PathBuf::from(name)
    }

    /// Copy the database next to itself. Never overwrites an existing backup.
    pub async fn create_backup(&self) -> UpdaterResult<PathBuf> {
        let dest = self.backup_path();

        let mut source = tokio::fs::File::open(&self.path)
            .await
            .map_err(|e| UpdaterError::io(&self.path, e))?;
        let mut target = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&dest)
            .await
            .map_err(|e| UpdaterError::io(&dest, e))?;

        let copied = async {
            let copied = tokio::io::copy(&mut source, &mut target).await?;
            target.sync_all().await?;
            Ok::<_, std::io::Error>(copied)
        }
        .await;
        drop(target);

        let copied = match copied {
            Ok(copied) => copied,
            Err(source) => {
                if let Err(e) = tokio::fs::remove_file(&dest).await {
                    warn!("Failed to remove partial backup {:?}: {}", dest, e);
                }
                return Err(UpdaterError::io(&dest, source));
            }
        };

        info!("Backed up {:?} -> {:?} ({} bytes)", self.path, dest, copied);
        Ok(dest)
    }

    /// Boolean form of [`create_backup`](Self::create_backup); failures are logged.
    pub async fn backup(&self) -> bool {
        match self.create_backup().await {
            Ok(_) => true,
            Err(e) => {
                warn!("Profile backup failed: {}", e);
                false
            }
        }
    }

    /// Point profile `id` at `<prefix>-<version>` and rewrite the database.
    ///
    /// Always re-reads the file instead of using the cache so edits the
    /// launcher made meanwhile survive. Returns `false` (and writes nothing)
    /// when the profile does not exist.
    pub async fn update_profile_version(
        &self,
        id: &str,
        version: &VersionInfo,
    ) -> UpdaterResult<bool> {
        let _gate = self.write_gate.lock().await;
        let _lock = lock::acquire(&self.path).await?;

        let mut db = self.load_database().await?;
        let version_id = version.version_id(&self.loader_prefix);
        if !db.set_last_version_id(id, &version_id) {
            warn!("Profile {} not found in {:?}; nothing written", id, self.path);
            return Ok(false);
        }

        let json = db.to_json_pretty()?;
        write_atomic(&self.path, json.as_bytes()).await?;
        self.invalidate_cache().await;

        info!("Profile {} now uses {}", id, version_id);
        Ok(true)
    }
}

/// Write `contents` to a sibling temp file, flush it to disk, then rename it
/// over `path`. Readers see the old or the new file, never a mix.
async fn write_atomic(path: &Path, contents: &[u8]) -> UpdaterResult<()> {
    let tmp_path = {
        let mut name = path.as_os_str().to_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    };

    let written = async {
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(contents).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, path).await
    }
    .await;

    if let Err(source) = written {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(UpdaterError::io(path, source));
    }
    Ok(())
}
