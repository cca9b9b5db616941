use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use futures_util::StreamExt;
use reqwest::Client;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::maven::{MavenArtifact, MavenModule};
use crate::core::version::VersionInfo;

/// Directory (under the store root) installer jars are kept in.
pub const VERSIONS_DIR: &str = "versions";

/// Byte counters shared between a running download and whoever renders it.
#[derive(Debug, Default)]
pub struct DownloadProgress {
    downloaded: AtomicU64,
    /// `0` while the server has not announced a length.
    total: AtomicU64,
}

impl DownloadProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn downloaded(&self) -> u64 {
        self.downloaded.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> Option<u64> {
        match self.total.load(Ordering::Relaxed) {
            0 => None,
            n => Some(n),
        }
    }

    /// Whole-number percentage, when the total size is known.
    pub fn percent(&self) -> Option<u8> {
        let total = self.total()?;
        let pct = self.downloaded().saturating_mul(100) / total;
        Some(pct.min(100) as u8)
    }

    pub fn set_total(&self, total: Option<u64>) {
        self.total.store(total.unwrap_or(0), Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.downloaded.fetch_add(n, Ordering::Relaxed);
    }
}

/// Locates installer jars on disk and fetches missing ones.
///
/// Only existence is tracked; a jar at its canonical path is assumed complete
/// because downloads land under a `.part` name and are renamed when finished.
#[derive(Clone)]
pub struct ArtifactStore {
    client: Client,
    root: PathBuf,
    module: MavenModule,
    repository: String,
}

impl ArtifactStore {
    pub fn new(client: Client, root: PathBuf, module: MavenModule, repository: String) -> Self {
        Self {
            client,
            root,
            module,
            repository,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn artifact(&self, version: &VersionInfo) -> MavenArtifact {
        self.module.installer(version.as_str())
    }

    /// `<root>/versions/<artifact>-<version>-installer.jar`
    pub fn artifact_path(&self, version: &VersionInfo) -> PathBuf {
        self.root
            .join(VERSIONS_DIR)
            .join(self.artifact(version).filename())
    }

    pub fn download_url(&self, version: &VersionInfo) -> String {
        self.artifact(version).url(&self.repository)
    }

    pub fn exists(&self, version: &VersionInfo) -> bool {
        self.artifact_path(version).is_file()
    }

    /// Fetch the installer for `version` unless it is already on disk.
    pub async fn download(
        &self,
        version: &VersionInfo,
        progress: &DownloadProgress,
        cancel: &CancellationToken,
    ) -> UpdaterResult<()> {
        let dest = self.artifact_path(version);
        if dest.is_file() {
            info!("Installer already present at {:?}, skipping download", dest);
            return Ok(());
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| UpdaterError::io(parent, e))?;
        }

        let url = self.download_url(version);
        let part = part_path(&dest);

        match self.stream_to(&url, &part, progress, cancel).await {
            Ok(()) => {
                tokio::fs::rename(&part, &dest)
                    .await
                    .map_err(|e| UpdaterError::io(&dest, e))?;
                info!("Downloaded {} -> {:?}", url, dest);
                Ok(())
            }
            Err(err) => {
                if let Err(e) = tokio::fs::remove_file(&part).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!("Failed to remove partial download {:?}: {}", part, e);
                    }
                }
                Err(err)
            }
        }
    }

    async fn stream_to(
        &self,
        url: &str,
        part: &Path,
        progress: &DownloadProgress,
        cancel: &CancellationToken,
    ) -> UpdaterResult<()> {
        debug!("GET {}", url);
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(UpdaterError::Cancelled),
            response = self.client.get(url).send() => response?,
        };

        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::DownloadFailed {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        progress.set_total(response.content_length());

        // Write inside a block so the handle is closed before the rename.
        {
            let mut file = tokio::fs::File::create(part)
                .await
                .map_err(|e| UpdaterError::io(part, e))?;

            let mut stream = response.bytes_stream();
            loop {
                let chunk = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => return Err(UpdaterError::Cancelled),
                    chunk = stream.next() => chunk,
                };
                let Some(chunk) = chunk else { break };
                let chunk = chunk?;
                file.write_all(&chunk)
                    .await
                    .map_err(|e| UpdaterError::io(part, e))?;
                progress.add(chunk.len() as u64);
            }

            file.flush().await.map_err(|e| UpdaterError::io(part, e))?;
            file.sync_all().await.map_err(|e| UpdaterError::io(part, e))?;
        }

        Ok(())
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".part");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    use super::*;

    const JAR_ROUTE: &str =
        "/releases/net/neoforged/neoforge/20.1.1/neoforge-20.1.1-installer.jar";
    const PAYLOAD: &[u8] = b"PK\x03\x04 fake installer payload";

    async fn serve(status: StatusCode) -> (String, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let router = Router::new()
            .route(
                JAR_ROUTE,
                get(
                    move |State(hits): State<Arc<AtomicUsize>>| async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        (status, PAYLOAD.to_vec())
                    },
                ),
            )
            .with_state(hits.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        (format!("http://{}/releases", addr), hits)
    }

    fn store(root: &Path, repo: String) -> ArtifactStore {
        ArtifactStore::new(
            Client::new(),
            root.to_path_buf(),
            MavenModule::parse("net.neoforged:neoforge").unwrap(),
            repo,
        )
    }

    #[test]
    fn artifact_path_is_deterministic() {
        let s = store(Path::new("/work"), "https://maven.neoforged.net/releases".into());
        let v = VersionInfo::new("20.1.1");
        assert_eq!(
            s.artifact_path(&v),
            PathBuf::from("/work/versions/neoforge-20.1.1-installer.jar")
        );
        assert_eq!(
            s.download_url(&v),
            "https://maven.neoforged.net/releases/net/neoforged/neoforge/20.1.1/neoforge-20.1.1-installer.jar"
        );
    }

    #[tokio::test]
    async fn download_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, hits) = serve(StatusCode::OK).await;
        let s = store(dir.path(), repo);
        let v = VersionInfo::new("20.1.1");
        let cancel = CancellationToken::new();

        let progress = DownloadProgress::new();
        s.download(&v, &progress, &cancel).await.unwrap();
        assert!(s.exists(&v));
        assert_eq!(std::fs::read(s.artifact_path(&v)).unwrap(), PAYLOAD);
        assert_eq!(progress.downloaded(), PAYLOAD.len() as u64);
        assert_eq!(progress.percent(), Some(100));

        s.download(&v, &DownloadProgress::new(), &cancel).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_success_status_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, _hits) = serve(StatusCode::NOT_FOUND).await;
        let s = store(dir.path(), repo);
        let v = VersionInfo::new("20.1.1");

        let err = s
            .download(&v, &DownloadProgress::new(), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdaterError::DownloadFailed { status: 404, .. }));
        assert!(!s.exists(&v));
        assert!(!part_path(&s.artifact_path(&v)).exists());
    }

    #[tokio::test]
    async fn cancelled_download_is_discarded() {
        let dir = tempfile::tempdir().unwrap();
        let (repo, _hits) = serve(StatusCode::OK).await;
        let s = store(dir.path(), repo);
        let v = VersionInfo::new("20.1.1");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = s
            .download(&v, &DownloadProgress::new(), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, UpdaterError::Cancelled));
        assert!(!s.exists(&v));
    }
}
