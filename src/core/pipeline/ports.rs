use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::downloader::{ArtifactStore, DownloadProgress};
use crate::core::error::UpdaterResult;
use crate::core::loaders::{ClientInstaller, CommandRunner, InstallOutcome};
use crate::core::profiles::{Profile, ProfileRepository};
use crate::core::version::{VersionInfo, VersionResolver};

#[async_trait]
pub trait VersionSource: Send + Sync {
    async fn resolve(&self) -> UpdaterResult<VersionInfo>;
}

#[async_trait]
pub trait ArtifactSource: Send + Sync {
    async fn download(
        &self,
        version: &VersionInfo,
        progress: &DownloadProgress,
        cancel: &CancellationToken,
    ) -> UpdaterResult<()>;
}

#[async_trait]
pub trait InstallStep: Send + Sync {
    async fn install(
        &self,
        version: &VersionInfo,
        cancel: &CancellationToken,
    ) -> UpdaterResult<InstallOutcome>;
}

#[async_trait]
pub trait ProfileStore: Send + Sync {
    async fn find_profile(&self, id: &str) -> UpdaterResult<Option<Profile>>;

    /// `true` only when a full copy of the database was written.
    async fn backup(&self) -> bool;

    /// `Ok(false)` when the profile no longer exists.
    async fn update_profile_version(&self, id: &str, version: &VersionInfo)
        -> UpdaterResult<bool>;
}

#[async_trait]
impl VersionSource for VersionResolver {
    async fn resolve(&self) -> UpdaterResult<VersionInfo> {
        VersionResolver::resolve(self).await
    }
}

#[async_trait]
impl ArtifactSource for ArtifactStore {
    async fn download(
        &self,
        version: &VersionInfo,
        progress: &DownloadProgress,
        cancel: &CancellationToken,
    ) -> UpdaterResult<()> {
        ArtifactStore::download(self, version, progress, cancel).await
    }
}

#[async_trait]
impl<R: CommandRunner + 'static> InstallStep for ClientInstaller<R> {
    async fn install(
        &self,
        version: &VersionInfo,
        cancel: &CancellationToken,
    ) -> UpdaterResult<InstallOutcome> {
        ClientInstaller::install(self, version, cancel).await
    }
}

#[async_trait]
impl ProfileStore for ProfileRepository {
    async fn find_profile(&self, id: &str) -> UpdaterResult<Option<Profile>> {
        self.get_profile(id).await
    }

    async fn backup(&self) -> bool {
        ProfileRepository::backup(self).await
    }

    async fn update_profile_version(
        &self,
        id: &str,
        version: &VersionInfo,
    ) -> UpdaterResult<bool> {
        ProfileRepository::update_profile_version(self, id, version).await
    }
}
