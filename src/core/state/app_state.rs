use std::path::{Path, PathBuf};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::core::downloader::ArtifactStore;
use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::http::build_http_client;
use crate::core::loaders::{ClientInstaller, SystemCommandRunner};
use crate::core::maven::{
    MavenModule, NEOFORGE_LATEST_VERSION_ENDPOINT, NEOFORGE_MAVEN, NEOFORGE_MODULE,
};
use crate::core::profiles::ProfileRepository;
use crate::core::version::VersionResolver;

pub const SETTINGS_FILE: &str = "settings.json";
const DEFAULT_LOADER_PREFIX: &str = "neoforge";

/// `Minecraft` section of `settings.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MinecraftOptions {
    pub install_directory: PathBuf,
    /// Explicit Java executable for the installer. `None` means `java` on PATH.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub java_path: Option<PathBuf>,
}

/// `Neoforge` section of `settings.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NeoforgeOptions {
    pub latest_version_endpoint: String,
    #[serde(default = "default_maven_repository")]
    pub maven_repository: String,
    #[serde(default = "default_artifact")]
    pub artifact: String,
    #[serde(default = "default_loader_prefix")]
    pub loader_prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Settings {
    pub minecraft: MinecraftOptions,
    pub neoforge: NeoforgeOptions,
}

fn default_maven_repository() -> String {
    NEOFORGE_MAVEN.to_string()
}

fn default_artifact() -> String {
    NEOFORGE_MODULE.to_string()
}

fn default_loader_prefix() -> String {
    DEFAULT_LOADER_PREFIX.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            minecraft: MinecraftOptions {
                install_directory: default_minecraft_dir(),
                java_path: None,
            },
            neoforge: NeoforgeOptions {
                latest_version_endpoint: NEOFORGE_LATEST_VERSION_ENDPOINT.to_string(),
                maven_repository: default_maven_repository(),
                artifact: default_artifact(),
                loader_prefix: default_loader_prefix(),
            },
        }
    }
}

impl Settings {
    /// Load settings from `path`.
    ///
    /// A missing file is replaced by a default one and reported as
    /// [`UpdaterError::ConfigMissing`] so the user can review it first.
    pub fn load_or_bootstrap(path: &Path) -> UpdaterResult<Self> {
        if !path.exists() {
            let defaults = Settings::default();
            defaults.save(path)?;
            warn!("Settings file missing; wrote defaults to {:?}", path);
            return Err(UpdaterError::ConfigMissing {
                path: path.to_path_buf(),
            });
        }

        let raw = std::fs::read_to_string(path).map_err(|e| UpdaterError::io(path, e))?;
        let settings: Settings = serde_json::from_str(&raw)?;
        info!(
            "Loaded settings: install_dir={:?} endpoint={}",
            settings.minecraft.install_directory, settings.neoforge.latest_version_endpoint
        );
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> UpdaterResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| UpdaterError::io(parent, e))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json).map_err(|e| UpdaterError::io(path, e))
    }

    pub fn module(&self) -> UpdaterResult<MavenModule> {
        MavenModule::parse(&self.neoforge.artifact)
    }
}

/// Everything one updater run needs, built once from the settings.
pub struct AppState {
    pub settings: Settings,
    pub http_client: Client,
    /// Directory the installer jars are cached under and the installer runs in.
    pub work_dir: PathBuf,
}

impl AppState {
    pub fn new(settings: Settings, work_dir: PathBuf) -> UpdaterResult<Self> {
        let http_client = build_http_client()?;
        Ok(Self {
            settings,
            http_client,
            work_dir,
        })
    }

    pub fn loader_prefix(&self) -> &str {
        &self.settings.neoforge.loader_prefix
    }

    pub fn version_resolver(&self) -> VersionResolver {
        VersionResolver::new(
            self.http_client.clone(),
            self.settings.neoforge.latest_version_endpoint.clone(),
        )
    }

    pub fn artifact_store(&self) -> UpdaterResult<ArtifactStore> {
        Ok(ArtifactStore::new(
            self.http_client.clone(),
            self.work_dir.clone(),
            self.settings.module()?,
            self.settings.neoforge.maven_repository.clone(),
        ))
    }

    pub fn installer(&self) -> UpdaterResult<ClientInstaller<SystemCommandRunner>> {
        Ok(ClientInstaller::new(
            self.artifact_store()?,
            self.settings.minecraft.install_directory.clone(),
            self.loader_prefix().to_string(),
            crate::core::java::resolve_java_binary(self.settings.minecraft.java_path.as_deref()),
            SystemCommandRunner,
        ))
    }

    pub fn profile_repository(&self) -> ProfileRepository {
        ProfileRepository::new(
            &self.settings.minecraft.install_directory,
            self.loader_prefix().to_string(),
        )
    }
}

/// The vanilla launcher's default game directory for this platform.
pub fn default_minecraft_dir() -> PathBuf {
    if cfg!(target_os = "windows") {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".minecraft")
    } else if cfg!(target_os = "macos") {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("minecraft")
    } else {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".minecraft")
    }
}
