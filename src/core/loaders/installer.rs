use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::process::{CommandRunner, CommandSpec};
use crate::core::downloader::ArtifactStore;
use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::version::VersionInfo;

/// Flag that makes NeoForge's installer set up the vanilla launcher client.
pub const INSTALL_CLIENT_FLAG: &str = "--install-client";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallOutcome {
    FreshlyInstalled,
    /// The version directory already existed; nothing was run.
    Cached,
}

/// Runs a downloaded installer jar with `java -jar <jar> --install-client`.
pub struct ClientInstaller<R: CommandRunner> {
    store: ArtifactStore,
    install_dir: PathBuf,
    loader_prefix: String,
    java: PathBuf,
    runner: R,
    /// Installs never overlap, which also covers two runs for the same version.
    gate: Mutex<()>,
}

impl<R: CommandRunner> ClientInstaller<R> {
    pub fn new(
        store: ArtifactStore,
        install_dir: PathBuf,
        loader_prefix: String,
        java: PathBuf,
        runner: R,
    ) -> Self {
        Self {
            store,
            install_dir,
            loader_prefix,
            java,
            runner,
            gate: Mutex::new(()),
        }
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// `<install_dir>/versions/<prefix>-<version>`
    pub fn version_dir(&self, version: &VersionInfo) -> PathBuf {
        self.install_dir
            .join("versions")
            .join(version.version_id(&self.loader_prefix))
    }

    pub fn command_for(&self, jar: &Path) -> CommandSpec {
        CommandSpec {
            program: self.java.clone(),
            args: vec![
                "-jar".to_string(),
                jar.to_string_lossy().to_string(),
                INSTALL_CLIENT_FLAG.to_string(),
            ],
            current_dir: self.store.root().to_path_buf(),
        }
    }

    pub async fn install(
        &self,
        version: &VersionInfo,
        cancel: &CancellationToken,
    ) -> UpdaterResult<InstallOutcome> {
        let _guard = self.gate.lock().await;

        let version_dir = self.version_dir(version);
        if version_dir.is_dir() {
            info!("{:?} already installed, skipping installer", version_dir);
            return Ok(InstallOutcome::Cached);
        }

        let jar = self.store.artifact_path(version);
        if !jar.is_file() {
            return Err(UpdaterError::JavaExecution(format!(
                "installer jar {:?} is missing",
                jar
            )));
        }

        info!("Installing {} from {:?}", version.version_id(&self.loader_prefix), jar);
        let exit = self.runner.run(&self.command_for(&jar), cancel).await?;
        if !exit.success {
            return Err(UpdaterError::InstallerExited { code: exit.code });
        }

        info!("Installer for {} finished", version);
        Ok(InstallOutcome::FreshlyInstalled)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::core::loaders::process::ProcessExit;
    use crate::core::maven::MavenModule;

    /// Counts spawns and records the last command instead of running anything.
    struct CountingRunner {
        spawns: AtomicUsize,
        exit_code: i32,
        last: std::sync::Mutex<Option<CommandSpec>>,
    }

    impl CountingRunner {
        fn new(exit_code: i32) -> Self {
            Self {
                spawns: AtomicUsize::new(0),
                exit_code,
                last: std::sync::Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl CommandRunner for CountingRunner {
        async fn run(
            &self,
            spec: &CommandSpec,
            _cancel: &CancellationToken,
        ) -> UpdaterResult<ProcessExit> {
            self.spawns.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(spec.clone());
            Ok(ProcessExit {
                success: self.exit_code == 0,
                code: Some(self.exit_code),
            })
        }
    }

    fn installer(root: &Path, runner: CountingRunner) -> ClientInstaller<CountingRunner> {
        let store = ArtifactStore::new(
            reqwest::Client::new(),
            root.join("work"),
            MavenModule::parse("net.neoforged:neoforge").unwrap(),
            "http://127.0.0.1:9/releases".into(),
        );
        ClientInstaller::new(
            store,
            root.join(".minecraft"),
            "neoforge".into(),
            PathBuf::from("java"),
            runner,
        )
    }

    fn place_jar(installer: &ClientInstaller<CountingRunner>, version: &VersionInfo) -> PathBuf {
        let jar = installer.store.artifact_path(version);
        std::fs::create_dir_all(jar.parent().unwrap()).unwrap();
        std::fs::write(&jar, b"jar").unwrap();
        jar
    }

    #[tokio::test]
    async fn existing_version_dir_is_cached_without_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let inst = installer(dir.path(), CountingRunner::new(0));
        let v = VersionInfo::new("20.1.1");
        std::fs::create_dir_all(inst.version_dir(&v)).unwrap();

        let outcome = inst.install(&v, &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, InstallOutcome::Cached);
        assert_eq!(inst.runner().spawns.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn fresh_install_runs_java_jar() {
        let dir = tempfile::tempdir().unwrap();
        let inst = installer(dir.path(), CountingRunner::new(0));
        let v = VersionInfo::new("20.1.1");
        let jar = place_jar(&inst, &v);

        let outcome = inst.install(&v, &CancellationToken::new()).await.unwrap();
        assert_eq!(outcome, InstallOutcome::FreshlyInstalled);
        assert_eq!(inst.runner().spawns.load(Ordering::SeqCst), 1);

        let spec = inst.runner().last.lock().unwrap().clone().unwrap();
        assert_eq!(spec.program, PathBuf::from("java"));
        assert_eq!(
            spec.args,
            vec![
                "-jar".to_string(),
                jar.to_string_lossy().to_string(),
                "--install-client".to_string()
            ]
        );
        assert_eq!(spec.current_dir, dir.path().join("work"));
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_process_error() {
        let dir = tempfile::tempdir().unwrap();
        let inst = installer(dir.path(), CountingRunner::new(1));
        let v = VersionInfo::new("20.1.1");
        place_jar(&inst, &v);

        let err = inst.install(&v, &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, UpdaterError::InstallerExited { code: Some(1) }));
    }

    #[tokio::test]
    async fn missing_jar_is_rejected_before_spawning() {
        let dir = tempfile::tempdir().unwrap();
        let inst = installer(dir.path(), CountingRunner::new(0));

        let err = inst
            .install(&VersionInfo::new("20.1.1"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, UpdaterError::JavaExecution(_)));
        assert_eq!(inst.runner().spawns.load(Ordering::SeqCst), 0);
    }
}
