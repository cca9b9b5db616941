// ─── Update Pipeline ───
// Drives fetch → download → install → backup → patch. One stage runs at a
// time on a background task; the driving loop polls it on a fixed tick and
// forwards progress until the task is observed finished.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::ports::{ArtifactSource, InstallStep, ProfileStore, VersionSource};
use super::progress::{ProgressEvent, ProgressSink, StageStatus, TracingSink};
use super::stage::{
    FailureKind, PipelineFailure, PipelineOutcome, PipelineState, Stage, UpdateReport,
};
use crate::core::downloader::DownloadProgress;
use crate::core::error::{UpdaterError, UpdaterResult};
use crate::core::loaders::InstallOutcome;
use crate::core::version::VersionInfo;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// What a finished stage task hands back to the loop.
#[derive(Debug)]
enum StageOutput {
    Resolved(VersionInfo),
    Downloaded,
    Installed(InstallOutcome),
    BackedUp(bool),
    Patched(bool),
}

pub struct UpdatePipeline {
    resolver: Arc<dyn VersionSource>,
    artifacts: Arc<dyn ArtifactSource>,
    installer: Arc<dyn InstallStep>,
    profiles: Arc<dyn ProfileStore>,
    sink: Arc<dyn ProgressSink>,
    loader_prefix: String,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl UpdatePipeline {
    pub fn new(
        resolver: Arc<dyn VersionSource>,
        artifacts: Arc<dyn ArtifactSource>,
        installer: Arc<dyn InstallStep>,
        profiles: Arc<dyn ProfileStore>,
        loader_prefix: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            artifacts,
            installer,
            profiles,
            sink: Arc::new(TracingSink),
            loader_prefix: loader_prefix.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            cancel: CancellationToken::new(),
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Cancelling this token aborts the in-flight download or installer.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolve the latest version, then update `profile_id` to it.
    pub async fn run(&self, profile_id: &str) -> UpdateReport {
        let stage = Stage::FetchingVersion;
        let mut state = PipelineState::Running(stage);
        debug!("Pipeline state {:?}", state);
        self.emit(stage, StageStatus::Started, 0, None);

        let resolved = match self.drive(stage, self.spawn_resolve(), None).await {
            Ok(StageOutput::Resolved(version)) => Ok(version),
            Ok(other) => Err(unexpected_output(stage, &other)),
            Err(err) => Err(err),
        };

        match resolved {
            Ok(version) => {
                self.emit(stage, StageStatus::Completed, 100, Some(version.to_string()));
                let mut report = self.run_resolved(profile_id, version).await;
                report.visited.insert(0, stage);
                report
            }
            Err(err) => UpdateReport {
                profile_id: profile_id.to_string(),
                version: None,
                outcome: self.fail(stage, err, &mut state),
                install: None,
                visited: vec![stage],
            },
        }
    }

    /// Update `profile_id` to an already resolved `version`.
    ///
    /// Nothing runs when the profile already points at the version or does not exist.
    pub async fn run_resolved(&self, profile_id: &str, version: VersionInfo) -> UpdateReport {
        let mut report = UpdateReport {
            profile_id: profile_id.to_string(),
            version: Some(version.clone()),
            outcome: PipelineOutcome::Updated,
            install: None,
            visited: Vec::new(),
        };

        let target_id = version.version_id(&self.loader_prefix);
        match self.profiles.find_profile(profile_id).await {
            Ok(Some(profile)) if profile.is_at(&target_id) => {
                info!("Profile {} already at {}; nothing to do", profile_id, target_id);
                report.outcome = PipelineOutcome::UpToDate;
                return report;
            }
            Ok(Some(_)) => {}
            Ok(None) => {
                report.outcome = PipelineOutcome::UnknownProfile;
                return report;
            }
            Err(e) => {
                report.outcome = PipelineOutcome::ProfilesUnready(e.to_string());
                return report;
            }
        }

        let progress = Arc::new(DownloadProgress::new());
        let mut stage = Stage::Downloading;
        let mut state = PipelineState::Running(stage);

        loop {
            if self.cancel.is_cancelled() {
                report.visited.push(stage);
                report.outcome = self.fail(stage, UpdaterError::Cancelled, &mut state);
                return report;
            }

            self.transition(&mut state, PipelineState::Running(stage));
            report.visited.push(stage);
            self.emit(stage, StageStatus::Started, 0, None);

            let task = self.launch(stage, profile_id, &version, &progress);
            let watch = (stage == Stage::Downloading).then_some(progress.as_ref());
            let note = match self.drive(stage, task, watch).await {
                Ok(StageOutput::Downloaded) => None,
                Ok(StageOutput::Installed(outcome)) => {
                    report.install = Some(outcome);
                    (outcome == InstallOutcome::Cached).then(|| "cached".to_string())
                }
                Ok(StageOutput::BackedUp(true)) => None,
                Ok(StageOutput::BackedUp(false)) => {
                    let err = UpdaterError::Other(
                        "could not back up launcher profiles; no changes were made".into(),
                    );
                    report.outcome = self.fail(stage, err, &mut state);
                    return report;
                }
                Ok(StageOutput::Patched(true)) => None,
                Ok(StageOutput::Patched(false)) => {
                    let err = UpdaterError::Other(format!(
                        "profile {profile_id} disappeared before it could be updated"
                    ));
                    report.outcome = self.fail(stage, err, &mut state);
                    return report;
                }
                Ok(other) => {
                    let err = unexpected_output(stage, &other);
                    report.outcome = self.fail(stage, err, &mut state);
                    return report;
                }
                Err(err) => {
                    report.outcome = self.fail(stage, err, &mut state);
                    return report;
                }
            };
            self.emit(stage, StageStatus::Completed, 100, note);

            match stage.next() {
                Some(next) => stage = next,
                None => break,
            }
        }

        self.transition(&mut state, PipelineState::Done);
        info!("Profile {} updated to {}", profile_id, target_id);
        report
    }

    fn launch(
        &self,
        stage: Stage,
        profile_id: &str,
        version: &VersionInfo,
        progress: &Arc<DownloadProgress>,
    ) -> JoinHandle<UpdaterResult<StageOutput>> {
        let version = version.clone();
        let cancel = self.cancel.clone();
        match stage {
            Stage::FetchingVersion => self.spawn_resolve(),
            Stage::Downloading => {
                let artifacts = self.artifacts.clone();
                let progress = progress.clone();
                tokio::spawn(async move {
                    artifacts
                        .download(&version, &progress, &cancel)
                        .await
                        .map(|()| StageOutput::Downloaded)
                })
            }
            Stage::Installing => {
                let installer = self.installer.clone();
                tokio::spawn(async move {
                    installer
                        .install(&version, &cancel)
                        .await
                        .map(StageOutput::Installed)
                })
            }
            Stage::BackingUp => {
                let profiles = self.profiles.clone();
                tokio::spawn(async move { Ok(StageOutput::BackedUp(profiles.backup().await)) })
            }
            // Not cancellable: the rewrite is atomic and short.
            Stage::Patching => {
                let profiles = self.profiles.clone();
                let id = profile_id.to_string();
                tokio::spawn(async move {
                    profiles
                        .update_profile_version(&id, &version)
                        .await
                        .map(StageOutput::Patched)
                })
            }
        }
    }

    fn spawn_resolve(&self) -> JoinHandle<UpdaterResult<StageOutput>> {
        let resolver = self.resolver.clone();
        tokio::spawn(async move { resolver.resolve().await.map(StageOutput::Resolved) })
    }

    /// Poll `task` every tick until it is finished, reporting download progress meanwhile.
    async fn drive(
        &self,
        stage: Stage,
        task: JoinHandle<UpdaterResult<StageOutput>>,
        download: Option<&DownloadProgress>,
    ) -> UpdaterResult<StageOutput> {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut last_percent = None;

        loop {
            ticker.tick().await;
            if task.is_finished() {
                break;
            }
            if let Some(percent) = download.and_then(DownloadProgress::percent) {
                if last_percent != Some(percent) {
                    last_percent = Some(percent);
                    self.emit(stage, StageStatus::Advanced, percent, None);
                }
            }
        }

        task.await
            .map_err(|e| UpdaterError::Other(format!("{stage} task aborted: {e}")))?
    }

    fn transition(&self, state: &mut PipelineState, next: PipelineState) {
        debug!("Pipeline state {:?} -> {:?}", state, next);
        *state = next;
    }

    /// Mark `stage` failed and every later stage stopped.
    fn fail(&self, stage: Stage, err: UpdaterError, state: &mut PipelineState) -> PipelineOutcome {
        let kind = match err {
            UpdaterError::Cancelled => FailureKind::Cancelled,
            _ => stage.failure_kind(),
        };
        let message = err.to_string();
        error!("{} failed ({:?}): {}", stage, kind, message);

        self.transition(state, PipelineState::Failed(stage));
        self.emit(stage, StageStatus::Failed, 0, Some(message.clone()));
        for later in stage.later() {
            self.emit(later, StageStatus::Stopped, 0, None);
        }

        PipelineOutcome::Failed(PipelineFailure {
            stage,
            kind,
            message,
        })
    }

    fn emit(&self, stage: Stage, status: StageStatus, percent: u8, note: Option<String>) {
        self.sink.emit(ProgressEvent {
            stage,
            status,
            percent,
            note,
        });
    }
}

fn unexpected_output(stage: Stage, output: &StageOutput) -> UpdaterError {
    UpdaterError::Other(format!("{stage} produced unexpected result {output:?}"))
}
