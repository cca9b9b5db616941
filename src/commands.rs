use std::collections::HashMap;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use clap::Parser;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tracing::{debug, error, warn};
use tracing_subscriber::fmt::MakeWriter;

use crate::core::error::UpdaterError;
use crate::core::pipeline::{
    FailureKind, PipelineFailure, PipelineOutcome, ProgressEvent, ProgressSink, Stage,
    StageStatus, UpdatePipeline,
};
use crate::core::profiles::{
    Profile, ProfileRepository, ProfileSet, Readiness, EXPECTED_SCHEMA_VERSION,
};
use crate::core::state::{AppState, Settings, SETTINGS_FILE};
use crate::core::version::VersionInfo;

const NAME_WIDTH: usize = 22;

#[derive(Debug, Parser)]
#[command(
    name = "neoforge-updater",
    version,
    about = "Moves a Minecraft Launcher profile to the latest NeoForge release"
)]
pub struct Cli {
    /// Settings file; a default one is written if it does not exist.
    #[arg(long, value_name = "PATH", default_value = SETTINGS_FILE)]
    pub settings: PathBuf,
    /// Profile id to update instead of asking.
    #[arg(long, value_name = "ID")]
    pub profile: Option<String>,
    #[arg(short, long)]
    pub verbose: bool,
}

/// Process exit status. Failures are negative, one code per cause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    Success,
    SettingsMissing,
    ProfilesUnready,
    VersionFetchFailed,
    TransferFailed,
    InstallFailed,
    BackupFailed,
    PatchFailed,
    Cancelled,
    NoProfile,
    /// The async runtime or the HTTP client could not be created.
    StartupFailed,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::SettingsMissing => -1,
            ExitStatus::ProfilesUnready => -2,
            ExitStatus::VersionFetchFailed => -3,
            ExitStatus::TransferFailed => -4,
            ExitStatus::InstallFailed => -5,
            ExitStatus::BackupFailed => -6,
            ExitStatus::PatchFailed => -7,
            ExitStatus::Cancelled => -8,
            ExitStatus::NoProfile => -9,
            ExitStatus::StartupFailed => -10,
        }
    }
}

impl From<FailureKind> for ExitStatus {
    fn from(kind: FailureKind) -> Self {
        match kind {
            FailureKind::VersionFetchFailed => ExitStatus::VersionFetchFailed,
            FailureKind::TransferFailed => ExitStatus::TransferFailed,
            FailureKind::InstallProcessFailed => ExitStatus::InstallFailed,
            FailureKind::BackupFailed => ExitStatus::BackupFailed,
            FailureKind::PatchFailed => ExitStatus::PatchFailed,
            FailureKind::Cancelled => ExitStatus::Cancelled,
        }
    }
}

/// Whole interactive run: settings, readiness, version, profile choice, pipeline.
pub async fn update(cli: &Cli, progress: MultiProgress) -> ExitStatus {
    let settings = match Settings::load_or_bootstrap(&cli.settings) {
        Ok(settings) => settings,
        Err(UpdaterError::ConfigMissing { path }) => {
            eprintln!(
                "No settings found. A default settings file was written to {}.\n\
                 Check the Minecraft install directory in it, then run the updater again.",
                path.display()
            );
            return ExitStatus::SettingsMissing;
        }
        Err(e) => {
            error!("Failed to load settings: {}", e);
            eprintln!("Could not read {}: {}", cli.settings.display(), e);
            return ExitStatus::SettingsMissing;
        }
    };

    let work_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let state = match AppState::new(settings, work_dir) {
        Ok(state) => state,
        Err(e) => {
            eprintln!("Could not initialise the updater: {}", e);
            return ExitStatus::StartupFailed;
        }
    };

    let repository = Arc::new(state.profile_repository());
    let readiness = repository.readiness().await;
    if !readiness.is_ready() {
        eprintln!("{}", readiness_message(&readiness, &repository.path().display().to_string()));
        return ExitStatus::ProfilesUnready;
    }

    let version = match fetch_version(&state, &progress).await {
        Ok(version) => version,
        Err(e) => {
            eprintln!("Could not determine the latest NeoForge version: {}", e);
            return ExitStatus::VersionFetchFailed;
        }
    };
    println!("Latest NeoForge version: {}", version);

    let profiles = match repository.list_profiles().await {
        Ok(profiles) => profiles,
        Err(e) => {
            eprintln!("Launcher profiles could not be read: {}", e);
            return ExitStatus::ProfilesUnready;
        }
    };

    let profile_id = match &cli.profile {
        Some(id) => id.clone(),
        None => match choose_profile(profiles.clone()).await {
            Some(id) => id,
            None => {
                eprintln!("No profile selected.");
                return ExitStatus::NoProfile;
            }
        },
    };
    let Some(profile) = profiles.get(&profile_id) else {
        eprintln!("There is no launcher profile with id {}.", profile_id);
        return ExitStatus::NoProfile;
    };
    println!("Targeting profile {}", profile_label(profile));

    // Only fails for an unusable `Artifact` coordinate in the settings.
    let pipeline = match build_pipeline(&state, repository.clone(), progress) {
        Ok(pipeline) => pipeline,
        Err(e) => {
            eprintln!("Could not prepare the update: {}", e);
            return ExitStatus::SettingsMissing;
        }
    };

    let cancel = pipeline.cancel_token();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; cancelling update");
            cancel.cancel();
        }
    });

    let report = pipeline.run_resolved(&profile_id, version.clone()).await;
    ctrl_c.abort();

    let version_id = version.version_id(state.loader_prefix());
    match &report.outcome {
        PipelineOutcome::UpToDate => {
            println!("{} already uses {}. Nothing to do.", profile.display_name(), version_id);
            ExitStatus::Success
        }
        PipelineOutcome::Updated => {
            println!(
                "{} now uses {}. Start it from the Minecraft Launcher.",
                profile.display_name(),
                version_id
            );
            ExitStatus::Success
        }
        PipelineOutcome::UnknownProfile => {
            eprintln!("Profile {} disappeared from the launcher.", profile_id);
            ExitStatus::NoProfile
        }
        PipelineOutcome::ProfilesUnready(reason) => {
            eprintln!("Launcher profiles could not be read: {}", reason);
            ExitStatus::ProfilesUnready
        }
        PipelineOutcome::Failed(failure) => {
            eprintln!("{}", failure_message(failure));
            ExitStatus::from(failure.kind)
        }
    }
}

async fn fetch_version(
    state: &AppState,
    progress: &MultiProgress,
) -> Result<VersionInfo, UpdaterError> {
    let spinner = progress.add(ProgressBar::new_spinner());
    spinner.set_style(spinner_style());
    spinner.set_message(Stage::FetchingVersion.label());
    spinner.enable_steady_tick(Duration::from_millis(100));

    let result = state.version_resolver().resolve().await;
    match &result {
        Ok(version) => spinner.finish_with_message(format!(
            "{}: {}",
            Stage::FetchingVersion.label(),
            version
        )),
        Err(_) => spinner.abandon_with_message(format!("{}: failed", Stage::FetchingVersion.label())),
    }
    result
}

fn build_pipeline(
    state: &AppState,
    repository: Arc<ProfileRepository>,
    progress: MultiProgress,
) -> Result<UpdatePipeline, UpdaterError> {
    Ok(UpdatePipeline::new(
        Arc::new(state.version_resolver()),
        Arc::new(state.artifact_store()?),
        Arc::new(state.installer()?),
        repository,
        state.loader_prefix(),
    )
    .with_sink(Arc::new(BarSink::new(progress))))
}

/// Reads the choice from stdin on a blocking thread.
async fn choose_profile(profiles: ProfileSet) -> Option<String> {
    let chosen = tokio::task::spawn_blocking(move || {
        let stdin = io::stdin();
        let stdout = io::stdout();
        prompt_profile(&profiles, &mut stdin.lock(), &mut stdout.lock())
    })
    .await;

    match chosen {
        Ok(Ok(id)) => id,
        Ok(Err(e)) => {
            warn!("Failed to read profile selection: {}", e);
            None
        }
        Err(e) => {
            warn!("Profile prompt task failed: {}", e);
            None
        }
    }
}

/// Numbered list of profiles; returns the chosen id, or `None` for an invalid answer.
fn prompt_profile(
    profiles: &ProfileSet,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> io::Result<Option<String>> {
    let listed: Vec<&Profile> = profiles.iter().collect();
    writeln!(output, "Launcher profiles:")?;
    for (index, profile) in listed.iter().enumerate() {
        writeln!(output, "  {}) {}", index + 1, profile_label(profile))?;
    }
    write!(output, "Profile to update [1-{}]: ", listed.len())?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let choice = line
        .trim()
        .parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| listed.get(i));
    Ok(choice.map(|p| p.id.clone()))
}

/// `name (id - lastVersionId)` with the name cut to a fixed width.
fn profile_label(profile: &Profile) -> String {
    format!(
        "{} ({} - {})",
        truncate_name(profile.display_name()),
        profile.id,
        profile.last_version_id
    )
}

/// Names of `NAME_WIDTH` characters or more get the ellipsis.
fn truncate_name(name: &str) -> String {
    if name.chars().count() >= NAME_WIDTH {
        let cut: String = name.chars().take(NAME_WIDTH).collect();
        format!("{cut}...")
    } else {
        name.to_string()
    }
}

fn readiness_message(readiness: &Readiness, path: &str) -> String {
    match readiness {
        Readiness::Ready { profiles } => format!("{profiles} launcher profiles found"),
        Readiness::Missing => format!(
            "No launcher profiles at {path}. Start the Minecraft Launcher once, then try again."
        ),
        Readiness::Malformed(reason) => {
            format!("Launcher profiles at {path} could not be read: {reason}")
        }
        Readiness::SchemaMismatch { found } => format!(
            "Launcher profiles at {path} use format version {found}; only version {EXPECTED_SCHEMA_VERSION} is supported."
        ),
        Readiness::Empty => format!(
            "There are no profiles in {path}. Create one in the Minecraft Launcher first."
        ),
    }
}

fn failure_message(failure: &PipelineFailure) -> String {
    let headline = match failure.kind {
        FailureKind::VersionFetchFailed => "Could not determine the latest NeoForge version.",
        FailureKind::TransferFailed => "Downloading the NeoForge installer failed.",
        FailureKind::InstallProcessFailed => "The NeoForge installer did not finish successfully.",
        FailureKind::BackupFailed => {
            "Backing up launcher profiles failed. No changes were made to your profiles."
        }
        FailureKind::PatchFailed => "Updating the launcher profile failed.",
        FailureKind::Cancelled => "Update cancelled.",
    };
    format!("{headline}\n  {failure}")
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

fn bar_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {msg:26} [{bar:30.cyan/blue}] {pos:>3}%")
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
}

/// One progress bar per stage, created when the stage first reports.
struct BarSink {
    multi: MultiProgress,
    bars: Mutex<HashMap<Stage, ProgressBar>>,
}

impl BarSink {
    fn new(multi: MultiProgress) -> Self {
        Self {
            multi,
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn bars(&self) -> MutexGuard<'_, HashMap<Stage, ProgressBar>> {
        self.bars.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn bar(&self, stage: Stage) -> ProgressBar {
        self.bars()
            .entry(stage)
            .or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new(100));
                bar.set_style(bar_style());
                bar.set_message(stage.label());
                bar
            })
            .clone()
    }
}

impl ProgressSink for BarSink {
    fn emit(&self, event: ProgressEvent) {
        let bar = self.bar(event.stage);
        let label = event.stage.label();
        match event.status {
            StageStatus::Started => {
                bar.enable_steady_tick(Duration::from_millis(100));
                debug!("{} started", label);
            }
            StageStatus::Advanced => bar.set_position(u64::from(event.percent)),
            StageStatus::Completed => {
                bar.set_position(100);
                match event.note {
                    Some(note) => bar.finish_with_message(format!("{label} ({note})")),
                    None => bar.finish_with_message(label),
                }
            }
            StageStatus::Failed => bar.abandon_with_message(format!("{label}: failed")),
            StageStatus::Stopped => bar.abandon_with_message(format!("{label}: stopped")),
        }
    }
}

/// Log sink that hides the progress bars while a line is written.
#[derive(Clone)]
pub struct LogWriter {
    progress: MultiProgress,
}

impl LogWriter {
    pub fn new(progress: MultiProgress) -> Self {
        Self { progress }
    }
}

impl<'a> MakeWriter<'a> for LogWriter {
    type Writer = SuspendedStderr;

    fn make_writer(&'a self) -> Self::Writer {
        SuspendedStderr {
            progress: self.progress.clone(),
        }
    }
}

pub struct SuspendedStderr {
    progress: MultiProgress,
}

impl Write for SuspendedStderr {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.progress.suspend(|| io::stderr().write(buf))
    }

    fn flush(&mut self) -> io::Result<()> {
        self.progress.suspend(|| io::stderr().flush())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::profiles::ProfileDatabase;

    fn profiles() -> ProfileSet {
        ProfileDatabase::parse(
            r#"{
              "profiles": {
                "abc123": { "name": "  Modded  ", "lastVersionId": "neoforge-20.1.0" },
                "def456": { "name": "", "lastVersionId": "latest-release" },
                "ghi789": { "name": "An extremely long profile name", "lastVersionId": "1.20.1" }
              },
              "version": 3
            }"#,
        )
        .unwrap()
        .profiles()
        .unwrap()
    }

    #[test]
    fn labels_trim_default_and_truncate_names() {
        let set = profiles();
        assert_eq!(
            profile_label(set.get("abc123").unwrap()),
            "Modded (abc123 - neoforge-20.1.0)"
        );
        assert_eq!(
            profile_label(set.get("def456").unwrap()),
            "<no name> (def456 - latest-release)"
        );
        assert_eq!(
            profile_label(set.get("ghi789").unwrap()),
            "An extremely long prof... (ghi789 - 1.20.1)"
        );
    }

    #[test]
    fn names_at_the_width_limit_are_truncated() {
        let exactly = "a".repeat(NAME_WIDTH);
        assert_eq!(truncate_name(&exactly), format!("{exactly}..."));
        let shorter = "a".repeat(NAME_WIDTH - 1);
        assert_eq!(truncate_name(&shorter), shorter);
    }

    #[test]
    fn log_writer_passes_whole_lines_through() {
        let progress = MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        let bar = progress.add(ProgressBar::new(100));
        let writer = LogWriter::new(progress);

        let line = b"WARN neoforge_updater_lib: something\n";
        let mut out = writer.make_writer();
        assert_eq!(out.write(line).unwrap(), line.len());
        out.flush().unwrap();
        bar.finish();
    }

    #[test]
    fn prompt_returns_selected_id() {
        let set = profiles();
        let mut out = Vec::new();
        let chosen = prompt_profile(&set, &mut "2\n".as_bytes(), &mut out).unwrap();
        assert_eq!(chosen.as_deref(), Some("def456"));

        let shown = String::from_utf8(out).unwrap();
        assert!(shown.contains("  1) Modded (abc123 - neoforge-20.1.0)"));
        assert!(shown.contains("[1-3]"));
    }

    #[test]
    fn prompt_rejects_out_of_range_and_garbage() {
        let set = profiles();
        for answer in ["0\n", "4\n", "abc\n", "\n"] {
            let chosen = prompt_profile(&set, &mut answer.as_bytes(), &mut Vec::new()).unwrap();
            assert_eq!(chosen, None, "answer {answer:?}");
        }
    }

    #[test]
    fn exit_codes_are_distinct() {
        let all = [
            ExitStatus::Success,
            ExitStatus::SettingsMissing,
            ExitStatus::ProfilesUnready,
            ExitStatus::VersionFetchFailed,
            ExitStatus::TransferFailed,
            ExitStatus::InstallFailed,
            ExitStatus::BackupFailed,
            ExitStatus::PatchFailed,
            ExitStatus::Cancelled,
            ExitStatus::NoProfile,
            ExitStatus::StartupFailed,
        ];
        let mut codes: Vec<i32> = all.iter().map(|s| s.code()).collect();
        assert_eq!(codes[0], 0);
        assert!(codes[1..].iter().all(|c| *c < 0));
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
        assert_eq!(ExitStatus::from(FailureKind::BackupFailed).code(), -6);
    }

    #[test]
    fn backup_failure_message_promises_no_changes() {
        let msg = failure_message(&PipelineFailure {
            stage: Stage::BackingUp,
            kind: FailureKind::BackupFailed,
            message: "disk full".into(),
        });
        assert!(msg.contains("No changes were made"));
        assert!(msg.contains("disk full"));
    }
}
