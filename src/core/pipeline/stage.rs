use std::fmt;

use serde::Serialize;

use crate::core::loaders::InstallOutcome;
use crate::core::version::VersionInfo;

/// Work stages in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    FetchingVersion,
    Downloading,
    Installing,
    BackingUp,
    Patching,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::FetchingVersion,
        Stage::Downloading,
        Stage::Installing,
        Stage::BackingUp,
        Stage::Patching,
    ];

    /// The stage that may start once this one succeeded; `None` after `Patching`.
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::FetchingVersion => Some(Stage::Downloading),
            Stage::Downloading => Some(Stage::Installing),
            Stage::Installing => Some(Stage::BackingUp),
            Stage::BackingUp => Some(Stage::Patching),
            Stage::Patching => None,
        }
    }

    /// Stages strictly after this one.
    pub fn later(self) -> impl Iterator<Item = Stage> {
        Stage::ALL.into_iter().filter(move |s| *s > self)
    }

    pub fn label(self) -> &'static str {
        match self {
            Stage::FetchingVersion => "Fetch latest version",
            Stage::Downloading => "Download installer",
            Stage::Installing => "Set up Minecraft Launcher",
            Stage::BackingUp => "Back up profiles",
            Stage::Patching => "Update profile",
        }
    }

    /// Failure category a failed run of this stage is reported as.
    pub fn failure_kind(self) -> FailureKind {
        match self {
            Stage::FetchingVersion => FailureKind::VersionFetchFailed,
            Stage::Downloading => FailureKind::TransferFailed,
            Stage::Installing => FailureKind::InstallProcessFailed,
            Stage::BackingUp => FailureKind::BackupFailed,
            Stage::Patching => FailureKind::PatchFailed,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Where the state machine currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Running(Stage),
    Done,
    Failed(Stage),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    VersionFetchFailed,
    TransferFailed,
    InstallProcessFailed,
    /// The database was not touched.
    BackupFailed,
    PatchFailed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineFailure {
    pub stage: Stage,
    pub kind: FailureKind,
    pub message: String,
}

impl fmt::Display for PipelineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} failed: {}", self.stage, self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PipelineOutcome {
    Updated,
    /// The profile already points at the target version; no stage ran.
    UpToDate,
    UnknownProfile,
    /// The profile lookup before the first stage failed.
    ProfilesUnready(String),
    Failed(PipelineFailure),
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Updated | PipelineOutcome::UpToDate)
    }
}

/// Summary of one pipeline run.
#[derive(Debug, Clone)]
pub struct UpdateReport {
    pub profile_id: String,
    pub version: Option<VersionInfo>,
    pub outcome: PipelineOutcome,
    pub install: Option<InstallOutcome>,
    /// Stages that were entered, in order.
    pub visited: Vec<Stage>,
}

impl UpdateReport {
    pub fn state(&self) -> PipelineState {
        match &self.outcome {
            PipelineOutcome::Failed(failure) => PipelineState::Failed(failure.stage),
            _ => PipelineState::Done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_chain_in_order() {
        let mut chain = vec![Stage::FetchingVersion];
        while let Some(next) = chain.last().and_then(|s| s.next()) {
            chain.push(next);
        }
        assert_eq!(chain, Stage::ALL.to_vec());
    }

    #[test]
    fn later_stages_exclude_self() {
        let later: Vec<_> = Stage::Installing.later().collect();
        assert_eq!(later, vec![Stage::BackingUp, Stage::Patching]);
        assert_eq!(Stage::Patching.later().count(), 0);
    }
}
