use tracing::{info, warn};

use super::stage::Stage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Started,
    Advanced,
    Completed,
    Failed,
    /// Never ran, or was abandoned because an earlier stage failed.
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub stage: Stage,
    pub status: StageStatus,
    /// 0..=100
    pub percent: u8,
    /// Short qualifier such as `cached`, or the failure message.
    pub note: Option<String>,
}

/// Receives pipeline progress. Implementations must not block.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: ProgressEvent);
}

/// Logs every event through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn emit(&self, event: ProgressEvent) {
        match event.status {
            StageStatus::Failed => warn!(
                "{}: failed {}",
                event.stage,
                event.note.as_deref().unwrap_or_default()
            ),
            _ => info!(
                "{}: {:?} {}% {}",
                event.stage,
                event.status,
                event.percent,
                event.note.as_deref().unwrap_or_default()
            ),
        }
    }
}
