pub mod ports;
pub mod progress;
pub mod runner;
pub mod stage;


pub use ports::{ArtifactSource, InstallStep, ProfileStore, VersionSource};
pub use progress::{ProgressEvent, ProgressSink, StageStatus, TracingSink};
pub use runner::{UpdatePipeline, DEFAULT_POLL_INTERVAL};
pub use stage::{
    FailureKind, PipelineFailure, PipelineOutcome, PipelineState, Stage, UpdateReport,
};
