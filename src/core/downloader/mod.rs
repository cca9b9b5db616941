pub mod store;

pub use store::{ArtifactStore, DownloadProgress, VERSIONS_DIR};
