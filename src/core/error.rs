use std::path::PathBuf;
use thiserror::Error;

/// Central error type for the updater backend.
/// Every module returns `Result<T, UpdaterError>`.
#[derive(Debug, Error)]
pub enum UpdaterError {
    // ── IO ──────────────────────────────────────────────
    #[error("IO error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Network ─────────────────────────────────────────
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Download failed for {url}: HTTP {status}")]
    DownloadFailed { url: String, status: u16 },

    #[error("Malformed response from {url}: {reason}")]
    MalformedResponse { url: String, reason: String },

    // ── JSON ────────────────────────────────────────────
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // ── Maven ───────────────────────────────────────────
    #[error("Invalid Maven coordinate: {0}")]
    InvalidMavenCoordinate(String),

    // ── Settings ────────────────────────────────────────
    #[error("Settings file not found at {path:?}; a default one has been created")]
    ConfigMissing { path: PathBuf },

    // ── Profiles ────────────────────────────────────────
    #[error("Launcher profiles are not usable: {0}")]
    ProfilesUnready(String),

    #[error("Launcher profiles schema mismatch: expected version {expected}, found {found}")]
    SchemaMismatch { expected: i64, found: i64 },

    #[error("Could not lock {path:?}: {reason}")]
    ProfileLock { path: PathBuf, reason: String },

    // ── Installer ───────────────────────────────────────
    #[error("Java execution failed: {0}")]
    JavaExecution(String),

    #[error("Installer exited with status {code:?}")]
    InstallerExited { code: Option<i32> },

    // ── Control ─────────────────────────────────────────
    #[error("Operation cancelled")]
    Cancelled,

    // ── Generic ─────────────────────────────────────────
    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type UpdaterResult<T> = Result<T, UpdaterError>;

impl UpdaterError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        UpdaterError::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<std::io::Error> for UpdaterError {
    fn from(source: std::io::Error) -> Self {
        UpdaterError::Io {
            path: PathBuf::new(),
            source,
        }
    }
}
