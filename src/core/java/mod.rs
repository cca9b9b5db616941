use std::path::{Path, PathBuf};

use tracing::{debug, warn};

pub fn java_exe() -> &'static str {
    if cfg!(windows) {
        "java.exe"
    } else {
        "java"
    }
}

/// Pick the Java executable used to run installers.
///
/// An explicit path from the settings wins when it exists; otherwise the
/// bare executable name is returned and resolved through `PATH` at spawn time.
pub fn resolve_java_binary(configured: Option<&Path>) -> PathBuf {
    match configured {
        Some(path) if path.is_file() => {
            debug!("Using configured Java at {:?}", path);
            path.to_path_buf()
        }
        Some(path) => {
            warn!(
                "Configured Java {:?} does not exist, falling back to {} on PATH",
                path,
                java_exe()
            );
            PathBuf::from(java_exe())
        }
        None => PathBuf::from(java_exe()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_configured_java_falls_back_to_path() {
        let resolved = resolve_java_binary(Some(Path::new("/definitely/not/here/java")));
        assert_eq!(resolved, PathBuf::from(java_exe()));
        assert_eq!(resolve_java_binary(None), PathBuf::from(java_exe()));
    }

    #[test]
    fn existing_configured_java_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let fake = dir.path().join(java_exe());
        std::fs::write(&fake, b"").unwrap();
        assert_eq!(resolve_java_binary(Some(&fake)), fake);
    }
}
