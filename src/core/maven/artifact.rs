use serde::{Deserialize, Serialize};
use std::fmt;

use crate::core::error::{UpdaterError, UpdaterResult};

/// Classifier NeoForge publishes its installer jar under.
pub const INSTALLER_CLASSIFIER: &str = "installer";

/// A Maven module without a version, as written in the settings file
/// (`groupId:artifactId`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MavenModule {
    pub group_id: String,
    pub artifact_id: String,
}

impl MavenModule {
    /// Parse a `groupId:artifactId` module string.
    pub fn parse(coord: &str) -> UpdaterResult<Self> {
        let parts: Vec<&str> = coord.trim().split(':').collect();
        match parts.as_slice() {
            [group, artifact] if !group.is_empty() && !artifact.is_empty() => Ok(Self {
                group_id: group.to_string(),
                artifact_id: artifact.to_string(),
            }),
            _ => Err(UpdaterError::InvalidMavenCoordinate(coord.to_string())),
        }
    }

    /// Pin this module to a version and classifier.
    pub fn artifact(&self, version: &str, classifier: Option<&str>) -> MavenArtifact {
        MavenArtifact {
            group_id: self.group_id.clone(),
            artifact_id: self.artifact_id.clone(),
            version: version.to_string(),
            classifier: classifier.map(str::to_string),
            packaging: "jar".to_string(),
        }
    }

    /// The installer artifact for `version`.
    pub fn installer(&self, version: &str) -> MavenArtifact {
        self.artifact(version, Some(INSTALLER_CLASSIFIER))
    }
}

impl fmt::Display for MavenModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.group_id, self.artifact_id)
    }
}

/// Represents a fully resolved Maven artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct MavenArtifact {
    pub group_id: String,
    pub artifact_id: String,
    pub version: String,
    pub classifier: Option<String>,
    /// File extension / packaging type. Defaults to `"jar"`.
    pub packaging: String,
}

impl MavenArtifact {
    /// Construct the group path portion (`net/neoforged`).
    pub fn group_path(&self) -> String {
        self.group_id.replace('.', "/")
    }

    /// Build the artifact filename.
    ///
    /// `artifactId-version[-classifier].packaging`
    pub fn filename(&self) -> String {
        match &self.classifier {
            Some(c) => format!(
                "{}-{}-{}.{}",
                self.artifact_id, self.version, c, self.packaging
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.packaging),
        }
    }

    /// Construct the full URL for this artifact under the given repository base.
    ///
    /// Template:
    /// `<repo>/<group_path>/<artifact_id>/<version>/<filename>`
    pub fn url(&self, repo_base: &str) -> String {
        let base = repo_base.trim_end_matches('/');
        format!(
            "{}/{}/{}/{}/{}",
            base,
            self.group_path(),
            self.artifact_id,
            self.version,
            self.filename()
        )
    }
}

impl fmt::Display for MavenArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.classifier {
            Some(c) => write!(
                f,
                "{}:{}:{}:{}@{}",
                self.group_id, self.artifact_id, self.version, c, self.packaging
            ),
            None => write!(
                f,
                "{}:{}:{}@{}",
                self.group_id, self.artifact_id, self.version, self.packaging
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_module() {
        let m = MavenModule::parse("net.neoforged:neoforge").unwrap();
        assert_eq!(m.group_id, "net.neoforged");
        assert_eq!(m.artifact_id, "neoforge");
        assert_eq!(m.to_string(), "net.neoforged:neoforge");
    }

    #[test]
    fn parse_module_rejects_versioned_or_empty() {
        assert!(MavenModule::parse("net.neoforged:neoforge:20.1.1").is_err());
        assert!(MavenModule::parse("neoforge").is_err());
        assert!(MavenModule::parse(":neoforge").is_err());
    }

    #[test]
    fn installer_filename() {
        let a = MavenModule::parse("net.neoforged:neoforge")
            .unwrap()
            .installer("20.1.1");
        assert_eq!(a.filename(), "neoforge-20.1.1-installer.jar");
        assert_eq!(a.to_string(), "net.neoforged:neoforge:20.1.1:installer@jar");
    }

    #[test]
    fn installer_url_construction() {
        let a = MavenModule::parse("net.neoforged:neoforge")
            .unwrap()
            .installer("21.1.77");
        assert_eq!(
            a.url("https://maven.neoforged.net/releases/"),
            "https://maven.neoforged.net/releases/net/neoforged/neoforge/21.1.77/neoforge-21.1.77-installer.jar"
        );
    }
}
