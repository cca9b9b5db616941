mod artifact;

pub use artifact::{MavenArtifact, MavenModule, INSTALLER_CLASSIFIER};

/// Repository NeoForge publishes releases to.
pub const NEOFORGE_MAVEN: &str = "https://maven.neoforged.net/releases";

/// NeoForge's own endpoint for the newest release of `net.neoforged:neoforge`.
pub const NEOFORGE_LATEST_VERSION_ENDPOINT: &str =
    "https://maven.neoforged.net/api/maven/latest/version/releases/net%2Fneoforged%2Fneoforge";

pub const NEOFORGE_MODULE: &str = "net.neoforged:neoforge";
