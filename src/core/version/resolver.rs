// ─── Latest Version Resolver ───
// Asks the loader's Maven API which release is newest.

use std::fmt;

use serde::Deserialize;
use tracing::{debug, info};

use crate::core::error::{UpdaterError, UpdaterResult};

/// A resolved loader release (e.g. `21.1.77`). Fixed for the whole run once fetched.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VersionInfo(String);

impl VersionInfo {
    pub fn new(version: impl Into<String>) -> Self {
        Self(version.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The launcher's `lastVersionId` for this release, e.g. `neoforge-21.1.77`.
    pub fn version_id(&self, loader_prefix: &str) -> String {
        format!("{}-{}", loader_prefix, self.0)
    }
}

impl fmt::Display for VersionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Body of the `latest/version` endpoint. Only `version` is read.
#[derive(Debug, Deserialize)]
struct LatestVersionResponse {
    version: String,
}

pub struct VersionResolver {
    client: reqwest::Client,
    endpoint: String,
}

impl VersionResolver {
    pub fn new(client: reqwest::Client, endpoint: String) -> Self {
        Self { client, endpoint }
    }

    /// One request, no retries.
    pub async fn resolve(&self) -> UpdaterResult<VersionInfo> {
        info!("Fetching latest loader version from {}", self.endpoint);

        let response = self.client.get(&self.endpoint).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(UpdaterError::DownloadFailed {
                url: self.endpoint.clone(),
                status: status.as_u16(),
            });
        }

        let body = response.text().await?;
        debug!("Version endpoint answered {} bytes", body.len());

        let parsed: LatestVersionResponse =
            serde_json::from_str(&body).map_err(|e| UpdaterError::MalformedResponse {
                url: self.endpoint.clone(),
                reason: e.to_string(),
            })?;

        let version = parsed.version.trim();
        if version.is_empty() {
            return Err(UpdaterError::MalformedResponse {
                url: self.endpoint.clone(),
                reason: "empty version field".into(),
            });
        }
        if !is_plain_version(version) {
            return Err(UpdaterError::MalformedResponse {
                url: self.endpoint.clone(),
                reason: format!("unexpected version {version:?}"),
            });
        }

        info!("Latest version is {}", version);
        Ok(VersionInfo::new(version))
    }
}

/// A Maven version token: `[A-Za-z0-9._+-]+`, no `..`, no leading dot.
///
/// The version ends up in file names, a URL path and the launcher's `lastVersionId`.
fn is_plain_version(version: &str) -> bool {
    !version.starts_with('.')
        && !version.contains("..")
        && version
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '+' | '-'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum::routing::get;
    use axum::Router;
    use tokio::net::TcpListener;

    async fn serve(router: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn resolver(url: String) -> VersionResolver {
        VersionResolver::new(reqwest::Client::new(), url)
    }

    #[test]
    fn version_id_uses_prefix() {
        let v = VersionInfo::new("20.1.1");
        assert_eq!(v.version_id("neoforge"), "neoforge-20.1.1");
    }

    #[tokio::test]
    async fn resolves_version_field() {
        let base = serve(Router::new().route(
            "/latest",
            get(|| async { r#"{"isSnapshot":false,"version":"21.1.77"}"# }),
        ))
        .await;

        let version = resolver(format!("{base}/latest")).resolve().await.unwrap();
        assert_eq!(version.as_str(), "21.1.77");
    }

    #[tokio::test]
    async fn missing_version_field_is_malformed() {
        let base = serve(Router::new().route("/latest", get(|| async { r#"{"latest":"1"}"# }))).await;

        let err = resolver(format!("{base}/latest")).resolve().await.unwrap_err();
        assert!(matches!(err, UpdaterError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn non_json_body_is_malformed() {
        let base = serve(Router::new().route("/latest", get(|| async { "<html>oops</html>" }))).await;

        let err = resolver(format!("{base}/latest")).resolve().await.unwrap_err();
        assert!(matches!(err, UpdaterError::MalformedResponse { .. }));
    }

    #[test]
    fn only_plain_version_tokens_are_accepted() {
        for ok in ["21.1.77", "20.2.3-beta", "1.0+build.5", "21.0.0_rc1"] {
            assert!(is_plain_version(ok), "{ok}");
        }
        for bad in ["../../tmp/evil", "21/1", "21\\1", "..", ".hidden", "21 1", "21..1"] {
            assert!(!is_plain_version(bad), "{bad}");
        }
    }

    #[tokio::test]
    async fn path_like_version_is_malformed() {
        let base = serve(Router::new().route(
            "/latest",
            get(|| async { r#"{"version":"../../../../tmp/evil"}"# }),
        ))
        .await;

        let err = resolver(format!("{base}/latest")).resolve().await.unwrap_err();
        assert!(matches!(err, UpdaterError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let base = serve(Router::new().route(
            "/latest",
            get(|| async { (StatusCode::SERVICE_UNAVAILABLE, "down") }),
        ))
        .await;

        let err = resolver(format!("{base}/latest")).resolve().await.unwrap_err();
        assert!(matches!(
            err,
            UpdaterError::DownloadFailed { status: 503, .. }
        ));
    }
}
