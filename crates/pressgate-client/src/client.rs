//! HTTP client for the update gateway.

use std::fmt;
use std::future::Future;
use std::path::Path;
use std::time::Duration;

use pressgate_core::PackageKind;
use reqwest::header::CONTENT_DISPOSITION;
use reqwest::{StatusCode, Url};
use tempfile::TempPath;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::ClientError;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
/// Whole-request budget; archives can take minutes on slow links.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Where the gateway is and how this site authenticates to it.
#[derive(Clone, Default)]
pub struct GatewayClientConfig {
    /// Gateway endpoint, e.g. `https://updates.example.net/api`.
    pub base_url: String,
    /// This site's registered domain.
    pub domain: String,
    pub key: String,
}

impl GatewayClientConfig {
    pub fn is_configured(&self) -> bool {
        !self.base_url.trim().is_empty()
            && !self.domain.trim().is_empty()
            && !self.key.trim().is_empty()
    }
}

impl fmt::Debug for GatewayClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayClientConfig")
            .field("base_url", &self.base_url)
            .field("domain", &self.domain)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// A package archive downloaded to a temporary file.
///
/// The file is deleted when this value is dropped.
#[derive(Debug)]
pub struct DownloadedPackage {
    /// Name announced by the gateway, if any.
    pub file_name: Option<String>,
    pub bytes: u64,
    pub(crate) path: TempPath,
}

impl DownloadedPackage {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Answer to a package check.
#[derive(Debug)]
pub enum PackageCheck {
    NoUpdate,
    UpdateAvailable(DownloadedPackage),
}

/// Source of package updates for [`run_updates`](crate::run_updates).
pub trait PackageSource {
    fn is_configured(&self) -> bool;

    /// Ask whether something newer than `version` exists for `slug`, and
    /// fetch it if so.
    fn check(
        &self,
        kind: PackageKind,
        slug: &str,
        version: &str,
    ) -> impl Future<Output = Result<PackageCheck, ClientError>> + Send;
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    config: GatewayClientConfig,
}

impl GatewayClient {
    pub fn new(config: GatewayClientConfig) -> Result<Self, ClientError> {
        // Ensure a TLS crypto provider is installed (reqwest uses rustls-no-provider).
        // The `Err` case just means it was already installed.
        let _ = rustls::crypto::ring::default_provider().install_default();

        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_http(config, http))
    }

    /// Use a caller-built HTTP client.
    pub const fn with_http(config: GatewayClientConfig, http: reqwest::Client) -> Self {
        Self { http, config }
    }

    pub const fn config(&self) -> &GatewayClientConfig {
        &self.config
    }

    /// Fetch this site's key through single-use delivery.
    ///
    /// Works once after an administrator enabled delivery for the domain.
    pub async fn fetch_key(&self) -> Result<String, ClientError> {
        let url = self.url(&[("type", "auth"), ("domain", self.config.domain.as_str())])?;
        self.request_key(url).await
    }

    /// Trade `old_key` for a freshly issued key.
    ///
    /// The returned key replaces the old one on the gateway immediately;
    /// callers must persist it before doing anything else.
    pub async fn rotate_key(&self, old_key: &str) -> Result<String, ClientError> {
        let url = self.url(&[
            ("type", "auth"),
            ("domain", self.config.domain.as_str()),
            ("old_key", old_key),
        ])?;
        self.request_key(url).await
    }

    async fn request_key(&self, url: Url) -> Result<String, ClientError> {
        if self.config.base_url.trim().is_empty() || self.config.domain.trim().is_empty() {
            return Err(ClientError::NotConfigured);
        }
        let resp = self.http.get(url).send().await?;
        match resp.status() {
            StatusCode::OK => {
                let key = resp.text().await?.trim().to_string();
                info!(domain = %self.config.domain, "Received key from gateway");
                Ok(key)
            }
            status => Err(rejection(status)),
        }
    }

    fn url(&self, params: &[(&str, &str)]) -> Result<Url, ClientError> {
        Url::parse_with_params(&self.config.base_url, params)
            .map_err(|e| ClientError::InvalidUrl(e.to_string()))
    }
}

impl PackageSource for GatewayClient {
    fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    async fn check(
        &self,
        kind: PackageKind,
        slug: &str,
        version: &str,
    ) -> Result<PackageCheck, ClientError> {
        if !self.config.is_configured() {
            return Err(ClientError::NotConfigured);
        }
        let url = self.url(&[
            ("type", kind.as_str()),
            ("domain", self.config.domain.as_str()),
            ("key", self.config.key.as_str()),
            ("slug", slug),
            ("version", version),
        ])?;

        let resp = self.http.get(url).send().await?;
        match resp.status() {
            StatusCode::NO_CONTENT => {
                debug!(%kind, slug, version, "No update");
                Ok(PackageCheck::NoUpdate)
            }
            StatusCode::OK => {
                let package = download(resp).await?;
                info!(%kind, slug, bytes = package.bytes, "Downloaded update");
                Ok(PackageCheck::UpdateAvailable(package))
            }
            status => Err(rejection(status)),
        }
    }
}

fn rejection(status: StatusCode) -> ClientError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ClientError::Unauthorized,
        other => ClientError::UnexpectedStatus(other.as_u16()),
    }
}

/// Stream the response body into a temporary file.
///
/// A body cut short leaves an error and no file behind.
async fn download(mut resp: reqwest::Response) -> Result<DownloadedPackage, ClientError> {
    let file_name = resp
        .headers()
        .get(CONTENT_DISPOSITION)
        .and_then(|v| v.to_str().ok())
        .and_then(attachment_file_name);

    let (file, path) = tempfile::Builder::new()
        .prefix("pressgate-")
        .suffix(".zip")
        .tempfile()?
        .into_parts();
    let mut file = tokio::fs::File::from_std(file);

    let mut bytes = 0u64;
    while let Some(chunk) = resp.chunk().await? {
        file.write_all(&chunk).await?;
        bytes += chunk.len() as u64;
    }
    file.flush().await?;

    Ok(DownloadedPackage {
        file_name,
        bytes,
        path,
    })
}

/// `attachment; filename="x.zip"` -> `x.zip`
fn attachment_file_name(disposition: &str) -> Option<String> {
    disposition
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"').to_string())
        .filter(|name| !name.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn configured_requires_all_fields() {
        let mut config = GatewayClientConfig {
            base_url: "https://updates.example.net/".into(),
            domain: "example.com".into(),
            key: "abc123".into(),
        };
        assert!(config.is_configured());
        config.key = "  ".into();
        assert!(!config.is_configured());
        assert!(!GatewayClientConfig::default().is_configured());
    }

    #[test]
    fn debug_hides_key() {
        let config = GatewayClientConfig {
            key: "abc123".into(),
            ..GatewayClientConfig::default()
        };
        assert!(!format!("{config:?}").contains("abc123"));
    }

    #[test]
    fn parses_attachment_file_name() {
        assert_eq!(
            attachment_file_name("attachment; filename=\"sample_2.0.zip\"").as_deref(),
            Some("sample_2.0.zip")
        );
        assert_eq!(
            attachment_file_name("attachment;filename=plain.zip").as_deref(),
            Some("plain.zip")
        );
        assert_eq!(attachment_file_name("inline"), None);
        assert_eq!(attachment_file_name("attachment; filename=\"\""), None);
    }

    #[test]
    fn status_mapping() {
        assert!(matches!(rejection(StatusCode::FORBIDDEN), ClientError::Unauthorized));
        assert!(matches!(rejection(StatusCode::UNAUTHORIZED), ClientError::Unauthorized));
        assert!(matches!(
            rejection(StatusCode::BAD_REQUEST),
            ClientError::UnexpectedStatus(400)
        ));
    }
}
