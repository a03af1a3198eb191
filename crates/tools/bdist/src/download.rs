//! HTTP downloads with retry and checksum verification.

use reqwest::Client;
use setup_agda_core::{Error, Result, RetryConfig, with_retry};
use sha2::{Digest, Sha256};
use tracing::debug;

/// Shared HTTP client for archive downloads.
#[derive(Clone)]
pub struct Downloader {
    client: Client,
    retry: RetryConfig,
}

impl Downloader {
    /// Create a downloader.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("setup-agda/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            retry: RetryConfig::default(),
        })
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Download a URL into memory.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Network`] for transport errors and 5xx responses, and
    /// [`Error::SourceUnavailable`] for other non-success statuses.
    pub async fn download(&self, url: &str) -> Result<Vec<u8>> {
        with_retry(&self.retry, || self.download_once(url)).await
    }

    /// Fetch a URL as text.
    ///
    /// # Errors
    ///
    /// Same as [`Downloader::download`], plus invalid UTF-8.
    pub async fn download_text(&self, url: &str) -> Result<String> {
        let data = self.download(url).await?;
        String::from_utf8(data).map_err(|e| Error::metadata(format!("{url} is not UTF-8: {e}")))
    }

    async fn download_once(&self, url: &str) -> Result<Vec<u8>> {
        debug!(%url, "Downloading");
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::network(format!("Failed to download {url}: {e}")))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Error::network(format!("{url} returned HTTP {status}")));
        }
        if !status.is_success() {
            return Err(Error::source_unavailable(
                "download",
                format!("{url} returned HTTP {status}"),
            ));
        }

        response
            .bytes()
            .await
            .map(|b| b.to_vec())
            .map_err(|e| Error::network(format!("Failed to read {url}: {e}")))
    }
}

/// Check `data` against an expected SHA256 digest.
///
/// # Errors
///
/// Returns [`Error::Metadata`] on a mismatch.
pub fn verify_sha256(data: &[u8], expected: &str, name: &str) -> Result<()> {
    let actual = sha256_hex(data);
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::metadata(format!(
            "Checksum mismatch for {name}: expected {expected}, got {actual}"
        )));
    }
    debug!(%name, sha256 = %actual, "Checksum verified");
    Ok(())
}

/// Lowercase hex SHA256 of a byte slice.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
