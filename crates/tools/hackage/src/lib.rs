//! Hackage package index for setup-agda.
//!
//! - Version listing through `GET /package/<name>` with `Accept: application/json`
//! - Source tarballs from `/package/<name>-<version>/<name>-<version>.tar.gz`

use async_trait::async_trait;
use flate2::read::GzDecoder;
use reqwest::Client;
use setup_agda_core::{
    ArchiveLocation, ConcreteVersion, Error, PackageIndex, PackageInfo, Result, RetryConfig,
    VersionStatus, with_retry,
};
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tar::Archive;
use tracing::{debug, info, warn};

/// Public Hackage.
pub const DEFAULT_HACKAGE_URL: &str = "https://hackage.haskell.org";

/// [`PackageIndex`] backed by a Hackage server.
pub struct HackageIndex {
    client: Client,
    base_url: String,
    retry: RetryConfig,
}

impl HackageIndex {
    /// Create an index client for the given server.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("setup-agda/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::network(format!("Failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            retry: RetryConfig::default(),
        })
    }

    /// Override the retry policy.
    #[must_use]
    pub fn with_retry_config(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| Error::network(format!("Failed to fetch {url}: {e}")))?;

        let status = response.status();
        if status.is_server_error() {
            return Err(Error::network(format!("{url} returned HTTP {status}")));
        }
        if !status.is_success() {
            return Err(Error::metadata(format!("{url} returned HTTP {status}")));
        }
        response
            .text()
            .await
            .map_err(|e| Error::network(format!("Failed to read {url}: {e}")))
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>> {
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
                "hackage",
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

#[async_trait]
impl PackageIndex for HackageIndex {
    fn name(&self) -> &'static str {
        "hackage"
    }

    async fn package_info(&self, package: &str) -> Result<PackageInfo> {
        let url = format!("{}/package/{package}", self.base_url);
        debug!(%url, "Fetching package versions");
        let body = with_retry(&self.retry, || self.get_text(&url)).await?;
        let info = parse_package_info(&body)?;
        debug!(count = info.versions.len(), "Received package versions");
        Ok(info)
    }

    fn source_location(&self, package: &str, version: &ConcreteVersion) -> ArchiveLocation {
        let root = format!("{package}-{version}");
        ArchiveLocation {
            url: format!("{}/package/{root}/{root}.tar.gz", self.base_url),
            root,
        }
    }

    async fn fetch_source(&self, location: &ArchiveLocation, dest: &Path) -> Result<PathBuf> {
        info!(url = %location.url, "Downloading source archive");
        let data = with_retry(&self.retry, || self.get_bytes(&location.url)).await?;
        unpack_source(&data, &location.root, dest)
    }
}

/// Parse Hackage's `{"<version>": "normal" | "deprecated"}` listing.
///
/// Unparseable versions are skipped with a warning. Unknown statuses are
/// treated as deprecated.
///
/// # Errors
///
/// Returns [`Error::Metadata`] if the body is not a JSON object of strings.
pub fn parse_package_info(body: &str) -> Result<PackageInfo> {
    let raw: BTreeMap<String, String> = serde_json::from_str(body)
        .map_err(|e| Error::metadata(format!("Unexpected package listing: {e}")))?;

    let mut versions = BTreeMap::new();
    for (text, status) in raw {
        let Ok(version) = ConcreteVersion::parse(&text) else {
            warn!(version = %text, "Skipping unparseable version");
            continue;
        };
        let status = match status.as_str() {
            "normal" => VersionStatus::Normal,
            _ => VersionStatus::Deprecated,
        };
        versions.insert(version, status);
    }
    Ok(PackageInfo::new(versions))
}

/// Unpack a `.tar.gz` source archive below `dest` and return `dest/<root>`.
///
/// An earlier checkout of the same root is replaced.
///
/// # Errors
///
/// Returns an error if the archive is corrupt or does not contain `root`.
pub fn unpack_source(data: &[u8], root: &str, dest: &Path) -> Result<PathBuf> {
    let source_dir = dest.join(root);
    if source_dir.exists() {
        std::fs::remove_dir_all(&source_dir)
            .map_err(|e| Error::io(e, Some(source_dir.clone()), "remove old checkout"))?;
    }
    std::fs::create_dir_all(dest)
        .map_err(|e| Error::io(e, Some(dest.to_path_buf()), "create source directory"))?;

    let mut archive = Archive::new(GzDecoder::new(Cursor::new(data)));
    archive
        .unpack(dest)
        .map_err(|e| Error::metadata(format!("Failed to extract source archive: {e}")))?;

    if !source_dir.is_dir() {
        return Err(Error::metadata(format!(
            "Source archive did not contain {root}/"
        )));
    }
    debug!(path = %source_dir.display(), "Unpacked source");
    Ok(source_dir)
}
