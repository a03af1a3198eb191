//! Prebuilt Agda distributions for setup-agda.
//!
//! Two acquisition strategies live here:
//!
//! - [`BdistSource`] looks the resolved release up in a binary distribution
//!   index and unpacks the matching archive.
//! - [`NightlySource`] downloads the rolling nightly build.

pub mod archive;
pub mod download;
mod index;
mod nightly;

pub use archive::{ArchiveFormat, unpack};
pub use download::{Downloader, sha256_hex, verify_sha256};
pub use index::{BdistEntry, BdistIndex, IndexLocation};
pub use nightly::nightly_url;

use async_trait::async_trait;
use setup_agda_core::{AcquireContext, AcquisitionSource, Error, Result, SourceKind};
use std::path::PathBuf;
use tracing::{debug, info};

/// Read a local file or download a URL.
async fn fetch(downloader: &Downloader, location: &IndexLocation) -> Result<Vec<u8>> {
    match location {
        IndexLocation::File(path) => tokio::fs::read(path)
            .await
            .map_err(|e| Error::io(e, Some(path.clone()), "read file")),
        IndexLocation::Url(url) => downloader.download(url).await,
    }
}

fn archive_format(name: &str) -> Result<ArchiveFormat> {
    ArchiveFormat::from_name(name)
        .ok_or_else(|| Error::metadata(format!("Unsupported archive format: {name}")))
}

/// Acquisition from a binary distribution index.
///
/// Without a configured index location this stage never has anything.
pub struct BdistSource {
    location: Option<IndexLocation>,
    downloader: Downloader,
}

impl BdistSource {
    /// Create the stage.
    #[must_use]
    pub fn new(location: Option<IndexLocation>, downloader: Downloader) -> Self {
        Self {
            location,
            downloader,
        }
    }

    /// Load and parse the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the index cannot be read or parsed.
    pub async fn load_index(&self, location: &IndexLocation) -> Result<BdistIndex> {
        let text = match location {
            IndexLocation::File(path) => tokio::fs::read_to_string(path)
                .await
                .map_err(|e| Error::io(e, Some(path.clone()), "read index"))?,
            IndexLocation::Url(url) => self.downloader.download_text(url).await?,
        };
        BdistIndex::parse(&text)
    }
}

#[async_trait]
impl AcquisitionSource for BdistSource {
    fn kind(&self) -> SourceKind {
        SourceKind::PrebuiltIndex
    }

    fn name(&self) -> &'static str {
        "bdist-index"
    }

    async fn try_acquire(&self, ctx: &AcquireContext) -> Result<Option<PathBuf>> {
        let Some(location) = &self.location else {
            debug!("No binary distribution index configured");
            return Ok(None);
        };
        let options = ctx.options();
        let version = options.resolved_version()?;
        let platform = options.platform();

        let index = self.load_index(location).await?;
        let Some(entry) = index.lookup(version, platform) else {
            debug!(%version, %platform, "No binary distribution listed");
            return Ok(None);
        };

        info!(url = %entry.url, "Download binary distribution for {}-{}", options.package(), version);
        let archive = IndexLocation::parse(&entry.url);
        let data = fetch(&self.downloader, &archive).await?;
        if let Some(expected) = &entry.sha256 {
            verify_sha256(&data, expected, &entry.url)?;
        }

        let dest = ctx
            .paths()
            .cache_dir()
            .join("bdist")
            .join(format!("{}-{}", options.package(), version));
        let root = unpack(&data, archive_format(&entry.url)?, &dest, entry.dir.as_deref()).await?;
        Ok(Some(root))
    }
}

/// Acquisition of the nightly build.
pub struct NightlySource {
    downloader: Downloader,
    url: Option<String>,
}

impl NightlySource {
    /// Create the stage.
    #[must_use]
    pub fn new(downloader: Downloader) -> Self {
        Self {
            downloader,
            url: None,
        }
    }

    /// Download from a fixed location instead of the platform default.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

#[async_trait]
impl AcquisitionSource for NightlySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Nightly
    }

    fn name(&self) -> &'static str {
        "nightly"
    }

    async fn try_acquire(&self, ctx: &AcquireContext) -> Result<Option<PathBuf>> {
        let url = self
            .url
            .clone()
            .unwrap_or_else(|| nightly_url(ctx.options().platform()));
        info!(%url, "Download nightly build");

        let data = fetch(&self.downloader, &IndexLocation::parse(&url)).await?;
        let dest = ctx.paths().install_dir(ctx.version_label()?);
        let root = unpack(&data, archive_format(&url)?, &dest, None).await?;
        Ok(Some(root))
    }
}
