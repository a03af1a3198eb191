//! Strategies implemented in terms of core traits.

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use super::{AcquireContext, AcquisitionSource, SourceKind};
use crate::build::{AuxiliaryLibrary, SourceBuilder};
use crate::cache::ToolCache;
use crate::index::PackageIndex;
use crate::options::BuildOptions;
use crate::Result;

/// Looks the resolved release up in the tool cache.
pub struct ToolCacheSource {
    cache: Arc<dyn ToolCache>,
}

impl ToolCacheSource {
    /// Wrap a tool cache.
    #[must_use]
    pub fn new(cache: Arc<dyn ToolCache>) -> Self {
        Self { cache }
    }
}

#[async_trait]
impl AcquisitionSource for ToolCacheSource {
    fn kind(&self) -> SourceKind {
        SourceKind::Cache
    }

    fn name(&self) -> &'static str {
        "tool-cache"
    }

    async fn try_acquire(&self, ctx: &AcquireContext) -> Result<Option<PathBuf>> {
        let key = ctx.cache_key()?;
        self.cache.lookup(&key)
    }
}

/// Downloads the source archive and builds it.
///
/// The auxiliary library (ICU) is provisioned while the archive downloads.
pub struct SourceBuildStage {
    index: Arc<dyn PackageIndex>,
    builder: SourceBuilder,
    auxiliary: Option<Arc<dyn AuxiliaryLibrary>>,
}

impl SourceBuildStage {
    /// Create the stage.
    #[must_use]
    pub fn new(index: Arc<dyn PackageIndex>, builder: SourceBuilder) -> Self {
        Self {
            index,
            builder,
            auxiliary: None,
        }
    }

    /// Provision an auxiliary library before building.
    #[must_use]
    pub fn with_auxiliary(mut self, library: Arc<dyn AuxiliaryLibrary>) -> Self {
        self.auxiliary = Some(library);
        self
    }

    async fn provision_auxiliary(&self, ctx: &AcquireContext) -> Result<BuildOptions> {
        let options = ctx.options().clone();
        let Some(library) = &self.auxiliary else {
            return Ok(options);
        };
        let agda = options.resolved_version()?;
        let Some(version) = library.required_version(agda) else {
            debug!(library = library.name(), %agda, "No auxiliary library needed");
            return Ok(options);
        };

        info!(library = library.name(), version, "Setting up auxiliary library");
        let dirs = library
            .provision(version, options.platform(), &ctx.paths().icu_dir(version))
            .await?;
        Ok(options
            .with_icu_version(version)
            .with_extra_lib_dir(dirs.lib_dir)
            .with_extra_include_dir(dirs.include_dir))
    }
}

#[async_trait]
impl AcquisitionSource for SourceBuildStage {
    fn kind(&self) -> SourceKind {
        SourceKind::Source
    }

    fn name(&self) -> &'static str {
        "source-build"
    }

    async fn try_acquire(&self, ctx: &AcquireContext) -> Result<Option<PathBuf>> {
        let options = ctx.options();
        let version = options.resolved_version()?;
        self.builder.toolchain().check_prerequisites().await?;

        let location = self.index.source_location(options.package(), version);
        let source_root = ctx.paths().cache_dir().join("src");
        info!(url = %location.url, "Get {}-{} from {}", options.package(), version, self.index.name());

        let (source_dir, options) = tokio::try_join!(
            self.index.fetch_source(&location, &source_root),
            self.provision_auxiliary(ctx)
        )?;

        let install_dir = ctx.paths().install_dir(version.as_str());
        self.builder.build(&source_dir, &install_dir, options).await?;
        Ok(Some(install_dir))
    }
}
