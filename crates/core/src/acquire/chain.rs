//! The ordered, short-circuiting acquisition chain.

use std::path::Path;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};

use super::source::ToolCacheSource;
use super::{AcquireContext, AcquisitionResult, AcquisitionSource, SourceKind, StageMiss};
use crate::cache::ToolCache;
use crate::version::Resolved;
use crate::{Error, Result};

/// Tries strategies from cheapest to most expensive.
///
/// Order for a release: tool cache, prebuilt index, source build. The first
/// strategy that produces an install root wins and nothing after it runs.
/// Lookup strategies are isolated: their errors are logged and treated as a
/// miss. The build strategy is terminal and its errors propagate. When
/// nothing is produced, the reason each strategy gave is reported.
///
/// A nightly resolution goes straight to the nightly strategy.
pub struct AcquisitionChain {
    cache: Arc<dyn ToolCache>,
    lookups: Vec<Arc<dyn AcquisitionSource>>,
    build: Arc<dyn AcquisitionSource>,
    nightly: Option<Arc<dyn AcquisitionSource>>,
}

impl AcquisitionChain {
    /// Create a chain with the tool cache as first lookup and `build` as the
    /// terminal strategy.
    #[must_use]
    pub fn new(cache: Arc<dyn ToolCache>, build: Arc<dyn AcquisitionSource>) -> Self {
        let cache_source: Arc<dyn AcquisitionSource> =
            Arc::new(ToolCacheSource::new(Arc::clone(&cache)));
        Self {
            cache,
            lookups: vec![cache_source],
            build,
            nightly: None,
        }
    }

    /// Append a lookup strategy, tried after the ones already added.
    #[must_use]
    pub fn with_lookup(mut self, source: Arc<dyn AcquisitionSource>) -> Self {
        self.lookups.push(source);
        self
    }

    /// Set the strategy used for nightly resolutions.
    #[must_use]
    pub fn with_nightly(mut self, source: Arc<dyn AcquisitionSource>) -> Self {
        self.nightly = Some(source);
        self
    }

    /// Run the chain.
    ///
    /// # Errors
    ///
    /// - [`Error::ConfigurationConflict`] if both force flags are set, or if
    ///   a build is required while `force_no_build` is set. The message lists
    ///   why each lookup missed.
    /// - Any error from the build or nightly strategy.
    pub async fn acquire(&self, ctx: &AcquireContext) -> Result<AcquisitionResult> {
        let options = ctx.options();
        options.validate()?;

        match options.resolved() {
            None => Err(Error::configuration_conflict(
                "version must be resolved before acquisition",
            )),
            Some(Resolved::Nightly) => self.acquire_nightly(ctx).await,
            Some(Resolved::Release(version)) => {
                let mut misses = Vec::new();
                if options.force_build() {
                    info!("force-build is set, skipping lookups");
                } else {
                    for source in &self.lookups {
                        if let Some(result) =
                            self.try_lookup(source.as_ref(), ctx, &mut misses).await
                        {
                            return Ok(result);
                        }
                    }
                }

                if options.force_no_build() {
                    let detail = if misses.is_empty() {
                        String::new()
                    } else {
                        format!(" ({})", StageMiss::summarize(&misses))
                    };
                    return Err(Error::configuration_conflict(format!(
                        "Required build of {} {version}, but \"force-no-build\" is set{detail}",
                        options.package()
                    )));
                }
                self.run_terminal(self.build.as_ref(), ctx, misses).await
            }
        }
    }

    async fn try_lookup(
        &self,
        source: &dyn AcquisitionSource,
        ctx: &AcquireContext,
        misses: &mut Vec<StageMiss>,
    ) -> Option<AcquisitionResult> {
        let span = info_span!("stage", kind = %source.kind(), name = source.name());
        let outcome = source.try_acquire(ctx).instrument(span).await;
        match outcome {
            Ok(Some(path)) => {
                info!(source = %source.kind(), path = %path.display(), "Found installation");
                self.store(source.kind(), &path, ctx);
                Some(AcquisitionResult::Found {
                    path,
                    source: source.kind(),
                })
            }
            Ok(None) => {
                debug!(source = %source.kind(), "Not found");
                misses.push(StageMiss::new(source.kind(), "not found"));
                None
            }
            Err(e) => {
                warn!(source = %source.kind(), error = %e, "Lookup failed, trying next source");
                misses.push(StageMiss::new(source.kind(), e.to_string()));
                None
            }
        }
    }

    async fn run_terminal(
        &self,
        source: &dyn AcquisitionSource,
        ctx: &AcquireContext,
        mut misses: Vec<StageMiss>,
    ) -> Result<AcquisitionResult> {
        let span = info_span!("stage", kind = %source.kind(), name = source.name());
        match source.try_acquire(ctx).instrument(span).await? {
            Some(path) => {
                info!(source = %source.kind(), path = %path.display(), "Acquired installation");
                self.store(source.kind(), &path, ctx);
                Ok(AcquisitionResult::Found {
                    path,
                    source: source.kind(),
                })
            }
            None => {
                misses.push(StageMiss::new(source.kind(), "not found"));
                Ok(AcquisitionResult::NotFound { misses })
            }
        }
    }

    async fn acquire_nightly(&self, ctx: &AcquireContext) -> Result<AcquisitionResult> {
        let Some(nightly) = &self.nightly else {
            return Err(Error::source_unavailable(
                SourceKind::Nightly.to_string(),
                "no nightly source is configured",
            ));
        };
        self.run_terminal(nightly.as_ref(), ctx, Vec::new()).await
    }

    /// Copy a fresh acquisition into the tool cache. Failure only warns.
    fn store(&self, kind: SourceKind, path: &Path, ctx: &AcquireContext) {
        if matches!(kind, SourceKind::Cache | SourceKind::Nightly) {
            return;
        }
        let key = match ctx.cache_key() {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "Cannot build tool cache key");
                return;
            }
        };
        if let Err(e) = self.cache.store(&key, path) {
            warn!(error = %e, "Failed to store installation in tool cache");
        }
    }
}
