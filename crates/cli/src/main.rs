mod cli;
mod output;
mod tracing;

use ::tracing::{Instrument, info_span};
use setup_agda_bdist::{BdistSource, Downloader, IndexLocation, NightlySource};
use setup_agda_cabal::{CabalToolchain, IcuInstaller};
use setup_agda_core::{
    AcquisitionChain, AgdaPaths, BuildOptions, FsToolCache, Installation, PackageResolver,
    Pipeline, Platform, RetryConfig, SourceBuildStage, SourceBuilder, VersionDescriptor,
    VersionRange,
};
use setup_agda_hackage::HackageIndex;
use std::sync::Arc;

use crate::cli::Cli;
use crate::tracing::TracingConfig;

/// Package installed by this binary.
const PACKAGE: &str = "Agda";

#[tokio::main]
#[allow(clippy::print_stderr)]
async fn main() {
    if let Err(error) = run_main().await {
        eprintln!("{error:?}");
        std::process::exit(1);
    }
}

#[allow(clippy::print_stdout)]
async fn run_main() -> miette::Result<()> {
    let cli = cli::parse();

    crate::tracing::init_tracing(TracingConfig {
        format: cli.format,
        level: cli.level.into(),
        ..Default::default()
    })?;

    let installation = install(&cli).await?;
    let rendered = output::render(&installation.outputs(), cli.json)?;
    println!("{rendered}");
    Ok(())
}

/// Request options from the command line.
fn build_options(cli: &Cli, platform: Platform) -> miette::Result<BuildOptions> {
    let descriptor = VersionDescriptor::parse(&cli.agda_version)?;
    let ghc_range = VersionRange::parse(&cli.ghc_version_range)?;
    Ok(BuildOptions::new(PACKAGE, descriptor)
        .with_ghc_range(ghc_range)
        .with_force_build(cli.force_build)
        .with_force_no_build(cli.force_no_build)
        .with_platform(platform))
}

/// Wire the production collaborators into a pipeline.
fn build_pipeline(cli: &Cli, paths: AgdaPaths) -> miette::Result<Pipeline> {
    let retry = RetryConfig {
        max_attempts: cli.retry_attempts,
        ..RetryConfig::default()
    };
    let index = Arc::new(
        HackageIndex::new(cli.hackage_url.clone())?.with_retry_config(retry.clone()),
    );
    let downloader = Downloader::new()?.with_retry_config(retry);
    let cache = Arc::new(
        cli.tool_cache
            .clone()
            .map_or_else(FsToolCache::default, FsToolCache::new),
    );

    let builder = SourceBuilder::new(Arc::new(CabalToolchain::new()));
    let source_build = SourceBuildStage::new(index.clone(), builder)
        .with_auxiliary(Arc::new(IcuInstaller::new(downloader.clone())));
    let bdist = BdistSource::new(
        cli.bdist_index.as_deref().map(IndexLocation::parse),
        downloader.clone(),
    );

    let chain = AcquisitionChain::new(cache, Arc::new(source_build))
        .with_lookup(Arc::new(bdist))
        .with_nightly(Arc::new(NightlySource::new(downloader)));

    Ok(Pipeline::new(PackageResolver::new(index), chain, paths).with_verify(!cli.no_verify))
}

async fn install(cli: &Cli) -> miette::Result<Installation> {
    let platform = cli.platform.unwrap_or_else(Platform::current);
    let paths = cli
        .agda_dir
        .clone()
        .map_or_else(|| AgdaPaths::from_env(&platform), AgdaPaths::new);

    let options = build_options(cli, platform)?;
    let pipeline = build_pipeline(cli, paths)?;

    let span = info_span!(
        "setup_agda",
        correlation_id = %crate::tracing::correlation_id(),
        start_time = %chrono::Utc::now().to_rfc3339(),
        agda_version = %cli.agda_version,
        %platform,
    );
    let installation = pipeline.run(options).instrument(span).await?;
    ::tracing::info!(
        version = installation.version(),
        source = %installation.source(),
        "Installed Agda to {}",
        installation.install_dir().display()
    );
    Ok(installation)
}
