use crate::tracing::{LogLevel, TracingFormat};
use clap::Parser;
use setup_agda_core::Platform;
use setup_agda_hackage::DEFAULT_HACKAGE_URL;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "setup-agda")]
#[command(about = "Install Agda from the tool cache, a binary distribution, or source")]
#[command(long_about = None)]
#[command(version)]
pub struct Cli {
    #[arg(
        long,
        env = "SETUP_AGDA_VERSION",
        help = "Agda version: an exact version, a range, 'latest' or 'nightly'",
        default_value = "latest"
    )]
    pub agda_version: String,

    #[arg(
        long,
        env = "SETUP_AGDA_GHC_VERSION_RANGE",
        help = "GHC versions the build may use",
        default_value = "*"
    )]
    pub ghc_version_range: String,

    #[arg(long, env = "SETUP_AGDA_FORCE_BUILD", help = "Always build from source")]
    pub force_build: bool,

    #[arg(
        long,
        env = "SETUP_AGDA_FORCE_NO_BUILD",
        help = "Fail instead of building from source"
    )]
    pub force_no_build: bool,

    #[arg(long, env = "AGDA_DIR", help = "Agda directory [default: ~/.agda]")]
    pub agda_dir: Option<PathBuf>,

    #[arg(long, env = "RUNNER_TOOL_CACHE", help = "Tool cache directory")]
    pub tool_cache: Option<PathBuf>,

    #[arg(
        long,
        env = "SETUP_AGDA_BDIST_INDEX",
        help = "Path or URL of a binary distribution index"
    )]
    pub bdist_index: Option<String>,

    #[arg(
        long,
        env = "SETUP_AGDA_HACKAGE_URL",
        help = "Hackage server",
        default_value = DEFAULT_HACKAGE_URL
    )]
    pub hackage_url: String,

    #[arg(
        long,
        env = "SETUP_AGDA_RETRY_ATTEMPTS",
        help = "Attempts per network request, including the first",
        default_value_t = 3,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub retry_attempts: u32,

    #[arg(
        long,
        env = "SETUP_AGDA_PLATFORM",
        help = "Target platform, e.g. linux-x86_64 [default: host]",
        value_parser = parse_platform
    )]
    pub platform: Option<Platform>,

    #[arg(
        long,
        env = "SETUP_AGDA_NO_VERIFY",
        help = "Skip running 'agda --version' after install"
    )]
    pub no_verify: bool,

    #[arg(
        short = 'l',
        long,
        env = "SETUP_AGDA_LOG_LEVEL",
        help = "Set logging level",
        default_value = "info",
        value_enum
    )]
    pub level: LogLevel,

    #[arg(
        long,
        env = "SETUP_AGDA_LOG_FORMAT",
        help = "Log output format",
        default_value = "compact",
        value_enum
    )]
    pub format: TracingFormat,

    #[arg(long, help = "Print outputs as JSON")]
    pub json: bool,
}

fn parse_platform(input: &str) -> Result<Platform, String> {
    Platform::parse(input).ok_or_else(|| {
        format!("unknown platform '{input}', expected <linux|darwin|windows>-<x86_64|arm64>")
    })
}

pub fn parse() -> Cli {
    Cli::parse()
}
