//! cabal build toolchain for setup-agda.
//!
//! - [`CabalToolchain`] drives `cabal v2-*` and installs compilers through `ghcup`
//! - [`IcuInstaller`] provisions the ICU libraries Agda's cluster counting links against

mod icu;

pub use icu::{IcuArchive, IcuInstaller, icu_archive};

use async_trait::async_trait;
use setup_agda_core::{BuildToolchain, ConcreteVersion, Error, Result};
use std::ffi::OsString;
use std::path::Path;
use tokio::process::Command;
use tracing::{debug, info};

/// [`BuildToolchain`] backed by `cabal` and `ghcup`.
pub struct CabalToolchain {
    cabal: String,
    ghcup: String,
}

impl Default for CabalToolchain {
    fn default() -> Self {
        Self::new()
    }
}

impl CabalToolchain {
    /// Use `cabal` and `ghcup` from `PATH`.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cabal: "cabal".to_string(),
            ghcup: "ghcup".to_string(),
        }
    }

    /// Use specific program names or paths.
    #[must_use]
    pub fn with_programs(cabal: impl Into<String>, ghcup: impl Into<String>) -> Self {
        Self {
            cabal: cabal.into(),
            ghcup: ghcup.into(),
        }
    }

    /// Arguments of the configure step.
    #[must_use]
    pub fn configure_args(flags: &[String]) -> Vec<OsString> {
        std::iter::once(OsString::from("v2-configure"))
            .chain(flags.iter().map(OsString::from))
            .collect()
    }

    /// Arguments of the build step.
    #[must_use]
    pub fn build_args(targets: &[String]) -> Vec<OsString> {
        std::iter::once(OsString::from("v2-build"))
            .chain(targets.iter().map(OsString::from))
            .collect()
    }

    /// Arguments of the install step.
    #[must_use]
    pub fn install_args(targets: &[String], bin_dir: &Path) -> Vec<OsString> {
        let mut installdir = OsString::from("--installdir=");
        installdir.push(bin_dir.as_os_str());
        std::iter::once(OsString::from("v2-install"))
            .chain(targets.iter().map(OsString::from))
            .chain([OsString::from("--install-method=copy"), installdir])
            .collect()
    }

    /// Run one cabal step in `source_dir`, mapping failure to [`Error::BuildFailure`].
    async fn cabal_step(&self, step: &str, source_dir: &Path, args: Vec<OsString>) -> Result<()> {
        debug!(program = %self.cabal, ?args, cwd = %source_dir.display(), "Running cabal");
        let output = Command::new(&self.cabal)
            .args(&args)
            .current_dir(source_dir)
            .output()
            .await
            .map_err(|e| Error::process(&self.cabal, format!("Failed to run {}: {e}", self.cabal)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stdout = String::from_utf8_lossy(&output.stdout);
            let diagnostics = if stderr.trim().is_empty() {
                stdout.trim().to_string()
            } else {
                stderr.trim().to_string()
            };
            return Err(Error::build_failure(step, diagnostics));
        }
        Ok(())
    }
}

/// Run `program args` and return its trimmed stdout.
///
/// # Errors
///
/// Returns [`Error::Process`] if the program cannot be started or exits
/// unsuccessfully.
pub async fn program_output(program: &str, args: &[&str]) -> Result<String> {
    let output = Command::new(program)
        .args(args)
        .output()
        .await
        .map_err(|e| Error::process(program, format!("Failed to run {program}: {e}")))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::process(
            program,
            format!("{} exited with {}: {}", args.join(" "), output.status, stderr.trim()),
        ));
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

#[async_trait]
impl BuildToolchain for CabalToolchain {
    fn name(&self) -> &'static str {
        "cabal"
    }

    async fn check_prerequisites(&self) -> Result<()> {
        let cabal = program_output(&self.cabal, &["--numeric-version"]).await?;
        debug!(version = %cabal, "cabal is available");
        let ghcup = program_output(&self.ghcup, &["--version"]).await?;
        debug!(version = %ghcup, "ghcup is available");
        Ok(())
    }

    async fn prepare(&self, compiler: &ConcreteVersion) -> Result<()> {
        let ghc = format!("ghc-{compiler}");
        if let Ok(installed) = program_output(&ghc, &["--numeric-version"]).await {
            debug!(%installed, "GHC already installed");
            return Ok(());
        }

        info!(%compiler, "Installing GHC through ghcup");
        program_output(&self.ghcup, &["install", "ghc", compiler.as_str()])
            .await
            .map_err(|e| Error::build_failure("ghcup install", e.to_string()))?;
        Ok(())
    }

    async fn configure(&self, source_dir: &Path, flags: &[String]) -> Result<()> {
        self.cabal_step("configure", source_dir, Self::configure_args(flags))
            .await
    }

    async fn build(&self, source_dir: &Path, targets: &[String]) -> Result<()> {
        self.cabal_step("build", source_dir, Self::build_args(targets))
            .await
    }

    async fn install(&self, source_dir: &Path, targets: &[String], bin_dir: &Path) -> Result<()> {
        self.cabal_step("install", source_dir, Self::install_args(targets, bin_dir))
            .await
    }
}
