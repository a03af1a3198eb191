//! Error types for setup-agda.

use miette::Diagnostic;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for installation resolution.
#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    /// A version descriptor matched none of the known versions.
    #[error("No version matches '{descriptor}'. Available: {}", candidates.join(", "))]
    #[diagnostic(
        code(setup_agda::version::not_satisfiable),
        help("Check the version for typos, or use 'latest'")
    )]
    NotSatisfiable {
        /// The descriptor as the user wrote it
        descriptor: String,
        /// Every candidate that was considered
        candidates: Vec<String>,
    },

    /// One acquisition stage could not produce an artifact.
    #[error("{source_kind} unavailable: {reason}")]
    #[diagnostic(code(setup_agda::acquire::source_unavailable))]
    SourceUnavailable {
        /// Which stage gave up
        source_kind: String,
        /// Why the stage gave up
        reason: String,
    },

    /// The source build failed.
    #[error("Build failed during {step}:\n{diagnostics}")]
    #[diagnostic(code(setup_agda::build::failed))]
    BuildFailure {
        /// Toolchain step (configure, build, install, ...)
        step: String,
        /// Captured toolchain output
        diagnostics: String,
    },

    /// The caller asked for something contradictory.
    #[error("Configuration conflict: {message}")]
    #[diagnostic(
        code(setup_agda::config::conflict),
        help("Drop either --force-build or --force-no-build")
    )]
    ConfigurationConflict {
        /// The error message describing the conflict
        message: String,
    },

    /// No GHC version satisfies both the declared and requested ranges.
    #[error(
        "No compatible GHC version: package declares [{}], requested '{requested}'",
        declared.join(", ")
    )]
    #[diagnostic(
        code(setup_agda::build::incompatible_toolchain),
        help("Widen --ghc-version-range or pick a different Agda version")
    )]
    IncompatibleToolchain {
        /// Versions declared by the package metadata
        declared: Vec<String>,
        /// The caller-supplied range
        requested: String,
    },

    /// A version string or range could not be parsed.
    #[error("Invalid version '{input}': {reason}")]
    #[diagnostic(code(setup_agda::version::invalid))]
    InvalidVersion {
        /// The offending input
        input: String,
        /// What is wrong with it
        reason: String,
    },

    /// Package metadata was missing or unusable.
    #[error("Metadata error: {message}")]
    #[diagnostic(code(setup_agda::metadata))]
    Metadata {
        /// The error message describing the metadata issue
        message: String,
    },

    /// Network access failed.
    #[error("Network error: {message}")]
    #[diagnostic(code(setup_agda::network))]
    Network {
        /// The error message describing the network failure
        message: String,
    },

    /// An external program could not be run or reported failure.
    #[error("Process '{program}' failed: {message}")]
    #[diagnostic(code(setup_agda::process))]
    Process {
        /// The program that was run
        program: String,
        /// The error message, usually captured stderr
        message: String,
    },

    /// I/O error with path context
    #[error("I/O error during {operation}: {source}")]
    #[diagnostic(code(setup_agda::io))]
    Io {
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
        /// The path where the I/O error occurred, if applicable
        path: Option<Box<std::path::Path>>,
        /// Description of the operation that failed
        operation: String,
    },
}

impl Error {
    /// Create a not-satisfiable error.
    #[must_use]
    pub fn not_satisfiable(descriptor: impl Into<String>, candidates: Vec<String>) -> Self {
        Self::NotSatisfiable {
            descriptor: descriptor.into(),
            candidates,
        }
    }

    /// Create a source-unavailable error.
    #[must_use]
    pub fn source_unavailable(source_kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SourceUnavailable {
            source_kind: source_kind.into(),
            reason: reason.into(),
        }
    }

    /// Create a build failure error.
    #[must_use]
    pub fn build_failure(step: impl Into<String>, diagnostics: impl Into<String>) -> Self {
        Self::BuildFailure {
            step: step.into(),
            diagnostics: diagnostics.into(),
        }
    }

    /// Create a configuration conflict error.
    #[must_use]
    pub fn configuration_conflict(message: impl Into<String>) -> Self {
        Self::ConfigurationConflict {
            message: message.into(),
        }
    }

    /// Create an incompatible toolchain error.
    #[must_use]
    pub fn incompatible_toolchain(declared: Vec<String>, requested: impl Into<String>) -> Self {
        Self::IncompatibleToolchain {
            declared,
            requested: requested.into(),
        }
    }

    /// Create an invalid version error.
    #[must_use]
    pub fn invalid_version(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidVersion {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a metadata error.
    #[must_use]
    pub fn metadata(message: impl Into<String>) -> Self {
        Self::Metadata {
            message: message.into(),
        }
    }

    /// Create a network error.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network {
            message: message.into(),
        }
    }

    /// Create a process error.
    #[must_use]
    pub fn process(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Process {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error with context.
    #[must_use]
    pub fn io(source: std::io::Error, path: Option<PathBuf>, operation: impl Into<String>) -> Self {
        Self::Io {
            source,
            path: path.map(|p| p.into_boxed_path()),
            operation: operation.into(),
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(source: std::io::Error) -> Self {
        Self::io(source, None, "unknown")
    }
}

/// Result type alias for setup-agda operations
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_satisfiable_lists_candidates() {
        let err = Error::not_satisfiable("2.7.9", vec!["2.6.1".into(), "2.6.2".into()]);
        let msg = err.to_string();
        assert!(msg.contains("2.7.9"));
        assert!(msg.contains("2.6.1, 2.6.2"));
    }

    #[test]
    fn test_incompatible_toolchain_lists_both_ranges() {
        let err = Error::incompatible_toolchain(vec!["8.6.5".into(), "8.10.7".into()], ">=9.2");
        let msg = err.to_string();
        assert!(msg.contains("8.6.5, 8.10.7"));
        assert!(msg.contains(">=9.2"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err = Error::from(io_error);
        assert!(err.to_string().contains("I/O error"));
        assert!(err.to_string().contains("gone"));
    }

    #[test]
    fn test_diagnostic_codes() {
        let err = Error::configuration_conflict("both flags");
        let code = err.code().map(|c| c.to_string());
        assert_eq!(code.as_deref(), Some("setup_agda::config::conflict"));
    }
}
