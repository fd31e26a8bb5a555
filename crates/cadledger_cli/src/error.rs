//! Error types for the CLI.

use cadledger_core::CoreError;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by CLI commands.
#[derive(Debug, Error)]
pub enum CliError {
    /// A file could not be read.
    #[error("cannot read {path}: {source}")]
    Io {
        /// The file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A script or configuration file is not valid JSON for its format.
    #[error("cannot parse {path}: {source}")]
    Parse {
        /// The file.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: serde_json::Error,
    },

    /// A script step was rejected by the session.
    #[error("step {index} ({op}) failed: {source}")]
    Step {
        /// One-based step number.
        index: usize,
        /// Step operation name.
        op: &'static str,
        /// Underlying error.
        #[source]
        source: CoreError,
    },

    /// A session operation failed outside a script.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Output could not be produced.
    #[error("cannot write output: {0}")]
    Output(#[from] serde_json::Error),

    /// Unknown output format.
    #[error("unknown output format '{0}' (expected text or json)")]
    Format(String),
}

impl CliError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn parse(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        Self::Parse {
            path: path.into(),
            source,
        }
    }
}
