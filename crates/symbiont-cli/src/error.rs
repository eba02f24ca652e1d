//! CLI error types.

use std::path::PathBuf;

use symbiont_market::{MarketError, StoreError};
use thiserror::Error;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// The marketplace rejected the operation.
    #[error(transparent)]
    Market(#[from] MarketError),

    /// The data directory could not be opened.
    #[error("cannot open data directory: {0}")]
    Store(#[from] StoreError),

    /// An input file could not be read or parsed.
    #[error("cannot read {}: {message}", .path.display())]
    InputFile {
        /// File involved.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// Invalid argument.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Output formatting error.
    #[error("format error: {0}")]
    Format(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
