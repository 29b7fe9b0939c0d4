//! Error types for the CLI.

use devio_core::{DeviceError, ErrorCode};
use devio_filters::FilterError;
use thiserror::Error;

/// Result type for command execution.
pub type CliResult<T> = Result<T, CliError>;

/// Errors a command can fail with.
#[derive(Debug, Error)]
pub enum CliError {
    /// A device operation failed.
    #[error(transparent)]
    Device(#[from] DeviceError),

    /// A filter rejected its configuration.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// A device in the chain latched an error mid-transfer.
    #[error("{stage} failed after {bytes} bytes: {code}")]
    Transfer {
        /// Which end of the pipe failed.
        stage: &'static str,
        /// Bytes moved before the failure.
        bytes: u64,
        /// The latched error code.
        code: ErrorCode,
    },

    /// A hex-encoded argument did not decode.
    #[error("invalid hex in --{argument}")]
    InvalidHex {
        /// The offending argument's name.
        argument: &'static str,
    },
}

impl CliError {
    /// Create a transfer error.
    pub fn transfer(stage: &'static str, bytes: u64, code: ErrorCode) -> Self {
        Self::Transfer { stage, bytes, code }
    }
}
