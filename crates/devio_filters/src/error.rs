//! Error types for filter construction.
//!
//! Filters report stream-time faults as [`DeviceError`]s like every other
//! backend. [`FilterError`] covers parameter validation when a filter is
//! built, and converts into a `DeviceError` at the open boundary.

use devio_core::DeviceError;
use thiserror::Error;

/// Result type for filter parameter validation.
pub type FilterResult<T> = Result<T, FilterError>;

/// Errors in filter parameters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    /// Block size outside `1..=255`.
    #[error("invalid block size {size}: must be between 1 and 255")]
    InvalidBlockSize {
        /// The rejected size.
        size: usize,
    },

    /// AES key of the wrong length.
    #[error("invalid key length {len}: must be 16, 24 or 32 bytes")]
    InvalidKeyLength {
        /// The rejected length.
        len: usize,
    },

    /// AES IV of the wrong length.
    #[error("invalid IV length {len}: must be 16 bytes")]
    InvalidIvLength {
        /// The rejected length.
        len: usize,
    },

    /// A custom base64 alphabet is not 64 distinct symbols.
    #[error("invalid base64 alphabet: {message}")]
    InvalidAlphabet {
        /// Description of the problem.
        message: String,
    },

    /// The cipher mode is not implemented.
    #[error("cipher mode {mode} is not supported")]
    UnsupportedCipherMode {
        /// Name of the mode.
        mode: &'static str,
    },

    /// Compression level outside `0..=9`.
    #[error("invalid compression level {level}: must be between 0 and 9")]
    InvalidLevel {
        /// The rejected level.
        level: u32,
    },

    /// A range or count parameter is unusable.
    #[error("invalid range: {message}")]
    InvalidRange {
        /// Description of the problem.
        message: String,
    },
}

impl FilterError {
    /// Create an invalid alphabet error.
    pub fn invalid_alphabet(message: impl Into<String>) -> Self {
        Self::InvalidAlphabet {
            message: message.into(),
        }
    }

    /// Create an invalid range error.
    pub fn invalid_range(message: impl Into<String>) -> Self {
        Self::InvalidRange {
            message: message.into(),
        }
    }
}

impl From<FilterError> for DeviceError {
    fn from(err: FilterError) -> Self {
        match err {
            FilterError::UnsupportedCipherMode { mode } => DeviceError::unsupported("aes", mode),
            other => DeviceError::invalid_argument(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devio_core::ErrorCode;

    #[test]
    fn error_display() {
        let err = FilterError::InvalidBlockSize { size: 256 };
        assert_eq!(
            err.to_string(),
            "invalid block size 256: must be between 1 and 255"
        );

        let err = FilterError::InvalidKeyLength { len: 7 };
        assert!(err.to_string().contains('7'));
    }

    #[test]
    fn converts_to_device_error_codes() {
        let err: DeviceError = FilterError::InvalidIvLength { len: 3 }.into();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);

        let err: DeviceError = FilterError::UnsupportedCipherMode { mode: "CTR" }.into();
        assert_eq!(err.code(), ErrorCode::Unsupported);
    }
}
