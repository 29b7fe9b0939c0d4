//! Error types for device operations.
//!
//! Two layers are provided:
//!
//! - [`ErrorCode`] is the small, portable, `Copy` error kind that a device
//!   keeps as its sticky error flag. It mirrors the errno-style codes
//!   (`EREAD`, `EWRITE`, `EINVAL`, ...) that callers test for.
//! - [`DeviceError`] is the rich error carried through `Result`s inside the
//!   crate and returned by positioning, flushing and closing. It collapses
//!   to an [`ErrorCode`] with [`DeviceError::code`].

use std::fmt;
use std::io;
use thiserror::Error;

/// Result type for device operations.
pub type DeviceResult<T> = Result<T, DeviceError>;

/// Portable error kind stored on a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Read attempted in the wrong direction (`EREAD`).
    Read,
    /// Write attempted in the wrong direction (`EWRITE`).
    Write,
    /// Invalid argument or parameter (`EINVAL`).
    InvalidArgument,
    /// Allocation failed or the slot pool is exhausted (`ENOMEM`).
    OutOfMemory,
    /// A fixed-size buffer overflowed (`ENOBUFS`).
    NoBufferSpace,
    /// Malformed input reached a filter (`EBADMSG`).
    BadMessage,
    /// The backend does not implement the operation (`ENOTSUP`).
    Unsupported,
    /// A value does not fit the requested width (`EOVERFLOW`).
    Overflow,
    /// The device has been closed (`EBADF`).
    Closed,
    /// Exclusive creation found an existing target (`EEXIST`).
    Exists,
    /// Target not found (`ENOENT`).
    NotFound,
    /// Permission denied (`EACCES`).
    PermissionDenied,
    /// A timeout expired (`ETIMEDOUT`).
    TimedOut,
    /// The other end of a queue went away (`EPIPE`).
    BrokenPipe,
    /// Any other platform I/O error (`EIO` and friends).
    Io(io::ErrorKind),
}

impl ErrorCode {
    /// Returns the errno-style mnemonic for this code.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Read => "EREAD",
            Self::Write => "EWRITE",
            Self::InvalidArgument => "EINVAL",
            Self::OutOfMemory => "ENOMEM",
            Self::NoBufferSpace => "ENOBUFS",
            Self::BadMessage => "EBADMSG",
            Self::Unsupported => "ENOTSUP",
            Self::Overflow => "EOVERFLOW",
            Self::Closed => "EBADF",
            Self::Exists => "EEXIST",
            Self::NotFound => "ENOENT",
            Self::PermissionDenied => "EACCES",
            Self::TimedOut => "ETIMEDOUT",
            Self::BrokenPipe => "EPIPE",
            Self::Io(_) => "EIO",
        }
    }

    /// Converts this code into the closest `std::io::ErrorKind`.
    #[must_use]
    pub fn io_kind(self) -> io::ErrorKind {
        match self {
            Self::Read | Self::Write => io::ErrorKind::PermissionDenied,
            Self::InvalidArgument | Self::Overflow => io::ErrorKind::InvalidInput,
            Self::OutOfMemory => io::ErrorKind::OutOfMemory,
            Self::NoBufferSpace => io::ErrorKind::WriteZero,
            Self::BadMessage => io::ErrorKind::InvalidData,
            Self::Unsupported => io::ErrorKind::Unsupported,
            Self::Closed => io::ErrorKind::NotConnected,
            Self::Exists => io::ErrorKind::AlreadyExists,
            Self::NotFound => io::ErrorKind::NotFound,
            Self::PermissionDenied => io::ErrorKind::PermissionDenied,
            Self::TimedOut => io::ErrorKind::TimedOut,
            Self::BrokenPipe => io::ErrorKind::BrokenPipe,
            Self::Io(kind) => kind,
        }
    }
}

impl From<io::ErrorKind> for ErrorCode {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::AlreadyExists => Self::Exists,
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::TimedOut,
            io::ErrorKind::OutOfMemory => Self::OutOfMemory,
            io::ErrorKind::Unsupported => Self::Unsupported,
            io::ErrorKind::InvalidInput => Self::InvalidArgument,
            io::ErrorKind::InvalidData => Self::BadMessage,
            io::ErrorKind::BrokenPipe => Self::BrokenPipe,
            other => Self::Io(other),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(kind) => write!(f, "EIO ({kind})"),
            other => f.write_str(other.name()),
        }
    }
}

/// Errors that can occur during device operations.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// An I/O error from the operating system.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The device was not opened for reading.
    #[error("device not open for reading")]
    NotReadable,

    /// A read directly followed a write without a state switch.
    #[error("read after write without an intervening seek or flush")]
    ReadAfterWrite,

    /// The device was not opened for writing.
    #[error("device not open for writing")]
    NotWritable,

    /// A write directly followed a read without a state switch.
    #[error("write after read without an intervening seek")]
    WriteAfterRead,

    /// The mode string could not be parsed or is not valid for the backend.
    #[error("invalid mode {mode:?}: {message}")]
    InvalidMode {
        /// The offending mode string.
        mode: String,
        /// Why it was rejected.
        message: String,
    },

    /// A parameter was invalid.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the problem.
        message: String,
    },

    /// A seek target fell outside the device's addressable range.
    #[error("seek target {target} is outside the device range")]
    OutOfRange {
        /// The requested absolute target.
        target: i128,
    },

    /// Allocation failed.
    #[error("out of memory")]
    OutOfMemory,

    /// Every slot in a device pool is in use.
    #[error("device pool exhausted: all {capacity} slots in use")]
    PoolExhausted {
        /// Number of slots in the pool.
        capacity: usize,
    },

    /// A fixed-capacity buffer cannot accept more bytes.
    #[error("buffer full: capacity {capacity} bytes")]
    BufferFull {
        /// The buffer's capacity.
        capacity: usize,
    },

    /// A filter received data outside its expected alphabet or structure.
    #[error("malformed input at offset {offset}: {message}")]
    Malformed {
        /// Offset in the filter's input where the fault was detected.
        offset: u64,
        /// Description of the fault.
        message: String,
    },

    /// The backend does not implement the requested operation.
    #[error("{backend} device does not support {operation}")]
    Unsupported {
        /// Type name of the backend.
        backend: &'static str,
        /// The operation that was attempted.
        operation: &'static str,
    },

    /// A position does not fit in 32 bits.
    #[error("position {value} does not fit in 32 bits")]
    Overflow {
        /// The value that overflowed.
        value: i128,
    },

    /// The device is closed.
    #[error("device is closed")]
    Closed,

    /// A timeout expired.
    #[error("operation timed out")]
    TimedOut,

    /// The other end of a queue is gone.
    #[error("broken pipe: no peer is attached")]
    BrokenPipe,

    /// An inner device reported an error; its code is forwarded verbatim.
    #[error("inner device error: {0}")]
    Inner(ErrorCode),
}

impl DeviceError {
    /// Collapses this error into its portable code.
    #[must_use]
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Io(err) => ErrorCode::from(err.kind()),
            Self::NotReadable | Self::ReadAfterWrite => ErrorCode::Read,
            Self::NotWritable | Self::WriteAfterRead => ErrorCode::Write,
            Self::InvalidMode { .. } | Self::InvalidArgument { .. } | Self::OutOfRange { .. } => {
                ErrorCode::InvalidArgument
            }
            Self::OutOfMemory | Self::PoolExhausted { .. } => ErrorCode::OutOfMemory,
            Self::BufferFull { .. } => ErrorCode::NoBufferSpace,
            Self::Malformed { .. } => ErrorCode::BadMessage,
            Self::Unsupported { .. } => ErrorCode::Unsupported,
            Self::Overflow { .. } => ErrorCode::Overflow,
            Self::Closed => ErrorCode::Closed,
            Self::TimedOut => ErrorCode::TimedOut,
            Self::BrokenPipe => ErrorCode::BrokenPipe,
            Self::Inner(code) => *code,
        }
    }

    /// Returns true if this error means "the backend lacks this capability".
    #[must_use]
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Creates an invalid mode error.
    pub fn invalid_mode(mode: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidMode {
            mode: mode.into(),
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a malformed input error.
    pub fn malformed(offset: u64, message: impl Into<String>) -> Self {
        Self::Malformed {
            offset,
            message: message.into(),
        }
    }

    /// Creates an unsupported operation error.
    pub fn unsupported(backend: &'static str, operation: &'static str) -> Self {
        Self::Unsupported { backend, operation }
    }

    /// Creates a buffer full error.
    pub fn buffer_full(capacity: usize) -> Self {
        Self::BufferFull { capacity }
    }

    /// Creates an out-of-range seek error.
    pub fn out_of_range(target: impl Into<i128>) -> Self {
        Self::OutOfRange {
            target: target.into(),
        }
    }

    /// Creates a 32-bit overflow error.
    pub fn overflow(value: impl Into<i128>) -> Self {
        Self::Overflow {
            value: value.into(),
        }
    }
}

impl From<ErrorCode> for DeviceError {
    fn from(code: ErrorCode) -> Self {
        Self::Inner(code)
    }
}

impl From<DeviceError> for io::Error {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Io(err) => err,
            other => io::Error::new(other.code().io_kind(), other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_errors_map_to_read_and_write_codes() {
        assert_eq!(DeviceError::NotReadable.code(), ErrorCode::Read);
        assert_eq!(DeviceError::ReadAfterWrite.code(), ErrorCode::Read);
        assert_eq!(DeviceError::NotWritable.code(), ErrorCode::Write);
        assert_eq!(DeviceError::WriteAfterRead.code(), ErrorCode::Write);
    }

    #[test]
    fn inner_error_passes_code_through() {
        let err = DeviceError::Inner(ErrorCode::BadMessage);
        assert_eq!(err.code(), ErrorCode::BadMessage);
        assert!(err.to_string().contains("EBADMSG"));
    }

    #[test]
    fn io_error_kinds_map_to_portable_codes() {
        let err: DeviceError = io::Error::new(io::ErrorKind::NotFound, "missing").into();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err: DeviceError = io::Error::new(io::ErrorKind::Interrupted, "eintr").into();
        assert_eq!(err.code(), ErrorCode::Io(io::ErrorKind::Interrupted));
    }

    #[test]
    fn error_display() {
        let err = DeviceError::unsupported("cstring", "write");
        assert_eq!(err.to_string(), "cstring device does not support write");

        let err = DeviceError::malformed(4, "invalid hex digit");
        assert!(err.to_string().contains("offset 4"));

        assert_eq!(ErrorCode::NoBufferSpace.to_string(), "ENOBUFS");
    }

    #[test]
    fn converts_into_io_error_with_matching_kind() {
        let io_err: io::Error = DeviceError::buffer_full(2).into();
        assert_eq!(io_err.kind(), io::ErrorKind::WriteZero);

        let io_err: io::Error = DeviceError::malformed(0, "bad").into();
        assert_eq!(io_err.kind(), io::ErrorKind::InvalidData);
    }
}
