//! Backend trait definition.

use crate::error::{DeviceError, DeviceResult};
use crate::flags::DeviceFlags;
use crate::mode::OpenMode;
use std::any::Any;
use std::fmt;
use std::time::Duration;

/// Origin of a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// Relative to the start of the stream (`SEEK_SET`).
    Start,
    /// Relative to the current position (`SEEK_CUR`).
    Current,
    /// Relative to the end of the stream (`SEEK_END`).
    End,
}

/// Which half of a duplex device to shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shutdown {
    /// Stop reading.
    Read,
    /// Stop writing.
    Write,
    /// Stop both.
    Both,
}

/// Tag identifying the family a backend belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    /// A file opened by path.
    File,
    /// A wrapped native file handle.
    NativeFile,
    /// A read-only NUL-terminated byte string.
    CString,
    /// A fixed-capacity memory buffer.
    SizedBuffer,
    /// A growable memory buffer.
    DynamicBuffer,
    /// A device that yields nothing and discards writes.
    Empty,
    /// A user-provided backend, including every filter.
    Custom,
}

impl DeviceKind {
    /// Returns true if an attached transfer buffer is allowed.
    #[must_use]
    pub const fn supports_buffering(self) -> bool {
        matches!(self, Self::File | Self::NativeFile | Self::Custom)
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::File => "file",
            Self::NativeFile => "native_file",
            Self::CString => "cstring",
            Self::SizedBuffer => "sized_buffer",
            Self::DynamicBuffer => "dynamic_buffer",
            Self::Empty => "empty",
            Self::Custom => "custom",
        };
        f.write_str(name)
    }
}

/// Upcast helper so boxed backends can be downcast to their concrete type.
pub trait AsAny: Any {
    /// Returns `self` as `&dyn Any`.
    fn as_any(&self) -> &dyn Any;
    /// Returns `self` as `&mut dyn Any`.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The dispatch table behind every [`crate::Device`].
///
/// A backend is a raw byte source and/or sink. The device core owns mode
/// checking, direction discipline, text translation, buffering and the unget
/// stack; backends only move bytes and report positions.
///
/// Every method has a default. The capability defaults return
/// [`DeviceError::Unsupported`], so a backend implements only what it can do
/// and the core fails gracefully for the rest.
///
/// # Read and write protocol
///
/// - `read` returns `Ok(0)` only at end of stream. A short `Ok(n)` is allowed;
///   the core keeps calling until the request is satisfied.
/// - `write` returns how many bytes were accepted. A backend that fails part
///   way through returns the accepted count first and the error on the next
///   call, so the caller sees an exact short count.
///
/// # Positioning
///
/// Backends may implement the 64-bit entries, the 32-bit entries, or both.
/// The core widens or narrows as needed. Seek entries return the new
/// absolute position.
///
/// # Implementors
///
/// - [`crate::FileBackend`] for paths and native handles
/// - [`crate::SizedBuffer`] and [`crate::DynamicBuffer`]
/// - [`crate::CStringBackend`] and [`crate::EmptyBackend`]
/// - [`crate::Callbacks`] and every filter
pub trait Backend: AsAny + Send {
    /// Returns the backend family.
    fn kind(&self) -> DeviceKind {
        DeviceKind::Custom
    }

    /// Returns the backend's type name, used in errors and `Device::what`.
    fn what(&self) -> &'static str {
        "custom"
    }

    /// Validates and applies the parsed mode. Called once, before any I/O.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` if the backend cannot honor the mode.
    fn open(&mut self, _mode: &OpenMode) -> DeviceResult<()> {
        Ok(())
    }

    /// Reads into `buf`, returning the number of bytes read. `Ok(0)` is EOF.
    ///
    /// # Errors
    ///
    /// Returns an error if no bytes could be read.
    fn read(&mut self, _buf: &mut [u8]) -> DeviceResult<usize> {
        Err(DeviceError::unsupported(self.what(), "read"))
    }

    /// Writes from `buf`, returning the number of bytes accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if no bytes could be written.
    fn write(&mut self, _buf: &[u8]) -> DeviceResult<usize> {
        Err(DeviceError::unsupported(self.what(), "write"))
    }

    /// Pushes pending output downstream, or realigns a read-side lookahead.
    ///
    /// # Errors
    ///
    /// Returns an error if pending output cannot be delivered.
    fn flush(&mut self) -> DeviceResult<()> {
        Ok(())
    }

    /// Finalizes the stream. Called exactly once.
    ///
    /// # Errors
    ///
    /// Returns an error if finalization fails.
    fn close(&mut self) -> DeviceResult<()> {
        Ok(())
    }

    /// Notification that the device's sticky flags were cleared.
    fn clear_error(&mut self) {}

    /// Notification of a zero-offset `Current` seek.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot pivot direction.
    fn state_switch(&mut self) -> DeviceResult<()> {
        Ok(())
    }

    /// Shuts down one or both halves of a duplex device.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` unless overridden.
    fn shutdown(&mut self, _how: Shutdown) -> DeviceResult<()> {
        Err(DeviceError::unsupported(self.what(), "shutdown"))
    }

    /// Returns the current position as a 32-bit value.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` unless overridden.
    fn tell32(&mut self) -> DeviceResult<i32> {
        Err(DeviceError::unsupported(self.what(), "tell"))
    }

    /// Returns the current position.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` unless overridden.
    fn tell64(&mut self) -> DeviceResult<u64> {
        Err(DeviceError::unsupported(self.what(), "tell"))
    }

    /// Moves to a new position using a 32-bit offset.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` unless overridden.
    fn seek32(&mut self, _offset: i32, _whence: Whence) -> DeviceResult<i32> {
        Err(DeviceError::unsupported(self.what(), "seek"))
    }

    /// Moves to a new position.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` unless overridden.
    fn seek64(&mut self, _offset: i64, _whence: Whence) -> DeviceResult<u64> {
        Err(DeviceError::unsupported(self.what(), "seek"))
    }

    /// Backend-specific status bits merged into `Device::flags`.
    fn flags(&self) -> DeviceFlags {
        DeviceFlags::empty()
    }

    /// Notification that the device's timeouts changed.
    fn set_timeouts(&mut self, _read: Option<Duration>, _write: Option<Duration>) {}
}

/// Resolves a seek request against a stream of known length.
///
/// Shared by the backends that keep a plain cursor over a byte range.
///
/// # Errors
///
/// Returns `OutOfRange` if the target is negative or past `max`.
pub fn resolve_seek(
    offset: i64,
    whence: Whence,
    position: u64,
    len: u64,
    max: u64,
) -> DeviceResult<u64> {
    let base = match whence {
        Whence::Start => 0,
        Whence::Current => i128::from(position),
        Whence::End => i128::from(len),
    };
    let target = base + i128::from(offset);
    if target < 0 || target > i128::from(max) {
        return Err(DeviceError::out_of_range(target));
    }
    u64::try_from(target).map_err(|_| DeviceError::out_of_range(target))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bare;

    impl Backend for Bare {}

    #[test]
    fn defaults_report_unsupported() {
        let mut backend = Bare;
        let mut buf = [0u8; 4];
        assert!(backend.read(&mut buf).unwrap_err().is_unsupported());
        assert!(backend.write(b"x").unwrap_err().is_unsupported());
        assert!(backend.seek64(0, Whence::Start).unwrap_err().is_unsupported());
        assert!(backend.tell32().unwrap_err().is_unsupported());
        assert!(backend.shutdown(Shutdown::Both).unwrap_err().is_unsupported());
        assert!(backend.flush().is_ok());
        assert!(backend.close().is_ok());
        assert_eq!(backend.kind(), DeviceKind::Custom);
    }

    #[test]
    fn downcast_through_trait_object() {
        let boxed: Box<dyn Backend> = Box::new(Bare);
        let backend: &dyn Backend = boxed.as_ref();
        assert!(backend.as_any().downcast_ref::<Bare>().is_some());
    }

    #[test]
    fn resolve_seek_bounds() {
        assert_eq!(resolve_seek(3, Whence::Start, 0, 10, 10).unwrap(), 3);
        assert_eq!(resolve_seek(-2, Whence::End, 0, 10, 10).unwrap(), 8);
        assert_eq!(resolve_seek(2, Whence::Current, 5, 10, 10).unwrap(), 7);
        assert!(resolve_seek(-1, Whence::Start, 0, 10, 10).is_err());
        assert!(resolve_seek(11, Whence::Start, 0, 10, 10).is_err());
    }

    #[test]
    fn buffering_allowed_for_native_kinds_only() {
        assert!(DeviceKind::File.supports_buffering());
        assert!(DeviceKind::Custom.supports_buffering());
        assert!(!DeviceKind::SizedBuffer.supports_buffering());
    }
}
