//! Window filter exposing a byte range of another device.

use crate::inner::{resolve_target, Inner, TRANSFER_SIZE};
use devio_core::{Backend, Device, DeviceError, DeviceHandle, DeviceResult, OpenMode, Whence};
use tracing::trace;

/// Backend restricting access to `[offset, offset + length)` of its inner device.
#[derive(Debug)]
pub struct Limiter {
    inner: Inner,
    start: u64,
    length: u64,
    position: u64,
    seekable: bool,
}

impl Limiter {
    /// Creates a limiter over the window starting at `offset`.
    #[must_use]
    pub fn new(inner: &DeviceHandle, offset: u64, length: u64) -> Self {
        Self {
            inner: Inner::new(inner),
            start: offset,
            length,
            position: 0,
            seekable: false,
        }
    }

    fn remaining(&self) -> u64 {
        self.length.saturating_sub(self.position)
    }

    /// Moves the inner device to the limiter's position.
    fn sync(&self) -> DeviceResult<()> {
        if self.seekable {
            self.inner.seek_to(self.start + self.position)?;
        }
        Ok(())
    }

    fn skip_forward(&mut self) -> DeviceResult<()> {
        let mut left = self.start;
        let mut scratch = vec![0u8; TRANSFER_SIZE];
        while left > 0 {
            let step = usize::try_from(left.min(TRANSFER_SIZE as u64)).unwrap_or(TRANSFER_SIZE);
            let n = self.inner.read(&mut scratch[..step])?;
            if n == 0 {
                // The window starts past the end: leave nothing to read.
                self.length = 0;
                break;
            }
            left -= n as u64;
        }
        trace!(skipped = self.start - left, "limiter skipped forward");
        Ok(())
    }
}

impl Backend for Limiter {
    fn what(&self) -> &'static str {
        "limit"
    }

    fn open(&mut self, mode: &OpenMode) -> DeviceResult<()> {
        self.seekable = self.inner.seek_to(self.start).is_ok();
        if !self.seekable && mode.read {
            self.skip_forward()?;
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        let n = usize::try_from(self.remaining()).map_or(buf.len(), |rest| rest.min(buf.len()));
        if n == 0 {
            return Ok(0);
        }
        self.sync()?;
        let read = self.inner.read(&mut buf[..n])?;
        self.position += read as u64;
        Ok(read)
    }

    fn write(&mut self, buf: &[u8]) -> DeviceResult<usize> {
        let n = usize::try_from(self.remaining()).map_or(buf.len(), |rest| rest.min(buf.len()));
        if n == 0 {
            let capacity = usize::try_from(self.length).unwrap_or(usize::MAX);
            return Err(DeviceError::buffer_full(capacity));
        }
        self.sync()?;
        let written = self.inner.write(&buf[..n])?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> DeviceResult<()> {
        self.inner.flush()
    }

    fn state_switch(&mut self) -> DeviceResult<()> {
        self.inner.with(|device| device.seek(0, Whence::Current))
    }

    fn tell64(&mut self) -> DeviceResult<u64> {
        Ok(self.position)
    }

    fn seek64(&mut self, offset: i64, whence: Whence) -> DeviceResult<u64> {
        let length = self.length;
        let target = resolve_target(offset, whence, self.position, || Ok(length))
            .ok()
            .filter(|target| *target <= length)
            .ok_or_else(|| {
                DeviceError::invalid_argument(format!("seek outside the {length}-byte window"))
            })?;
        if !self.seekable {
            return Err(DeviceError::unsupported(self.what(), "seek"));
        }
        self.position = target;
        Ok(target)
    }
}

/// Opens a device limited to `length` bytes of `inner` starting at `offset`.
///
/// Reads stop at the end of the window and writes past it fail with
/// `BufferFull`. When `inner` cannot seek, a reading limiter skips to
/// `offset` by reading and discarding.
///
/// # Errors
///
/// Returns `InvalidMode` for a malformed mode, or the inner device's error
/// while skipping forward.
///
/// # Example
///
/// ```rust
/// use devio_core::Device;
/// use devio_filters::limit;
///
/// let inner = Device::open_cstring("0123456789", "r").unwrap().into_handle();
/// let mut window = limit(&inner, 2, 3, "r").unwrap();
/// let mut out = [0u8; 8];
/// assert_eq!(window.read(&mut out), 3);
/// assert_eq!(&out[..3], b"234");
/// ```
pub fn limit(inner: &DeviceHandle, offset: u64, length: u64, mode: &str) -> DeviceResult<Device> {
    Device::open_custom(Limiter::new(inner, offset, length), mode)
}
