//! Read-only NUL-terminated string backend.

use crate::backend::{Backend, DeviceKind, Whence};
use crate::device::Device;
use crate::error::{DeviceError, DeviceResult};
use crate::mode::OpenMode;

/// Reads a byte string up to its first NUL.
///
/// Only the 32-bit positioning entries are implemented; the device core
/// widens them for 64-bit callers.
#[derive(Debug)]
pub struct CStringBackend {
    data: Vec<u8>,
    pos: usize,
}

impl CStringBackend {
    /// Creates a reader over `bytes`, truncated at the first NUL.
    #[must_use]
    pub fn new(mut bytes: Vec<u8>) -> Self {
        if let Some(end) = bytes.iter().position(|&b| b == 0) {
            bytes.truncate(end);
        }
        Self {
            data: bytes,
            pos: 0,
        }
    }
}

impl Backend for CStringBackend {
    fn kind(&self) -> DeviceKind {
        DeviceKind::CString
    }

    fn what(&self) -> &'static str {
        "cstring"
    }

    fn open(&mut self, mode: &OpenMode) -> DeviceResult<()> {
        mode.require_read_only(self.what())
    }

    fn read(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        let rest = &self.data[self.pos..];
        let n = buf.len().min(rest.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.pos += n;
        Ok(n)
    }

    fn tell32(&mut self) -> DeviceResult<i32> {
        i32::try_from(self.pos).map_err(|_| DeviceError::overflow(self.pos as u64))
    }

    fn seek32(&mut self, offset: i32, whence: Whence) -> DeviceResult<i32> {
        let len = self.data.len() as i64;
        let base = match whence {
            Whence::Start => 0,
            Whence::Current => self.pos as i64,
            Whence::End => len,
        };
        let target = base + i64::from(offset);
        if !(0..=len).contains(&target) {
            return Err(DeviceError::out_of_range(target));
        }
        self.pos = target as usize;
        i32::try_from(target).map_err(|_| DeviceError::overflow(target))
    }
}

impl Device {
    /// Opens a read-only device over a NUL-terminated byte string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` if the mode is writable.
    pub fn open_cstring(bytes: impl Into<Vec<u8>>, mode: &str) -> DeviceResult<Self> {
        Self::open_backend(Box::new(CStringBackend::new(bytes.into())), mode)
    }
}
