//! A device with no content.

use crate::backend::{Backend, DeviceKind, Whence};
use crate::device::Device;
use crate::error::{DeviceError, DeviceResult};

/// Reads are immediately EOF; writes are accepted and discarded.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyBackend;

impl Backend for EmptyBackend {
    fn kind(&self) -> DeviceKind {
        DeviceKind::Empty
    }

    fn what(&self) -> &'static str {
        "empty"
    }

    fn read(&mut self, _buf: &mut [u8]) -> DeviceResult<usize> {
        Ok(0)
    }

    fn write(&mut self, buf: &[u8]) -> DeviceResult<usize> {
        Ok(buf.len())
    }

    fn tell64(&mut self) -> DeviceResult<u64> {
        Ok(0)
    }

    fn seek64(&mut self, offset: i64, _whence: Whence) -> DeviceResult<u64> {
        if offset == 0 {
            Ok(0)
        } else {
            Err(DeviceError::out_of_range(offset))
        }
    }
}

impl Device {
    /// Opens an empty device.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` for a malformed mode.
    pub fn open_empty(mode: &str) -> DeviceResult<Self> {
        Self::open_backend(Box::new(EmptyBackend), mode)
    }
}
