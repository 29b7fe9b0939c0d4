//! Endless source of operating-system randomness.

use devio_core::{Backend, Device, DeviceError, DeviceResult, OpenMode};
use rand::rngs::OsRng;
use rand::RngCore;
use std::io;

/// Read-only backend filling every read from the OS CSPRNG.
#[derive(Debug, Default)]
pub struct RandomSource;

impl Backend for RandomSource {
    fn what(&self) -> &'static str {
        "random"
    }

    fn open(&mut self, mode: &OpenMode) -> DeviceResult<()> {
        mode.require_read_only(self.what())
    }

    fn read(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|err| DeviceError::Io(io::Error::other(err)))?;
        Ok(buf.len())
    }
}

/// Opens a read-only device that never reaches end of stream.
///
/// # Errors
///
/// Returns `InvalidMode` unless `mode` is read-only.
///
/// # Example
///
/// ```rust
/// use devio_filters::random;
///
/// let mut source = random("r").unwrap();
/// let mut key = [0u8; 32];
/// assert_eq!(source.read(&mut key), 32);
/// ```
pub fn random(mode: &str) -> DeviceResult<Device> {
    Device::open_custom(RandomSource, mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fills_whole_reads() {
        let mut source = random("r").unwrap();
        let mut a = [0u8; 64];
        let mut b = [0u8; 64];
        assert_eq!(source.read(&mut a), 64);
        assert_eq!(source.read(&mut b), 64);
        assert_ne!(a, b);
        assert!(!source.eof());
    }

    #[test]
    fn is_read_only() {
        assert!(random("w").is_err());
        assert!(random("r+").is_err());
        let mut source = random("r").unwrap();
        assert_eq!(source.write(b"x"), 0);
        assert!(source.error().is_some());
    }
}
