//! Write splitter duplicating a stream into two devices.

use crate::inner::Inner;
use devio_core::{Backend, Device, DeviceError, DeviceHandle, DeviceResult, ErrorCode, OpenMode};

/// Backend writing every byte to both `lhs` and `rhs`.
#[derive(Debug)]
pub struct Tee {
    lhs: Inner,
    rhs: Inner,
    failed: Option<ErrorCode>,
    position: u64,
}

impl Tee {
    /// Creates a splitter over two sinks.
    #[must_use]
    pub fn new(lhs: &DeviceHandle, rhs: &DeviceHandle) -> Self {
        Self {
            lhs: Inner::new(lhs),
            rhs: Inner::new(rhs),
            failed: None,
            position: 0,
        }
    }
}

impl Backend for Tee {
    fn what(&self) -> &'static str {
        "tee"
    }

    fn open(&mut self, mode: &OpenMode) -> DeviceResult<()> {
        mode.require_write_only("tee")
    }

    fn write(&mut self, buf: &[u8]) -> DeviceResult<usize> {
        if let Some(code) = self.failed {
            return Err(DeviceError::Inner(code));
        }
        let left = self.lhs.write(buf);
        let right = self.rhs.write(buf);
        let (left, right) = match (left, right) {
            (Err(err), _) | (_, Err(err)) => return Err(err),
            (Ok(left), Ok(right)) => (left, right),
        };

        if left != right {
            // The short side has its error latched; report it next call so
            // the longer side is not written twice.
            let short = if left < right { &self.lhs } else { &self.rhs };
            self.failed = Some(short.with(|device| device.error()).unwrap_or(ErrorCode::Write));
        }
        let n = left.min(right);
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> DeviceResult<()> {
        let lhs = self.lhs.flush();
        let rhs = self.rhs.flush();
        lhs.and(rhs)
    }

    fn clear_error(&mut self) {
        self.failed = None;
    }

    fn tell64(&mut self) -> DeviceResult<u64> {
        Ok(self.position)
    }
}

/// Opens a write-only device copying everything to `lhs` and `rhs`.
///
/// A write returns the shorter of the two transfers. When both sides fail,
/// the error from `lhs` is the one reported.
///
/// # Errors
///
/// Returns `InvalidMode` unless `mode` is write-only.
pub fn tee(lhs: &DeviceHandle, rhs: &DeviceHandle, mode: &str) -> DeviceResult<Device> {
    Device::open_custom(Tee::new(lhs, rhs), mode)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sized(capacity: usize) -> DeviceHandle {
        Device::open_sized(vec![0u8; capacity], "w").unwrap().into_handle()
    }

    #[test]
    fn writes_reach_both_sides() {
        let lhs = sized(2);
        let rhs = sized(2);
        let mut split = tee(&lhs, &rhs, "w").unwrap();
        assert_eq!(split.write(b"XY"), 2);
        assert_eq!(split.tell().unwrap(), 2);
        split.close().unwrap();

        assert_eq!(lhs.lock().contents().unwrap(), b"XY");
        assert_eq!(rhs.lock().contents().unwrap(), b"XY");
    }

    #[test]
    fn returns_the_shorter_transfer() {
        let lhs = sized(4);
        let rhs = sized(2);
        let mut split = tee(&lhs, &rhs, "w").unwrap();
        assert_eq!(split.write(b"abcd"), 2);
        assert_eq!(split.error(), Some(ErrorCode::NoBufferSpace));
        assert_eq!(lhs.lock().contents().unwrap(), b"abcd");
        assert_eq!(rhs.lock().contents().unwrap(), b"ab");
    }

    #[test]
    fn lhs_error_wins() {
        let lhs = Device::open_cstring("ro", "r").unwrap().into_handle();
        let rhs = Device::open_sized(Vec::new(), "w").unwrap().into_handle();
        let mut split = tee(&lhs, &rhs, "w").unwrap();
        assert_eq!(split.write(b"z"), 0);
        assert_eq!(split.error(), Some(ErrorCode::Write));
    }

    #[test]
    fn rejects_readable_modes() {
        let lhs = sized(1);
        let rhs = sized(1);
        assert!(tee(&lhs, &rhs, "r").is_err());
        assert!(tee(&lhs, &rhs, "w+").is_err());
    }
}
