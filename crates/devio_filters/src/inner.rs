//! Access to the device a filter wraps.

use devio_core::{Device, DeviceError, DeviceHandle, DeviceResult, Whence};

/// Upper bound on one transfer from or to an inner device.
pub(crate) const TRANSFER_SIZE: usize = 4096;

/// A filter's reference to the device underneath it.
///
/// Every call locks the inner device for its duration only. Errors already
/// latched on the inner device come back as `DeviceError::Inner` so their
/// code survives the trip through the filter unchanged.
#[derive(Debug, Clone)]
pub(crate) struct Inner {
    handle: DeviceHandle,
}

impl Inner {
    pub(crate) fn new(handle: &DeviceHandle) -> Self {
        Self {
            handle: handle.clone(),
        }
    }

    /// Reads until `buf` is full or the inner device stops. `Ok(0)` is EOF.
    pub(crate) fn read(&self, buf: &mut [u8]) -> DeviceResult<usize> {
        self.handle.lock().try_read(buf)
    }

    pub(crate) fn write(&self, buf: &[u8]) -> DeviceResult<usize> {
        self.handle.lock().try_write(buf)
    }

    pub(crate) fn write_all(&self, buf: &[u8]) -> DeviceResult<()> {
        if buf.is_empty() {
            return Ok(());
        }
        self.handle.lock().write_exact(buf)
    }

    pub(crate) fn flush(&self) -> DeviceResult<()> {
        self.handle.lock().flush()
    }

    pub(crate) fn seek_to(&self, offset: u64) -> DeviceResult<()> {
        let offset = i64::try_from(offset).map_err(|_| DeviceError::out_of_range(offset))?;
        self.handle.lock().seek(offset, Whence::Start)
    }

    pub(crate) fn tell(&self) -> DeviceResult<u64> {
        self.handle.lock().tell()
    }

    pub(crate) fn size(&self) -> DeviceResult<u64> {
        self.handle.lock().size()
    }

    pub(crate) fn eof(&self) -> bool {
        self.handle.lock().eof()
    }

    pub(crate) fn with<R>(&self, f: impl FnOnce(&mut Device) -> R) -> R {
        f(&mut self.handle.lock())
    }
}

/// Resolves a seek against a logical position and an optional length.
pub(crate) fn resolve_target(
    offset: i64,
    whence: Whence,
    position: u64,
    len: impl FnOnce() -> DeviceResult<u64>,
) -> DeviceResult<u64> {
    let base = match whence {
        Whence::Start => 0,
        Whence::Current => i128::from(position),
        Whence::End => i128::from(len()?),
    };
    let target = base + i128::from(offset);
    u64::try_from(target).map_err(|_| DeviceError::out_of_range(target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use devio_core::{ErrorCode, Growth};

    #[test]
    fn inner_errors_keep_their_code() {
        let device = Device::open_cstring("abc", "r").unwrap();
        let handle = device.into_handle();
        let inner = Inner::new(&handle);

        assert!(inner.write(b"x").is_err());
        let mut buf = [0u8; 2];
        match inner.read(&mut buf) {
            Err(DeviceError::Inner(code)) => assert_eq!(code, ErrorCode::Write),
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn seek_and_tell_pass_through() {
        let handle = Device::open_dynamic(Growth::Minimal, "w+").unwrap().into_handle();
        let inner = Inner::new(&handle);
        inner.write_all(b"hello").unwrap();
        assert_eq!(inner.tell().unwrap(), 5);
        inner.seek_to(1).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(inner.read(&mut buf).unwrap(), 4);
        assert_eq!(&buf, b"ello");
        assert_eq!(inner.size().unwrap(), 5);
    }

    #[test]
    fn resolve_target_rejects_negative() {
        assert_eq!(resolve_target(2, Whence::Current, 3, || Ok(0)).unwrap(), 5);
        assert_eq!(resolve_target(-1, Whence::End, 0, || Ok(10)).unwrap(), 9);
        assert!(resolve_target(-4, Whence::Current, 3, || Ok(0)).is_err());
    }
}
