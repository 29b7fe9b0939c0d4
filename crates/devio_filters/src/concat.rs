//! Concatenation of two devices into one stream.

use crate::inner::{resolve_target, Inner};
use devio_core::{
    Backend, Device, DeviceError, DeviceHandle, DeviceResult, ErrorCode, OpenMode, Whence,
};
use tracing::trace;

/// Backend presenting `lhs` followed by `rhs`.
#[derive(Debug)]
pub struct Concat {
    lhs: Inner,
    rhs: Inner,
    lhs_origin: Option<u64>,
    rhs_origin: Option<u64>,
    lhs_len: Option<u64>,
    on_rhs: bool,
    position: u64,
}

impl Concat {
    /// Creates a concatenation of `lhs` then `rhs`.
    #[must_use]
    pub fn new(lhs: &DeviceHandle, rhs: &DeviceHandle) -> Self {
        Self {
            lhs: Inner::new(lhs),
            rhs: Inner::new(rhs),
            lhs_origin: None,
            rhs_origin: None,
            lhs_len: None,
            on_rhs: false,
            position: 0,
        }
    }

    fn switch_to_rhs(&mut self) {
        if !self.on_rhs {
            self.on_rhs = true;
            self.lhs_len.get_or_insert(self.position);
            trace!(lhs_len = self.position, "concat switched to rhs");
        }
    }

    fn seekable(&self) -> Option<(u64, u64, u64)> {
        Some((self.lhs_origin?, self.rhs_origin?, self.lhs_len?))
    }
}

impl Backend for Concat {
    fn what(&self) -> &'static str {
        "concat"
    }

    fn open(&mut self, _mode: &OpenMode) -> DeviceResult<()> {
        self.lhs_origin = self.lhs.tell().ok();
        self.rhs_origin = self.rhs.tell().ok();
        if let Some(origin) = self.lhs_origin {
            self.lhs_len = self.lhs.size().ok().map(|end| end.saturating_sub(origin));
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        if !self.on_rhs {
            let n = self.lhs.read(buf)?;
            if n > 0 {
                self.position += n as u64;
                return Ok(n);
            }
            self.switch_to_rhs();
        }
        let n = self.rhs.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> DeviceResult<usize> {
        if !self.on_rhs {
            let room = self.lhs_len.map_or(buf.len() as u64, |len| len.saturating_sub(self.position));
            if room > 0 {
                let n = usize::try_from(room).map_or(buf.len(), |room| room.min(buf.len()));
                match self.lhs.write(&buf[..n]) {
                    Ok(written) => {
                        self.position += written as u64;
                        return Ok(written);
                    }
                    Err(err)
                        if self.lhs_len.is_none() && err.code() == ErrorCode::NoBufferSpace =>
                    {
                        trace!(position = self.position, "unbounded lhs is full");
                        self.lhs.with(Device::clear_error);
                    }
                    Err(err) => return Err(err),
                }
            }
            self.switch_to_rhs();
        }
        let written = self.rhs.write(buf)?;
        self.position += written as u64;
        Ok(written)
    }

    fn flush(&mut self) -> DeviceResult<()> {
        let lhs = self.lhs.flush();
        let rhs = self.rhs.flush();
        lhs.and(rhs)
    }

    fn state_switch(&mut self) -> DeviceResult<()> {
        let side = if self.on_rhs { &self.rhs } else { &self.lhs };
        side.with(|device| device.seek(0, Whence::Current))
    }

    fn tell64(&mut self) -> DeviceResult<u64> {
        Ok(self.position)
    }

    fn seek64(&mut self, offset: i64, whence: Whence) -> DeviceResult<u64> {
        let (lhs_origin, rhs_origin, lhs_len) = self
            .seekable()
            .ok_or_else(|| DeviceError::unsupported("concat", "seek"))?;
        let rhs = &self.rhs;
        let target = resolve_target(offset, whence, self.position, || {
            Ok(lhs_len + rhs.size()?.saturating_sub(rhs_origin))
        })?;

        if target < lhs_len {
            self.lhs.seek_to(lhs_origin + target)?;
            self.rhs.seek_to(rhs_origin)?;
            self.on_rhs = false;
        } else {
            self.lhs.seek_to(lhs_origin + lhs_len)?;
            self.rhs.seek_to(rhs_origin + (target - lhs_len))?;
            self.on_rhs = true;
        }
        self.position = target;
        Ok(target)
    }
}

/// Opens a device reading or writing `lhs` then `rhs`.
///
/// The length of `lhs` is measured at open. When `lhs` cannot seek it is read
/// to its end before `rhs` is touched, and the concatenation cannot seek.
/// Writes go to `lhs` up to that length. If the length is unknown,
/// writing moves on to `rhs` once `lhs` reports `NoBufferSpace`; any other
/// `lhs` error is returned.
///
/// # Errors
///
/// Returns `InvalidMode` for a malformed mode.
///
/// # Example
///
/// ```rust
/// use devio_core::Device;
/// use devio_filters::concat;
///
/// let lhs = Device::open_cstring("left ", "r").unwrap().into_handle();
/// let rhs = Device::open_cstring("right", "r").unwrap().into_handle();
/// let mut both = concat(&lhs, &rhs, "r").unwrap();
/// let mut out = [0u8; 16];
/// assert_eq!(both.read(&mut out), 10);
/// assert_eq!(&out[..10], b"left right");
/// ```
pub fn concat(lhs: &DeviceHandle, rhs: &DeviceHandle, mode: &str) -> DeviceResult<Device> {
    Device::open_custom(Concat::new(lhs, rhs), mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use devio_core::{Callbacks, Growth};

    fn text(s: &str) -> DeviceHandle {
        Device::open_cstring(s, "r").unwrap().into_handle()
    }

    #[test]
    fn seeks_across_the_seam() {
        let lhs = text("abcd");
        let rhs = text("efgh");
        let mut both = concat(&lhs, &rhs, "r").unwrap();

        both.seek(2, Whence::Start).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(both.read(&mut buf), 4);
        assert_eq!(&buf, b"cdef");

        both.seek(-1, Whence::End).unwrap();
        assert_eq!(both.tell().unwrap(), 7);
        assert_eq!(both.read(&mut buf), 1);
        assert_eq!(buf[0], b'h');

        both.seek(1, Whence::Start).unwrap();
        assert_eq!(both.read(&mut buf[..2]), 2);
        assert_eq!(&buf[..2], b"bc");
    }

    #[test]
    fn writes_fill_lhs_then_rhs() {
        let lhs = Device::open_sized(vec![0u8; 3], "r+").unwrap().into_handle();
        let rhs = Device::open_dynamic(Growth::Minimal, "w").unwrap().into_handle();
        let mut both = concat(&lhs, &rhs, "w").unwrap();
        assert_eq!(both.write(b"abcdef"), 6);
        both.close().unwrap();

        assert_eq!(lhs.lock().contents().unwrap(), b"abc");
        assert_eq!(rhs.lock().contents().unwrap(), b"def");
    }

    #[test]
    fn full_unseekable_lhs_spills_into_rhs() {
        let mut room = 4usize;
        let sink = Callbacks::new().on_write(move |buf: &[u8]| {
            if room == 0 {
                return Err(DeviceError::buffer_full(4));
            }
            let n = room.min(buf.len());
            room -= n;
            Ok(n)
        });
        let lhs = Device::open_custom(sink, "w").unwrap().into_handle();
        let rhs = Device::open_dynamic(Growth::Minimal, "w").unwrap().into_handle();
        let mut both = concat(&lhs, &rhs, "w").unwrap();

        assert_eq!(both.write(b"abcdefgh"), 8);
        assert_eq!(both.tell().unwrap(), 8);
        assert_eq!(both.error(), None);
        both.close().unwrap();
        assert_eq!(rhs.lock().contents().unwrap(), b"efgh");
        assert_eq!(lhs.lock().error(), None);
    }

    #[test]
    fn other_lhs_write_errors_are_returned() {
        let sink = Callbacks::new().on_write(|_: &[u8]| Err(DeviceError::TimedOut));
        let lhs = Device::open_custom(sink, "w").unwrap().into_handle();
        let rhs = Device::open_dynamic(Growth::Minimal, "w").unwrap().into_handle();
        let mut both = concat(&lhs, &rhs, "w").unwrap();

        assert_eq!(both.write(b"abc"), 0);
        assert_eq!(both.error(), Some(ErrorCode::TimedOut));
        assert!(rhs.lock().contents().unwrap().is_empty());
    }

    #[test]
    fn unseekable_lhs_is_drained_first() {
        let mut remaining = 3u8;
        let stream = Callbacks::new().on_read(move |buf: &mut [u8]| {
            if remaining == 0 || buf.is_empty() {
                return Ok(0);
            }
            remaining -= 1;
            buf[0] = b'x';
            Ok(1)
        });
        let lhs = Device::open_custom(stream, "r").unwrap().into_handle();
        let rhs = text("yz");
        let mut both = concat(&lhs, &rhs, "r").unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(both.read(&mut buf), 5);
        assert_eq!(&buf[..5], b"xxxyz");
        assert!(both.seek(0, Whence::Start).unwrap_err().is_unsupported());
    }
}
