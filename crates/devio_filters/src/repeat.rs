//! Replays an inner stream a fixed or unbounded number of times.

use crate::inner::{resolve_target, Inner};
use devio_core::{Backend, Device, DeviceError, DeviceHandle, DeviceResult, OpenMode, Whence};

/// Read-only backend that rewinds its inner device at each end of stream.
#[derive(Debug)]
pub struct Repeat {
    inner: Inner,
    times: Option<u64>,
    origin: Option<u64>,
    period: Option<u64>,
    pass: u64,
    position: u64,
}

impl Repeat {
    /// Creates a replay of `inner`, `times` passes or forever for `None`.
    #[must_use]
    pub fn new(inner: &DeviceHandle, times: Option<u64>) -> Self {
        Self {
            inner: Inner::new(inner),
            times,
            origin: None,
            period: None,
            pass: 0,
            position: 0,
        }
    }

    fn exhausted(&self) -> bool {
        self.times.is_some_and(|times| self.pass >= times)
    }

    fn period(&mut self) -> DeviceResult<u64> {
        if let Some(period) = self.period {
            return Ok(period);
        }
        let origin = self
            .origin
            .ok_or_else(|| DeviceError::unsupported("repeat", "seek"))?;
        let period = self.inner.size()?.saturating_sub(origin);
        self.period = Some(period);
        Ok(period)
    }
}

impl Backend for Repeat {
    fn what(&self) -> &'static str {
        "repeat"
    }

    fn open(&mut self, mode: &OpenMode) -> DeviceResult<()> {
        mode.require_read_only("repeat")?;
        self.origin = self.inner.tell().ok();
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        loop {
            if self.exhausted() {
                return Ok(0);
            }
            let n = self.inner.read(buf)?;
            if n > 0 {
                self.position += n as u64;
                return Ok(n);
            }

            self.pass += 1;
            let period = *self.period.get_or_insert(self.position / self.pass);
            if period == 0 || self.exhausted() {
                return Ok(0);
            }
            let origin = self
                .origin
                .ok_or_else(|| DeviceError::unsupported("repeat", "rewind"))?;
            self.inner.seek_to(origin)?;
        }
    }

    fn tell64(&mut self) -> DeviceResult<u64> {
        Ok(self.position)
    }

    fn seek64(&mut self, offset: i64, whence: Whence) -> DeviceResult<u64> {
        let period = self.period()?;
        let total = self.times.map(|times| period.saturating_mul(times));
        let target = resolve_target(offset, whence, self.position, || {
            total.ok_or_else(|| DeviceError::unsupported("repeat", "seek from end of an endless stream"))
        })?;
        if total.is_some_and(|total| target > total) || (period == 0 && target > 0) {
            return Err(DeviceError::out_of_range(target));
        }

        let (pass, within) = if period == 0 {
            (0, 0)
        } else {
            (target / period, target % period)
        };
        let origin = self.origin.unwrap_or_default();
        self.inner.seek_to(origin + within)?;
        self.pass = pass;
        self.position = target;
        Ok(target)
    }
}

/// Opens a read-only device replaying `inner` from its current offset.
///
/// `times` of `None` repeats forever. Replays after the first need `inner`
/// to seek.
///
/// # Errors
///
/// Returns `InvalidMode` unless `mode` is read-only.
///
/// # Example
///
/// ```rust
/// use devio_core::Device;
/// use devio_filters::repeat;
///
/// let inner = Device::open_cstring("ab", "r").unwrap().into_handle();
/// let mut thrice = repeat(&inner, Some(3), "r").unwrap();
/// let mut out = [0u8; 10];
/// assert_eq!(thrice.read(&mut out), 6);
/// assert_eq!(&out[..6], b"ababab");
/// ```
pub fn repeat(inner: &DeviceHandle, times: Option<u64>, mode: &str) -> DeviceResult<Device> {
    Device::open_custom(Repeat::new(inner, times), mode)
}
