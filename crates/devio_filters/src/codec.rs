//! Streaming codec engine shared by the unidirectional filters.
//!
//! A [`StreamCodec`] is a pure byte transform with no knowledge of devices.
//! [`CodecFilter`] drives one over an inner device: in read mode it pulls
//! input on demand and serves transformed output, in write mode it
//! transforms each write and pushes the result downstream.
//!
//! Faults inside the input are reported at the exact byte where they occur.
//! Output produced before the fault is delivered first, so the caller sees
//! a short count, then the error on the following call.

use crate::inner::{resolve_target, Inner, TRANSFER_SIZE};
use devio_core::{
    Backend, Device, DeviceError, DeviceFlags, DeviceHandle, DeviceResult, OpenMode, Whence,
};
use std::fmt;
use tracing::{debug, trace};

/// Where to restart a codec to reach a logical offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    /// Offset in the inner device, relative to where the filter was opened.
    pub inner: u64,
    /// Output bytes to regenerate and discard after restarting.
    pub skip: u64,
}

impl Location {
    /// A location needing no regeneration.
    #[must_use]
    pub const fn exact(inner: u64) -> Self {
        Self { inner, skip: 0 }
    }
}

/// A fault found part way through an input slice.
#[derive(Debug)]
pub struct Fault {
    /// Input bytes accepted before the fault.
    pub consumed: usize,
    /// The error to report.
    pub error: DeviceError,
}

impl Fault {
    /// Creates a fault at input index `consumed`.
    #[must_use]
    pub fn new(consumed: usize, error: DeviceError) -> Self {
        Self { consumed, error }
    }
}

impl From<DeviceError> for Fault {
    fn from(error: DeviceError) -> Self {
        Self::new(0, error)
    }
}

/// A byte transform that can be driven in either direction.
///
/// In read mode the input is the inner device's bytes and the output is
/// what the caller reads. In write mode the input is what the caller writes
/// and the output goes to the inner device.
pub trait StreamCodec: Send + 'static {
    /// Name reported by `Device::what`.
    fn name(&self) -> &'static str;

    /// Applies mode flags such as `<` before any data flows.
    ///
    /// # Errors
    ///
    /// Returns an error if the codec cannot honor the mode.
    fn open(&mut self, _mode: &OpenMode) -> DeviceResult<()> {
        Ok(())
    }

    /// Transforms `input`, appending output to `out`.
    ///
    /// # Errors
    ///
    /// On malformed input, appends the output for the valid prefix and
    /// returns a [`Fault`] recording how much input was accepted.
    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<(), Fault>;

    /// Flushes trailing state at end of input.
    ///
    /// # Errors
    ///
    /// Returns an error if the input ended mid-unit or failed validation.
    fn finish(&mut self, out: &mut Vec<u8>) -> DeviceResult<()>;

    /// Returns to the initial state, discarding any partial unit.
    fn reset(&mut self);

    /// How many input bytes to fetch to produce `wanted` output bytes.
    fn input_hint(&self, _wanted: usize) -> usize {
        TRANSFER_SIZE
    }

    /// Maps a logical offset to a restart point.
    ///
    /// The default restarts from the beginning: read mode regenerates and
    /// discards up to the target, write mode only allows offset zero.
    fn locate(&self, target: u64, reading: bool) -> Option<Location> {
        if reading {
            Some(Location {
                inner: 0,
                skip: target,
            })
        } else {
            (target == 0).then_some(Location::exact(0))
        }
    }

    /// Logical length given the inner length, if it can be computed cheaply.
    fn logical_len(&self, _inner_len: u64, _reading: bool) -> Option<u64> {
        None
    }

    /// Whether `flush` in write mode finalizes the stream.
    fn finish_on_flush(&self) -> bool {
        false
    }

    /// Status bits merged into `Device::flags`.
    fn flags(&self) -> DeviceFlags {
        DeviceFlags::empty()
    }
}

/// A filter backend that runs a [`StreamCodec`] over an inner device.
pub struct CodecFilter<C: StreamCodec> {
    inner: Inner,
    codec: C,
    reading: bool,
    origin: Option<u64>,
    position: u64,
    ready: Vec<u8>,
    ready_pos: usize,
    input: Vec<u8>,
    /// Read side: inner EOF seen. Write side: stream finalized.
    drained: bool,
    deferred: Option<DeviceError>,
}

impl<C: StreamCodec> CodecFilter<C> {
    /// Wraps `codec` around the device behind `inner`.
    #[must_use]
    pub fn new(inner: &DeviceHandle, codec: C) -> Self {
        Self {
            inner: Inner::new(inner),
            codec,
            reading: true,
            origin: None,
            position: 0,
            ready: Vec::new(),
            ready_pos: 0,
            input: Vec::new(),
            drained: false,
            deferred: None,
        }
    }

    /// Opens a device running `codec` over `inner`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` unless `mode` selects exactly one direction.
    pub fn open(inner: &DeviceHandle, codec: C, mode: &str) -> DeviceResult<Device> {
        Device::open_custom(Self::new(inner, codec), mode)
    }

    /// Returns the codec.
    pub fn codec(&self) -> &C {
        &self.codec
    }

    fn pull(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        let mut out = 0;
        while out < buf.len() {
            if self.ready_pos < self.ready.len() {
                let n = (self.ready.len() - self.ready_pos).min(buf.len() - out);
                buf[out..out + n].copy_from_slice(&self.ready[self.ready_pos..self.ready_pos + n]);
                self.ready_pos += n;
                out += n;
                continue;
            }
            if let Some(err) = self.deferred.take() {
                if out == 0 {
                    return Err(err);
                }
                self.deferred = Some(err);
                break;
            }
            if self.drained {
                break;
            }

            self.ready.clear();
            self.ready_pos = 0;
            let want = self.codec.input_hint(buf.len() - out).clamp(1, TRANSFER_SIZE);
            self.input.resize(want, 0);
            match self.inner.read(&mut self.input) {
                Ok(0) => {
                    self.drained = true;
                    if let Err(err) = self.codec.finish(&mut self.ready) {
                        self.deferred = Some(err);
                    }
                }
                Ok(n) => {
                    if let Err(fault) = self.codec.update(&self.input[..n], &mut self.ready) {
                        self.drained = true;
                        self.deferred = Some(fault.error);
                    }
                }
                Err(err) if out == 0 => return Err(err),
                Err(_) => break,
            }
        }
        self.position += out as u64;
        Ok(out)
    }

    fn push(&mut self, buf: &[u8]) -> DeviceResult<usize> {
        if let Some(err) = self.deferred.take() {
            return Err(err);
        }
        if self.drained {
            return Err(DeviceError::invalid_argument(format!(
                "{} stream already finalized",
                self.codec.name()
            )));
        }

        self.ready.clear();
        let (consumed, fault) = match self.codec.update(buf, &mut self.ready) {
            Ok(()) => (buf.len(), None),
            Err(fault) => (fault.consumed, Some(fault.error)),
        };
        self.inner.write_all(&self.ready)?;
        self.ready.clear();
        self.position += consumed as u64;

        match fault {
            None => Ok(consumed),
            Some(err) if consumed == 0 => Err(err),
            Some(err) => {
                self.deferred = Some(err);
                Ok(consumed)
            }
        }
    }

    fn finalize(&mut self) -> DeviceResult<()> {
        if self.drained {
            return Ok(());
        }
        self.drained = true;
        self.ready.clear();
        self.codec.finish(&mut self.ready)?;
        self.inner.write_all(&self.ready)?;
        self.ready.clear();
        Ok(())
    }

    fn reposition(&mut self, target: u64) -> DeviceResult<u64> {
        let name = self.codec.name();
        let origin = self
            .origin
            .ok_or_else(|| DeviceError::unsupported(name, "seek"))?;
        let location = self
            .codec
            .locate(target, self.reading)
            .filter(|location| self.reading || location.skip == 0)
            .ok_or_else(|| DeviceError::unsupported(name, "seek to this offset"))?;

        self.inner.seek_to(origin + location.inner)?;
        self.codec.reset();
        self.ready.clear();
        self.ready_pos = 0;
        self.drained = false;
        self.deferred = None;
        self.position = target - location.skip;
        trace!(codec = name, target, inner = location.inner, skip = location.skip, "codec repositioned");

        let mut left = location.skip;
        if left > 0 {
            let mut scratch = vec![0u8; TRANSFER_SIZE];
            while left > 0 {
                let step = usize::try_from(left.min(TRANSFER_SIZE as u64)).unwrap_or(TRANSFER_SIZE);
                let n = self.pull(&mut scratch[..step])?;
                if n == 0 {
                    return Err(DeviceError::out_of_range(target));
                }
                left -= n as u64;
            }
        }
        Ok(target)
    }

    fn logical_end(&self) -> DeviceResult<u64> {
        let name = self.codec.name();
        let origin = self
            .origin
            .ok_or_else(|| DeviceError::unsupported(name, "seek"))?;
        let len = self.inner.size()?.saturating_sub(origin);
        self.codec
            .logical_len(len, self.reading)
            .ok_or_else(|| DeviceError::unsupported(name, "seek from end"))
    }
}

impl<C: StreamCodec> Backend for CodecFilter<C> {
    fn what(&self) -> &'static str {
        self.codec.name()
    }

    fn open(&mut self, mode: &OpenMode) -> DeviceResult<()> {
        mode.require_one_direction(self.codec.name())?;
        self.reading = mode.read;
        self.codec.open(mode)?;
        self.origin = self.inner.tell().ok();
        debug!(codec = self.codec.name(), reading = self.reading, "codec filter opened");
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        self.pull(buf)
    }

    fn write(&mut self, buf: &[u8]) -> DeviceResult<usize> {
        self.push(buf)
    }

    fn flush(&mut self) -> DeviceResult<()> {
        if self.reading {
            let aligned = self
                .codec
                .locate(self.position, true)
                .is_some_and(|location| location.skip == 0);
            if aligned && self.origin.is_some() {
                self.reposition(self.position)?;
            }
            return Ok(());
        }
        if self.codec.finish_on_flush() {
            self.finalize()?;
        }
        self.inner.flush()
    }

    fn close(&mut self) -> DeviceResult<()> {
        if self.reading {
            return Ok(());
        }
        self.finalize()?;
        self.inner.flush()
    }

    fn tell64(&mut self) -> DeviceResult<u64> {
        Ok(self.position)
    }

    fn seek64(&mut self, offset: i64, whence: Whence) -> DeviceResult<u64> {
        let target = resolve_target(offset, whence, self.position, || self.logical_end())?;
        self.reposition(target)
    }

    fn flags(&self) -> DeviceFlags {
        self.codec.flags()
    }
}

impl<C: StreamCodec> fmt::Debug for CodecFilter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodecFilter")
            .field("codec", &self.codec.name())
            .field("reading", &self.reading)
            .field("position", &self.position)
            .field("drained", &self.drained)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devio_core::{ErrorCode, Growth};

    /// Uppercases ASCII and rejects `!`.
    struct Shout;

    impl StreamCodec for Shout {
        fn name(&self) -> &'static str {
            "shout"
        }

        fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<(), Fault> {
            for (i, &byte) in input.iter().enumerate() {
                if byte == b'!' {
                    return Err(Fault::new(i, DeviceError::malformed(i as u64, "bang")));
                }
                out.push(byte.to_ascii_uppercase());
            }
            Ok(())
        }

        fn finish(&mut self, _out: &mut Vec<u8>) -> DeviceResult<()> {
            Ok(())
        }

        fn reset(&mut self) {}

        fn input_hint(&self, wanted: usize) -> usize {
            wanted
        }

        fn locate(&self, target: u64, _reading: bool) -> Option<Location> {
            Some(Location::exact(target))
        }
    }

    #[test]
    fn requires_one_direction() {
        let handle = Device::open_cstring("abc", "r").unwrap().into_handle();
        let err = CodecFilter::open(&handle, Shout, "r+").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
    }

    #[test]
    fn pulls_and_transforms() {
        let handle = Device::open_cstring("hello", "r").unwrap().into_handle();
        let mut device = CodecFilter::open(&handle, Shout, "r").unwrap();
        assert_eq!(device.what(), "shout");

        let mut buf = [0u8; 8];
        assert_eq!(device.read(&mut buf), 5);
        assert_eq!(&buf[..5], b"HELLO");
        assert!(device.eof());
    }

    #[test]
    fn fault_reports_exact_count() {
        let handle = Device::open_cstring("abc!def", "r").unwrap().into_handle();
        let mut device = CodecFilter::open(&handle, Shout, "r").unwrap();

        let mut buf = [0u8; 7];
        assert_eq!(device.read(&mut buf), 3);
        assert_eq!(&buf[..3], b"ABC");
        assert_eq!(device.error(), Some(ErrorCode::BadMessage));
    }

    #[test]
    fn push_fault_reports_exact_count() {
        let handle = Device::open_dynamic(Growth::Minimal, "w")
            .unwrap()
            .into_handle();
        let mut device = CodecFilter::open(&handle, Shout, "w").unwrap();
        assert_eq!(device.write(b"ab!cd"), 2);
        assert_eq!(device.error(), Some(ErrorCode::BadMessage));
        assert_eq!(handle.lock().contents().unwrap(), b"AB");
    }

    #[test]
    fn seek_realigns_inner() {
        let handle = Device::open_cstring("abcdef", "r").unwrap().into_handle();
        let mut device = CodecFilter::open(&handle, Shout, "r").unwrap();
        device.seek(4, Whence::Start).unwrap();
        assert_eq!(device.tell().unwrap(), 4);

        let mut buf = [0u8; 2];
        assert_eq!(device.read(&mut buf), 2);
        assert_eq!(&buf, b"EF");
    }

    #[test]
    fn writes_fail_after_close_finalizes() {
        let handle = Device::open_dynamic(Growth::Minimal, "w")
            .unwrap()
            .into_handle();
        let mut filter = CodecFilter::new(&handle, Shout);
        filter.open(&OpenMode::parse("w").unwrap()).unwrap();
        filter.close().unwrap();
        assert!(filter.write(b"late").is_err());
    }
}
