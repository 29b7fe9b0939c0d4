//! Block padding filters.
//!
//! The encoder appends padding when the stream ends. The decoder keeps the
//! last block back until end of stream, since only then is it known to be
//! the padding block.

use crate::codec::{CodecFilter, Fault, Location, StreamCodec};
use crate::error::{FilterError, FilterResult};
use devio_core::{Device, DeviceError, DeviceHandle, DeviceResult};

/// Padding layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaddingScheme {
    /// `0x80` followed by zeros up to the block boundary (ISO/IEC 7816-4).
    Bit,
    /// `N` bytes of value `N` (PKCS#7).
    Pkcs7,
}

impl PaddingScheme {
    fn name(self, decode: bool) -> &'static str {
        match (self, decode) {
            (Self::Bit, false) => "bit_pad_encode",
            (Self::Bit, true) => "bit_pad_decode",
            (Self::Pkcs7, false) => "pkcs7_encode",
            (Self::Pkcs7, true) => "pkcs7_decode",
        }
    }
}

/// Padding transform.
#[derive(Debug, Clone)]
pub struct PaddingCodec {
    scheme: PaddingScheme,
    block: usize,
    decode: bool,
    seen: u64,
    held: Vec<u8>,
}

impl PaddingCodec {
    fn new(scheme: PaddingScheme, block_size: usize, decode: bool) -> FilterResult<Self> {
        if !(1..=255).contains(&block_size) {
            return Err(FilterError::InvalidBlockSize { size: block_size });
        }
        Ok(Self {
            scheme,
            block: block_size,
            decode,
            seen: 0,
            held: Vec::with_capacity(block_size * 2),
        })
    }

    /// An encoder that pads to `block_size`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBlockSize` unless `block_size` is in `1..=255`.
    pub fn encoder(scheme: PaddingScheme, block_size: usize) -> FilterResult<Self> {
        Self::new(scheme, block_size, false)
    }

    /// A decoder that strips padding at `block_size`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidBlockSize` unless `block_size` is in `1..=255`.
    pub fn decoder(scheme: PaddingScheme, block_size: usize) -> FilterResult<Self> {
        Self::new(scheme, block_size, true)
    }

    fn block_u64(&self) -> u64 {
        self.block as u64
    }

    fn pad(&self, out: &mut Vec<u8>) {
        let used = usize::try_from(self.seen % self.block_u64()).unwrap_or(0);
        let count = self.block - used;
        match self.scheme {
            PaddingScheme::Bit => {
                out.push(0x80);
                out.resize(out.len() + count - 1, 0);
            }
            PaddingScheme::Pkcs7 => {
                // `count` is at most 255.
                out.resize(out.len() + count, count as u8);
            }
        }
    }

    fn unpad(&self, last: &[u8]) -> Option<usize> {
        match self.scheme {
            PaddingScheme::Pkcs7 => {
                let count = usize::from(*last.last()?);
                if count == 0 || count > last.len() {
                    return None;
                }
                let body = last.len() - count;
                last[body..]
                    .iter()
                    .all(|&b| usize::from(b) == count)
                    .then_some(body)
            }
            PaddingScheme::Bit => {
                let marker = last.iter().rposition(|&b| b != 0)?;
                (last[marker] == 0x80).then_some(marker)
            }
        }
    }
}

impl StreamCodec for PaddingCodec {
    fn name(&self) -> &'static str {
        self.scheme.name(self.decode)
    }

    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<(), Fault> {
        self.seen += input.len() as u64;
        if !self.decode {
            out.extend_from_slice(input);
            return Ok(());
        }
        self.held.extend_from_slice(input);
        if self.held.len() > self.block {
            let release = self.held.len() - self.block;
            out.extend(self.held.drain(..release));
        }
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> DeviceResult<()> {
        if !self.decode {
            self.pad(out);
            return Ok(());
        }
        let start = self.seen.saturating_sub(self.held.len() as u64);
        if self.seen == 0 || self.seen % self.block_u64() != 0 {
            return Err(DeviceError::malformed(
                start,
                format!("padded stream is not a multiple of {} bytes", self.block),
            ));
        }
        let body = self
            .unpad(&self.held)
            .ok_or_else(|| DeviceError::malformed(start, "invalid padding block"))?;
        out.extend_from_slice(&self.held[..body]);
        self.held.clear();
        Ok(())
    }

    fn reset(&mut self) {
        self.seen = 0;
        self.held.clear();
    }

    fn input_hint(&self, wanted: usize) -> usize {
        wanted.max(self.block)
    }

    fn locate(&self, target: u64, _reading: bool) -> Option<Location> {
        let block = self.block_u64();
        Some(Location {
            inner: target / block * block,
            skip: target % block,
        })
    }

    fn logical_len(&self, inner_len: u64, reading: bool) -> Option<u64> {
        let block = self.block_u64();
        (!self.decode && reading).then(|| (inner_len / block + 1) * block)
    }
}

/// Opens a filter that pads the stream to a multiple of `block_size`.
///
/// # Errors
///
/// Returns `InvalidArgument` for a block size outside `1..=255`, or
/// `InvalidMode` unless `mode` selects exactly one direction.
///
/// # Example
///
/// ```rust
/// use devio_core::Device;
/// use devio_filters::{pad_encode, PaddingScheme};
///
/// let inner = Device::open_cstring("abc", "r").unwrap().into_handle();
/// let mut padded = pad_encode(&inner, PaddingScheme::Pkcs7, 4, "r").unwrap();
/// let mut out = [0u8; 8];
/// assert_eq!(padded.read(&mut out), 4);
/// assert_eq!(&out[..4], b"abc\x01");
/// ```
pub fn pad_encode(
    inner: &DeviceHandle,
    scheme: PaddingScheme,
    block_size: usize,
    mode: &str,
) -> DeviceResult<Device> {
    let codec = PaddingCodec::encoder(scheme, block_size)?;
    CodecFilter::open(inner, codec, mode)
}

/// Opens a filter that validates and strips padding.
///
/// # Errors
///
/// As [`pad_encode`]. An invalid final block sets `BadMessage` at end of
/// stream (read mode) or close (write mode).
pub fn pad_decode(
    inner: &DeviceHandle,
    scheme: PaddingScheme,
    block_size: usize,
    mode: &str,
) -> DeviceResult<Device> {
    let codec = PaddingCodec::decoder(scheme, block_size)?;
    CodecFilter::open(inner, codec, mode)
}

#[cfg(test)]
mod tests {
    use super::*;
    use devio_core::{ErrorCode, Growth, Whence};

    fn source(bytes: &[u8]) -> DeviceHandle {
        let mut device = Device::open_dynamic(Growth::Minimal, "w+").unwrap();
        device.write(bytes);
        device.rewind().unwrap();
        device.into_handle()
    }

    fn read_all(device: &mut Device) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 7];
        loop {
            let n = device.read(&mut buf);
            out.extend_from_slice(&buf[..n]);
            if n < buf.len() {
                return out;
            }
        }
    }

    fn encode(scheme: PaddingScheme, block: usize, bytes: &[u8]) -> Vec<u8> {
        let inner = source(bytes);
        let mut device = pad_encode(&inner, scheme, block, "r").unwrap();
        read_all(&mut device)
    }

    #[test]
    fn pkcs7_full_block_gets_extra_block() {
        let out = encode(PaddingScheme::Pkcs7, 8, b"12345678");
        assert_eq!(out.len(), 16);
        assert_eq!(&out[8..], &[8u8; 8]);

        let out = encode(PaddingScheme::Pkcs7, 8, b"12345");
        assert_eq!(out, b"12345\x03\x03\x03");
    }

    #[test]
    fn bit_padding_layout() {
        assert_eq!(encode(PaddingScheme::Bit, 4, b"ab"), b"ab\x80\x00");
        assert_eq!(encode(PaddingScheme::Bit, 4, b""), b"\x80\x00\x00\x00");
        assert_eq!(encode(PaddingScheme::Bit, 1, b"z"), b"z\x80");
    }

    #[test]
    fn decode_strips_padding() {
        let inner = source(b"12345\x03\x03\x03");
        let mut device = pad_decode(&inner, PaddingScheme::Pkcs7, 8, "r").unwrap();
        assert_eq!(read_all(&mut device), b"12345");
        assert_eq!(device.error(), None);

        let inner = source(b"ab\x80\x00\x00\x00\x80\x00");
        let mut device = pad_decode(&inner, PaddingScheme::Bit, 4, "r").unwrap();
        assert_eq!(read_all(&mut device), b"ab\x80\x00\x00\x00");
    }

    #[test]
    fn pad_value_above_block_size_fails() {
        let inner = source(b"abcdefg\x09");
        let mut device = pad_decode(&inner, PaddingScheme::Pkcs7, 8, "r").unwrap();
        assert!(read_all(&mut device).is_empty());
        assert_eq!(device.error(), Some(ErrorCode::BadMessage));
    }

    #[test]
    fn inconsistent_pad_bytes_fail() {
        let inner = source(b"abcde\x02\x03\x03");
        let mut device = pad_decode(&inner, PaddingScheme::Pkcs7, 8, "r").unwrap();
        read_all(&mut device);
        assert_eq!(device.error(), Some(ErrorCode::BadMessage));

        let inner = source(b"abc\x00");
        let mut device = pad_decode(&inner, PaddingScheme::Bit, 4, "r").unwrap();
        read_all(&mut device);
        assert_eq!(device.error(), Some(ErrorCode::BadMessage));
    }

    #[test]
    fn truncated_stream_fails() {
        let inner = source(b"abc");
        let mut device = pad_decode(&inner, PaddingScheme::Pkcs7, 8, "r").unwrap();
        read_all(&mut device);
        assert_eq!(device.error(), Some(ErrorCode::BadMessage));
    }

    #[test]
    fn block_size_is_validated() {
        let inner = source(b"");
        for size in [0, 256] {
            let err = pad_encode(&inner, PaddingScheme::Pkcs7, size, "r").unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidArgument);
        }
    }

    #[test]
    fn write_mode_pads_at_close() {
        let inner = Device::open_dynamic(Growth::Minimal, "w").unwrap().into_handle();
        let mut device = pad_encode(&inner, PaddingScheme::Pkcs7, 4, "w").unwrap();
        assert_eq!(device.write(b"abcdef"), 6);
        device.close().unwrap();
        assert_eq!(inner.lock().contents().unwrap(), b"abcdef\x02\x02");

        let plain = Device::open_dynamic(Growth::Minimal, "w").unwrap().into_handle();
        let mut device = pad_decode(&plain, PaddingScheme::Pkcs7, 4, "w").unwrap();
        assert_eq!(device.write(b"abcdef\x02\x02"), 8);
        device.close().unwrap();
        assert_eq!(plain.lock().contents().unwrap(), b"abcdef");
    }

    #[test]
    fn flush_realigns_inner_to_consumed_bytes() {
        let inner = source(b"ABCDEFGH\x08\x08\x08\x08\x08\x08\x08\x08");
        let mut device = pad_decode(&inner, PaddingScheme::Pkcs7, 8, "r").unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(device.read(&mut buf), 8);
        assert_eq!(inner.lock().tell().unwrap(), 16);

        device.flush().unwrap();
        assert_eq!(inner.lock().tell().unwrap(), 8);
        assert_eq!(device.tell().unwrap(), 8);
        assert!(read_all(&mut device).is_empty());
        assert_eq!(device.error(), None);
    }

    #[test]
    fn seek_from_end_counts_padding() {
        let inner = source(b"abcdef");
        let mut device = pad_encode(&inner, PaddingScheme::Pkcs7, 4, "r").unwrap();
        device.seek(-2, Whence::End).unwrap();
        assert_eq!(read_all(&mut device), b"\x02\x02");
    }
}
