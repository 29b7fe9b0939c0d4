//! Hexadecimal encode and decode filters.

use crate::codec::{CodecFilter, Fault, Location, StreamCodec};
use devio_core::{Device, DeviceError, DeviceHandle, DeviceResult};

const DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Hex transform. Encoding emits lowercase digits, decoding accepts either case.
#[derive(Debug, Clone, Default)]
pub struct HexCodec {
    decode: bool,
    high: Option<u8>,
    offset: u64,
}

impl HexCodec {
    /// A byte-to-digits encoder.
    #[must_use]
    pub fn encoder() -> Self {
        Self::default()
    }

    /// A digits-to-byte decoder.
    #[must_use]
    pub fn decoder() -> Self {
        Self {
            decode: true,
            ..Self::default()
        }
    }
}

fn nibble(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        _ => None,
    }
}

impl StreamCodec for HexCodec {
    fn name(&self) -> &'static str {
        if self.decode {
            "hex_decode"
        } else {
            "hex_encode"
        }
    }

    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<(), Fault> {
        if !self.decode {
            out.reserve(input.len() * 2);
            for &byte in input {
                out.push(DIGITS[usize::from(byte >> 4)]);
                out.push(DIGITS[usize::from(byte & 0x0f)]);
            }
            self.offset += input.len() as u64;
            return Ok(());
        }

        for (i, &digit) in input.iter().enumerate() {
            let Some(value) = nibble(digit) else {
                let at = self.offset + i as u64;
                self.offset = at;
                return Err(Fault::new(
                    i,
                    DeviceError::malformed(at, format!("invalid hex digit {:?}", char::from(digit))),
                ));
            };
            match self.high.take() {
                Some(high) => out.push(high << 4 | value),
                None => self.high = Some(value),
            }
        }
        self.offset += input.len() as u64;
        Ok(())
    }

    fn finish(&mut self, _out: &mut Vec<u8>) -> DeviceResult<()> {
        if self.high.is_some() {
            return Err(DeviceError::malformed(self.offset, "odd number of hex digits"));
        }
        Ok(())
    }

    fn reset(&mut self) {
        self.high = None;
        self.offset = 0;
    }

    fn input_hint(&self, wanted: usize) -> usize {
        if self.decode {
            wanted.saturating_mul(2)
        } else {
            wanted.div_ceil(2)
        }
    }

    fn locate(&self, target: u64, reading: bool) -> Option<Location> {
        // The side carrying digits is `reading` for the encoder and
        // `!reading` for the decoder.
        let digits_side = reading != self.decode;
        if digits_side {
            Some(Location {
                inner: target / 2,
                skip: target % 2,
            })
        } else {
            Some(Location::exact(target.checked_mul(2)?))
        }
    }

    fn logical_len(&self, inner_len: u64, reading: bool) -> Option<u64> {
        if reading != self.decode {
            inner_len.checked_mul(2)
        } else {
            Some(inner_len / 2)
        }
    }
}

/// Opens a filter that hex-encodes the stream.
///
/// In read mode the device yields the hex digits of the inner device's
/// bytes; in write mode it writes the digits of each byte into the inner
/// device.
///
/// # Errors
///
/// Returns `InvalidMode` unless `mode` selects exactly one direction.
///
/// # Example
///
/// ```rust
/// use devio_core::Device;
/// use devio_filters::hex_encode;
///
/// let inner = Device::open_cstring(vec![0xab, 0x01], "r").unwrap().into_handle();
/// let mut hex = hex_encode(&inner, "r").unwrap();
/// let mut out = [0u8; 4];
/// assert_eq!(hex.read(&mut out), 4);
/// assert_eq!(&out, b"ab01");
/// ```
pub fn hex_encode(inner: &DeviceHandle, mode: &str) -> DeviceResult<Device> {
    CodecFilter::open(inner, HexCodec::encoder(), mode)
}

/// Opens a filter that decodes hex digits.
///
/// # Errors
///
/// Returns `InvalidMode` unless `mode` selects exactly one direction.
/// Invalid digits set `BadMessage` at the offending byte; an odd digit
/// count sets it at end of stream (read mode) or close (write mode).
pub fn hex_decode(inner: &DeviceHandle, mode: &str) -> DeviceResult<Device> {
    CodecFilter::open(inner, HexCodec::decoder(), mode)
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

    fn sink() -> DeviceHandle {
        Device::open_dynamic(Growth::Minimal, "w").unwrap().into_handle()
    }

    fn read_all(device: &mut Device) -> Vec<u8> {
        let mut out = Vec::new();
        let mut buf = [0u8; 3];
        loop {
            let n = device.read(&mut buf);
            out.extend_from_slice(&buf[..n]);
            if n < buf.len() {
                return out;
            }
        }
    }

    #[test]
    fn encodes_lowercase() {
        let inner = source(&[0xab, 0x00, 0x7f]);
        let mut device = hex_encode(&inner, "r").unwrap();
        assert_eq!(read_all(&mut device), b"ab007f");
        assert_eq!(device.error(), None);
        assert_eq!(device.what(), "hex_encode");
    }

    #[test]
    fn decodes_either_case() {
        let inner = source(b"AB");
        let mut device = hex_decode(&inner, "r").unwrap();
        assert_eq!(read_all(&mut device), [0xab]);

        let inner = source(b"aBcD");
        let mut device = hex_decode(&inner, "r").unwrap();
        assert_eq!(read_all(&mut device), [0xab, 0xcd]);
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let inner = source(b"");
        let mut device = hex_encode(&inner, "r").unwrap();
        assert!(read_all(&mut device).is_empty());
        assert!(device.eof());
        assert_eq!(device.error(), None);
    }

    #[test]
    fn odd_length_fails_at_eof() {
        let inner = source(b"abc");
        let mut device = hex_decode(&inner, "r").unwrap();
        assert_eq!(read_all(&mut device), [0xab]);
        assert_eq!(device.error(), Some(ErrorCode::BadMessage));
    }

    #[test]
    fn odd_length_fails_at_close() {
        let inner = sink();
        let mut device = hex_decode(&inner, "w").unwrap();
        assert_eq!(device.write(b"abc"), 3);
        let err = device.close().unwrap_err();
        assert_eq!(err.code(), ErrorCode::BadMessage);
        assert_eq!(inner.lock().contents().unwrap(), [0xab]);
    }

    #[test]
    fn invalid_digit_stops_at_its_offset() {
        let inner = source(b"0102zz03");
        let mut device = hex_decode(&inner, "r").unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(device.read(&mut buf), 2);
        assert_eq!(&buf[..2], &[0x01, 0x02]);
        assert_eq!(device.error(), Some(ErrorCode::BadMessage));

        let inner = sink();
        let mut device = hex_decode(&inner, "w").unwrap();
        assert_eq!(device.write(b"abc-de"), 3);
        assert_eq!(device.error(), Some(ErrorCode::BadMessage));
    }

    #[test]
    fn write_mode_encodes_into_inner() {
        let inner = sink();
        let mut device = hex_encode(&inner, "w").unwrap();
        assert_eq!(device.write(&[0xde, 0xad]), 2);
        assert_eq!(device.tell().unwrap(), 2);
        device.close().unwrap();
        assert_eq!(inner.lock().contents().unwrap(), b"dead");
    }

    #[test]
    fn seek_to_odd_digit_regenerates_nibble() {
        let inner = source(&[0x12, 0x34, 0x56]);
        let mut device = hex_encode(&inner, "r").unwrap();
        device.seek(3, Whence::Start).unwrap();
        assert_eq!(device.tell().unwrap(), 3);
        assert_eq!(read_all(&mut device), b"456");

        device.seek(-2, Whence::End).unwrap();
        assert_eq!(read_all(&mut device), b"56");
    }

    #[test]
    fn decoder_seek_halves_offsets() {
        let inner = source(b"00112233");
        let mut device = hex_decode(&inner, "r").unwrap();
        device.seek(2, Whence::Start).unwrap();
        assert_eq!(read_all(&mut device), [0x22, 0x33]);
    }

    #[test]
    fn rejects_bidirectional_mode() {
        let inner = source(b"");
        assert!(hex_encode(&inner, "r+").is_err());
    }
}
