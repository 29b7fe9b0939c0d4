//! Base64 encode and decode filters.
//!
//! Supports the RFC 4648 standard and URL-safe alphabets and any custom
//! table of 64 distinct symbols. Decoding is strict: whitespace and
//! misplaced padding are malformed input.

use crate::codec::{CodecFilter, Fault, Location, StreamCodec};
use crate::error::{FilterError, FilterResult};
use devio_core::{Device, DeviceError, DeviceHandle, DeviceResult};

const STANDARD: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";
const URL_SAFE: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
const PAD: u8 = b'=';
const INVALID: u8 = 0xff;

/// The symbol table used by a base64 filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alphabet {
    /// `A-Z a-z 0-9 + /`, padded by default.
    Standard,
    /// `A-Z a-z 0-9 - _`, unpadded by default.
    UrlSafe,
    /// A validated table of 64 distinct symbols.
    Custom([u8; 64]),
}

impl Alphabet {
    /// Validates a custom table.
    ///
    /// # Errors
    ///
    /// Returns `InvalidAlphabet` unless `symbols` holds exactly 64 distinct
    /// bytes, none of them `=`.
    pub fn custom(symbols: &[u8]) -> FilterResult<Self> {
        let table: [u8; 64] = symbols.try_into().map_err(|_| {
            FilterError::invalid_alphabet(format!("expected 64 symbols, got {}", symbols.len()))
        })?;
        let mut seen = [false; 256];
        for &symbol in &table {
            if symbol == PAD {
                return Err(FilterError::invalid_alphabet("'=' is reserved for padding"));
            }
            if std::mem::replace(&mut seen[usize::from(symbol)], true) {
                return Err(FilterError::invalid_alphabet(format!(
                    "duplicate symbol {:?}",
                    char::from(symbol)
                )));
            }
        }
        Ok(Self::Custom(table))
    }

    fn symbols(&self) -> &[u8; 64] {
        match self {
            Self::Standard => STANDARD,
            Self::UrlSafe => URL_SAFE,
            Self::Custom(table) => table,
        }
    }
}

/// Base64 filter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Base64Config {
    /// Symbol table.
    pub alphabet: Alphabet,
    /// Emit `=` padding when encoding, and require it when decoding.
    /// Decoding accepts padding when present either way.
    pub padding: bool,
}

impl Default for Base64Config {
    fn default() -> Self {
        Self::new(Alphabet::Standard)
    }
}

impl Base64Config {
    /// Configuration for `alphabet` with its default padding rule.
    #[must_use]
    pub const fn new(alphabet: Alphabet) -> Self {
        let padding = !matches!(alphabet, Alphabet::UrlSafe);
        Self { alphabet, padding }
    }

    /// The URL-safe alphabet, unpadded.
    #[must_use]
    pub const fn url_safe() -> Self {
        Self::new(Alphabet::UrlSafe)
    }

    /// Set the padding rule.
    #[must_use]
    pub const fn padding(mut self, padding: bool) -> Self {
        self.padding = padding;
        self
    }
}

/// Base64 transform.
#[derive(Debug, Clone)]
pub struct Base64Codec {
    decode: bool,
    padding: bool,
    encode_table: [u8; 64],
    decode_table: [u8; 256],
    carry: [u8; 3],
    carry_len: usize,
    quad: [u8; 4],
    count: usize,
    pads: usize,
    ended: bool,
    offset: u64,
}

impl Base64Codec {
    fn new(config: &Base64Config, decode: bool) -> Self {
        let encode_table = *config.alphabet.symbols();
        let mut decode_table = [INVALID; 256];
        for (value, &symbol) in (0u8..).zip(encode_table.iter()) {
            decode_table[usize::from(symbol)] = value;
        }
        Self {
            decode,
            padding: config.padding,
            encode_table,
            decode_table,
            carry: [0; 3],
            carry_len: 0,
            quad: [0; 4],
            count: 0,
            pads: 0,
            ended: false,
            offset: 0,
        }
    }

    /// A bytes-to-symbols encoder.
    #[must_use]
    pub fn encoder(config: &Base64Config) -> Self {
        Self::new(config, false)
    }

    /// A symbols-to-bytes decoder.
    #[must_use]
    pub fn decoder(config: &Base64Config) -> Self {
        Self::new(config, true)
    }

    fn encode_group(&self, group: &[u8], out: &mut Vec<u8>) {
        let b0 = group[0];
        let b1 = group.get(1).copied().unwrap_or(0);
        let b2 = group.get(2).copied().unwrap_or(0);
        let symbols = [
            b0 >> 2,
            (b0 & 0x03) << 4 | b1 >> 4,
            (b1 & 0x0f) << 2 | b2 >> 6,
            b2 & 0x3f,
        ];
        let emitted = group.len() + 1;
        for &value in &symbols[..emitted] {
            out.push(self.encode_table[usize::from(value)]);
        }
        if self.padding {
            out.resize(out.len() + 4 - emitted, PAD);
        }
    }

    fn decode_quad(&self, symbols: usize, out: &mut Vec<u8>) {
        let q = &self.quad;
        let bytes = [
            q[0] << 2 | q[1] >> 4,
            q[1] << 4 | q[2] >> 2,
            q[2] << 6 | q[3],
        ];
        out.extend_from_slice(&bytes[..symbols - 1]);
    }

    fn encode(&mut self, input: &[u8], out: &mut Vec<u8>) {
        out.reserve(input.len() / 3 * 4 + 4);
        for &byte in input {
            self.carry[self.carry_len] = byte;
            self.carry_len += 1;
            if self.carry_len == 3 {
                let carry = self.carry;
                self.encode_group(&carry, out);
                self.carry_len = 0;
            }
        }
        self.offset += input.len() as u64;
    }

    fn decode(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<(), Fault> {
        for (i, &symbol) in input.iter().enumerate() {
            let at = self.offset + i as u64;
            let fault = |message: String| Fault::new(i, DeviceError::malformed(at, message));
            if self.ended {
                self.offset = at;
                return Err(fault("data after final padded group".into()));
            }
            if symbol == PAD {
                if self.count < 2 {
                    self.offset = at;
                    return Err(fault("padding before the second symbol of a group".into()));
                }
                self.quad[self.count] = 0;
                self.pads += 1;
                self.count += 1;
            } else {
                let value = self.decode_table[usize::from(symbol)];
                if value == INVALID {
                    self.offset = at;
                    return Err(fault(format!("invalid base64 symbol {:?}", char::from(symbol))));
                }
                if self.pads > 0 {
                    self.offset = at;
                    return Err(fault("data after padding".into()));
                }
                self.quad[self.count] = value;
                self.count += 1;
            }
            if self.count == 4 {
                self.decode_quad(4 - self.pads, out);
                self.ended = self.pads > 0;
                self.count = 0;
                self.pads = 0;
            }
        }
        self.offset += input.len() as u64;
        Ok(())
    }
}

impl StreamCodec for Base64Codec {
    fn name(&self) -> &'static str {
        if self.decode {
            "base64_decode"
        } else {
            "base64_encode"
        }
    }

    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<(), Fault> {
        if self.decode {
            self.decode(input, out)
        } else {
            self.encode(input, out);
            Ok(())
        }
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> DeviceResult<()> {
        if !self.decode {
            if self.carry_len > 0 {
                let carry = self.carry;
                self.encode_group(&carry[..self.carry_len], out);
                self.carry_len = 0;
            }
            return Ok(());
        }

        let symbols = std::mem::take(&mut self.count);
        match (symbols, self.pads) {
            (0, _) => Ok(()),
            (_, pads) if pads > 0 => Err(DeviceError::malformed(self.offset, "incomplete padding")),
            _ if self.padding => Err(DeviceError::malformed(self.offset, "missing padding")),
            (1, _) => Err(DeviceError::malformed(self.offset, "dangling base64 symbol")),
            (n, _) => {
                self.decode_quad(n, out);
                Ok(())
            }
        }
    }

    fn reset(&mut self) {
        self.carry_len = 0;
        self.count = 0;
        self.pads = 0;
        self.ended = false;
        self.offset = 0;
    }

    fn input_hint(&self, wanted: usize) -> usize {
        if self.decode {
            wanted.div_ceil(3).saturating_mul(4)
        } else {
            wanted.div_ceil(4).saturating_mul(3)
        }
    }

    fn locate(&self, target: u64, reading: bool) -> Option<Location> {
        match (self.decode, reading) {
            (false, true) => Some(Location {
                inner: target / 4 * 3,
                skip: target % 4,
            }),
            (true, true) => Some(Location {
                inner: target / 3 * 4,
                skip: target % 3,
            }),
            (false, false) => (target % 3 == 0).then(|| Location::exact(target / 3 * 4)),
            (true, false) => (target % 4 == 0).then(|| Location::exact(target / 4 * 3)),
        }
    }

    fn logical_len(&self, inner_len: u64, reading: bool) -> Option<u64> {
        if self.decode || !reading {
            return None;
        }
        if self.padding {
            inner_len.div_ceil(3).checked_mul(4)
        } else {
            let tail = [0, 2, 3][usize::try_from(inner_len % 3).ok()?];
            (inner_len / 3).checked_mul(4).map(|full| full + tail)
        }
    }
}

/// Opens a filter that base64-encodes the stream.
///
/// # Errors
///
/// Returns `InvalidMode` unless `mode` selects exactly one direction.
///
/// # Example
///
/// ```rust
/// use devio_core::Device;
/// use devio_filters::{base64_encode, Base64Config};
///
/// let inner = Device::open_cstring("Ma", "r").unwrap().into_handle();
/// let mut b64 = base64_encode(&inner, &Base64Config::default(), "r").unwrap();
/// let mut out = [0u8; 8];
/// assert_eq!(b64.read(&mut out), 4);
/// assert_eq!(&out[..4], b"TWE=");
/// ```
pub fn base64_encode(inner: &DeviceHandle, config: &Base64Config, mode: &str) -> DeviceResult<Device> {
    CodecFilter::open(inner, Base64Codec::encoder(config), mode)
}

/// Opens a filter that decodes base64.
///
/// # Errors
///
/// Returns `InvalidMode` unless `mode` selects exactly one direction.
/// Malformed input sets `BadMessage` at the offending symbol.
pub fn base64_decode(inner: &DeviceHandle, config: &Base64Config, mode: &str) -> DeviceResult<Device> {
    CodecFilter::open(inner, Base64Codec::decoder(config), mode)
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
        let mut buf = [0u8; 5];
        loop {
            let n = device.read(&mut buf);
            out.extend_from_slice(&buf[..n]);
            if n < buf.len() {
                return out;
            }
        }
    }

    fn encode(bytes: &[u8], config: &Base64Config) -> Vec<u8> {
        let inner = source(bytes);
        let mut device = base64_encode(&inner, config, "r").unwrap();
        read_all(&mut device)
    }

    fn decode(text: &[u8], config: &Base64Config) -> (Vec<u8>, Option<ErrorCode>) {
        let inner = source(text);
        let mut device = base64_decode(&inner, config, "r").unwrap();
        let out = read_all(&mut device);
        (out, device.error())
    }

    #[test]
    fn encodes_rfc_examples() {
        let config = Base64Config::default();
        assert_eq!(encode(b"Man", &config), b"TWFu");
        assert_eq!(encode(b"Ma", &config), b"TWE=");
        assert_eq!(encode(b"M", &config), b"TQ==");
        assert_eq!(encode(b"", &config), b"");
        assert_eq!(encode(b"foobar", &config), b"Zm9vYmFy");
    }

    #[test]
    fn url_safe_swaps_symbols_and_drops_padding() {
        assert_eq!(encode(&[0xfb, 0xff], &Base64Config::default()), b"+/8=");
        assert_eq!(encode(&[0xfb, 0xff], &Base64Config::url_safe()), b"-_8");

        let config = Base64Config::url_safe();
        assert_eq!(decode(b"-_8", &config), (vec![0xfb, 0xff], None));
        assert_eq!(decode(b"-_8=", &config), (vec![0xfb, 0xff], None));
    }

    #[test]
    fn standard_decode_requires_padding() {
        let config = Base64Config::default();
        assert_eq!(decode(b"TWE=", &config), (b"Ma".to_vec(), None));
        let (out, error) = decode(b"TWE", &config);
        assert!(out.is_empty());
        assert_eq!(error, Some(ErrorCode::BadMessage));
    }

    #[test]
    fn invalid_symbol_stops_at_its_offset() {
        let (out, error) = decode(b"TWFu TWFu", &Base64Config::default());
        assert_eq!(out, b"Man");
        assert_eq!(error, Some(ErrorCode::BadMessage));
    }

    #[test]
    fn rejects_misplaced_padding() {
        let config = Base64Config::default();
        assert_eq!(decode(b"T===", &config).1, Some(ErrorCode::BadMessage));
        assert_eq!(decode(b"TQ=Q", &config).1, Some(ErrorCode::BadMessage));
        assert_eq!(decode(b"TQ==TWFu", &config), (b"M".to_vec(), Some(ErrorCode::BadMessage)));
    }

    #[test]
    fn accepts_nonzero_trailing_bits() {
        assert_eq!(decode(b"TR==", &Base64Config::default()), (b"M".to_vec(), None));
    }

    #[test]
    fn custom_alphabet_validation() {
        let mut table: Vec<u8> = (b'!'..b'!' + 64).collect();
        assert!(Alphabet::custom(&table).is_err(), "contains '='");

        table = (0x80..=0xbf).collect();
        let alphabet = Alphabet::custom(&table).unwrap();
        let config = Base64Config::new(alphabet);
        assert_eq!(encode(&[0, 0, 0], &config), [0x80; 4]);

        table[1] = table[0];
        assert!(matches!(
            Alphabet::custom(&table),
            Err(FilterError::InvalidAlphabet { .. })
        ));
        assert!(Alphabet::custom(&table[..10]).is_err());
    }

    #[test]
    fn write_mode_round_trip() {
        let encoded = Device::open_dynamic(Growth::Minimal, "w").unwrap().into_handle();
        let mut encoder = base64_encode(&encoded, &Base64Config::default(), "w").unwrap();
        assert_eq!(encoder.write(b"Ma"), 2);
        encoder.close().unwrap();
        assert_eq!(encoded.lock().contents().unwrap(), b"TWE=");

        let decoded = Device::open_dynamic(Growth::Minimal, "w").unwrap().into_handle();
        let mut decoder = base64_decode(&decoded, &Base64Config::default(), "w").unwrap();
        assert_eq!(decoder.write(b"TW"), 2);
        assert_eq!(decoder.write(b"E="), 2);
        decoder.close().unwrap();
        assert_eq!(decoded.lock().contents().unwrap(), b"Ma");
    }

    #[test]
    fn seeks_within_encoded_stream() {
        let inner = source(b"ManMa");
        let mut device = base64_encode(&inner, &Base64Config::default(), "r").unwrap();
        device.seek(5, Whence::Start).unwrap();
        assert_eq!(read_all(&mut device), b"WE=");

        device.seek(-4, Whence::End).unwrap();
        assert_eq!(read_all(&mut device), b"TWE=");
    }

    #[test]
    fn seeks_within_decoded_stream() {
        let inner = source(b"TWFuTWE=");
        let mut device = base64_decode(&inner, &Base64Config::default(), "r").unwrap();
        device.seek(4, Whence::Start).unwrap();
        assert_eq!(read_all(&mut device), b"a");
        assert!(device.seek(0, Whence::End).unwrap_err().is_unsupported());
    }

    #[test]
    fn write_mode_seeks_only_to_group_boundaries() {
        let inner = Device::open_dynamic(Growth::Minimal, "w").unwrap().into_handle();
        let mut device = base64_encode(&inner, &Base64Config::default(), "w").unwrap();
        assert!(device.seek(2, Whence::Start).unwrap_err().is_unsupported());
        assert_eq!(device.write(b"Man"), 3);
        device.seek(0, Whence::Start).unwrap();
        assert_eq!(device.tell().unwrap(), 0);
    }
}
