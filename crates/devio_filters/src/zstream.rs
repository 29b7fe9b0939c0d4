//! Incremental zlib framing over the deflate primitives.
//!
//! The compressor emits one deflate block per [`TRANSFER_SIZE`] bytes of
//! input and the decompressor decodes each block as soon as all of its bits
//! are buffered, so neither direction waits for the end of the stream.

use crate::inner::TRANSFER_SIZE;
use devio_core::{DeviceError, DeviceResult};
use oxiarc_core::{BitReader, BitWriter, OxiArcError};
use oxiarc_deflate::huffman::END_OF_BLOCK;
use oxiarc_deflate::tables::{
    decode_distance, decode_length, distance_to_code, fixed_distance_tree, fixed_litlen_lengths,
    fixed_litlen_tree, length_to_code, CODE_LENGTH_ORDER, DISTANCE_EXTRA_BITS, LENGTH_EXTRA_BITS,
};
use oxiarc_deflate::{Adler32, HuffmanTree, Lz77Encoder, Lz77Token};
use std::io::{self, Read};
use std::sync::OnceLock;

/// CMF byte: method 8 with a 32 KiB window.
const CMF: u8 = 0x78;
const FDICT: u8 = 0x20;
const MAX_STORED: usize = 65_535;
const WINDOW: usize = 32 * 1024;

fn engine_error(err: OxiArcError) -> DeviceError {
    DeviceError::Io(io::Error::other(err))
}

/// Fixed Huffman codes, bit-reversed for LSB-first emission.
struct FixedCodes {
    litlen: [(u16, u8); 288],
    distance: [u16; 30],
}

fn reversed(code: u16, len: u8) -> u16 {
    code.reverse_bits() >> (16 - len)
}

fn fixed_codes() -> &'static FixedCodes {
    static CODES: OnceLock<FixedCodes> = OnceLock::new();
    CODES.get_or_init(|| {
        let lengths = fixed_litlen_lengths();
        let mut count = [0u16; 16];
        for &len in &lengths {
            count[usize::from(len)] += 1;
        }
        count[0] = 0;
        let mut next = [0u16; 16];
        let mut code = 0u16;
        for bits in 1..16 {
            code = (code + count[bits - 1]) << 1;
            next[bits] = code;
        }

        let mut litlen = [(0u16, 0u8); 288];
        for (slot, &len) in litlen.iter_mut().zip(lengths.iter()) {
            let canonical = next[usize::from(len)];
            next[usize::from(len)] += 1;
            *slot = (reversed(canonical, len), len);
        }
        let mut distance = [0u16; 30];
        for (code, slot) in (0u16..).zip(distance.iter_mut()) {
            *slot = reversed(code, 5);
        }
        FixedCodes { litlen, distance }
    })
}

fn put_symbol(bits: &mut BitWriter<Vec<u8>>, symbol: u16) -> oxiarc_core::Result<()> {
    let (code, len) = fixed_codes().litlen[usize::from(symbol)];
    bits.write_bits(u32::from(code), len)
}

/// Compressing half of the zlib stream.
pub(crate) struct StreamDeflater {
    level: u8,
    lz77: Lz77Encoder,
    bits: BitWriter<Vec<u8>>,
    staged: Vec<u8>,
    adler: Adler32,
    started: bool,
}

impl StreamDeflater {
    pub(crate) fn new(level: u8) -> Self {
        Self {
            level,
            lz77: Lz77Encoder::with_level(level),
            bits: BitWriter::new(Vec::new()),
            staged: Vec::new(),
            adler: Adler32::new(),
            started: false,
        }
    }

    fn header(&self) -> [u8; 2] {
        let flevel: u8 = match self.level {
            0 | 1 => 0,
            2..=5 => 1,
            6 => 2,
            _ => 3,
        };
        let flg = flevel << 6;
        let rem = ((u16::from(CMF) << 8) | u16::from(flg)) % 31;
        [CMF, flg + ((31 - rem) % 31) as u8]
    }

    fn start(&mut self, out: &mut Vec<u8>) {
        if !self.started {
            out.extend_from_slice(&self.header());
            self.started = true;
        }
    }

    /// Compresses every whole block of staged input into `out`.
    pub(crate) fn push(&mut self, input: &[u8], out: &mut Vec<u8>) -> DeviceResult<()> {
        self.staged.extend_from_slice(input);
        if self.staged.len() < TRANSFER_SIZE {
            return Ok(());
        }
        self.start(out);
        while self.staged.len() >= TRANSFER_SIZE {
            let block: Vec<u8> = self.staged.drain(..TRANSFER_SIZE).collect();
            self.adler.update(&block);
            self.write_block(&block, false).map_err(engine_error)?;
        }
        out.append(self.bits.get_mut());
        Ok(())
    }

    /// Emits the staged tail, the final block and the Adler-32 trailer.
    pub(crate) fn finish(&mut self, out: &mut Vec<u8>) -> DeviceResult<()> {
        self.start(out);
        let tail = std::mem::take(&mut self.staged);
        self.adler.update(&tail);
        self.write_block(&tail, true).map_err(engine_error)?;
        self.bits.flush().map_err(engine_error)?;
        out.append(self.bits.get_mut());
        out.extend_from_slice(&self.adler.finish().to_be_bytes());
        Ok(())
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new(self.level);
    }

    fn write_block(&mut self, data: &[u8], last: bool) -> oxiarc_core::Result<()> {
        if self.level == 0 {
            return self.write_stored(data, last);
        }

        let codes = fixed_codes();
        self.bits.write_bit(last)?;
        self.bits.write_bits(1, 2)?;
        for token in self.lz77.compress(data) {
            match token {
                Lz77Token::Literal(byte) => put_symbol(&mut self.bits, u16::from(byte))?,
                Lz77Token::Match { length, distance } => {
                    let (code, extra_bits, extra) = length_to_code(length);
                    put_symbol(&mut self.bits, code)?;
                    self.bits.write_bits(u32::from(extra), extra_bits)?;
                    let (code, extra_bits, extra) = distance_to_code(distance);
                    self.bits
                        .write_bits(u32::from(codes.distance[usize::from(code)]), 5)?;
                    self.bits.write_bits(u32::from(extra), extra_bits)?;
                }
            }
        }
        put_symbol(&mut self.bits, END_OF_BLOCK)
    }

    fn write_stored(&mut self, data: &[u8], last: bool) -> oxiarc_core::Result<()> {
        let mut chunks = data.chunks(MAX_STORED).peekable();
        if chunks.peek().is_none() {
            return self.stored_block(&[], last);
        }
        while let Some(chunk) = chunks.next() {
            self.stored_block(chunk, last && chunks.peek().is_none())?;
        }
        Ok(())
    }

    fn stored_block(&mut self, chunk: &[u8], last: bool) -> oxiarc_core::Result<()> {
        let len = chunk.len() as u16;
        self.bits.write_bit(last)?;
        self.bits.write_bits(0, 2)?;
        self.bits.align_to_byte()?;
        self.bits.write_bits(u32::from(len), 16)?;
        self.bits.write_bits(u32::from(!len), 16)?;
        self.bits.write_bytes(chunk)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Header,
    Blocks,
    Trailer,
    Done,
}

/// Decompressing half of the zlib stream.
pub(crate) struct StreamInflater {
    stage: Stage,
    pending: Vec<u8>,
    bit_offset: u8,
    retry_at: usize,
    window: Vec<u8>,
    adler: Adler32,
    consumed: u64,
}

impl StreamInflater {
    pub(crate) fn new() -> Self {
        Self {
            stage: Stage::Header,
            pending: Vec::new(),
            bit_offset: 0,
            retry_at: 0,
            window: Vec::new(),
            adler: Adler32::new(),
            consumed: 0,
        }
    }

    /// Buffers `input` and decodes every block it completes into `out`.
    ///
    /// Bytes after the trailer are ignored.
    pub(crate) fn push(&mut self, input: &[u8], out: &mut Vec<u8>) -> DeviceResult<()> {
        if self.stage == Stage::Done {
            return Ok(());
        }
        self.pending.extend_from_slice(input);
        loop {
            let progressed = match self.stage {
                Stage::Header => self.header()?,
                Stage::Blocks => self.block(out)?,
                Stage::Trailer => self.trailer()?,
                Stage::Done => {
                    self.pending.clear();
                    return Ok(());
                }
            };
            if !progressed {
                return Ok(());
            }
        }
    }

    /// Decodes what is left; anything short of the trailer is truncation.
    pub(crate) fn finish(&mut self, out: &mut Vec<u8>) -> DeviceResult<()> {
        self.retry_at = 0;
        self.push(&[], out)?;
        if self.stage == Stage::Done {
            return Ok(());
        }
        Err(DeviceError::malformed(
            self.consumed + self.pending.len() as u64,
            "truncated zlib stream",
        ))
    }

    pub(crate) fn reset(&mut self) {
        *self = Self::new();
    }

    fn advance(&mut self, bytes: usize) {
        self.pending.drain(..bytes);
        self.consumed += bytes as u64;
    }

    fn header(&mut self) -> DeviceResult<bool> {
        let [cmf, flg] = match self.pending[..] {
            [cmf, flg, ..] => [cmf, flg],
            _ => return Ok(false),
        };
        if cmf & 0x0f != 8 || cmf >> 4 > 7 {
            return Err(DeviceError::malformed(0, "not a deflate zlib stream"));
        }
        if ((u16::from(cmf) << 8) | u16::from(flg)) % 31 != 0 {
            return Err(DeviceError::malformed(1, "zlib header check failed"));
        }
        if flg & FDICT != 0 {
            return Err(DeviceError::malformed(1, "preset dictionaries are not supported"));
        }
        self.advance(2);
        self.stage = Stage::Blocks;
        Ok(true)
    }

    fn block(&mut self, out: &mut Vec<u8>) -> DeviceResult<bool> {
        if self.pending.len() < self.retry_at {
            return Ok(false);
        }
        let start = self.window.len();
        match decode_block(&self.pending, self.bit_offset, &mut self.window) {
            Ok((mut bits, last)) => {
                let produced = &self.window[start..];
                self.adler.update(produced);
                out.extend_from_slice(produced);
                if last {
                    bits = bits.next_multiple_of(8);
                    self.stage = Stage::Trailer;
                }
                self.bit_offset = (bits % 8) as u8;
                self.advance((bits / 8) as usize);
                self.retry_at = 0;
                if self.window.len() > 2 * WINDOW {
                    let cut = self.window.len() - WINDOW;
                    self.window.drain(..cut);
                }
                Ok(true)
            }
            Err(err) if is_truncation(&err) => {
                self.window.truncate(start);
                self.retry_at = self.pending.len().saturating_mul(2).max(self.pending.len() + 1);
                Ok(false)
            }
            Err(err) => Err(DeviceError::malformed(self.consumed, err.to_string())),
        }
    }

    fn trailer(&mut self) -> DeviceResult<bool> {
        let Some(stored) = self.pending.get(..4) else {
            return Ok(false);
        };
        let stored = u32::from_be_bytes([stored[0], stored[1], stored[2], stored[3]]);
        if stored != self.adler.finish() {
            return Err(DeviceError::malformed(self.consumed, "adler-32 mismatch"));
        }
        self.advance(4);
        self.stage = Stage::Done;
        Ok(true)
    }
}

fn is_truncation(err: &OxiArcError) -> bool {
    match err {
        OxiArcError::UnexpectedEof { .. } => true,
        OxiArcError::Io(io) => io.kind() == io::ErrorKind::UnexpectedEof,
        _ => false,
    }
}

/// Decodes one block starting `skip` bits into `input`, appending the
/// output to `window`. Returns the bit count consumed, including `skip`.
fn decode_block(input: &[u8], skip: u8, window: &mut Vec<u8>) -> oxiarc_core::Result<(u64, bool)> {
    let mut reader = BitReader::new(input);
    reader.skip_bits(skip)?;
    let last = reader.read_bit()?;
    match reader.read_bits(2)? {
        0 => {
            reader.align_to_byte();
            let len = reader.read_bits(16)? as u16;
            let nlen = reader.read_bits(16)? as u16;
            if len != !nlen {
                return Err(OxiArcError::corrupted(
                    reader.bit_position() / 8,
                    "stored block length check failed",
                ));
            }
            let start = window.len();
            window.resize(start + usize::from(len), 0);
            reader.read_bytes(&mut window[start..])?;
        }
        1 => inflate_codes(&mut reader, fixed_litlen_tree()?, fixed_distance_tree()?, window)?,
        2 => {
            let (litlen, distance) = dynamic_trees(&mut reader)?;
            inflate_codes(&mut reader, &litlen, &distance, window)?;
        }
        _ => return Err(OxiArcError::invalid_header("reserved block type")),
    }
    Ok((reader.bits_read(), last))
}

fn dynamic_trees<R: Read>(
    reader: &mut BitReader<R>,
) -> oxiarc_core::Result<(HuffmanTree, HuffmanTree)> {
    let hlit = reader.read_bits(5)? as usize + 257;
    let hdist = reader.read_bits(5)? as usize + 1;
    let hclen = reader.read_bits(4)? as usize + 4;

    let mut header = [0u8; 19];
    for &symbol in &CODE_LENGTH_ORDER[..hclen] {
        header[symbol] = reader.read_bits(3)? as u8;
    }
    let lengths_tree = HuffmanTree::from_code_lengths(&header)?;

    let total = hlit + hdist;
    let mut lengths = Vec::with_capacity(total);
    while lengths.len() < total {
        let (value, repeat) = match lengths_tree.decode(reader)? {
            len @ 0..=15 => (len as u8, 1),
            16 => {
                let Some(&previous) = lengths.last() else {
                    return Err(OxiArcError::corrupted(
                        reader.bit_position() / 8,
                        "length repeat with no previous length",
                    ));
                };
                (previous, reader.read_bits(2)? as usize + 3)
            }
            17 => (0, reader.read_bits(3)? as usize + 3),
            18 => (0, reader.read_bits(7)? as usize + 11),
            _ => return Err(OxiArcError::invalid_huffman(reader.bit_position())),
        };
        if lengths.len() + repeat > total {
            return Err(OxiArcError::corrupted(
                reader.bit_position() / 8,
                "code lengths overflow",
            ));
        }
        lengths.resize(lengths.len() + repeat, value);
    }

    Ok((
        HuffmanTree::from_code_lengths(&lengths[..hlit])?,
        HuffmanTree::from_code_lengths(&lengths[hlit..])?,
    ))
}

fn inflate_codes<R: Read>(
    reader: &mut BitReader<R>,
    litlen: &HuffmanTree,
    distance: &HuffmanTree,
    window: &mut Vec<u8>,
) -> oxiarc_core::Result<()> {
    loop {
        match litlen.decode(reader)? {
            byte @ 0..=255 => window.push(byte as u8),
            END_OF_BLOCK => return Ok(()),
            symbol @ 257..=285 => {
                let extra = reader.read_bits(LENGTH_EXTRA_BITS[usize::from(symbol - 257)])?;
                let length = usize::from(decode_length(symbol, extra as u16));

                let code = distance.decode(reader)?;
                if code >= 30 {
                    return Err(OxiArcError::corrupted(
                        reader.bit_position() / 8,
                        format!("invalid distance code {code}"),
                    ));
                }
                let extra = reader.read_bits(DISTANCE_EXTRA_BITS[usize::from(code)])?;
                let back = usize::from(decode_distance(code, extra as u16));
                if back > window.len() {
                    return Err(OxiArcError::invalid_distance(back, window.len()));
                }
                let from = window.len() - back;
                for i in 0..length {
                    let byte = window[from + i];
                    window.push(byte);
                }
            }
            symbol => {
                return Err(OxiArcError::corrupted(
                    reader.bit_position() / 8,
                    format!("invalid literal/length symbol {symbol}"),
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compress(plain: &[u8], level: u8) -> Vec<u8> {
        let mut deflater = StreamDeflater::new(level);
        let mut out = Vec::new();
        for chunk in plain.chunks(1000) {
            deflater.push(chunk, &mut out).unwrap();
        }
        deflater.finish(&mut out).unwrap();
        out
    }

    fn text(len: usize) -> Vec<u8> {
        b"pack my box with five dozen liquor jugs. "
            .iter()
            .copied()
            .cycle()
            .take(len)
            .collect()
    }

    #[test]
    fn header_passes_the_check() {
        for level in 0..=9 {
            let header = StreamDeflater::new(level).header();
            assert_eq!(header[0], CMF);
            assert_eq!(((u16::from(header[0]) << 8) | u16::from(header[1])) % 31, 0);
        }
    }

    #[test]
    fn output_decodes_with_the_whole_stream_decoder() {
        let plain = text(50_000);
        for level in [0, 1, 6, 9] {
            let packed = compress(&plain, level);
            assert_eq!(oxiarc_deflate::zlib_decompress(&packed).unwrap(), plain);
        }
    }

    #[test]
    fn whole_stream_encoder_output_decodes_incrementally() {
        let plain = text(70_000);
        let packed = oxiarc_deflate::zlib_compress(&plain, 6).unwrap();

        let mut inflater = StreamInflater::new();
        let mut out = Vec::new();
        for byte in &packed {
            inflater.push(std::slice::from_ref(byte), &mut out).unwrap();
        }
        inflater.finish(&mut out).unwrap();
        assert_eq!(out, plain);
    }

    #[test]
    fn blocks_come_out_before_the_trailer() {
        let plain = text(3 * TRANSFER_SIZE);
        let mut deflater = StreamDeflater::new(6);
        let mut packed = Vec::new();
        deflater.push(&plain, &mut packed).unwrap();
        assert!(packed.len() > 2);

        let mut inflater = StreamInflater::new();
        let mut out = Vec::new();
        inflater.push(&packed, &mut out).unwrap();
        assert!(out.len() >= 2 * TRANSFER_SIZE);
        assert_eq!(out[..], plain[..out.len()]);
    }

    #[test]
    fn trailing_bytes_are_ignored() {
        let mut packed = compress(b"abc", 6);
        packed.extend_from_slice(b"junk");
        let mut inflater = StreamInflater::new();
        let mut out = Vec::new();
        inflater.push(&packed, &mut out).unwrap();
        inflater.finish(&mut out).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn damage_is_reported() {
        let mut packed = compress(&text(5000), 6);
        let last = packed.len() - 1;
        packed[last] ^= 0xff;
        let mut inflater = StreamInflater::new();
        let mut out = Vec::new();
        assert!(inflater.push(&packed, &mut out).is_err());

        assert!(StreamInflater::new().push(&[0x78, 0x00], &mut out).is_err());
        assert!(StreamInflater::new().push(&[0x78, 0x9c, 0xff], &mut out).is_err());
    }

    #[test]
    fn truncation_fails_at_finish() {
        let packed = compress(&text(5000), 6);
        let mut inflater = StreamInflater::new();
        let mut out = Vec::new();
        inflater.push(&packed[..packed.len() - 2], &mut out).unwrap();
        assert!(inflater.finish(&mut out).is_err());
    }
}
