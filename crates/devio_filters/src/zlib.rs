//! zlib (RFC 1950) compression filters.
//!
//! Compression emits a deflate block for every 4 KiB of input, and
//! decompression yields each block's output as soon as the block is
//! complete. Only the final block and the Adler-32 trailer wait for the end
//! of the stream: read mode at the inner device's end of stream, write mode
//! at `flush()` or `close()`.

use crate::codec::{CodecFilter, Fault, StreamCodec};
use crate::error::{FilterError, FilterResult};
use crate::zstream::{StreamDeflater, StreamInflater};
use devio_core::{Device, DeviceHandle, DeviceResult};
use tracing::debug;

/// Default compression level.
pub const DEFAULT_LEVEL: u32 = 6;

/// zlib filter configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZlibConfig {
    /// Compression level, 0 (store) to 9 (best).
    pub level: u32,
}

impl Default for ZlibConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LEVEL,
        }
    }
}

impl ZlibConfig {
    /// Create a config with the default level.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            level: DEFAULT_LEVEL,
        }
    }

    /// Set the compression level.
    #[must_use]
    pub const fn level(mut self, level: u32) -> Self {
        self.level = level;
        self
    }

    fn validated_level(&self) -> FilterResult<u8> {
        u8::try_from(self.level)
            .ok()
            .filter(|level| *level <= 9)
            .ok_or(FilterError::InvalidLevel { level: self.level })
    }
}

enum Engine {
    Deflate(StreamDeflater),
    Inflate(StreamInflater),
}

/// zlib transform.
pub struct ZlibCodec {
    engine: Engine,
    consumed: u64,
}

impl ZlibCodec {
    /// A compressing transform.
    ///
    /// # Errors
    ///
    /// Returns `InvalidLevel` for a level above 9.
    pub fn deflater(config: &ZlibConfig) -> FilterResult<Self> {
        let level = config.validated_level()?;
        Ok(Self {
            engine: Engine::Deflate(StreamDeflater::new(level)),
            consumed: 0,
        })
    }

    /// A decompressing transform.
    #[must_use]
    pub fn inflater() -> Self {
        Self {
            engine: Engine::Inflate(StreamInflater::new()),
            consumed: 0,
        }
    }
}

impl StreamCodec for ZlibCodec {
    fn name(&self) -> &'static str {
        match self.engine {
            Engine::Deflate(_) => "deflate",
            Engine::Inflate(_) => "inflate",
        }
    }

    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<(), Fault> {
        match &mut self.engine {
            Engine::Deflate(engine) => engine.push(input, out)?,
            Engine::Inflate(engine) => engine.push(input, out)?,
        }
        self.consumed += input.len() as u64;
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> DeviceResult<()> {
        let before = out.len();
        match &mut self.engine {
            Engine::Deflate(engine) => engine.finish(out)?,
            Engine::Inflate(engine) => engine.finish(out)?,
        }
        debug!(
            codec = self.name(),
            input = self.consumed,
            tail = out.len() - before,
            "zlib stream finished"
        );
        Ok(())
    }

    fn reset(&mut self) {
        match &mut self.engine {
            Engine::Deflate(engine) => engine.reset(),
            Engine::Inflate(engine) => engine.reset(),
        }
        self.consumed = 0;
    }

    fn finish_on_flush(&self) -> bool {
        true
    }
}

/// Opens a compressing filter.
///
/// In read mode the device yields the zlib stream for the inner device's
/// contents. In write mode every 4 KiB written reaches the inner device as a
/// compressed block right away; `flush()` or `close()` emits the last block
/// and the trailer, and writes after that fail.
///
/// # Errors
///
/// Returns `InvalidArgument` for a level above 9, or `InvalidMode` unless
/// `mode` selects exactly one direction.
pub fn deflate(inner: &DeviceHandle, config: &ZlibConfig, mode: &str) -> DeviceResult<Device> {
    let codec = ZlibCodec::deflater(config)?;
    CodecFilter::open(inner, codec, mode)
}

/// Opens a decompressing filter.
///
/// # Errors
///
/// Returns `InvalidMode` unless `mode` selects exactly one direction.
/// Corrupt input sets `BadMessage`, as does a stream that ends before its
/// trailer. Output from the blocks before the damage is still delivered.
///
/// # Example
///
/// ```rust
/// use devio_core::{Device, Growth};
/// use devio_filters::{deflate, inflate, ZlibConfig};
///
/// let packed = Device::open_dynamic(Growth::Exponential, "w+").unwrap().into_handle();
/// let mut writer = deflate(&packed, &ZlibConfig::default(), "w").unwrap();
/// writer.write(b"hello hello hello");
/// writer.close().unwrap();
/// packed.lock().rewind().unwrap();
///
/// let mut reader = inflate(&packed, "r").unwrap();
/// let mut out = [0u8; 32];
/// assert_eq!(reader.read(&mut out), 17);
/// assert_eq!(&out[..17], b"hello hello hello");
/// ```
pub fn inflate(inner: &DeviceHandle, mode: &str) -> DeviceResult<Device> {
    CodecFilter::open(inner, ZlibCodec::inflater(), mode)
}
