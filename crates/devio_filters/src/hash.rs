//! Message digest filters.
//!
//! In read mode the filter drains its inner device on first use and then
//! reads as the digest bytes. In write mode it digests everything written
//! and emits the digest into the inner device at close.

use crate::inner::{resolve_target, Inner, TRANSFER_SIZE};
use devio_core::{Backend, Device, DeviceError, DeviceHandle, DeviceResult, OpenMode, Whence};
use sha2::digest::DynDigest;
use std::fmt;
use tracing::debug;

/// Supported digest algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// MD5 (RFC 1321), 16-byte digest.
    Md5,
    /// SHA-1 (FIPS 180-4), 20-byte digest.
    Sha1,
    /// SHA-256 (FIPS 180-4), 32-byte digest.
    Sha256,
}

impl HashAlgorithm {
    /// Digest length in bytes.
    #[must_use]
    pub const fn digest_len(self) -> usize {
        match self {
            Self::Md5 => 16,
            Self::Sha1 => 20,
            Self::Sha256 => 32,
        }
    }

    /// Lowercase algorithm name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Md5 => "md5",
            Self::Sha1 => "sha1",
            Self::Sha256 => "sha256",
        }
    }

    fn hasher(self) -> Box<dyn DynDigest + Send> {
        match self {
            Self::Md5 => Box::new(md5::Md5::default()),
            Self::Sha1 => Box::new(sha1::Sha1::default()),
            Self::Sha256 => Box::new(sha2::Sha256::default()),
        }
    }
}

/// Digest filter backend.
pub struct HashFilter {
    inner: Inner,
    algorithm: HashAlgorithm,
    hasher: Box<dyn DynDigest + Send>,
    reading: bool,
    digest: Option<Box<[u8]>>,
    position: u64,
}

impl HashFilter {
    /// Creates a digest filter over `inner`.
    #[must_use]
    pub fn new(inner: &DeviceHandle, algorithm: HashAlgorithm) -> Self {
        Self {
            inner: Inner::new(inner),
            algorithm,
            hasher: algorithm.hasher(),
            reading: true,
            digest: None,
            position: 0,
        }
    }

    /// The digest, once computed.
    pub fn digest(&self) -> Option<&[u8]> {
        self.digest.as_deref()
    }

    fn compute(&mut self) -> DeviceResult<&[u8]> {
        if self.digest.is_none() {
            let mut chunk = vec![0u8; TRANSFER_SIZE];
            loop {
                match self.inner.read(&mut chunk)? {
                    0 => break,
                    n => self.hasher.update(&chunk[..n]),
                }
            }
            self.digest = Some(self.hasher.finalize_reset());
            debug!(algorithm = self.algorithm.name(), "inner stream digested");
        }
        Ok(self.digest.as_deref().unwrap_or_default())
    }
}

impl Backend for HashFilter {
    fn what(&self) -> &'static str {
        self.algorithm.name()
    }

    fn open(&mut self, mode: &OpenMode) -> DeviceResult<()> {
        mode.require_one_direction(self.algorithm.name())?;
        self.reading = mode.read;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        let start = usize::try_from(self.position).unwrap_or(usize::MAX);
        let digest = self.compute()?;
        let Some(rest) = digest.get(start..) else {
            return Ok(0);
        };
        let n = rest.len().min(buf.len());
        buf[..n].copy_from_slice(&rest[..n]);
        self.position += n as u64;
        Ok(n)
    }

    fn write(&mut self, buf: &[u8]) -> DeviceResult<usize> {
        if self.digest.is_some() {
            return Err(DeviceError::invalid_argument("digest already emitted"));
        }
        self.hasher.update(buf);
        self.position += buf.len() as u64;
        Ok(buf.len())
    }

    fn close(&mut self) -> DeviceResult<()> {
        if self.reading || self.digest.is_some() {
            return Ok(());
        }
        let digest = self.hasher.finalize_reset();
        self.inner.write_all(&digest)?;
        self.digest = Some(digest);
        self.inner.flush()
    }

    fn tell64(&mut self) -> DeviceResult<u64> {
        Ok(self.position)
    }

    fn seek64(&mut self, offset: i64, whence: Whence) -> DeviceResult<u64> {
        if !self.reading {
            return Err(DeviceError::unsupported(self.what(), "seek"));
        }
        let len = self.algorithm.digest_len() as u64;
        let target = resolve_target(offset, whence, self.position, || Ok(len))?;
        if target > len {
            return Err(DeviceError::out_of_range(target));
        }
        self.position = target;
        Ok(target)
    }
}

impl fmt::Debug for HashFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HashFilter")
            .field("algorithm", &self.algorithm)
            .field("reading", &self.reading)
            .field("position", &self.position)
            .field("done", &self.digest.is_some())
            .finish()
    }
}

/// Opens a digest filter.
///
/// # Errors
///
/// Returns `InvalidMode` unless `mode` selects exactly one direction.
///
/// # Example
///
/// ```rust
/// use devio_core::Device;
/// use devio_filters::{hash, HashAlgorithm};
///
/// let inner = Device::open_cstring("abc", "r").unwrap().into_handle();
/// let mut md5 = hash(&inner, HashAlgorithm::Md5, "r").unwrap();
/// let mut digest = [0u8; 16];
/// assert_eq!(md5.read(&mut digest), 16);
/// assert_eq!(digest[..4], [0x90, 0x01, 0x50, 0x98]);
/// ```
pub fn hash(inner: &DeviceHandle, algorithm: HashAlgorithm, mode: &str) -> DeviceResult<Device> {
    Device::open_custom(HashFilter::new(inner, algorithm), mode)
}
