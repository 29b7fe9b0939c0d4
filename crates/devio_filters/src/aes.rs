//! AES block cipher filters.
//!
//! Implements the classic chaining modes over the AES block primitive:
//! ECB, CBC, PCBC, CFB (128-bit feedback) and OFB. CTR is rejected.
//!
//! ECB, CBC and PCBC need whole blocks; combine them with a PKCS#7
//! [`crate::pad_encode`] filter for arbitrary lengths. CFB and OFB are
//! stream modes and transform a short final block as-is.

use crate::codec::{CodecFilter, Fault, Location, StreamCodec};
use crate::error::{FilterError, FilterResult};
use ::aes::cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit};
use ::aes::{Aes128, Aes192, Aes256};
use devio_core::{Device, DeviceError, DeviceFlags, DeviceHandle, DeviceResult, OpenMode};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

type Block = [u8; BLOCK_SIZE];

/// Block chaining mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherMode {
    /// Electronic codebook. No IV.
    Ecb,
    /// Cipher block chaining.
    Cbc,
    /// Propagating cipher block chaining.
    Pcbc,
    /// Cipher feedback, 128-bit segments.
    Cfb,
    /// Output feedback.
    Ofb,
    /// Counter mode. Not supported.
    Ctr,
}

impl CipherMode {
    /// Uppercase mode name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ecb => "ECB",
            Self::Cbc => "CBC",
            Self::Pcbc => "PCBC",
            Self::Cfb => "CFB",
            Self::Ofb => "OFB",
            Self::Ctr => "CTR",
        }
    }

    const fn is_stream(self) -> bool {
        matches!(self, Self::Cfb | Self::Ofb)
    }
}

/// AES filter configuration. Key material is wiped on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AesConfig {
    key: Vec<u8>,
    iv: Block,
    #[zeroize(skip)]
    mode: CipherMode,
}

impl AesConfig {
    /// Creates a configuration with an all-zero IV.
    ///
    /// # Errors
    ///
    /// Returns `InvalidKeyLength` unless `key` is 16, 24 or 32 bytes.
    pub fn new(key: &[u8], mode: CipherMode) -> FilterResult<Self> {
        if !matches!(key.len(), 16 | 24 | 32) {
            return Err(FilterError::InvalidKeyLength { len: key.len() });
        }
        Ok(Self {
            key: key.to_vec(),
            iv: [0; BLOCK_SIZE],
            mode,
        })
    }

    /// Sets the initialization vector. Ignored by ECB.
    ///
    /// # Errors
    ///
    /// Returns `InvalidIvLength` unless `iv` is 16 bytes.
    pub fn with_iv(mut self, iv: &[u8]) -> FilterResult<Self> {
        self.iv = iv
            .try_into()
            .map_err(|_| FilterError::InvalidIvLength { len: iv.len() })?;
        Ok(self)
    }

    /// The chaining mode.
    #[must_use]
    pub fn mode(&self) -> CipherMode {
        self.mode
    }

    /// Key length in bytes.
    #[must_use]
    pub fn key_len(&self) -> usize {
        self.key.len()
    }
}

impl fmt::Debug for AesConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AesConfig")
            .field("key", &"[REDACTED]")
            .field("mode", &self.mode)
            .finish()
    }
}

/// Expanded key schedule; wiped on drop.
enum Cipher {
    Aes128(Aes128),
    Aes192(Aes192),
    Aes256(Aes256),
}

impl Cipher {
    fn new(key: &[u8]) -> FilterResult<Self> {
        let invalid = |_| FilterError::InvalidKeyLength { len: key.len() };
        match key.len() {
            16 => Aes128::new_from_slice(key).map(Self::Aes128).map_err(invalid),
            24 => Aes192::new_from_slice(key).map(Self::Aes192).map_err(invalid),
            32 => Aes256::new_from_slice(key).map(Self::Aes256).map_err(invalid),
            len => Err(FilterError::InvalidKeyLength { len }),
        }
    }

    fn encrypt(&self, block: &mut Block) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.encrypt_block(block),
            Self::Aes192(c) => c.encrypt_block(block),
            Self::Aes256(c) => c.encrypt_block(block),
        }
    }

    fn decrypt(&self, block: &mut Block) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(c) => c.decrypt_block(block),
            Self::Aes192(c) => c.decrypt_block(block),
            Self::Aes256(c) => c.decrypt_block(block),
        }
    }
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct ChainState {
    iv: Block,
    chain: Block,
    carry: Block,
    carry_len: usize,
}

fn xor(into: &mut Block, with: &Block) {
    for (a, b) in into.iter_mut().zip(with) {
        *a ^= b;
    }
}

#[cfg(any(target_arch = "x86", target_arch = "x86_64"))]
fn hardware_aes() -> bool {
    std::arch::is_x86_feature_detected!("aes")
}

#[cfg(target_arch = "aarch64")]
fn hardware_aes() -> bool {
    std::arch::is_aarch64_feature_detected!("aes")
}

#[cfg(not(any(target_arch = "x86", target_arch = "x86_64", target_arch = "aarch64")))]
fn hardware_aes() -> bool {
    false
}

/// AES transform in one chaining mode and direction.
pub struct AesCodec {
    cipher: Cipher,
    mode: CipherMode,
    decrypt: bool,
    state: ChainState,
    accelerated: bool,
    offset: u64,
}

impl AesCodec {
    fn new(config: &AesConfig, decrypt: bool) -> FilterResult<Self> {
        if config.mode == CipherMode::Ctr {
            return Err(FilterError::UnsupportedCipherMode { mode: "CTR" });
        }
        Ok(Self {
            cipher: Cipher::new(&config.key)?,
            mode: config.mode,
            decrypt,
            state: ChainState {
                iv: config.iv,
                chain: config.iv,
                carry: [0; BLOCK_SIZE],
                carry_len: 0,
            },
            accelerated: false,
            offset: 0,
        })
    }

    /// An encrypting transform.
    ///
    /// # Errors
    ///
    /// Returns `UnsupportedCipherMode` for CTR, or `InvalidKeyLength`.
    pub fn encryptor(config: &AesConfig) -> FilterResult<Self> {
        Self::new(config, false)
    }

    /// A decrypting transform.
    ///
    /// # Errors
    ///
    /// As [`Self::encryptor`].
    pub fn decryptor(config: &AesConfig) -> FilterResult<Self> {
        Self::new(config, true)
    }

    fn keystream(&self) -> Block {
        let mut stream = self.state.chain;
        self.cipher.encrypt(&mut stream);
        stream
    }

    fn process_block(&mut self, block: &mut Block) {
        let chain = &mut self.state.chain;
        match (self.mode, self.decrypt) {
            (CipherMode::Ecb, false) => self.cipher.encrypt(block),
            (CipherMode::Ecb, true) => self.cipher.decrypt(block),
            (CipherMode::Cbc, false) => {
                xor(block, chain);
                self.cipher.encrypt(block);
                *chain = *block;
            }
            (CipherMode::Cbc, true) => {
                let cipher_text = *block;
                self.cipher.decrypt(block);
                xor(block, chain);
                *chain = cipher_text;
            }
            (CipherMode::Pcbc, false) => {
                let plain = *block;
                xor(block, chain);
                self.cipher.encrypt(block);
                *chain = plain;
                xor(chain, block);
            }
            (CipherMode::Pcbc, true) => {
                let cipher_text = *block;
                self.cipher.decrypt(block);
                xor(block, chain);
                *chain = cipher_text;
                xor(chain, block);
            }
            (CipherMode::Cfb, decrypt) => {
                let mut stream = *chain;
                self.cipher.encrypt(&mut stream);
                let cipher_text = if decrypt { *block } else { [0; BLOCK_SIZE] };
                xor(block, &stream);
                *chain = if decrypt { cipher_text } else { *block };
            }
            (CipherMode::Ofb, _) => {
                self.cipher.encrypt(chain);
                xor(block, chain);
            }
            (CipherMode::Ctr, _) => {}
        }
    }
}

impl StreamCodec for AesCodec {
    fn name(&self) -> &'static str {
        if self.decrypt {
            "aes_decrypt"
        } else {
            "aes_encrypt"
        }
    }

    fn open(&mut self, mode: &OpenMode) -> DeviceResult<()> {
        self.accelerated = !mode.no_accel && hardware_aes();
        Ok(())
    }

    fn update(&mut self, input: &[u8], out: &mut Vec<u8>) -> Result<(), Fault> {
        out.reserve(input.len() + BLOCK_SIZE);
        let mut rest = input;
        while !rest.is_empty() {
            let at = self.state.carry_len;
            let take = (BLOCK_SIZE - at).min(rest.len());
            self.state.carry[at..at + take].copy_from_slice(&rest[..take]);
            self.state.carry_len += take;
            rest = &rest[take..];
            if self.state.carry_len == BLOCK_SIZE {
                let mut block = self.state.carry;
                self.process_block(&mut block);
                out.extend_from_slice(&block);
                block.zeroize();
                self.state.carry_len = 0;
            }
        }
        self.offset += input.len() as u64;
        Ok(())
    }

    fn finish(&mut self, out: &mut Vec<u8>) -> DeviceResult<()> {
        let len = std::mem::take(&mut self.state.carry_len);
        if len == 0 {
            return Ok(());
        }
        if !self.mode.is_stream() {
            return Err(DeviceError::malformed(
                self.offset - len as u64,
                format!("{} needs whole {BLOCK_SIZE}-byte blocks, got {len} trailing bytes", self.mode.name()),
            ));
        }
        let mut stream = self.keystream();
        let mut tail = self.state.carry;
        xor(&mut tail, &stream);
        out.extend_from_slice(&tail[..len]);
        stream.zeroize();
        tail.zeroize();
        Ok(())
    }

    fn reset(&mut self) {
        self.state.chain = self.state.iv;
        self.state.carry.zeroize();
        self.state.carry_len = 0;
        self.offset = 0;
    }

    fn input_hint(&self, wanted: usize) -> usize {
        wanted.div_ceil(BLOCK_SIZE).max(1).saturating_mul(BLOCK_SIZE)
    }

    fn locate(&self, target: u64, reading: bool) -> Option<Location> {
        let block = BLOCK_SIZE as u64;
        match (self.mode, reading) {
            (CipherMode::Ecb, true) => Some(Location {
                inner: target / block * block,
                skip: target % block,
            }),
            (CipherMode::Ecb, false) => (target % block == 0).then_some(Location::exact(target)),
            (_, true) => Some(Location {
                inner: 0,
                skip: target,
            }),
            (_, false) => (target == 0).then_some(Location::exact(0)),
        }
    }

    fn logical_len(&self, inner_len: u64, _reading: bool) -> Option<u64> {
        Some(inner_len)
    }

    fn flags(&self) -> DeviceFlags {
        if self.accelerated {
            DeviceFlags::HW_ACCEL
        } else {
            DeviceFlags::empty()
        }
    }
}

/// Opens a filter that encrypts with AES.
///
/// # Errors
///
/// Returns `Unsupported` for [`CipherMode::Ctr`], or `InvalidMode` unless
/// `mode` selects exactly one direction.
///
/// # Example
///
/// ```rust
/// use devio_core::{Device, Growth};
/// use devio_filters::{aes_encrypt, AesConfig, CipherMode};
///
/// let sink = Device::open_dynamic(Growth::Minimal, "w").unwrap().into_handle();
/// let config = AesConfig::new(&[7u8; 16], CipherMode::Cbc).unwrap();
/// let mut cipher = aes_encrypt(&sink, &config, "w").unwrap();
/// assert_eq!(cipher.write(&[0u8; 32]), 32);
/// cipher.close().unwrap();
/// assert_eq!(sink.lock().contents().unwrap().len(), 32);
/// ```
pub fn aes_encrypt(inner: &DeviceHandle, config: &AesConfig, mode: &str) -> DeviceResult<Device> {
    let codec = AesCodec::encryptor(config)?;
    CodecFilter::open(inner, codec, mode)
}

/// Opens a filter that decrypts with AES.
///
/// # Errors
///
/// As [`aes_encrypt`]. A trailing partial block in ECB, CBC or PCBC sets
/// `BadMessage`.
pub fn aes_decrypt(inner: &DeviceHandle, config: &AesConfig, mode: &str) -> DeviceResult<Device> {
    let codec = AesCodec::decryptor(config)?;
    CodecFilter::open(inner, codec, mode)
}
