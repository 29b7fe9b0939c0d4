//! Encrypt and decrypt commands.
//!
//! Encryption pads with PKCS#7 to the AES block size unless `--no-padding`
//! is given, in which case CFB and OFB accept any length and the block
//! modes require whole blocks.

use super::transfer;
use crate::error::{CliError, CliResult};
use clap::ValueEnum;
use devio_core::{Device, DeviceHandle};
use devio_filters::{
    aes_decrypt, aes_encrypt, hex_decode, pad_decode, pad_encode, AesConfig, CipherMode,
    PaddingScheme, BLOCK_SIZE,
};
use tracing::info;

/// Chaining modes selectable with `--mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Electronic codebook.
    Ecb,
    /// Cipher block chaining.
    Cbc,
    /// Propagating cipher block chaining.
    Pcbc,
    /// Cipher feedback (128-bit).
    Cfb,
    /// Output feedback.
    Ofb,
}

impl From<Mode> for CipherMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Ecb => Self::Ecb,
            Mode::Cbc => Self::Cbc,
            Mode::Pcbc => Self::Pcbc,
            Mode::Cfb => Self::Cfb,
            Mode::Ofb => Self::Ofb,
        }
    }
}

/// Cipher parameters shared by both directions.
#[derive(Debug, Clone)]
pub struct CryptOptions {
    /// Hex-encoded key, 32, 48 or 64 digits.
    pub key: String,
    /// Hex-encoded IV, 32 digits. All zero when absent.
    pub iv: Option<String>,
    /// Chaining mode.
    pub mode: Mode,
    /// Skip PKCS#7 padding.
    pub no_padding: bool,
}

/// Decodes a hex argument through the hex filter.
fn unhex(text: &str, argument: &'static str) -> CliResult<Vec<u8>> {
    let invalid = || CliError::InvalidHex { argument };
    let digits = Device::open_cstring(text.trim(), "r")
        .map_err(|_| invalid())?
        .into_handle();
    let mut decoder = hex_decode(&digits, "r")?;
    let mut bytes = vec![0u8; text.len() / 2 + 1];
    let n = decoder.read(&mut bytes);
    if decoder.error().is_some() || !decoder.eof() {
        return Err(invalid());
    }
    bytes.truncate(n);
    Ok(bytes)
}

impl CryptOptions {
    fn config(&self) -> CliResult<AesConfig> {
        let key = unhex(&self.key, "key")?;
        let mut config = AesConfig::new(&key, self.mode.into())?;
        if let Some(iv) = &self.iv {
            config = config.with_iv(&unhex(iv, "iv")?)?;
        }
        Ok(config)
    }
}

/// Runs `encrypt`.
///
/// # Errors
///
/// Returns `InvalidHex` or a filter error for bad key material, or the
/// first device or transfer failure.
pub fn encrypt(input: &mut Device, output: &DeviceHandle, options: &CryptOptions) -> CliResult<()> {
    let config = options.config()?;
    let cipher = aes_encrypt(output, &config, "w")?.into_handle();
    let moved = if options.no_padding {
        transfer(input, &mut cipher.lock())?
    } else {
        let mut padder = pad_encode(&cipher, PaddingScheme::Pkcs7, BLOCK_SIZE, "w")?;
        let moved = transfer(input, &mut padder)?;
        padder.close()?;
        moved
    };
    cipher.lock().close()?;
    output.lock().flush()?;
    info!(mode = ?options.mode, padded = !options.no_padding, bytes = moved, "encrypted");
    Ok(())
}

/// Runs `decrypt`.
///
/// # Errors
///
/// As [`encrypt`]; a bad final padding block fails with `BadMessage`.
pub fn decrypt(input: Device, output: &DeviceHandle, options: &CryptOptions) -> CliResult<()> {
    let config = options.config()?;
    let input = input.into_handle();
    let mut plain = aes_decrypt(&input, &config, "r")?;
    if !options.no_padding {
        let cipher_handle = plain.into_handle();
        plain = pad_decode(&cipher_handle, PaddingScheme::Pkcs7, BLOCK_SIZE, "r")?;
    }
    let moved = transfer(&mut plain, &mut output.lock())?;
    output.lock().flush()?;
    info!(mode = ?options.mode, bytes = moved, "decrypted");
    Ok(())
}
