//! Hash command.

use crate::error::CliResult;
use clap::ValueEnum;
use devio_core::{Device, DeviceHandle};
use devio_filters::{hash, hex_encode, HashAlgorithm};
use tracing::info;

/// Digest algorithms selectable with `--algorithm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Algorithm {
    /// MD5 (128-bit).
    Md5,
    /// SHA-1 (160-bit).
    Sha1,
    /// SHA-256.
    Sha256,
}

impl From<Algorithm> for HashAlgorithm {
    fn from(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Md5 => Self::Md5,
            Algorithm::Sha1 => Self::Sha1,
            Algorithm::Sha256 => Self::Sha256,
        }
    }
}

/// Runs `hash`: writes the hex digest of `input` and a newline to `output`.
///
/// # Errors
///
/// Returns the input's error code if reading it fails.
pub fn run(input: Device, output: &DeviceHandle, algorithm: Algorithm) -> CliResult<()> {
    let input = input.into_handle();
    let digest = hash(&input, algorithm.into(), "r")?.into_handle();
    let mut text = hex_encode(&digest, "r")?;

    let mut buf = [0u8; 2 * 32];
    let n = text.try_read(&mut buf)?;
    let mut output = output.lock();
    output.write_exact(&buf[..n])?;
    output.write_exact(b"\n")?;
    output.flush()?;
    info!(?algorithm, "digest written");
    Ok(())
}
