//! Encode and decode commands.

use super::{finish_chain, transfer};
use crate::error::CliResult;
use clap::ValueEnum;
use devio_core::{Device, DeviceHandle};
use devio_filters::{base64_decode, base64_encode, hex_decode, hex_encode, Base64Config};
use tracing::info;

/// Text codecs selectable with `--codec`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Codec {
    /// Lowercase base16.
    Hex,
    /// Standard base64, padded.
    Base64,
    /// URL-safe base64, unpadded.
    Base64url,
}

fn open(codec: Codec, decode: bool, output: &DeviceHandle) -> CliResult<Device> {
    let device = match (codec, decode) {
        (Codec::Hex, false) => hex_encode(output, "w")?,
        (Codec::Hex, true) => hex_decode(output, "w")?,
        (Codec::Base64, false) => base64_encode(output, &Base64Config::default(), "w")?,
        (Codec::Base64, true) => base64_decode(output, &Base64Config::default(), "w")?,
        (Codec::Base64url, false) => base64_encode(output, &Base64Config::url_safe(), "w")?,
        (Codec::Base64url, true) => base64_decode(output, &Base64Config::url_safe(), "w")?,
    };
    Ok(device)
}

/// Runs `encode` or `decode`.
///
/// # Errors
///
/// Returns the first device or transfer failure; malformed input to a
/// decoder surfaces as a `BadMessage` transfer error.
pub fn run(input: &mut Device, output: &DeviceHandle, codec: Codec, decode: bool) -> CliResult<()> {
    let mut filter = open(codec, decode, output)?;
    let moved = transfer(input, &mut filter)?;
    finish_chain(&mut filter, output)?;
    info!(?codec, decode, bytes = moved, "codec finished");
    Ok(())
}
