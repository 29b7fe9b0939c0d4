//! Compress and decompress commands.

use super::{finish_chain, transfer};
use crate::error::CliResult;
use devio_core::{Device, DeviceHandle};
use devio_filters::{deflate, inflate, ZlibConfig};
use tracing::info;

/// Runs `compress` at `level`.
///
/// # Errors
///
/// Returns `InvalidArgument` for a level above 9, or the first device or
/// transfer failure.
pub fn compress(input: &mut Device, output: &DeviceHandle, level: u32) -> CliResult<()> {
    let mut filter = deflate(output, &ZlibConfig::new().level(level), "w")?;
    let moved = transfer(input, &mut filter)?;
    finish_chain(&mut filter, output)?;
    info!(level, bytes = moved, "compressed");
    Ok(())
}

/// Runs `decompress`.
///
/// # Errors
///
/// Corrupt input fails with `BadMessage` as soon as the damaged block is
/// decoded; a stream cut short fails the same way when it is closed.
pub fn decompress(input: &mut Device, output: &DeviceHandle) -> CliResult<()> {
    let mut filter = inflate(output, "w")?;
    let moved = transfer(input, &mut filter)?;
    finish_chain(&mut filter, output)?;
    info!(bytes = moved, "decompressed");
    Ok(())
}
