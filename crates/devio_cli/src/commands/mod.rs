//! CLI command implementations.
//!
//! Each command takes an already-open input device and output handle so
//! the same code serves files, stdio and memory devices in tests.

pub mod codec;
pub mod compress;
pub mod crypt;
pub mod digest;
pub mod random;
pub mod stdio;

use crate::error::{CliError, CliResult};
use devio_core::{Device, DeviceHandle, ErrorCode};
use tracing::debug;

const CHUNK: usize = 64 * 1024;

/// Copies `src` into `dst` until end of stream.
///
/// # Errors
///
/// Returns `Transfer` naming the side whose device latched an error.
pub fn transfer(src: &mut Device, dst: &mut Device) -> CliResult<u64> {
    let mut total = 0u64;
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = src.read(&mut buf);
        if n > 0 {
            let written = dst.write(&buf[..n]);
            total += written as u64;
            if written < n {
                let code = dst.error().unwrap_or(ErrorCode::Write);
                return Err(CliError::transfer("output", total, code));
            }
        }
        if n < buf.len() {
            if let Some(code) = src.error() {
                return Err(CliError::transfer("input", total, code));
            }
            if src.eof() {
                debug!(bytes = total, "transfer complete");
                return Ok(total);
            }
        }
    }
}

/// Closes a filter and flushes the device under it, reporting the first
/// failure. The caller still owns and closes `inner`.
fn finish_chain(outer: &mut Device, inner: &DeviceHandle) -> CliResult<()> {
    let outer = outer.close();
    let inner = inner.lock().flush();
    outer.and(inner)?;
    Ok(())
}
