//! Random command.

use super::transfer;
use crate::error::CliResult;
use devio_core::DeviceHandle;
use devio_filters::{limit, random};
use tracing::info;

/// Runs `random`: writes `bytes` bytes from the OS CSPRNG to `output`.
///
/// # Errors
///
/// Returns the first device or transfer failure.
pub fn run(output: &DeviceHandle, bytes: u64) -> CliResult<()> {
    let source = random("r")?.into_handle();
    let mut window = limit(&source, 0, bytes, "r")?;
    let moved = transfer(&mut window, &mut output.lock())?;
    output.lock().flush()?;
    info!(bytes = moved, "random bytes written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use devio_testkit::{contents, memory_sink};

    #[test]
    fn writes_the_requested_count() {
        let sink = memory_sink();
        run(&sink, 100_000).unwrap();
        assert_eq!(contents(&sink).len(), 100_000);

        let sink = memory_sink();
        run(&sink, 0).unwrap();
        assert!(contents(&sink).is_empty());
    }
}
