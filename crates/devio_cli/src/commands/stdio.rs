//! Input and output endpoints: a file path or the process's stdio.

use crate::error::CliResult;
use devio_core::{Callbacks, Device, DeviceError, DeviceHandle};
use std::io::{self, Read, Write};
use std::path::Path;

/// Opens `path` for reading, or stdin when `None`.
///
/// # Errors
///
/// Returns the device error if the file cannot be opened.
pub fn open_input(path: Option<&Path>) -> CliResult<Device> {
    let device = match path {
        Some(path) => Device::open_file(path, "r")?,
        None => {
            let stdin = Callbacks::new()
                .named("stdin")
                .on_read(|buf: &mut [u8]| io::stdin().lock().read(buf).map_err(DeviceError::from));
            Device::open_custom(stdin, "r")?
        }
    };
    Ok(device)
}

/// Opens `path` for writing (created or truncated), or stdout when `None`.
///
/// # Errors
///
/// Returns the device error if the file cannot be created.
pub fn open_output(path: Option<&Path>) -> CliResult<DeviceHandle> {
    let device = match path {
        Some(path) => Device::open_file(path, "w")?,
        None => {
            let stdout = Callbacks::new()
                .named("stdout")
                .on_write(|buf: &[u8]| io::stdout().lock().write(buf).map_err(DeviceError::from))
                .on_flush(|| io::stdout().lock().flush().map_err(DeviceError::from))
                .on_close(|| io::stdout().lock().flush().map_err(DeviceError::from));
            Device::open_custom(stdout, "w")?
        }
    };
    Ok(device.into_handle())
}

#[cfg(test)]
mod tests {
    use super::*;
    use devio_testkit::{drain, TempFile};

    #[test]
    fn file_endpoints_round_trip() {
        let file = TempFile::with_contents(b"");
        {
            let output = open_output(Some(file.path.as_path())).unwrap();
            let mut output = output.lock();
            output.write_exact(b"through a file").unwrap();
            output.close().unwrap();
        }
        let mut input = open_input(Some(file.path.as_path())).unwrap();
        assert_eq!(drain(&mut input), b"through a file");
    }

    #[test]
    fn missing_input_file_fails() {
        let file = TempFile::with_contents(b"");
        let missing = file.path.with_file_name("missing.bin");
        assert!(open_input(Some(missing.as_path())).is_err());
    }
}
