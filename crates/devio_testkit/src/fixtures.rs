//! Test fixtures and device helpers.
//!
//! Provides convenience functions for setting up memory and file devices
//! and moving bytes through them.

use devio_core::{Device, DeviceHandle, Growth};
use std::path::PathBuf;
use tempfile::TempDir;

/// Chunk size used by [`drain`] and [`pump`].
pub const CHUNK: usize = 1000;

/// A readable and writable growable memory device preloaded with `bytes`,
/// rewound to the start.
pub fn memory_source(bytes: &[u8]) -> DeviceHandle {
    let mut device =
        Device::open_dynamic(Growth::Minimal, "w+").expect("Failed to open memory device");
    device.write_exact(bytes).expect("Failed to preload memory device");
    device.rewind().expect("Failed to rewind memory device");
    device.into_handle()
}

/// An empty growable memory device, readable and writable.
pub fn memory_sink() -> DeviceHandle {
    Device::open_dynamic(Growth::Exponential, "w+")
        .expect("Failed to open memory device")
        .into_handle()
}

/// A fixed-capacity memory device opened for writing.
pub fn sized_sink(capacity: usize) -> DeviceHandle {
    Device::open_sized(vec![0; capacity], "w")
        .expect("Failed to open sized device")
        .into_handle()
}

/// The bytes written to a memory device so far.
pub fn contents(handle: &DeviceHandle) -> Vec<u8> {
    handle
        .lock()
        .contents()
        .expect("Device is not a memory device")
        .to_vec()
}

/// Reads `device` until a short read, in [`CHUNK`]-sized steps.
pub fn drain(device: &mut Device) -> Vec<u8> {
    let mut out = Vec::new();
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = device.read(&mut buf);
        out.extend_from_slice(&buf[..n]);
        if n < buf.len() {
            return out;
        }
    }
}

/// Writes `bytes` into `device` in `chunk`-sized writes, returning the total
/// accepted. Stops at the first short write.
pub fn write_chunked(device: &mut Device, bytes: &[u8], chunk: usize) -> usize {
    let mut total = 0;
    for piece in bytes.chunks(chunk.max(1)) {
        let n = device.write(piece);
        total += n;
        if n < piece.len() {
            break;
        }
    }
    total
}

/// Copies `src` into `dst` until `src` reaches a short read.
pub fn pump(src: &mut Device, dst: &mut Device) -> u64 {
    let mut total = 0u64;
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = src.read(&mut buf);
        let written = dst.write(&buf[..n]);
        total += written as u64;
        if n < buf.len() || written < n {
            return total;
        }
    }
}

/// A file in a temporary directory, removed on drop.
pub struct TempFile {
    /// Path of the file.
    pub path: PathBuf,
    /// The temporary directory (kept alive to prevent cleanup).
    _temp_dir: TempDir,
}

impl TempFile {
    /// Creates a file holding `contents`.
    pub fn with_contents(contents: &[u8]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let path = temp_dir.path().join("data.bin");
        std::fs::write(&path, contents).expect("Failed to write temp file");
        Self {
            path,
            _temp_dir: temp_dir,
        }
    }

    /// Opens the file as a device.
    pub fn open(&self, mode: &str) -> Device {
        Device::open_file(&self.path, mode).expect("Failed to open temp file")
    }

    /// Reads the file back from disk.
    pub fn read(&self) -> Vec<u8> {
        std::fs::read(&self.path).expect("Failed to read temp file")
    }
}
