//! File backends: files opened by path and wrapped native handles.

use crate::backend::{Backend, DeviceKind, Whence};
use crate::device::Device;
use crate::error::{DeviceError, DeviceResult};
use crate::flags::DeviceFlags;
use crate::mode::OpenMode;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// A shared OS file handle.
///
/// The caller keeps a clone to retain access after the device closes.
pub type NativeHandle = Arc<File>;

/// A file backend.
///
/// Reads and writes go straight to the OS; attach a transfer buffer with
/// [`Device::set_buffer`] to batch them.
///
/// # Ownership
///
/// - Files opened by path are owned by the device.
/// - Native handles are borrowed unless the mode has `g`. A grabbed handle
///   belongs to the device, which reports `GRABBED`, syncs the file at close
///   and then drops it. The OS file closes there unless the caller kept a
///   clone of the handle.
#[derive(Debug)]
pub struct FileBackend {
    file: Option<NativeHandle>,
    path: Option<PathBuf>,
    kind: DeviceKind,
    owned: bool,
}

impl FileBackend {
    /// Opens `path` according to `mode`.
    ///
    /// `r` opens an existing file, `w` creates and truncates, `a` creates and
    /// appends, `x` fails if the file exists.
    ///
    /// # Errors
    ///
    /// Returns `Io` with the OS error; `x` on an existing file maps to `Exists`.
    pub fn open_path(path: &Path, mode: &OpenMode) -> DeviceResult<Self> {
        let mut options = OpenOptions::new();
        options.read(mode.read);
        if mode.append {
            options.append(true);
        } else {
            options.write(mode.write);
        }
        if mode.exclusive {
            options.create_new(true);
        } else if mode.truncate || mode.append {
            options.create(true);
        }
        if mode.truncate && !mode.append {
            options.truncate(true);
        }

        let file = options.open(path)?;
        debug!(path = %path.display(), "file opened");
        Ok(Self {
            file: Some(Arc::new(file)),
            path: Some(path.to_path_buf()),
            kind: DeviceKind::File,
            owned: true,
        })
    }

    /// Wraps a native handle. Ownership is decided by the mode at open.
    #[must_use]
    pub fn native(file: NativeHandle) -> Self {
        Self {
            file: Some(file),
            path: None,
            kind: DeviceKind::NativeFile,
            owned: false,
        }
    }

    /// Returns the path for files opened by path.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns a clone of the native handle, or `None` once closed.
    #[must_use]
    pub fn handle(&self) -> Option<NativeHandle> {
        self.file.clone()
    }

    fn file(&self) -> DeviceResult<&File> {
        self.file.as_deref().ok_or(DeviceError::Closed)
    }

    fn grabbed(&self) -> bool {
        self.owned && self.kind == DeviceKind::NativeFile
    }
}

fn retry_interrupted<T>(mut op: impl FnMut() -> io::Result<T>) -> DeviceResult<T> {
    loop {
        match op() {
            Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
            other => return other.map_err(DeviceError::from),
        }
    }
}

impl Backend for FileBackend {
    fn kind(&self) -> DeviceKind {
        self.kind
    }

    fn what(&self) -> &'static str {
        match self.kind {
            DeviceKind::NativeFile => "native_file",
            _ => "file",
        }
    }

    fn open(&mut self, mode: &OpenMode) -> DeviceResult<()> {
        if self.kind == DeviceKind::NativeFile {
            self.owned = mode.grab;
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        let mut file = self.file()?;
        retry_interrupted(|| file.read(buf))
    }

    fn write(&mut self, buf: &[u8]) -> DeviceResult<usize> {
        let mut file = self.file()?;
        retry_interrupted(|| file.write(buf))
    }

    fn flush(&mut self) -> DeviceResult<()> {
        let mut file = self.file()?;
        file.flush()?;
        Ok(())
    }

    fn close(&mut self) -> DeviceResult<()> {
        let grabbed = self.grabbed();
        let Some(file) = self.file.take() else {
            return Ok(());
        };
        if !grabbed {
            return Ok(());
        }
        file.sync_all()?;
        match Arc::try_unwrap(file) {
            Ok(file) => {
                drop(file);
                debug!("grabbed file closed");
            }
            Err(shared) => {
                debug!(
                    clones = Arc::strong_count(&shared) - 1,
                    "grabbed file released while the caller still holds clones"
                );
            }
        }
        Ok(())
    }

    fn tell64(&mut self) -> DeviceResult<u64> {
        let mut file = self.file()?;
        Ok(file.stream_position()?)
    }

    fn seek64(&mut self, offset: i64, whence: Whence) -> DeviceResult<u64> {
        let target = match whence {
            Whence::Start => {
                SeekFrom::Start(u64::try_from(offset).map_err(|_| DeviceError::out_of_range(offset))?)
            }
            Whence::Current => SeekFrom::Current(offset),
            Whence::End => SeekFrom::End(offset),
        };
        let mut file = self.file()?;
        Ok(file.seek(target)?)
    }

    fn flags(&self) -> DeviceFlags {
        if self.grabbed() {
            DeviceFlags::GRABBED
        } else {
            DeviceFlags::empty()
        }
    }
}

impl Device {
    /// Opens a file by path.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` for a malformed mode, or the OS error.
    pub fn open_file(path: impl AsRef<Path>, mode: &str) -> DeviceResult<Self> {
        let parsed = OpenMode::parse(mode)?;
        let backend = FileBackend::open_path(path.as_ref(), &parsed)?;
        Self::from_parts(Box::new(backend), parsed, None)
    }

    /// Wraps a native file handle.
    ///
    /// With `g` in the mode the device takes the handle over and drops it at
    /// close; pass the last clone to have the file closed there.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` for a malformed mode.
    pub fn open_native(handle: NativeHandle, mode: &str) -> DeviceResult<Self> {
        let parsed = OpenMode::parse(mode)?;
        Self::from_parts(Box::new(FileBackend::native(handle)), parsed, None)
    }
}
