//! Closure-based custom backend.

use crate::backend::{Backend, Whence};
use crate::error::{DeviceError, DeviceResult};
use std::fmt;

type ReadFn = Box<dyn FnMut(&mut [u8]) -> DeviceResult<usize> + Send>;
type WriteFn = Box<dyn FnMut(&[u8]) -> DeviceResult<usize> + Send>;
type FlushFn = Box<dyn FnMut() -> DeviceResult<()> + Send>;
type SeekFn = Box<dyn FnMut(i64, Whence) -> DeviceResult<u64> + Send>;
type TellFn = Box<dyn FnMut() -> DeviceResult<u64> + Send>;

/// A backend assembled from optional closures.
///
/// Any closure left unset makes that operation unsupported. Useful for
/// adapting sources and sinks that are not files, such as the process's
/// standard streams.
///
/// # Example
///
/// ```rust
/// use devio_core::{Callbacks, Device};
///
/// let backend = Callbacks::new().on_write(|buf: &[u8]| Ok(buf.len()));
/// let mut sink = Device::open_custom(backend, "w").unwrap();
/// assert_eq!(sink.write(b"discarded"), 9);
/// ```
#[derive(Default)]
pub struct Callbacks {
    name: Option<&'static str>,
    read: Option<ReadFn>,
    write: Option<WriteFn>,
    flush: Option<FlushFn>,
    close: Option<FlushFn>,
    seek: Option<SeekFn>,
    tell: Option<TellFn>,
}

impl Callbacks {
    /// Creates a backend that supports nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the name reported by `what()`.
    #[must_use]
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    /// Sets the read closure.
    #[must_use]
    pub fn on_read(
        mut self,
        f: impl FnMut(&mut [u8]) -> DeviceResult<usize> + Send + 'static,
    ) -> Self {
        self.read = Some(Box::new(f));
        self
    }

    /// Sets the write closure.
    #[must_use]
    pub fn on_write(mut self, f: impl FnMut(&[u8]) -> DeviceResult<usize> + Send + 'static) -> Self {
        self.write = Some(Box::new(f));
        self
    }

    /// Sets the flush closure.
    #[must_use]
    pub fn on_flush(mut self, f: impl FnMut() -> DeviceResult<()> + Send + 'static) -> Self {
        self.flush = Some(Box::new(f));
        self
    }

    /// Sets the close closure.
    #[must_use]
    pub fn on_close(mut self, f: impl FnMut() -> DeviceResult<()> + Send + 'static) -> Self {
        self.close = Some(Box::new(f));
        self
    }

    /// Sets the seek closure.
    #[must_use]
    pub fn on_seek(
        mut self,
        f: impl FnMut(i64, Whence) -> DeviceResult<u64> + Send + 'static,
    ) -> Self {
        self.seek = Some(Box::new(f));
        self
    }

    /// Sets the tell closure.
    #[must_use]
    pub fn on_tell(mut self, f: impl FnMut() -> DeviceResult<u64> + Send + 'static) -> Self {
        self.tell = Some(Box::new(f));
        self
    }
}

impl fmt::Debug for Callbacks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callbacks")
            .field("name", &self.what())
            .field("read", &self.read.is_some())
            .field("write", &self.write.is_some())
            .field("flush", &self.flush.is_some())
            .field("close", &self.close.is_some())
            .field("seek", &self.seek.is_some())
            .field("tell", &self.tell.is_some())
            .finish()
    }
}

impl Backend for Callbacks {
    fn what(&self) -> &'static str {
        self.name.unwrap_or("callbacks")
    }

    fn read(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        match self.read.as_mut() {
            Some(f) => f(buf),
            None => Err(DeviceError::unsupported(self.what(), "read")),
        }
    }

    fn write(&mut self, buf: &[u8]) -> DeviceResult<usize> {
        match self.write.as_mut() {
            Some(f) => f(buf),
            None => Err(DeviceError::unsupported(self.what(), "write")),
        }
    }

    fn flush(&mut self) -> DeviceResult<()> {
        self.flush.as_mut().map_or(Ok(()), |f| f())
    }

    fn close(&mut self) -> DeviceResult<()> {
        self.close.as_mut().map_or(Ok(()), |f| f())
    }

    fn seek64(&mut self, offset: i64, whence: Whence) -> DeviceResult<u64> {
        match self.seek.as_mut() {
            Some(f) => f(offset, whence),
            None => Err(DeviceError::unsupported(self.what(), "seek")),
        }
    }

    fn tell64(&mut self) -> DeviceResult<u64> {
        match self.tell.as_mut() {
            Some(f) => f(),
            None => Err(DeviceError::unsupported(self.what(), "tell")),
        }
    }
}
