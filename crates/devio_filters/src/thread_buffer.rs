//! Byte queue shared between one writer thread and any number of readers.
//!
//! Each read or write call holds the queue lock for its whole transfer, so
//! transfers never interleave. Bytes are delivered in FIFO order; with
//! several readers each byte reaches exactly one of them.

use devio_core::{Backend, Device, DeviceError, DeviceResult, OpenMode};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// Queue configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ThreadBufferConfig {
    /// Maximum queued bytes, unbounded when `None`.
    pub capacity: Option<usize>,
    /// Whether reads wait for data and full writes wait for space.
    pub blocking: bool,
}

impl ThreadBufferConfig {
    /// An unbounded, non-blocking queue.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            capacity: None,
            blocking: false,
        }
    }

    /// Bound the queue to `capacity` bytes (at least one).
    #[must_use]
    pub const fn capacity(mut self, capacity: usize) -> Self {
        self.capacity = Some(if capacity == 0 { 1 } else { capacity });
        self
    }

    /// Enable or disable blocking transfers.
    #[must_use]
    pub const fn blocking(mut self, blocking: bool) -> Self {
        self.blocking = blocking;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriterState {
    Pending,
    Open,
    Closed,
}

#[derive(Debug)]
struct QueueState {
    bytes: VecDeque<u8>,
    writer: WriterState,
    readers: usize,
    had_reader: bool,
}

struct Shared {
    config: ThreadBufferConfig,
    state: Mutex<QueueState>,
    readable: Condvar,
    writable: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock()
    }
}

/// Waits on `cond` until notified or `deadline` passes.
fn wait(
    cond: &Condvar,
    guard: &mut MutexGuard<'_, QueueState>,
    deadline: Option<Instant>,
) -> DeviceResult<()> {
    match deadline {
        None => {
            cond.wait(guard);
            Ok(())
        }
        Some(deadline) => {
            if cond.wait_until(guard, deadline).timed_out() {
                Err(DeviceError::TimedOut)
            } else {
                Ok(())
            }
        }
    }
}

/// A thread-safe producer/consumer byte queue.
///
/// Clone the handle to share the queue; devices are opened from it with
/// [`ThreadBuffer::open_writer`] and [`ThreadBuffer::open_reader`].
///
/// # Example
///
/// ```rust
/// use devio_filters::{ThreadBuffer, ThreadBufferConfig};
///
/// let queue = ThreadBuffer::new(ThreadBufferConfig::new().blocking(true));
/// let mut reader = queue.open_reader("r").unwrap();
/// let mut writer = queue.open_writer("w").unwrap();
///
/// let producer = std::thread::spawn(move || {
///     writer.write(b"ping");
///     writer.close().unwrap();
/// });
///
/// let mut buf = [0u8; 8];
/// assert_eq!(reader.read(&mut buf), 4);
/// assert_eq!(&buf[..4], b"ping");
/// producer.join().unwrap();
/// ```
#[derive(Clone)]
pub struct ThreadBuffer {
    shared: Arc<Shared>,
}

impl ThreadBuffer {
    /// Creates an empty queue.
    #[must_use]
    pub fn new(config: ThreadBufferConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                config,
                state: Mutex::new(QueueState {
                    bytes: VecDeque::new(),
                    writer: WriterState::Pending,
                    readers: 0,
                    had_reader: false,
                }),
                readable: Condvar::new(),
                writable: Condvar::new(),
            }),
        }
    }

    /// The queue's configuration.
    #[must_use]
    pub fn config(&self) -> ThreadBufferConfig {
        self.shared.config
    }

    /// Number of bytes currently queued.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.lock().bytes.len()
    }

    /// Opens the producing end.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` unless `mode` is write-only, and
    /// `InvalidArgument` if a writer was already opened on this queue.
    pub fn open_writer(&self, mode: &str) -> DeviceResult<Device> {
        Device::open_custom(
            BufferWriter {
                shared: Arc::clone(&self.shared),
                attached: false,
                timeout: None,
            },
            mode,
        )
    }

    /// Opens a consuming end.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` unless `mode` is read-only.
    pub fn open_reader(&self, mode: &str) -> DeviceResult<Device> {
        Device::open_custom(
            BufferReader {
                shared: Arc::clone(&self.shared),
                attached: false,
                timeout: None,
            },
            mode,
        )
    }
}

impl fmt::Debug for ThreadBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.shared.lock();
        f.debug_struct("ThreadBuffer")
            .field("config", &self.shared.config)
            .field("queued", &state.bytes.len())
            .field("writer", &state.writer)
            .field("readers", &state.readers)
            .finish()
    }
}

struct BufferWriter {
    shared: Arc<Shared>,
    attached: bool,
    timeout: Option<Duration>,
}

impl BufferWriter {
    fn detach(&mut self) {
        if std::mem::take(&mut self.attached) {
            self.shared.lock().writer = WriterState::Closed;
            self.shared.readable.notify_all();
            debug!("thread buffer writer closed");
        }
    }
}

impl Backend for BufferWriter {
    fn what(&self) -> &'static str {
        "thread buffer"
    }

    fn open(&mut self, mode: &OpenMode) -> DeviceResult<()> {
        mode.require_write_only(self.what())?;
        let mut state = self.shared.lock();
        if state.writer != WriterState::Pending {
            return Err(DeviceError::invalid_argument("thread buffer already has a writer"));
        }
        state.writer = WriterState::Open;
        self.attached = true;
        Ok(())
    }

    fn write(&mut self, buf: &[u8]) -> DeviceResult<usize> {
        let shared = &*self.shared;
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let mut state = shared.lock();
        loop {
            if state.had_reader && state.readers == 0 {
                return Err(DeviceError::BrokenPipe);
            }
            let room = shared
                .config
                .capacity
                .map_or(buf.len(), |capacity| capacity.saturating_sub(state.bytes.len()));
            let n = room.min(buf.len());
            if n > 0 {
                state.bytes.extend(&buf[..n]);
                shared.readable.notify_all();
                return Ok(n);
            }
            if !shared.config.blocking {
                return Err(DeviceError::buffer_full(shared.config.capacity.unwrap_or(0)));
            }
            wait(&shared.writable, &mut state, deadline)?;
        }
    }

    fn close(&mut self) -> DeviceResult<()> {
        self.detach();
        Ok(())
    }

    fn set_timeouts(&mut self, _read: Option<Duration>, write: Option<Duration>) {
        self.timeout = write;
    }
}

impl Drop for BufferWriter {
    fn drop(&mut self) {
        self.detach();
    }
}

struct BufferReader {
    shared: Arc<Shared>,
    attached: bool,
    timeout: Option<Duration>,
}

impl BufferReader {
    fn detach(&mut self) {
        if std::mem::take(&mut self.attached) {
            self.shared.lock().readers -= 1;
            self.shared.writable.notify_all();
        }
    }
}

impl Backend for BufferReader {
    fn what(&self) -> &'static str {
        "thread buffer"
    }

    fn open(&mut self, mode: &OpenMode) -> DeviceResult<()> {
        mode.require_read_only(self.what())?;
        let mut state = self.shared.lock();
        state.readers += 1;
        state.had_reader = true;
        self.attached = true;
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        let shared = &*self.shared;
        let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
        let mut state = shared.lock();
        loop {
            if !state.bytes.is_empty() {
                let n = buf.len().min(state.bytes.len());
                for (slot, byte) in buf.iter_mut().zip(state.bytes.drain(..n)) {
                    *slot = byte;
                }
                shared.writable.notify_all();
                return Ok(n);
            }
            if state.writer == WriterState::Closed || !shared.config.blocking {
                return Ok(0);
            }
            wait(&shared.readable, &mut state, deadline)?;
        }
    }

    fn close(&mut self) -> DeviceResult<()> {
        self.detach();
        Ok(())
    }

    fn set_timeouts(&mut self, read: Option<Duration>, _write: Option<Duration>) {
        self.timeout = read;
    }
}

impl Drop for BufferReader {
    fn drop(&mut self) {
        self.detach();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use devio_core::ErrorCode;
    use std::thread;

    #[test]
    fn non_blocking_reader_sees_eof_then_retries() {
        let queue = ThreadBuffer::new(ThreadBufferConfig::new());
        let mut reader = queue.open_reader("r").unwrap();
        let mut writer = queue.open_writer("w").unwrap();

        let mut buf = [0u8; 8];
        assert_eq!(reader.read(&mut buf), 0);
        assert!(reader.eof());
        assert_eq!(reader.error(), None);

        assert_eq!(writer.write(b"abc"), 3);
        reader.clear_error();
        assert_eq!(reader.read(&mut buf), 3);
        assert_eq!(&buf[..3], b"abc");
    }

    #[test]
    fn bounded_non_blocking_writer_fills_then_fails() {
        let queue = ThreadBuffer::new(ThreadBufferConfig::new().capacity(4));
        let _reader = queue.open_reader("r").unwrap();
        let mut writer = queue.open_writer("w").unwrap();
        assert_eq!(writer.write(b"abcdef"), 4);
        assert_eq!(writer.error(), Some(ErrorCode::NoBufferSpace));
        assert_eq!(queue.queued(), 4);
    }

    #[test]
    fn second_writer_is_rejected() {
        let queue = ThreadBuffer::new(ThreadBufferConfig::new());
        let _writer = queue.open_writer("w").unwrap();
        let err = queue.open_writer("w").unwrap_err();
        assert_eq!(err.code(), ErrorCode::InvalidArgument);
        assert!(queue.open_reader("w").is_err());
        assert!(queue.open_writer("r").is_err());
    }

    #[test]
    fn writing_without_readers_breaks_the_pipe() {
        let queue = ThreadBuffer::new(ThreadBufferConfig::new());
        let mut writer = queue.open_writer("w").unwrap();
        assert_eq!(writer.write(b"early"), 5);

        let mut reader = queue.open_reader("r").unwrap();
        reader.close().unwrap();
        assert_eq!(writer.write(b"late"), 0);
        assert_eq!(writer.error(), Some(ErrorCode::BrokenPipe));
    }

    #[test]
    fn blocking_reader_times_out() {
        let queue = ThreadBuffer::new(ThreadBufferConfig::new().blocking(true));
        let _writer = queue.open_writer("w").unwrap();
        let mut reader = queue.open_reader("r").unwrap();
        reader.set_read_timeout(Some(Duration::from_millis(20)));

        let mut buf = [0u8; 1];
        assert_eq!(reader.read(&mut buf), 0);
        assert_eq!(reader.error(), Some(ErrorCode::TimedOut));
    }

    #[test]
    fn bounded_blocking_queue_moves_everything_between_threads() {
        let queue = ThreadBuffer::new(ThreadBufferConfig::new().capacity(64).blocking(true));
        let mut reader = queue.open_reader("r").unwrap();
        let mut writer = queue.open_writer("w").unwrap();
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();

        let expected = payload.clone();
        let producer = thread::spawn(move || {
            for chunk in payload.chunks(100) {
                assert_eq!(writer.write(chunk), chunk.len());
            }
            writer.close().unwrap();
        });

        let mut received = Vec::new();
        let mut buf = [0u8; 333];
        loop {
            let n = reader.read(&mut buf);
            received.extend_from_slice(&buf[..n]);
            if n < buf.len() {
                break;
            }
        }
        producer.join().unwrap();
        assert_eq!(received, expected);
        assert!(reader.eof());
        assert_eq!(reader.error(), None);
    }
}
