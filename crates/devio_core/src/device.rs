//! The device core.
//!
//! [`Device`] is the single stream handle every backend and filter is used
//! through. It owns the parts of the stream contract that are the same for
//! every backend:
//!
//! - mode checking and the read/write direction discipline
//! - the sticky error and EOF flags
//! - the unget stack
//! - text-mode newline translation
//! - the optional transfer buffer
//! - 32/64-bit position widening and narrowing
//!
//! Count-returning operations (`read`, `write`, ...) never return `Err`: a
//! short count means EOF or error, told apart with [`Device::eof`] and
//! [`Device::error`]. Positioning, flushing and closing return
//! [`DeviceResult`].

use crate::backend::{Backend, DeviceKind, Shutdown, Whence};
use crate::buffer::{StreamBuffer, DEFAULT_BUFFER_SIZE};
use crate::config::DeviceConfig;
use crate::error::{DeviceError, DeviceResult, ErrorCode};
use crate::flags::DeviceFlags;
use crate::handle::DeviceHandle;
use crate::mode::OpenMode;
use crate::pool::PoolSlot;
use crate::position::StreamPosition;
use std::fmt;
use std::io;
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Number of bytes the unget stack holds.
pub const UNGET_CAPACITY: usize = 4;

/// The platform newline written in text mode.
#[cfg(windows)]
pub const NEWLINE: &[u8] = b"\r\n";
/// The platform newline written in text mode.
#[cfg(not(windows))]
pub const NEWLINE: &[u8] = b"\n";

/// Which direction the last operation moved data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Idle,
    Reading,
    Writing,
}

/// An open stream over some [`Backend`].
pub struct Device {
    backend: Option<Box<dyn Backend>>,
    kind: DeviceKind,
    what: &'static str,
    mode: OpenMode,
    error: Option<ErrorCode>,
    error_detail: Option<String>,
    eof: bool,
    direction: Direction,
    unget: Vec<u8>,
    buffer: Option<StreamBuffer>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    slot: Option<PoolSlot>,
}

impl Device {
    /// Opens a device over a boxed backend.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` if the mode string is malformed or the backend
    /// rejects it.
    pub fn open_backend(backend: Box<dyn Backend>, mode: &str) -> DeviceResult<Self> {
        let mode = OpenMode::parse(mode)?;
        Self::from_parts(backend, mode, None)
    }

    /// Opens a device over a user-provided backend.
    ///
    /// Every filter is opened this way.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` if the mode string is malformed or the backend
    /// rejects it.
    pub fn open_custom<B: Backend>(backend: B, mode: &str) -> DeviceResult<Self> {
        Self::open_backend(Box::new(backend), mode)
    }

    pub(crate) fn from_parts(
        mut backend: Box<dyn Backend>,
        mode: OpenMode,
        slot: Option<PoolSlot>,
    ) -> DeviceResult<Self> {
        backend.open(&mode)?;
        let kind = backend.kind();
        let what = backend.what();
        debug!(kind = %kind, what, mode = %mode, pooled = slot.is_some(), "device opened");
        Ok(Self {
            backend: Some(backend),
            kind,
            what,
            mode,
            error: None,
            error_detail: None,
            eof: false,
            direction: Direction::Idle,
            unget: Vec::with_capacity(UNGET_CAPACITY),
            buffer: None,
            read_timeout: None,
            write_timeout: None,
            slot,
        })
    }

    /// Wraps this device in a shared handle so filters can use it.
    #[must_use]
    pub fn into_handle(self) -> DeviceHandle {
        DeviceHandle::new(self)
    }

    // ------------------------------------------------------------------
    // Status
    // ------------------------------------------------------------------

    /// Returns the sticky error code, if any.
    #[must_use]
    pub fn error(&self) -> Option<ErrorCode> {
        self.error
    }

    /// Returns a description of the error that set the sticky flag.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_detail.as_deref()
    }

    /// Returns true once a read reached the end of the stream.
    #[must_use]
    pub fn eof(&self) -> bool {
        self.eof
    }

    /// Clears the sticky error and EOF flags.
    pub fn clear_error(&mut self) {
        self.error = None;
        self.error_detail = None;
        self.eof = false;
        if let Some(backend) = self.backend.as_deref_mut() {
            backend.clear_error();
        }
    }

    /// Returns true until the device is closed.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.backend.is_some()
    }

    /// Returns the parsed open mode.
    #[must_use]
    pub fn mode(&self) -> &OpenMode {
        &self.mode
    }

    /// Returns the backend family.
    #[must_use]
    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    /// Returns the backend's type name.
    #[must_use]
    pub fn what(&self) -> &'static str {
        self.what
    }

    /// Reports mode and state bits merged with backend-reported bits.
    #[must_use]
    pub fn flags(&self) -> DeviceFlags {
        let mut flags = DeviceFlags::from_mode(&self.mode);
        flags.set(DeviceFlags::ERROR, self.error.is_some());
        flags.set(DeviceFlags::EOF, self.eof);
        flags.set(DeviceFlags::JUST_READ, self.direction == Direction::Reading);
        flags.set(DeviceFlags::JUST_WROTE, self.direction == Direction::Writing);
        flags.set(DeviceFlags::OWNS_BUFFER, self.buffer.is_some());
        flags.set(DeviceFlags::IN_USE, self.backend.is_some());
        flags.set(DeviceFlags::DYNAMIC_ALLOC, self.slot.is_none());
        if let Some(backend) = self.backend.as_deref() {
            flags |= backend.flags();
        }
        flags
    }

    /// Returns the concrete backend if it is a `T`.
    #[must_use]
    pub fn backend_ref<T: Backend>(&self) -> Option<&T> {
        let backend: &dyn Backend = self.backend.as_deref()?;
        backend.as_any().downcast_ref::<T>()
    }

    /// Returns the concrete backend mutably if it is a `T`.
    pub fn backend_mut<T: Backend>(&mut self) -> Option<&mut T> {
        let backend: &mut dyn Backend = self.backend.as_deref_mut()?;
        backend.as_any_mut().downcast_mut::<T>()
    }

    /// Forgets direction, EOF, buffered input and pushed-back bytes after a
    /// backend repositioned itself behind the core's back.
    pub(crate) fn reset_state(&mut self) {
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.clear();
        }
        self.unget.clear();
        self.eof = false;
        self.direction = Direction::Idle;
    }

    pub(crate) fn fail(&mut self, err: DeviceError) {
        trace!(what = self.what, error = %err, "device error flag set");
        self.error = Some(err.code());
        self.error_detail = Some(err.to_string());
    }

    fn ensure_open(&self) -> DeviceResult<()> {
        if self.backend.is_some() {
            Ok(())
        } else {
            Err(DeviceError::Closed)
        }
    }

    // ------------------------------------------------------------------
    // Reading
    // ------------------------------------------------------------------

    fn begin_read(&self) -> DeviceResult<()> {
        self.ensure_open()?;
        if !self.mode.read {
            return Err(DeviceError::NotReadable);
        }
        if self.direction == Direction::Writing {
            return Err(DeviceError::ReadAfterWrite);
        }
        Ok(())
    }

    /// Reads up to `buf.len()` bytes.
    ///
    /// Returns fewer bytes than requested only at EOF or on error.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        if let Err(err) = self.begin_read() {
            self.fail(err);
            return 0;
        }
        if buf.is_empty() || self.error.is_some() || self.eof {
            return 0;
        }
        self.direction = Direction::Reading;
        if self.mode.text {
            self.read_text(buf)
        } else {
            self.read_raw(buf)
        }
    }

    /// Reads whole units of `unit_size` bytes, returning the unit count.
    pub fn read_units(&mut self, buf: &mut [u8], unit_size: usize) -> usize {
        if unit_size == 0 {
            self.fail(DeviceError::invalid_argument("unit size must be non-zero"));
            return 0;
        }
        let len = buf.len() / unit_size * unit_size;
        self.read(&mut buf[..len]) / unit_size
    }

    /// Reads like [`Self::read`], but reports a failed empty read as `Err`.
    ///
    /// A partial read followed by an error returns the partial count; the
    /// error surfaces on the next call because the flag is sticky.
    ///
    /// # Errors
    ///
    /// Returns `Inner(code)` carrying the sticky error code.
    pub fn try_read(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        let n = self.read(buf);
        if n == 0 && !buf.is_empty() {
            if let Some(code) = self.error {
                return Err(DeviceError::Inner(code));
            }
        }
        Ok(n)
    }

    fn read_raw(&mut self, buf: &mut [u8]) -> usize {
        let mut total = 0;
        while total < buf.len() {
            match self.unget.pop() {
                Some(byte) => {
                    buf[total] = byte;
                    total += 1;
                }
                None => break,
            }
        }

        let Some(backend) = self.backend.as_deref_mut() else {
            return total;
        };
        let mut failure = None;
        while total < buf.len() {
            let result = match self.buffer.as_mut() {
                Some(buffer) if !buffer.is_empty() => Ok(buffer.consume(&mut buf[total..])),
                Some(buffer) if buf.len() - total < buffer.capacity() => {
                    match backend.read(buffer.refill_slot()) {
                        Ok(n) => {
                            buffer.filled(n);
                            trace!(what = self.what, bytes = n, "read buffer refilled");
                            Ok(buffer.consume(&mut buf[total..]))
                        }
                        Err(err) => Err(err),
                    }
                }
                _ => backend.read(&mut buf[total..]),
            };
            match result {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(n) => total += n,
                Err(err) => {
                    failure = Some(err);
                    break;
                }
            }
        }
        if let Some(err) = failure {
            self.fail(err);
        }
        total
    }

    fn read_text(&mut self, buf: &mut [u8]) -> usize {
        let mut out = 0;
        while out < buf.len() {
            let n = self.read_raw(&mut buf[out..]);
            if n == 0 {
                break;
            }
            let end = out + n;
            let mut w = out;
            let mut i = out;
            while i < end {
                let byte = buf[i];
                i += 1;
                if byte == b'\r' {
                    if i < end {
                        if buf[i] == b'\n' {
                            continue;
                        }
                    } else {
                        let mut next = [0u8; 1];
                        if self.read_raw(&mut next) == 1 {
                            if next[0] == b'\n' {
                                buf[w] = b'\n';
                                w += 1;
                                continue;
                            }
                            self.unget.push(next[0]);
                        }
                    }
                }
                buf[w] = byte;
                w += 1;
            }
            out = w;
            if self.eof || self.error.is_some() {
                break;
            }
        }
        out
    }

    /// Pushes one byte back onto the read side.
    ///
    /// Returns `None` when the device is not readable, is mid-write, or the
    /// unget stack is full. A successful push clears EOF.
    pub fn ungetc(&mut self, byte: u8) -> Option<u8> {
        if let Err(err) = self.begin_read() {
            self.fail(err);
            return None;
        }
        if self.unget.len() >= UNGET_CAPACITY {
            return None;
        }
        self.unget.push(byte);
        self.eof = false;
        self.direction = Direction::Reading;
        Some(byte)
    }

    // ------------------------------------------------------------------
    // Writing
    // ------------------------------------------------------------------

    fn begin_write(&self) -> DeviceResult<()> {
        self.ensure_open()?;
        if !self.mode.write {
            return Err(DeviceError::NotWritable);
        }
        if self.direction == Direction::Reading {
            return Err(DeviceError::WriteAfterRead);
        }
        Ok(())
    }

    /// Writes `buf`, returning how many bytes were accepted.
    ///
    /// Returns fewer bytes than given only on error.
    pub fn write(&mut self, buf: &[u8]) -> usize {
        if let Err(err) = self.begin_write() {
            self.fail(err);
            return 0;
        }
        if buf.is_empty() || self.error.is_some() {
            return 0;
        }
        self.direction = Direction::Writing;
        if self.mode.text && NEWLINE != b"\n" {
            self.write_text(buf)
        } else {
            self.write_raw(buf)
        }
    }

    /// Writes whole units of `unit_size` bytes, returning the unit count.
    pub fn write_units(&mut self, buf: &[u8], unit_size: usize) -> usize {
        if unit_size == 0 {
            self.fail(DeviceError::invalid_argument("unit size must be non-zero"));
            return 0;
        }
        let len = buf.len() / unit_size * unit_size;
        self.write(&buf[..len]) / unit_size
    }

    /// Writes like [`Self::write`], but reports a failed empty write as `Err`.
    ///
    /// # Errors
    ///
    /// Returns `Inner(code)` carrying the sticky error code.
    pub fn try_write(&mut self, buf: &[u8]) -> DeviceResult<usize> {
        let n = self.write(buf);
        if n == 0 && !buf.is_empty() {
            return Err(DeviceError::Inner(self.error.unwrap_or(ErrorCode::Write)));
        }
        Ok(n)
    }

    /// Writes all of `buf` or fails.
    ///
    /// # Errors
    ///
    /// Returns `Inner(code)` carrying the sticky error code on a short write.
    pub fn write_exact(&mut self, buf: &[u8]) -> DeviceResult<()> {
        if self.write(buf) == buf.len() {
            Ok(())
        } else {
            Err(DeviceError::Inner(self.error.unwrap_or(ErrorCode::Write)))
        }
    }

    fn write_text(&mut self, buf: &[u8]) -> usize {
        let mut done = 0;
        for line in buf.split_inclusive(|&b| b == b'\n') {
            let (body, newline) = match line.split_last() {
                Some((b'\n', body)) => (body, true),
                _ => (line, false),
            };
            let n = self.write_raw(body);
            done += n;
            if n < body.len() {
                return done;
            }
            if newline {
                if self.write_raw(NEWLINE) < NEWLINE.len() {
                    return done;
                }
                done += 1;
            }
        }
        done
    }

    fn write_raw(&mut self, buf: &[u8]) -> usize {
        let Some(backend) = self.backend.as_deref_mut() else {
            return 0;
        };
        let (total, failure) = match self.buffer.as_mut() {
            Some(buffer) if buf.len() < buffer.capacity() => {
                let mut total = 0;
                let mut failure = None;
                while total < buf.len() {
                    total += buffer.push(&buf[total..]);
                    if buffer.is_full() {
                        if let Err(err) = drain_buffer(backend, buffer) {
                            failure = Some(err);
                            break;
                        }
                    }
                }
                (total, failure)
            }
            Some(buffer) => match drain_buffer(backend, buffer) {
                Ok(()) => write_through(backend, buf),
                Err(err) => (0, Some(err)),
            },
            None => write_through(backend, buf),
        };
        if let Some(err) = failure {
            self.fail(err);
        }
        total
    }

    fn flush_output(&mut self) -> DeviceResult<()> {
        match (self.backend.as_deref_mut(), self.buffer.as_mut()) {
            (Some(backend), Some(buffer)) if self.direction == Direction::Writing => {
                drain_buffer(backend, buffer)
            }
            _ => Ok(()),
        }
    }

    /// Drops read-ahead and pushed-back bytes, rewinding the backend to the
    /// logical position when it can seek.
    fn discard_input(&mut self) {
        let held = self.buffer.as_ref().map_or(0, StreamBuffer::available) + self.unget.len();
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.clear();
        }
        self.unget.clear();
        if held == 0 {
            return;
        }
        if let Some(backend) = self.backend.as_deref_mut() {
            let back = -i64::try_from(held).unwrap_or(i64::MAX);
            match backend_seek(backend, back, Whence::Current, false) {
                Ok(_) => trace!(what = self.what, held, "backend rewound over unread input"),
                Err(err) => trace!(what = self.what, held, error = %err, "unread input dropped"),
            }
        }
    }

    /// Pushes pending output through, or realigns the backend after reading.
    ///
    /// # Errors
    ///
    /// Returns an error if pending output cannot be delivered; the sticky
    /// error flag is set as well.
    pub fn flush(&mut self) -> DeviceResult<()> {
        self.ensure_open()?;
        let result = match self.direction {
            Direction::Writing => self.flush_output(),
            Direction::Reading => {
                self.discard_input();
                Ok(())
            }
            Direction::Idle => Ok(()),
        }
        .and_then(|()| match self.backend.as_deref_mut() {
            Some(backend) => backend.flush(),
            None => Err(DeviceError::Closed),
        });
        self.direction = Direction::Idle;
        if let Err(err) = &result {
            self.error = Some(err.code());
            self.error_detail = Some(err.to_string());
        }
        result
    }

    // ------------------------------------------------------------------
    // Positioning
    // ------------------------------------------------------------------

    fn switch_state(&mut self) -> DeviceResult<()> {
        let result = match self.direction {
            Direction::Writing => self.flush_output(),
            Direction::Reading => {
                self.discard_input();
                Ok(())
            }
            Direction::Idle => Ok(()),
        };
        self.unget.clear();
        self.eof = false;
        self.direction = Direction::Idle;
        result?;
        trace!(what = self.what, "state switch");
        match self.backend.as_deref_mut() {
            Some(backend) => backend.state_switch(),
            None => Err(DeviceError::Closed),
        }
    }

    fn seek_impl(&mut self, offset: i64, whence: Whence, prefer32: bool) -> DeviceResult<u64> {
        self.ensure_open()?;
        if self.direction == Direction::Writing {
            self.flush_output()?;
        }
        let held = if self.direction == Direction::Reading {
            self.buffer.as_ref().map_or(0, StreamBuffer::available) + self.unget.len()
        } else {
            0
        };
        let offset = if whence == Whence::Current {
            let held = i64::try_from(held).map_err(|_| DeviceError::overflow(held as u64))?;
            offset
                .checked_sub(held)
                .ok_or_else(|| DeviceError::out_of_range(i128::from(offset) - i128::from(held)))?
        } else {
            offset
        };

        let backend = self.backend.as_deref_mut().ok_or(DeviceError::Closed)?;
        let position = backend_seek(backend, offset, whence, prefer32)?;
        if let Some(buffer) = self.buffer.as_mut() {
            buffer.clear();
        }
        self.unget.clear();
        self.eof = false;
        self.direction = Direction::Idle;
        Ok(position)
    }

    /// Moves to a new position.
    ///
    /// `seek(0, Whence::Current)` is the state switch: it flushes pending
    /// output or drops buffered input, clears the direction and EOF flags,
    /// and succeeds even when the backend cannot seek. It is the only way to
    /// pivot an update device between reading and writing.
    ///
    /// A failed seek does not set the sticky error flag.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` if the backend cannot seek, or the backend's
    /// range error.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> DeviceResult<()> {
        if offset == 0 && whence == Whence::Current {
            self.ensure_open()?;
            return self.switch_state();
        }
        self.seek_impl(offset, whence, false).map(|_| ())
    }

    /// Moves to a new position using a 32-bit offset.
    ///
    /// # Errors
    ///
    /// As [`Self::seek`].
    pub fn seek32(&mut self, offset: i32, whence: Whence) -> DeviceResult<()> {
        if offset == 0 && whence == Whence::Current {
            self.ensure_open()?;
            return self.switch_state();
        }
        self.seek_impl(i64::from(offset), whence, true).map(|_| ())
    }

    /// Rewinds to the start and clears the sticky flags.
    ///
    /// # Errors
    ///
    /// As [`Self::seek`].
    pub fn rewind(&mut self) -> DeviceResult<()> {
        self.seek(0, Whence::Start)?;
        self.clear_error();
        Ok(())
    }

    fn logical_position(&self, raw: u64) -> u64 {
        match self.direction {
            Direction::Writing => {
                raw + self.buffer.as_ref().map_or(0, |b| b.pending().len() as u64)
            }
            _ => {
                let held = self.buffer.as_ref().map_or(0, StreamBuffer::available) + self.unget.len();
                raw.saturating_sub(held as u64)
            }
        }
    }

    /// Returns the current logical position.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` if the backend cannot report a position.
    pub fn tell(&mut self) -> DeviceResult<u64> {
        let backend = self.backend.as_deref_mut().ok_or(DeviceError::Closed)?;
        let raw = backend_tell(backend, false)?;
        Ok(self.logical_position(raw))
    }

    /// Returns the current logical position as a 32-bit value.
    ///
    /// # Errors
    ///
    /// Returns `Overflow` if the position does not fit in 32 bits.
    pub fn tell32(&mut self) -> DeviceResult<i32> {
        let backend = self.backend.as_deref_mut().ok_or(DeviceError::Closed)?;
        let raw = backend_tell(backend, true)?;
        let position = self.logical_position(raw);
        i32::try_from(position).map_err(|_| DeviceError::overflow(position))
    }

    /// Saves the current position.
    ///
    /// # Errors
    ///
    /// As [`Self::tell`].
    pub fn get_position(&mut self) -> DeviceResult<StreamPosition> {
        self.tell().map(StreamPosition::new)
    }

    /// Restores a position saved with [`Self::get_position`].
    ///
    /// # Errors
    ///
    /// As [`Self::seek`].
    pub fn set_position(&mut self, position: &StreamPosition) -> DeviceResult<()> {
        let offset = i64::try_from(position.offset())
            .map_err(|_| DeviceError::out_of_range(position.offset()))?;
        self.seek_impl(offset, Whence::Start, false).map(|_| ())
    }

    /// Measures the stream length by seeking to the end and back.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` if the backend cannot seek or tell.
    pub fn size(&mut self) -> DeviceResult<u64> {
        let current = self.tell()?;
        let end = self.seek_impl(0, Whence::End, false)?;
        let back = i64::try_from(current).map_err(|_| DeviceError::out_of_range(current))?;
        self.seek_impl(back, Whence::Start, false)?;
        Ok(end)
    }

    // ------------------------------------------------------------------
    // Lifecycle and tuning
    // ------------------------------------------------------------------

    /// Finalizes the backend and releases the device.
    ///
    /// Closing an already-closed device is a no-op returning `Ok(())`.
    ///
    /// # Errors
    ///
    /// Returns the first error from flushing pending output or from the
    /// backend's finalization. The device is closed either way.
    pub fn close(&mut self) -> DeviceResult<()> {
        if self.backend.is_none() {
            return Ok(());
        }
        let flushed = self.flush_output();
        let closed = match self.backend.take() {
            Some(mut backend) => backend.close(),
            None => Ok(()),
        };
        self.buffer = None;
        self.unget.clear();
        self.direction = Direction::Idle;
        self.slot = None;
        debug!(what = self.what, "device closed");

        let result = flushed.and(closed);
        if let Err(err) = &result {
            self.error = Some(err.code());
            self.error_detail = Some(err.to_string());
        }
        result
    }

    /// Shuts down one or both halves of a duplex backend.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` unless the backend implements it.
    pub fn shutdown(&mut self, how: Shutdown) -> DeviceResult<()> {
        let backend = self.backend.as_deref_mut().ok_or(DeviceError::Closed)?;
        backend.shutdown(how)
    }

    /// Attaches a transfer buffer of `capacity` bytes, or detaches it with 0.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` for memory, string and empty devices.
    pub fn set_buffer(&mut self, capacity: usize) -> DeviceResult<()> {
        self.ensure_open()?;
        if !self.kind.supports_buffering() {
            return Err(DeviceError::unsupported(self.what, "set_buffer"));
        }
        match self.direction {
            Direction::Writing => self.flush_output()?,
            Direction::Reading => self.discard_input(),
            Direction::Idle => {}
        }
        self.buffer = (capacity > 0).then(|| StreamBuffer::new(capacity));
        Ok(())
    }

    /// Attaches a transfer buffer of the default size.
    ///
    /// # Errors
    ///
    /// As [`Self::set_buffer`].
    pub fn set_default_buffer(&mut self) -> DeviceResult<()> {
        self.set_buffer(DEFAULT_BUFFER_SIZE)
    }

    /// Returns the attached buffer's capacity.
    #[must_use]
    pub fn buffer_capacity(&self) -> Option<usize> {
        self.buffer.as_ref().map(StreamBuffer::capacity)
    }

    /// Sets the read timeout.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) {
        self.read_timeout = timeout;
        self.notify_timeouts();
    }

    /// Sets the write timeout.
    pub fn set_write_timeout(&mut self, timeout: Option<Duration>) {
        self.write_timeout = timeout;
        self.notify_timeouts();
    }

    /// Returns the read timeout.
    #[must_use]
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Returns the write timeout.
    #[must_use]
    pub fn write_timeout(&self) -> Option<Duration> {
        self.write_timeout
    }

    fn notify_timeouts(&mut self) {
        let (read, write) = (self.read_timeout, self.write_timeout);
        if let Some(backend) = self.backend.as_deref_mut() {
            backend.set_timeouts(read, write);
        }
    }

    /// Applies a [`DeviceConfig`].
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` if a buffer size is given for a kind that does
    /// not allow buffering.
    pub fn configure(&mut self, config: &DeviceConfig) -> DeviceResult<()> {
        if let Some(size) = config.buffer_size {
            self.set_buffer(size)?;
        }
        if config.read_timeout.is_some() {
            self.set_read_timeout(config.read_timeout);
        }
        if config.write_timeout.is_some() {
            self.set_write_timeout(config.write_timeout);
        }
        Ok(())
    }

    /// Pumps every remaining byte of this device into `dst`.
    ///
    /// Returns the number of bytes copied.
    ///
    /// # Errors
    ///
    /// Returns `Inner(code)` with the first sticky error of either device.
    pub fn copy_to(&mut self, dst: &mut Device) -> DeviceResult<u64> {
        let mut chunk = vec![0u8; DEFAULT_BUFFER_SIZE];
        let mut total = 0u64;
        loop {
            let n = self.read(&mut chunk);
            if n > 0 {
                let written = dst.write(&chunk[..n]);
                total += written as u64;
                if written < n {
                    return Err(DeviceError::Inner(dst.error.unwrap_or(ErrorCode::Write)));
                }
            }
            if n < chunk.len() {
                if let Some(code) = self.error {
                    return Err(DeviceError::Inner(code));
                }
                if self.eof || n == 0 {
                    break;
                }
            }
        }
        Ok(total)
    }
}

fn write_through(backend: &mut dyn Backend, buf: &[u8]) -> (usize, Option<DeviceError>) {
    let mut total = 0;
    while total < buf.len() {
        match backend.write(&buf[total..]) {
            Ok(0) => {
                let err = io::Error::new(io::ErrorKind::WriteZero, "backend accepted no bytes");
                return (total, Some(err.into()));
            }
            Ok(n) => total += n,
            Err(err) => return (total, Some(err)),
        }
    }
    (total, None)
}

fn drain_buffer(backend: &mut dyn Backend, buffer: &mut StreamBuffer) -> DeviceResult<()> {
    let (written, failure) = write_through(backend, buffer.pending());
    buffer.drain_front(written);
    trace!(bytes = written, "write buffer drained");
    failure.map_or(Ok(()), Err)
}

fn position_from_i32(position: i32) -> DeviceResult<u64> {
    u64::try_from(position).map_err(|_| DeviceError::out_of_range(position))
}

fn backend_tell(backend: &mut dyn Backend, prefer32: bool) -> DeviceResult<u64> {
    if prefer32 {
        match backend.tell32() {
            Ok(position) => position_from_i32(position),
            Err(err) if err.is_unsupported() => backend.tell64(),
            Err(err) => Err(err),
        }
    } else {
        match backend.tell64() {
            Err(err) if err.is_unsupported() => position_from_i32(backend.tell32()?),
            other => other,
        }
    }
}

fn backend_seek(
    backend: &mut dyn Backend,
    offset: i64,
    whence: Whence,
    prefer32: bool,
) -> DeviceResult<u64> {
    if prefer32 {
        if let Ok(narrow) = i32::try_from(offset) {
            match backend.seek32(narrow, whence) {
                Ok(position) => return position_from_i32(position),
                Err(err) if err.is_unsupported() => {}
                Err(err) => return Err(err),
            }
        }
        backend.seek64(offset, whence)
    } else {
        match backend.seek64(offset, whence) {
            Err(err) if err.is_unsupported() => {
                let narrow = i32::try_from(offset).map_err(|_| DeviceError::overflow(offset))?;
                position_from_i32(backend.seek32(narrow, whence)?)
            }
            other => other,
        }
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        if self.backend.is_some() {
            if let Err(err) = self.close() {
                warn!(what = self.what, error = %err, "device dropped without close; finalization failed");
            }
        }
    }
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device")
            .field("kind", &self.kind)
            .field("what", &self.what)
            .field("mode", &self.mode)
            .field("open", &self.backend.is_some())
            .field("error", &self.error)
            .field("eof", &self.eof)
            .field("direction", &self.direction)
            .finish_non_exhaustive()
    }
}

impl io::Read for Device {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Device::try_read(self, buf).map_err(io::Error::from)
    }
}

impl io::Write for Device {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Device::try_write(self, buf).map_err(io::Error::from)
    }

    fn flush(&mut self) -> io::Result<()> {
        Device::flush(self).map_err(io::Error::from)
    }
}

impl io::Seek for Device {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            io::SeekFrom::Start(offset) => {
                let offset = i64::try_from(offset)
                    .map_err(|_| io::Error::from(DeviceError::out_of_range(offset)))?;
                (offset, Whence::Start)
            }
            io::SeekFrom::Current(offset) => (offset, Whence::Current),
            io::SeekFrom::End(offset) => (offset, Whence::End),
        };
        Device::seek(self, offset, whence)?;
        Ok(self.tell()?)
    }
}
