//! In-memory backends.

use crate::backend::{resolve_seek, Backend, DeviceKind, Whence};
use crate::device::Device;
use crate::error::{DeviceError, DeviceResult};
use crate::mode::OpenMode;

fn copy_out(data: &[u8], pos: &mut usize, buf: &mut [u8]) -> usize {
    let available = data.len().saturating_sub(*pos);
    let n = buf.len().min(available);
    buf[..n].copy_from_slice(&data[*pos..*pos + n]);
    *pos += n;
    n
}

/// A fixed-capacity buffer over caller-supplied storage.
///
/// The storage's length is the capacity. Reads stop at the visible size;
/// writes past the capacity write what fits and then fail with
/// `BufferFull`.
///
/// # Example
///
/// ```rust
/// use devio_core::{Device, ErrorCode};
///
/// let mut device = Device::open_sized(vec![0; 4], "w").unwrap();
/// assert_eq!(device.write(b"abcdef"), 4);
/// assert_eq!(device.error(), Some(ErrorCode::NoBufferSpace));
/// assert_eq!(device.contents().unwrap(), b"abcd");
/// ```
#[derive(Debug)]
pub struct SizedBuffer {
    data: Vec<u8>,
    len: usize,
    pos: usize,
    append: bool,
}

impl SizedBuffer {
    /// Uses all of `storage` as both capacity and visible content.
    #[must_use]
    pub fn new(storage: Vec<u8>) -> Self {
        let len = storage.len();
        Self {
            data: storage,
            len,
            pos: 0,
            append: false,
        }
    }

    /// Uses `storage` as capacity with only its first `len` bytes visible.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `len` exceeds the storage length.
    pub fn with_len(storage: Vec<u8>, len: usize) -> DeviceResult<Self> {
        if len > storage.len() {
            return Err(DeviceError::invalid_argument(format!(
                "visible size {len} exceeds capacity {}",
                storage.len()
            )));
        }
        let mut buffer = Self::new(storage);
        buffer.len = len;
        Ok(buffer)
    }

    /// Returns the capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Returns the visible content.
    #[must_use]
    pub fn contents(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Returns the storage, visible or not.
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl Backend for SizedBuffer {
    fn kind(&self) -> DeviceKind {
        DeviceKind::SizedBuffer
    }

    fn what(&self) -> &'static str {
        "sized_buffer"
    }

    fn open(&mut self, mode: &OpenMode) -> DeviceResult<()> {
        if mode.truncate {
            self.len = 0;
        }
        self.append = mode.append;
        if mode.append {
            self.pos = self.len;
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        Ok(copy_out(&self.data[..self.len], &mut self.pos, buf))
    }

    fn write(&mut self, buf: &[u8]) -> DeviceResult<usize> {
        if self.append {
            self.pos = self.len;
        }
        let space = self.data.len() - self.pos;
        if space == 0 {
            return Err(DeviceError::buffer_full(self.data.len()));
        }
        let n = buf.len().min(space);
        self.data[self.pos..self.pos + n].copy_from_slice(&buf[..n]);
        self.pos += n;
        self.len = self.len.max(self.pos);
        Ok(n)
    }

    fn tell64(&mut self) -> DeviceResult<u64> {
        Ok(self.pos as u64)
    }

    fn seek64(&mut self, offset: i64, whence: Whence) -> DeviceResult<u64> {
        let len = self.len as u64;
        let target = resolve_seek(offset, whence, self.pos as u64, len, len)?;
        self.pos = usize::try_from(target).map_err(|_| DeviceError::out_of_range(target))?;
        Ok(target)
    }
}

/// Growth policy for [`DynamicBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Growth {
    /// Capacity doubles when full.
    #[default]
    Exponential,
    /// Capacity grows to exactly what is needed.
    Minimal,
}

const MIN_DYNAMIC_CAPACITY: usize = 16;

/// A growable write sink that can also be read back.
#[derive(Debug, Default)]
pub struct DynamicBuffer {
    data: Vec<u8>,
    pos: usize,
    growth: Growth,
    append: bool,
}

impl DynamicBuffer {
    /// Creates an empty buffer with the given growth policy.
    #[must_use]
    pub fn new(growth: Growth) -> Self {
        Self {
            growth,
            ..Self::default()
        }
    }

    /// Starts from existing content, positioned at the start.
    #[must_use]
    pub fn with_data(data: Vec<u8>, growth: Growth) -> Self {
        Self {
            data,
            growth,
            ..Self::default()
        }
    }

    /// Returns the content.
    #[must_use]
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// Returns the allocated capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.capacity()
    }

    /// Relinquishes the allocation, leaving the buffer empty.
    pub fn take(&mut self) -> Vec<u8> {
        self.pos = 0;
        std::mem::take(&mut self.data)
    }

    /// Hands an allocation back; the position resets to 0.
    pub fn restore(&mut self, data: Vec<u8>) {
        self.data = data;
        self.pos = 0;
    }

    fn reserve_for(&mut self, needed: usize) -> DeviceResult<()> {
        let capacity = self.data.capacity();
        if needed <= capacity {
            return Ok(());
        }
        let target = match self.growth {
            Growth::Exponential => needed.max(capacity.saturating_mul(2)).max(MIN_DYNAMIC_CAPACITY),
            Growth::Minimal => needed,
        };
        self.data
            .try_reserve_exact(target - self.data.len())
            .map_err(|_| DeviceError::OutOfMemory)
    }
}

impl Backend for DynamicBuffer {
    fn kind(&self) -> DeviceKind {
        DeviceKind::DynamicBuffer
    }

    fn what(&self) -> &'static str {
        "dynamic_buffer"
    }

    fn open(&mut self, mode: &OpenMode) -> DeviceResult<()> {
        if mode.truncate {
            self.data.clear();
        }
        self.append = mode.append;
        if mode.append {
            self.pos = self.data.len();
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> DeviceResult<usize> {
        Ok(copy_out(&self.data, &mut self.pos, buf))
    }

    fn write(&mut self, buf: &[u8]) -> DeviceResult<usize> {
        if self.append {
            self.pos = self.data.len();
        }
        let end = self
            .pos
            .checked_add(buf.len())
            .ok_or(DeviceError::OutOfMemory)?;
        self.reserve_for(end)?;

        let overlap = self.data.len().saturating_sub(self.pos).min(buf.len());
        self.data[self.pos..self.pos + overlap].copy_from_slice(&buf[..overlap]);
        self.data.extend_from_slice(&buf[overlap..]);
        self.pos = end;
        Ok(buf.len())
    }

    fn tell64(&mut self) -> DeviceResult<u64> {
        Ok(self.pos as u64)
    }

    fn seek64(&mut self, offset: i64, whence: Whence) -> DeviceResult<u64> {
        let len = self.data.len() as u64;
        let target = resolve_seek(offset, whence, self.pos as u64, len, len)?;
        self.pos = usize::try_from(target).map_err(|_| DeviceError::out_of_range(target))?;
        Ok(target)
    }
}

impl Device {
    /// Opens a fixed-capacity buffer over `storage`.
    ///
    /// The storage length is the capacity. `w` makes the visible size 0;
    /// otherwise all of it is visible.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` for a malformed mode.
    pub fn open_sized(storage: Vec<u8>, mode: &str) -> DeviceResult<Self> {
        Self::open_backend(Box::new(SizedBuffer::new(storage)), mode)
    }

    /// Opens an empty growable buffer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` for a malformed mode.
    pub fn open_dynamic(growth: Growth, mode: &str) -> DeviceResult<Self> {
        Self::open_backend(Box::new(DynamicBuffer::new(growth)), mode)
    }

    /// Returns the visible content of a memory device.
    #[must_use]
    pub fn contents(&self) -> Option<&[u8]> {
        if let Some(sized) = self.backend_ref::<SizedBuffer>() {
            return Some(sized.contents());
        }
        self.backend_ref::<DynamicBuffer>().map(DynamicBuffer::contents)
    }

    /// Takes the allocation of a dynamic buffer device, leaving it empty.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` for any other kind of device.
    pub fn take_buffer(&mut self) -> DeviceResult<Vec<u8>> {
        let what = self.what();
        let data = self
            .backend_mut::<DynamicBuffer>()
            .ok_or(DeviceError::unsupported(what, "take_buffer"))?
            .take();
        self.reset_state();
        Ok(data)
    }

    /// Hands an allocation back to a dynamic buffer device.
    ///
    /// # Errors
    ///
    /// Returns `Unsupported` for any other kind of device.
    pub fn restore_buffer(&mut self, data: Vec<u8>) -> DeviceResult<()> {
        let what = self.what();
        self.backend_mut::<DynamicBuffer>()
            .ok_or(DeviceError::unsupported(what, "restore_buffer"))?
            .restore(data);
        self.reset_state();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    #[test]
    fn sized_read_stops_at_visible_size() {
        let backend = SizedBuffer::with_len(b"abc\0\0".to_vec(), 3).unwrap();
        let mut device = Device::open_backend(Box::new(backend), "r").unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(device.read(&mut buf), 3);
        assert!(device.eof());
    }

    #[test]
    fn sized_write_mode_truncates_visible_size() {
        let mut device = Device::open_sized(b"old data".to_vec(), "w").unwrap();
        assert_eq!(device.contents().unwrap(), b"");
        assert_eq!(device.write(b"new"), 3);
        assert_eq!(device.contents().unwrap(), b"new");
    }

    #[test]
    fn sized_overflow_is_no_buffer_space() {
        let mut device = Device::open_sized(vec![0; 2], "w").unwrap();
        assert_eq!(device.write(b"XY"), 2);
        assert!(device.error().is_none());
        assert_eq!(device.write(b"Z"), 0);
        assert_eq!(device.error(), Some(ErrorCode::NoBufferSpace));
    }

    #[test]
    fn sized_append_writes_after_content() {
        let backend = SizedBuffer::with_len(b"ab\0\0".to_vec(), 2).unwrap();
        let mut device = Device::open_backend(Box::new(backend), "a").unwrap();
        assert_eq!(device.write(b"cd"), 2);
        assert_eq!(device.contents().unwrap(), b"abcd");
    }

    #[test]
    fn with_len_rejects_oversized_length() {
        assert!(SizedBuffer::with_len(vec![0; 2], 3).is_err());
    }

    #[test]
    fn dynamic_growth_policies() {
        let mut minimal = DynamicBuffer::new(Growth::Minimal);
        minimal.write(b"12345").unwrap();
        assert_eq!(minimal.capacity(), 5);

        let mut exponential = DynamicBuffer::new(Growth::Exponential);
        exponential.write(b"12345").unwrap();
        assert!(exponential.capacity() >= MIN_DYNAMIC_CAPACITY);
        exponential.write(&[0u8; 20]).unwrap();
        assert!(exponential.capacity() >= 32);
    }

    #[test]
    fn dynamic_overwrite_then_extend() {
        let mut device = Device::open_dynamic(Growth::Exponential, "w+").unwrap();
        assert_eq!(device.write(b"hello"), 5);
        device.seek(3, Whence::Start).unwrap();
        assert_eq!(device.write(b"p me"), 4);
        assert_eq!(device.contents().unwrap(), b"help me");
    }

    #[test]
    fn take_and_restore_transfer_ownership() {
        let mut device = Device::open_dynamic(Growth::Exponential, "w+").unwrap();
        device.write(b"payload");

        let taken = device.take_buffer().unwrap();
        assert_eq!(taken, b"payload");
        assert_eq!(device.contents().unwrap(), b"");

        device.restore_buffer(taken).unwrap();
        let mut buf = [0u8; 7];
        assert_eq!(device.read(&mut buf), 7);
        assert_eq!(&buf, b"payload");
    }

    #[test]
    fn take_buffer_unsupported_on_sized() {
        let mut device = Device::open_sized(vec![0; 4], "w").unwrap();
        assert!(device.take_buffer().unwrap_err().is_unsupported());
    }
}
