//! Post-open device tuning.

use std::time::Duration;

/// Settings applied to an open device with [`crate::Device::configure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Transfer buffer size. `None` leaves buffering unchanged, `Some(0)`
    /// detaches the buffer.
    pub buffer_size: Option<usize>,

    /// Read timeout, honored by blocking backends.
    pub read_timeout: Option<Duration>,

    /// Write timeout, honored by blocking backends.
    pub write_timeout: Option<Duration>,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            buffer_size: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl DeviceConfig {
    /// Creates a configuration that changes nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the transfer buffer size.
    #[must_use]
    pub const fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = Some(size);
        self
    }

    /// Sets the read timeout.
    #[must_use]
    pub const fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    /// Sets the write timeout.
    #[must_use]
    pub const fn write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    /// Sets both timeouts from a microsecond count.
    #[must_use]
    pub const fn timeouts_micros(mut self, micros: u64) -> Self {
        let timeout = Duration::from_micros(micros);
        self.read_timeout = Some(timeout);
        self.write_timeout = Some(timeout);
        self
    }
}
