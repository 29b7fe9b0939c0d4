//! Shared device handles.

use crate::device::Device;
use crate::error::DeviceResult;
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

/// A reference-counted handle to an open [`Device`].
///
/// Filters hold a clone of their inner device's handle, so one device can
/// sit under several filters. The device is closed when the last handle is
/// released or dropped.
///
/// Each call locks the device for its duration; there is no ordering
/// guarantee between callers beyond the mutex.
#[derive(Debug, Clone)]
pub struct DeviceHandle {
    inner: Arc<Mutex<Device>>,
}

impl DeviceHandle {
    /// Wraps an open device.
    #[must_use]
    pub fn new(device: Device) -> Self {
        Self {
            inner: Arc::new(Mutex::new(device)),
        }
    }

    /// Locks the device for exclusive use.
    pub fn lock(&self) -> MutexGuard<'_, Device> {
        self.inner.lock()
    }

    /// Returns the number of live handles to this device.
    #[must_use]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Returns true if both handles refer to the same device.
    #[must_use]
    pub fn same_device(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Drops this reference, closing the device if it was the last one.
    ///
    /// # Errors
    ///
    /// Returns the close error when this was the last reference.
    pub fn release(self) -> DeviceResult<()> {
        match Arc::try_unwrap(self.inner) {
            Ok(mutex) => mutex.into_inner().close(),
            Err(_shared) => Ok(()),
        }
    }

    /// Unwraps the device if this is the last handle.
    ///
    /// # Errors
    ///
    /// Returns the handle unchanged if other references exist.
    pub fn try_into_device(self) -> Result<Device, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}

impl From<Device> for DeviceHandle {
    fn from(device: Device) -> Self {
        Self::new(device)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Growth;

    #[test]
    fn release_closes_only_last_reference() {
        let handle = Device::open_dynamic(Growth::Exponential, "w")
            .unwrap()
            .into_handle();
        let other = handle.clone();
        assert_eq!(handle.ref_count(), 2);

        handle.release().unwrap();
        assert!(other.lock().is_open());
        assert_eq!(other.ref_count(), 1);

        let again = other.clone();
        other.release().unwrap();
        assert!(again.lock().is_open());
        again.release().unwrap();
    }

    #[test]
    fn writes_through_any_clone_are_shared() {
        let handle = Device::open_dynamic(Growth::Minimal, "w")
            .unwrap()
            .into_handle();
        let other = handle.clone();
        assert!(handle.same_device(&other));

        handle.lock().write_exact(b"one ").unwrap();
        other.lock().write_exact(b"two").unwrap();
        drop(other);

        let device = handle.try_into_device().unwrap();
        assert_eq!(device.contents().unwrap(), b"one two");
    }

    #[test]
    fn try_into_device_fails_while_shared() {
        let handle = Device::open_empty("r").unwrap().into_handle();
        let other = handle.clone();
        let handle = handle.try_into_device().unwrap_err();
        assert_eq!(handle.ref_count(), 2);
        drop(other);
    }
}
