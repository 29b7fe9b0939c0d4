//! Bounded device slot pool.
//!
//! An optional allocation strategy for callers that want a hard cap on the
//! number of open devices. Devices opened through [`DevicePool::open`] hold a
//! slot until they are closed. Ordinary `Device::open_*` calls do not touch
//! any pool.

use crate::backend::Backend;
use crate::device::Device;
use crate::error::{DeviceError, DeviceResult};
use crate::mode::OpenMode;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

#[derive(Debug)]
struct PoolState {
    slots: Mutex<Vec<bool>>,
}

/// A fixed number of device slots.
#[derive(Debug, Clone)]
pub struct DevicePool {
    state: Arc<PoolState>,
}

impl DevicePool {
    /// Creates a pool with `slots` slots.
    #[must_use]
    pub fn new(slots: usize) -> Self {
        Self {
            state: Arc::new(PoolState {
                slots: Mutex::new(vec![false; slots]),
            }),
        }
    }

    /// Returns the total number of slots.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.state.slots.lock().len()
    }

    /// Returns the number of free slots.
    #[must_use]
    pub fn available(&self) -> usize {
        self.state.slots.lock().iter().filter(|used| !**used).count()
    }

    /// Opens a device in a free slot.
    ///
    /// # Errors
    ///
    /// Returns `PoolExhausted` when every slot is in use, or the backend's
    /// open error (the slot is returned in that case).
    pub fn open<B: Backend>(&self, backend: B, mode: &str) -> DeviceResult<Device> {
        let mode = OpenMode::parse(mode)?;
        let slot = self.acquire()?;
        Device::from_parts(Box::new(backend), mode, Some(slot))
    }

    fn acquire(&self) -> DeviceResult<PoolSlot> {
        let mut slots = self.state.slots.lock();
        match slots.iter().position(|used| !*used) {
            Some(index) => {
                slots[index] = true;
                Ok(PoolSlot {
                    state: Arc::clone(&self.state),
                    index,
                })
            }
            None => {
                debug!(capacity = slots.len(), "device pool exhausted");
                Err(DeviceError::PoolExhausted {
                    capacity: slots.len(),
                })
            }
        }
    }
}

/// A claimed pool slot, returned to the pool on drop.
#[derive(Debug)]
pub struct PoolSlot {
    state: Arc<PoolState>,
    index: usize,
}

impl Drop for PoolSlot {
    fn drop(&mut self) {
        if let Some(used) = self.state.slots.lock().get_mut(self.index) {
            *used = false;
        }
    }
}
