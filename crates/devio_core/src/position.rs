//! Opaque stream positions.

/// A saved stream position.
///
/// Positions are only meaningful when handed back to the device they came
/// from through [`crate::Device::set_position`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamPosition {
    offset: u64,
}

impl StreamPosition {
    pub(crate) const fn new(offset: u64) -> Self {
        Self { offset }
    }

    pub(crate) const fn offset(self) -> u64 {
        self.offset
    }
}
