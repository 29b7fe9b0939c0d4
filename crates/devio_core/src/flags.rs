//! Device status flags.

use crate::mode::OpenMode;
use std::fmt;
use std::ops::{BitOr, BitOrAssign};

/// Bitset describing a device's mode and current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DeviceFlags(u32);

impl DeviceFlags {
    /// Opened for reading.
    pub const READABLE: Self = Self(1 << 0);
    /// Opened for writing.
    pub const WRITABLE: Self = Self(1 << 1);
    /// Opened in update mode.
    pub const UPDATE: Self = Self(1 << 2);
    /// Writes go to the end.
    pub const APPEND: Self = Self(1 << 3);
    /// Binary mode (no newline translation).
    pub const BINARY: Self = Self(1 << 4);
    /// The sticky error flag is set.
    pub const ERROR: Self = Self(1 << 5);
    /// The end-of-file flag is set.
    pub const EOF: Self = Self(1 << 6);
    /// The last operation was a read.
    pub const JUST_READ: Self = Self(1 << 7);
    /// The last operation was a write.
    pub const JUST_WROTE: Self = Self(1 << 8);
    /// The device owns an attached transfer buffer.
    pub const OWNS_BUFFER: Self = Self(1 << 9);
    /// The device is open.
    pub const IN_USE: Self = Self(1 << 10);
    /// The device was heap allocated rather than taken from a pool.
    pub const DYNAMIC_ALLOC: Self = Self(1 << 11);
    /// Hardware acceleration was disabled with `<`.
    pub const NO_ACCEL: Self = Self(1 << 12);
    /// The device owns its native handle.
    pub const GRABBED: Self = Self(1 << 13);
    /// The device is not a cancellation point.
    pub const NO_CANCEL: Self = Self(1 << 14);
    /// A hardware-accelerated code path is active.
    pub const HW_ACCEL: Self = Self(1 << 15);

    const NAMES: [(Self, &'static str); 16] = [
        (Self::READABLE, "READABLE"),
        (Self::WRITABLE, "WRITABLE"),
        (Self::UPDATE, "UPDATE"),
        (Self::APPEND, "APPEND"),
        (Self::BINARY, "BINARY"),
        (Self::ERROR, "ERROR"),
        (Self::EOF, "EOF"),
        (Self::JUST_READ, "JUST_READ"),
        (Self::JUST_WROTE, "JUST_WROTE"),
        (Self::OWNS_BUFFER, "OWNS_BUFFER"),
        (Self::IN_USE, "IN_USE"),
        (Self::DYNAMIC_ALLOC, "DYNAMIC_ALLOC"),
        (Self::NO_ACCEL, "NO_ACCEL"),
        (Self::GRABBED, "GRABBED"),
        (Self::NO_CANCEL, "NO_CANCEL"),
        (Self::HW_ACCEL, "HW_ACCEL"),
    ];

    /// The empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Returns the raw bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Returns true if every bit in `other` is set.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Returns true if no bit is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns the union of both sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Sets or clears `other` depending on `value`.
    pub fn set(&mut self, other: Self, value: bool) {
        if value {
            self.0 |= other.0;
        } else {
            self.0 &= !other.0;
        }
    }

    /// Flags implied by a parsed mode string.
    #[must_use]
    pub fn from_mode(mode: &OpenMode) -> Self {
        let mut flags = Self::empty();
        flags.set(Self::READABLE, mode.read);
        flags.set(Self::WRITABLE, mode.write);
        flags.set(Self::UPDATE, mode.update);
        flags.set(Self::APPEND, mode.append);
        flags.set(Self::BINARY, mode.is_binary());
        flags.set(Self::NO_ACCEL, mode.no_accel);
        flags.set(Self::GRABBED, mode.grab);
        flags.set(Self::NO_CANCEL, mode.no_cancel);
        flags
    }
}

impl BitOr for DeviceFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for DeviceFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Display for DeviceFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                if !first {
                    f.write_str(" | ")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        if first {
            f.write_str("(empty)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_mode_sets_direction_bits() {
        let flags = DeviceFlags::from_mode(&OpenMode::parse("r+<").unwrap());
        assert!(flags.contains(DeviceFlags::READABLE | DeviceFlags::WRITABLE));
        assert!(flags.contains(DeviceFlags::UPDATE));
        assert!(flags.contains(DeviceFlags::BINARY));
        assert!(flags.contains(DeviceFlags::NO_ACCEL));
        assert!(!flags.contains(DeviceFlags::APPEND));
    }

    #[test]
    fn set_and_clear() {
        let mut flags = DeviceFlags::empty();
        flags.set(DeviceFlags::EOF, true);
        assert!(flags.contains(DeviceFlags::EOF));
        flags.set(DeviceFlags::EOF, false);
        assert!(flags.is_empty());
    }

    #[test]
    fn display_lists_names() {
        let flags = DeviceFlags::READABLE | DeviceFlags::EOF;
        assert_eq!(flags.to_string(), "READABLE | EOF");
        assert_eq!(DeviceFlags::empty().to_string(), "(empty)");
    }
}
