//! Mode string parsing.
//!
//! Every device is opened with a mode string built from the characters
//! `r w + a x t b < g` and the sequence `@ncp`, in any order.

use crate::error::{DeviceError, DeviceResult};
use std::fmt;
use std::str::FromStr;

/// Flags parsed from a mode string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenMode {
    /// `r`: the device may be read.
    pub read: bool,
    /// `w`, `+` or `a`: the device may be written.
    pub write: bool,
    /// `w`: the target is created and truncated.
    pub truncate: bool,
    /// `+`: update mode, both directions.
    pub update: bool,
    /// `a`: writes always land at the end.
    pub append: bool,
    /// `x`: creation fails if the target exists.
    pub exclusive: bool,
    /// `t`: text mode newline translation. `b` clears it.
    pub text: bool,
    /// `<`: hardware acceleration disabled.
    pub no_accel: bool,
    /// `g`: the device takes ownership of a native handle.
    pub grab: bool,
    /// `@ncp`: the device is not a cancellation point.
    pub no_cancel: bool,
}

const NO_CANCEL_SEQUENCE: &str = "@ncp";

impl OpenMode {
    /// Parses a mode string.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` for an empty string, an unknown character, or a
    /// string that enables neither reading nor writing.
    pub fn parse(mode: &str) -> DeviceResult<Self> {
        if mode.is_empty() {
            return Err(DeviceError::invalid_mode(mode, "empty mode string"));
        }

        let mut parsed = Self::default();
        let mut rest = mode;
        while let Some(c) = rest.chars().next() {
            if rest.starts_with(NO_CANCEL_SEQUENCE) {
                parsed.no_cancel = true;
                rest = &rest[NO_CANCEL_SEQUENCE.len()..];
                continue;
            }
            match c {
                'r' => parsed.read = true,
                'w' => {
                    parsed.write = true;
                    parsed.truncate = true;
                }
                '+' => {
                    parsed.update = true;
                    parsed.read = true;
                    parsed.write = true;
                }
                'a' => {
                    parsed.append = true;
                    parsed.write = true;
                }
                'x' => parsed.exclusive = true,
                't' => parsed.text = true,
                'b' => parsed.text = false,
                '<' => parsed.no_accel = true,
                'g' => parsed.grab = true,
                other => {
                    return Err(DeviceError::invalid_mode(
                        mode,
                        format!("unknown mode character {other:?}"),
                    ));
                }
            }
            rest = &rest[c.len_utf8()..];
        }

        if !parsed.read && !parsed.write {
            return Err(DeviceError::invalid_mode(
                mode,
                "mode enables neither reading nor writing",
            ));
        }
        Ok(parsed)
    }

    /// Returns true if exactly one direction is enabled.
    #[must_use]
    pub const fn is_unidirectional(&self) -> bool {
        self.read != self.write
    }

    /// Returns true for binary mode (the default).
    #[must_use]
    pub const fn is_binary(&self) -> bool {
        !self.text
    }

    /// Requires exactly one direction, as streaming codecs do.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` naming `filter` if both or neither direction is set.
    pub fn require_one_direction(&self, filter: &str) -> DeviceResult<()> {
        if self.is_unidirectional() {
            Ok(())
        } else {
            Err(DeviceError::invalid_mode(
                self.to_string(),
                format!("{filter} must be opened for exactly one of reading or writing"),
            ))
        }
    }

    /// Rejects writable modes, for read-only sources.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` naming `backend` if the mode is writable.
    pub fn require_read_only(&self, backend: &str) -> DeviceResult<()> {
        if self.write {
            Err(DeviceError::invalid_mode(
                self.to_string(),
                format!("{backend} devices cannot be opened for writing"),
            ))
        } else {
            Ok(())
        }
    }

    /// Rejects readable modes, for write-only sinks.
    ///
    /// # Errors
    ///
    /// Returns `InvalidMode` naming `backend` if the mode is readable.
    pub fn require_write_only(&self, backend: &str) -> DeviceResult<()> {
        if self.read {
            Err(DeviceError::invalid_mode(
                self.to_string(),
                format!("{backend} devices cannot be opened for reading"),
            ))
        } else {
            Ok(())
        }
    }
}

impl FromStr for OpenMode {
    type Err = DeviceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.append {
            f.write_str("a")?;
        } else if self.truncate {
            f.write_str("w")?;
        } else {
            f.write_str("r")?;
        }
        if self.read && self.write {
            f.write_str("+")?;
        }
        if self.exclusive {
            f.write_str("x")?;
        }
        f.write_str(if self.text { "t" } else { "b" })?;
        if self.no_accel {
            f.write_str("<")?;
        }
        if self.grab {
            f.write_str("g")?;
        }
        if self.no_cancel {
            f.write_str(NO_CANCEL_SEQUENCE)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_read_only() {
        let mode = OpenMode::parse("r").unwrap();
        assert!(mode.read);
        assert!(!mode.write);
        assert!(mode.is_binary());
    }

    #[test]
    fn parse_update_enables_both_directions() {
        let mode = OpenMode::parse("r+").unwrap();
        assert!(mode.read && mode.write && mode.update);

        let mode = OpenMode::parse("+").unwrap();
        assert!(mode.read && mode.write);
    }

    #[test]
    fn append_implies_write() {
        let mode = OpenMode::parse("a").unwrap();
        assert!(mode.write);
        assert!(mode.append);
        assert!(!mode.read);
    }

    #[test]
    fn text_binary_last_wins() {
        assert!(OpenMode::parse("rtb").unwrap().is_binary());
        assert!(OpenMode::parse("rbt").unwrap().text);
    }

    #[test]
    fn parse_flags_in_any_order() {
        let mode = OpenMode::parse("<g@ncpwx").unwrap();
        assert!(mode.no_accel);
        assert!(mode.grab);
        assert!(mode.no_cancel);
        assert!(mode.write);
        assert!(mode.exclusive);
    }

    #[test]
    fn no_cancel_sequence_between_flags() {
        let mode = OpenMode::parse("r@ncpb").unwrap();
        assert!(mode.no_cancel);
        assert!(mode.read);
    }

    #[test]
    fn rejects_invalid_modes() {
        assert!(OpenMode::parse("").is_err());
        assert!(OpenMode::parse("q").is_err());
        assert!(OpenMode::parse("tb").is_err());
        assert!(OpenMode::parse("r@nc").is_err());
        assert!(matches!(
            OpenMode::parse("x"),
            Err(DeviceError::InvalidMode { .. })
        ));
    }

    #[test]
    fn from_str_matches_parse() {
        let mode: OpenMode = "w+".parse().unwrap();
        assert_eq!(mode, OpenMode::parse("w+").unwrap());
    }

    #[test]
    fn direction_requirements() {
        let read = OpenMode::parse("r").unwrap();
        let both = OpenMode::parse("r+").unwrap();
        assert!(read.require_one_direction("hex").is_ok());
        assert!(both.require_one_direction("hex").is_err());
        assert!(read.require_read_only("cstring").is_ok());
        assert!(both.require_read_only("cstring").is_err());
        assert!(read.require_write_only("tee").is_err());
    }

    #[test]
    fn display_round_trips() {
        for text in ["r", "w", "r+", "w+", "a", "a+", "rt", "w<", "rg@ncp", "wx"] {
            let mode = OpenMode::parse(text).unwrap();
            let again = OpenMode::parse(&mode.to_string()).unwrap();
            assert_eq!(mode.read, again.read, "{text}");
            assert_eq!(mode.write, again.write, "{text}");
            assert_eq!(mode.append, again.append, "{text}");
            assert_eq!(mode.truncate, again.truncate, "{text}");
            assert_eq!(mode.text, again.text, "{text}");
            assert_eq!(mode.no_accel, again.no_accel, "{text}");
            assert_eq!(mode.grab, again.grab, "{text}");
            assert_eq!(mode.no_cancel, again.no_cancel, "{text}");
        }
    }
}
