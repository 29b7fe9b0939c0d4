//! Character and formatted I/O built on read, write and ungetc.

use crate::device::Device;
use crate::error::DeviceError;
use std::fmt;

impl Device {
    /// Reads one byte. `None` means EOF or error.
    pub fn getc(&mut self) -> Option<u8> {
        let mut byte = [0u8; 1];
        (self.read(&mut byte) == 1).then_some(byte[0])
    }

    /// Writes one byte, returning it on success.
    pub fn putc(&mut self, byte: u8) -> Option<u8> {
        (self.write(&[byte]) == 1).then_some(byte)
    }

    /// Writes a string, returning the number of bytes written.
    pub fn puts(&mut self, text: &str) -> usize {
        self.write(text.as_bytes())
    }

    /// Writes formatted output, returning the number of bytes written.
    ///
    /// ```rust
    /// use devio_core::{Device, Growth};
    ///
    /// let mut device = Device::open_dynamic(Growth::Exponential, "w").unwrap();
    /// device.print(format_args!("{}-{:02}", "id", 7));
    /// assert_eq!(device.contents().unwrap(), b"id-07");
    /// ```
    pub fn print(&mut self, args: fmt::Arguments<'_>) -> usize {
        match args.as_str() {
            Some(text) => self.write(text.as_bytes()),
            None => self.write(args.to_string().as_bytes()),
        }
    }

    /// Appends bytes up to and including the next `\n` to `line`.
    ///
    /// Returns the number of bytes appended; 0 means EOF or error.
    pub fn read_line(&mut self, line: &mut Vec<u8>) -> usize {
        let start = line.len();
        while let Some(byte) = self.getc() {
            line.push(byte);
            if byte == b'\n' {
                break;
            }
        }
        line.len() - start
    }

    fn skip_whitespace(&mut self) -> Option<u8> {
        loop {
            let byte = self.getc()?;
            if !byte.is_ascii_whitespace() {
                return Some(byte);
            }
        }
    }

    /// Skips whitespace and reads one whitespace-delimited word.
    ///
    /// The delimiter after the word is pushed back.
    pub fn scan_word(&mut self) -> Option<String> {
        let first = self.skip_whitespace()?;
        let mut word = vec![first];
        while let Some(byte) = self.getc() {
            if byte.is_ascii_whitespace() {
                self.ungetc(byte);
                break;
            }
            word.push(byte);
        }
        Some(String::from_utf8_lossy(&word).into_owned())
    }

    /// Skips whitespace and reads a signed decimal integer.
    ///
    /// The first byte that is not part of the number is pushed back. Returns
    /// `None` if no digits follow, or on overflow (which sets `Overflow`).
    pub fn scan_integer(&mut self) -> Option<i64> {
        let mut byte = self.skip_whitespace()?;
        let negative = byte == b'-';
        let sign = (byte == b'-' || byte == b'+').then_some(byte);
        if sign.is_some() {
            match self.getc() {
                Some(next) => byte = next,
                None => {
                    self.ungetc(byte);
                    return None;
                }
            }
        }
        if !byte.is_ascii_digit() {
            self.ungetc(byte);
            if let Some(sign) = sign {
                self.ungetc(sign);
            }
            return None;
        }

        let mut value: i64 = 0;
        loop {
            let digit = i64::from(byte - b'0');
            let next = value.checked_mul(10).and_then(|v| {
                if negative {
                    v.checked_sub(digit)
                } else {
                    v.checked_add(digit)
                }
            });
            match next {
                Some(next) => value = next,
                None => {
                    self.fail(DeviceError::overflow(value));
                    return None;
                }
            }
            match self.getc() {
                Some(next) if next.is_ascii_digit() => byte = next,
                Some(other) => {
                    self.ungetc(other);
                    break;
                }
                None => break,
            }
        }
        Some(value)
    }
}
