//! # devio core
//!
//! The polymorphic stream device and its native backends.
//!
//! A [`Device`] is one opaque stream handle that can sit on top of a file, a
//! native file handle, a memory buffer, a C string, or any user-provided
//! [`Backend`]. Filters in `devio_filters` are themselves backends that wrap
//! other devices through a [`DeviceHandle`], so streams compose.
//!
//! ## Design Principles
//!
//! - Backends are dumb byte movers behind one dispatch trait
//! - The core owns mode checks, direction discipline, buffering, text mode,
//!   pushback and position width conversion
//! - Errors are sticky on the device and local to it
//! - EOF is tracked separately from errors
//!
//! ## Available Backends
//!
//! - [`FileBackend`] - Files by path and wrapped native handles
//! - [`SizedBuffer`] - Fixed-capacity memory
//! - [`DynamicBuffer`] - Growable memory
//! - [`CStringBackend`] - Read-only NUL-terminated strings
//! - [`EmptyBackend`] - Nothing in, nothing out
//! - [`Callbacks`] - Closure-based custom devices
//!
//! ## Example
//!
//! ```rust
//! use devio_core::{Device, Whence};
//!
//! let mut device = Device::open_sized(vec![0; 16], "w+").unwrap();
//! assert_eq!(device.write(b"hello"), 5);
//! device.seek(0, Whence::Start).unwrap();
//!
//! let mut buf = [0u8; 5];
//! assert_eq!(device.read(&mut buf), 5);
//! assert_eq!(&buf, b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod buffer;
mod config;
mod cstring;
mod custom;
mod device;
mod empty;
mod error;
mod file;
mod flags;
mod format;
mod handle;
mod memory;
mod mode;
mod pool;
mod position;

pub use backend::{resolve_seek, AsAny, Backend, DeviceKind, Shutdown, Whence};
pub use buffer::DEFAULT_BUFFER_SIZE;
pub use config::DeviceConfig;
pub use cstring::CStringBackend;
pub use custom::Callbacks;
pub use device::{Device, NEWLINE, UNGET_CAPACITY};
pub use empty::EmptyBackend;
pub use error::{DeviceError, DeviceResult, ErrorCode};
pub use file::{FileBackend, NativeHandle};
pub use flags::DeviceFlags;
pub use handle::DeviceHandle;
pub use memory::{DynamicBuffer, Growth, SizedBuffer};
pub use mode::OpenMode;
pub use pool::{DevicePool, PoolSlot};
pub use position::StreamPosition;
