//! # devio testkit
//!
//! Test utilities for devio.
//!
//! This crate provides:
//! - Memory and temp-file device fixtures, plus drain/pump helpers
//! - Property-based test generators using proptest
//! - Known-answer vectors for the codecs, digests and ciphers
//!
//! ## Usage
//!
//! ```rust
//! use devio_testkit::prelude::*;
//!
//! let source = memory_source(b"hello");
//! let mut device = source.lock();
//! assert_eq!(drain(&mut device), b"hello");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod vectors;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::vectors::*;
}

pub use fixtures::*;
pub use generators::*;
pub use vectors::*;
