//! # devio filters
//!
//! Filter devices layered over other devices.
//!
//! Every filter is a [`devio_core::Backend`] holding a
//! [`devio_core::DeviceHandle`] to the device it wraps, so the result of one
//! filter can be the inner device of the next. A filter never owns its inner
//! device: closing the filter finalizes the filter's own stream (writes a
//! digest, pads the last block, emits the zlib trailer) and leaves the inner
//! device open.
//!
//! ## Filters
//!
//! - Codecs: [`hex_encode`], [`hex_decode`], [`base64_encode`], [`base64_decode`]
//! - Block padding: [`pad_encode`], [`pad_decode`] (bit padding and PKCS#7)
//! - Digests: [`hash`] with MD5, SHA-1 or SHA-256
//! - Ciphers: [`aes_encrypt`], [`aes_decrypt`] in ECB, CBC, PCBC, CFB or OFB
//! - Compression: [`deflate`], [`inflate`]
//! - Plumbing: [`limit`], [`concat`], [`tee`], [`repeat`]
//! - Sources and queues: [`random`], [`ThreadBuffer`]
//!
//! Streaming transforms share one engine, [`CodecFilter`], driven by a
//! [`StreamCodec`]. Implement that trait to add a new transform.
//!
//! ## Example
//!
//! ```rust
//! use devio_core::{Device, Growth};
//! use devio_filters::{base64_decode, base64_encode, Base64Config};
//!
//! let sink = Device::open_dynamic(Growth::Exponential, "w+").unwrap().into_handle();
//! let mut encoder = base64_encode(&sink, &Base64Config::default(), "w").unwrap();
//! encoder.write(b"any carnal pleas");
//! encoder.close().unwrap();
//! assert_eq!(sink.lock().contents().unwrap(), b"YW55IGNhcm5hbCBwbGVhcw==");
//!
//! sink.lock().rewind().unwrap();
//! let mut decoder = base64_decode(&sink, &Base64Config::default(), "r").unwrap();
//! let mut out = [0u8; 32];
//! assert_eq!(decoder.read(&mut out), 16);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod aes;
mod base64;
mod codec;
mod concat;
mod error;
mod hash;
mod hex;
mod inner;
mod limit;
mod padding;
mod random;
mod repeat;
mod tee;
mod thread_buffer;
mod zlib;
mod zstream;

pub use self::aes::{aes_decrypt, aes_encrypt, AesCodec, AesConfig, CipherMode, BLOCK_SIZE};
pub use base64::{base64_decode, base64_encode, Alphabet, Base64Codec, Base64Config};
pub use codec::{CodecFilter, Fault, Location, StreamCodec};
pub use concat::{concat, Concat};
pub use error::{FilterError, FilterResult};
pub use hash::{hash, HashAlgorithm, HashFilter};
pub use hex::{hex_decode, hex_encode, HexCodec};
pub use limit::{limit, Limiter};
pub use padding::{pad_decode, pad_encode, PaddingCodec, PaddingScheme};
pub use random::{random, RandomSource};
pub use repeat::{repeat, Repeat};
pub use tee::{tee, Tee};
pub use thread_buffer::{ThreadBuffer, ThreadBufferConfig};
pub use zlib::{deflate, inflate, ZlibCodec, ZlibConfig, DEFAULT_LEVEL};
