//! Property-based test generators using proptest.
//!
//! Provides strategies for payloads and filter parameters.

use proptest::prelude::*;

/// Strategy for arbitrary payloads up to 2 KiB.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..2048)
}

/// Strategy for small payloads, biased towards block-boundary edge cases.
pub fn short_payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..48)
}

/// Strategy for padding block sizes.
pub fn block_size_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![Just(1usize), Just(8), Just(16), Just(255), 1usize..=255]
}

/// Strategy for write chunk sizes.
pub fn chunk_size_strategy() -> impl Strategy<Value = usize> {
    prop_oneof![Just(1usize), 1usize..64, 64usize..4096]
}

/// Strategy for AES keys of 128, 192 or 256 bits.
pub fn aes_key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![Just(16usize), Just(24), Just(32)]
        .prop_flat_map(|len| prop::collection::vec(any::<u8>(), len))
}

/// Strategy for 16-byte initialization vectors.
pub fn iv_strategy() -> impl Strategy<Value = [u8; 16]> {
    prop::array::uniform16(any::<u8>())
}

/// Strategy for custom base64 alphabets: 64 distinct symbols, no `=`.
pub fn base64_alphabet_strategy() -> impl Strategy<Value = Vec<u8>> {
    let symbols: Vec<u8> = (0x21u8..0x7f).filter(|b| *b != b'=').collect();
    Just(symbols)
        .prop_shuffle()
        .prop_map(|mut symbols| {
            symbols.truncate(64);
            symbols
        })
}

/// Environment variable that switches property suites to [`Coverage::Soak`].
pub const SOAK_ENV: &str = "DEVIO_SOAK";

/// How many cases a property suite runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coverage {
    /// A few dozen cases, sized for every `cargo test` run.
    Smoke,
    /// Long runs for chasing rare codec boundaries.
    Soak,
}

impl Coverage {
    /// `Soak` when [`SOAK_ENV`] is set to anything but `0`, else `Smoke`.
    #[must_use]
    pub fn from_env() -> Self {
        match std::env::var(SOAK_ENV) {
            Ok(value) if value != "0" => Self::Soak,
            _ => Self::Smoke,
        }
    }

    /// The proptest settings for this level.
    #[must_use]
    pub fn config(self) -> ProptestConfig {
        let (cases, max_shrink_iters) = match self {
            Self::Smoke => (32, 128),
            Self::Soak => (1024, 8192),
        };
        ProptestConfig {
            cases,
            max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}
