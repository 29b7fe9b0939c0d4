//! Known-answer vectors for the codecs, digests and ciphers.
//!
//! Sources: RFC 4648 (base16/base64), RFC 1321 (MD5), FIPS 180 (SHA-1,
//! SHA-256), FIPS 197 appendix C and SP 800-38A (AES).

/// A single known-answer vector.
#[derive(Debug, Clone)]
pub struct TestVector {
    /// Unique identifier for this vector.
    pub id: String,
    /// Human-readable description.
    pub description: String,
    /// Input data (hex-encoded).
    pub input_hex: String,
    /// Expected output data (hex-encoded).
    pub expected_hex: String,
}

impl TestVector {
    fn new(id: &str, description: &str, input: &[u8], expected: &[u8]) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            input_hex: to_hex(input),
            expected_hex: to_hex(expected),
        }
    }

    fn digest(id: &str, input: &str, expected_hex: &str) -> Self {
        Self {
            id: id.into(),
            description: format!("digest of {input:?}"),
            input_hex: to_hex(input.as_bytes()),
            expected_hex: expected_hex.into(),
        }
    }

    /// Decoded input bytes.
    pub fn input(&self) -> Vec<u8> {
        from_hex(&self.input_hex)
    }

    /// Decoded expected bytes.
    pub fn expected(&self) -> Vec<u8> {
        from_hex(&self.expected_hex)
    }
}

/// An AES known-answer vector.
#[derive(Debug, Clone)]
pub struct AesVector {
    /// Unique identifier for this vector.
    pub id: &'static str,
    /// Chaining mode name: `ecb`, `cbc`, `cfb` or `ofb`.
    pub mode: &'static str,
    /// Key (hex-encoded).
    pub key_hex: &'static str,
    /// Initialization vector (hex-encoded), all zero for ECB.
    pub iv_hex: &'static str,
    /// Plaintext (hex-encoded).
    pub plaintext_hex: &'static str,
    /// Ciphertext (hex-encoded).
    pub ciphertext_hex: &'static str,
}

/// Lowercase hex encoding, for comparing bytes in assertion messages.
pub fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Decodes hex text, panicking on malformed input.
pub fn from_hex(hex: &str) -> Vec<u8> {
    assert!(hex.len() % 2 == 0, "odd-length hex: {hex}");
    (0..hex.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&hex[i..i + 2], 16).expect("Invalid hex"))
        .collect()
}

/// Base16 vectors (RFC 4648 section 10, lowercase output).
pub fn hex_vectors() -> Vec<TestVector> {
    [
        ("", ""),
        ("f", "66"),
        ("fo", "666f"),
        ("foo", "666f6f"),
        ("foob", "666f6f62"),
        ("fooba", "666f6f6261"),
        ("foobar", "666f6f626172"),
    ]
    .into_iter()
    .map(|(input, expected)| {
        TestVector::new(
            &format!("hex_{input}"),
            "RFC 4648 base16",
            input.as_bytes(),
            expected.as_bytes(),
        )
    })
    .chain([TestVector::new(
        "hex_binary",
        "non-ASCII bytes",
        &[0x00, 0x7f, 0x80, 0xff],
        b"007f80ff",
    )])
    .collect()
}

/// Base64 vectors (RFC 4648 section 10, standard alphabet, padded).
pub fn base64_vectors() -> Vec<TestVector> {
    [
        ("", ""),
        ("f", "Zg=="),
        ("fo", "Zm8="),
        ("foo", "Zm9v"),
        ("foob", "Zm9vYg=="),
        ("fooba", "Zm9vYmE="),
        ("foobar", "Zm9vYmFy"),
    ]
    .into_iter()
    .map(|(input, expected)| {
        TestVector::new(
            &format!("base64_{input}"),
            "RFC 4648 base64",
            input.as_bytes(),
            expected.as_bytes(),
        )
    })
    .collect()
}

/// URL-safe base64 vectors, unpadded.
pub fn base64_url_vectors() -> Vec<TestVector> {
    vec![
        TestVector::new("base64url_ff", "62 and 63 map to - and _", &[0xfb, 0xff], b"-_8"),
        TestVector::new("base64url_f", "no padding", b"f", b"Zg"),
    ]
}

/// MD5 vectors (RFC 1321 appendix A.5).
pub fn md5_vectors() -> Vec<TestVector> {
    vec![
        TestVector::digest("md5_empty", "", "d41d8cd98f00b204e9800998ecf8427e"),
        TestVector::digest("md5_a", "a", "0cc175b9c0f1b6a831c399e269772661"),
        TestVector::digest("md5_abc", "abc", "900150983cd24fb0d6963f7d28e17f72"),
        TestVector::digest(
            "md5_message_digest",
            "message digest",
            "f96b697d7cb7938d525a2f31aaf161d0",
        ),
    ]
}

/// SHA-1 vectors (FIPS 180 examples).
pub fn sha1_vectors() -> Vec<TestVector> {
    vec![
        TestVector::digest("sha1_empty", "", "da39a3ee5e6b4b0d3255bfef95601890afd80709"),
        TestVector::digest("sha1_abc", "abc", "a9993e364706816aba3e25717850c26c9cd0d89d"),
        TestVector::digest(
            "sha1_448",
            "abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq",
            "84983e441c3bd26ebaae4aa1f95129e5e54670f1",
        ),
    ]
}

/// SHA-256 vectors (FIPS 180 examples).
pub fn sha256_vectors() -> Vec<TestVector> {
    vec![
        TestVector::digest(
            "sha256_empty",
            "",
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855",
        ),
        TestVector::digest(
            "sha256_abc",
            "abc",
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad",
        ),
        TestVector::digest(
            "sha256_448",
            "abcdbcdecdefdefgefghfghighijhijkijkljklmklmnlmnomnopnopq",
            "248d6a61d20638b8e5c026930c3e6039a33ce45964ff2167f6ecedd419db06c1",
        ),
    ]
}

const SP800_KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";
const SP800_IV: &str = "000102030405060708090a0b0c0d0e0f";
const SP800_PLAINTEXT: &str = "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51";

/// AES vectors: FIPS 197 appendix C (ECB, all key sizes) and the first two
/// blocks of the SP 800-38A AES-128 examples.
pub fn aes_vectors() -> Vec<AesVector> {
    const ZERO_IV: &str = "00000000000000000000000000000000";
    const FIPS_PLAINTEXT: &str = "00112233445566778899aabbccddeeff";
    vec![
        AesVector {
            id: "fips197_c1",
            mode: "ecb",
            key_hex: "000102030405060708090a0b0c0d0e0f",
            iv_hex: ZERO_IV,
            plaintext_hex: FIPS_PLAINTEXT,
            ciphertext_hex: "69c4e0d86a7b0430d8cdb78070b4c55a",
        },
        AesVector {
            id: "fips197_c2",
            mode: "ecb",
            key_hex: "000102030405060708090a0b0c0d0e0f1011121314151617",
            iv_hex: ZERO_IV,
            plaintext_hex: FIPS_PLAINTEXT,
            ciphertext_hex: "dda97ca4864cdfe06eaf70a0ec0d7191",
        },
        AesVector {
            id: "fips197_c3",
            mode: "ecb",
            key_hex: "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
            iv_hex: ZERO_IV,
            plaintext_hex: FIPS_PLAINTEXT,
            ciphertext_hex: "8ea2b7ca516745bfeafc49904b496089",
        },
        AesVector {
            id: "sp800_38a_ecb",
            mode: "ecb",
            key_hex: SP800_KEY,
            iv_hex: ZERO_IV,
            plaintext_hex: SP800_PLAINTEXT,
            ciphertext_hex: "3ad77bb40d7a3660a89ecaf32466ef97f5d3d58503b9699de785895a96fdbaaf",
        },
        AesVector {
            id: "sp800_38a_cbc",
            mode: "cbc",
            key_hex: SP800_KEY,
            iv_hex: SP800_IV,
            plaintext_hex: SP800_PLAINTEXT,
            ciphertext_hex: "7649abac8119b246cee98e9b12e9197d5086cb9b507219ee95db113a917678b2",
        },
        AesVector {
            id: "sp800_38a_cfb128",
            mode: "cfb",
            key_hex: SP800_KEY,
            iv_hex: SP800_IV,
            plaintext_hex: SP800_PLAINTEXT,
            ciphertext_hex: "3b3fd92eb72dad20333449f8e83cfb4ac8a64537a0b3a93fcde3cdad9f1ce58b",
        },
        AesVector {
            id: "sp800_38a_ofb",
            mode: "ofb",
            key_hex: SP800_KEY,
            iv_hex: SP800_IV,
            plaintext_hex: SP800_PLAINTEXT,
            ciphertext_hex: "3b3fd92eb72dad20333449f8e83cfb4a7789508d16918f03f53c52dac54ed825",
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_helpers_round_trip() {
        let bytes = [0u8, 1, 0xab, 0xff];
        assert_eq!(from_hex(&to_hex(&bytes)), bytes);
    }

    #[test]
    fn test_hex_vectors_match_helper() {
        for vector in hex_vectors() {
            assert_eq!(
                to_hex(&vector.input()).into_bytes(),
                vector.expected(),
                "Vector {} failed: {}",
                vector.id,
                vector.description
            );
        }
    }

    #[test]
    fn test_digest_vectors_are_well_formed() {
        for vector in md5_vectors() {
            assert_eq!(vector.expected().len(), 16, "{}", vector.id);
        }
        for vector in sha1_vectors() {
            assert_eq!(vector.expected().len(), 20, "{}", vector.id);
        }
        for vector in sha256_vectors() {
            assert_eq!(vector.expected().len(), 32, "{}", vector.id);
        }
    }

    #[test]
    fn test_aes_vectors_are_block_multiples() {
        for vector in aes_vectors() {
            assert_eq!(from_hex(vector.plaintext_hex).len() % 16, 0, "{}", vector.id);
            assert_eq!(
                from_hex(vector.plaintext_hex).len(),
                from_hex(vector.ciphertext_hex).len(),
                "{}",
                vector.id
            );
            assert_eq!(from_hex(vector.iv_hex).len(), 16, "{}", vector.id);
        }
    }
}
