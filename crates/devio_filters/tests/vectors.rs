//! Known-answer tests through the public filter constructors.

use devio_filters::{
    aes_decrypt, aes_encrypt, base64_decode, base64_encode, hash, hex_decode, hex_encode, AesConfig,
    Base64Config, CipherMode, HashAlgorithm,
};
use devio_testkit::prelude::*;

fn cipher_mode(name: &str) -> CipherMode {
    match name {
        "ecb" => CipherMode::Ecb,
        "cbc" => CipherMode::Cbc,
        "cfb" => CipherMode::Cfb,
        "ofb" => CipherMode::Ofb,
        other => panic!("no vectors for mode {other}"),
    }
}

#[test]
fn hex_matches_rfc4648() {
    for vector in hex_vectors() {
        let source = memory_source(&vector.input());
        let mut encoder = hex_encode(&source, "r").unwrap();
        assert_eq!(drain(&mut encoder), vector.expected(), "{}", vector.id);

        let source = memory_source(&vector.expected());
        let mut decoder = hex_decode(&source, "r").unwrap();
        assert_eq!(drain(&mut decoder), vector.input(), "{}", vector.id);
    }
}

#[test]
fn base64_matches_rfc4648() {
    let config = Base64Config::default();
    for vector in base64_vectors() {
        let source = memory_source(&vector.input());
        let mut encoder = base64_encode(&source, &config, "r").unwrap();
        assert_eq!(drain(&mut encoder), vector.expected(), "{}", vector.id);

        let source = memory_source(&vector.expected());
        let mut decoder = base64_decode(&source, &config, "r").unwrap();
        assert_eq!(drain(&mut decoder), vector.input(), "{}", vector.id);
    }
}

#[test]
fn base64_url_safe_vectors() {
    let config = Base64Config::url_safe();
    for vector in base64_url_vectors() {
        let source = memory_source(&vector.input());
        let mut encoder = base64_encode(&source, &config, "r").unwrap();
        assert_eq!(drain(&mut encoder), vector.expected(), "{}", vector.id);
    }
}

#[test]
fn digests_match_published_values() {
    let suites = [
        (HashAlgorithm::Md5, md5_vectors()),
        (HashAlgorithm::Sha1, sha1_vectors()),
        (HashAlgorithm::Sha256, sha256_vectors()),
    ];
    for (algorithm, vectors) in suites {
        for vector in vectors {
            let source = memory_source(&vector.input());
            let mut digest = hash(&source, algorithm, "r").unwrap();
            assert_eq!(to_hex(&drain(&mut digest)), vector.expected_hex, "{}", vector.id);
        }
    }
}

#[test]
fn digest_written_at_close() {
    let sink = memory_sink();
    let mut hasher = hash(&sink, HashAlgorithm::Sha256, "w").unwrap();
    assert_eq!(write_chunked(&mut hasher, b"abc", 1), 3);
    hasher.close().unwrap();
    assert_eq!(
        to_hex(&contents(&sink)),
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
}

#[test]
fn aes_matches_fips197_and_sp800_38a() {
    for vector in aes_vectors() {
        let config = AesConfig::new(&from_hex(vector.key_hex), cipher_mode(vector.mode))
            .unwrap()
            .with_iv(&from_hex(vector.iv_hex))
            .unwrap();

        let source = memory_source(&from_hex(vector.plaintext_hex));
        let mut encryptor = aes_encrypt(&source, &config, "r").unwrap();
        assert_eq!(to_hex(&drain(&mut encryptor)), vector.ciphertext_hex, "{}", vector.id);

        let source = memory_source(&from_hex(vector.ciphertext_hex));
        let mut decryptor = aes_decrypt(&source, &config, "r").unwrap();
        assert_eq!(to_hex(&drain(&mut decryptor)), vector.plaintext_hex, "{}", vector.id);
    }
}

#[test]
fn aes_write_mode_matches_vectors() {
    for vector in aes_vectors() {
        let config = AesConfig::new(&from_hex(vector.key_hex), cipher_mode(vector.mode))
            .unwrap()
            .with_iv(&from_hex(vector.iv_hex))
            .unwrap();
        let sink = memory_sink();
        let mut encryptor = aes_encrypt(&sink, &config, "w").unwrap();
        let plaintext = from_hex(vector.plaintext_hex);
        assert_eq!(write_chunked(&mut encryptor, &plaintext, 5), plaintext.len());
        encryptor.close().unwrap();
        assert_eq!(to_hex(&contents(&sink)), vector.ciphertext_hex, "{}", vector.id);
    }
}
