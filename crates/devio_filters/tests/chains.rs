//! Round trips and multi-filter chains.

use devio_core::{Device, ErrorCode, Whence};
use devio_filters::{
    aes_decrypt, aes_encrypt, base64_decode, base64_encode, concat, deflate, hash, hex_decode,
    hex_encode, inflate, limit, pad_decode, pad_encode, repeat, tee, AesConfig, Alphabet,
    Base64Config, CipherMode, HashAlgorithm, PaddingScheme, ZlibConfig,
};
use devio_testkit::prelude::*;
use proptest::prelude::*;

fn hex_round_trip(payload: &[u8], chunk: usize) -> Vec<u8> {
    let encoded = memory_sink();
    let mut encoder = hex_encode(&encoded, "w").unwrap();
    assert_eq!(write_chunked(&mut encoder, payload, chunk), payload.len());
    encoder.close().unwrap();
    encoded.lock().rewind().unwrap();

    let mut decoder = hex_decode(&encoded, "r").unwrap();
    drain(&mut decoder)
}

fn base64_round_trip(payload: &[u8], config: &Base64Config) -> Vec<u8> {
    let source = memory_source(payload);
    let encoded = base64_encode(&source, config, "r").unwrap().into_handle();
    let mut decoder = base64_decode(&encoded, config, "r").unwrap();
    drain(&mut decoder)
}

fn padding_round_trip(payload: &[u8], scheme: PaddingScheme, block: usize) -> (usize, Vec<u8>) {
    let source = memory_source(payload);
    let mut encoder = pad_encode(&source, scheme, block, "r").unwrap();
    let padded = drain(&mut encoder);

    let source = memory_source(&padded);
    let mut decoder = pad_decode(&source, scheme, block, "r").unwrap();
    (padded.len(), drain(&mut decoder))
}

fn any_block_mode() -> impl Strategy<Value = CipherMode> {
    prop_oneof![
        Just(CipherMode::Ecb),
        Just(CipherMode::Cbc),
        Just(CipherMode::Pcbc),
        Just(CipherMode::Cfb),
        Just(CipherMode::Ofb),
    ]
}

proptest! {
    #![proptest_config(Coverage::from_env().config())]

    #[test]
    fn hex_round_trips(payload in payload_strategy(), chunk in chunk_size_strategy()) {
        prop_assert_eq!(hex_round_trip(&payload, chunk), payload);
    }

    #[test]
    fn base64_round_trips(payload in payload_strategy()) {
        prop_assert_eq!(base64_round_trip(&payload, &Base64Config::default()), payload.clone());
        prop_assert_eq!(base64_round_trip(&payload, &Base64Config::url_safe()), payload.clone());
        let padded_url = Base64Config::url_safe().padding(true);
        prop_assert_eq!(base64_round_trip(&payload, &padded_url), payload);
    }

    #[test]
    fn base64_custom_alphabet_round_trips(
        payload in short_payload_strategy(),
        symbols in base64_alphabet_strategy(),
    ) {
        let config = Base64Config::new(Alphabet::custom(&symbols).unwrap());
        prop_assert_eq!(base64_round_trip(&payload, &config), payload);
    }

    #[test]
    fn padding_round_trips(payload in short_payload_strategy(), block in block_size_strategy()) {
        for scheme in [PaddingScheme::Pkcs7, PaddingScheme::Bit] {
            let (padded_len, decoded) = padding_round_trip(&payload, scheme, block);
            prop_assert_eq!(padded_len % block, 0);
            prop_assert!(padded_len > payload.len());
            prop_assert_eq!(decoded, payload.clone());
        }
    }

    #[test]
    fn aes_with_pkcs7_round_trips(
        payload in payload_strategy(),
        key in aes_key_strategy(),
        iv in iv_strategy(),
        mode in any_block_mode(),
    ) {
        let config = AesConfig::new(&key, mode).unwrap().with_iv(&iv).unwrap();

        let source = memory_source(&payload);
        let padded = pad_encode(&source, PaddingScheme::Pkcs7, 16, "r").unwrap().into_handle();
        let mut encryptor = aes_encrypt(&padded, &config, "r").unwrap();
        let ciphertext = drain(&mut encryptor);
        prop_assert_eq!(ciphertext.len(), (payload.len() / 16 + 1) * 16);

        let source = memory_source(&ciphertext);
        let decrypted = aes_decrypt(&source, &config, "r").unwrap().into_handle();
        let mut unpadder = pad_decode(&decrypted, PaddingScheme::Pkcs7, 16, "r").unwrap();
        prop_assert_eq!(drain(&mut unpadder), payload);
    }

    #[test]
    fn zlib_round_trips(payload in payload_strategy(), level in 0u32..=9) {
        let packed = memory_sink();
        let mut compressor = deflate(&packed, &ZlibConfig::new().level(level), "w").unwrap();
        prop_assert_eq!(write_chunked(&mut compressor, &payload, 300), payload.len());
        compressor.close().unwrap();
        packed.lock().rewind().unwrap();

        let mut decompressor = inflate(&packed, "r").unwrap();
        prop_assert_eq!(drain(&mut decompressor), payload);
    }
}

#[test]
fn limiter_window_over_hundred_bytes() {
    let payload: Vec<u8> = (0..100).collect();
    let source = memory_source(&payload);
    let mut window = limit(&source, 10, 10, "r").unwrap();
    assert_eq!(drain(&mut window), &payload[10..20]);

    let err = window.seek(11, Whence::Start).unwrap_err();
    assert_eq!(err.code(), ErrorCode::InvalidArgument);
}

#[test]
fn tee_xy_into_two_fixed_buffers() {
    let lhs = sized_sink(2);
    let rhs = sized_sink(2);
    let mut split = tee(&lhs, &rhs, "w").unwrap();
    assert_eq!(split.write(b"XY"), 2);
    split.close().unwrap();
    assert_eq!(contents(&lhs), b"XY");
    assert_eq!(contents(&rhs), b"XY");
}

#[test]
fn tee_feeds_an_encoder_and_a_digest() {
    let text_sink = memory_sink();
    let digest_sink = memory_sink();
    let encoder = hex_encode(&text_sink, "w").unwrap().into_handle();
    let hasher = hash(&digest_sink, HashAlgorithm::Md5, "w").unwrap().into_handle();

    let mut split = tee(&encoder, &hasher, "w").unwrap();
    assert_eq!(split.write(b"abc"), 3);
    split.close().unwrap();
    encoder.lock().close().unwrap();
    hasher.lock().close().unwrap();

    assert_eq!(contents(&text_sink), b"616263");
    assert_eq!(to_hex(&contents(&digest_sink)), "900150983cd24fb0d6963f7d28e17f72");
}

#[test]
fn encoded_concatenation_decodes_as_one_stream() {
    let first = memory_source(b"6869");
    let second = memory_source(b"2021");
    let joined = concat(&first, &second, "r").unwrap().into_handle();
    let mut decoder = hex_decode(&joined, "r").unwrap();
    assert_eq!(drain(&mut decoder), b"hi !");
}

#[test]
fn repeated_source_through_a_limiter() {
    let source = memory_source(b"abc");
    let looped = repeat(&source, None, "r").unwrap().into_handle();
    let mut window = limit(&looped, 2, 7, "r").unwrap();
    assert_eq!(drain(&mut window), b"cabcabc");
}

#[test]
fn endless_source_deflates_and_inflates_incrementally() {
    let source = memory_source(b"abc");
    let looped = repeat(&source, None, "r").unwrap().into_handle();
    let packed = deflate(&looped, &ZlibConfig::default(), "r").unwrap().into_handle();
    let mut unpacked = inflate(&packed, "r").unwrap();

    let mut head = [0u8; 10_000];
    assert_eq!(unpacked.read(&mut head), head.len());
    assert!(head.chunks(3).all(|piece| piece == &b"abc"[..piece.len()]));
    assert_eq!(unpacked.error(), None);
}

#[test]
fn compressed_blocks_reach_the_sink_before_close() {
    let sink = memory_sink();
    let mut compressor = deflate(&sink, &ZlibConfig::new().level(1), "w").unwrap();
    let payload: Vec<u8> = (0..=255u8).cycle().take(20_000).collect();
    assert_eq!(write_chunked(&mut compressor, &payload, 1000), payload.len());
    let early = contents(&sink);
    assert!(early.len() > 2);

    compressor.close().unwrap();
    let packed = contents(&sink);
    assert!(packed.starts_with(&early));

    let source = memory_source(&packed);
    let mut decompressor = inflate(&source, "r").unwrap();
    assert_eq!(drain(&mut decompressor), payload);
}

#[test]
fn file_backed_chain() {
    let file = TempFile::with_contents(b"persisted payload");
    let inner = file.open("r").into_handle();
    let mut encoder = base64_encode(&inner, &Base64Config::default(), "r").unwrap();
    assert_eq!(drain(&mut encoder), b"cGVyc2lzdGVkIHBheWxvYWQ=");
}

#[test]
fn closing_a_filter_twice_is_harmless() {
    let sink = memory_sink();
    let mut encoder = hex_encode(&sink, "w").unwrap();
    encoder.write(b"z");
    encoder.close().unwrap();
    encoder.close().unwrap();
    assert_eq!(contents(&sink), b"7a");
}

#[test]
fn direction_discipline_holds_for_filters() {
    let source = memory_source(b"data");
    let mut reader = hex_encode(&source, "r").unwrap();
    assert_eq!(reader.write(b"x"), 0);
    assert!(reader.error().is_some());

    let sink = memory_sink();
    let mut writer: Device = hex_decode(&sink, "w").unwrap();
    let mut buf = [0u8; 4];
    assert_eq!(writer.read(&mut buf), 0);
    assert!(writer.error().is_some());
}
