//! Payload decryption tests for wxbroker-crypto

use aes::{Aes128, Aes256};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use cbc::cipher::block_padding::{NoPadding, Pkcs7};
use cbc::cipher::{BlockEncryptMut, KeyIvInit};

use wxbroker_crypto::{decrypt, decrypt_data, CryptoError};

const KEY16: [u8; 16] = *b"0123456789abcdef";
const KEY32: [u8; 32] = *b"0123456789abcdef0123456789abcdef";
const IV: [u8; 16] = *b"fedcba9876543210";

fn encrypt128(plaintext: &[u8]) -> String {
    let ct = cbc::Encryptor::<Aes128>::new_from_slices(&KEY16, &IV)
        .unwrap()
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    STANDARD.encode(ct)
}

fn encrypt_raw(block_aligned: &[u8]) -> String {
    let ct = cbc::Encryptor::<Aes128>::new_from_slices(&KEY16, &IV)
        .unwrap()
        .encrypt_padded_vec_mut::<NoPadding>(block_aligned);
    STANDARD.encode(ct)
}

fn b64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

#[test]
fn decrypts_aes128() {
    let ct = encrypt128("hello, 世界".as_bytes());
    assert_eq!(decrypt(&ct, &b64(&KEY16), &b64(&IV)).unwrap(), "hello, 世界");
}

#[test]
fn decrypts_aes256() {
    let ct = cbc::Encryptor::<Aes256>::new_from_slices(&KEY32, &IV)
        .unwrap()
        .encrypt_padded_vec_mut::<Pkcs7>(b"{\"k\":1}");
    assert_eq!(
        decrypt(&STANDARD.encode(ct), &b64(&KEY32), &b64(&IV)).unwrap(),
        "{\"k\":1}"
    );
}

/// Pad byte of zero is rejected
#[test]
fn zero_pad_rejected() {
    let mut block = [b'a'; 16];
    block[15] = 0;
    let err = decrypt(&encrypt_raw(&block), &b64(&KEY16), &b64(&IV)).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidPadding { pad: 0, .. }));
}

/// Pad byte greater than the block size is rejected
#[test]
fn oversized_pad_rejected() {
    let mut block = [b'a'; 16];
    block[15] = 17;
    let err = decrypt(&encrypt_raw(&block), &b64(&KEY16), &b64(&IV)).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidPadding { pad: 17, .. }));
}

/// Pad bytes that disagree with the length byte are rejected
#[test]
fn inconsistent_pad_rejected() {
    let mut block = [b'a'; 16];
    block[13] = 1;
    block[14] = 3;
    block[15] = 3;
    let err = decrypt(&encrypt_raw(&block), &b64(&KEY16), &b64(&IV)).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidPadding { pad: 3, .. }));
}

#[test]
fn invalid_utf8_rejected() {
    let ct = encrypt128(&[0xff, 0xfe, 0xfd]);
    assert_eq!(
        decrypt(&ct, &b64(&KEY16), &b64(&IV)).unwrap_err(),
        CryptoError::InvalidUtf8
    );
}

#[test]
fn empty_ciphertext_rejected() {
    assert_eq!(
        decrypt("", &b64(&KEY16), &b64(&IV)).unwrap_err(),
        CryptoError::InvalidCiphertextLength(0)
    );
}

#[test]
fn wrong_key_size_rejected() {
    let ct = encrypt128(b"x");
    let err = decrypt(&ct, &b64(&[0u8; 20]), &b64(&IV)).unwrap_err();
    assert!(matches!(err, CryptoError::InvalidKeyLength { actual: 20, .. }));
}

#[test]
fn decrypt_data_strips_watermark() {
    let json = r#"{"phoneNumber":"13800000000","watermark":{"appid":"wx_tenant","timestamp":1477314187}}"#;
    let ct = encrypt128(json.as_bytes());

    let data = decrypt_data(&ct, &b64(&KEY16), &b64(&IV), "wx_tenant").unwrap();
    assert_eq!(data["phoneNumber"], "13800000000");
    assert!(!data.contains_key("watermark"));
}

/// Data encrypted for another tenant is an integrity failure
#[test]
fn decrypt_data_foreign_appid() {
    let json = r#"{"openId":"o1","watermark":{"appid":"wx_other","timestamp":1}}"#;
    let ct = encrypt128(json.as_bytes());

    let err = decrypt_data(&ct, &b64(&KEY16), &b64(&IV), "wx_tenant").unwrap_err();
    assert!(err.is_integrity());
    assert_eq!(
        err,
        CryptoError::AppIdMismatch {
            expected: "wx_tenant".into(),
            actual: "wx_other".into()
        }
    );
}

#[test]
fn decrypt_data_missing_watermark() {
    let ct = encrypt128(br#"{"openId":"o1"}"#);
    let err = decrypt_data(&ct, &b64(&KEY16), &b64(&IV), "wx_tenant").unwrap_err();
    assert_eq!(err, CryptoError::MissingWatermark);
    assert!(err.is_integrity());
}

#[test]
fn decrypt_data_requires_object() {
    let ct = encrypt128(b"[1,2,3]");
    let err = decrypt_data(&ct, &b64(&KEY16), &b64(&IV), "wx_tenant").unwrap_err();
    assert!(matches!(err, CryptoError::MalformedPayload(_)));
    assert!(!err.is_integrity());
}
