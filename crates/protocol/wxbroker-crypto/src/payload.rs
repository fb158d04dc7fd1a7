//! Symmetric payload decryption (AES-CBC).
//!
//! The platform hands encrypted user data (phone numbers, share tickets,
//! profile details) to the client, which forwards it together with the
//! session key and IV. All three arrive base64-encoded.
//!
//! ```text
//! plaintext = unpad(AES-CBC-Decrypt(key, iv, base64(ciphertext)))
//! ```

use aes::{Aes128, Aes256};
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine as _;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockDecryptMut, KeyIvInit};
use serde_json::{Map, Value};

use crate::error::{CryptoError, CryptoResult};

/// AES block size in bytes.
pub const BLOCK_SIZE: usize = 16;

/// Field in decrypted user data that names the producing tenant.
pub const WATERMARK_FIELD: &str = "watermark";

/// Decrypt a base64 ciphertext with a base64 key and IV.
///
/// The key selects the cipher: 16 bytes for AES-128, 32 bytes for AES-256.
/// Padding must be well-formed PKCS#7 for a 16-byte block.
pub fn decrypt(ciphertext_b64: &str, key_b64: &str, iv_b64: &str) -> CryptoResult<String> {
    let ciphertext = decode_b64("ciphertext", ciphertext_b64)?;
    let key = decode_b64("key", key_b64)?;
    let iv = decode_b64("iv", iv_b64)?;

    let plaintext = cbc_decrypt(&key, &iv, &ciphertext)?;
    let unpadded = strip_padding(&plaintext, BLOCK_SIZE)?;
    String::from_utf8(unpadded.to_vec()).map_err(|_| CryptoError::InvalidUtf8)
}

/// Decrypt user data and check its tenant watermark.
///
/// The plaintext must be a JSON object carrying
/// `"watermark": {"appid": ..., "timestamp": ...}`. The watermark is removed
/// from the returned object. A missing watermark or a foreign appid is an
/// integrity failure: the payload was encrypted for another tenant.
pub fn decrypt_data(
    ciphertext_b64: &str,
    key_b64: &str,
    iv_b64: &str,
    expected_appid: &str,
) -> CryptoResult<Map<String, Value>> {
    let plaintext = decrypt(ciphertext_b64, key_b64, iv_b64)?;
    let value: Value = serde_json::from_str(&plaintext)
        .map_err(|e| CryptoError::malformed(format!("user data is not JSON: {}", e)))?;
    let Value::Object(mut object) = value else {
        return Err(CryptoError::malformed("user data is not a JSON object"));
    };

    let watermark = object
        .remove(WATERMARK_FIELD)
        .ok_or(CryptoError::MissingWatermark)?;
    let appid = watermark
        .get("appid")
        .and_then(Value::as_str)
        .ok_or(CryptoError::MissingWatermark)?;

    if appid != expected_appid {
        return Err(CryptoError::AppIdMismatch {
            expected: expected_appid.to_string(),
            actual: appid.to_string(),
        });
    }

    Ok(object)
}

/// Accepts input with or without `=` padding.
const PADDING_INDIFFERENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub(crate) fn decode_b64(field: &'static str, input: &str) -> CryptoResult<Vec<u8>> {
    PADDING_INDIFFERENT
        .decode(input.trim())
        .map_err(|e| CryptoError::base64(field, e))
}

/// Raw AES-CBC decryption without unpadding.
pub(crate) fn cbc_decrypt(key: &[u8], iv: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    if iv.len() != BLOCK_SIZE {
        return Err(CryptoError::InvalidIvLength(iv.len()));
    }
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(CryptoError::InvalidCiphertextLength(ciphertext.len()));
    }

    let result = match key.len() {
        16 => cbc::Decryptor::<Aes128>::new_from_slices(key, iv)
            .map_err(|_| invalid_key(key))?
            .decrypt_padded_vec_mut::<NoPadding>(ciphertext),
        32 => cbc::Decryptor::<Aes256>::new_from_slices(key, iv)
            .map_err(|_| invalid_key(key))?
            .decrypt_padded_vec_mut::<NoPadding>(ciphertext),
        _ => return Err(invalid_key(key)),
    };

    result.map_err(|_| CryptoError::InvalidCiphertextLength(ciphertext.len()))
}

/// Remove PKCS#7-style padding for the given block size.
///
/// The final byte is the pad length `p`; it must lie in `1..=block_size` and
/// the last `p` bytes must all equal `p`.
pub(crate) fn strip_padding(data: &[u8], block_size: usize) -> CryptoResult<&[u8]> {
    let pad = *data.last().ok_or(CryptoError::InvalidCiphertextLength(0))?;
    let pad_len = pad as usize;

    if pad_len == 0 || pad_len > block_size || pad_len > data.len() {
        return Err(CryptoError::InvalidPadding { pad, block_size });
    }

    let (body, padding) = data.split_at(data.len() - pad_len);
    if padding.iter().any(|&b| b != pad) {
        return Err(CryptoError::InvalidPadding { pad, block_size });
    }

    Ok(body)
}

/// Append PKCS#7-style padding for the given block size.
pub(crate) fn pad(data: &mut Vec<u8>, block_size: usize) {
    let pad_len = block_size - (data.len() % block_size);
    data.extend(std::iter::repeat(pad_len as u8).take(pad_len));
}

fn invalid_key(key: &[u8]) -> CryptoError {
    CryptoError::InvalidKeyLength {
        expected: "16 or 32",
        actual: key.len(),
    }
}
