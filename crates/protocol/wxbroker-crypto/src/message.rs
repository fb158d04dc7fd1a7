//! Encrypted push messages exchanged with the open platform.
//!
//! Component callbacks (verify tickets, authorization changes) and passive
//! replies use a separate scheme from user-data payloads:
//!
//! ```text
//! key        = base64(EncodingAESKey + "=")           32 bytes
//! iv         = key[..16]
//! plaintext  = random(16) || be_u32(len(msg)) || msg || appid
//! encrypt    = base64(AES-256-CBC(key, iv, pad32(plaintext)))
//! signature  = lowerhex(SHA1(sort([token, timestamp, nonce, encrypt]).concat()))
//! ```
//!
//! The signature is checked before anything is decrypted.

use aes::Aes256;
use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig, STANDARD};
use base64::Engine as _;
use cbc::cipher::block_padding::NoPadding;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use sha1::{Digest, Sha1};
use zeroize::Zeroizing;

use crate::error::{CryptoError, CryptoResult};
use crate::payload::{cbc_decrypt, decode_b64, pad, strip_padding};
use crate::secret::Secret;
use crate::signature::constant_time_eq;

/// Length of a platform `EncodingAESKey`.
pub const ENCODING_AES_KEY_LEN: usize = 43;

/// Padding block size used by the push scheme.
pub const MESSAGE_BLOCK_SIZE: usize = 32;

const RANDOM_PREFIX_LEN: usize = 16;
const LENGTH_PREFIX_LEN: usize = 4;

/// Keys generated by the platform do not always zero the trailing bits.
const LENIENT_BASE64: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_allow_trailing_bits(true),
);

/// Encrypted reply envelope.
///
/// Rendered by the caller as
/// `<xml><Encrypt/><MsgSignature/><TimeStamp/><Nonce/></xml>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedReply {
    pub encrypt: String,
    pub msg_signature: String,
    pub timestamp: String,
    pub nonce: String,
}

impl EncryptedReply {
    /// Envelope fields under their wire tag names.
    pub fn fields(&self) -> [(&'static str, &str); 4] {
        [
            ("Encrypt", self.encrypt.as_str()),
            ("MsgSignature", self.msg_signature.as_str()),
            ("TimeStamp", self.timestamp.as_str()),
            ("Nonce", self.nonce.as_str()),
        ]
    }
}

/// Codec for encrypted platform pushes addressed to one appid.
pub struct MessageCrypt {
    token: Secret,
    key: Zeroizing<[u8; 32]>,
    appid: String,
}

impl MessageCrypt {
    /// Create a codec from the callback token, the 43-character
    /// `EncodingAESKey` and the receiving appid.
    pub fn new(
        token: impl Into<Secret>,
        encoding_aes_key: &str,
        appid: impl Into<String>,
    ) -> CryptoResult<Self> {
        if encoding_aes_key.len() != ENCODING_AES_KEY_LEN {
            return Err(CryptoError::InvalidKeyLength {
                expected: "43-character EncodingAESKey",
                actual: encoding_aes_key.len(),
            });
        }

        let decoded = Zeroizing::new(
            LENIENT_BASE64
                .decode(format!("{}=", encoding_aes_key))
                .map_err(|e| CryptoError::base64("encoding_aes_key", e))?,
        );
        let key: [u8; 32] =
            decoded
                .as_slice()
                .try_into()
                .map_err(|_| CryptoError::InvalidKeyLength {
                    expected: "32 decoded bytes",
                    actual: decoded.len(),
                })?;

        Ok(Self {
            token: token.into(),
            key: Zeroizing::new(key),
            appid: appid.into(),
        })
    }

    /// The appid this codec accepts messages for.
    pub fn appid(&self) -> &str {
        &self.appid
    }

    /// Compute the message signature for an encrypted body.
    pub fn signature(&self, timestamp: &str, nonce: &str, encrypt: &str) -> String {
        let mut parts = [self.token.expose(), timestamp, nonce, encrypt];
        parts.sort_unstable();

        let mut hasher = Sha1::new();
        for part in parts {
            hasher.update(part.as_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Verify and decrypt an `Encrypt` value.
    ///
    /// Returns the inner message (usually an XML document).
    pub fn decrypt(
        &self,
        encrypt: &str,
        msg_signature: &str,
        timestamp: &str,
        nonce: &str,
    ) -> CryptoResult<String> {
        let expected = self.signature(timestamp, nonce, encrypt);
        if !constant_time_eq(expected.as_bytes(), msg_signature.as_bytes()) {
            return Err(CryptoError::SignatureMismatch);
        }

        let ciphertext = decode_b64("encrypt", encrypt)?;
        let plaintext = Zeroizing::new(cbc_decrypt(
            self.key.as_slice(),
            &self.key[..16],
            &ciphertext,
        )?);
        let body = strip_padding(&plaintext, MESSAGE_BLOCK_SIZE)?;

        let (message, sender) = split_plaintext(body)?;
        if sender != self.appid {
            return Err(CryptoError::AppIdMismatch {
                expected: self.appid.clone(),
                actual: sender.to_string(),
            });
        }

        Ok(message.to_string())
    }

    /// Encrypt a reply and sign the envelope.
    pub fn encrypt(&self, message: &str, timestamp: &str, nonce: &str) -> CryptoResult<EncryptedReply> {
        let mut prefix = [0u8; RANDOM_PREFIX_LEN];
        rand::thread_rng().fill_bytes(&mut prefix);

        let encrypt = self.encrypt_with_prefix(message, prefix)?;
        let msg_signature = self.signature(timestamp, nonce, &encrypt);

        Ok(EncryptedReply {
            encrypt,
            msg_signature,
            timestamp: timestamp.to_string(),
            nonce: nonce.to_string(),
        })
    }

    fn encrypt_with_prefix(
        &self,
        message: &str,
        prefix: [u8; RANDOM_PREFIX_LEN],
    ) -> CryptoResult<String> {
        let length = u32::try_from(message.len())
            .map_err(|_| CryptoError::malformed("message longer than 4 GiB"))?;

        let mut plaintext = Zeroizing::new(Vec::with_capacity(
            RANDOM_PREFIX_LEN + LENGTH_PREFIX_LEN + message.len() + self.appid.len() + MESSAGE_BLOCK_SIZE,
        ));
        plaintext.extend_from_slice(&prefix);
        plaintext.extend_from_slice(&length.to_be_bytes());
        plaintext.extend_from_slice(message.as_bytes());
        plaintext.extend_from_slice(self.appid.as_bytes());
        pad(&mut plaintext, MESSAGE_BLOCK_SIZE);

        let ciphertext = cbc::Encryptor::<Aes256>::new_from_slices(self.key.as_slice(), &self.key[..16])
            .map_err(|_| CryptoError::InvalidKeyLength {
                expected: "32",
                actual: self.key.len(),
            })?
            .encrypt_padded_vec_mut::<NoPadding>(&plaintext);

        Ok(STANDARD.encode(ciphertext))
    }
}

impl std::fmt::Debug for MessageCrypt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageCrypt")
            .field("appid", &self.appid)
            .field("token", &self.token)
            .field("key", &"[REDACTED]")
            .finish()
    }
}

/// Split an unpadded plaintext into (message, sender appid).
fn split_plaintext(body: &[u8]) -> CryptoResult<(&str, &str)> {
    let header = RANDOM_PREFIX_LEN + LENGTH_PREFIX_LEN;
    if body.len() < header {
        return Err(CryptoError::malformed("plaintext shorter than header"));
    }

    let mut len_bytes = [0u8; LENGTH_PREFIX_LEN];
    len_bytes.copy_from_slice(&body[RANDOM_PREFIX_LEN..header]);
    let msg_len = u32::from_be_bytes(len_bytes) as usize;

    let rest = &body[header..];
    if msg_len > rest.len() {
        return Err(CryptoError::malformed(format!(
            "declared message length {} exceeds {} available bytes",
            msg_len,
            rest.len()
        )));
    }

    let (message, sender) = rest.split_at(msg_len);
    let message = std::str::from_utf8(message).map_err(|_| CryptoError::InvalidUtf8)?;
    let sender = std::str::from_utf8(sender).map_err(|_| CryptoError::InvalidUtf8)?;
    Ok((message, sender))
}
