//! Cryptographic primitives for wxbroker.
//!
//! This crate provides the pure functions the broker needs to talk to the
//! open platform securely:
//!
//! - **Signatures**: canonical `name=value` signing (MD5 / HMAC-SHA256) for
//!   merchant payment requests and notifications
//! - **Payloads**: AES-CBC decryption of user data with strict padding and
//!   watermark validation
//! - **Messages**: the SHA-1 signed, AES-256 encrypted push format used for
//!   component callbacks and passive replies
//! - **Nonces**: random `nonce_str` generation
//!
//! # Example
//!
//! ```
//! use wxbroker_crypto::{random_nonce, sign, verify, SignType};
//!
//! let nonce = random_nonce(32);
//! let fields = [
//!     ("appid", "wx2421b1c4370ec43b"),
//!     ("mch_id", "10000100"),
//!     ("nonce_str", nonce.as_str()),
//! ];
//!
//! let signature = sign(fields, "merchant-key", SignType::Md5).unwrap();
//! assert!(verify(fields, &signature, "merchant-key", SignType::Md5));
//! ```

mod error;
mod message;
mod nonce;
mod payload;
mod secret;
mod signature;

pub use error::{CryptoError, CryptoResult};
pub use message::{EncryptedReply, MessageCrypt, ENCODING_AES_KEY_LEN, MESSAGE_BLOCK_SIZE};
pub use nonce::{random_nonce, DEFAULT_NONCE_LEN, NONCE_ALPHABET};
pub use payload::{decrypt, decrypt_data, BLOCK_SIZE, WATERMARK_FIELD};
pub use secret::Secret;
pub use signature::{
    canonical_string, require_valid, sign, verify, SignType, SIGN_FIELD, SIGN_TYPE_FIELD,
};
