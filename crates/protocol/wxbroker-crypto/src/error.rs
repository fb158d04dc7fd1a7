//! Error types for wxbroker-crypto

use thiserror::Error;

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur in cryptographic operations.
///
/// Variants fall into two families: malformed input (bad base64, wrong key
/// size, broken padding) and integrity failures (signature or tenant
/// mismatch). Use [`CryptoError::is_integrity`] to tell them apart.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Invalid base64 encoding
    #[error("Invalid base64 in {field}: {reason}")]
    InvalidBase64 { field: &'static str, reason: String },

    /// Invalid key length
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: &'static str, actual: usize },

    /// Invalid initialization vector length
    #[error("Invalid IV length: expected 16, got {0}")]
    InvalidIvLength(usize),

    /// Ciphertext is empty or not a whole number of blocks
    #[error("Invalid ciphertext length: {0} bytes")]
    InvalidCiphertextLength(usize),

    /// Pad length byte out of range, or pad bytes inconsistent
    #[error("Invalid padding: pad length {pad} outside 1..={block_size}")]
    InvalidPadding { pad: u8, block_size: usize },

    /// Decrypted bytes are not valid UTF-8
    #[error("Decrypted payload is not valid UTF-8")]
    InvalidUtf8,

    /// Unknown signature algorithm name
    #[error("Unsupported sign type: {0}")]
    UnsupportedSignType(String),

    /// Plaintext does not have the expected structure
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Signature verification failed
    #[error("Signature verification failed")]
    SignatureMismatch,

    /// Payload was produced for a different tenant
    #[error("AppId mismatch: expected {expected}, got {actual}")]
    AppIdMismatch { expected: String, actual: String },

    /// Decrypted user data carries no watermark
    #[error("Payload watermark is missing")]
    MissingWatermark,
}

impl CryptoError {
    /// Create a base64 error for the named input.
    pub fn base64(field: &'static str, err: base64::DecodeError) -> Self {
        Self::InvalidBase64 {
            field,
            reason: err.to_string(),
        }
    }

    /// Create a malformed payload error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedPayload(reason.into())
    }

    /// True for signature and tenant mismatches; false for malformed input.
    pub fn is_integrity(&self) -> bool {
        matches!(
            self,
            Self::SignatureMismatch | Self::AppIdMismatch { .. } | Self::MissingWatermark
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integrity_classification() {
        assert!(CryptoError::SignatureMismatch.is_integrity());
        assert!(CryptoError::MissingWatermark.is_integrity());
        assert!(CryptoError::AppIdMismatch {
            expected: "wx1".into(),
            actual: "wx2".into()
        }
        .is_integrity());

        assert!(!CryptoError::InvalidUtf8.is_integrity());
        assert!(!CryptoError::InvalidPadding {
            pad: 0,
            block_size: 16
        }
        .is_integrity());
    }

    #[test]
    fn test_error_display() {
        let err = CryptoError::InvalidKeyLength {
            expected: "16 or 32",
            actual: 7,
        };
        assert!(err.to_string().contains("16 or 32"));
        assert!(err.to_string().contains('7'));
    }
}
