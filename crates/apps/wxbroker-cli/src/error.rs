//! CLI error types.

use thiserror::Error;
use wxbroker_api::ApiError;
use wxbroker_cache::CacheError;
use wxbroker_crypto::CryptoError;
use wxbroker_wire::WireError;

/// CLI result type.
pub type CliResult<T> = Result<T, CliError>;

/// CLI error enum wrapping all crate errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Platform or client error.
    #[error("{0}")]
    Api(#[from] ApiError),

    /// Crypto error outside an API call.
    #[error("{0}")]
    Crypto(#[from] CryptoError),

    /// Message encoding error.
    #[error("{0}")]
    Wire(#[from] WireError),

    /// Credential cache error.
    #[error("{0}")]
    Cache(#[from] CacheError),

    /// IO error.
    #[error("{0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// User-facing error with actionable message.
    #[error("{0}")]
    User(String),

    /// A signature did not verify.
    #[error("Signature does not match")]
    InvalidSignature,
}

impl CliError {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a user-facing error.
    pub fn user(msg: impl Into<String>) -> Self {
        Self::User(msg.into())
    }

    /// Get the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            // User errors: 1
            Self::User(_) => 1,
            // Config errors: 3
            Self::Config(_) | Self::Toml(_) => 3,
            Self::Api(ApiError::Config(_)) => 3,
            // Integrity failures: 4
            Self::InvalidSignature | Self::Api(ApiError::Integrity(_)) => 4,
            Self::Crypto(e) if e.is_integrity() => 4,
            // Network errors: 5
            Self::Api(ApiError::Transport(_)) => 5,
            // Platform and client errors: 6
            Self::Api(_) => 6,
            // Cache errors: 7
            Self::Cache(_) => 7,
            // Decryption errors: 8
            Self::Crypto(_) => 8,
            // IO errors: 9
            Self::Io(_) => 9,
            // JSON/format errors: 10
            Self::Json(_) | Self::Wire(_) => 10,
        }
    }

    /// A recovery hint, when there is one.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::Api(e) => Some(e.suggestion()),
            Self::Config(_) | Self::Toml(_) => {
                Some("Check the config file passed with --config or WXBROKER_CONFIG")
            }
            Self::InvalidSignature => Some("Check the key and sign type used to sign the message"),
            Self::Crypto(e) if e.is_integrity() => {
                Some("Check the callback token and EncodingAESKey; the message may be forged")
            }
            _ => None,
        }
    }
}
