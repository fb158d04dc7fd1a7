//! Error types for platform API calls.

use thiserror::Error;
use wxbroker_cache::CacheError;
use wxbroker_crypto::CryptoError;
use wxbroker_wire::WireError;

/// Result type for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

/// Where in the platform's response a fault was reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultLayer {
    /// Communication layer: JSON `errcode`, or record `return_code`.
    Transport,
    /// Business layer: record `result_code == FAIL`.
    Business,
    /// An `err_code` reported alongside a non-failing result.
    Detail,
}

impl std::fmt::Display for FaultLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Transport => "transport",
            Self::Business => "business",
            Self::Detail => "detail",
        })
    }
}

/// A fault code: numeric for JSON endpoints, textual for record endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FaultCode {
    Int(i64),
    Text(String),
}

impl std::fmt::Display for FaultCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(code) => write!(f, "{}", code),
            Self::Text(code) => f.write_str(code),
        }
    }
}

/// A failure reported by the platform in an otherwise well-formed response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFault {
    pub layer: FaultLayer,
    pub code: FaultCode,
    pub message: String,
}

impl ApiFault {
    pub fn new(layer: FaultLayer, code: FaultCode, message: impl Into<String>) -> Self {
        Self {
            layer,
            code,
            message: message.into(),
        }
    }

    /// True when the code equals the given numeric errcode.
    pub fn is_code(&self, code: i64) -> bool {
        self.code == FaultCode::Int(code)
    }
}

impl std::fmt::Display for ApiFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} fault {}: {}", self.layer, self.code, self.message)
    }
}

/// Errcodes the platform returns for an invalid or expired access token.
pub const TOKEN_INVALID_CODES: [i64; 3] = [40001, 40014, 42001];

/// Errcode for "system busy".
pub const SYSTEM_BUSY_CODE: i64 = -1;

/// Errors that can occur when calling the platform.
///
/// `Clone` so that one credential fetch failure can be shared by every
/// caller waiting on it.
#[derive(Debug, Error, Clone)]
pub enum ApiError {
    /// Network failure, timeout, or non-2xx HTTP status.
    #[error("transport error: {0}")]
    Transport(String),

    /// The platform reported a fault.
    #[error("{0}")]
    Api(ApiFault),

    /// Malformed cryptographic input (bad base64, key size, padding).
    #[error("crypto error: {0}")]
    Crypto(CryptoError),

    /// Signature or tenant check failed.
    #[error("integrity check failed: {0}")]
    Integrity(String),

    /// Missing or invalid client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// An authorization step could not be completed (missing code or ticket).
    #[error("authorization failed: {0}")]
    Authorization(String),

    /// The request was rejected before any network call.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The response could not be decoded.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// XML record error.
    #[error("wire error: {0}")]
    Wire(#[from] WireError),

    /// Credential cache error.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),
}

impl ApiError {
    /// Create a transport error.
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an authorization error.
    pub fn authorization(msg: impl Into<String>) -> Self {
        Self::Authorization(msg.into())
    }

    /// Create an invalid request error.
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    /// Create a malformed response error.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// The platform fault, if this error carries one.
    pub fn fault(&self) -> Option<&ApiFault> {
        match self {
            Self::Api(fault) => Some(fault),
            _ => None,
        }
    }

    /// The platform fault code, if any.
    pub fn fault_code(&self) -> Option<&FaultCode> {
        self.fault().map(|fault| &fault.code)
    }

    /// True when the platform rejected the access token.
    ///
    /// Callers typically invalidate the cached credential and retry once.
    pub fn is_token_invalid(&self) -> bool {
        self.fault()
            .is_some_and(|fault| TOKEN_INVALID_CODES.iter().any(|&c| fault.is_code(c)))
    }

    /// Returns true if this error is transient and the operation may succeed on retry.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(_) => true,
            Self::Api(fault) => fault.is_code(SYSTEM_BUSY_CODE),
            _ => false,
        }
    }

    /// Returns a user-friendly suggestion for recovering from this error.
    pub fn suggestion(&self) -> &str {
        match self {
            Self::Transport(_) => "Check network connectivity to the platform and retry",
            Self::Api(_) if self.is_token_invalid() => {
                "Invalidate the cached access token and fetch a new one"
            }
            Self::Api(_) => "Look up the fault code in the platform error code reference",
            Self::Crypto(_) => "Check the key, IV and ciphertext encoding",
            Self::Integrity(_) => "Check the shared secret; the message may be forged",
            Self::Config(_) => "Review the configuration file and environment variables",
            Self::Authorization(_) => "Restart the authorization flow",
            Self::InvalidRequest(_) => "Fix the request parameters",
            Self::MalformedResponse(_) => "The platform response was unexpected; please report it",
            Self::Wire(_) => "Check the XML body",
            Self::Cache(_) => "Check the credential cache backend",
        }
    }
}

impl From<CryptoError> for ApiError {
    fn from(err: CryptoError) -> Self {
        if err.is_integrity() {
            Self::Integrity(err.to_string())
        } else {
            Self::Crypto(err)
        }
    }
}

impl From<ApiFault> for ApiError {
    fn from(fault: ApiFault) -> Self {
        Self::Api(fault)
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e.to_string())
    }
}
