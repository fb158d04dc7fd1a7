//! Error types for the wire module.
//!
//! Errors that can occur while decoding or encoding a flat XML record.

use thiserror::Error;

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;

/// Errors that can occur when encoding or decoding a structured message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WireError {
    /// Input is not well-formed XML, or has no root element
    #[error("malformed XML: {0}")]
    Malformed(String),

    /// A child element contains another element
    #[error("nested element <{child}> inside <{parent}>")]
    Nested {
        /// Tag of the enclosing child
        parent: String,
        /// Tag of the offending element
        child: String,
    },

    /// Key cannot be used as an XML tag name
    #[error("invalid tag name: {0:?}")]
    InvalidTag(String),

    /// A required field is absent
    #[error("missing field: {0}")]
    MissingField(String),
}

impl From<quick_xml::Error> for WireError {
    fn from(err: quick_xml::Error) -> Self {
        WireError::Malformed(err.to_string())
    }
}
