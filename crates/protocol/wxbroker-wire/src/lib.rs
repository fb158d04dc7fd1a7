//! Structured message codec for wxbroker.
//!
//! The merchant payment protocol and the platform's push messages carry a
//! flat record encoded as XML: a single root element whose children are the
//! fields. This crate converts between that encoding and
//! [`StructuredMessage`], a sorted map from tag name to text value.
//!
//! # Example
//!
//! ```
//! use wxbroker_wire::StructuredMessage;
//!
//! let request = StructuredMessage::new()
//!     .with("out_trade_no", "1217752501201407033233368018")
//!     .with("total_fee", 1);
//! let xml = request.to_xml().unwrap();
//! assert_eq!(
//!     xml,
//!     "<xml><out_trade_no>1217752501201407033233368018</out_trade_no><total_fee>1</total_fee></xml>"
//! );
//!
//! let decoded = StructuredMessage::from_xml(&xml).unwrap();
//! assert_eq!(decoded, request);
//! ```

mod error;
mod message;

pub use error::{WireError, WireResult};
pub use message::{StructuredMessage, ROOT_TAG};
