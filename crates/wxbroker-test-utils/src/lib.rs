//! Shared test utilities for wxbroker crates.
//!
//! - [`MockTransport`]: scripted stand-in for the HTTP transport
//! - [`ManualClock`]: a clock tests move by hand
//! - [`fixtures`]: test credentials, signed records and encrypted pushes

pub mod clock;
pub mod fixtures;
pub mod mock_transport;

pub use clock::ManualClock;
pub use fixtures::*;
pub use mock_transport::{Method, MockTransport, RecordedRequest};
