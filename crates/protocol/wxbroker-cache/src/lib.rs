//! Credential cache for wxbroker.
//!
//! This crate keeps the time-bounded credentials every platform call needs:
//!
//! - **Credentials**: access tokens and verify tickets, keyed by
//!   `{namespace}:{tenant}:{kind}`
//! - **Backends**: the [`CacheBackend`] trait, an in-process
//!   [`MemoryCache`] and a JSON-file [`FileCache`]
//! - **Broker**: [`CredentialBroker`], which fetches on a miss with at most
//!   one fetch in flight per key
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use wxbroker_cache::{
//!     CacheError, CredentialBroker, CredentialKind, FetchedCredential, MemoryCache,
//! };
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let broker: CredentialBroker<CacheError> =
//!     CredentialBroker::new(Arc::new(MemoryCache::new()));
//! let scope = broker.scope("wx2421b1c4370ec43b", CredentialKind::SecretAppToken);
//!
//! let token = broker
//!     .get_or_fetch(&scope, || async { Ok(FetchedCredential::new("ACCESS_TOKEN", 7200)) })
//!     .await
//!     .unwrap();
//! assert_eq!(token.value, "ACCESS_TOKEN");
//! # });
//! # }
//! ```

pub mod backend;
pub mod broker;
pub mod clock;
pub mod credential;
pub mod error;

pub use backend::{CacheBackend, FileCache, MemoryCache};
pub use broker::CredentialBroker;
pub use clock::{Clock, SystemClock, Timestamp};
pub use credential::{Credential, CredentialKind, FetchedCredential, ScopeKey, DEFAULT_NAMESPACE};
pub use error::{CacheError, CacheResult};
