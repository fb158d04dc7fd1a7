//! Platform API clients for wxbroker.
//!
//! This crate ties the primitives together into clients for the open
//! platform:
//!
//! ```text
//! ┌──────────────┐  token   ┌──────────────────┐
//! │ App /        │ ───────▶ │ CredentialBroker │  single-flight cache
//! │ Component    │ ◀─────── │ (wxbroker-cache) │
//! │ clients      │          └──────────────────┘
//! │              │  JSON    ┌──────────┐    ┌───────────────┐
//! │              │ ───────▶ │Transport │ ─▶ │ classify_json │
//! └──────────────┘          └──────────┘    └───────────────┘
//! ┌──────────────┐  signed  ┌──────────┐    ┌─────────────────┐
//! │ Merchant     │ ───────▶ │Transport │ ─▶ │ classify_record │ verifies sign
//! │ client       │   XML    └──────────┘    └─────────────────┘
//! └──────────────┘
//! ```
//!
//! # Components
//!
//! - **[`fault`]**: turns platform responses into values or [`ApiFault`]s
//! - **[`transport`]**: the [`Transport`] trait and its `reqwest` implementation
//! - **[`merchant`]**: unified order, order query, payment notifications
//! - **[`component`]**: third-party platform authorization and tokens
//! - **[`app`]**: secret-holding and authorized app clients
//! - **[`callback`]**: dispatch of encrypted callbacks and payment notifications
//! - **[`error`]**: error types with recovery suggestions
//!
//! # Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use wxbroker_api::{AppClient, AppConfig, HttpConfig, HttpTransport, SecretAppClient};
//! use wxbroker_cache::{CredentialBroker, MemoryCache};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let transport = Arc::new(HttpTransport::new(&HttpConfig::default())?);
//! let broker = Arc::new(CredentialBroker::new(Arc::new(MemoryCache::new())));
//!
//! let app = SecretAppClient::new(AppConfig::new("wx1234", "app-secret"), transport, broker)?;
//! let token = app.access_token().await?;
//! # let _ = token;
//! # Ok(())
//! # }
//! ```

pub mod app;
pub mod callback;
pub mod client;
pub mod component;
pub mod endpoints;
pub mod error;
pub mod fault;
pub mod merchant;
pub mod transport;
pub mod types;
pub mod user;

pub use app::{AppClient, AppConfig, AuthorizedAppClient, DomainSet, SecretAppClient};
pub use callback::{CallbackQuery, ComponentCallbacks, PaymentNotifications, COMPONENT_ACK};
pub use client::JsonClient;
pub use component::{ComponentClient, ComponentConfig, DEFAULT_FETCH_TIMEOUT};
pub use endpoints::Endpoint;
pub use error::{ApiError, ApiFault, ApiResult, FaultCode, FaultLayer};
pub use fault::{classify_json, classify_record, verify_record, Protocol};
pub use merchant::{MerchantClient, MerchantConfig, UnifiedOrder};
pub use transport::{HttpConfig, HttpTransport, Transport};
pub use types::{
    AuthType, AuthorizationInfo, AuthorizerToken, JsapiParams, OpenBinding, OrderRef,
    PrepayOrder, SessionInfo, TradeType, UniformMessage, UserAccessToken, WxaCode,
};
pub use user::UserClient;
