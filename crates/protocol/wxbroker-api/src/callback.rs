//! Inbound callback dispatch.
//!
//! The web layer passes the raw body and query parameters in and sends the
//! returned acknowledgment back. A body that fails decryption or signature
//! checks yields an error and no acknowledgment. Once a body is accepted,
//! handler failures are logged and never change the acknowledgment. A
//! verified payment notification reporting a failed payment is accepted.

use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, error, info, warn};
use wxbroker_wire::StructuredMessage;

use crate::component::ComponentClient;
use crate::error::{ApiError, ApiResult};
use crate::fault::FAIL;
use crate::merchant::MerchantClient;

/// Acknowledgment body for component callbacks.
pub const COMPONENT_ACK: &str = "success";

/// Info type of the verify ticket push.
pub const VERIFY_TICKET_INFO_TYPE: &str = "component_verify_ticket";

/// Handler for a decrypted component callback.
pub type ComponentHandler = Box<dyn Fn(&StructuredMessage) -> ApiResult<()> + Send + Sync>;

/// Handler for a verified payment notification: `(out_trade_no, message)`.
pub type PaymentHandler = Box<dyn Fn(&str, &StructuredMessage) -> ApiResult<()> + Send + Sync>;

/// Signature parameters sent on the callback URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackQuery {
    pub timestamp: String,
    pub nonce: String,
    pub msg_signature: String,
}

impl CallbackQuery {
    /// Pick the signature parameters out of decoded query pairs.
    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> ApiResult<Self> {
        let mut timestamp = None;
        let mut nonce = None;
        let mut msg_signature = None;
        for (name, value) in pairs {
            match name {
                "timestamp" => timestamp = Some(value.to_string()),
                "nonce" => nonce = Some(value.to_string()),
                "msg_signature" => msg_signature = Some(value.to_string()),
                _ => {}
            }
        }

        let missing = |name: &str| ApiError::invalid_request(format!("callback query has no {}", name));
        Ok(Self {
            timestamp: timestamp.ok_or_else(|| missing("timestamp"))?,
            nonce: nonce.ok_or_else(|| missing("nonce"))?,
            msg_signature: msg_signature.ok_or_else(|| missing("msg_signature"))?,
        })
    }
}

// =============================================================================
// Component callbacks
// =============================================================================

/// Dispatches component callbacks by `InfoType`.
pub struct ComponentCallbacks {
    component: Arc<ComponentClient>,
    handlers: HashMap<String, Vec<ComponentHandler>>,
}

impl ComponentCallbacks {
    pub fn new(component: Arc<ComponentClient>) -> Self {
        Self {
            component,
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for one info type (`authorized`, `unauthorized`,
    /// `updateauthorized`, `component_verify_ticket`, ...).
    pub fn on<F>(&mut self, info_type: impl Into<String>, handler: F) -> &mut Self
    where
        F: Fn(&StructuredMessage) -> ApiResult<()> + Send + Sync + 'static,
    {
        self.handlers
            .entry(info_type.into())
            .or_default()
            .push(Box::new(handler));
        self
    }

    /// Decrypt a callback, store any verify ticket, run the handlers.
    pub fn handle(&self, body: &str, query: &CallbackQuery) -> ApiResult<&'static str> {
        let message = self.component.decrypt_callback(body, query)?;
        let info_type = message.require("InfoType")?;
        info!(info_type = %info_type, "Component callback received");

        if info_type == VERIFY_TICKET_INFO_TYPE {
            let ticket = message.require("ComponentVerifyTicket")?;
            self.component.store_verify_ticket(ticket)?;
            debug!("Stored component verify ticket");
        }

        if let Some(handlers) = self.handlers.get(info_type) {
            for handler in handlers {
                run_guarded(info_type, || handler(&message));
            }
        }
        Ok(COMPONENT_ACK)
    }
}

// =============================================================================
// Payment notifications
// =============================================================================

/// Dispatches verified payment notifications.
pub struct PaymentNotifications {
    merchant: Arc<MerchantClient>,
    handlers: Vec<PaymentHandler>,
}

impl PaymentNotifications {
    pub fn new(merchant: Arc<MerchantClient>) -> Self {
        Self {
            merchant,
            handlers: Vec::new(),
        }
    }

    pub fn on_payment<F>(&mut self, handler: F) -> &mut Self
    where
        F: Fn(&str, &StructuredMessage) -> ApiResult<()> + Send + Sync + 'static,
    {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Verify a notification body, run the handlers, return the ack XML.
    ///
    /// Failed payments are verified notifications too: handlers see them
    /// with `result_code=FAIL` and the platform still gets its ack.
    pub fn handle(&self, body: &str) -> ApiResult<String> {
        let message = self.merchant.verify_notification(body)?;
        let out_trade_no = message.get("out_trade_no").unwrap_or_default();
        let result_code = message.get("result_code").unwrap_or_default();
        info!(
            out_trade_no = %out_trade_no,
            result_code = %result_code,
            "Payment notification received"
        );
        if result_code == FAIL {
            let err_code = message.get("err_code").unwrap_or_default();
            warn!(out_trade_no = %out_trade_no, err_code = %err_code, "Payment failed");
        }

        for handler in &self.handlers {
            run_guarded("payment", || handler(out_trade_no, &message));
        }
        MerchantClient::notify_ack()
    }
}

fn run_guarded(kind: &str, handler: impl FnOnce() -> ApiResult<()>) {
    match catch_unwind(AssertUnwindSafe(handler)) {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!(kind = %kind, error = %e, "Callback handler failed"),
        Err(panic) => error!(kind = %kind, panic = %panic_message(&*panic), "Callback handler panicked"),
    }
}

fn panic_message<'a>(panic: &'a (dyn Any + Send + 'static)) -> &'a str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}
