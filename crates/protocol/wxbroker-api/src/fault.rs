//! Result fault classification.
//!
//! The platform speaks two response dialects, and the endpoint decides which
//! one applies:
//!
//! - **JSON**: `{"errcode": 40013, "errmsg": "invalid appid"}`; an absent or
//!   zero `errcode` means success.
//! - **Record** (merchant XML): a layered status. `return_code` reports the
//!   communication layer, then the record signature is checked, then
//!   `result_code` / `err_code` report the business outcome.

use serde_json::Value;
use tracing::warn;
use wxbroker_crypto::{require_valid, SignType, SIGN_FIELD, SIGN_TYPE_FIELD};
use wxbroker_wire::StructuredMessage;

use crate::error::{ApiError, ApiFault, ApiResult, FaultCode, FaultLayer};

/// Response dialect of an endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// JSON body with `errcode` / `errmsg`.
    Json,
    /// Signed XML record with layered status codes.
    Record,
    /// Raw bytes on success, JSON fault body on failure.
    Binary,
}

/// Value of `return_code` / `result_code` that signals failure.
pub const FAIL: &str = "FAIL";

/// Value of `return_code` / `result_code` that signals success.
pub const SUCCESS: &str = "SUCCESS";

/// Status and signing fields removed from a successful record.
pub const ENVELOPE_FIELDS: [&str; 11] = [
    "appid",
    "mch_id",
    "nonce_str",
    "sign_type",
    "sign",
    "return_code",
    "return_msg",
    "result_code",
    "result_msg",
    "err_code",
    "err_code_des",
];

/// Classify a decoded JSON response.
///
/// Returns the value unchanged on success.
pub fn classify_json(value: Value) -> ApiResult<Value> {
    let code = match value.get("errcode") {
        None | Some(Value::Null) => return Ok(value),
        Some(Value::Number(n)) => n
            .as_i64()
            .ok_or_else(|| ApiError::malformed(format!("errcode {} is not an integer", n)))?,
        Some(Value::String(s)) => s
            .trim()
            .parse::<i64>()
            .map_err(|_| ApiError::malformed(format!("errcode {:?} is not numeric", s)))?,
        Some(other) => {
            return Err(ApiError::malformed(format!(
                "unexpected errcode value {}",
                other
            )))
        }
    };

    if code == 0 {
        return Ok(value);
    }

    let message = value
        .get("errmsg")
        .and_then(Value::as_str)
        .unwrap_or_default();
    Err(ApiFault::new(FaultLayer::Transport, FaultCode::Int(code), message).into())
}

/// Check the communication layer and signature of a merchant record.
///
/// The business outcome (`result_code`, `err_code`) is not inspected.
pub fn verify_record(
    record: &StructuredMessage,
    secret: &str,
    default_sign_type: SignType,
) -> ApiResult<()> {
    let return_code = record
        .get("return_code")
        .ok_or_else(|| ApiError::malformed("record has no return_code"))?;

    if return_code == FAIL {
        let message = record.get("return_msg").unwrap_or_default();
        return Err(
            ApiFault::new(FaultLayer::Transport, FaultCode::Text(FAIL.into()), message).into(),
        );
    }

    let sign_type = match record.get(SIGN_TYPE_FIELD) {
        Some(name) => name.parse::<SignType>()?,
        None => default_sign_type,
    };
    let signature = record
        .get(SIGN_FIELD)
        .ok_or_else(|| ApiError::Integrity("record carries no signature".into()))?;
    if let Err(e) = require_valid(record, signature, secret, sign_type) {
        warn!(sign_type = %sign_type, "Record signature mismatch");
        return Err(e.into());
    }
    Ok(())
}

/// Classify a merchant record, verifying its signature.
///
/// The signature algorithm is taken from the record's `sign_type`, falling
/// back to `default_sign_type`. On success the envelope fields are stripped
/// and the business payload is returned.
pub fn classify_record(
    mut record: StructuredMessage,
    secret: &str,
    default_sign_type: SignType,
) -> ApiResult<StructuredMessage> {
    verify_record(&record, secret, default_sign_type)?;

    let err_code = record.get("err_code").unwrap_or_default();
    let err_code_des = record.get("err_code_des").unwrap_or_default();

    if record.get("result_code") == Some(FAIL) {
        return Err(ApiFault::new(
            FaultLayer::Business,
            FaultCode::Text(err_code.to_string()),
            err_code_des,
        )
        .into());
    }

    if !err_code.is_empty() {
        return Err(ApiFault::new(
            FaultLayer::Detail,
            FaultCode::Text(err_code.to_string()),
            err_code_des,
        )
        .into());
    }

    for field in ENVELOPE_FIELDS {
        record.remove(field);
    }
    Ok(record)
}
