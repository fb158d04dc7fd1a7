//! Fixtures: test credentials, signed merchant records, encrypted callbacks.

use std::sync::Arc;

use aes::Aes128;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use serde_json::Value;
use wxbroker_api::{
    ApiError, CallbackQuery, ComponentConfig, MerchantConfig, Transport,
};
use wxbroker_cache::{Clock, CredentialBroker, MemoryCache};
use wxbroker_crypto::{sign, MessageCrypt, SignType, SIGN_FIELD};
use wxbroker_wire::StructuredMessage;

use crate::mock_transport::MockTransport;

pub const TEST_APPID: &str = "wxd930ea5d5a258f4f";
pub const TEST_APP_SECRET: &str = "test-app-secret";
pub const TEST_MCH_ID: &str = "10000100";
pub const TEST_MERCHANT_KEY: &str = "192006250b4c09247ec02edce69f6a2d";

pub const TEST_COMPONENT_APPID: &str = "wx3f0e4c1a9b8d7e6f";
pub const TEST_COMPONENT_SECRET: &str = "test-component-secret";
pub const TEST_CALLBACK_TOKEN: &str = "test-callback-token";
pub const TEST_ENCODING_AES_KEY: &str = "abcdefghijklmnopqrstuvwxyz0123456789ABCDEFG";

/// 16-byte session key used for user data fixtures.
pub const TEST_SESSION_KEY: [u8; 16] = *b"session-key-0001";
pub const TEST_IV: [u8; 16] = *b"iv-for-test-0001";

// =============================================================================
// Clients
// =============================================================================

/// A broker over an in-memory cache, reading time from `clock`.
pub fn test_broker(clock: Arc<dyn Clock>) -> Arc<CredentialBroker<ApiError>> {
    let backend = Arc::new(MemoryCache::with_clock(clock.clone()));
    Arc::new(CredentialBroker::with_clock(backend, clock))
}

pub fn merchant_config() -> MerchantConfig {
    MerchantConfig::new(TEST_APPID, TEST_MCH_ID, TEST_MERCHANT_KEY)
}

pub fn component_config() -> ComponentConfig {
    ComponentConfig::new(
        TEST_COMPONENT_APPID,
        TEST_COMPONENT_SECRET,
        TEST_CALLBACK_TOKEN,
        TEST_ENCODING_AES_KEY,
    )
}

/// A shared handle to `mock` for client constructors.
pub fn dyn_transport(mock: &MockTransport) -> Arc<dyn Transport> {
    Arc::new(mock.clone())
}

// =============================================================================
// Merchant records
// =============================================================================

/// Add a `sign` field computed with `key`.
pub fn signed_record(mut record: StructuredMessage, key: &str, sign_type: SignType) -> StructuredMessage {
    let signature = sign(&record, key, sign_type).expect("fixture record signs");
    record.insert(SIGN_FIELD, signature);
    record
}

/// XML of a signed successful merchant response carrying `fields`.
pub fn merchant_success(fields: &[(&str, &str)]) -> String {
    let mut record = StructuredMessage::new()
        .with("return_code", "SUCCESS")
        .with("return_msg", "OK")
        .with("result_code", "SUCCESS")
        .with("appid", TEST_APPID)
        .with("mch_id", TEST_MCH_ID)
        .with("nonce_str", "IITRi8Iabbblz1Jc");
    for (name, value) in fields {
        record.insert(*name, value);
    }
    to_xml(&signed_record(record, TEST_MERCHANT_KEY, SignType::Md5))
}

/// XML of a signed merchant response reporting a business failure.
pub fn merchant_business_failure(err_code: &str, err_code_des: &str) -> String {
    let record = StructuredMessage::new()
        .with("return_code", "SUCCESS")
        .with("return_msg", "OK")
        .with("result_code", "FAIL")
        .with("err_code", err_code)
        .with("err_code_des", err_code_des)
        .with("appid", TEST_APPID)
        .with("mch_id", TEST_MCH_ID)
        .with("nonce_str", "IITRi8Iabbblz1Jc");
    to_xml(&signed_record(record, TEST_MERCHANT_KEY, SignType::Md5))
}

/// XML of a signed payment notification for `out_trade_no`.
pub fn payment_notification(out_trade_no: &str, total_fee: u64) -> String {
    let record = StructuredMessage::new()
        .with("return_code", "SUCCESS")
        .with("result_code", "SUCCESS")
        .with("appid", TEST_APPID)
        .with("mch_id", TEST_MCH_ID)
        .with("nonce_str", "5d2b6c2a8db53831f7eda20af46e531c")
        .with("openid", "oUpF8uMEb4qRXf22hE3X68TekukE")
        .with("trade_type", "JSAPI")
        .with("bank_type", "CMC")
        .with("total_fee", total_fee)
        .with("cash_fee", total_fee)
        .with("transaction_id", "1004400740201409030005092168")
        .with("out_trade_no", out_trade_no)
        .with("time_end", "20140903131540");
    to_xml(&signed_record(record, TEST_MERCHANT_KEY, SignType::Md5))
}

fn to_xml(record: &StructuredMessage) -> String {
    record.to_xml().expect("fixture record encodes")
}

// =============================================================================
// Encrypted payloads
// =============================================================================

/// The codec the platform would use to push to the test component.
pub fn component_crypt() -> MessageCrypt {
    MessageCrypt::new(TEST_CALLBACK_TOKEN, TEST_ENCODING_AES_KEY, TEST_COMPONENT_APPID)
        .expect("fixture key is valid")
}

/// Encrypt `inner` the way the platform pushes component callbacks.
///
/// Returns the request body and the matching query parameters.
pub fn encrypted_callback(inner: &StructuredMessage, timestamp: &str, nonce: &str) -> (String, CallbackQuery) {
    let reply = component_crypt()
        .encrypt(&to_xml(inner), timestamp, nonce)
        .expect("fixture encrypts");
    let body = to_xml(
        &StructuredMessage::new()
            .with("AppId", TEST_COMPONENT_APPID)
            .with("Encrypt", &reply.encrypt),
    );
    let query = CallbackQuery {
        timestamp: reply.timestamp,
        nonce: reply.nonce,
        msg_signature: reply.msg_signature,
    };
    (body, query)
}

/// A verify ticket push.
pub fn verify_ticket_push(ticket: &str) -> StructuredMessage {
    StructuredMessage::new()
        .with("AppId", TEST_COMPONENT_APPID)
        .with("CreateTime", 1413192605)
        .with("InfoType", "component_verify_ticket")
        .with("ComponentVerifyTicket", ticket)
}

/// Encrypt user data the way the platform hands it to a mini program.
///
/// Returns `(encrypted_data, session_key, iv)`, all base64.
pub fn encrypted_user_data(payload: &Value) -> (String, String, String) {
    let ciphertext = cbc::Encryptor::<Aes128>::new_from_slices(&TEST_SESSION_KEY, &TEST_IV)
        .expect("fixture key is valid")
        .encrypt_padded_vec_mut::<Pkcs7>(payload.to_string().as_bytes());
    (
        STANDARD.encode(ciphertext),
        STANDARD.encode(TEST_SESSION_KEY),
        STANDARD.encode(TEST_IV),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use wxbroker_api::classify_record;

    #[test]
    fn test_merchant_success_verifies() {
        let record = StructuredMessage::from_xml(&merchant_success(&[("prepay_id", "p1")])).unwrap();
        let payload = classify_record(record, TEST_MERCHANT_KEY, SignType::Md5).unwrap();
        assert_eq!(payload.get("prepay_id"), Some("p1"));
    }

    #[test]
    fn test_encrypted_callback_decrypts() {
        let inner = verify_ticket_push("ticket@@@1");
        let (body, query) = encrypted_callback(&inner, "1413192605", "nonce1");
        let envelope = StructuredMessage::from_xml(&body).unwrap();
        let decrypted = component_crypt()
            .decrypt(
                envelope.get("Encrypt").unwrap(),
                &query.msg_signature,
                &query.timestamp,
                &query.nonce,
            )
            .unwrap();
        assert_eq!(StructuredMessage::from_xml(&decrypted).unwrap(), inner);
    }
}
