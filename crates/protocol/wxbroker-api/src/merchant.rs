//! Merchant payment client.
//!
//! Requests are flat XML records signed with the merchant key. Every
//! response goes through [`classify_record`], so a forged or tampered reply
//! never reaches the caller.

use std::sync::Arc;

use tracing::{debug, info, warn};
use wxbroker_crypto::{random_nonce, sign, Secret, SignType, DEFAULT_NONCE_LEN, SIGN_FIELD, SIGN_TYPE_FIELD};
use wxbroker_wire::StructuredMessage;

use crate::endpoints::{self, Endpoint};
use crate::error::{ApiError, ApiResult};
use crate::fault::{classify_record, verify_record, Protocol, SUCCESS};
use crate::transport::{Transport, CONTENT_TYPE_XML};
use crate::types::{encode_query, JsapiParams, OrderRef, PrepayOrder, TradeType};

/// Merchant account settings.
#[derive(Debug, Clone)]
pub struct MerchantConfig {
    /// App the merchant account pays for.
    pub appid: String,
    pub mch_id: String,
    /// API key used for request and response signatures.
    pub key: Secret,
    pub sign_type: SignType,
    pub trade_type: TradeType,
}

impl MerchantConfig {
    pub fn new(appid: impl Into<String>, mch_id: impl Into<String>, key: impl Into<Secret>) -> Self {
        Self {
            appid: appid.into(),
            mch_id: mch_id.into(),
            key: key.into(),
            sign_type: SignType::default(),
            trade_type: TradeType::default(),
        }
    }

    pub fn validate(&self) -> ApiResult<()> {
        if self.appid.is_empty() {
            return Err(ApiError::config("merchant appid is empty"));
        }
        if self.mch_id.is_empty() {
            return Err(ApiError::config("merchant mch_id is empty"));
        }
        if self.key.is_empty() {
            return Err(ApiError::config("merchant key is empty"));
        }
        Ok(())
    }
}

/// A unified order request.
#[derive(Debug, Clone, Default)]
pub struct UnifiedOrder {
    pub body: String,
    pub out_trade_no: String,
    /// Amount in cents.
    pub total_fee: u64,
    pub spbill_create_ip: String,
    pub notify_url: String,
    /// Payer; required for `JSAPI`.
    pub openid: Option<String>,
    /// Overrides the configured trade type.
    pub trade_type: Option<TradeType>,
    /// Optional fields (`attach`, `product_id`, `time_expire`, ...).
    pub extra: Vec<(String, String)>,
}

/// Merchant payment API client.
pub struct MerchantClient {
    config: MerchantConfig,
    transport: Arc<dyn Transport>,
}

impl MerchantClient {
    pub fn new(config: MerchantConfig, transport: Arc<dyn Transport>) -> ApiResult<Self> {
        config.validate()?;
        Ok(Self { config, transport })
    }

    pub fn config(&self) -> &MerchantConfig {
        &self.config
    }

    /// Sign and send a record, then classify the signed response.
    ///
    /// `appid`, `mch_id`, `nonce_str` and (for non-MD5) `sign_type` are
    /// filled in.
    pub async fn request(
        &self,
        endpoint: Endpoint,
        mut params: StructuredMessage,
    ) -> ApiResult<StructuredMessage> {
        if endpoint.protocol != Protocol::Record {
            return Err(ApiError::invalid_request(format!(
                "{} is not a merchant endpoint",
                endpoint.url
            )));
        }

        self.fill_common(&mut params)?;
        let xml = params.to_xml()?;
        debug!(url = %endpoint.url, fields = params.len(), "Sending merchant request");

        let body = self
            .transport
            .post(endpoint.url, &[], CONTENT_TYPE_XML, xml.into_bytes())
            .await?;
        let text = String::from_utf8(body)
            .map_err(|_| ApiError::malformed("merchant response is not UTF-8"))?;
        let record = StructuredMessage::from_xml(&text)?;

        classify_record(record, self.config.key.expose(), self.config.sign_type).map_err(|e| {
            warn!(url = %endpoint.url, error = %e, "Merchant request failed");
            e
        })
    }

    /// Place an order and return its prepay id.
    ///
    /// A `JSAPI` order without an `openid` is rejected without a network call.
    pub async fn unified_order(&self, order: &UnifiedOrder) -> ApiResult<PrepayOrder> {
        let trade_type = order.trade_type.unwrap_or(self.config.trade_type);
        if trade_type == TradeType::Jsapi && order.openid.as_deref().map_or(true, str::is_empty) {
            return Err(ApiError::invalid_request(
                "openid is required when trade_type is JSAPI",
            ));
        }

        let mut params = StructuredMessage::new()
            .with("body", &order.body)
            .with("out_trade_no", &order.out_trade_no)
            .with("total_fee", order.total_fee)
            .with("spbill_create_ip", &order.spbill_create_ip)
            .with("notify_url", &order.notify_url)
            .with("trade_type", trade_type);
        if let Some(openid) = &order.openid {
            params.insert("openid", openid);
        }
        for (name, value) in &order.extra {
            params.insert(name.as_str(), value);
        }

        let result = self.request(endpoints::UNIFIED_ORDER, params).await?;
        let prepay_id = result.require("prepay_id")?.to_string();
        info!(out_trade_no = %order.out_trade_no, "Unified order placed");

        Ok(PrepayOrder {
            prepay_id,
            trade_type: result.get("trade_type").map(str::to_string),
            code_url: result.get("code_url").map(str::to_string),
            mweb_url: result.get("mweb_url").map(str::to_string),
        })
    }

    /// Query an order by transaction id or merchant order number.
    pub async fn order_query(&self, order: &OrderRef) -> ApiResult<StructuredMessage> {
        let (field, value) = order.field();
        let params = StructuredMessage::new().with(field, value);
        self.request(endpoints::ORDER_QUERY, params).await
    }

    /// Verify and decode a payment notification body.
    ///
    /// A failed payment (`result_code=FAIL`) is returned as a business fault.
    pub fn payment_notify(&self, body: &str) -> ApiResult<StructuredMessage> {
        let record = StructuredMessage::from_xml(body)?;
        classify_record(record, self.config.key.expose(), self.config.sign_type)
    }

    /// Verify a payment notification body and return the whole record.
    ///
    /// Only `return_code` and the signature are checked, so failed payments
    /// come back with their `result_code` and `err_code` intact.
    pub fn verify_notification(&self, body: &str) -> ApiResult<StructuredMessage> {
        let record = StructuredMessage::from_xml(body)?;
        verify_record(&record, self.config.key.expose(), self.config.sign_type)?;
        Ok(record)
    }

    /// Acknowledgment body for a processed payment notification.
    pub fn notify_ack() -> ApiResult<String> {
        Ok(StructuredMessage::new()
            .with("return_code", SUCCESS)
            .with("return_msg", "OK")
            .to_xml()?)
    }

    /// Signed parameters for the in-app payment call, stamped now.
    pub fn jsapi_params(&self, prepay_id: &str) -> ApiResult<JsapiParams> {
        let now = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        self.jsapi_params_at(prepay_id, now)
    }

    /// Signed parameters for the in-app payment call.
    ///
    /// `appId` takes part in the signature but is not returned.
    pub fn jsapi_params_at(&self, prepay_id: &str, timestamp: u64) -> ApiResult<JsapiParams> {
        let time_stamp = timestamp.to_string();
        let nonce_str = random_nonce(DEFAULT_NONCE_LEN);
        let package = encode_query(&[("prepay_id", prepay_id)])?;
        let sign_type = self.config.sign_type.as_str();

        let pay_sign = sign(
            [
                ("appId", self.config.appid.as_str()),
                ("timeStamp", time_stamp.as_str()),
                ("nonceStr", nonce_str.as_str()),
                ("package", package.as_str()),
                ("signType", sign_type),
            ],
            self.config.key.expose(),
            self.config.sign_type,
        )?;

        Ok(JsapiParams {
            time_stamp,
            nonce_str,
            package,
            sign_type: sign_type.to_string(),
            pay_sign,
        })
    }

    fn fill_common(&self, params: &mut StructuredMessage) -> ApiResult<()> {
        params.insert("appid", &self.config.appid);
        params.insert("mch_id", &self.config.mch_id);
        params.insert("nonce_str", random_nonce(DEFAULT_NONCE_LEN));
        if self.config.sign_type != SignType::Md5 {
            params.insert(SIGN_TYPE_FIELD, self.config.sign_type);
        }
        let signature = sign(&*params, self.config.key.expose(), self.config.sign_type)?;
        params.insert(SIGN_FIELD, signature);
        Ok(())
    }
}
