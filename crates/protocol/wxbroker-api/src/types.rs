//! Typed request and response values.
//!
//! Payloads the clients inspect are typed here; everything else is passed
//! through as `serde_json::Value`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

/// Default language for user info lookups.
pub const DEFAULT_LANG: &str = "zh_CN";

/// OAuth grant for exchanging an authorization code.
pub const GRANT_AUTHORIZATION_CODE: &str = "authorization_code";

/// OAuth grant for refreshing a user token.
pub const GRANT_REFRESH_TOKEN: &str = "refresh_token";

/// Grant used by secret apps to obtain an access token.
pub const GRANT_CLIENT_CREDENTIAL: &str = "client_credential";

// =============================================================================
// Tokens
// =============================================================================

/// `cgi-bin/token` response.
#[derive(Clone, Deserialize)]
pub struct AppToken {
    pub access_token: String,
    pub expires_in: u64,
}

/// `api_component_token` response.
#[derive(Clone, Deserialize)]
pub struct ComponentToken {
    pub component_access_token: String,
    pub expires_in: u64,
}

/// `api_authorizer_token` response.
#[derive(Clone, Deserialize)]
pub struct AuthorizerToken {
    pub authorizer_access_token: String,
    pub expires_in: u64,
    pub authorizer_refresh_token: String,
}

impl std::fmt::Debug for AuthorizerToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizerToken")
            .field("authorizer_access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("authorizer_refresh_token", &"[REDACTED]")
            .finish()
    }
}

/// User OAuth token (`sns/oauth2/*` responses).
#[derive(Clone, Serialize, Deserialize)]
pub struct UserAccessToken {
    pub access_token: String,
    pub expires_in: u64,
    pub refresh_token: String,
    pub openid: String,
    #[serde(default)]
    pub scope: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unionid: Option<String>,
}

impl std::fmt::Debug for UserAccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserAccessToken")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("refresh_token", &"[REDACTED]")
            .field("openid", &self.openid)
            .field("scope", &self.scope)
            .field("unionid", &self.unionid)
            .finish()
    }
}

/// Mini program login session (`jscode2session`).
#[derive(Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub openid: String,
    pub session_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unionid: Option<String>,
}

impl std::fmt::Debug for SessionInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionInfo")
            .field("openid", &self.openid)
            .field("session_key", &"[REDACTED]")
            .field("unionid", &self.unionid)
            .finish()
    }
}

// =============================================================================
// Component authorization
// =============================================================================

/// Which account types the component login page offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthType {
    /// Official accounts only.
    OfficialAccount,
    /// Mini programs only.
    MiniProgram,
    /// Both.
    #[default]
    All,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OfficialAccount => "1",
            Self::MiniProgram => "2",
            Self::All => "3",
        }
    }
}

/// One granted permission set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncInfo {
    pub funcscope_category: FuncScope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FuncScope {
    pub id: u32,
}

/// The authorization an account granted to the component.
///
/// This is the record a persistence layer keeps per authorizer.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationInfo {
    pub authorizer_appid: String,
    pub authorizer_access_token: String,
    pub expires_in: u64,
    pub authorizer_refresh_token: String,
    #[serde(default)]
    pub func_info: Vec<FuncInfo>,
}

impl AuthorizationInfo {
    /// Granted function-scope ids, in grant order.
    pub fn func_scope_ids(&self) -> Vec<u32> {
        self.func_info
            .iter()
            .map(|info| info.funcscope_category.id)
            .collect()
    }

    /// Absolute expiry of the access token, given the time it was issued.
    pub fn expires_at(&self, now: u64) -> u64 {
        now.saturating_add(self.expires_in)
    }
}

impl std::fmt::Debug for AuthorizationInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizationInfo")
            .field("authorizer_appid", &self.authorizer_appid)
            .field("authorizer_access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("authorizer_refresh_token", &"[REDACTED]")
            .field("func_scope_ids", &self.func_scope_ids())
            .finish()
    }
}

/// Whether an authorized app is bound to an open platform account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpenBinding {
    Bound(String),
    Unbound,
}

impl OpenBinding {
    pub fn open_appid(&self) -> Option<&str> {
        match self {
            Self::Bound(appid) => Some(appid),
            Self::Unbound => None,
        }
    }
}

// =============================================================================
// Messages and codes
// =============================================================================

/// A uniform template message: exactly one of the two template kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum UniformMessage {
    /// Mini program template (`weapp_template_msg`).
    Weapp(Value),
    /// Official account template (`mp_template_msg`).
    Mp(Value),
}

impl UniformMessage {
    /// Build a mini program template message.
    pub fn weapp(
        template_id: &str,
        page: &str,
        form_id: &str,
        data: Value,
        emphasis_keyword: &str,
    ) -> Self {
        Self::Weapp(serde_json::json!({
            "template_id": template_id,
            "page": page,
            "form_id": form_id,
            "data": data,
            "emphasis_keyword": emphasis_keyword,
        }))
    }

    /// Build an official account template message.
    pub fn mp(template_id: &str, appid: &str, url: &str, miniprogram: Value, data: Value) -> Self {
        Self::Mp(serde_json::json!({
            "template_id": template_id,
            "appid": appid,
            "url": url,
            "miniprogram": miniprogram,
            "data": data,
        }))
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Weapp(_) => "weapp_template_msg",
            Self::Mp(_) => "mp_template_msg",
        }
    }

    pub fn template(&self) -> &Value {
        match self {
            Self::Weapp(template) | Self::Mp(template) => template,
        }
    }
}

/// Line color for mini program codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

/// Parameters for a mini program code image.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WxaCode {
    pub path: String,
    pub width: Option<u32>,
    pub auto_color: bool,
    /// Ignored when `auto_color` is set.
    pub line_color: Option<LineColor>,
    pub is_hyaline: bool,
}

impl WxaCode {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    /// Append URL-encoded page parameters to the path.
    pub fn with_params(mut self, params: &[(&str, &str)]) -> ApiResult<Self> {
        if !params.is_empty() {
            self.path = format!("{}?{}", self.path, encode_query(params)?);
        }
        Ok(self)
    }

    pub fn with_width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    pub(crate) fn to_json(&self) -> Value {
        let mut body = serde_json::json!({
            "path": self.path,
            "auto_color": self.auto_color,
            "is_hyaline": self.is_hyaline,
        });
        if let Some(width) = self.width {
            body["width"] = width.into();
        }
        if !self.auto_color {
            if let Some(color) = self.line_color {
                body["line_color"] = serde_json::json!(color);
            }
        }
        body
    }
}

// =============================================================================
// Merchant
// =============================================================================

/// Identifies an order for `order_query`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderRef {
    /// The platform's transaction id.
    TransactionId(String),
    /// The merchant's own order number.
    OutTradeNo(String),
}

impl OrderRef {
    /// The request field and value this reference sends.
    pub fn field(&self) -> (&'static str, &str) {
        match self {
            Self::TransactionId(id) => ("transaction_id", id),
            Self::OutTradeNo(no) => ("out_trade_no", no),
        }
    }
}

/// Merchant trade type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeType {
    /// In-app web payment; requires the payer's openid.
    #[default]
    Jsapi,
    /// QR code payment.
    Native,
    App,
    /// Mobile browser payment.
    Mweb,
}

impl TradeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jsapi => "JSAPI",
            Self::Native => "NATIVE",
            Self::App => "APP",
            Self::Mweb => "MWEB",
        }
    }
}

impl std::fmt::Display for TradeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a successful unified order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrepayOrder {
    pub prepay_id: String,
    pub trade_type: Option<String>,
    /// Present for `NATIVE` orders.
    pub code_url: Option<String>,
    /// Present for `MWEB` orders.
    pub mweb_url: Option<String>,
}

/// Parameters handed to the in-app payment call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JsapiParams {
    pub time_stamp: String,
    pub nonce_str: String,
    pub package: String,
    pub sign_type: String,
    pub pay_sign: String,
}

/// URL-encode query pairs the way the platform expects them in page paths
/// and the `package` field.
pub fn encode_query(params: &[(&str, &str)]) -> ApiResult<String> {
    let url = reqwest::Url::parse_with_params("http://localhost/", params)
        .map_err(|e| ApiError::invalid_request(format!("cannot encode parameters: {}", e)))?;
    Ok(url.query().unwrap_or_default().to_string())
}
