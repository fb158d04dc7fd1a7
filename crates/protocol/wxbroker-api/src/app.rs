//! App clients.
//!
//! Two kinds of app talk to the platform:
//!
//! - [`SecretAppClient`]: an account that holds its own app secret and
//!   fetches its own access token.
//! - [`AuthorizedAppClient`]: an account that granted the component access;
//!   its token comes from the component.
//!
//! Calls that work for both live on the [`AppClient`] trait.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use wxbroker_cache::{CredentialBroker, CredentialKind, FetchedCredential};
use wxbroker_crypto::Secret;

use crate::client::{from_value, take_field, with_timeout, JsonClient};
use crate::component::{build_url, ComponentClient, DEFAULT_FETCH_TIMEOUT};
use crate::endpoints::{self, Endpoint, WECHAT_REDIRECT_FRAGMENT};
use crate::error::{ApiError, ApiResult};
use crate::transport::Transport;
use crate::types::{
    AppToken, OpenBinding, SessionInfo, UniformMessage, UserAccessToken, WxaCode,
    GRANT_AUTHORIZATION_CODE, GRANT_CLIENT_CREDENTIAL, GRANT_REFRESH_TOKEN,
};
use crate::user::UserClient;

/// Fault code for "no open platform account is bound".
pub const OPEN_NOT_BOUND_CODE: i64 = 89002;

/// Page size for paged template listings.
pub const TEMPLATE_PAGE_SIZE: usize = 20;

// =============================================================================
// Shared calls
// =============================================================================

/// Calls available to any app with an access token.
#[async_trait]
pub trait AppClient: Send + Sync {
    fn appid(&self) -> &str;

    fn json(&self) -> &JsonClient;

    async fn access_token(&self) -> ApiResult<String>;

    /// Decrypt user data handed to a mini program (phone number, run data).
    ///
    /// The payload's watermark must name this app.
    fn decrypt_data(
        &self,
        encrypted_data: &str,
        session_key: &str,
        iv: &str,
    ) -> ApiResult<Map<String, Value>> {
        Ok(wxbroker_crypto::decrypt_data(
            encrypted_data,
            session_key,
            iv,
            self.appid(),
        )?)
    }

    async fn send_uniform_message(&self, touser: &str, message: &UniformMessage) -> ApiResult<Value> {
        let token = self.access_token().await?;
        let mut body = json!({ "touser": touser });
        body[message.field_name()] = message.template().clone();
        self.json()
            .post(endpoints::UNIFORM_SEND, &[("access_token", token.as_str())], &body)
            .await
    }

    /// Mini program code image bytes.
    async fn get_wxa_code(&self, code: &WxaCode) -> ApiResult<Vec<u8>> {
        let token = self.access_token().await?;
        self.json()
            .post_binary(
                endpoints::GET_WXA_CODE,
                &[("access_token", token.as_str())],
                &code.to_json(),
            )
            .await
    }

    /// Mini program QR code image bytes.
    async fn create_wxa_qrcode(&self, path: &str, width: Option<u32>) -> ApiResult<Vec<u8>> {
        let token = self.access_token().await?;
        let mut body = json!({ "path": path });
        if let Some(width) = width {
            body["width"] = width.into();
        }
        self.json()
            .post_binary(
                endpoints::CREATE_WXA_QRCODE,
                &[("access_token", token.as_str())],
                &body,
            )
            .await
    }
}

// =============================================================================
// Secret app
// =============================================================================

/// Settings for an app that holds its own secret.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub appid: String,
    pub secret: Secret,
    pub fetch_timeout: Duration,
}

impl AppConfig {
    pub fn new(appid: impl Into<String>, secret: impl Into<Secret>) -> Self {
        Self {
            appid: appid.into(),
            secret: secret.into(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Client for an official account, mini program or website app that holds
/// its own secret.
pub struct SecretAppClient {
    config: AppConfig,
    json: JsonClient,
    broker: Arc<CredentialBroker<ApiError>>,
}

impl SecretAppClient {
    pub fn new(
        config: AppConfig,
        transport: Arc<dyn Transport>,
        broker: Arc<CredentialBroker<ApiError>>,
    ) -> ApiResult<Self> {
        if config.appid.is_empty() || config.secret.is_empty() {
            return Err(ApiError::config("app appid and secret are required"));
        }
        Ok(Self {
            config,
            json: JsonClient::new(transport),
            broker,
        })
    }

    /// Drop the cached token after the platform rejected it.
    pub fn invalidate_access_token(&self) -> ApiResult<()> {
        let scope = self
            .broker
            .scope(&self.config.appid, CredentialKind::SecretAppToken);
        Ok(self.broker.invalidate(&scope)?)
    }

    async fn fetch_access_token(&self) -> ApiResult<FetchedCredential> {
        let response = self
            .json
            .get(
                endpoints::APP_TOKEN,
                &[
                    ("grant_type", GRANT_CLIENT_CREDENTIAL),
                    ("appid", self.config.appid.as_str()),
                    ("secret", self.config.secret.expose()),
                ],
            )
            .await?;
        let token: AppToken = from_value(response, "access token")?;
        info!(appid = %self.config.appid, expires_in = token.expires_in, "Fetched app access token");
        Ok(FetchedCredential::new(token.access_token, token.expires_in))
    }

    /// User OAuth URL inside the platform's in-app browser.
    pub fn oauth2_authorize_url(
        &self,
        redirect_uri: &str,
        scope: &str,
        state: &str,
    ) -> ApiResult<String> {
        self.redirect_url(endpoints::OAUTH2_AUTHORIZE, redirect_uri, scope, state)
    }

    /// QR code login URL for websites.
    pub fn qrconnect_url(&self, redirect_uri: &str, scope: &str, state: &str) -> ApiResult<String> {
        self.redirect_url(endpoints::OAUTH2_QRCONNECT, redirect_uri, scope, state)
    }

    fn redirect_url(
        &self,
        base: &str,
        redirect_uri: &str,
        scope: &str,
        state: &str,
    ) -> ApiResult<String> {
        build_url(
            base,
            &[
                ("appid", self.config.appid.as_str()),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope),
                ("state", state),
            ],
            Some(WECHAT_REDIRECT_FRAGMENT),
        )
    }

    /// Exchange the OAuth `code` from the redirect.
    pub async fn query_auth(&self, code: Option<&str>) -> ApiResult<UserAccessToken> {
        let code = require_code(code)?;
        self.user_token_call(
            endpoints::SNS_OAUTH2_ACCESS_TOKEN,
            &[
                ("appid", self.config.appid.as_str()),
                ("secret", self.config.secret.expose()),
                ("code", code),
                ("grant_type", GRANT_AUTHORIZATION_CODE),
            ],
        )
        .await
    }

    pub async fn refresh_user_token(&self, refresh_token: &str) -> ApiResult<UserAccessToken> {
        self.user_token_call(
            endpoints::SNS_OAUTH2_REFRESH_TOKEN,
            &[
                ("appid", self.config.appid.as_str()),
                ("grant_type", GRANT_REFRESH_TOKEN),
                ("refresh_token", refresh_token),
            ],
        )
        .await
    }

    async fn user_token_call(
        &self,
        endpoint: Endpoint,
        query: &[(&str, &str)],
    ) -> ApiResult<UserAccessToken> {
        let response = self.json.get(endpoint, query).await?;
        from_value(response, "user token")
    }

    /// Whether a user access token is still valid.
    pub async fn check_auth(&self, openid: &str, access_token: &str) -> ApiResult<bool> {
        let result = self
            .json
            .get(
                endpoints::SNS_AUTH,
                &[("access_token", access_token), ("openid", openid)],
            )
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(ApiError::Api(fault)) => {
                debug!(openid = %openid, code = %fault.code, "User token rejected");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    pub async fn jscode2session(&self, js_code: &str) -> ApiResult<SessionInfo> {
        let response = self
            .json
            .get(
                endpoints::SNS_JSCODE2SESSION,
                &[
                    ("appid", self.config.appid.as_str()),
                    ("secret", self.config.secret.expose()),
                    ("js_code", js_code),
                    ("grant_type", GRANT_AUTHORIZATION_CODE),
                ],
            )
            .await?;
        from_value(response, "session")
    }

    /// Client acting for one user with their OAuth token.
    pub fn user(&self, openid: impl Into<String>, access_token: impl Into<String>) -> UserClient {
        UserClient::new(openid, access_token, self.json.clone())
    }
}

#[async_trait]
impl AppClient for SecretAppClient {
    fn appid(&self) -> &str {
        &self.config.appid
    }

    fn json(&self) -> &JsonClient {
        &self.json
    }

    async fn access_token(&self) -> ApiResult<String> {
        let scope = self
            .broker
            .scope(&self.config.appid, CredentialKind::SecretAppToken);
        let credential = self
            .broker
            .get_or_fetch(&scope, || {
                with_timeout(
                    self.config.fetch_timeout,
                    "app token fetch",
                    self.fetch_access_token(),
                )
            })
            .await?;
        Ok(credential.value)
    }
}

impl std::fmt::Debug for SecretAppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretAppClient")
            .field("appid", &self.config.appid)
            .finish()
    }
}

// =============================================================================
// Authorized app
// =============================================================================

/// Domains for `modify_domain`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainSet {
    pub request: Vec<String>,
    pub ws_request: Vec<String>,
    pub upload: Vec<String>,
    pub download: Vec<String>,
}

/// Client for an account that authorized the component.
pub struct AuthorizedAppClient {
    appid: String,
    access_token: String,
    component: Arc<ComponentClient>,
    json: JsonClient,
}

impl AuthorizedAppClient {
    pub fn new(
        appid: impl Into<String>,
        access_token: impl Into<String>,
        component: Arc<ComponentClient>,
    ) -> Self {
        let json = component.json().clone();
        Self {
            appid: appid.into(),
            access_token: access_token.into(),
            component,
            json,
        }
    }

    async fn token_post(&self, endpoint: Endpoint, body: Value) -> ApiResult<Value> {
        self.json
            .post(endpoint, &[("access_token", self.access_token.as_str())], &body)
            .await
    }

    async fn token_post_with_appid(&self, endpoint: Endpoint, mut body: Value) -> ApiResult<Value> {
        if let Value::Object(fields) = &mut body {
            fields.insert("appid".into(), self.appid.clone().into());
        }
        self.token_post(endpoint, body).await
    }

    async fn token_get(&self, endpoint: Endpoint) -> ApiResult<Value> {
        self.json
            .get(endpoint, &[("access_token", self.access_token.as_str())])
            .await
    }

    // -------------------------------------------------------------------------
    // Open platform binding
    // -------------------------------------------------------------------------

    /// Create an open platform account and bind this app to it.
    pub async fn open_create(&self) -> ApiResult<String> {
        let response = self
            .token_post_with_appid(endpoints::OPEN_CREATE, json!({}))
            .await?;
        match take_field(response, "open_appid")? {
            Value::String(open_appid) => Ok(open_appid),
            other => Err(ApiError::malformed(format!("open_appid is not a string: {}", other))),
        }
    }

    pub async fn open_bind(&self, open_appid: &str) -> ApiResult<()> {
        self.token_post_with_appid(endpoints::OPEN_BIND, json!({ "open_appid": open_appid }))
            .await?;
        Ok(())
    }

    pub async fn open_unbind(&self, open_appid: &str) -> ApiResult<()> {
        self.token_post_with_appid(endpoints::OPEN_UNBIND, json!({ "open_appid": open_appid }))
            .await?;
        Ok(())
    }

    /// The open platform account this app is bound to.
    pub async fn open_get(&self) -> ApiResult<OpenBinding> {
        match self.token_post_with_appid(endpoints::OPEN_GET, json!({})).await {
            Ok(response) => match response.get("open_appid").and_then(Value::as_str) {
                Some(open_appid) if !open_appid.is_empty() => {
                    Ok(OpenBinding::Bound(open_appid.to_string()))
                }
                _ => Ok(OpenBinding::Unbound),
            },
            Err(ApiError::Api(fault)) if fault.is_code(OPEN_NOT_BOUND_CODE) => {
                Ok(OpenBinding::Unbound)
            }
            Err(e) => Err(e),
        }
    }

    // -------------------------------------------------------------------------
    // Settings
    // -------------------------------------------------------------------------

    /// Replace the mini program's server domains.
    pub async fn modify_domain(&self, domains: &DomainSet) -> ApiResult<Value> {
        self.token_post(
            endpoints::MODIFY_DOMAIN,
            json!({
                "action": "set",
                "requestdomain": domains.request,
                "wsrequestdomain": domains.ws_request,
                "uploaddomain": domains.upload,
                "downloaddomain": domains.download,
            }),
        )
        .await
    }

    pub async fn industry(&self) -> ApiResult<Value> {
        self.token_get(endpoints::GET_INDUSTRY).await
    }

    pub async fn private_templates(&self) -> ApiResult<Value> {
        self.token_get(endpoints::GET_ALL_PRIVATE_TEMPLATE).await
    }

    // -------------------------------------------------------------------------
    // Message templates
    // -------------------------------------------------------------------------

    /// Every title in the template library.
    pub async fn template_library_list(&self) -> ApiResult<Vec<Value>> {
        self.paged(endpoints::TEMPLATE_LIBRARY_LIST).await
    }

    /// Every template added to this app.
    pub async fn template_list(&self) -> ApiResult<Vec<Value>> {
        self.paged(endpoints::TEMPLATE_LIST).await
    }

    pub async fn template_library_keywords(&self, library_id: &str) -> ApiResult<Value> {
        self.token_post(endpoints::TEMPLATE_LIBRARY_GET, json!({ "id": library_id }))
            .await
    }

    /// Add a template from the library. Returns the new template id.
    pub async fn add_template(&self, library_id: &str, keyword_ids: &[u32]) -> ApiResult<String> {
        let response = self
            .token_post(
                endpoints::TEMPLATE_ADD,
                json!({ "id": library_id, "keyword_id_list": keyword_ids }),
            )
            .await?;
        match take_field(response, "template_id")? {
            Value::String(id) => Ok(id),
            other => Err(ApiError::malformed(format!("template_id is not a string: {}", other))),
        }
    }

    pub async fn del_template(&self, template_id: &str) -> ApiResult<()> {
        self.token_post(endpoints::TEMPLATE_DEL, json!({ "template_id": template_id }))
            .await?;
        Ok(())
    }

    /// Fetch pages until one comes back short.
    async fn paged(&self, endpoint: Endpoint) -> ApiResult<Vec<Value>> {
        let mut items = Vec::new();
        let mut offset = 0;
        loop {
            let mut response = self
                .token_post(
                    endpoint,
                    json!({ "offset": offset, "count": TEMPLATE_PAGE_SIZE }),
                )
                .await?;
            let page = match response.get_mut("list").map(Value::take) {
                Some(Value::Array(page)) => page,
                _ => Vec::new(),
            };
            let short = page.len() < TEMPLATE_PAGE_SIZE;
            debug!(url = %endpoint.url, offset, count = page.len(), "Fetched template page");
            items.extend(page);
            if short {
                break;
            }
            offset += TEMPLATE_PAGE_SIZE;
        }
        Ok(items)
    }

    // -------------------------------------------------------------------------
    // Users
    // -------------------------------------------------------------------------

    pub async fn jscode2session(&self, js_code: &str) -> ApiResult<SessionInfo> {
        self.component.jscode2session(&self.appid, js_code).await
    }

    pub fn oauth2_authorize_url(
        &self,
        redirect_uri: &str,
        scope: &str,
        state: &str,
    ) -> ApiResult<String> {
        self.component
            .user_authorize_url(&self.appid, redirect_uri, scope, state)
    }

    pub async fn query_auth(&self, code: Option<&str>) -> ApiResult<UserAccessToken> {
        let code = require_code(code)?;
        self.component.user_access_token(&self.appid, code).await
    }

    /// Client acting for one user with their OAuth token.
    pub fn user(&self, openid: impl Into<String>, access_token: impl Into<String>) -> UserClient {
        UserClient::new(openid, access_token, self.json.clone())
    }
}

#[async_trait]
impl AppClient for AuthorizedAppClient {
    fn appid(&self) -> &str {
        &self.appid
    }

    fn json(&self) -> &JsonClient {
        &self.json
    }

    async fn access_token(&self) -> ApiResult<String> {
        Ok(self.access_token.clone())
    }
}

impl std::fmt::Debug for AuthorizedAppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthorizedAppClient")
            .field("appid", &self.appid)
            .field("access_token", &"[REDACTED]")
            .field("component", &self.component.appid())
            .finish()
    }
}

fn require_code(code: Option<&str>) -> ApiResult<&str> {
    code.filter(|code| !code.is_empty())
        .ok_or_else(|| ApiError::authorization("OAuth callback carried no code"))
}
