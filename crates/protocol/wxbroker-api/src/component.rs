//! Third-party platform (component) client.
//!
//! The component acts for many authorizer accounts. Its own access token
//! needs the verify ticket the platform pushes every ten minutes, so the
//! ticket and both token kinds live in the shared [`CredentialBroker`].

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, info};
use wxbroker_cache::{CredentialBroker, CredentialKind, FetchedCredential};
use wxbroker_crypto::{MessageCrypt, Secret};
use wxbroker_wire::StructuredMessage;

use crate::app::AuthorizedAppClient;
use crate::callback::CallbackQuery;
use crate::client::{from_value, take_field, with_timeout, JsonClient};
use crate::endpoints::{self, Endpoint, WECHAT_REDIRECT_FRAGMENT};
use crate::error::{ApiError, ApiResult};
use crate::transport::Transport;
use crate::types::{
    AuthType, AuthorizationInfo, AuthorizerToken, ComponentToken, SessionInfo, UserAccessToken,
    GRANT_AUTHORIZATION_CODE, GRANT_REFRESH_TOKEN,
};

/// Default bound on a single credential fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Component account settings.
#[derive(Debug, Clone)]
pub struct ComponentConfig {
    pub appid: String,
    pub secret: Secret,
    /// Callback token used in message signatures.
    pub token: Secret,
    /// 43-character message encryption key.
    pub encoding_aes_key: Secret,
    pub fetch_timeout: Duration,
}

impl ComponentConfig {
    pub fn new(
        appid: impl Into<String>,
        secret: impl Into<Secret>,
        token: impl Into<Secret>,
        encoding_aes_key: impl Into<Secret>,
    ) -> Self {
        Self {
            appid: appid.into(),
            secret: secret.into(),
            token: token.into(),
            encoding_aes_key: encoding_aes_key.into(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }
}

/// Component API client.
pub struct ComponentClient {
    config: ComponentConfig,
    json: JsonClient,
    broker: Arc<CredentialBroker<ApiError>>,
    crypt: MessageCrypt,
}

impl ComponentClient {
    pub fn new(
        config: ComponentConfig,
        transport: Arc<dyn Transport>,
        broker: Arc<CredentialBroker<ApiError>>,
    ) -> ApiResult<Self> {
        if config.appid.is_empty() {
            return Err(ApiError::config("component appid is empty"));
        }
        let crypt = MessageCrypt::new(
            config.token.clone(),
            config.encoding_aes_key.expose(),
            config.appid.clone(),
        )
        .map_err(|e| ApiError::config(format!("invalid component encoding_aes_key: {}", e)))?;

        Ok(Self {
            config,
            json: JsonClient::new(transport),
            broker,
            crypt,
        })
    }

    pub fn appid(&self) -> &str {
        &self.config.appid
    }

    pub fn broker(&self) -> &Arc<CredentialBroker<ApiError>> {
        &self.broker
    }

    pub(crate) fn json(&self) -> &JsonClient {
        &self.json
    }

    // =========================================================================
    // Credentials
    // =========================================================================

    /// The last verify ticket pushed by the platform.
    pub fn verify_ticket(&self) -> ApiResult<String> {
        let scope = self.broker.scope(&self.config.appid, CredentialKind::VerifyTicket);
        self.broker
            .peek(&scope)?
            .map(|credential| credential.value)
            .ok_or_else(|| {
                ApiError::authorization("no component_verify_ticket has been received yet")
            })
    }

    /// Store a pushed verify ticket. Tickets never expire locally.
    pub fn store_verify_ticket(&self, ticket: &str) -> ApiResult<()> {
        self.broker
            .store(CredentialKind::VerifyTicket, &self.config.appid, ticket, None)?;
        Ok(())
    }

    /// The component access token, fetched once per expiry.
    pub async fn access_token(&self) -> ApiResult<String> {
        let scope = self
            .broker
            .scope(&self.config.appid, CredentialKind::ComponentAppToken);
        let credential = self
            .broker
            .get_or_fetch(&scope, || {
                with_timeout(
                    self.config.fetch_timeout,
                    "component token fetch",
                    self.fetch_access_token(),
                )
            })
            .await?;
        Ok(credential.value)
    }

    /// Drop the cached component token after the platform rejected it.
    pub fn invalidate_access_token(&self) -> ApiResult<()> {
        let scope = self
            .broker
            .scope(&self.config.appid, CredentialKind::ComponentAppToken);
        Ok(self.broker.invalidate(&scope)?)
    }

    async fn fetch_access_token(&self) -> ApiResult<FetchedCredential> {
        let ticket = self.verify_ticket()?;
        let body = json!({
            "component_appid": self.config.appid,
            "component_appsecret": self.config.secret.expose(),
            "component_verify_ticket": ticket,
        });
        let response = self.json.post(endpoints::COMPONENT_TOKEN, &[], &body).await?;
        let token: ComponentToken = from_value(response, "component token")?;
        Ok(FetchedCredential::new(
            token.component_access_token,
            token.expires_in,
        ))
    }

    /// POST with the component token and `component_appid` attached.
    async fn token_post(&self, endpoint: Endpoint, mut body: Value) -> ApiResult<Value> {
        let token = self.access_token().await?;
        if let Value::Object(fields) = &mut body {
            fields.insert("component_appid".into(), self.config.appid.clone().into());
        }
        self.json
            .post(endpoint, &[("component_access_token", token.as_str())], &body)
            .await
    }

    // =========================================================================
    // Callbacks
    // =========================================================================

    /// Verify and decrypt an encrypted callback body.
    pub fn decrypt_callback(
        &self,
        body: &str,
        query: &CallbackQuery,
    ) -> ApiResult<StructuredMessage> {
        let envelope = StructuredMessage::from_xml(body)?;
        let encrypt = envelope.require("Encrypt")?;
        let inner = self.crypt.decrypt(
            encrypt,
            &query.msg_signature,
            &query.timestamp,
            &query.nonce,
        )?;
        Ok(StructuredMessage::from_xml(&inner)?)
    }

    /// Encrypt a passive reply into the signed envelope.
    pub fn encrypt_reply(
        &self,
        reply: &StructuredMessage,
        timestamp: &str,
        nonce: &str,
    ) -> ApiResult<String> {
        let encrypted = self.crypt.encrypt(&reply.to_xml()?, timestamp, nonce)?;
        Ok(encrypted.fields().into_iter().collect::<StructuredMessage>().to_xml()?)
    }

    // =========================================================================
    // Account authorization
    // =========================================================================

    pub async fn create_pre_auth_code(&self) -> ApiResult<String> {
        let response = self
            .token_post(endpoints::COMPONENT_PRE_AUTH_CODE, json!({}))
            .await?;
        match take_field(response, "pre_auth_code")? {
            Value::String(code) => Ok(code),
            other => Err(ApiError::malformed(format!(
                "pre_auth_code is not a string: {}",
                other
            ))),
        }
    }

    /// Create a pre-auth code and build the login page URL for it.
    pub async fn authorize_url(
        &self,
        redirect_uri: &str,
        auth_type: AuthType,
        biz_appid: Option<&str>,
        state: Option<&str>,
    ) -> ApiResult<String> {
        let pre_auth_code = self.create_pre_auth_code().await?;
        self.login_page_url(&pre_auth_code, redirect_uri, auth_type, biz_appid, state)
    }

    /// Login page URL for a pre-auth code.
    ///
    /// `auth_type` is left out when a specific `biz_appid` is requested.
    pub fn login_page_url(
        &self,
        pre_auth_code: &str,
        redirect_uri: &str,
        auth_type: AuthType,
        biz_appid: Option<&str>,
        state: Option<&str>,
    ) -> ApiResult<String> {
        let mut params = vec![
            ("component_appid", self.config.appid.as_str()),
            ("pre_auth_code", pre_auth_code),
            ("redirect_uri", redirect_uri),
        ];
        match biz_appid {
            Some(appid) => params.push(("biz_appid", appid)),
            None => params.push(("auth_type", auth_type.as_str())),
        }
        if let Some(state) = state {
            params.push(("state", state));
        }
        build_url(endpoints::COMPONENT_LOGIN_PAGE, &params, None)
    }

    /// Exchange the `auth_code` from the login page redirect.
    ///
    /// The authorizer token is stored in the broker so later calls can use
    /// [`authorizer_access_token`](Self::authorizer_access_token) without a
    /// refresh.
    pub async fn query_auth(&self, auth_code: Option<&str>) -> ApiResult<AuthorizationInfo> {
        let auth_code = auth_code
            .filter(|code| !code.is_empty())
            .ok_or_else(|| ApiError::authorization("authorization callback carried no auth_code"))?;

        let response = self
            .token_post(
                endpoints::COMPONENT_QUERY_AUTH,
                json!({ "authorization_code": auth_code }),
            )
            .await?;
        let info: AuthorizationInfo =
            from_value(take_field(response, "authorization_info")?, "authorization info")?;

        self.broker.store(
            CredentialKind::AuthorizerAppToken,
            &info.authorizer_appid,
            info.authorizer_access_token.clone(),
            Some(info.expires_in),
        )?;
        info!(
            authorizer_appid = %info.authorizer_appid,
            func_scopes = ?info.func_scope_ids(),
            "Authorizer granted access"
        );
        Ok(info)
    }

    pub async fn refresh_authorizer_token(
        &self,
        authorizer_appid: &str,
        refresh_token: &str,
    ) -> ApiResult<AuthorizerToken> {
        let response = self
            .token_post(
                endpoints::COMPONENT_AUTHORIZER_TOKEN,
                json!({
                    "authorizer_appid": authorizer_appid,
                    "authorizer_refresh_token": refresh_token,
                }),
            )
            .await?;
        from_value(response, "authorizer token")
    }

    /// The authorizer's access token, refreshed through the broker on expiry.
    pub async fn authorizer_access_token(
        &self,
        authorizer_appid: &str,
        refresh_token: &str,
    ) -> ApiResult<String> {
        let scope = self
            .broker
            .scope(authorizer_appid, CredentialKind::AuthorizerAppToken);
        let credential = self
            .broker
            .get_or_fetch(&scope, || async {
                let token = with_timeout(
                    self.config.fetch_timeout,
                    "authorizer token fetch",
                    self.refresh_authorizer_token(authorizer_appid, refresh_token),
                )
                .await?;
                Ok::<_, ApiError>(FetchedCredential::new(
                    token.authorizer_access_token,
                    token.expires_in,
                ))
            })
            .await?;
        Ok(credential.value)
    }

    pub async fn authorizer_info(&self, authorizer_appid: &str) -> ApiResult<Value> {
        let response = self
            .token_post(
                endpoints::COMPONENT_AUTHORIZER_INFO,
                json!({ "authorizer_appid": authorizer_appid }),
            )
            .await?;
        take_field(response, "authorizer_info")
    }

    pub async fn authorizer_option(
        &self,
        authorizer_appid: &str,
        option_name: &str,
    ) -> ApiResult<Value> {
        self.token_post(
            endpoints::COMPONENT_GET_AUTHORIZER_OPTION,
            json!({
                "authorizer_appid": authorizer_appid,
                "option_name": option_name,
            }),
        )
        .await
    }

    pub async fn set_authorizer_option(
        &self,
        authorizer_appid: &str,
        option_name: &str,
        option_value: &str,
    ) -> ApiResult<Value> {
        self.token_post(
            endpoints::COMPONENT_SET_AUTHORIZER_OPTION,
            json!({
                "authorizer_appid": authorizer_appid,
                "option_name": option_name,
                "option_value": option_value,
            }),
        )
        .await
    }

    /// Client for an authorized account.
    pub fn app_client(
        self: &Arc<Self>,
        appid: impl Into<String>,
        access_token: impl Into<String>,
    ) -> AuthorizedAppClient {
        AuthorizedAppClient::new(appid, access_token, Arc::clone(self))
    }

    // =========================================================================
    // Code templates
    // =========================================================================

    pub async fn draft_templates(&self) -> ApiResult<Vec<Value>> {
        self.template_call(endpoints::TEMPLATE_DRAFT_LIST, "draft_list")
            .await
    }

    pub async fn code_templates(&self) -> ApiResult<Vec<Value>> {
        self.template_call(endpoints::CODE_TEMPLATE_LIST, "template_list")
            .await
    }

    pub async fn add_template(&self, draft_id: u64) -> ApiResult<Value> {
        let token = self.access_token().await?;
        self.json
            .post(
                endpoints::TEMPLATE_ADD_FROM_DRAFT,
                &[("access_token", token.as_str())],
                &json!({ "draft_id": draft_id }),
            )
            .await
    }

    async fn template_call(&self, endpoint: Endpoint, list: &str) -> ApiResult<Vec<Value>> {
        let token = self.access_token().await?;
        let response = self
            .json
            .post(endpoint, &[("access_token", token.as_str())], &json!({}))
            .await?;
        match response.get(list) {
            Some(Value::Array(items)) => Ok(items.clone()),
            _ => Ok(Vec::new()),
        }
    }

    // =========================================================================
    // Users of authorized accounts
    // =========================================================================

    pub async fn jscode2session(&self, appid: &str, js_code: &str) -> ApiResult<SessionInfo> {
        let token = self.access_token().await?;
        let response = self
            .json
            .get(
                endpoints::COMPONENT_JSCODE2SESSION,
                &[
                    ("appid", appid),
                    ("js_code", js_code),
                    ("grant_type", GRANT_AUTHORIZATION_CODE),
                    ("component_appid", self.config.appid.as_str()),
                    ("component_access_token", token.as_str()),
                ],
            )
            .await?;
        from_value(response, "session")
    }

    /// OAuth URL for a user of an authorized account.
    pub fn user_authorize_url(
        &self,
        appid: &str,
        redirect_uri: &str,
        scope: &str,
        state: &str,
    ) -> ApiResult<String> {
        build_url(
            endpoints::OAUTH2_AUTHORIZE,
            &[
                ("appid", appid),
                ("redirect_uri", redirect_uri),
                ("response_type", "code"),
                ("scope", scope),
                ("state", state),
                ("component_appid", self.config.appid.as_str()),
            ],
            Some(WECHAT_REDIRECT_FRAGMENT),
        )
    }

    pub async fn user_access_token(&self, appid: &str, code: &str) -> ApiResult<UserAccessToken> {
        self.user_token_call(
            endpoints::COMPONENT_USER_ACCESS_TOKEN,
            appid,
            ("code", code),
            GRANT_AUTHORIZATION_CODE,
        )
        .await
    }

    pub async fn user_refresh_token(
        &self,
        appid: &str,
        refresh_token: &str,
    ) -> ApiResult<UserAccessToken> {
        self.user_token_call(
            endpoints::COMPONENT_USER_REFRESH_TOKEN,
            appid,
            ("refresh_token", refresh_token),
            GRANT_REFRESH_TOKEN,
        )
        .await
    }

    async fn user_token_call(
        &self,
        endpoint: Endpoint,
        appid: &str,
        grant: (&str, &str),
        grant_type: &str,
    ) -> ApiResult<UserAccessToken> {
        let token = self.access_token().await?;
        debug!(appid = %appid, grant_type = %grant_type, "Requesting user token");
        let response = self
            .json
            .get(
                endpoint,
                &[
                    ("appid", appid),
                    grant,
                    ("grant_type", grant_type),
                    ("component_appid", self.config.appid.as_str()),
                    ("component_access_token", token.as_str()),
                ],
            )
            .await?;
        from_value(response, "user token")
    }
}

impl std::fmt::Debug for ComponentClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComponentClient")
            .field("appid", &self.config.appid)
            .field("namespace", &self.broker.namespace())
            .finish()
    }
}

/// Build a browser redirect URL with encoded query parameters.
pub(crate) fn build_url(
    base: &str,
    params: &[(&str, &str)],
    fragment: Option<&str>,
) -> ApiResult<String> {
    let mut url = reqwest::Url::parse_with_params(base, params)
        .map_err(|e| ApiError::invalid_request(format!("cannot build URL: {}", e)))?;
    url.set_fragment(fragment);
    Ok(url.into())
}
