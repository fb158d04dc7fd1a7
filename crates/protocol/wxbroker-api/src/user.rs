//! Calls made on behalf of a user with their OAuth token.

use serde_json::Value;

use crate::client::JsonClient;
use crate::endpoints;
use crate::error::ApiResult;
use crate::types::DEFAULT_LANG;

/// Client acting for one user.
#[derive(Clone)]
pub struct UserClient {
    openid: String,
    access_token: String,
    json: JsonClient,
}

impl UserClient {
    pub fn new(openid: impl Into<String>, access_token: impl Into<String>, json: JsonClient) -> Self {
        Self {
            openid: openid.into(),
            access_token: access_token.into(),
            json,
        }
    }

    pub fn openid(&self) -> &str {
        &self.openid
    }

    /// Profile of the user (`snsapi_userinfo` scope). `lang` defaults to `zh_CN`.
    pub async fn user_info(&self, lang: Option<&str>) -> ApiResult<Value> {
        self.json
            .get(
                endpoints::SNS_USERINFO,
                &[
                    ("openid", self.openid.as_str()),
                    ("access_token", self.access_token.as_str()),
                    ("lang", lang.unwrap_or(DEFAULT_LANG)),
                ],
            )
            .await
    }
}

impl std::fmt::Debug for UserClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserClient")
            .field("openid", &self.openid)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}
