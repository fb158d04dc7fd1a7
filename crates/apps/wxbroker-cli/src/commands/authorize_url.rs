//! Build authorization URLs command.

use crate::cli::AuthorizeKind;
use crate::context::BrokerContext;
use crate::error::CliResult;
use crate::output::{AuthorizeUrlOutput, OutputFormat, Render};

/// Execute the authorize-url command.
///
/// The component login page needs a fresh pre-auth code, so it calls the
/// platform; the OAuth URLs are built locally.
pub async fn authorize_url(
    ctx: &BrokerContext,
    format: OutputFormat,
    kind: AuthorizeKind,
) -> CliResult<String> {
    let (kind, url) = match kind {
        AuthorizeKind::Component {
            redirect_uri,
            auth_type,
            biz_appid,
            state,
        } => {
            let url = ctx
                .component()?
                .authorize_url(
                    &redirect_uri,
                    auth_type.into(),
                    biz_appid.as_deref(),
                    state.as_deref(),
                )
                .await?;
            ("component", url)
        }
        AuthorizeKind::Oauth {
            redirect_uri,
            scope,
            state,
            appid: Some(appid),
        } => {
            let url = ctx
                .component()?
                .user_authorize_url(&appid, &redirect_uri, &scope, &state)?;
            ("oauth", url)
        }
        AuthorizeKind::Oauth {
            redirect_uri,
            scope,
            state,
            appid: None,
        } => {
            let url = ctx.app()?.oauth2_authorize_url(&redirect_uri, &scope, &state)?;
            ("oauth", url)
        }
        AuthorizeKind::Qrconnect {
            redirect_uri,
            scope,
            state,
        } => {
            let url = ctx.app()?.qrconnect_url(&redirect_uri, &scope, &state)?;
            ("qrconnect", url)
        }
    };

    let output = AuthorizeUrlOutput {
        kind: kind.to_string(),
        url,
    };
    Ok(output.render(format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::AuthTypeArg;
    use crate::commands::test_support::context;
    use serde_json::{json, Value};
    use wxbroker_api::endpoints::{COMPONENT_PRE_AUTH_CODE, COMPONENT_TOKEN};
    use wxbroker_test_utils::{MockTransport, TEST_APPID, TEST_COMPONENT_APPID};

    fn url_of(output: &str) -> String {
        let json: Value = serde_json::from_str(output).unwrap();
        json["url"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn test_component_login_page() {
        let mock = MockTransport::new();
        mock.respond_json(
            COMPONENT_TOKEN.url,
            json!({ "component_access_token": "component-token", "expires_in": 7200 }),
        );
        mock.respond_json(
            COMPONENT_PRE_AUTH_CODE.url,
            json!({ "pre_auth_code": "preauthcode@@@abc", "expires_in": 600 }),
        );
        let ctx = context(&mock);
        ctx.component().unwrap().store_verify_ticket("ticket@@@1").unwrap();

        let output = authorize_url(
            &ctx,
            OutputFormat::Json,
            AuthorizeKind::Component {
                redirect_uri: "https://example.com/authorized".into(),
                auth_type: AuthTypeArg::Mini,
                biz_appid: None,
                state: None,
            },
        )
        .await
        .unwrap();

        let url = url_of(&output);
        assert!(url.starts_with("https://mp.weixin.qq.com/cgi-bin/componentloginpage?"));
        assert!(url.contains(&format!("component_appid={}", TEST_COMPONENT_APPID)));
        assert!(url.contains("pre_auth_code=preauthcode%40%40%40abc"));
        assert!(url.contains("auth_type=2"));
    }

    #[tokio::test]
    async fn test_oauth_url_for_app() {
        let mock = MockTransport::new();
        let ctx = context(&mock);

        let output = authorize_url(
            &ctx,
            OutputFormat::Json,
            AuthorizeKind::Oauth {
                redirect_uri: "https://example.com/cb".into(),
                scope: "snsapi_userinfo".into(),
                state: "s1".into(),
                appid: None,
            },
        )
        .await
        .unwrap();

        let url = url_of(&output);
        assert!(url.starts_with("https://open.weixin.qq.com/connect/oauth2/authorize?"));
        assert!(url.contains(&format!("appid={}", TEST_APPID)));
        assert!(url.ends_with("#wechat_redirect"));
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_oauth_url_for_authorized_account_names_component() {
        let ctx = context(&MockTransport::new());

        let output = authorize_url(
            &ctx,
            OutputFormat::Json,
            AuthorizeKind::Oauth {
                redirect_uri: "https://example.com/cb".into(),
                scope: "snsapi_base".into(),
                state: String::new(),
                appid: Some("wxd0123456789abcde".into()),
            },
        )
        .await
        .unwrap();

        let url = url_of(&output);
        assert!(url.contains("appid=wxd0123456789abcde"));
        assert!(url.contains(&format!("component_appid={}", TEST_COMPONENT_APPID)));
    }

    #[tokio::test]
    async fn test_qrconnect_url() {
        let ctx = context(&MockTransport::new());

        let output = authorize_url(
            &ctx,
            OutputFormat::Human,
            AuthorizeKind::Qrconnect {
                redirect_uri: "https://example.com/login".into(),
                scope: "snsapi_login".into(),
                state: String::new(),
            },
        )
        .await
        .unwrap();
        assert!(output.contains("https://open.weixin.qq.com/connect/qrconnect?"));
    }
}
