//! Print an access token command.

use tracing::info;
use wxbroker_api::AppClient;
use wxbroker_cache::{Clock, CredentialKind, SystemClock};

use crate::cli::TokenTarget;
use crate::context::BrokerContext;
use crate::error::CliResult;
use crate::output::{OutputFormat, Render, TokenOutput};

/// Execute the token command.
pub async fn token(
    ctx: &BrokerContext,
    format: OutputFormat,
    target: TokenTarget,
) -> CliResult<String> {
    let (kind, appid, access_token, credential_kind) = match target {
        TokenTarget::App { refresh } => {
            let app = ctx.app()?;
            if refresh {
                app.invalidate_access_token()?;
            }
            let token = app.access_token().await?;
            ("app", app.appid().to_string(), token, CredentialKind::SecretAppToken)
        }
        TokenTarget::Component { refresh } => {
            let component = ctx.component()?;
            if refresh {
                component.invalidate_access_token()?;
            }
            let token = component.access_token().await?;
            (
                "component",
                component.appid().to_string(),
                token,
                CredentialKind::ComponentAppToken,
            )
        }
        TokenTarget::Authorizer {
            appid,
            refresh_token,
            refresh,
        } => {
            let component = ctx.component()?;
            if refresh {
                let scope = ctx.broker.scope(&appid, CredentialKind::AuthorizerAppToken);
                ctx.broker.invalidate(&scope)?;
            }
            let token = component
                .authorizer_access_token(&appid, &refresh_token)
                .await?;
            ("authorizer", appid, token, CredentialKind::AuthorizerAppToken)
        }
    };

    let scope = ctx.broker.scope(&appid, credential_kind);
    let expires_in = ctx
        .broker
        .peek(&scope)?
        .and_then(|credential| credential.remaining(SystemClock.now()));
    info!(kind = kind, appid = %appid, "Access token ready");

    let output = TokenOutput {
        kind: kind.to_string(),
        appid,
        access_token,
        expires_in,
    };
    Ok(output.render(format))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use crate::error::CliError;
    use serde_json::{json, Value};
    use wxbroker_api::endpoints::{APP_TOKEN, COMPONENT_AUTHORIZER_TOKEN, COMPONENT_TOKEN};
    use wxbroker_api::ApiError;
    use wxbroker_test_utils::{MockTransport, TEST_APPID};

    #[tokio::test]
    async fn test_app_token_is_fetched_then_cached() {
        let mock = MockTransport::new();
        mock.always_json(
            APP_TOKEN.url,
            json!({ "access_token": "app-token", "expires_in": 7200 }),
        );
        let ctx = context(&mock);

        let output = token(&ctx, OutputFormat::Json, TokenTarget::App { refresh: false })
            .await
            .unwrap();
        let json: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["access_token"], "app-token");
        assert_eq!(json["appid"], TEST_APPID);
        assert!(json["expires_in"].as_u64().unwrap() <= 7200);

        token(&ctx, OutputFormat::Human, TokenTarget::App { refresh: false })
            .await
            .unwrap();
        assert_eq!(mock.request_count(APP_TOKEN.url), 1);

        token(&ctx, OutputFormat::Human, TokenTarget::App { refresh: true })
            .await
            .unwrap();
        assert_eq!(mock.request_count(APP_TOKEN.url), 2);
    }

    #[tokio::test]
    async fn test_component_token_needs_ticket() {
        let mock = MockTransport::new();
        let ctx = context(&mock);

        let err = token(&ctx, OutputFormat::Human, TokenTarget::Component { refresh: false })
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::Api(ApiError::Authorization(_))));
        assert_eq!(mock.request_count(COMPONENT_TOKEN.url), 0);
    }

    #[tokio::test]
    async fn test_authorizer_token_refreshes_through_component() {
        let mock = MockTransport::new();
        mock.respond_json(
            COMPONENT_TOKEN.url,
            json!({ "component_access_token": "component-token", "expires_in": 7200 }),
        );
        mock.respond_json(
            COMPONENT_AUTHORIZER_TOKEN.url,
            json!({
                "authorizer_access_token": "authorizer-token",
                "expires_in": 7200,
                "authorizer_refresh_token": "refresh@@@next"
            }),
        );
        let ctx = context(&mock);
        ctx.component().unwrap().store_verify_ticket("ticket@@@1").unwrap();

        let output = token(
            &ctx,
            OutputFormat::Json,
            TokenTarget::Authorizer {
                appid: "wxd0123456789abcde".into(),
                refresh_token: "refresh@@@first".into(),
                refresh: false,
            },
        )
        .await
        .unwrap();
        let json: Value = serde_json::from_str(&output).unwrap();
        assert_eq!(json["kind"], "authorizer");
        assert_eq!(json["access_token"], "authorizer-token");

        let sent = mock.last_request().unwrap().body_json();
        assert_eq!(sent["authorizer_refresh_token"], "refresh@@@first");
    }
}
