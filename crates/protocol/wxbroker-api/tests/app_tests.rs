//! Secret and authorized app client tests

use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use serde_json::{json, Value};
use wxbroker_api::endpoints::{
    APP_TOKEN, GET_WXA_CODE, OPEN_GET, SNS_AUTH, SNS_JSCODE2SESSION, SNS_USERINFO,
    TEMPLATE_LIBRARY_LIST, TEMPLATE_LIST, UNIFORM_SEND,
};
use wxbroker_api::{
    ApiError, AppClient, AppConfig, AuthorizedAppClient, ComponentClient, FaultCode, OpenBinding,
    SecretAppClient, UniformMessage, WxaCode,
};
use wxbroker_test_utils::{
    component_config, dyn_transport, encrypted_user_data, test_broker, ManualClock, MockTransport,
    TEST_APPID, TEST_APP_SECRET,
};

fn secret_app(mock: &MockTransport) -> SecretAppClient {
    let broker = test_broker(ManualClock::new(1_700_000_000));
    SecretAppClient::new(AppConfig::new(TEST_APPID, TEST_APP_SECRET), dyn_transport(mock), broker)
        .unwrap()
}

fn authorized_app(mock: &MockTransport) -> AuthorizedAppClient {
    let broker = test_broker(ManualClock::new(1_700_000_000));
    let component =
        Arc::new(ComponentClient::new(component_config(), dyn_transport(mock), broker).unwrap());
    component.app_client("wxauthorizer", "authorizer-token")
}

fn page(start: usize, len: usize) -> Value {
    let list: Vec<Value> = (start..start + len)
        .map(|i| json!({ "id": format!("AT{:04}", i), "title": "order shipped" }))
        .collect();
    json!({ "errcode": 0, "errmsg": "ok", "list": list })
}

// =============================================================================
// Secret app
// =============================================================================

/// Empty credentials are refused at construction
#[test]
fn secret_app_requires_credentials() {
    let broker = test_broker(ManualClock::new(0));
    let err = SecretAppClient::new(
        AppConfig::new(TEST_APPID, ""),
        dyn_transport(&MockTransport::new()),
        broker,
    )
    .unwrap_err();
    assert!(matches!(err, ApiError::Config(_)));
}

/// The app token is fetched once and reused
#[tokio::test(start_paused = true)]
async fn app_token_is_fetched_once() {
    let mock = MockTransport::new().with_delay(Duration::from_millis(100));
    mock.respond_json(APP_TOKEN.url, json!({ "access_token": "app-token", "expires_in": 7200 }));
    let app = secret_app(&mock);

    let tokens = join_all((0..5).map(|_| app.access_token())).await;
    assert!(tokens.into_iter().all(|token| token.unwrap() == "app-token"));
    assert_eq!(app.access_token().await.unwrap(), "app-token");
    assert_eq!(mock.request_count(APP_TOKEN.url), 1);

    let request = mock.last_request().unwrap();
    assert_eq!(request.query_value("grant_type"), Some("client_credential"));
    assert_eq!(request.query_value("appid"), Some(TEST_APPID));
    assert_eq!(request.query_value("secret"), Some(TEST_APP_SECRET));
}

/// A rejected token is dropped and refetched after invalidation
#[tokio::test]
async fn invalid_token_fault_then_refetch() {
    let mock = MockTransport::new();
    mock.respond_json(APP_TOKEN.url, json!({ "access_token": "stale", "expires_in": 7200 }))
        .respond_json(APP_TOKEN.url, json!({ "access_token": "fresh", "expires_in": 7200 }))
        .respond_json(UNIFORM_SEND.url, json!({ "errcode": 40001, "errmsg": "invalid credential" }))
        .respond_json(UNIFORM_SEND.url, json!({ "errcode": 0, "errmsg": "ok" }));
    let app = secret_app(&mock);
    let message = UniformMessage::weapp("tpl-1", "pages/index", "form-1", json!({}), "");

    let err = app.send_uniform_message("openid-1", &message).await.unwrap_err();
    assert!(err.is_token_invalid());
    app.invalidate_access_token().unwrap();

    app.send_uniform_message("openid-1", &message).await.unwrap();
    let sends = mock.requests_to(UNIFORM_SEND.url);
    assert_eq!(sends[0].query_value("access_token"), Some("stale"));
    assert_eq!(sends[1].query_value("access_token"), Some("fresh"));
    assert_eq!(sends[1].body_json()["weapp_template_msg"]["template_id"], "tpl-1");
    assert_eq!(sends[1].body_json()["touser"], "openid-1");
}

/// A rejected user token reads as "not authorized", not as an error
#[tokio::test]
async fn check_auth_reports_rejection_as_false() {
    let mock = MockTransport::new();
    mock.respond_json(SNS_AUTH.url, json!({ "errcode": 0, "errmsg": "ok" }))
        .respond_json(SNS_AUTH.url, json!({ "errcode": 40003, "errmsg": "invalid openid" }))
        .respond_error(SNS_AUTH.url, ApiError::transport("timeout"));
    let app = secret_app(&mock);

    assert!(app.check_auth("openid", "token").await.unwrap());
    assert!(!app.check_auth("openid", "token").await.unwrap());
    assert!(app.check_auth("openid", "token").await.is_err());
}

/// OAuth URLs carry the platform's redirect fragment
#[test]
fn oauth_urls_end_with_redirect_fragment() {
    let app = secret_app(&MockTransport::new());
    let url = app
        .oauth2_authorize_url("https://example.com/cb?x=1", "snsapi_userinfo", "st")
        .unwrap();
    assert!(url.contains("redirect_uri=https%3A%2F%2Fexample.com%2Fcb%3Fx%3D1"));
    assert!(url.ends_with("#wechat_redirect"));

    let qr = app.qrconnect_url("https://example.com/cb", "snsapi_login", "st").unwrap();
    assert!(qr.starts_with("https://open.weixin.qq.com/connect/qrconnect?"));
}

/// A redirect without a code is refused before any call
#[tokio::test]
async fn query_auth_requires_code() {
    let mock = MockTransport::new();
    let err = secret_app(&mock).query_auth(None).await.unwrap_err();
    assert!(matches!(err, ApiError::Authorization(_)));
    assert!(mock.requests().is_empty());
}

/// Mini program login exchanges the code for a session
#[tokio::test]
async fn jscode2session_returns_session() {
    let mock = MockTransport::new();
    mock.respond_json(
        SNS_JSCODE2SESSION.url,
        json!({ "openid": "o-1", "session_key": "c2Vzc2lvbg==", "unionid": "u-1" }),
    );

    let session = secret_app(&mock).jscode2session("js-code").await.unwrap();
    assert_eq!(session.openid, "o-1");
    assert_eq!(session.unionid.as_deref(), Some("u-1"));
    assert!(!format!("{:?}", session).contains("c2Vzc2lvbg=="));
    assert_eq!(mock.last_request().unwrap().query_value("js_code"), Some("js-code"));
}

/// User info defaults to the zh_CN language
#[tokio::test]
async fn user_info_defaults_language() {
    let mock = MockTransport::new();
    mock.respond_json(SNS_USERINFO.url, json!({ "openid": "o-1", "nickname": "Band" }));

    let info = secret_app(&mock).user("o-1", "user-token").user_info(None).await.unwrap();
    assert_eq!(info["nickname"], "Band");
    let request = mock.last_request().unwrap();
    assert_eq!(request.query_value("lang"), Some("zh_CN"));
    assert_eq!(request.query_value("access_token"), Some("user-token"));
}

/// User data must carry this app's watermark
#[test]
fn decrypt_data_checks_watermark() {
    let app = secret_app(&MockTransport::new());

    let (data, key, iv) = encrypted_user_data(&json!({
        "phoneNumber": "13580006666",
        "watermark": { "appid": TEST_APPID, "timestamp": 1477314187 }
    }));
    let decrypted = app.decrypt_data(&data, &key, &iv).unwrap();
    assert_eq!(decrypted["phoneNumber"], "13580006666");
    assert!(!decrypted.contains_key("watermark"));

    let (data, key, iv) = encrypted_user_data(&json!({
        "phoneNumber": "13580006666",
        "watermark": { "appid": "wxsomeoneelse", "timestamp": 1477314187 }
    }));
    let err = app.decrypt_data(&data, &key, &iv).unwrap_err();
    assert!(matches!(err, ApiError::Integrity(_)));
}

// =============================================================================
// Authorized app
// =============================================================================

/// An unbound account is a value, not an error
#[tokio::test]
async fn open_get_not_bound_is_unbound() {
    let mock = MockTransport::new();
    mock.respond_json(OPEN_GET.url, json!({ "errcode": 89002, "errmsg": "open not exists" }))
        .respond_json(OPEN_GET.url, json!({ "errcode": 0, "errmsg": "ok", "open_appid": "wxopen" }))
        .respond_json(OPEN_GET.url, json!({ "errcode": 40013, "errmsg": "invalid appid" }));
    let app = authorized_app(&mock);

    assert_eq!(app.open_get().await.unwrap(), OpenBinding::Unbound);
    assert_eq!(app.open_get().await.unwrap().open_appid(), Some("wxopen"));
    let err = app.open_get().await.unwrap_err();
    assert_eq!(err.fault_code(), Some(&FaultCode::Int(40013)));

    let request = mock.last_request().unwrap();
    assert_eq!(request.query_value("access_token"), Some("authorizer-token"));
    assert_eq!(request.body_json()["appid"], "wxauthorizer");
}

/// Paging continues until a short page
#[tokio::test]
async fn template_list_collects_all_pages() {
    let mock = MockTransport::new();
    mock.respond_json(TEMPLATE_LIBRARY_LIST.url, page(0, 20))
        .respond_json(TEMPLATE_LIBRARY_LIST.url, page(20, 20))
        .respond_json(TEMPLATE_LIBRARY_LIST.url, page(40, 3));
    let app = authorized_app(&mock);

    let items = app.template_library_list().await.unwrap();
    assert_eq!(items.len(), 43);
    assert_eq!(items[42]["id"], "AT0042");

    let offsets: Vec<Value> = mock
        .requests_to(TEMPLATE_LIBRARY_LIST.url)
        .iter()
        .map(|request| request.body_json()["offset"].clone())
        .collect();
    assert_eq!(offsets, vec![json!(0), json!(20), json!(40)]);
}

/// A response without a list ends paging
#[tokio::test]
async fn template_list_without_list_is_empty() {
    let mock = MockTransport::new();
    mock.respond_json(TEMPLATE_LIST.url, json!({ "errcode": 0, "errmsg": "ok" }));

    let items = authorized_app(&mock).template_list().await.unwrap();
    assert!(items.is_empty());
    assert_eq!(mock.request_count(TEMPLATE_LIST.url), 1);
}

/// Code images come back as raw bytes
#[tokio::test]
async fn wxa_code_returns_image_bytes() {
    let mock = MockTransport::new();
    let png = vec![0x89, b'P', b'N', b'G', 0x0d, 0x0a];
    mock.respond_bytes(GET_WXA_CODE.url, png.clone())
        .respond_json(GET_WXA_CODE.url, json!({ "errcode": 41030, "errmsg": "invalid page" }));
    let app = authorized_app(&mock);

    let code = WxaCode::new("pages/index").with_width(280);
    assert_eq!(app.get_wxa_code(&code).await.unwrap(), png);
    assert_eq!(mock.last_request().unwrap().body_json()["width"], 280);

    let err = app.get_wxa_code(&code).await.unwrap_err();
    assert_eq!(err.fault_code(), Some(&FaultCode::Int(41030)));
}

/// Watermark mismatches name both appids
#[test]
fn authorized_app_decrypt_uses_own_appid() {
    let app = authorized_app(&MockTransport::new());
    let (data, key, iv) = encrypted_user_data(&json!({
        "openId": "o-1",
        "watermark": { "appid": "wxauthorizer", "timestamp": 1 }
    }));
    assert_eq!(app.decrypt_data(&data, &key, &iv).unwrap()["openId"], "o-1");

    let (data, key, iv) = encrypted_user_data(&json!({
        "openId": "o-1",
        "watermark": { "appid": TEST_APPID, "timestamp": 1 }
    }));
    let err = app.decrypt_data(&data, &key, &iv).unwrap_err();
    assert!(matches!(err, ApiError::Integrity(_)));
    assert!(err.to_string().contains("wxauthorizer"));
    assert!(err.to_string().contains(TEST_APPID));
}
