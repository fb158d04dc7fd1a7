//! Endpoint catalogue.
//!
//! Each endpoint carries its response dialect so the caller never has to
//! guess from the body which classifier applies.

use crate::fault::Protocol;

/// A platform endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint {
    pub url: &'static str,
    pub protocol: Protocol,
}

impl Endpoint {
    pub const fn json(url: &'static str) -> Self {
        Self {
            url,
            protocol: Protocol::Json,
        }
    }

    pub const fn record(url: &'static str) -> Self {
        Self {
            url,
            protocol: Protocol::Record,
        }
    }

    pub const fn binary(url: &'static str) -> Self {
        Self {
            url,
            protocol: Protocol::Binary,
        }
    }
}

// =============================================================================
// Secret app
// =============================================================================

pub const APP_TOKEN: Endpoint = Endpoint::json("https://api.weixin.qq.com/cgi-bin/token");
pub const SNS_OAUTH2_ACCESS_TOKEN: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/sns/oauth2/access_token");
pub const SNS_OAUTH2_REFRESH_TOKEN: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/sns/oauth2/refresh_token");
pub const SNS_AUTH: Endpoint = Endpoint::json("https://api.weixin.qq.com/sns/auth");
pub const SNS_JSCODE2SESSION: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/sns/jscode2session");
pub const SNS_USERINFO: Endpoint = Endpoint::json("https://api.weixin.qq.com/sns/userinfo");

// =============================================================================
// Any app with an access token
// =============================================================================

pub const UNIFORM_SEND: Endpoint = Endpoint::json(
    "https://api.weixin.qq.com/cgi-bin/message/wxopen/template/uniform_send",
);
pub const GET_WXA_CODE: Endpoint = Endpoint::binary("https://api.weixin.qq.com/wxa/getwxacode");
pub const CREATE_WXA_QRCODE: Endpoint =
    Endpoint::binary("https://api.weixin.qq.com/cgi-bin/wxaapp/createwxaqrcode");

// =============================================================================
// Authorized app
// =============================================================================

pub const OPEN_CREATE: Endpoint = Endpoint::json("https://api.weixin.qq.com/cgi-bin/open/create");
pub const OPEN_BIND: Endpoint = Endpoint::json("https://api.weixin.qq.com/cgi-bin/open/bind");
pub const OPEN_UNBIND: Endpoint = Endpoint::json("https://api.weixin.qq.com/cgi-bin/open/unbind");
pub const OPEN_GET: Endpoint = Endpoint::json("https://api.weixin.qq.com/cgi-bin/open/get");
pub const MODIFY_DOMAIN: Endpoint = Endpoint::json("https://api.weixin.qq.com/wxa/modify_domain");
pub const GET_INDUSTRY: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/cgi-bin/template/get_industry");
pub const GET_ALL_PRIVATE_TEMPLATE: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/cgi-bin/template/get_all_private_template");
pub const TEMPLATE_LIBRARY_LIST: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/cgi-bin/wxopen/template/library/list");
pub const TEMPLATE_LIBRARY_GET: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/cgi-bin/wxopen/template/library/get");
pub const TEMPLATE_ADD: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/cgi-bin/wxopen/template/add");
pub const TEMPLATE_DEL: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/cgi-bin/wxopen/template/del");
pub const TEMPLATE_LIST: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/cgi-bin/wxopen/template/list");

// =============================================================================
// Component
// =============================================================================

pub const COMPONENT_TOKEN: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/cgi-bin/component/api_component_token");
pub const COMPONENT_PRE_AUTH_CODE: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/cgi-bin/component/api_create_preauthcode");
pub const COMPONENT_QUERY_AUTH: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/cgi-bin/component/api_query_auth");
pub const COMPONENT_AUTHORIZER_TOKEN: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/cgi-bin/component/api_authorizer_token");
pub const COMPONENT_AUTHORIZER_INFO: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/cgi-bin/component/api_get_authorizer_info");
pub const COMPONENT_SET_AUTHORIZER_OPTION: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/cgi-bin/component/api_set_authorizer_option");
pub const COMPONENT_GET_AUTHORIZER_OPTION: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/cgi-bin/component/api_get_authorizer_option");
pub const COMPONENT_JSCODE2SESSION: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/sns/component/jscode2session");
pub const COMPONENT_USER_ACCESS_TOKEN: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/sns/oauth2/component/access_token");
pub const COMPONENT_USER_REFRESH_TOKEN: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/sns/oauth2/component/refresh_token");
pub const TEMPLATE_DRAFT_LIST: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/wxa/gettemplatedraftlist");
pub const TEMPLATE_ADD_FROM_DRAFT: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/wxa/addtotemplate");
pub const CODE_TEMPLATE_LIST: Endpoint =
    Endpoint::json("https://api.weixin.qq.com/wxa/gettemplatelist");

// =============================================================================
// Merchant
// =============================================================================

pub const UNIFIED_ORDER: Endpoint =
    Endpoint::record("https://api.mch.weixin.qq.com/pay/unifiedorder");
pub const ORDER_QUERY: Endpoint = Endpoint::record("https://api.mch.weixin.qq.com/pay/orderquery");

// =============================================================================
// Browser redirects
// =============================================================================

pub const COMPONENT_LOGIN_PAGE: &str = "https://mp.weixin.qq.com/cgi-bin/componentloginpage";
pub const OAUTH2_AUTHORIZE: &str = "https://open.weixin.qq.com/connect/oauth2/authorize";
pub const OAUTH2_QRCONNECT: &str = "https://open.weixin.qq.com/connect/qrconnect";

/// Fragment the platform requires on user-facing OAuth redirects.
pub const WECHAT_REDIRECT_FRAGMENT: &str = "wechat_redirect";
