//! HTTP transport.
//!
//! Clients talk to the platform through [`Transport`] so tests can script
//! responses without a network. [`HttpTransport`] is the `reqwest` backed
//! implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::{ApiError, ApiResult};

/// Content type for JSON request bodies.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Content type for XML record bodies.
pub const CONTENT_TYPE_XML: &str = "text/xml";

/// Query parameters. Values may carry tokens and are never logged.
pub type Query<'a> = [(&'a str, &'a str)];

/// Request/response byte transport.
///
/// Implementations return the response body for 2xx statuses and a
/// [`ApiError::Transport`] for network failures, timeouts and other statuses.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, query: &Query<'_>) -> ApiResult<Vec<u8>>;

    async fn post(
        &self,
        url: &str,
        query: &Query<'_>,
        content_type: &str,
        body: Vec<u8>,
    ) -> ApiResult<Vec<u8>>;
}

/// HTTP client settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Whole-request timeout in seconds.
    pub timeout_secs: u64,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: format!("wxbroker/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// `reqwest` transport.
#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    user_agent: String,
}

impl HttpTransport {
    pub fn new(config: &HttpConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| ApiError::config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            user_agent: config.user_agent.clone(),
        })
    }

    async fn send(&self, request: reqwest::RequestBuilder, url: &str) -> ApiResult<Vec<u8>> {
        let response = request
            .header(USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %url, status = %status, "Platform returned non-success status");
            return Err(ApiError::transport(format!(
                "{} returned {}: {}",
                url, status, body
            )));
        }

        let body = response.bytes().await?;
        debug!(url = %url, bytes = body.len(), "Received response");
        Ok(body.to_vec())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get(&self, url: &str, query: &Query<'_>) -> ApiResult<Vec<u8>> {
        debug!(url = %url, "GET");
        self.send(self.client.get(url).query(query), url).await
    }

    async fn post(
        &self,
        url: &str,
        query: &Query<'_>,
        content_type: &str,
        body: Vec<u8>,
    ) -> ApiResult<Vec<u8>> {
        debug!(url = %url, content_type = %content_type, "POST");
        let request = self
            .client
            .post(url)
            .query(query)
            .header(CONTENT_TYPE, content_type)
            .body(body);
        self.send(request, url).await
    }
}
