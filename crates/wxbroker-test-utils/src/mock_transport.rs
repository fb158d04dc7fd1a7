//! Mock implementation of the `Transport` trait for testing.
//!
//! Responses are scripted per URL and consumed in order. Every request is
//! recorded so tests can assert on what was sent.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use wxbroker_api::transport::{Query, Transport};
use wxbroker_api::{ApiError, ApiResult};
use wxbroker_wire::StructuredMessage;

/// HTTP method of a recorded request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A request the mock received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    /// Value of a query parameter.
    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Body decoded as JSON. Panics if it is not JSON.
    pub fn body_json(&self) -> Value {
        serde_json::from_slice(&self.body).expect("request body is not JSON")
    }

    /// Body decoded as an XML record. Panics if it is not a record.
    pub fn body_record(&self) -> StructuredMessage {
        let text = std::str::from_utf8(&self.body).expect("request body is not UTF-8");
        StructuredMessage::from_xml(text).expect("request body is not an XML record")
    }
}

struct MockTransportInner {
    /// Scripted responses: url -> queue.
    scripted: HashMap<String, VecDeque<ApiResult<Vec<u8>>>>,
    /// Response used once a url's queue is empty.
    sticky: HashMap<String, ApiResult<Vec<u8>>>,
    /// Record of all requests.
    requests: Vec<RecordedRequest>,
    /// Delay before each response.
    delay: Option<Duration>,
}

/// A mock implementation of the `Transport` trait for testing.
///
/// Uses `Arc<RwLock<...>>` internally, so it is cheap to clone and all
/// clones share the same state. A request with no scripted response fails
/// with a transport error.
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<RwLock<MockTransportInner>>,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(MockTransportInner {
                scripted: HashMap::new(),
                sticky: HashMap::new(),
                requests: Vec::new(),
                delay: None,
            })),
        }
    }

    /// Wait this long before answering each request.
    ///
    /// With tokio's paused clock this keeps requests in flight until the
    /// test advances time.
    pub fn with_delay(self, delay: Duration) -> Self {
        self.inner.write().unwrap().delay = Some(delay);
        self
    }

    // =========================================================================
    // Scripting
    // =========================================================================

    /// Queue a raw response body for `url`.
    pub fn respond_bytes(&self, url: &str, body: Vec<u8>) -> &Self {
        self.push(url, Ok(body))
    }

    /// Queue a JSON response for `url`.
    pub fn respond_json(&self, url: &str, body: Value) -> &Self {
        self.push(url, Ok(body.to_string().into_bytes()))
    }

    /// Queue an XML response for `url`.
    pub fn respond_xml(&self, url: &str, body: impl Into<String>) -> &Self {
        self.push(url, Ok(body.into().into_bytes()))
    }

    /// Queue a transport-level failure for `url`.
    pub fn respond_error(&self, url: &str, error: ApiError) -> &Self {
        self.push(url, Err(error))
    }

    /// Answer every request to `url` with this JSON once the queue is empty.
    pub fn always_json(&self, url: &str, body: Value) -> &Self {
        self.inner
            .write()
            .unwrap()
            .sticky
            .insert(url.to_string(), Ok(body.to_string().into_bytes()));
        self
    }

    fn push(&self, url: &str, response: ApiResult<Vec<u8>>) -> &Self {
        self.inner
            .write()
            .unwrap()
            .scripted
            .entry(url.to_string())
            .or_default()
            .push_back(response);
        self
    }

    // =========================================================================
    // Assertion Helpers
    // =========================================================================

    /// All requests, in arrival order.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.inner.read().unwrap().requests.clone()
    }

    /// Requests sent to `url`.
    pub fn requests_to(&self, url: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.url == url)
            .collect()
    }

    /// Number of requests sent to `url`.
    pub fn request_count(&self, url: &str) -> usize {
        self.inner
            .read()
            .unwrap()
            .requests
            .iter()
            .filter(|request| request.url == url)
            .count()
    }

    /// Most recent request, if any.
    pub fn last_request(&self) -> Option<RecordedRequest> {
        self.inner.read().unwrap().requests.last().cloned()
    }

    async fn answer(&self, request: RecordedRequest) -> ApiResult<Vec<u8>> {
        let url = request.url.clone();
        let (delay, response) = {
            let mut inner = self.inner.write().unwrap();
            inner.requests.push(request);
            let response = match inner.scripted.get_mut(&url).and_then(VecDeque::pop_front) {
                Some(response) => response,
                None => inner.sticky.get(&url).cloned().unwrap_or_else(|| {
                    Err(ApiError::transport(format!("no scripted response for {}", url)))
                }),
            };
            (inner.delay, response)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        response
    }
}

fn owned_query(query: &Query<'_>) -> Vec<(String, String)> {
    query
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect()
}

#[async_trait]
impl Transport for MockTransport {
    async fn get(&self, url: &str, query: &Query<'_>) -> ApiResult<Vec<u8>> {
        self.answer(RecordedRequest {
            method: Method::Get,
            url: url.to_string(),
            query: owned_query(query),
            content_type: None,
            body: Vec::new(),
        })
        .await
    }

    async fn post(
        &self,
        url: &str,
        query: &Query<'_>,
        content_type: &str,
        body: Vec<u8>,
    ) -> ApiResult<Vec<u8>> {
        self.answer(RecordedRequest {
            method: Method::Post,
            url: url.to_string(),
            query: owned_query(query),
            content_type: Some(content_type.to_string()),
            body,
        })
        .await
    }
}
