//! JSON endpoint calls.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use crate::endpoints::Endpoint;
use crate::error::{ApiError, ApiResult};
use crate::fault::{classify_json, Protocol};
use crate::transport::{Query, Transport, CONTENT_TYPE_JSON};

/// Sends requests to JSON and binary endpoints and classifies the result.
#[derive(Clone)]
pub struct JsonClient {
    transport: Arc<dyn Transport>,
}

impl JsonClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    /// GET a JSON endpoint.
    pub async fn get(&self, endpoint: Endpoint, query: &Query<'_>) -> ApiResult<Value> {
        expect_protocol(endpoint, Protocol::Json)?;
        let body = self.transport.get(endpoint.url, query).await?;
        decode(endpoint, &body)
    }

    /// POST a JSON body to a JSON endpoint.
    pub async fn post(&self, endpoint: Endpoint, query: &Query<'_>, body: &Value) -> ApiResult<Value> {
        expect_protocol(endpoint, Protocol::Json)?;
        let response = self.send_json(endpoint, query, body).await?;
        decode(endpoint, &response)
    }

    /// POST a JSON body to an endpoint that answers with raw bytes.
    ///
    /// A body that parses as a JSON object is treated as a fault report.
    pub async fn post_binary(
        &self,
        endpoint: Endpoint,
        query: &Query<'_>,
        body: &Value,
    ) -> ApiResult<Vec<u8>> {
        expect_protocol(endpoint, Protocol::Binary)?;
        let response = self.send_json(endpoint, query, body).await?;

        if let Ok(value @ Value::Object(_)) = serde_json::from_slice::<Value>(&response) {
            classify_json(value)?;
            return Err(ApiError::malformed(format!(
                "{} returned JSON instead of binary content",
                endpoint.url
            )));
        }
        Ok(response)
    }

    async fn send_json(
        &self,
        endpoint: Endpoint,
        query: &Query<'_>,
        body: &Value,
    ) -> ApiResult<Vec<u8>> {
        let encoded = serde_json::to_vec(body)
            .map_err(|e| ApiError::invalid_request(format!("failed to encode body: {}", e)))?;
        self.transport
            .post(endpoint.url, query, CONTENT_TYPE_JSON, encoded)
            .await
    }
}

fn expect_protocol(endpoint: Endpoint, protocol: Protocol) -> ApiResult<()> {
    if endpoint.protocol != protocol {
        return Err(ApiError::invalid_request(format!(
            "{} is a {:?} endpoint",
            endpoint.url, endpoint.protocol
        )));
    }
    Ok(())
}

fn decode(endpoint: Endpoint, body: &[u8]) -> ApiResult<Value> {
    let value: Value = serde_json::from_slice(body).map_err(|e| {
        ApiError::malformed(format!("{} returned invalid JSON: {}", endpoint.url, e))
    })?;

    match classify_json(value) {
        Ok(value) => {
            debug!(url = %endpoint.url, "Call succeeded");
            Ok(value)
        }
        Err(e) => {
            warn!(url = %endpoint.url, error = %e, "Platform reported a fault");
            Err(e)
        }
    }
}

/// Decode a successful response into a typed value.
pub(crate) fn from_value<T: DeserializeOwned>(value: Value, what: &str) -> ApiResult<T> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::malformed(format!("unexpected {} response: {}", what, e)))
}

/// Take a field out of a successful response.
pub(crate) fn take_field(mut value: Value, field: &str) -> ApiResult<Value> {
    match value.get_mut(field).map(Value::take) {
        Some(Value::Null) | None => Err(ApiError::malformed(format!("response has no {}", field))),
        Some(inner) => Ok(inner),
    }
}

/// Bound a credential fetch. Expiry surfaces as a transport error.
pub(crate) async fn with_timeout<T>(
    limit: Duration,
    what: &str,
    fut: impl Future<Output = ApiResult<T>>,
) -> ApiResult<T> {
    tokio::time::timeout(limit, fut).await.map_err(|_| {
        warn!(what = %what, timeout_ms = limit.as_millis() as u64, "Credential fetch timed out");
        ApiError::transport(format!("{} timed out after {:?}", what, limit))
    })?
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_take_field() {
        let value = json!({"authorizer_info": {"nick_name": "n"}, "empty": null});
        assert_eq!(
            take_field(value.clone(), "authorizer_info").unwrap(),
            json!({"nick_name": "n"})
        );
        assert!(matches!(
            take_field(value.clone(), "empty"),
            Err(ApiError::MalformedResponse(_))
        ));
        assert!(take_field(value, "missing").is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_with_timeout_expires() {
        let err = with_timeout(Duration::from_secs(10), "token fetch", async {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ApiError::Transport(_)));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_with_timeout_passes_result() {
        let value = with_timeout(Duration::from_secs(1), "fetch", async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
