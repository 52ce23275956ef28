//! Single-attempt transport to the draft server.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::trace;

use crate::error::{DraftError, DraftResult};
use crate::types::Endpoint;

/// One POST to one endpoint, classified but never retried.
#[async_trait]
pub trait DraftTransport: Send + Sync {
    /// Send `body` and decode the response envelope.
    async fn post(&self, endpoint: Endpoint, body: &Value) -> DraftResult<Value>;

    /// POST `{}` and return the raw HTTP status.
    async fn probe(&self, endpoint: Endpoint) -> DraftResult<u16>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> DraftResult<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(5)))
            .build()
            .map_err(|e| DraftError::unreachable(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, endpoint: Endpoint) -> String {
        format!("{}{}", self.base_url, endpoint.path())
    }
}

#[async_trait]
impl DraftTransport for HttpTransport {
    async fn post(&self, endpoint: Endpoint, body: &Value) -> DraftResult<Value> {
        let url = self.url(endpoint);
        trace!(%url, "POST");

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| DraftError::unreachable(e.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| DraftError::unreachable(format!("failed reading body: {e}")))?;

        decode_envelope(status, &bytes)
    }

    async fn probe(&self, endpoint: Endpoint) -> DraftResult<u16> {
        let response = self
            .http
            .post(self.url(endpoint))
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| DraftError::unreachable(e.to_string()))?;
        Ok(response.status().as_u16())
    }
}

/// Classify a response by status and `success` envelope.
pub(crate) fn decode_envelope(status: StatusCode, body: &[u8]) -> DraftResult<Value> {
    let text = || String::from_utf8_lossy(body).chars().take(500).collect::<String>();

    if status.is_server_error() {
        return Err(DraftError::server_error(status.as_u16(), text()));
    }
    if status.is_client_error() {
        return Err(DraftError::rejected(Some(status.as_u16()), text()));
    }
    if !status.is_success() {
        return Err(DraftError::invalid_response(format!(
            "unexpected status {status}"
        )));
    }

    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| DraftError::invalid_response(format!("{e}: {}", text())))?;

    if payload.get("success").and_then(Value::as_bool) == Some(false) {
        let message = payload
            .get("error")
            .map(|e| match e {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .unwrap_or_else(|| "server reported success: false".to_string());
        return Err(DraftError::rejected(Some(status.as_u16()), message));
    }

    Ok(payload)
}
