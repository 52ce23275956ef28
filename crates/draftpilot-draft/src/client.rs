//! Retrying draft server client.

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::error::{CallFailure, DraftError, DraftResult};
use crate::metrics::{record_request, record_retry};
use crate::transport::{DraftTransport, HttpTransport};
use crate::types::{
    Acknowledgement, AddAudioRequest, AddEffectRequest, AddStickerRequest, AddSubtitleRequest,
    AddTextRequest, AddVideoRequest, DraftRequest, Endpoint, EndpointReport, EndpointStatus,
    SaveAck, SaveDraftRequest,
};

/// Configuration for the draft client.
#[derive(Debug, Clone)]
pub struct DraftClientConfig {
    /// Base URL of the draft server
    pub base_url: String,
    /// Per-request timeout
    pub timeout: Duration,
    /// Total attempts per call, including the first
    pub max_attempts: u32,
    /// Linear backoff step between attempts
    pub backoff: Duration,
}

impl Default for DraftClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000".to_string(),
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff: Duration::from_millis(250),
        }
    }
}

impl DraftClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let host = std::env::var("DRAFT_SERVER_HOST").unwrap_or_else(|_| "localhost".to_string());
        let port: u16 = std::env::var("DRAFT_SERVER_PORT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(9000);

        Self {
            base_url: format!("http://{host}:{port}"),
            timeout: Duration::from_secs(
                std::env::var("DRAFT_CLIENT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            max_attempts: std::env::var("DRAFT_CLIENT_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(3),
            backoff: Duration::from_millis(
                std::env::var("DRAFT_CLIENT_BACKOFF_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(250),
            ),
        }
    }
}

/// Typed client with one method per draft primitive.
#[derive(Clone)]
pub struct DraftClient {
    transport: Arc<dyn DraftTransport>,
    max_attempts: u32,
    backoff: Duration,
}

impl DraftClient {
    /// Create a client over HTTP.
    pub fn new(config: DraftClientConfig) -> DraftResult<Self> {
        let transport = HttpTransport::new(&config.base_url, config.timeout)?;
        Ok(Self::with_transport(
            Arc::new(transport),
            config.max_attempts,
            config.backoff,
        ))
    }

    /// Create from environment variables.
    pub fn from_env() -> DraftResult<Self> {
        Self::new(DraftClientConfig::from_env())
    }

    /// Create a client over any transport.
    pub fn with_transport(
        transport: Arc<dyn DraftTransport>,
        max_attempts: u32,
        backoff: Duration,
    ) -> Self {
        Self {
            transport,
            max_attempts: max_attempts.max(1),
            backoff,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub async fn add_video(&self, request: &AddVideoRequest) -> Result<Acknowledgement, CallFailure> {
        self.call(Endpoint::AddVideo, request).await
    }

    pub async fn add_text(&self, request: &AddTextRequest) -> Result<Acknowledgement, CallFailure> {
        self.call(Endpoint::AddText, request).await
    }

    pub async fn add_audio(&self, request: &AddAudioRequest) -> Result<Acknowledgement, CallFailure> {
        self.call(Endpoint::AddAudio, request).await
    }

    pub async fn add_subtitle(
        &self,
        request: &AddSubtitleRequest,
    ) -> Result<Acknowledgement, CallFailure> {
        self.call(Endpoint::AddSubtitle, request).await
    }

    pub async fn add_effect(&self, request: &AddEffectRequest) -> Result<Acknowledgement, CallFailure> {
        self.call(Endpoint::AddEffect, request).await
    }

    pub async fn add_sticker(
        &self,
        request: &AddStickerRequest,
    ) -> Result<Acknowledgement, CallFailure> {
        self.call(Endpoint::AddSticker, request).await
    }

    /// Dispatch any element request to its endpoint.
    pub async fn send(&self, request: &DraftRequest) -> Result<Acknowledgement, CallFailure> {
        match request {
            DraftRequest::Video(r) => self.add_video(r).await,
            DraftRequest::Text(r) => self.add_text(r).await,
            DraftRequest::Audio(r) => self.add_audio(r).await,
            DraftRequest::Subtitle(r) => self.add_subtitle(r).await,
            DraftRequest::Effect(r) => self.add_effect(r).await,
            DraftRequest::Sticker(r) => self.add_sticker(r).await,
        }
    }

    /// Persist the draft. A response without a draft location is `InvalidResponse`.
    pub async fn save_draft(&self, request: &SaveDraftRequest) -> Result<SaveAck, CallFailure> {
        let ack = self.call(Endpoint::SaveDraft, request).await?;
        match SaveAck::draft_path_of(&ack.payload) {
            Some(draft_path) => Ok(SaveAck {
                draft_path,
                payload: ack.payload,
                attempts: ack.attempts,
            }),
            None => Err(CallFailure {
                endpoint: Endpoint::SaveDraft,
                attempts: ack.attempts,
                source: DraftError::invalid_response("save acknowledgement carries no draft path"),
            }),
        }
    }

    /// POST `{}` to every endpoint; 200, 400 and 422 count as available.
    pub async fn probe_endpoints(&self) -> EndpointReport {
        let mut entries = Vec::with_capacity(Endpoint::ALL.len());
        for endpoint in Endpoint::ALL {
            let entry = match self.transport.probe(*endpoint).await {
                Ok(status) => EndpointStatus {
                    endpoint: *endpoint,
                    path: endpoint.path(),
                    status: Some(status),
                    available: matches!(status, 200 | 400 | 422),
                    error: None,
                },
                Err(e) => EndpointStatus {
                    endpoint: *endpoint,
                    path: endpoint.path(),
                    status: None,
                    available: false,
                    error: Some(e.to_string()),
                },
            };
            debug!(endpoint = %endpoint, status = ?entry.status, available = entry.available, "Probed endpoint");
            entries.push(entry);
        }
        EndpointReport { entries }
    }

    async fn call<R: Serialize + Sync>(
        &self,
        endpoint: Endpoint,
        request: &R,
    ) -> Result<Acknowledgement, CallFailure> {
        let body = serde_json::to_value(request).map_err(|e| CallFailure {
            endpoint,
            attempts: 0,
            source: DraftError::invalid_response(format!("request not serializable: {e}")),
        })?;

        let (payload, attempts) = self.with_retry(endpoint, &body).await?;
        Ok(Acknowledgement::from_payload(payload, attempts))
    }

    /// Execute with linear backoff, retrying only retryable failures.
    async fn with_retry(&self, endpoint: Endpoint, body: &Value) -> Result<(Value, u32), CallFailure> {
        let mut attempt = 1;
        loop {
            let started = Instant::now();
            let result = self.transport.post(endpoint, body).await;
            let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

            match result {
                Ok(payload) => {
                    record_request(endpoint, "acknowledged", latency_ms);
                    return Ok((payload, attempt));
                }
                Err(e) => {
                    record_request(endpoint, e.outcome(), latency_ms);
                    if e.is_retryable() && attempt < self.max_attempts {
                        let delay = self.backoff * attempt;
                        warn!(
                            endpoint = %endpoint,
                            attempt,
                            max_attempts = self.max_attempts,
                            error = %e,
                            "Draft call failed, retrying in {:?}",
                            delay
                        );
                        record_retry(endpoint);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(CallFailure {
                        endpoint,
                        attempts: attempt,
                        source: e,
                    });
                }
            }
        }
    }
}
