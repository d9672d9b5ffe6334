//! CollectorService - HTTP client for pushing scan batches to the collector

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use shared::{BatchResponse, EventBatch, PingResponse};

use crate::sync::SyncError;

/// Request timeout; an unanswered POST must not stall the station for long
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Where batches go and how they are authenticated
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTarget {
    /// Base URL of the collector, e.g. `https://collector.example.com`
    pub base_url: String,
    /// Value for the `X-API-Key` header; empty sends no header
    pub api_key: String,
    /// Post as `text/plain` to the bare URL instead of the batch endpoint
    pub send_plain: bool,
}

/// Seam between the sync engine and the wire
///
/// The engine never touches HTTP directly; tests drop in a scripted fake.
#[async_trait]
pub trait Collector: Send + Sync {
    /// Push one batch; `Ok` means the collector answered `ok: true`
    async fn push_batch(
        &self,
        target: &SyncTarget,
        batch: &EventBatch,
    ) -> Result<BatchResponse, SyncError>;

    /// Probe the collector; `Ok(true)` when it answered pong
    async fn ping(&self, target: &SyncTarget) -> Result<bool, SyncError>;
}

/// HTTP client for the collector batch API
pub struct CollectorService {
    client: Client,
}

impl CollectorService {
    pub fn new() -> Result<Self, SyncError> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SyncError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Collector for CollectorService {
    async fn push_batch(
        &self,
        target: &SyncTarget,
        batch: &EventBatch,
    ) -> Result<BatchResponse, SyncError> {
        let base = target.base_url.trim_end_matches('/');

        let response = if target.send_plain {
            // Legacy collectors take the same JSON as text/plain on the bare URL.
            let body = serde_json::to_string(batch)?;
            self.client
                .post(base)
                .header(reqwest::header::CONTENT_TYPE, "text/plain;charset=UTF-8")
                .body(body)
                .send()
                .await
                .map_err(|e| SyncError::Transport(e.to_string()))?
        } else {
            let url = format!("{base}/api/v1/events/batch");
            let mut request = self.client.post(&url).json(batch);
            if !target.api_key.is_empty() {
                request = request.header("X-API-Key", &target.api_key);
            }
            request
                .send()
                .await
                .map_err(|e| SyncError::Transport(e.to_string()))?
        };

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(SyncError::Unauthorized(status.as_u16()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let verdict: BatchResponse = response
            .json()
            .await
            .map_err(|e| SyncError::InvalidResponse(e.to_string()))?;
        if !verdict.ok {
            return Err(SyncError::Rejected(verdict.errors.join("; ")));
        }
        Ok(verdict)
    }

    async fn ping(&self, target: &SyncTarget) -> Result<bool, SyncError> {
        let url = format!("{}/ping", target.base_url.trim_end_matches('/'));
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| SyncError::Transport(e.to_string()))?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let reply: PingResponse = response.json().await.unwrap_or_default();
        Ok(reply.ok)
    }
}
