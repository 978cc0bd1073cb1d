//! HTTP client for the outbound mail service

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use super::{DispatchResponse, ReplyDispatcher};
use crate::error::{MailboxError, Result};

/// Posts reply payloads as JSON to the outbound service
#[derive(Debug, Clone)]
pub struct HttpDispatcher {
    /// Outbound service URL
    pub url: String,
    /// HTTP client
    client: reqwest::Client,
}

impl HttpDispatcher {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MailboxError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            url: url.into(),
            client,
        })
    }
}

#[async_trait]
impl ReplyDispatcher for HttpDispatcher {
    async fn send(&self, payload: serde_json::Value) -> Result<DispatchResponse> {
        debug!("Dispatching reply to {}", self.url);

        let response = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                warn!("Outbound service unreachable: {}", e);
                MailboxError::Upstream(e.to_string())
            })?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| MailboxError::Upstream(e.to_string()))?;

        // Non-JSON answers are wrapped rather than rejected
        let body = serde_json::from_str(&text)
            .unwrap_or_else(|_| serde_json::json!({ "raw": text }));

        debug!("Outbound service answered {}", status);
        Ok(DispatchResponse { status, body })
    }
}
