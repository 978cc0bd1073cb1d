//! Outbound reply dispatch
//!
//! Replies are handed to an outbound mail service as opaque JSON; whatever
//! the service answers is passed back to the caller untouched.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use http::HttpDispatcher;

/// Status and body returned by the outbound service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DispatchResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl DispatchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReplyDispatcher: Send + Sync {
    /// Forward a reply payload; fails only when the service cannot be reached
    async fn send(&self, payload: serde_json::Value) -> Result<DispatchResponse>;
}
