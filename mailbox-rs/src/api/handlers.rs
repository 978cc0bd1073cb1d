//! API request handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

use crate::api::Metrics;
use crate::config::DefaultsConfig;
use crate::dispatch::ReplyDispatcher;
use crate::error::MailboxError;
use crate::mailbox::MailboxIndex;

/// Shared application state
pub struct AppState {
    pub index: MailboxIndex,
    pub dispatcher: Arc<dyn ReplyDispatcher>,
    pub defaults: DefaultsConfig,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(
        index: MailboxIndex,
        dispatcher: Arc<dyn ReplyDispatcher>,
        defaults: DefaultsConfig,
    ) -> Self {
        Self {
            index,
            dispatcher,
            defaults,
            metrics: Metrics::new(),
        }
    }

    fn user_or_default(&self, email: Option<String>) -> String {
        email
            .filter(|e| !e.is_empty())
            .unwrap_or_else(|| self.defaults.user.clone())
    }
}

/// Query for `/api/folders`
#[derive(Debug, Deserialize)]
pub struct FoldersQuery {
    pub email: Option<String>,
}

/// Query for `/api/emails`
#[derive(Debug, Deserialize)]
pub struct EmailsQuery {
    pub email: Option<String>,
    pub folder: Option<String>,
}

/// Query for `/api/email`
#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub path: Option<String>,
}

/// API error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(msg: &str) -> Self {
        Self {
            error: msg.to_string(),
        }
    }
}

impl IntoResponse for MailboxError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            MailboxError::MissingParameter(_) => (StatusCode::BAD_REQUEST, self.to_string()),
            MailboxError::NotFound(_) => (StatusCode::NOT_FOUND, "Email not found".to_string()),
            MailboxError::Upstream(_) => (StatusCode::BAD_GATEWAY, self.to_string()),
            _ => {
                error!("Internal error: {}", self);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error".to_string())
            }
        };

        (status, Json(ApiError::new(&message))).into_response()
    }
}

/// GET /api/folders - List a user's folders
///
/// The store being unreachable is not fatal here: the configured fallback
/// folders are served instead.
pub async fn list_folders(
    State(state): State<Arc<AppState>>,
    Query(query): Query<FoldersQuery>,
) -> impl IntoResponse {
    let user = state.user_or_default(query.email);

    match state.index.list_folders(&user).await {
        Ok(folders) => Json(folders),
        Err(e) => {
            warn!("Folder listing for {} failed, serving defaults: {}", user, e);
            state.metrics.inc_folder_fallbacks();
            Json(state.defaults.fallback_folders.clone())
        }
    }
}

/// GET /api/emails - List messages of a folder, newest first
pub async fn list_emails(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EmailsQuery>,
) -> Response {
    let user = state.user_or_default(query.email);
    let folder = query
        .folder
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| state.defaults.folder.clone());

    match state.index.list_messages(&user, &folder).await {
        Ok(entries) => {
            state.metrics.add_messages_listed(entries.len() as u64);
            (StatusCode::OK, Json(entries)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// GET /api/email - Fetch and parse one message by key
pub async fn get_email(
    State(state): State<Arc<AppState>>,
    Query(query): Query<EmailQuery>,
) -> Response {
    let path = query.path.unwrap_or_default();

    match state.index.get_message(&path).await {
        Ok(view) => {
            state.metrics.inc_messages_fetched();
            (StatusCode::OK, Json(view)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// POST /api/reply - Hand a reply to the outbound service
///
/// The service's status and body are returned as they are.
pub async fn send_reply(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<serde_json::Value>,
) -> Response {
    match state.dispatcher.send(payload).await {
        Ok(response) => {
            if response.is_success() {
                state.metrics.inc_replies_dispatched();
            } else {
                state.metrics.inc_reply_failures();
            }
            let status = StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY);
            (status, Json(response.body)).into_response()
        }
        Err(e) => {
            state.metrics.inc_reply_failures();
            e.into_response()
        }
    }
}

/// Health check endpoint
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "mailbox-rs",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": chrono::Utc::now().timestamp(),
        "uptime_seconds": state.metrics.uptime_seconds(),
    }))
}

/// GET /metrics - Prometheus metrics endpoint
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        state.metrics.to_prometheus(),
    )
}

/// Fallback for unknown API routes
pub async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(ApiError::new("Not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{DispatchResponse, MockReplyDispatcher};
    use crate::storage::MemoryStore;
    use serde_json::json;

    fn state_with(dispatcher: MockReplyDispatcher) -> Arc<AppState> {
        let index = MailboxIndex::new(Arc::new(MemoryStore::new()));
        Arc::new(AppState::new(
            index,
            Arc::new(dispatcher),
            DefaultsConfig::default(),
        ))
    }

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (MailboxError::MissingParameter("path".to_string()), StatusCode::BAD_REQUEST),
            (MailboxError::NotFound("k".to_string()), StatusCode::NOT_FOUND),
            (MailboxError::Upstream("down".to_string()), StatusCode::BAD_GATEWAY),
            (MailboxError::Storage("bad".to_string()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[test]
    fn test_user_defaults() {
        let state = state_with(MockReplyDispatcher::new());
        assert_eq!(state.user_or_default(None), "default@example.com");
        assert_eq!(state.user_or_default(Some(String::new())), "default@example.com");
        assert_eq!(state.user_or_default(Some("a@x.com".to_string())), "a@x.com");
    }

    #[tokio::test]
    async fn test_send_reply_passes_status_through() {
        let mut dispatcher = MockReplyDispatcher::new();
        dispatcher.expect_send().returning(|_| {
            Ok(DispatchResponse {
                status: 429,
                body: json!({ "error": "slow down" }),
            })
        });
        let state = state_with(dispatcher);

        let response = send_reply(State(state.clone()), Json(json!({ "to": "b@x.com" }))).await;

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(state.metrics.to_prometheus().contains("mailbox_rs_reply_failures_total 1"));
    }

    #[tokio::test]
    async fn test_send_reply_unreachable_is_bad_gateway() {
        let mut dispatcher = MockReplyDispatcher::new();
        dispatcher
            .expect_send()
            .returning(|_| Err(MailboxError::Upstream("connection refused".to_string())));
        let state = state_with(dispatcher);

        let response = send_reply(State(state), Json(json!({}))).await;
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }
}
