//! API Server - HTTP server for the mailbox REST API

use axum::{
    extract::State,
    middleware::{self, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::handlers::{self, AppState};

/// API Server configuration
pub struct ApiServer {
    state: Arc<AppState>,
    addr: String,
    static_dir: Option<String>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(state: AppState, addr: String) -> Self {
        Self {
            state: Arc::new(state),
            addr,
            static_dir: None,
        }
    }

    /// Serve files from `dir` for every path outside the API
    pub fn with_static_dir(mut self, dir: Option<String>) -> Self {
        self.static_dir = dir;
        self
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Build the router with all routes
    pub fn router(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        let api_routes = Router::new()
            .route("/folders", get(handlers::list_folders))
            .route("/emails", get(handlers::list_emails))
            .route("/email", get(handlers::get_email))
            .route("/reply", post(handlers::send_reply))
            .fallback(handlers::not_found);

        let router = Router::new()
            .nest("/api", api_routes)
            .route("/health", get(handlers::health))
            .route("/metrics", get(handlers::metrics));

        let router = match &self.static_dir {
            Some(dir) => router.fallback_service(ServeDir::new(dir)),
            None => router.fallback(handlers::not_found),
        };

        router
            .layer(middleware::from_fn_with_state(
                self.state.clone(),
                track_requests,
            ))
            .layer(TraceLayer::new_for_http())
            .layer(cors)
            .with_state(self.state.clone())
    }

    /// Start the API server
    pub async fn run(&self) -> std::io::Result<()> {
        let router = self.router();

        info!("Starting API server on {}", self.addr);

        let listener = tokio::net::TcpListener::bind(&self.addr).await?;
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("API server stopped");
        Ok(())
    }
}

/// Count every request, and every 4xx/5xx answer
async fn track_requests(
    State(state): State<Arc<AppState>>,
    req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    state.metrics.inc_requests();

    let response = next.run(req).await;
    if response.status().is_client_error() || response.status().is_server_error() {
        state.metrics.inc_errors();
    }

    response
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
