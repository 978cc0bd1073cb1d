//! REST API module for mailbox-rs
//!
//! Exposes folder listings, message retrieval and reply dispatch over HTTP

pub mod handlers;
pub mod metrics;
pub mod server;

pub use handlers::{ApiError, AppState};
pub use metrics::Metrics;
pub use server::ApiServer;
