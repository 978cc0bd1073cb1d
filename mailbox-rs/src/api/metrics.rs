//! Prometheus metrics for API monitoring

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Simple metrics collector
pub struct Metrics {
    /// Total HTTP requests
    pub http_requests_total: AtomicU64,
    /// Total HTTP errors (4xx, 5xx)
    pub http_errors_total: AtomicU64,
    /// Messages returned by folder listings
    pub messages_listed_total: AtomicU64,
    /// Single messages fetched and parsed
    pub messages_fetched_total: AtomicU64,
    /// Folder listings answered with the fallback set
    pub folder_fallbacks_total: AtomicU64,
    /// Replies accepted by the outbound service
    pub replies_dispatched_total: AtomicU64,
    /// Replies rejected by or undeliverable to the outbound service
    pub reply_failures_total: AtomicU64,
    start_time: Instant,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            http_requests_total: AtomicU64::new(0),
            http_errors_total: AtomicU64::new(0),
            messages_listed_total: AtomicU64::new(0),
            messages_fetched_total: AtomicU64::new(0),
            folder_fallbacks_total: AtomicU64::new(0),
            replies_dispatched_total: AtomicU64::new(0),
            reply_failures_total: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn inc_requests(&self) {
        self.http_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_errors(&self) {
        self.http_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_messages_listed(&self, count: u64) {
        self.messages_listed_total.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_messages_fetched(&self) {
        self.messages_fetched_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_folder_fallbacks(&self) {
        self.folder_fallbacks_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_replies_dispatched(&self) {
        self.replies_dispatched_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_reply_failures(&self) {
        self.reply_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Format metrics in Prometheus format
    pub fn to_prometheus(&self) -> String {
        format!(
            r#"# HELP mailbox_rs_http_requests_total Total HTTP requests
# TYPE mailbox_rs_http_requests_total counter
mailbox_rs_http_requests_total {}

# HELP mailbox_rs_http_errors_total Total HTTP errors (4xx, 5xx)
# TYPE mailbox_rs_http_errors_total counter
mailbox_rs_http_errors_total {}

# HELP mailbox_rs_messages_listed_total Messages returned by folder listings
# TYPE mailbox_rs_messages_listed_total counter
mailbox_rs_messages_listed_total {}

# HELP mailbox_rs_messages_fetched_total Messages fetched and parsed
# TYPE mailbox_rs_messages_fetched_total counter
mailbox_rs_messages_fetched_total {}

# HELP mailbox_rs_folder_fallbacks_total Folder listings served from defaults
# TYPE mailbox_rs_folder_fallbacks_total counter
mailbox_rs_folder_fallbacks_total {}

# HELP mailbox_rs_replies_dispatched_total Replies accepted by the outbound service
# TYPE mailbox_rs_replies_dispatched_total counter
mailbox_rs_replies_dispatched_total {}

# HELP mailbox_rs_reply_failures_total Replies rejected or not delivered
# TYPE mailbox_rs_reply_failures_total counter
mailbox_rs_reply_failures_total {}

# HELP mailbox_rs_uptime_seconds Server uptime in seconds
# TYPE mailbox_rs_uptime_seconds gauge
mailbox_rs_uptime_seconds {}
"#,
            self.http_requests_total.load(Ordering::Relaxed),
            self.http_errors_total.load(Ordering::Relaxed),
            self.messages_listed_total.load(Ordering::Relaxed),
            self.messages_fetched_total.load(Ordering::Relaxed),
            self.folder_fallbacks_total.load(Ordering::Relaxed),
            self.replies_dispatched_total.load(Ordering::Relaxed),
            self.reply_failures_total.load(Ordering::Relaxed),
            self.uptime_seconds(),
        )
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
