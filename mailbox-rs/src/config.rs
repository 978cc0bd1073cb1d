use crate::error::{MailboxError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub dispatch: DispatchConfig,
    pub defaults: DefaultsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    /// Directory served for non-API paths (the web UI bundle)
    pub static_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: String,
    /// Only keys ending with this suffix are listed as messages
    pub message_suffix: String,
    /// Include custom metadata directly in listings (skips per-key lookups)
    pub inline_metadata: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DispatchConfig {
    pub outbound_url: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DefaultsConfig {
    pub user: String,
    pub folder: String,
    /// Served by the folder endpoint when the store cannot be listed
    pub fallback_folders: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            static_dir: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: "/tmp/mailbox-store".to_string(),
            message_suffix: ".eml".to_string(),
            inline_metadata: false,
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            outbound_url: "http://127.0.0.1:8090/send".to_string(),
            timeout_seconds: 30,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            user: "default@example.com".to_string(),
            folder: "Inbox".to_string(),
            fallback_folders: vec![
                "Inbox".to_string(),
                "Sent".to_string(),
                "Unread".to_string(),
            ],
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| MailboxError::Config(e.to_string()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MailboxError::Config(e.to_string()))
    }

    /// Overlay `MAILBOX_*` environment variables on top of the loaded values
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(addr) = lookup("MAILBOX_LISTEN_ADDR") {
            self.server.listen_addr = addr;
        }
        if let Some(root) = lookup("MAILBOX_STORE_ROOT") {
            self.store.root = root;
        }
        if let Some(url) = lookup("MAILBOX_OUTBOUND_URL") {
            self.dispatch.outbound_url = url;
        }
        if let Some(level) = lookup("MAILBOX_LOG_LEVEL") {
            self.logging.level = level;
        }
    }
}
