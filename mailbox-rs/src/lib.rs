//! mailbox-rs: Webmail backend over a blob store
//!
//! Messages are stored as raw RFC 5322 files under keys of the form
//! `emails/<user>/<folder>/<file>`, with small string metadata attached to
//! each key. This crate lists folders and messages from that layout, turns a
//! raw message into a displayable record, and forwards replies to an
//! outbound mail service.
//!
//! # Example
//!
//! ```no_run
//! use mailbox_rs::mailbox::MailboxIndex;
//! use mailbox_rs::storage::FsStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = Arc::new(FsStore::new("/var/lib/mailbox"));
//!     let index = MailboxIndex::new(store);
//!
//!     for entry in index.list_messages("alice@example.com", "Inbox").await? {
//!         println!("{} ({} bytes)", entry.path, entry.size);
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! - [`mime`]: Best-effort message parser
//! - [`mailbox`]: Folder and message listing over a store
//! - [`storage`]: Blob store trait and backends
//! - [`dispatch`]: Outbound reply forwarding
//! - [`api`]: HTTP surface
//! - [`config`]: Configuration management
//! - [`error`]: Error types and handling

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod mailbox;
pub mod mime;
pub mod storage;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{MailboxError, Result};
pub use mailbox::MailboxIndex;
pub use mime::{MessageParser, ParsedMessage};
