//! Message storage
//!
//! Messages live in a key-addressed blob store with prefix listing and
//! per-key custom metadata. Backends:
//! - [`fs`]: directory-backed store with JSON metadata sidecars
//! - [`memory`]: in-process store for tests and demos

pub mod fs;
pub mod memory;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};

use crate::error::Result;

pub use fs::FsStore;
pub use memory::MemoryStore;

/// Custom metadata attached to a stored object
pub type Metadata = HashMap<String, String>;

/// Listing request: every key starting with `prefix`, optionally rolled up
/// at the first `delimiter` after the prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListOptions {
    pub prefix: String,
    pub delimiter: Option<String>,
}

impl ListOptions {
    pub fn prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: None,
        }
    }

    pub fn delimited(prefix: impl Into<String>, delimiter: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            delimiter: Some(delimiter.into()),
        }
    }
}

/// One object in a listing
#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub key: String,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    /// Present only when the backend returns metadata inline
    pub custom_metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    pub objects: Vec<StoredObject>,
    /// Rolled-up key prefixes, each ending with the delimiter
    pub delimited_prefixes: Vec<String>,
}

/// A fetched object with its content
#[derive(Debug, Clone)]
pub struct StoredMessage {
    pub key: String,
    pub body: Bytes,
    pub size: u64,
    pub uploaded_at: DateTime<Utc>,
    pub custom_metadata: Option<Metadata>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectHead {
    pub custom_metadata: Option<Metadata>,
}

/// Read-side interface of the blob store holding user mail
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// List keys under a prefix
    async fn list(&self, options: &ListOptions) -> Result<Listing>;

    /// Fetch an object; `Ok(None)` when the key does not exist
    async fn get(&self, key: &str) -> Result<Option<StoredMessage>>;

    /// Fetch only the metadata of an object; `NotFound` when it does not exist
    async fn head(&self, key: &str) -> Result<ObjectHead>;
}

/// Roll prefix-matching objects up into a [`Listing`].
///
/// `objects` must already be filtered to `options.prefix` and sorted by key.
pub(crate) fn build_listing(options: &ListOptions, objects: Vec<StoredObject>) -> Listing {
    let Some(delimiter) = options.delimiter.as_deref().filter(|d| !d.is_empty()) else {
        return Listing {
            objects,
            delimited_prefixes: Vec::new(),
        };
    };

    let mut listing = Listing::default();
    let mut prefixes = BTreeSet::new();

    for object in objects {
        let rest = &object.key[options.prefix.len()..];
        match rest.find(delimiter) {
            Some(pos) => {
                let end = options.prefix.len() + pos + delimiter.len();
                prefixes.insert(object.key[..end].to_string());
            }
            None => listing.objects.push(object),
        }
    }

    listing.delimited_prefixes = prefixes.into_iter().collect();
    listing
}
