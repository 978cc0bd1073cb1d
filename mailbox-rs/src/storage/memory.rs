use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{
    build_listing, ListOptions, Listing, MessageStore, Metadata, ObjectHead, StoredMessage,
    StoredObject,
};
use crate::error::{MailboxError, Result};

struct MemoryObject {
    body: Bytes,
    uploaded_at: DateTime<Utc>,
    metadata: Metadata,
}

/// In-memory message store
///
/// Keys list in lexicographic order, matching what object stores return.
pub struct MemoryStore {
    objects: RwLock<BTreeMap<String, MemoryObject>>,
    inline_metadata: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(BTreeMap::new()),
            inline_metadata: false,
        }
    }

    /// Return custom metadata directly in listings
    pub fn with_inline_metadata(mut self, inline: bool) -> Self {
        self.inline_metadata = inline;
        self
    }

    pub async fn put(&self, key: &str, body: impl Into<Bytes>, metadata: Metadata) {
        self.put_at(key, body, metadata, Utc::now()).await;
    }

    /// Store an object with an explicit upload timestamp
    pub async fn put_at(
        &self,
        key: &str,
        body: impl Into<Bytes>,
        metadata: Metadata,
        uploaded_at: DateTime<Utc>,
    ) {
        let object = MemoryObject {
            body: body.into(),
            uploaded_at,
            metadata,
        };
        self.objects.write().await.insert(key.to_string(), object);
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn list(&self, options: &ListOptions) -> Result<Listing> {
        let objects = self.objects.read().await;

        let matching = objects
            .range(options.prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&options.prefix))
            .map(|(key, object)| StoredObject {
                key: key.clone(),
                size: object.body.len() as u64,
                uploaded_at: object.uploaded_at,
                custom_metadata: self.inline_metadata.then(|| object.metadata.clone()),
            })
            .collect();

        Ok(build_listing(options, matching))
    }

    async fn get(&self, key: &str) -> Result<Option<StoredMessage>> {
        let objects = self.objects.read().await;

        Ok(objects.get(key).map(|object| StoredMessage {
            key: key.to_string(),
            body: object.body.clone(),
            size: object.body.len() as u64,
            uploaded_at: object.uploaded_at,
            custom_metadata: Some(object.metadata.clone()),
        }))
    }

    async fn head(&self, key: &str) -> Result<ObjectHead> {
        let objects = self.objects.read().await;

        objects
            .get(key)
            .map(|object| ObjectHead {
                custom_metadata: Some(object.metadata.clone()),
            })
            .ok_or_else(|| MailboxError::NotFound(key.to_string()))
    }
}
