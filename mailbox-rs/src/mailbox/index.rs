use futures::future::join_all;
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::{debug, warn};

use super::entry::{MailboxEntry, MessageView};
use crate::error::{MailboxError, Result};
use crate::mime::MessageParser;
use crate::storage::{ListOptions, MessageStore, Metadata, StoredObject};

/// Folder placed first in every folder listing
pub const INBOX: &str = "Inbox";
/// Folder appended to a folder listing when missing
pub const SENT: &str = "Sent";

const KEY_DELIMITER: &str = "/";

/// Folder and message enumeration for users' stored mail
///
/// Keys follow `emails/{user}/{folder}/{message}`.
pub struct MailboxIndex {
    store: Arc<dyn MessageStore>,
    message_suffix: String,
}

impl MailboxIndex {
    pub fn new(store: Arc<dyn MessageStore>) -> Self {
        Self {
            store,
            message_suffix: ".eml".to_string(),
        }
    }

    /// Only keys ending with `suffix` are treated as messages
    pub fn with_message_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.message_suffix = suffix.into();
        self
    }

    pub fn user_prefix(user: &str) -> String {
        format!("emails/{}/", user)
    }

    pub fn folder_prefix(user: &str, folder: &str) -> String {
        format!("emails/{}/{}/", user, folder)
    }

    /// List a user's folders
    ///
    /// "Inbox" is prepended and "Sent" appended when no entry matches them
    /// exactly. Entries from the store are kept as they are, so a
    /// differently cased "inbox" still shows up next to "Inbox".
    pub async fn list_folders(&self, user: &str) -> Result<Vec<String>> {
        let prefix = Self::user_prefix(user);
        let listing = self
            .store
            .list(&ListOptions::delimited(prefix.as_str(), KEY_DELIMITER))
            .await
            .map_err(upstream)?;

        let mut folders: Vec<String> = listing
            .delimited_prefixes
            .iter()
            .map(|folder_prefix| {
                let name = folder_prefix
                    .strip_prefix(prefix.as_str())
                    .unwrap_or(folder_prefix.as_str());
                name.strip_suffix(KEY_DELIMITER).unwrap_or(name).to_string()
            })
            .collect();

        if !folders.iter().any(|folder| folder == INBOX) {
            folders.insert(0, INBOX.to_string());
        }
        if !folders.iter().any(|folder| folder == SENT) {
            folders.push(SENT.to_string());
        }

        debug!("User {} has {} folders", user, folders.len());
        Ok(folders)
    }

    /// List the messages of a folder, newest first
    ///
    /// Metadata missing from the listing is looked up per key, concurrently.
    /// A failed lookup leaves that entry with empty metadata instead of
    /// failing the listing.
    pub async fn list_messages(&self, user: &str, folder: &str) -> Result<Vec<MailboxEntry>> {
        let prefix = Self::folder_prefix(user, folder);
        let listing = self
            .store
            .list(&ListOptions::prefix(prefix.as_str()))
            .await
            .map_err(upstream)?;

        let lookups = listing
            .objects
            .into_iter()
            .filter(|object| object.key.ends_with(&self.message_suffix))
            .map(|object| self.resolve_entry(object));

        let mut entries = join_all(lookups).await;
        sort_newest_first(&mut entries);

        debug!("Listed {} messages under {}", entries.len(), prefix);
        Ok(entries)
    }

    async fn resolve_entry(&self, object: StoredObject) -> MailboxEntry {
        let metadata = match object.custom_metadata {
            Some(metadata) => metadata,
            None => match self.store.head(&object.key).await {
                Ok(head) => head.custom_metadata.unwrap_or_default(),
                Err(e) => {
                    warn!("Error fetching metadata for {}: {}", object.key, e);
                    Metadata::new()
                }
            },
        };

        MailboxEntry {
            path: object.key,
            size: object.size,
            uploaded_at: object.uploaded_at,
            metadata,
        }
    }

    /// Fetch one message by its exact key and parse it
    pub async fn get_message(&self, path: &str) -> Result<MessageView> {
        if path.is_empty() {
            return Err(MailboxError::MissingParameter("path".to_string()));
        }

        let message = self
            .store
            .get(path)
            .await
            .map_err(upstream)?
            .ok_or_else(|| MailboxError::NotFound(path.to_string()))?;

        let parsed = MessageParser::parse_bytes(&message.body);

        Ok(MessageView {
            path: path.to_string(),
            metadata: message.custom_metadata.unwrap_or_default(),
            parsed,
        })
    }
}

/// Stable sort by resolved date, newest first; undated entries go last
pub fn sort_newest_first(entries: &mut [MailboxEntry]) {
    entries.sort_by_cached_key(|entry| Reverse(entry.resolved_date()));
}

/// Store failures surface as upstream failures; caller-facing errors pass through
fn upstream(error: MailboxError) -> MailboxError {
    match error {
        MailboxError::Upstream(_) | MailboxError::NotFound(_) | MailboxError::MissingParameter(_) => {
            error
        }
        other => MailboxError::Upstream(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Listing, MemoryStore, MockMessageStore, ObjectHead, StoredMessage};
    use bytes::Bytes;
    use chrono::{DateTime, TimeZone, Utc};

    fn meta(pairs: &[(&str, &str)]) -> Metadata {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, 12, 0, 0).unwrap()
    }

    fn object(key: &str, day: u32, custom_metadata: Option<Metadata>) -> StoredObject {
        StoredObject {
            key: key.to_string(),
            size: 100,
            uploaded_at: at(day),
            custom_metadata,
        }
    }

    fn folder_listing(prefixes: &[&str]) -> Listing {
        Listing {
            objects: Vec::new(),
            delimited_prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn index_with(store: MockMessageStore) -> MailboxIndex {
        MailboxIndex::new(Arc::new(store))
    }

    #[tokio::test]
    async fn test_list_folders_empty_store() {
        let mut store = MockMessageStore::new();
        store
            .expect_list()
            .withf(|options| {
                options.prefix == "emails/a@x.com/" && options.delimiter.as_deref() == Some("/")
            })
            .returning(|_| Ok(Listing::default()));

        let folders = index_with(store).list_folders("a@x.com").await.unwrap();
        assert_eq!(folders, vec!["Inbox", "Sent"]);
    }

    #[tokio::test]
    async fn test_list_folders_strips_prefix_and_separator() {
        let mut store = MockMessageStore::new();
        store.expect_list().returning(|_| {
            Ok(folder_listing(&[
                "emails/a@x.com/Inbox/",
                "emails/a@x.com/Sent/",
                "emails/a@x.com/Work/",
            ]))
        });

        let folders = index_with(store).list_folders("a@x.com").await.unwrap();
        assert_eq!(folders, vec!["Inbox", "Sent", "Work"]);
    }

    #[tokio::test]
    async fn test_list_folders_appends_sent() {
        let mut store = MockMessageStore::new();
        store
            .expect_list()
            .returning(|_| Ok(folder_listing(&["emails/u/Inbox/", "emails/u/Archive/"])));

        let folders = index_with(store).list_folders("u").await.unwrap();
        assert_eq!(folders, vec!["Inbox", "Archive", "Sent"]);
    }

    #[tokio::test]
    async fn test_list_folders_keeps_duplicates() {
        let mut store = MockMessageStore::new();
        store.expect_list().returning(|_| {
            Ok(folder_listing(&["emails/u/Archive/", "emails/u/Inbox/", "emails/u/inbox/"]))
        });

        let folders = index_with(store).list_folders("u").await.unwrap();
        assert_eq!(folders, vec!["Archive", "Inbox", "inbox", "Sent"]);
    }

    #[tokio::test]
    async fn test_list_folders_keeps_stored_inbox_position() {
        let store = MemoryStore::new();
        store.put("emails/u/Archive/1.eml", "Subject: a\r\n\r\n", Metadata::new()).await;
        store.put("emails/u/Inbox/2.eml", "Subject: b\r\n\r\n", Metadata::new()).await;

        let folders = MailboxIndex::new(Arc::new(store)).list_folders("u").await.unwrap();
        assert_eq!(folders, vec!["Archive", "Inbox", "Sent"]);
    }

    #[tokio::test]
    async fn test_list_folders_prepends_missing_inbox() {
        let mut store = MockMessageStore::new();
        store
            .expect_list()
            .returning(|_| Ok(folder_listing(&["emails/u/Archive/", "emails/u/inbox/"])));

        let folders = index_with(store).list_folders("u").await.unwrap();
        assert_eq!(folders, vec!["Inbox", "Archive", "inbox", "Sent"]);
    }

    #[tokio::test]
    async fn test_list_folders_store_failure_is_upstream() {
        let mut store = MockMessageStore::new();
        store
            .expect_list()
            .returning(|_| Err(MailboxError::Storage("disk gone".to_string())));

        let err = index_with(store).list_folders("u").await.unwrap_err();
        assert!(matches!(err, MailboxError::Upstream(_)));
    }

    #[tokio::test]
    async fn test_list_messages_isolates_metadata_failure() {
        let mut store = MockMessageStore::new();
        store
            .expect_list()
            .withf(|options| options.prefix == "emails/u/Inbox/" && options.delimiter.is_none())
            .returning(|_| {
                Ok(Listing {
                    objects: vec![
                        object("emails/u/Inbox/1.eml", 1, None),
                        object("emails/u/Inbox/2.eml", 2, None),
                        object("emails/u/Inbox/3.eml", 3, None),
                    ],
                    delimited_prefixes: Vec::new(),
                })
            });
        store.expect_head().times(3).returning(|key| {
            if key == "emails/u/Inbox/2.eml" {
                Err(MailboxError::Upstream("timeout".to_string()))
            } else {
                Ok(ObjectHead {
                    custom_metadata: Some(meta(&[("subject", key)])),
                })
            }
        });

        let entries = index_with(store).list_messages("u", "Inbox").await.unwrap();

        assert_eq!(entries.len(), 3);
        let failed = entries
            .iter()
            .find(|e| e.path == "emails/u/Inbox/2.eml")
            .unwrap();
        assert!(failed.metadata.is_empty());
        assert_eq!(failed.size, 100);
        assert_eq!(failed.uploaded_at, at(2));

        let ok = entries
            .iter()
            .find(|e| e.path == "emails/u/Inbox/3.eml")
            .unwrap();
        assert_eq!(ok.metadata["subject"], "emails/u/Inbox/3.eml");
    }

    #[tokio::test]
    async fn test_list_messages_uses_inline_metadata() {
        let mut store = MockMessageStore::new();
        store.expect_list().returning(|_| {
            Ok(Listing {
                objects: vec![object("emails/u/Inbox/1.eml", 1, Some(meta(&[("from", "b@x.com")])))],
                delimited_prefixes: Vec::new(),
            })
        });
        store.expect_head().never();

        let entries = index_with(store).list_messages("u", "Inbox").await.unwrap();
        assert_eq!(entries[0].metadata["from"], "b@x.com");
    }

    #[tokio::test]
    async fn test_list_messages_filters_suffix() {
        let mut store = MockMessageStore::new();
        store.expect_list().returning(|_| {
            Ok(Listing {
                objects: vec![
                    object("emails/u/Inbox/1.eml", 1, Some(Metadata::new())),
                    object("emails/u/Inbox/notes.txt", 2, Some(Metadata::new())),
                    object("emails/u/Inbox/2.eml.bak", 3, Some(Metadata::new())),
                ],
                delimited_prefixes: Vec::new(),
            })
        });

        let entries = index_with(store).list_messages("u", "Inbox").await.unwrap();
        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["emails/u/Inbox/1.eml"]);
    }

    #[tokio::test]
    async fn test_list_messages_custom_suffix() {
        let store = MemoryStore::new();
        store.put("emails/u/Inbox/1.msg", "x", Metadata::new()).await;
        store.put("emails/u/Inbox/2.eml", "x", Metadata::new()).await;

        let index = MailboxIndex::new(Arc::new(store)).with_message_suffix(".msg");
        let entries = index.list_messages("u", "Inbox").await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].path, "emails/u/Inbox/1.msg");
    }

    #[tokio::test]
    async fn test_list_messages_sorted_by_precedence() {
        let store = MemoryStore::new();
        // uploaded day 1, but dated by `date` on day 20
        store
            .put_at("emails/u/Inbox/a.eml", "x", meta(&[("date", "2024-01-20T00:00:00Z")]), at(1))
            .await;
        // `receivedAt` on day 15 beats its later `sentAt`
        store
            .put_at(
                "emails/u/Inbox/b.eml",
                "x",
                meta(&[("receivedAt", "2024-01-15T00:00:00Z"), ("sentAt", "2024-01-30T00:00:00Z")]),
                at(2),
            )
            .await;
        // only `sentAt`, day 10
        store
            .put_at("emails/u/Inbox/c.eml", "x", meta(&[("sentAt", "2024-01-10T00:00:00Z")]), at(3))
            .await;
        // no dates at all, uploaded day 25
        store
            .put_at("emails/u/Inbox/d.eml", "x", Metadata::new(), at(25))
            .await;

        let index = MailboxIndex::new(Arc::new(store));
        let entries = index.list_messages("u", "Inbox").await.unwrap();

        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "emails/u/Inbox/d.eml",
                "emails/u/Inbox/a.eml",
                "emails/u/Inbox/b.eml",
                "emails/u/Inbox/c.eml",
            ]
        );
    }

    #[test]
    fn test_sort_is_stable_and_undated_last() {
        let same = meta(&[("date", "2024-01-05T00:00:00Z")]);
        let mut entries = vec![
            MailboxEntry {
                path: "bad".to_string(),
                size: 1,
                uploaded_at: at(9),
                metadata: meta(&[("date", "garbage")]),
            },
            MailboxEntry {
                path: "first".to_string(),
                size: 1,
                uploaded_at: at(1),
                metadata: same.clone(),
            },
            MailboxEntry {
                path: "second".to_string(),
                size: 1,
                uploaded_at: at(2),
                metadata: same,
            },
        ];

        sort_newest_first(&mut entries);

        let paths: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, vec!["first", "second", "bad"]);
    }

    #[tokio::test]
    async fn test_get_message() {
        let mut store = MockMessageStore::new();
        store
            .expect_get()
            .withf(|key| key == "emails/u/Inbox/1.eml")
            .returning(|key| {
                Ok(Some(StoredMessage {
                    key: key.to_string(),
                    body: Bytes::from_static(b"From: a@x.com\r\nSubject: Hi\r\n\r\nHello"),
                    size: 36,
                    uploaded_at: Utc::now(),
                    custom_metadata: Some(meta(&[("receivedAt", "2024-01-01T00:00:00Z")])),
                }))
            });

        let view = index_with(store).get_message("emails/u/Inbox/1.eml").await.unwrap();

        assert_eq!(view.path, "emails/u/Inbox/1.eml");
        assert_eq!(view.metadata["receivedAt"], "2024-01-01T00:00:00Z");
        assert_eq!(view.parsed.subject, "Hi");
        assert_eq!(view.parsed.from, "a@x.com");
        assert_eq!(view.parsed.body, "Hello");
        assert!(!view.parsed.is_html);
    }

    #[tokio::test]
    async fn test_get_message_without_metadata() {
        let store = MemoryStore::new();
        store.put("k.eml", "Subject: x\n\ny", Metadata::new()).await;

        let view = MailboxIndex::new(Arc::new(store)).get_message("k.eml").await.unwrap();
        assert!(view.metadata.is_empty());
        assert_eq!(view.parsed.body, "y");
    }

    #[tokio::test]
    async fn test_get_message_not_found() {
        let mut store = MockMessageStore::new();
        store.expect_get().returning(|_| Ok(None));

        let err = index_with(store).get_message("missing.eml").await.unwrap_err();
        assert!(matches!(err, MailboxError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_message_missing_path() {
        let mut store = MockMessageStore::new();
        store.expect_get().never();

        let err = index_with(store).get_message("").await.unwrap_err();
        assert!(matches!(err, MailboxError::MissingParameter(_)));
    }
}
