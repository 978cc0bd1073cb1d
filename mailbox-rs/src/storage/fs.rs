use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use super::{
    build_listing, ListOptions, Listing, MessageStore, Metadata, ObjectHead, StoredMessage,
    StoredObject,
};
use crate::error::{MailboxError, Result};

const META_SUFFIX: &str = ".meta.json";
const TMP_SUFFIX: &str = ".tmp";

/// Directory-backed message store
///
/// Key `emails/a@x.com/Inbox/1.eml` lives at `<root>/emails/a@x.com/Inbox/1.eml`
/// with its custom metadata in `1.eml.meta.json` next to it. The upload time
/// is the file's modification time.
pub struct FsStore {
    base_path: PathBuf,
    inline_metadata: bool,
}

impl FsStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            inline_metadata: false,
        }
    }

    /// Read metadata sidecars while listing
    pub fn with_inline_metadata(mut self, inline: bool) -> Self {
        self.inline_metadata = inline;
        self
    }

    /// Store a message and its metadata
    ///
    /// Both files are written under a temporary name first and then renamed,
    /// so readers never see a partial message.
    pub async fn put(&self, key: &str, data: &[u8], metadata: &Metadata) -> Result<()> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                MailboxError::Storage(format!("Failed to create directory {:?}: {}", parent, e))
            })?;
        }

        if !metadata.is_empty() {
            let sidecar = serde_json::to_vec(metadata)?;
            Self::write_atomic(&Self::sidecar_path(&path), &sidecar).await?;
        }
        Self::write_atomic(&path, data).await?;

        info!("Stored message {} ({} bytes)", key, data.len());
        Ok(())
    }

    async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
        let tmp_path = Self::with_suffix(path, &format!(".{}{}", uuid::Uuid::new_v4(), TMP_SUFFIX));
        fs::write(&tmp_path, data).await?;
        fs::rename(&tmp_path, path).await?;
        Ok(())
    }

    /// Map a key to a path below the root, refusing anything that could escape it
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let only_normal = relative
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

        if key.is_empty() || !only_normal || Self::is_internal(key) {
            return Err(MailboxError::Storage(format!("Invalid key: {:?}", key)));
        }

        Ok(self.base_path.join(relative))
    }

    /// Sidecar and temporary files are never exposed as objects
    fn is_internal(name: &str) -> bool {
        name.ends_with(META_SUFFIX) || name.ends_with(TMP_SUFFIX)
    }

    fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }

    fn sidecar_path(path: &Path) -> PathBuf {
        Self::with_suffix(path, META_SUFFIX)
    }

    /// Read a metadata sidecar; a missing sidecar means no metadata
    async fn read_metadata(path: &Path) -> Result<Option<Metadata>> {
        match fs::read(Self::sidecar_path(path)).await {
            Ok(content) => Ok(Some(serde_json::from_slice(&content)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn modified_at(metadata: &std::fs::Metadata) -> DateTime<Utc> {
        metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now())
    }

    /// Directory to start walking from: the part of the prefix up to its last `/`
    ///
    /// `None` when that part could leave the root.
    fn walk_root(&self, prefix: &str) -> Option<PathBuf> {
        let Some(pos) = prefix.rfind('/') else {
            return Some(self.base_path.clone());
        };

        let dir = Path::new(&prefix[..pos]);
        let only_normal = dir
            .components()
            .all(|component| matches!(component, Component::Normal(_)));

        only_normal.then(|| self.base_path.join(dir))
    }

    /// Collect every stored object whose key starts with `prefix`, sorted by key
    async fn collect_objects(&self, prefix: &str) -> Result<Vec<StoredObject>> {
        let mut objects = Vec::new();
        let Some(root) = self.walk_root(prefix) else {
            debug!("Rejected prefix {:?}", prefix);
            return Ok(objects);
        };
        let mut pending = vec![root];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };

            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                let file_type = entry.file_type().await?;

                if file_type.is_dir() {
                    pending.push(path);
                    continue;
                }

                let Some(key) = self.key_for(&path) else {
                    continue;
                };
                if !key.starts_with(prefix) || Self::is_internal(&key) {
                    continue;
                }

                let stat = entry.metadata().await?;
                let custom_metadata = if self.inline_metadata {
                    Self::read_metadata(&path).await.unwrap_or_else(|e| {
                        warn!("Unreadable metadata for {}: {}", key, e);
                        None
                    })
                } else {
                    None
                };

                objects.push(StoredObject {
                    key,
                    size: stat.len(),
                    uploaded_at: Self::modified_at(&stat),
                    custom_metadata,
                });
            }
        }

        objects.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(objects)
    }

    /// Key for a path below the root, with `/` separators
    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.base_path).ok()?;
        let segments: Option<Vec<&str>> = relative
            .components()
            .map(|component| match component {
                Component::Normal(segment) => segment.to_str(),
                _ => None,
            })
            .collect();

        segments.map(|segments| segments.join("/"))
    }
}

#[async_trait]
impl MessageStore for FsStore {
    async fn list(&self, options: &ListOptions) -> Result<Listing> {
        let objects = self.collect_objects(&options.prefix).await?;
        debug!("Listed {} objects under {:?}", objects.len(), options.prefix);
        Ok(build_listing(options, objects))
    }

    async fn get(&self, key: &str) -> Result<Option<StoredMessage>> {
        // A key that cannot live in this store is simply absent
        let Ok(path) = self.resolve(key) else {
            debug!("Rejected key {:?}", key);
            return Ok(None);
        };

        let data = match fs::read(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let stat = fs::metadata(&path).await?;

        let custom_metadata = Self::read_metadata(&path).await.unwrap_or_else(|e| {
            warn!("Unreadable metadata for {}: {}", key, e);
            None
        });

        Ok(Some(StoredMessage {
            key: key.to_string(),
            size: data.len() as u64,
            body: Bytes::from(data),
            uploaded_at: Self::modified_at(&stat),
            custom_metadata,
        }))
    }

    async fn head(&self, key: &str) -> Result<ObjectHead> {
        let path = self
            .resolve(key)
            .map_err(|_| MailboxError::NotFound(key.to_string()))?;

        match fs::metadata(&path).await {
            Ok(stat) if stat.is_file() => {}
            Ok(_) => return Err(MailboxError::NotFound(key.to_string())),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(MailboxError::NotFound(key.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        Ok(ObjectHead {
            custom_metadata: Self::read_metadata(&path).await?,
        })
    }
}
