use std::collections::HashMap;
use std::path::PathBuf;

use odin_error::{ErrorCode, OdinError};
use tokio::sync::RwLock;

/// Pluggable byte storage for OML blobs and receipts.
///
/// `url_for` is synchronous and purely local (it never makes a network
/// call): backends that can serve a signed or public URL return `Some`,
/// others return `None` and callers fall back to proxying bytes through
/// `get`.
#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    /// Write `bytes` under `key`, creating or overwriting as needed.
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), OdinError>;

    /// Read the bytes stored at `key`, or `None` if absent.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, OdinError>;

    /// Check whether `key` is present without reading its bytes.
    async fn exists(&self, key: &str) -> Result<bool, OdinError>;

    /// List keys beginning with `prefix`, in no particular order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, OdinError>;

    /// A directly-fetchable URL for `key`, if this backend can produce one.
    fn url_for(&self, key: &str) -> Option<String>;
}

/// In-memory storage backend. Useful for tests and for single-process
/// deployments that don't need durability across restarts.
#[derive(Default)]
pub struct MemoryStorage {
    data: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryStorage {
    /// Creates an empty in-memory store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Storage for MemoryStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), OdinError> {
        self.data.write().await.insert(key.to_string(), bytes);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, OdinError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn exists(&self, key: &str) -> Result<bool, OdinError> {
        Ok(self.data.read().await.contains_key(key))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, OdinError> {
        Ok(self
            .data
            .read()
            .await
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn url_for(&self, _key: &str) -> Option<String> {
        None
    }
}

/// Filesystem-backed storage, rooted at a directory. Keys are treated as
/// slash-separated relative paths; parent directories are created on
/// write as needed.
pub struct LocalFsStorage {
    root: PathBuf,
    base_url: Option<String>,
}

impl LocalFsStorage {
    /// Roots storage at `root`. The directory is not required to exist
    /// yet; it is created lazily on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            base_url: None,
        }
    }

    /// Attaches a base URL so `url_for` can synthesize a fetchable
    /// location (e.g. when this directory is also served statically).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(key)
    }
}

#[async_trait::async_trait]
impl Storage for LocalFsStorage {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<(), OdinError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                OdinError::new(ErrorCode::StorageFailed, "failed to create storage directory")
                    .with_context("path", parent.display().to_string())
                    .with_source(e)
            })?;
        }
        tokio::fs::write(&path, bytes).await.map_err(|e| {
            OdinError::new(ErrorCode::StorageFailed, "failed to write storage object")
                .with_context("key", key.to_string())
                .with_source(e)
        })
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, OdinError> {
        match tokio::fs::read(self.path_for(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(OdinError::new(ErrorCode::StorageFailed, "failed to read storage object")
                .with_context("key", key.to_string())
                .with_source(e)),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool, OdinError> {
        Ok(tokio::fs::metadata(self.path_for(key)).await.is_ok())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, OdinError> {
        let mut out = Vec::new();
        let mut stack = vec![self.root.clone()];
        while let Some(dir) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(e) => e,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(OdinError::new(ErrorCode::StorageFailed, "failed to list storage objects")
                        .with_source(e))
                }
            };
            while let Some(entry) = entries.next_entry().await.map_err(|e| {
                OdinError::new(ErrorCode::StorageFailed, "failed to list storage objects").with_source(e)
            })? {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                if let Ok(rel) = path.strip_prefix(&self.root) {
                    let key = rel.to_string_lossy().replace(std::path::MAIN_SEPARATOR, "/");
                    if key.starts_with(prefix) {
                        out.push(key);
                    }
                }
            }
        }
        Ok(out)
    }

    fn url_for(&self, key: &str) -> Option<String> {
        self.base_url.as_ref().map(|base| format!("{}/{key}", base.trim_end_matches('/')))
    }
}

/// Stub for an object-storage-backed (S3/GCS/Azure) implementation.
///
/// Concrete cloud backends are out of scope here; this type exists only
/// to document the shape a real implementation would take and to give
/// callers compiling with the `object_store` feature a named type to
/// depend on ahead of one being wired in.
#[cfg(feature = "object_store")]
pub struct ObjectStoreStorage {
    bucket: String,
}

#[cfg(feature = "object_store")]
impl ObjectStoreStorage {
    /// Names the bucket this (unimplemented) backend would target.
    #[must_use]
    pub fn new(bucket: impl Into<String>) -> Self {
        Self { bucket: bucket.into() }
    }
}

#[cfg(feature = "object_store")]
#[async_trait::async_trait]
impl Storage for ObjectStoreStorage {
    async fn put(&self, _key: &str, _bytes: Vec<u8>) -> Result<(), OdinError> {
        Err(self.unimplemented())
    }

    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, OdinError> {
        Err(self.unimplemented())
    }

    async fn exists(&self, _key: &str) -> Result<bool, OdinError> {
        Err(self.unimplemented())
    }

    async fn list(&self, _prefix: &str) -> Result<Vec<String>, OdinError> {
        Err(self.unimplemented())
    }

    fn url_for(&self, _key: &str) -> Option<String> {
        None
    }
}

#[cfg(feature = "object_store")]
impl ObjectStoreStorage {
    fn unimplemented(&self) -> OdinError {
        OdinError::new(ErrorCode::StorageFailed, "object_store backend is not implemented")
            .with_context("bucket", self.bucket.clone())
    }
}
