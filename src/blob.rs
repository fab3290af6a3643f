//! Media side-channel: opaque byte blobs keyed by client-chosen filename.
//!
//! Handlers upload decoded media here and persist only the returned fetch
//! URL in the message record. Failures surface to the handler, which
//! reports to the sender and does not retry.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::error::Error;

/// Storage for media payloads. `put` returns the URL clients use to fetch
/// the blob back.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, Error>;
    async fn get(&self, key: &str) -> Result<Vec<u8>, Error>;
    async fn delete(&self, key: &str) -> Result<(), Error>;
}

/// Keys are client-chosen filenames; reject anything that could escape
/// the storage directory.
fn validate_key(key: &str) -> Result<(), Error> {
    if key.is_empty()
        || key == "."
        || key == ".."
        || key.contains(['/', '\\'])
        || key.chars().any(|c| c.is_control())
    {
        return Err(Error::InvalidBlobKey(key.to_string()));
    }
    Ok(())
}

/// Filesystem-backed store serving blobs from a public URL prefix.
///
/// The production deployment mounts the directory behind the server's
/// `/blobs` route, so `put` returns `{public_url}/{key}`.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    dir: PathBuf,
    public_url: String,
    max_size: usize,
}

impl FsBlobStore {
    pub fn new(dir: impl Into<PathBuf>, public_url: impl Into<String>, max_size: usize) -> Self {
        Self {
            dir: dir.into(),
            public_url: public_url.into().trim_end_matches('/').to_string(),
            max_size,
        }
    }

    /// Create the storage directory.
    pub async fn init(&self) -> Result<(), Error> {
        fs::create_dir_all(&self.dir).await?;
        info!(dir = %self.dir.display(), "blob store initialized");
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, Error> {
        validate_key(key)?;
        Ok(self.dir.join(key))
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{}", self.public_url, key)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, Error> {
        if bytes.len() > self.max_size {
            return Err(Error::BlobTooLarge {
                size: bytes.len(),
                max: self.max_size,
            });
        }
        let path = self.path_for(key)?;
        fs::write(&path, bytes).await?;
        debug!(key, size = bytes.len(), "stored blob");
        Ok(self.url_for(key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, Error> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Err(Error::BlobNotFound(key.to_string()));
        }
        Ok(fs::read(&path).await?)
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        let path = self.path_for(key)?;
        if !path.exists() {
            return Err(Error::BlobNotFound(key.to_string()));
        }
        fs::remove_file(&path).await?;
        debug!(key, "deleted blob");
        Ok(())
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<String, Vec<u8>>>,
    public_url: String,
}

impl MemoryBlobStore {
    pub fn new(public_url: impl Into<String>) -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            public_url: public_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, Error> {
        validate_key(key)?;
        self.objects
            .write()
            .await
            .insert(key.to_string(), bytes.to_vec());
        Ok(format!("{}/{}", self.public_url, key))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, Error> {
        self.objects
            .read()
            .await
            .get(key)
            .cloned()
            .ok_or_else(|| Error::BlobNotFound(key.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), Error> {
        self.objects
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::BlobNotFound(key.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn fs_store_round_trip() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path(), "https://media.example/blobs/", 1024);
        store.init().await.unwrap();

        let url = store.put("voice.ogg", b"opus bytes").await.unwrap();
        assert_eq!(url, "https://media.example/blobs/voice.ogg");

        let bytes = store.get("voice.ogg").await.unwrap();
        assert_eq!(bytes, b"opus bytes");

        store.delete("voice.ogg").await.unwrap();
        assert!(matches!(
            store.get("voice.ogg").await,
            Err(Error::BlobNotFound(_))
        ));
    }

    #[tokio::test]
    async fn fs_store_enforces_size_limit() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path(), "http://x", 8);
        store.init().await.unwrap();

        let result = store.put("big.bin", &[0u8; 64]).await;
        assert!(matches!(result, Err(Error::BlobTooLarge { size: 64, .. })));
    }

    #[tokio::test]
    async fn traversal_keys_are_rejected() {
        let tmp = TempDir::new().unwrap();
        let store = FsBlobStore::new(tmp.path(), "http://x", 1024);
        store.init().await.unwrap();

        for key in ["../escape", "a/b", "a\\b", "", "..", "nul\0byte"] {
            assert!(
                matches!(store.put(key, b"x").await, Err(Error::InvalidBlobKey(_))),
                "key {:?} was accepted",
                key
            );
        }
    }

    #[tokio::test]
    async fn memory_store_round_trip() {
        let store = MemoryBlobStore::new("http://test");
        let url = store.put("pic.png", b"png").await.unwrap();
        assert_eq!(url, "http://test/pic.png");
        assert_eq!(store.get("pic.png").await.unwrap(), b"png");
        assert_eq!(store.len().await, 1);
        store.delete("pic.png").await.unwrap();
        assert!(store.get("pic.png").await.is_err());
    }
}
