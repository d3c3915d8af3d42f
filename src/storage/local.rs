//! Local filesystem file store.

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tracing::debug;

use super::{FileStore, StoreError};

pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub async fn new(root: PathBuf) -> Result<Self, StoreError> {
        fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    /// Resolve a key to a path under the root. Keys are built from UUIDs and
    /// sanitised file names, but reject traversal components anyway.
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        let rel = Path::new(key);
        for component in rel.components() {
            match component {
                Component::Normal(_) => {}
                _ => {
                    return Err(StoreError::Backend(format!(
                        "Invalid storage key: {}",
                        key
                    )))
                }
            }
        }
        Ok(self.root.join(rel))
    }
}

#[async_trait]
impl FileStore for LocalStore {
    async fn put(&self, key: &str, data: Bytes, _content_type: &str) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, &data).await?;
        debug!(key = key, size = data.len(), "Stored file locally");
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Bytes, StoreError> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Bytes::from(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StoreError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!(key = key, "Deleted local file");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store() -> (tempfile::TempDir, LocalStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = LocalStore::new(dir.path().join("files")).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let (_dir, store) = store().await;
        let data = Bytes::from_static(b"lecture notes");
        store
            .put("c1/m1/notes.pdf", data.clone(), "application/pdf")
            .await
            .unwrap();

        let fetched = store.get("c1/m1/notes.pdf").await.unwrap();
        assert_eq!(fetched, data);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let (_dir, store) = store().await;
        match store.get("c1/m1/gone.pdf").await {
            Err(StoreError::NotFound(_)) => {}
            Ok(_) => panic!("Expected NotFound, got data"),
            Err(e) => panic!("Expected NotFound, got {}", e),
        }
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, store) = store().await;
        store
            .put("c1/m1/a.txt", Bytes::from_static(b"x"), "text/plain")
            .await
            .unwrap();
        store.delete("c1/m1/a.txt").await.unwrap();
        // Second delete of the same key succeeds
        store.delete("c1/m1/a.txt").await.unwrap();
        assert!(store.get("c1/m1/a.txt").await.is_err());
    }

    #[tokio::test]
    async fn test_rejects_traversal_keys() {
        let (_dir, store) = store().await;
        assert!(store.get("../outside.txt").await.is_err());
        assert!(store
            .put("/abs/path.txt", Bytes::from_static(b"x"), "text/plain")
            .await
            .is_err());
    }
}
