//! File storage adapters.
//!
//! Material metadata always lives in SQLite; the blob itself goes through a
//! `FileStore`, selected by configuration: plain files under the data
//! directory, or an S3 bucket. Both expose the same method surface and no
//! caching or cross-backend reconciliation happens above them.

mod local;
mod s3;

pub use local::LocalStore;
pub use s3::S3Store;

use crate::config::{Config, StorageBackend};
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait FileStore: Send + Sync {
    /// Store a blob under the given key, overwriting any existing one
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StoreError>;

    /// Fetch a blob by key
    async fn get(&self, key: &str) -> Result<Bytes, StoreError>;

    /// Remove a blob. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;
}

/// Build the file store selected by the configuration
pub async fn build(config: &Config) -> Result<Arc<dyn FileStore>> {
    match config.storage.backend {
        StorageBackend::Local => {
            let dir = config
                .storage
                .local_dir
                .clone()
                .unwrap_or_else(|| config.server.data_dir.join("files"));
            Ok(Arc::new(LocalStore::new(dir).await?))
        }
        StorageBackend::S3 => {
            let bucket = config
                .storage
                .s3_bucket
                .clone()
                .ok_or_else(|| anyhow::anyhow!("storage.s3_bucket is not configured"))?;
            Ok(Arc::new(
                S3Store::new(bucket, config.storage.s3_prefix.clone()).await,
            ))
        }
    }
}

/// Reduce an uploaded file name to a safe basename. Strips any directory
/// components and replaces characters that could not survive a filesystem
/// path or an S3 key.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(name);

    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = cleaned.trim_matches(['.', ' ']).to_string();
    if trimmed.is_empty() {
        "file".to_string()
    } else {
        trimmed
    }
}
