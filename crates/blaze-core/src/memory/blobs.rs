//! In-memory blob store.

use std::collections::{BTreeMap, HashSet};
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use blaze_api::{BlobEntry, BlobMetadata, StoreError};
use chrono::Utc;
use uuid::Uuid;

use crate::audit::format_timestamp;
use crate::traits::{BlobStore, TransferProgress};

const DEFAULT_CHUNK_SIZE: usize = 256 * 1024;

#[derive(Debug, Clone)]
struct StoredBlob {
    bytes: Vec<u8>,
    entry: BlobEntry,
}

#[derive(Debug, Default)]
struct BlobState {
    blobs: BTreeMap<String, StoredBlob>,
    unreadable: HashSet<String>,
}

/// Blobs keyed by full path. Uploads report progress once per chunk.
#[derive(Debug)]
pub struct MemoryBlobStore {
    state: RwLock<BlobState>,
    chunk_size: usize,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::with_chunk_size(DEFAULT_CHUNK_SIZE)
    }

    pub fn with_chunk_size(chunk_size: usize) -> Self {
        Self {
            state: RwLock::default(),
            chunk_size: chunk_size.max(1),
        }
    }

    /// Make metadata lookups for `path` fail.
    pub fn mark_unreadable(&self, path: &str) {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .unreadable
            .insert(path.to_string());
    }

    /// Stored bytes at `path`, if any.
    pub fn bytes(&self, path: &str) -> Option<Vec<u8>> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .blobs
            .get(path)
            .map(|blob| blob.bytes.clone())
    }
}

fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

fn parent(path: &str) -> &str {
    path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or("")
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: BlobMetadata,
        on_progress: &(dyn Fn(TransferProgress) + Send + Sync),
    ) -> Result<BlobEntry, StoreError> {
        let total_bytes = bytes.len() as u64;
        on_progress(TransferProgress {
            bytes_transferred: 0,
            total_bytes,
        });
        let mut transferred = 0u64;
        for chunk in bytes.chunks(self.chunk_size) {
            transferred += chunk.len() as u64;
            on_progress(TransferProgress {
                bytes_transferred: transferred,
                total_bytes,
            });
        }

        let entry = BlobEntry {
            name: file_name(path).to_string(),
            path: path.to_string(),
            url: format!("memory://{}?token={}", path, Uuid::new_v4()),
            content_type: (!content_type.is_empty()).then(|| content_type.to_string()),
            size: total_bytes,
            time_created: format_timestamp(Utc::now()),
            custom_metadata: metadata,
        };

        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .blobs
            .insert(
                path.to_string(),
                StoredBlob {
                    bytes,
                    entry: entry.clone(),
                },
            );
        Ok(entry)
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .blobs
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let prefix = prefix.trim_matches('/');
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        Ok(state
            .blobs
            .keys()
            .filter(|path| parent(path) == prefix)
            .cloned()
            .collect())
    }

    async fn metadata(&self, path: &str) -> Result<BlobEntry, StoreError> {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        if state.unreadable.contains(path) {
            return Err(StoreError::PermissionDenied {
                message: format!("cannot read metadata of {}", path),
            });
        }
        state
            .blobs
            .get(path)
            .map(|blob| blob.entry.clone())
            .ok_or_else(|| StoreError::NotFound {
                path: path.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[tokio::test]
    async fn test_upload_reports_each_chunk() {
        let store = MemoryBlobStore::with_chunk_size(3);
        let seen = Mutex::new(Vec::new());

        let entry = store
            .upload("a/b.bin", vec![0; 7], "", BlobMetadata::new(), &|p: TransferProgress| {
                seen.lock().unwrap().push(p.bytes_transferred)
            })
            .await
            .unwrap();

        assert_eq!(*seen.lock().unwrap(), vec![0, 3, 6, 7]);
        assert_eq!(entry.name, "b.bin");
        assert_eq!(entry.content_type, None);
        assert!(entry.url.starts_with("memory://a/b.bin"));
        assert_eq!(store.bytes("a/b.bin"), Some(vec![0; 7]));
    }

    #[tokio::test]
    async fn test_list_is_not_recursive() {
        let store = MemoryBlobStore::new();
        for path in ["docs/a.txt", "docs/sub/b.txt", "other/c.txt"] {
            store
                .upload(path, vec![1], "text/plain", BlobMetadata::new(), &|_: TransferProgress| {})
                .await
                .unwrap();
        }

        assert_eq!(store.list("docs").await.unwrap(), vec!["docs/a.txt"]);
        assert_eq!(store.list("/docs/sub/").await.unwrap(), vec!["docs/sub/b.txt"]);
    }
}
