//! Collaborator traits
//!
//! The gateway does not talk to any service directly. These traits are the
//! whole interface it needs from the realtime store, the blob store and the
//! authentication provider. `crate::memory` implements all three in memory;
//! `blaze-rest` implements the store and auth over the vendor REST surface.

use async_trait::async_trait;
use blaze_api::{
    AuthError, BlobEntry, BlobMetadata, StoreError, UserCredential, Value, ValueStream,
};

/// Bytes transferred so far and the total, reported during uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_transferred: u64,
    pub total_bytes: u64,
}

impl TransferProgress {
    /// Completion as a percentage in `0.0..=100.0`. Empty transfers are complete.
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        (self.bytes_transferred as f64 / self.total_bytes as f64 * 100.0).clamp(0.0, 100.0)
    }
}

/// Hierarchical realtime data store.
///
/// Paths are `/`-separated; the empty path is the root. Values handed to
/// writes must not contain `Value::Absent`.
#[async_trait]
pub trait RealtimeStore: Send + Sync {
    /// Replace the value at `path`.
    async fn set(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Merge the children of `value` (an object) into the value at `path`.
    async fn update(&self, path: &str, value: Value) -> Result<(), StoreError>;

    /// Write `value` under a new generated child key of `path`; returns the key.
    async fn push(&self, path: &str, value: Value) -> Result<String, StoreError>;

    /// Current value at `path`; `Value::Null` when nothing is stored there.
    async fn get(&self, path: &str) -> Result<Value, StoreError>;

    /// Delete the subtree at `path`.
    async fn remove(&self, path: &str) -> Result<(), StoreError>;

    /// Listen for changes at `path`.
    ///
    /// Does not wait for the network: the listener is attached when the
    /// stream is first polled. The stream yields the current value first and
    /// then the full value after every change.
    fn subscribe(&self, path: &str) -> ValueStream;
}

/// Blob (file) storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `path`, reporting progress as chunks are accepted.
    async fn upload(
        &self,
        path: &str,
        bytes: Vec<u8>,
        content_type: &str,
        metadata: BlobMetadata,
        on_progress: &(dyn Fn(TransferProgress) + Send + Sync),
    ) -> Result<BlobEntry, StoreError>;

    async fn delete(&self, path: &str) -> Result<(), StoreError>;

    /// Full paths of the blobs stored directly under `prefix`.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;

    /// Metadata and download URL of one blob.
    async fn metadata(&self, path: &str) -> Result<BlobEntry, StoreError>;
}

/// Email + password authentication provider with a current session.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<UserCredential, AuthError>;

    async fn sign_up(&self, email: &str, password: &str) -> Result<UserCredential, AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// The signed-in user, if any.
    fn current_user(&self) -> Option<UserCredential>;

    async fn update_password(
        &self,
        user: &UserCredential,
        new_password: &str,
    ) -> Result<(), AuthError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transfer_progress_percent() {
        let half = TransferProgress {
            bytes_transferred: 512,
            total_bytes: 1024,
        };
        assert_eq!(half.percent(), 50.0);

        let empty = TransferProgress {
            bytes_transferred: 0,
            total_bytes: 0,
        };
        assert_eq!(empty.percent(), 100.0);
    }
}
