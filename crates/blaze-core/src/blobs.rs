//! Blob upload, delete and listing.
//!
//! Blob data and metadata pass through unsanitized. Uploads get
//! `uploadedBy` / `uploadedAt` added to their custom metadata.

use std::sync::Arc;

use blaze_api::{BlobListing, BlobMetadata, UploadResult};
use chrono::Utc;
use futures::future::join_all;
use tracing::{debug, error, info};

use crate::audit::{format_timestamp, ANONYMOUS_ACTOR};
use crate::connection::Connection;
use crate::error::{GatewayError, Result};
use crate::traits::TransferProgress;

/// Receives upload progress as a percentage in `0.0..=100.0`.
pub type ProgressCallback = Arc<dyn Fn(f64) + Send + Sync>;

/// Error recorded for listing items whose metadata could not be fetched.
pub const UNREADABLE_METADATA: &str = "Failed to load metadata";

/// One file to upload.
#[derive(Debug, Clone, Default)]
pub struct UploadRequest {
    /// Full destination path, e.g. `avatars/u1/photo.png`
    pub path: String,
    /// Original file name
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
    pub metadata: BlobMetadata,
    /// Recorded as `uploadedBy`; `"anonymous"` when unset.
    pub actor_id: Option<String>,
}

impl UploadRequest {
    pub fn new(path: impl Into<String>, bytes: Vec<u8>) -> Self {
        let path = path.into();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self {
            path,
            name,
            bytes,
            ..Default::default()
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn by(mut self, actor_id: impl Into<String>) -> Self {
        self.actor_id = Some(actor_id.into());
        self
    }
}

/// Blob operations against the connection's blob store.
#[derive(Clone, Debug)]
pub struct BlobGateway {
    connection: Connection,
}

impl BlobGateway {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub async fn upload(
        &self,
        request: UploadRequest,
        on_progress: Option<ProgressCallback>,
    ) -> Result<UploadResult> {
        let store = self.connection.blobs()?;
        if request.path.trim().is_empty() {
            return Err(GatewayError::validation("path must not be empty"));
        }

        let mut metadata = request.metadata;
        metadata.insert(
            "uploadedBy".to_string(),
            request
                .actor_id
                .unwrap_or_else(|| ANONYMOUS_ACTOR.to_string()),
        );
        metadata.insert("uploadedAt".to_string(), format_timestamp(Utc::now()));

        let path = request.path;
        let report = |progress: TransferProgress| {
            let percent = progress.percent();
            debug!("Upload of '{}' is {}% done", path, percent);
            if let Some(callback) = &on_progress {
                callback(percent);
            }
        };

        let size = request.bytes.len() as u64;
        let entry = store
            .upload(&path, request.bytes, &request.content_type, metadata, &report)
            .await
            .map_err(|e| {
                error!("Upload of '{}' failed: {}", path, e);
                GatewayError::store("upload", &path, e)
            })?;

        info!("Uploaded '{}' ({} bytes)", path, size);
        Ok(UploadResult {
            url: entry.url,
            path,
            name: request.name,
            content_type: request.content_type,
            size,
            metadata: entry.custom_metadata,
        })
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        let store = self.connection.blobs()?;
        store
            .delete(path)
            .await
            .map_err(|e| GatewayError::store("delete", path, e))?;
        debug!("Deleted blob '{}'", path);
        Ok(())
    }

    /// Everything stored directly under `prefix`, with metadata.
    ///
    /// Items whose metadata cannot be fetched are reported as
    /// [`BlobListing::Unreadable`] rather than failing the listing.
    pub async fn list(&self, prefix: &str) -> Result<Vec<BlobListing>> {
        let store = self.connection.blobs()?;
        let paths = store
            .list(prefix)
            .await
            .map_err(|e| GatewayError::store("list", prefix, e))?;

        let listings = paths.into_iter().map(|path| {
            let store = store.clone();
            async move {
                match store.metadata(&path).await {
                    Ok(entry) => BlobListing::Entry(entry),
                    Err(e) => {
                        error!("Error getting metadata for {}: {}", path, e);
                        BlobListing::Unreadable {
                            name: path.rsplit('/').next().unwrap_or_default().to_string(),
                            path,
                            error: UNREADABLE_METADATA.to_string(),
                        }
                    }
                }
            }
        });

        Ok(join_all(listings).await)
    }
}
