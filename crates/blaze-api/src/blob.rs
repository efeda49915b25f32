//! Blob storage types.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Custom metadata attached to a stored blob. Passed through untouched.
pub type BlobMetadata = BTreeMap<String, String>;

/// Outcome of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResult {
    /// Download URL of the stored blob
    pub url: String,
    pub path: String,
    pub name: String,
    pub content_type: String,
    pub size: u64,
    /// Custom metadata as stored (including `uploadedBy` / `uploadedAt`)
    pub metadata: BlobMetadata,
}

/// Metadata of one stored blob as reported by a listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobEntry {
    pub name: String,
    pub path: String,
    pub url: String,
    pub content_type: Option<String>,
    pub size: u64,
    /// RFC 3339 creation time
    pub time_created: String,
    pub custom_metadata: BlobMetadata,
}

/// One item of a listing. Items whose metadata cannot be fetched are still
/// reported, with the error in place of the metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BlobListing {
    Entry(BlobEntry),
    Unreadable {
        name: String,
        path: String,
        error: String,
    },
}

impl BlobListing {
    pub fn path(&self) -> &str {
        match self {
            BlobListing::Entry(entry) => &entry.path,
            BlobListing::Unreadable { path, .. } => path,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            BlobListing::Entry(entry) => &entry.name,
            BlobListing::Unreadable { name, .. } => name,
        }
    }

    pub fn entry(&self) -> Option<&BlobEntry> {
        match self {
            BlobListing::Entry(entry) => Some(entry),
            BlobListing::Unreadable { .. } => None,
        }
    }
}
