//! In-memory collaborators for tests, demos and offline use.

pub mod auth;
pub mod blobs;
pub mod push_id;
pub mod store;

pub use auth::MemoryAuth;
pub use blobs::MemoryBlobStore;
pub use push_id::PushIdGenerator;
pub use store::{MemoryStore, RecordedWrite, WriteKind};

use std::sync::Arc;

use crate::connection::Backend;

/// A backend with all three collaborators in memory.
pub fn memory_backend() -> (Backend, Arc<MemoryStore>, Arc<MemoryAuth>, Arc<MemoryBlobStore>) {
    let store = Arc::new(MemoryStore::new());
    let auth = Arc::new(MemoryAuth::new());
    let blobs = Arc::new(MemoryBlobStore::new());
    let backend = Backend::new()
        .with_database(store.clone())
        .with_auth(auth.clone())
        .with_blobs(blobs.clone());
    (backend, store, auth, blobs)
}
