use std::sync::Arc;

use anyhow::Result;
use blaze_core::memory::{memory_backend, MemoryAuth, MemoryBlobStore, MemoryStore};
use blaze_core::{Backend, Connection};
use blaze_rest::{IdentityToolkitClient, ProjectConfig, RestDatabase};
use tracing::info;

/// Which collaborators a connection ended up with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Memory,
    Remote,
}

/// Remote collaborators for whatever the environment configures, in-memory
/// ones for the rest. Blobs always stay in memory.
pub fn connect(memory_only: bool) -> Result<(Connection, Origin)> {
    let config = ProjectConfig::from_env();
    if memory_only || (config.database_url.is_none() && config.api_key.is_none()) {
        let (backend, _store, _auth, _blobs) = memory_backend();
        info!("Using in-memory backend");
        return Ok((Connection::initialized(backend), Origin::Memory));
    }

    let mut backend = Backend::new().with_blobs(Arc::new(MemoryBlobStore::new()));

    backend = match &config.database_url {
        Some(url) => {
            info!("Using realtime database at {}", url);
            backend.with_database(Arc::new(RestDatabase::new(config.database_config())?))
        }
        None => backend.with_database(Arc::new(MemoryStore::new())),
    };

    backend = match &config.api_key {
        Some(_) => {
            let client = IdentityToolkitClient::new(config.auth_config())?;
            info!("Using identity toolkit at {}", client.config().auth_url);
            backend.with_auth(Arc::new(client))
        }
        None => backend.with_auth(Arc::new(MemoryAuth::new())),
    };

    Ok((Connection::initialized(backend), Origin::Remote))
}
