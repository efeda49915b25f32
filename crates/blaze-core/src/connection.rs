//! Process-wide backend handle.
//!
//! A `Connection` starts empty and is initialized once, at application
//! start, with the collaborators the application uses. Gateways hold clones
//! and only ever read it.

use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::error::{GatewayError, Result};
use crate::traits::{AuthProvider, BlobStore, RealtimeStore};

/// The set of collaborators behind a connection. Any of them may be missing;
/// operations that need a missing one fail with `NotInitialized`.
#[derive(Clone, Default)]
pub struct Backend {
    database: Option<Arc<dyn RealtimeStore>>,
    auth: Option<Arc<dyn AuthProvider>>,
    blobs: Option<Arc<dyn BlobStore>>,
}

impl Backend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_database(mut self, database: Arc<dyn RealtimeStore>) -> Self {
        self.database = Some(database);
        self
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_blobs(mut self, blobs: Arc<dyn BlobStore>) -> Self {
        self.blobs = Some(blobs);
        self
    }
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Backend")
            .field("database", &self.database.is_some())
            .field("auth", &self.auth.is_some())
            .field("blobs", &self.blobs.is_some())
            .finish()
    }
}

/// Shared, initialize-once handle to a [`Backend`].
#[derive(Clone, Default, Debug)]
pub struct Connection {
    backend: Arc<OnceLock<Backend>>,
}

impl Connection {
    /// An uninitialized connection.
    pub fn new() -> Self {
        Self::default()
    }

    /// A connection that is already initialized with `backend`.
    pub fn initialized(backend: Backend) -> Self {
        let connection = Self::new();
        // A fresh cell cannot already be set.
        let _ = connection.backend.set(backend);
        connection
    }

    /// Initialize the connection. Every clone sees the backend afterwards.
    ///
    /// Returns the backend back if the connection was already initialized.
    pub fn initialize(&self, backend: Backend) -> std::result::Result<(), Backend> {
        self.backend.set(backend)?;
        tracing::info!("Backend connection initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.backend.get().is_some()
    }

    fn backend(&self) -> Result<&Backend> {
        self.backend.get().ok_or(GatewayError::NotInitialized {
            component: "backend",
        })
    }

    pub fn database(&self) -> Result<Arc<dyn RealtimeStore>> {
        self.backend()?
            .database
            .clone()
            .ok_or(GatewayError::NotInitialized {
                component: "realtime database",
            })
    }

    pub fn auth(&self) -> Result<Arc<dyn AuthProvider>> {
        self.backend()?
            .auth
            .clone()
            .ok_or(GatewayError::NotInitialized {
                component: "auth provider",
            })
    }

    pub fn blobs(&self) -> Result<Arc<dyn BlobStore>> {
        self.backend()?
            .blobs
            .clone()
            .ok_or(GatewayError::NotInitialized {
                component: "blob store",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;

    #[test]
    fn test_uninitialized_connection() {
        let connection = Connection::new();
        assert!(!connection.is_initialized());
        assert!(matches!(
            connection.database(),
            Err(GatewayError::NotInitialized { .. })
        ));
        assert!(matches!(
            connection.auth(),
            Err(GatewayError::NotInitialized { .. })
        ));
    }

    #[test]
    fn test_initialize_is_visible_to_clones_and_happens_once() {
        let connection = Connection::new();
        let clone = connection.clone();

        let backend = Backend::new().with_database(Arc::new(MemoryStore::new()));
        connection.initialize(backend.clone()).unwrap();

        assert!(clone.is_initialized());
        assert!(clone.database().is_ok());
        assert!(connection.initialize(backend).is_err());
    }

    #[test]
    fn test_missing_collaborator_is_not_initialized() {
        let connection =
            Connection::initialized(Backend::new().with_database(Arc::new(MemoryStore::new())));

        match connection.blobs() {
            Err(GatewayError::NotInitialized { component }) => {
                assert_eq!(component, "blob store")
            }
            other => panic!("expected NotInitialized, got {:?}", other.map(|_| ())),
        }
    }
}
