use blaze_api::{AuthError, StoreError};

pub type Result<T> = std::result::Result<T, GatewayError>;

/// Failure of a gateway operation.
///
/// Callers branch on the kind: a missing backend, a request rejected before
/// anything was sent, an unrecognized action, or a failure reported by a
/// collaborator (kept verbatim as the source).
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Backend not initialized: no {component} configured")]
    NotInitialized { component: &'static str },

    #[error("Validation failed: {message}")]
    Validation { message: String },

    #[error("Unsupported action: {action}")]
    UnsupportedAction { action: String },

    #[error("Backing store rejected {operation} at '{path}': {source}")]
    BackingStore {
        operation: &'static str,
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),
}

impl GatewayError {
    pub fn validation(message: impl Into<String>) -> Self {
        GatewayError::Validation {
            message: message.into(),
        }
    }

    pub(crate) fn store(operation: &'static str, path: &str, source: StoreError) -> Self {
        GatewayError::BackingStore {
            operation,
            path: path.to_string(),
            source,
        }
    }

    pub fn is_not_initialized(&self) -> bool {
        matches!(self, GatewayError::NotInitialized { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, GatewayError::Validation { .. })
    }

    pub fn is_unsupported_action(&self) -> bool {
        matches!(self, GatewayError::UnsupportedAction { .. })
    }

    /// The collaborator error, for backing-store failures.
    pub fn store_error(&self) -> Option<&StoreError> {
        match self {
            GatewayError::BackingStore { source, .. } => Some(source),
            _ => None,
        }
    }

    /// The provider error, for credential-flow failures.
    pub fn auth_error(&self) -> Option<&AuthError> {
        match self {
            GatewayError::Auth(err) => Some(err),
            _ => None,
        }
    }
}
