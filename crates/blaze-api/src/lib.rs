use serde::{Deserialize, Serialize};

pub mod auth;
pub mod blob;
pub mod streaming;
pub mod value;

pub use auth::{AuthFailure, UserCredential};
pub use blob::{BlobEntry, BlobListing, BlobMetadata, UploadResult};
pub use streaming::ValueStream;
pub use value::{Value, ValueMap};

/// Failure reported by the realtime store or the blob store.
///
/// Collaborators return these as-is; the gateway never reinterprets them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum StoreError {
    #[error("Permission denied: {message}")]
    PermissionDenied { message: String },

    #[error("Not found: {path}")]
    NotFound { path: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Quota exceeded: {message}")]
    Quota { message: String },

    #[error("Invalid data: {message}")]
    InvalidData { message: String },

    #[error("Backend error: {message}")]
    Backend { message: String },
}

impl StoreError {
    pub fn backend(message: impl Into<String>) -> Self {
        StoreError::Backend {
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        StoreError::Network {
            message: message.into(),
        }
    }
}

/// Failure reported by the authentication collaborator.
///
/// `code` is the numeric status the provider attached (HTTP status for the
/// REST surface), `message` its error string, e.g. `EMAIL_NOT_FOUND` or
/// `WEAK_PASSWORD : Password should be at least 6 characters`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{message}")]
pub struct AuthError {
    pub message: String,
    pub code: Option<i64>,
}

impl AuthError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(message: impl Into<String>, code: i64) -> Self {
        Self {
            message: message.into(),
            code: Some(code),
        }
    }

    /// Classify the provider message.
    pub fn failure(&self) -> AuthFailure {
        AuthFailure::from_message(&self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_serialization() {
        let errors = vec![
            StoreError::PermissionDenied {
                message: "rules".to_string(),
            },
            StoreError::NotFound {
                path: "users/1".to_string(),
            },
            StoreError::network("offline"),
            StoreError::Quota {
                message: "too big".to_string(),
            },
            StoreError::InvalidData {
                message: "bad".to_string(),
            },
            StoreError::backend("boom"),
        ];

        for error in errors {
            let json = serde_json::to_string(&error).expect("Failed to serialize error");
            let deserialized: StoreError =
                serde_json::from_str(&json).expect("Failed to deserialize error");
            assert_eq!(error, deserialized);
        }
    }

    #[test]
    fn test_auth_error_display_is_provider_message() {
        let err = AuthError::with_code("EMAIL_NOT_FOUND", 400);
        assert_eq!(err.to_string(), "EMAIL_NOT_FOUND");
        assert_eq!(err.code, Some(400));
        assert_eq!(err.failure(), AuthFailure::UserNotFound);
    }
}
