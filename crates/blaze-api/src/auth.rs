//! Credential-flow types shared by the auth collaborators and the gateway.

use serde::{Deserialize, Serialize};

/// Signed-in (or freshly created) user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserCredential {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Token lifetime in seconds, as reported by the provider.
    #[serde(default)]
    pub expires_in: Option<String>,
}

impl UserCredential {
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            email: email.into(),
            id_token: None,
            refresh_token: None,
            expires_in: None,
        }
    }
}

/// Coarse classification of provider error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthFailure {
    EmailExists,
    UserNotFound,
    WrongPassword,
    WeakPassword,
    InvalidEmail,
    UserDisabled,
    TooManyAttempts,
    TokenExpired,
    Other,
}

impl AuthFailure {
    /// Provider messages look like `CODE` or `CODE : detail`.
    pub fn from_message(message: &str) -> Self {
        let code = message.split(':').next().unwrap_or_default().trim();
        match code {
            "EMAIL_EXISTS" => AuthFailure::EmailExists,
            "EMAIL_NOT_FOUND" | "USER_NOT_FOUND" => AuthFailure::UserNotFound,
            "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => AuthFailure::WrongPassword,
            "WEAK_PASSWORD" => AuthFailure::WeakPassword,
            "INVALID_EMAIL" => AuthFailure::InvalidEmail,
            "USER_DISABLED" => AuthFailure::UserDisabled,
            "TOO_MANY_ATTEMPTS_TRY_LATER" => AuthFailure::TooManyAttempts,
            "TOKEN_EXPIRED" | "INVALID_ID_TOKEN" | "CREDENTIAL_TOO_OLD_LOGIN_AGAIN" => {
                AuthFailure::TokenExpired
            }
            _ => AuthFailure::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_from_message() {
        assert_eq!(
            AuthFailure::from_message("EMAIL_EXISTS"),
            AuthFailure::EmailExists
        );
        assert_eq!(
            AuthFailure::from_message("WEAK_PASSWORD : Password should be at least 6 characters"),
            AuthFailure::WeakPassword
        );
        assert_eq!(
            AuthFailure::from_message("INVALID_PASSWORD"),
            AuthFailure::WrongPassword
        );
        assert_eq!(AuthFailure::from_message("something else"), AuthFailure::Other);
    }

    #[test]
    fn test_credential_camel_case() {
        let json = r#"{"uid":"u1","email":"a@b.co","idToken":"t"}"#;
        let cred: UserCredential = serde_json::from_str(json).unwrap();
        assert_eq!(cred.id_token.as_deref(), Some("t"));
        assert_eq!(cred.refresh_token, None);
    }
}
