//! Wire types of the identity-toolkit and realtime-database REST APIs.

use blaze_api::UserCredential;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordRequest<'a> {
    pub email: &'a str,
    pub password: &'a str,
    pub return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest<'a> {
    pub id_token: &'a str,
    pub password: &'a str,
    pub return_secure_token: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteAccountRequest<'a> {
    pub id_token: &'a str,
}

/// Response of `:signUp`, `:signInWithPassword` and `:update`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountResponse {
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub local_id: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<String>,
}

impl AccountResponse {
    /// `email` fills in when the response omits it.
    pub fn into_credential(self, email: &str) -> UserCredential {
        UserCredential {
            uid: self.local_id.unwrap_or_default(),
            email: self.email.unwrap_or_else(|| email.to_string()),
            id_token: self.id_token,
            refresh_token: self.refresh_token,
            expires_in: self.expires_in,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeleteAccountResponse {
    #[serde(default)]
    pub kind: Option<String>,
}

/// `{ "error": { "code": 400, "message": "EMAIL_EXISTS", "errors": [...] } }`
#[derive(Debug, Clone, Deserialize)]
pub struct AuthErrorBody {
    pub error: AuthErrorDetail,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthErrorDetail {
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub errors: Vec<AuthErrorItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthErrorItem {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Realtime database `POST` response: the generated child key.
#[derive(Debug, Clone, Deserialize)]
pub struct PushResponse {
    pub name: String,
}

/// Realtime database error body: `{ "error": "Permission denied" }`.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseErrorBody {
    pub error: String,
}

/// Data of a `put` or `patch` stream event.
#[derive(Debug, Clone, Deserialize)]
pub struct StreamPayload {
    pub path: String,
    #[serde(default)]
    pub data: serde_json::Value,
}
