//! Identity-toolkit REST client.
//!
//! Every call is a `POST {auth_url}:{operation}?key={api_key}` with a JSON
//! body. Failures carry the vendor's numeric code and message unchanged.

use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use blaze_api::{AuthError, UserCredential};
use blaze_core::credentials::{validate_email, validate_password};
use blaze_core::AuthProvider;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{ConfigError, RestAuthConfig};
use crate::http::{build_client, describe_error};
use crate::models::{
    AccountResponse, AuthErrorBody, DeleteAccountRequest, DeleteAccountResponse,
    PasswordRequest, UpdatePasswordRequest,
};

const FALLBACK_MESSAGE: &str = "Authentication request failed";

pub struct IdentityToolkitClient {
    config: RestAuthConfig,
    client: reqwest::Client,
    session: RwLock<Option<UserCredential>>,
}

impl IdentityToolkitClient {
    /// Fails when the endpoint or the API key is missing.
    pub fn new(config: RestAuthConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            client: build_client(),
            session: RwLock::new(None),
        })
    }

    pub fn config(&self) -> &RestAuthConfig {
        &self.config
    }

    fn endpoint(&self, operation: &str) -> String {
        format!("{}:{}", self.config.auth_url.trim_end_matches('/'), operation)
    }

    async fn post<B, R>(&self, operation: &str, body: &B) -> Result<R, AuthError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(operation);
        debug!("POST {}", url);

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| AuthError::new(describe_error(e, &url, operation)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| AuthError::new(format!("Failed to read response body from {}: {}", url, e)))?;

        if let Some(error) = parse_auth_error(status.as_u16(), &text) {
            return Err(error);
        }

        serde_json::from_str(&text)
            .map_err(|e| AuthError::new(format!("Failed to parse {} response: {}", operation, e)))
    }

    /// Create an account.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<UserCredential, AuthError> {
        check_email(email)?;
        if !validate_password(password) {
            return Err(AuthError::new("Password must be at least 6 characters long"));
        }

        let response: AccountResponse = self
            .post(
                "signUp",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        info!("Created account for {}", email);
        Ok(response.into_credential(email))
    }

    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<UserCredential, AuthError> {
        check_email(email)?;
        if password.is_empty() {
            return Err(AuthError::new("Password is required"));
        }

        let response: AccountResponse = self
            .post(
                "signInWithPassword",
                &PasswordRequest {
                    email,
                    password,
                    return_secure_token: true,
                },
            )
            .await?;
        Ok(response.into_credential(email))
    }

    /// Sign in with the current password, then set the new one.
    pub async fn change_password(
        &self,
        email: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<UserCredential, AuthError> {
        check_email(email)?;
        if !validate_password(current_password) {
            return Err(AuthError::new("Current password is invalid"));
        }
        if !validate_password(new_password) {
            return Err(AuthError::new(
                "New password must be at least 6 characters long",
            ));
        }

        let signed_in = self.sign_in_with_password(email, current_password).await?;
        let id_token = signed_in.id_token.as_deref().unwrap_or_default();
        self.set_password(id_token, new_password, email).await
    }

    /// Sign in, then delete the account.
    pub async fn delete_user(&self, email: &str, password: &str) -> Result<(), AuthError> {
        check_email(email)?;
        if !validate_password(password) {
            return Err(AuthError::new("Password is invalid"));
        }

        let signed_in = self.sign_in_with_password(email, password).await?;
        let id_token = signed_in.id_token.as_deref().unwrap_or_default();
        let _: DeleteAccountResponse = self
            .post("delete", &DeleteAccountRequest { id_token })
            .await?;
        info!("Deleted account for {}", email);
        Ok(())
    }

    async fn set_password(
        &self,
        id_token: &str,
        new_password: &str,
        email: &str,
    ) -> Result<UserCredential, AuthError> {
        let response: AccountResponse = self
            .post(
                "update",
                &UpdatePasswordRequest {
                    id_token,
                    password: new_password,
                    return_secure_token: true,
                },
            )
            .await?;
        Ok(response.into_credential(email))
    }

    fn set_session(&self, credential: Option<UserCredential>) {
        *self.session.write().unwrap_or_else(PoisonError::into_inner) = credential;
    }
}

fn check_email(email: &str) -> Result<(), AuthError> {
    if !validate_email(email) {
        return Err(AuthError::new("Invalid email format"));
    }
    Ok(())
}

/// The vendor error in `body`, if the response is a failure.
///
/// A non-success status always yields an error, even when the body is not
/// the documented error shape.
pub fn parse_auth_error(status: u16, body: &str) -> Option<AuthError> {
    let parsed = serde_json::from_str::<AuthErrorBody>(body).ok();
    let success = (200..300).contains(&status);

    match parsed {
        Some(AuthErrorBody { error }) => Some(AuthError {
            message: error
                .message
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
            code: error.code.or(Some(status as i64)),
        }),
        None if !success => Some(AuthError::with_code(FALLBACK_MESSAGE, status as i64)),
        None => None,
    }
}

#[async_trait]
impl AuthProvider for IdentityToolkitClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<UserCredential, AuthError> {
        let credential = self.sign_in_with_password(email, password).await?;
        self.set_session(Some(credential.clone()));
        Ok(credential)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<UserCredential, AuthError> {
        let credential = IdentityToolkitClient::sign_up(self, email, password).await?;
        self.set_session(Some(credential.clone()));
        Ok(credential)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.set_session(None);
        Ok(())
    }

    fn current_user(&self) -> Option<UserCredential> {
        self.session
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    async fn update_password(
        &self,
        user: &UserCredential,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let id_token = user
            .id_token
            .as_deref()
            .ok_or_else(|| AuthError::new("INVALID_ID_TOKEN"))?;
        let refreshed = self.set_password(id_token, new_password, &user.email).await?;
        self.set_session(Some(refreshed));
        Ok(())
    }
}
