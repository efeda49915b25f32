//! Email + password credential flows.
//!
//! Inputs are validated locally before the provider is contacted. Provider
//! failures are surfaced unchanged as `GatewayError::Auth`.

use std::sync::OnceLock;

use blaze_api::UserCredential;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::connection::Connection;
use crate::error::{GatewayError, Result};

pub const MIN_PASSWORD_LENGTH: usize = 6;

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid")
    })
}

/// `local@domain.tld` with no whitespace and exactly one `@`.
pub fn validate_email(email: &str) -> bool {
    email_pattern().is_match(email)
}

/// At least six characters.
pub fn validate_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LENGTH
}

fn check_email_password(email: &str, password: &str) -> Result<()> {
    if email.is_empty() || password.is_empty() {
        return Err(GatewayError::validation("Email and password are required"));
    }
    if !validate_email(email) {
        return Err(GatewayError::validation("Invalid email format"));
    }
    check_password(password)
}

fn check_password(password: &str) -> Result<()> {
    if !validate_password(password) {
        return Err(GatewayError::validation(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        )));
    }
    Ok(())
}

/// A credential request as it arrives from scripts or JSON input:
/// `{ "action": "login", "email": ..., "password": ... }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum AuthAction {
    Login { email: String, password: String },
    Signup { email: String, password: String },
    Logout,
    #[serde(rename_all = "camelCase")]
    ChangePassword { new_password: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Credential(UserCredential),
    Done,
}

impl AuthOutcome {
    pub fn into_credential(self) -> Option<UserCredential> {
        match self {
            AuthOutcome::Credential(credential) => Some(credential),
            AuthOutcome::Done => None,
        }
    }
}

/// Credential operations against the connection's auth provider.
#[derive(Clone, Debug)]
pub struct CredentialGateway {
    connection: Connection,
}

impl CredentialGateway {
    pub fn new(connection: Connection) -> Self {
        Self { connection }
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<UserCredential> {
        let auth = self.connection.auth()?;
        check_email_password(email, password)?;

        let credential = auth.sign_in(email, password).await.map_err(|e| {
            error!("Login failed for {}: {}", email, e);
            GatewayError::from(e)
        })?;
        info!("Signed in {}", credential.uid);
        Ok(credential)
    }

    pub async fn signup(&self, email: &str, password: &str) -> Result<UserCredential> {
        let auth = self.connection.auth()?;
        check_email_password(email, password)?;

        let credential = auth.sign_up(email, password).await.map_err(|e| {
            error!("Signup failed for {}: {}", email, e);
            GatewayError::from(e)
        })?;
        info!("Created account {}", credential.uid);
        Ok(credential)
    }

    pub async fn logout(&self) -> Result<()> {
        let auth = self.connection.auth()?;
        auth.sign_out().await?;
        info!("Signed out");
        Ok(())
    }

    /// Change the password of the signed-in user.
    pub async fn change_password(&self, new_password: &str) -> Result<()> {
        let auth = self.connection.auth()?;
        let user = auth
            .current_user()
            .ok_or_else(|| GatewayError::validation("User not found"))?;
        check_password(new_password)?;

        auth.update_password(&user, new_password).await?;
        info!("Changed password for {}", user.uid);
        Ok(())
    }

    pub async fn execute(&self, action: AuthAction) -> Result<AuthOutcome> {
        match action {
            AuthAction::Login { email, password } => self
                .login(&email, &password)
                .await
                .map(AuthOutcome::Credential),
            AuthAction::Signup { email, password } => self
                .signup(&email, &password)
                .await
                .map(AuthOutcome::Credential),
            AuthAction::Logout => self.logout().await.map(|_| AuthOutcome::Done),
            AuthAction::ChangePassword { new_password } => self
                .change_password(&new_password)
                .await
                .map(|_| AuthOutcome::Done),
        }
    }
}
