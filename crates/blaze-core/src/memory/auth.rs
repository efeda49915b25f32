//! In-memory email + password provider.
//!
//! Fails with the same message codes the hosted identity service uses
//! (`EMAIL_EXISTS`, `EMAIL_NOT_FOUND`, `INVALID_PASSWORD`), each with code 400.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use blaze_api::{AuthError, UserCredential};
use uuid::Uuid;

use crate::traits::AuthProvider;

const BAD_REQUEST: i64 = 400;

#[derive(Debug, Clone)]
struct Account {
    uid: String,
    password: String,
}

#[derive(Debug, Default)]
struct AuthState {
    accounts: HashMap<String, Account>,
    current: Option<UserCredential>,
}

/// Accounts and the current session, held in memory.
#[derive(Debug, Default)]
pub struct MemoryAuth {
    state: RwLock<AuthState>,
}

impl MemoryAuth {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user_count(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .accounts
            .len()
    }

    fn credential(uid: &str, email: &str) -> UserCredential {
        UserCredential {
            id_token: Some(Uuid::new_v4().to_string()),
            refresh_token: Some(Uuid::new_v4().to_string()),
            expires_in: Some("3600".to_string()),
            ..UserCredential::new(uid, email)
        }
    }
}

#[async_trait]
impl AuthProvider for MemoryAuth {
    async fn sign_in(&self, email: &str, password: &str) -> Result<UserCredential, AuthError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let account = state
            .accounts
            .get(email)
            .ok_or_else(|| AuthError::with_code("EMAIL_NOT_FOUND", BAD_REQUEST))?;
        if account.password != password {
            return Err(AuthError::with_code("INVALID_PASSWORD", BAD_REQUEST));
        }

        let credential = Self::credential(&account.uid, email);
        state.current = Some(credential.clone());
        Ok(credential)
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<UserCredential, AuthError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.accounts.contains_key(email) {
            return Err(AuthError::with_code("EMAIL_EXISTS", BAD_REQUEST));
        }

        let uid = Uuid::new_v4().simple().to_string();
        state.accounts.insert(
            email.to_string(),
            Account {
                uid: uid.clone(),
                password: password.to_string(),
            },
        );

        let credential = Self::credential(&uid, email);
        state.current = Some(credential.clone());
        Ok(credential)
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        self.state
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .current = None;
        Ok(())
    }

    fn current_user(&self) -> Option<UserCredential> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    async fn update_password(
        &self,
        user: &UserCredential,
        new_password: &str,
    ) -> Result<(), AuthError> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let account = state
            .accounts
            .get_mut(&user.email)
            .filter(|account| account.uid == user.uid)
            .ok_or_else(|| AuthError::with_code("USER_NOT_FOUND", BAD_REQUEST))?;
        account.password = new_password.to_string();
        Ok(())
    }
}
