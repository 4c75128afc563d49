//! Interactive login and session resumption.

use std::sync::Arc;
use uuid::Uuid;

use super::admission::admit;
use super::error::{AuthError, StoreError};
use super::flags::FeatureFlags;
use super::store::CredentialStore;
use crate::models::{AuthMethod, AuthenticatedIdentity, PasswordLogin};
use crate::utils::{verify_password, PasswordHashString};

#[derive(Clone)]
pub struct SessionAuthenticator {
    store: Arc<dyn CredentialStore>,
}

impl SessionAuthenticator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// Email/password login. A pending forced password change does not block
    /// the login.
    pub async fn login(
        &self,
        login: &PasswordLogin,
        flags: &FeatureFlags,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        if !flags.form_login_available() {
            return Err(AuthError::LoginFormUnavailable);
        }

        let user = self
            .store
            .find_user_by_email(&login.email)
            .await?
            .ok_or(AuthError::InvalidCredential)?;

        let hash = user
            .password_hash
            .clone()
            .ok_or(AuthError::InvalidCredential)?;
        verify_password(&login.password, &PasswordHashString::new(hash))
            .map_err(|_| AuthError::InvalidCredential)?;

        admit(self.store.as_ref(), user, AuthMethod::Password, flags).await
    }

    /// Re-validates the user behind an established session. Disabling the
    /// account or taking the platform offline ends existing sessions.
    pub async fn resume(
        &self,
        user_id: Uuid,
        flags: &FeatureFlags,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let user = match self.store.get_user(user_id).await {
            Ok(user) => user,
            Err(StoreError::NotFound(_)) => return Err(AuthError::InvalidCredential),
            Err(e) => return Err(e.into()),
        };

        admit(self.store.as_ref(), user, AuthMethod::Session, flags).await
    }
}
