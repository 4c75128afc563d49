//! Authkey validation for primary and advanced keys.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use super::admission::admit;
use super::error::{AuthError, StoreError};
use super::flags::FeatureFlags;
use super::store::CredentialStore;
use crate::models::{AuthMethod, AuthenticatedIdentity};
use crate::utils::token;

#[derive(Clone)]
pub struct KeyValidator {
    store: Arc<dyn CredentialStore>,
}

impl KeyValidator {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn validate(
        &self,
        raw: &str,
        flags: &FeatureFlags,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        self.validate_on(raw, flags, Utc::now().date_naive()).await
    }

    /// Tries each comma-separated candidate independently; the first one
    /// that authenticates wins. When all fail, the most specific failure is
    /// reported.
    pub async fn validate_on(
        &self,
        raw: &str,
        flags: &FeatureFlags,
        today: NaiveDate,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let candidates = token::split_candidates(raw);
        if candidates.is_empty() {
            return Err(AuthError::MissingCredential);
        }

        let mut failure: Option<AuthError> = None;
        for candidate in candidates {
            match self.validate_candidate(candidate, flags, today).await {
                Ok(identity) => return Ok(identity),
                Err(AuthError::Internal(e)) => return Err(AuthError::Internal(e)),
                Err(e) => {
                    let replace = failure
                        .as_ref()
                        .map_or(true, |current| e.key_failure_weight() > current.key_failure_weight());
                    if replace {
                        failure = Some(e);
                    }
                }
            }
        }

        Err(failure.unwrap_or(AuthError::InvalidCredential))
    }

    async fn validate_candidate(
        &self,
        candidate: &str,
        flags: &FeatureFlags,
        today: NaiveDate,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        if !token::is_well_formed(candidate) {
            return Err(AuthError::MalformedCredential);
        }

        let digest = token::hash_authkey(candidate);

        if let Some(key) = self.store.find_auth_key_by_hash(&digest).await? {
            if !token::digests_match(&key.token_hash, &digest) || key.is_expired_on(today) {
                return Err(AuthError::InvalidCredential);
            }
            let user = match self.store.get_user(key.user_id).await {
                Ok(user) => user,
                Err(StoreError::NotFound(_)) => return Err(AuthError::InvalidCredential),
                Err(e) => return Err(e.into()),
            };
            return admit(
                self.store.as_ref(),
                user,
                AuthMethod::AdvancedAuthKey { key_id: key.id },
                flags,
            )
            .await;
        }

        if flags.advanced_authkeys_required {
            return Err(AuthError::InvalidCredential);
        }

        match self.store.find_user_by_authkey_hash(&digest).await? {
            Some(user) if token::digests_match(&user.authkey_hash, &digest) => {
                admit(self.store.as_ref(), user, AuthMethod::AuthKey, flags).await
            }
            _ => Err(AuthError::InvalidCredential),
        }
    }
}
