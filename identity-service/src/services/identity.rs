//! Service facade: authentication entry point plus the collaborators every
//! administrative operation needs.

use std::sync::Arc;

use super::error::AuthError;
use super::federation::FederationResolver;
use super::flags::{FeatureFlags, FlagStore};
use super::key_validator::KeyValidator;
use super::policy::{Action, Decision, PolicyEngine, Target};
use super::session::SessionAuthenticator;
use super::store::CredentialStore;
use crate::models::{AuthenticatedIdentity, Credential, CredentialBundle};

#[derive(Clone)]
pub struct IdentityService {
    pub(crate) store: Arc<dyn CredentialStore>,
    pub(crate) flags: FlagStore,
    keys: KeyValidator,
    sessions: SessionAuthenticator,
    federation: FederationResolver,
    /// Organization self-registered accounts land in when federation does not
    /// name a default one.
    pub(crate) registration_org: Option<String>,
}

impl IdentityService {
    pub fn new(store: Arc<dyn CredentialStore>, flags: FlagStore) -> Self {
        Self {
            keys: KeyValidator::new(store.clone()),
            sessions: SessionAuthenticator::new(store.clone()),
            federation: FederationResolver::new(store.clone()),
            store,
            flags,
            registration_org: None,
        }
    }

    pub fn with_registration_org(mut self, name: impl Into<String>) -> Self {
        self.registration_org = Some(name.into());
        self
    }

    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    pub fn flags(&self) -> &FlagStore {
        &self.flags
    }

    /// Resolves the request's credentials against the current flag snapshot.
    pub async fn authenticate(
        &self,
        bundle: &CredentialBundle,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let snapshot = self.flags.snapshot();
        self.authenticate_with(bundle, &snapshot.flags).await
    }

    pub async fn authenticate_with(
        &self,
        bundle: &CredentialBundle,
        flags: &FeatureFlags,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let credential = bundle.select(flags)?;
        let method = match credential {
            Credential::AuthKey(_) => "authkey",
            Credential::Federated(_) => "federated",
            Credential::Session(_) => "session",
            Credential::Password(_) => "password",
        };

        let result = match credential {
            Credential::AuthKey(raw) => self.keys.validate(raw, flags).await,
            Credential::Federated(attributes) => self.federation.resolve(attributes, flags).await,
            Credential::Session(user_id) => self.sessions.resume(user_id, flags).await,
            Credential::Password(login) => self.sessions.login(login, flags).await,
        };

        match &result {
            Ok(identity) => tracing::debug!(
                user_id = %identity.user_id(),
                auth_method = %identity.auth_method,
                "Authenticated"
            ),
            Err(AuthError::Internal(e)) => tracing::error!(
                auth_method = method,
                error = %e,
                "Authentication failed with internal error"
            ),
            Err(e) => tracing::warn!(auth_method = method, failure = e.kind(), "Authentication failed"),
        }

        result
    }

    pub fn authorize(
        &self,
        actor: &AuthenticatedIdentity,
        action: &Action<'_>,
        target: &Target<'_>,
    ) -> Decision {
        let snapshot = self.flags.snapshot();
        PolicyEngine::authorize(actor, action, target, &snapshot.flags)
    }
}
