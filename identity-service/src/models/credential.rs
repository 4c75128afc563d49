//! Credential signals carried by a request, before any of them is trusted.

use std::fmt;
use uuid::Uuid;

use crate::services::error::AuthError;
use crate::services::flags::FeatureFlags;
use crate::utils::Password;

/// Attributes asserted by the trusted upstream proxy. Values are raw header
/// text; nothing here has been validated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FederatedAttributes {
    pub email: Option<String>,
    pub organization: Option<String>,
    pub groups: Option<String>,
}

/// Email and password submitted to the login form.
#[derive(Clone)]
pub struct PasswordLogin {
    pub email: String,
    pub password: Password,
}

impl fmt::Debug for PasswordLogin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordLogin")
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Every credential signal the transport extracted from one request.
#[derive(Debug, Clone, Default)]
pub struct CredentialBundle {
    /// Raw `Authorization` value; may hold several comma-joined keys.
    pub authkey: Option<String>,
    pub federation: Option<FederatedAttributes>,
    /// User id bound to an established session.
    pub session_user: Option<Uuid>,
    pub password_login: Option<PasswordLogin>,
}

/// The single credential chosen from a bundle.
#[derive(Debug, Clone, Copy)]
pub enum Credential<'a> {
    AuthKey(&'a str),
    Federated(&'a FederatedAttributes),
    Session(Uuid),
    Password(&'a PasswordLogin),
}

impl CredentialBundle {
    pub fn with_authkey(authkey: impl Into<String>) -> Self {
        Self {
            authkey: Some(authkey.into()),
            ..Default::default()
        }
    }

    pub fn with_session(user_id: Uuid) -> Self {
        Self {
            session_user: Some(user_id),
            ..Default::default()
        }
    }

    pub fn with_password(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            password_login: Some(PasswordLogin {
                email: email.into(),
                password: Password::new(password.into()),
            }),
            ..Default::default()
        }
    }

    pub fn with_federation(attributes: FederatedAttributes) -> Self {
        Self {
            federation: Some(attributes),
            ..Default::default()
        }
    }

    /// Picks exactly one mechanism: key header, then federation attributes
    /// (only with federation enabled and a mail attribute present), then the
    /// session, then a password login.
    pub fn select(&self, flags: &FeatureFlags) -> Result<Credential<'_>, AuthError> {
        if let Some(key) = self.authkey.as_deref() {
            return Ok(Credential::AuthKey(key));
        }

        if flags.federation.enabled {
            if let Some(attributes) = self.federation.as_ref().filter(|a| a.email.is_some()) {
                return Ok(Credential::Federated(attributes));
            }
        }

        if let Some(user_id) = self.session_user {
            return Ok(Credential::Session(user_id));
        }

        if let Some(login) = self.password_login.as_ref() {
            return Ok(Credential::Password(login));
        }

        Err(AuthError::MissingCredential)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn federated_flags() -> FeatureFlags {
        let mut flags = FeatureFlags::default();
        flags.federation.enabled = true;
        flags
    }

    #[test]
    fn empty_bundle_is_missing_credential() {
        let bundle = CredentialBundle::default();
        assert!(matches!(
            bundle.select(&FeatureFlags::default()),
            Err(AuthError::MissingCredential)
        ));
    }

    #[test]
    fn authkey_wins_over_everything_else() {
        let bundle = CredentialBundle {
            authkey: Some("k".repeat(40)),
            federation: Some(FederatedAttributes {
                email: Some("fed@example.local".into()),
                ..Default::default()
            }),
            session_user: Some(Uuid::new_v4()),
            password_login: None,
        };

        assert!(matches!(
            bundle.select(&federated_flags()),
            Ok(Credential::AuthKey(_))
        ));
    }

    #[test]
    fn federation_requires_enabled_flag_and_mail() {
        let session = Uuid::new_v4();
        let mut bundle = CredentialBundle::with_federation(FederatedAttributes {
            email: Some("fed@example.local".into()),
            ..Default::default()
        });
        bundle.session_user = Some(session);

        assert!(matches!(
            bundle.select(&FeatureFlags::default()),
            Ok(Credential::Session(id)) if id == session
        ));
        assert!(matches!(
            bundle.select(&federated_flags()),
            Ok(Credential::Federated(_))
        ));

        bundle.federation = Some(FederatedAttributes {
            groups: Some("admin".into()),
            ..Default::default()
        });
        assert!(matches!(
            bundle.select(&federated_flags()),
            Ok(Credential::Session(_))
        ));
    }

    #[test]
    fn password_login_is_last_resort() {
        let bundle = CredentialBundle::with_password("a@b.local", "secret-password");
        assert!(matches!(
            bundle.select(&FeatureFlags::default()),
            Ok(Credential::Password(login)) if login.email == "a@b.local"
        ));
        assert!(!format!("{:?}", bundle).contains("secret-password"));
    }
}
