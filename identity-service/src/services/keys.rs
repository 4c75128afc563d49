//! Authkey issuance, revocation and rotation.

use chrono::Utc;
use uuid::Uuid;

use super::error::AuthError;
use super::identity::IdentityService;
use super::policy::{Action, Target};
use crate::models::{
    AdvancedAuthKey, AuthKeyView, AuthenticatedIdentity, IssuedAuthKey, KeyOptions, User,
};
use crate::utils::token;

impl IdentityService {
    /// Checks `action` against the owner of a key.
    async fn authorize_over_user(
        &self,
        actor: &AuthenticatedIdentity,
        action: Action<'_>,
        user: &User,
    ) -> Result<(), AuthError> {
        let role = self.store.get_role(user.role_id).await?;
        self.authorize(actor, &action, &Target::User { user, role: &role })
            .into_result()
            .map(|_| ())
    }

    /// Issues an advanced key. The raw token is only in the return value.
    pub async fn issue_advanced_key(
        &self,
        actor: &AuthenticatedIdentity,
        user_id: Uuid,
        options: KeyOptions,
    ) -> Result<IssuedAuthKey, AuthError> {
        let user = self.store.get_user(user_id).await?;
        self.authorize_over_user(actor, Action::ManageAuthKeys, &user).await?;

        let raw = token::generate_authkey();
        let key = AdvancedAuthKey::new(user.id, &raw, options);
        self.store.insert_auth_key(&key).await?;

        tracing::info!(actor_id = %actor.user_id(), user_id = %user.id, key_id = %key.id, "Advanced authkey issued");
        Ok(IssuedAuthKey {
            key: key.view(),
            authkey_raw: raw,
        })
    }

    pub async fn revoke_advanced_key(
        &self,
        actor: &AuthenticatedIdentity,
        key_id: Uuid,
    ) -> Result<(), AuthError> {
        let key = self.store.get_auth_key(key_id).await?;
        let owner = self.store.get_user(key.user_id).await?;
        self.authorize_over_user(actor, Action::ManageAuthKeys, &owner).await?;

        self.store.delete_auth_key(key.id).await?;

        tracing::info!(actor_id = %actor.user_id(), user_id = %owner.id, key_id = %key.id, "Advanced authkey revoked");
        Ok(())
    }

    pub async fn view_advanced_key(
        &self,
        actor: &AuthenticatedIdentity,
        key_id: Uuid,
    ) -> Result<AuthKeyView, AuthError> {
        let key = self.store.get_auth_key(key_id).await?;
        let owner = self.store.get_user(key.user_id).await?;
        self.authorize_over_user(actor, Action::ManageAuthKeys, &owner).await?;
        Ok(key.view())
    }

    /// Keys visible to the actor, optionally narrowed to one user.
    pub async fn list_advanced_keys(
        &self,
        actor: &AuthenticatedIdentity,
        user_filter: Option<Uuid>,
    ) -> Result<Vec<AuthKeyView>, AuthError> {
        let keys = match user_filter {
            Some(user_id) => {
                let owner = self.store.get_user(user_id).await?;
                self.authorize_over_user(actor, Action::ManageAuthKeys, &owner).await?;
                self.store.list_auth_keys_for_user(user_id).await?
            }
            None if actor.is_site_admin() => self.store.list_auth_keys().await?,
            None if actor.is_org_admin() => {
                let members = self.store.list_users_in_organization(actor.org_id()).await?;
                let mut keys = Vec::new();
                for member in members {
                    keys.extend(self.store.list_auth_keys_for_user(member.id).await?);
                }
                keys
            }
            None => self.store.list_auth_keys_for_user(actor.user_id()).await?,
        };

        Ok(keys.iter().map(AdvancedAuthKey::view).collect())
    }

    /// Rotates the target's authkey and returns the new raw token.
    ///
    /// With advanced keys required, a fresh advanced key replaces all of the
    /// target's existing ones; otherwise the primary key is replaced. A
    /// refused reset rotates nothing.
    pub async fn reset_primary_key(
        &self,
        actor: &AuthenticatedIdentity,
        user_id: Uuid,
    ) -> Result<String, AuthError> {
        let snapshot = self.flags.snapshot();

        let _guard = self.store.lock_user(user_id).await;
        let mut user = self.store.get_user(user_id).await?;
        self.authorize_over_user(actor, Action::ResetAuthKey, &user).await?;

        let raw = token::generate_authkey();

        if snapshot.flags.advanced_authkeys_required {
            let previous = self.store.list_auth_keys_for_user(user.id).await?;
            let key = AdvancedAuthKey::new(
                user.id,
                &raw,
                KeyOptions {
                    expiration: None,
                    comment: Some("Reset".to_string()),
                },
            );
            self.store.insert_auth_key(&key).await?;
            for old in previous {
                self.store.delete_auth_key(old.id).await?;
            }
        } else {
            user.authkey_hash = token::hash_authkey(&raw);
            user.updated_at = Utc::now();
            self.store.update_user(&user).await?;
        }

        tracing::info!(
            actor_id = %actor.user_id(),
            user_id = %user.id,
            advanced = snapshot.flags.advanced_authkeys_required,
            "Authkey reset"
        );
        Ok(raw)
    }
}
