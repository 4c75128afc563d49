//! Header-based federated login with just-in-time provisioning.
//!
//! Every check that can refuse the login runs before anything is written, so
//! a refused login leaves no organization or user behind.

use std::sync::Arc;
use uuid::Uuid;

use super::admission::admit;
use super::error::{AuthError, StoreError};
use super::flags::{FederationConfig, FeatureFlags};
use super::permissions;
use super::store::CredentialStore;
use crate::models::{
    user::normalize_email, AuthMethod, AuthenticatedIdentity, FederatedAttributes, Organization,
    Role, User,
};
use crate::utils::{hash_password, token, Password};

/// Where the federated user's organization comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrgResolution {
    Existing(Organization),
    Create(String),
}

#[derive(Clone)]
pub struct FederationResolver {
    store: Arc<dyn CredentialStore>,
}

impl FederationResolver {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self { store }
    }

    pub async fn resolve(
        &self,
        attributes: &FederatedAttributes,
        flags: &FeatureFlags,
    ) -> Result<AuthenticatedIdentity, AuthError> {
        let config = &flags.federation;

        let email = attributes
            .email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty())
            .ok_or(AuthError::MissingCredential)?;
        if !crate::utils::is_valid_email(&email) {
            return Err(AuthError::forbidden("Federated email is not a valid address"));
        }

        let _email_guard = self.store.lock_email(&email).await;

        let existing = self.store.find_user_by_email(&email).await?;
        if existing.as_ref().is_some_and(|user| user.disabled) {
            return Err(AuthError::AccountDisabled);
        }

        let org_plan = self
            .resolve_organization(attributes.organization.as_deref(), config)
            .await?;
        let role = self.resolve_role(attributes.groups.as_deref(), config).await?;

        if !flags.platform_live && !role.is_site_admin() {
            return Err(AuthError::PlatformUnavailable);
        }
        permissions::require_authenticate(&role)?;

        let (organization, created_org) = self.materialize(org_plan).await?;

        let user = match existing {
            Some(user) => self.synchronize(user.id, &organization, &role).await,
            None => self.provision(&email, &organization, &role).await,
        };
        let user = match user {
            Ok(user) => user,
            Err(e) => {
                if created_org {
                    self.discard_organization(&organization).await;
                }
                return Err(e);
            }
        };

        admit(self.store.as_ref(), user, AuthMethod::Federated, flags).await
    }

    /// Identifier resolution: configured default when forced or when nothing
    /// was supplied; uuid-shaped identifiers must match an existing
    /// organization; free-text names are created on demand.
    pub async fn resolve_organization(
        &self,
        identifier: Option<&str>,
        config: &FederationConfig,
    ) -> Result<OrgResolution, AuthError> {
        let identifier = identifier.map(str::trim).filter(|s| !s.is_empty());

        let identifier = match identifier {
            Some(id) if !config.use_default_org => id,
            _ => {
                let name = config
                    .default_org
                    .as_deref()
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .ok_or_else(|| AuthError::forbidden("No organization could be resolved"))?;
                return self.by_name_or_create(name).await;
            }
        };

        if let Ok(uuid) = Uuid::parse_str(identifier) {
            if let Some(org) = self.store.find_organization_by_uuid(uuid).await? {
                return Ok(OrgResolution::Existing(org));
            }
            if let Some(org) = self.store.find_organization_by_name(identifier).await? {
                return Ok(OrgResolution::Existing(org));
            }
            return Err(AuthError::forbidden("Unknown organization identifier"));
        }

        self.by_name_or_create(identifier).await
    }

    async fn by_name_or_create(&self, name: &str) -> Result<OrgResolution, AuthError> {
        Ok(match self.store.find_organization_by_name(name).await? {
            Some(org) => OrgResolution::Existing(org),
            None => OrgResolution::Create(name.to_string()),
        })
    }

    /// Maps each group token through the configured table and keeps the most
    /// privileged role. Unknown tokens are ignored.
    pub async fn resolve_role(
        &self,
        groups: Option<&str>,
        config: &FederationConfig,
    ) -> Result<Role, AuthError> {
        let mut candidates = Vec::new();
        for group in groups
            .unwrap_or_default()
            .split(config.group_separator.as_str())
            .map(str::trim)
            .filter(|g| !g.is_empty())
        {
            let Some(role_name) = config.group_to_role.get(group) else {
                continue;
            };
            if let Some(role) = self.store.find_role_by_name(role_name).await? {
                candidates.push(role);
            }
        }

        permissions::highest_privilege(candidates.iter())
            .cloned()
            .ok_or_else(|| AuthError::forbidden("No role mapped for the supplied groups"))
    }

    /// Returns the organization and whether this call created it.
    async fn materialize(&self, plan: OrgResolution) -> Result<(Organization, bool), AuthError> {
        match plan {
            OrgResolution::Existing(org) => Ok((org, false)),
            OrgResolution::Create(name) => {
                let org = Organization::new(name.as_str(), false);
                match self.store.insert_organization(&org).await {
                    Ok(()) => {
                        tracing::info!(org_id = %org.id, name = %org.name, "Provisioned federated organization");
                        Ok((org, true))
                    }
                    // Lost a race with another first login of the same organization.
                    Err(StoreError::Conflict(_)) => self
                        .store
                        .find_organization_by_name(&name)
                        .await?
                        .map(|org| (org, false))
                        .ok_or_else(|| AuthError::Conflict("Organization name".to_string())),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }

    /// Removes an organization this login just created. Another login may
    /// already have placed a user in it, in which case it stays.
    async fn discard_organization(&self, organization: &Organization) {
        match self.store.delete_organization(organization.id).await {
            Ok(()) => {
                tracing::info!(org_id = %organization.id, "Discarded federated organization after failed provisioning")
            }
            Err(StoreError::Conflict(_)) | Err(StoreError::NotFound(_)) => {}
            Err(e) => {
                tracing::warn!(org_id = %organization.id, error = %e, "Failed to discard federated organization")
            }
        }
    }

    async fn synchronize(
        &self,
        user_id: Uuid,
        organization: &Organization,
        role: &Role,
    ) -> Result<User, AuthError> {
        let _guard = self.store.lock_user(user_id).await;
        let mut user = self.store.get_user(user_id).await?;

        if user.org_id != organization.id || user.role_id != role.id {
            tracing::info!(
                user_id = %user.id,
                org_id = %organization.id,
                role = %role.name,
                "Synchronized federated user"
            );
            user.org_id = organization.id;
            user.role_id = role.id;
            user.updated_at = chrono::Utc::now();
            self.store.update_user(&user).await?;
        }

        Ok(user)
    }

    async fn provision(
        &self,
        email: &str,
        organization: &Organization,
        role: &Role,
    ) -> Result<User, AuthError> {
        let password_hash = hash_password(&Password::unusable())?.into_string();
        let authkey = token::generate_authkey();
        let user = User::new(
            email,
            organization.id,
            role.id,
            Some(password_hash),
            token::hash_authkey(&authkey),
        );
        self.store.insert_user(&user).await?;

        tracing::info!(user_id = %user.id, org_id = %organization.id, role = %role.name, "Provisioned federated user");
        Ok(user)
    }
}
