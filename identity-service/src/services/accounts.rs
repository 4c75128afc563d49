//! Account administration: users, organizations, roles and settings.

use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use super::error::AuthError;
use super::flags::{FeatureFlags, FlagSnapshot, FlagsPatch};
use super::identity::IdentityService;
use super::policy::{Action, PolicyEngine, Target};
use crate::models::{
    user::{normalize_email, password_reason},
    AuthenticatedIdentity, CreatedUser, NewRole, NewUser, Organization, OrganizationView, Role,
    RoleChanges, RoleView, UpdateOutcome, User, UserChanges, UserField, UserView,
};
use crate::utils::{hash_password, is_valid_email, token, Password};

fn validate_email(email: &str) -> Result<String, AuthError> {
    let email = normalize_email(email);
    if is_valid_email(&email) {
        Ok(email)
    } else {
        Err(AuthError::Validation("Invalid email address".to_string()))
    }
}

fn hash_new_password(raw: &str) -> Result<String, AuthError> {
    let password = Password::new(raw.to_string());
    if !password.meets_policy() {
        return Err(AuthError::Validation(format!(
            "Password must be at least {} characters",
            crate::utils::password::MIN_PASSWORD_LENGTH
        )));
    }
    Ok(hash_password(&password)?.into_string())
}

impl IdentityService {
    async fn default_role(&self, flags: &FeatureFlags) -> Result<Role, AuthError> {
        self.store
            .find_role_by_name(&flags.default_role)
            .await?
            .ok_or_else(|| AuthError::NotFound("Role".to_string()))
    }

    // ==================== Users ====================

    pub async fn get_user(
        &self,
        actor: &AuthenticatedIdentity,
        user_id: Uuid,
    ) -> Result<UserView, AuthError> {
        let user = self.store.get_user(user_id).await?;
        let role = self.store.get_role(user.role_id).await?;

        self.authorize(actor, &Action::ViewUser, &Target::User { user: &user, role: &role })
            .into_result()?;

        Ok(user.view())
    }

    /// Site admins see everyone, org admins their organization, anyone else
    /// only themselves.
    pub async fn list_users(&self, actor: &AuthenticatedIdentity) -> Result<Vec<UserView>, AuthError> {
        let users = if actor.is_site_admin() {
            self.store.list_users().await?
        } else if actor.is_org_admin() {
            self.store.list_users_in_organization(actor.org_id()).await?
        } else {
            vec![self.store.get_user(actor.user_id()).await?]
        };
        Ok(users.iter().map(User::view).collect())
    }

    pub async fn create_user(
        &self,
        actor: &AuthenticatedIdentity,
        new_user: NewUser,
    ) -> Result<CreatedUser, AuthError> {
        let snapshot = self.flags.snapshot();
        let flags = &snapshot.flags;

        let email = validate_email(&new_user.email)?;
        let password_hash = new_user
            .password
            .as_deref()
            .map(hash_new_password)
            .transpose()?;

        let mut role = match new_user.role_id {
            Some(role_id) => self.store.get_role(role_id).await?,
            None => self.default_role(flags).await?,
        };
        let mut org_id = new_user.org_id.unwrap_or_else(|| actor.org_id());

        let ignored = PolicyEngine::authorize(
            actor,
            &Action::CreateUser { role: &role },
            &Target::Organization(org_id),
            flags,
        )
        .into_result()?;

        if ignored.contains(&UserField::OrgId) {
            org_id = actor.org_id();
        }
        if ignored.contains(&UserField::RoleId) {
            role = self.default_role(flags).await?;
        }

        let organization = self.store.get_organization(org_id).await?;

        let _email_guard = self.store.lock_email(&email).await;
        let authkey = token::generate_authkey();
        let mut user = User::new(
            email,
            organization.id,
            role.id,
            password_hash,
            token::hash_authkey(&authkey),
        );
        user.disabled = new_user.disabled;
        user.change_pw = new_user.change_pw;
        if user.change_pw {
            user.must_change_password_reason = new_user
                .must_change_password_reason
                .as_deref()
                .and_then(password_reason);
        }
        self.store.insert_user(&user).await?;

        tracing::info!(
            actor_id = %actor.user_id(),
            user_id = %user.id,
            org_id = %organization.id,
            role = %role.name,
            ignored = ?ignored,
            "User created"
        );

        Ok(CreatedUser {
            user: user.view(),
            authkey,
        })
    }

    /// Applies the changes the policy lets through and reports the rest.
    pub async fn update_user(
        &self,
        actor: &AuthenticatedIdentity,
        user_id: Uuid,
        changes: UserChanges,
    ) -> Result<UpdateOutcome, AuthError> {
        let snapshot = self.flags.snapshot();
        let flags = &snapshot.flags;

        let _guard = self.store.lock_user(user_id).await;
        let mut user = self.store.get_user(user_id).await?;
        let current_role = self.store.get_role(user.role_id).await?;
        let requested_role = match changes.role_id {
            Some(role_id) => Some(self.store.get_role(role_id).await?),
            None => None,
        };

        let ignored = PolicyEngine::authorize(
            actor,
            &Action::UpdateUser {
                changes: &changes,
                role: requested_role.as_ref(),
            },
            &Target::User {
                user: &user,
                role: &current_role,
            },
            flags,
        )
        .into_result()?;

        let effective = changes.without(&ignored);
        let is_self = actor.is_self(user.id);

        if let Some(email) = effective.email.as_deref() {
            user.email = validate_email(email)?;
        }
        if let Some(password) = effective.password.as_deref() {
            user.password_hash = Some(hash_new_password(password)?);
            if is_self {
                user.change_pw = false;
                user.must_change_password_reason = None;
            }
        }
        if let Some(org_id) = effective.org_id {
            self.store.get_organization(org_id).await?;
            user.org_id = org_id;
        }
        if let Some(role) = requested_role.filter(|_| effective.role_id.is_some()) {
            user.role_id = role.id;
        }
        if let Some(disabled) = effective.disabled {
            user.disabled = disabled;
        }
        if let Some(change_pw) = effective.change_pw {
            user.change_pw = change_pw;
        }
        if let Some(reason) = effective.must_change_password_reason.as_deref() {
            user.must_change_password_reason = password_reason(reason);
        }
        if !user.change_pw {
            user.must_change_password_reason = None;
        }

        user.updated_at = Utc::now();
        self.store.update_user(&user).await?;

        tracing::info!(
            actor_id = %actor.user_id(),
            user_id = %user.id,
            ignored = ?ignored,
            "User updated"
        );

        Ok(UpdateOutcome {
            user: user.view(),
            ignored,
        })
    }

    pub async fn change_own_password(
        &self,
        actor: &AuthenticatedIdentity,
        new_password: &Password,
    ) -> Result<UpdateOutcome, AuthError> {
        let changes = UserChanges {
            password: Some(new_password.as_str().to_string()),
            ..Default::default()
        };
        self.update_user(actor, actor.user_id(), changes).await
    }

    /// Removes the account together with its advanced keys.
    pub async fn delete_user(
        &self,
        actor: &AuthenticatedIdentity,
        user_id: Uuid,
    ) -> Result<(), AuthError> {
        let _guard = self.store.lock_user(user_id).await;
        let user = self.store.get_user(user_id).await?;
        let role = self.store.get_role(user.role_id).await?;

        self.authorize(actor, &Action::DeleteUser, &Target::User { user: &user, role: &role })
            .into_result()?;

        let revoked = self.store.delete_auth_keys_for_user(user.id).await?;
        self.store.delete_user(user.id).await?;

        tracing::info!(actor_id = %actor.user_id(), user_id = %user.id, revoked_keys = revoked, "User deleted");
        Ok(())
    }

    /// Self-registration. The account starts disabled and waits for an
    /// administrator.
    pub async fn register(&self, email: &str, password: &Password) -> Result<UserView, AuthError> {
        let snapshot = self.flags.snapshot();
        let flags = &snapshot.flags;

        PolicyEngine::authorize_registration(flags).into_result()?;

        let email = validate_email(email)?;
        let password_hash = hash_new_password(password.as_str())?;

        let org_name = flags
            .federation
            .default_org
            .clone()
            .or_else(|| self.registration_org.clone())
            .ok_or_else(|| AuthError::NotFound("Organization".to_string()))?;
        let organization = self
            .store
            .find_organization_by_name(&org_name)
            .await?
            .ok_or_else(|| AuthError::NotFound("Organization".to_string()))?;
        let role = self.default_role(flags).await?;

        let _email_guard = self.store.lock_email(&email).await;
        let mut user = User::new(
            email,
            organization.id,
            role.id,
            Some(password_hash),
            token::hash_authkey(&token::generate_authkey()),
        );
        user.disabled = true;
        self.store.insert_user(&user).await?;

        tracing::info!(user_id = %user.id, org_id = %organization.id, "User registered");
        Ok(user.view())
    }

    // ==================== Organizations ====================

    pub async fn create_organization(
        &self,
        actor: &AuthenticatedIdentity,
        name: &str,
        local: bool,
    ) -> Result<OrganizationView, AuthError> {
        self.authorize(actor, &Action::ManageOrganizations, &Target::Platform)
            .into_result()?;

        let name = name.trim();
        if name.is_empty() {
            return Err(AuthError::Validation("Organization name must not be empty".to_string()));
        }

        let org = Organization::new(name, local);
        self.store.insert_organization(&org).await?;

        tracing::info!(actor_id = %actor.user_id(), org_id = %org.id, name = %org.name, "Organization created");
        Ok(OrganizationView::from(&org))
    }

    pub async fn delete_organization(
        &self,
        actor: &AuthenticatedIdentity,
        org_id: Uuid,
    ) -> Result<(), AuthError> {
        self.authorize(actor, &Action::ManageOrganizations, &Target::Platform)
            .into_result()?;

        self.store.delete_organization(org_id).await?;

        tracing::info!(actor_id = %actor.user_id(), org_id = %org_id, "Organization deleted");
        Ok(())
    }

    pub async fn list_organizations(
        &self,
        actor: &AuthenticatedIdentity,
    ) -> Result<Vec<OrganizationView>, AuthError> {
        if actor.is_site_admin() {
            let orgs = self.store.list_organizations().await?;
            Ok(orgs.iter().map(OrganizationView::from).collect())
        } else {
            Ok(vec![OrganizationView::from(&actor.organization)])
        }
    }

    // ==================== Roles ====================

    /// Ad-hoc roles start without capabilities unless some are given.
    pub async fn create_role(
        &self,
        actor: &AuthenticatedIdentity,
        new_role: NewRole,
    ) -> Result<RoleView, AuthError> {
        self.authorize(actor, &Action::ManageRoles, &Target::Platform)
            .into_result()?;

        let name = new_role.name.trim();
        if name.is_empty() {
            return Err(AuthError::Validation("Role name must not be empty".to_string()));
        }

        let role = Role::new(name, new_role.rank, new_role.capabilities);
        self.store.insert_role(&role).await?;

        tracing::info!(actor_id = %actor.user_id(), role_id = %role.id, name = %role.name, "Role created");
        Ok(RoleView::from(&role))
    }

    pub async fn update_role(
        &self,
        actor: &AuthenticatedIdentity,
        role_id: Uuid,
        changes: RoleChanges,
    ) -> Result<RoleView, AuthError> {
        self.authorize(actor, &Action::ManageRoles, &Target::Platform)
            .into_result()?;

        let mut role = self.store.get_role(role_id).await?;
        if let Some(rank) = changes.rank {
            role.rank = rank;
        }
        if let Some(capabilities) = changes.capabilities {
            role.capabilities = capabilities;
        }
        self.store.update_role(&role).await?;

        tracing::info!(actor_id = %actor.user_id(), role_id = %role.id, "Role updated");
        Ok(RoleView::from(&role))
    }

    pub async fn delete_role(
        &self,
        actor: &AuthenticatedIdentity,
        role_id: Uuid,
    ) -> Result<(), AuthError> {
        self.authorize(actor, &Action::ManageRoles, &Target::Platform)
            .into_result()?;

        self.store.delete_role(role_id).await?;

        tracing::info!(actor_id = %actor.user_id(), role_id = %role_id, "Role deleted");
        Ok(())
    }

    pub async fn list_roles(&self) -> Result<Vec<RoleView>, AuthError> {
        let roles = self.store.list_roles().await?;
        Ok(roles.iter().map(RoleView::from).collect())
    }

    // ==================== Settings ====================

    pub async fn update_flags(
        &self,
        actor: &AuthenticatedIdentity,
        patch: FlagsPatch,
    ) -> Result<Arc<FlagSnapshot>, AuthError> {
        self.authorize(actor, &Action::UpdateSettings, &Target::Platform)
            .into_result()?;

        let mut candidate = self.flags.snapshot().flags.clone();
        patch.apply_to(&mut candidate);
        candidate.validate().map_err(AuthError::Validation)?;

        let snapshot = self.flags.update(|flags| patch.apply_to(flags));

        tracing::info!(actor_id = %actor.user_id(), version = snapshot.version, "Feature flags updated");
        Ok(snapshot)
    }
}
