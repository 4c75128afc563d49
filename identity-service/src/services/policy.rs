//! Authorization decisions.
//!
//! A refusal is either a silently dropped field or an explicit denial of the
//! whole action. Which one applies is part of each rule and visible to
//! callers, so it is carried in the decision rather than left to call sites.

use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use super::error::AuthError;
use super::flags::FeatureFlags;
use super::permissions;
use crate::models::{AuthenticatedIdentity, Role, User, UserChanges, UserField};

/// The rule that produced a refusal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyRule {
    SelfScope,
    RoleEscalation,
    OrganizationScope,
    SiteAdminOnly,
    LoginChangeLocked,
    PasswordChangeLocked,
    UserAddLocked,
    SelfRegistration,
    SelfDeletion,
}

impl fmt::Display for PolicyRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PolicyRule::SelfScope => "self_scope",
            PolicyRule::RoleEscalation => "role_escalation",
            PolicyRule::OrganizationScope => "organization_scope",
            PolicyRule::SiteAdminOnly => "site_admin_only",
            PolicyRule::LoginChangeLocked => "login_change_locked",
            PolicyRule::PasswordChangeLocked => "password_change_locked",
            PolicyRule::UserAddLocked => "user_add_locked",
            PolicyRule::SelfRegistration => "self_registration",
            PolicyRule::SelfDeletion => "self_deletion",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SilentIgnore {
    pub field: UserField,
    pub rule: PolicyRule,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Denied {
    pub rule: PolicyRule,
    pub reason: String,
}

impl Denied {
    fn new(rule: PolicyRule, reason: impl Into<String>) -> Self {
        Self {
            rule,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Allow,
    AllowWithFieldFilter(Vec<SilentIgnore>),
    Deny(Denied),
}

impl Decision {
    fn from_ignored(ignored: Vec<SilentIgnore>) -> Self {
        if ignored.is_empty() {
            Decision::Allow
        } else {
            Decision::AllowWithFieldFilter(ignored)
        }
    }

    pub fn is_allowed(&self) -> bool {
        !matches!(self, Decision::Deny(_))
    }

    /// Fields to drop on success, `Forbidden` on denial.
    pub fn into_result(self) -> Result<Vec<UserField>, AuthError> {
        match self {
            Decision::Allow => Ok(Vec::new()),
            Decision::AllowWithFieldFilter(ignored) => {
                Ok(ignored.into_iter().map(|i| i.field).collect())
            }
            Decision::Deny(denied) => Err(AuthError::Forbidden(denied.reason)),
        }
    }
}

/// What the actor wants to do.
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
    ViewUser,
    /// `role` is the role the new account would receive.
    CreateUser { role: &'a Role },
    /// `role` is the requested role when `changes.role_id` is set.
    UpdateUser {
        changes: &'a UserChanges,
        role: Option<&'a Role>,
    },
    DeleteUser,
    ResetAuthKey,
    ManageAuthKeys,
    ManageOrganizations,
    ManageRoles,
    UpdateSettings,
}

/// What the action applies to.
#[derive(Debug, Clone, Copy)]
pub enum Target<'a> {
    /// An existing account and the role it currently holds.
    User { user: &'a User, role: &'a Role },
    /// The organization a new account is requested in.
    Organization(Uuid),
    Platform,
}

pub struct PolicyEngine;

impl PolicyEngine {
    pub fn authorize(
        actor: &AuthenticatedIdentity,
        action: &Action<'_>,
        target: &Target<'_>,
        flags: &FeatureFlags,
    ) -> Decision {
        match (action, target) {
            (Action::ViewUser, Target::User { user, role })
            | (Action::ResetAuthKey, Target::User { user, role })
            | (Action::ManageAuthKeys, Target::User { user, role }) => {
                if actor.is_self(user.id) {
                    return Decision::Allow;
                }
                match user_scope(actor, user, role) {
                    Ok(()) => Decision::Allow,
                    Err(denied) => Decision::Deny(denied),
                }
            }
            (Action::UpdateUser { changes, role: requested }, Target::User { user, role }) => {
                Self::authorize_update(actor, changes, *requested, user, role, flags)
            }
            (Action::DeleteUser, Target::User { user, role }) => {
                if actor.is_self(user.id) {
                    return Decision::Deny(Denied::new(
                        PolicyRule::SelfDeletion,
                        "Users cannot delete themselves",
                    ));
                }
                match user_scope(actor, user, role) {
                    Ok(()) => Decision::Allow,
                    Err(denied) => Decision::Deny(denied),
                }
            }
            (Action::CreateUser { role }, Target::Organization(org_id)) => {
                Self::authorize_create(actor, role, *org_id, flags)
            }
            (Action::ManageOrganizations, _)
            | (Action::ManageRoles, _)
            | (Action::UpdateSettings, _) => {
                if actor.is_site_admin() {
                    Decision::Allow
                } else {
                    Decision::Deny(Denied::new(
                        PolicyRule::SiteAdminOnly,
                        "Site admin privileges required",
                    ))
                }
            }
            _ => Decision::Deny(Denied::new(
                PolicyRule::OrganizationScope,
                "Action does not apply to this target",
            )),
        }
    }

    /// Self-registration is only a feature-flag question.
    pub fn authorize_registration(flags: &FeatureFlags) -> Decision {
        if flags.allow_self_registration {
            Decision::Allow
        } else {
            Decision::Deny(Denied::new(
                PolicyRule::SelfRegistration,
                "Self registration is disabled",
            ))
        }
    }

    fn authorize_update(
        actor: &AuthenticatedIdentity,
        changes: &UserChanges,
        requested_role: Option<&Role>,
        target: &User,
        target_role: &Role,
        flags: &FeatureFlags,
    ) -> Decision {
        let mut ignored = Vec::new();
        let mut ignore = |field, rule| ignored.push(SilentIgnore { field, rule });

        if actor.is_self(target.id) {
            for field in [
                UserField::RoleId,
                UserField::OrgId,
                UserField::Disabled,
                UserField::ChangePw,
            ] {
                if changes.touches(field) {
                    ignore(field, PolicyRule::SelfScope);
                }
            }
        } else {
            if let Err(denied) = user_scope(actor, target, target_role) {
                return Decision::Deny(denied);
            }

            if !actor.is_site_admin() {
                if let Some(role) = requested_role.filter(|_| changes.touches(UserField::RoleId)) {
                    if role.is_site_admin() {
                        return Decision::Deny(Denied::new(
                            PolicyRule::RoleEscalation,
                            "Organization admins cannot assign the site admin role",
                        ));
                    }
                    if !permissions::can_grant(&actor.role, role) {
                        ignore(UserField::RoleId, PolicyRule::RoleEscalation);
                    }
                }

                if changes.org_id.is_some_and(|org_id| org_id != actor.org_id()) {
                    ignore(UserField::OrgId, PolicyRule::OrganizationScope);
                }
            }
        }

        let locks_apply = !(actor.is_site_admin() && flags.site_admin_bypasses_user_locks);
        if locks_apply && flags.disable_user_login_change && changes.touches(UserField::Email) {
            ignore(UserField::Email, PolicyRule::LoginChangeLocked);
        }
        if locks_apply && flags.disable_user_password_change && changes.touches(UserField::Password) {
            ignore(UserField::Password, PolicyRule::PasswordChangeLocked);
        }

        Decision::from_ignored(ignored)
    }

    fn authorize_create(
        actor: &AuthenticatedIdentity,
        role: &Role,
        org_id: Uuid,
        flags: &FeatureFlags,
    ) -> Decision {
        if !actor.is_site_admin() && !actor.is_org_admin() {
            return Decision::Deny(Denied::new(
                PolicyRule::OrganizationScope,
                "Not permitted to add users",
            ));
        }

        let locks_apply = !(actor.is_site_admin() && flags.site_admin_bypasses_user_locks);
        if locks_apply && flags.disable_user_add {
            return Decision::Deny(Denied::new(
                PolicyRule::UserAddLocked,
                "Adding users has been disabled on this instance",
            ));
        }

        if actor.is_site_admin() {
            return Decision::Allow;
        }

        if role.is_site_admin() {
            return Decision::Deny(Denied::new(
                PolicyRule::RoleEscalation,
                "Organization admins cannot assign the site admin role",
            ));
        }

        let mut ignored = Vec::new();
        if !permissions::can_grant(&actor.role, role) {
            ignored.push(SilentIgnore {
                field: UserField::RoleId,
                rule: PolicyRule::RoleEscalation,
            });
        }
        if org_id != actor.org_id() {
            ignored.push(SilentIgnore {
                field: UserField::OrgId,
                rule: PolicyRule::OrganizationScope,
            });
        }

        Decision::from_ignored(ignored)
    }
}

/// Administrative reach over another account: site admins everywhere, org
/// admins inside their own organization over users who do not outrank them.
fn user_scope(actor: &AuthenticatedIdentity, user: &User, role: &Role) -> Result<(), Denied> {
    if actor.is_site_admin() {
        return Ok(());
    }
    if !actor.is_org_admin() {
        return Err(Denied::new(
            PolicyRule::OrganizationScope,
            "Not permitted to act on other users",
        ));
    }
    if user.org_id != actor.org_id() {
        return Err(Denied::new(
            PolicyRule::OrganizationScope,
            "User belongs to another organization",
        ));
    }
    if role.is_site_admin() || role.outranks(&actor.role) {
        return Err(Denied::new(
            PolicyRule::RoleEscalation,
            "User is more privileged than the actor",
        ));
    }
    Ok(())
}
