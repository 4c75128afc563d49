//! The result of a successful authentication.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::{Organization, OrganizationView, Role, RoleView, User, UserView};

/// Which mechanism produced an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthMethod {
    AuthKey,
    AdvancedAuthKey { key_id: Uuid },
    Session,
    Password,
    Federated,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::AuthKey => "authkey",
            AuthMethod::AdvancedAuthKey { .. } => "advanced_authkey",
            AuthMethod::Session => "session",
            AuthMethod::Password => "password",
            AuthMethod::Federated => "federated",
        }
    }
}

impl fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Request-scoped identity. Never persisted; rebuilt from the store on every
/// authentication so role and organization changes apply immediately.
#[derive(Debug, Clone)]
pub struct AuthenticatedIdentity {
    pub user: User,
    pub role: Role,
    pub organization: Organization,
    pub auth_method: AuthMethod,
}

impl AuthenticatedIdentity {
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    pub fn org_id(&self) -> Uuid {
        self.organization.id
    }

    pub fn is_site_admin(&self) -> bool {
        self.role.is_site_admin()
    }

    pub fn is_org_admin(&self) -> bool {
        self.role.is_org_admin()
    }

    pub fn is_self(&self, user_id: Uuid) -> bool {
        self.user.id == user_id
    }

    /// The account carries a forced password change. This never blocks
    /// access; the transport decides whether to prompt.
    pub fn must_change_password(&self) -> bool {
        self.user.change_pw
    }

    pub fn view(&self) -> IdentityView {
        IdentityView {
            user: self.user.view(),
            role: RoleView::from(&self.role),
            organization: OrganizationView::from(&self.organization),
            auth_method: self.auth_method,
            must_change_password: self.must_change_password(),
        }
    }
}

/// Serializable form of an identity for `view/me` style responses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityView {
    pub user: UserView,
    pub role: RoleView,
    pub organization: OrganizationView,
    pub auth_method: AuthMethod,
    pub must_change_password: bool,
}
