//! Account checks shared by every authentication path.

use super::error::{AuthError, StoreError};
use super::flags::FeatureFlags;
use super::permissions;
use super::store::CredentialStore;
use crate::models::{AuthMethod, AuthenticatedIdentity, User};

/// Turns a located user into an identity, or explains why it may not act.
///
/// Order: disabled account, live organization, platform availability (site
/// admins are exempt so they can bring the platform back), role capability.
/// Role and organization are read fresh on every call.
pub async fn admit(
    store: &dyn CredentialStore,
    user: User,
    auth_method: AuthMethod,
    flags: &FeatureFlags,
) -> Result<AuthenticatedIdentity, AuthError> {
    if user.disabled {
        return Err(AuthError::AccountDisabled);
    }

    let organization = match store.get_organization(user.org_id).await {
        Ok(org) => org,
        Err(StoreError::NotFound(_)) => return Err(AuthError::AccountDisabled),
        Err(e) => return Err(e.into()),
    };

    let role = match store.get_role(user.role_id).await {
        Ok(role) => role,
        Err(StoreError::NotFound(_)) => return Err(AuthError::forbidden("Role not found")),
        Err(e) => return Err(e.into()),
    };

    if !flags.platform_live && !role.is_site_admin() {
        return Err(AuthError::PlatformUnavailable);
    }

    permissions::require_authenticate(&role)?;

    Ok(AuthenticatedIdentity {
        user,
        role,
        organization,
        auth_method,
    })
}
