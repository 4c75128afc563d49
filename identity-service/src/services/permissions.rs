//! Role/permission lookups. Privilege is decided by capabilities and rank,
//! never by role id.

use std::collections::BTreeSet;

use super::error::AuthError;
use crate::models::{Capability, Role};

pub fn capabilities_of(role: &Role) -> &BTreeSet<Capability> {
    &role.capabilities
}

pub fn rank_of(role: &Role) -> u32 {
    role.rank
}

/// Whether `granter` may hand `target` to someone. Site admins may grant
/// anything; everyone else only roles at or below their own rank that do not
/// carry site administration.
pub fn can_grant(granter: &Role, target: &Role) -> bool {
    if granter.is_site_admin() {
        return true;
    }
    !target.is_site_admin() && !target.outranks(granter)
}

/// Most privileged role of a set (lowest rank). Ties keep the first seen.
pub fn highest_privilege<'a, I>(roles: I) -> Option<&'a Role>
where
    I: IntoIterator<Item = &'a Role>,
{
    roles.into_iter().fold(None::<&'a Role>, |best, role| match best {
        Some(current) if !role.outranks(current) => Some(current),
        _ => Some(role),
    })
}

pub fn require_authenticate(role: &Role) -> Result<(), AuthError> {
    if capabilities_of(role).contains(&Capability::Auth) {
        Ok(())
    } else {
        Err(AuthError::forbidden("Role may not authenticate"))
    }
}
