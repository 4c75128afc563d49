//! Seeding of the built-in roles, the home organization and the first
//! site admin.

use std::fmt;
use std::io::{self, Write};

use super::error::AuthError;
use super::store::CredentialStore;
use crate::models::{user::normalize_email, Organization, Role, User, UserView};
use crate::utils::token;

/// What seeding produced. `admin_authkey` is only set when the admin
/// account was created by this run.
#[derive(Clone)]
pub struct BootstrapReport {
    pub organization: Organization,
    pub admin: UserView,
    pub admin_authkey: Option<String>,
}

impl fmt::Debug for BootstrapReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BootstrapReport")
            .field("organization", &self.organization)
            .field("admin", &self.admin)
            .field("admin_authkey", &self.admin_authkey.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl BootstrapReport {
    /// Prints the one-time admin authkey to `out`, outside the log pipeline.
    /// Returns false when the admin already existed and there is no key.
    pub fn write_admin_authkey<W: Write>(&self, out: &mut W) -> io::Result<bool> {
        let Some(authkey) = &self.admin_authkey else {
            return Ok(false);
        };
        writeln!(
            out,
            "Bootstrap site admin {} created. Authkey (shown once): {}",
            self.admin.email, authkey
        )?;
        out.flush()?;
        Ok(true)
    }
}

/// Idempotent: existing roles, organization and admin are left untouched.
pub async fn seed_defaults(
    store: &dyn CredentialStore,
    org_name: &str,
    admin_email: &str,
) -> Result<BootstrapReport, AuthError> {
    let mut admin_role = None;
    for role in [Role::site_admin(), Role::org_admin(), Role::user()] {
        let seeded = match store.find_role_by_name(&role.name).await? {
            Some(existing) => existing,
            None => {
                store.insert_role(&role).await?;
                tracing::info!(role = %role.name, rank = role.rank, "Seeded role");
                role
            }
        };
        if seeded.is_site_admin() && admin_role.is_none() {
            admin_role = Some(seeded);
        }
    }
    let admin_role = admin_role.ok_or_else(|| AuthError::NotFound("Role".to_string()))?;

    let organization = match store.find_organization_by_name(org_name).await? {
        Some(org) => org,
        None => {
            let org = Organization::new(org_name, true);
            store.insert_organization(&org).await?;
            tracing::info!(org_id = %org.id, name = %org.name, "Seeded organization");
            org
        }
    };

    if let Some(admin) = store.find_user_by_email(admin_email).await? {
        return Ok(BootstrapReport {
            organization,
            admin: admin.view(),
            admin_authkey: None,
        });
    }

    let authkey = token::generate_authkey();
    let admin = User::new(
        normalize_email(admin_email),
        organization.id,
        admin_role.id,
        None,
        token::hash_authkey(&authkey),
    );
    store.insert_user(&admin).await?;
    tracing::info!(user_id = %admin.id, "Seeded site admin");

    Ok(BootstrapReport {
        organization,
        admin: admin.view(),
        admin_authkey: Some(authkey),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryStore;

    #[tokio::test]
    async fn test_seed_is_idempotent() {
        let store = InMemoryStore::new();

        let first = seed_defaults(&store, "ORGNAME", "admin@admin.test").await.unwrap();
        assert!(first.admin_authkey.is_some());

        let second = seed_defaults(&store, "ORGNAME", "admin@admin.test").await.unwrap();
        assert!(second.admin_authkey.is_none());
        assert_eq!(first.admin.id, second.admin.id);
        assert_eq!(store.list_roles().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_admin_key_goes_to_the_writer_only() {
        let store = InMemoryStore::new();
        let report = seed_defaults(&store, "ORGNAME", "admin@admin.test").await.unwrap();
        let authkey = report.admin_authkey.clone().unwrap();

        let mut out = Vec::new();
        assert!(report.write_admin_authkey(&mut out).unwrap());
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains(&authkey));
        assert!(printed.contains("admin@admin.test"));

        assert!(!format!("{:?}", report).contains(&authkey));

        let again = seed_defaults(&store, "ORGNAME", "admin@admin.test").await.unwrap();
        let mut out = Vec::new();
        assert!(!again.write_admin_authkey(&mut out).unwrap());
        assert!(out.is_empty());
    }
}
