//! Storage contract of the identity core.
//!
//! Pure data access: the store enforces uniqueness and referential integrity
//! but knows nothing about who is asking.

use async_trait::async_trait;
use tokio::sync::OwnedMutexGuard;
use uuid::Uuid;

use super::error::StoreError;
use crate::models::{AdvancedAuthKey, Organization, Role, User};

/// Held while a read-modify-write of one user (or one email) is in flight.
///
/// The release hook runs after the mutex is unlocked, so a store can drop
/// lock entries nobody is waiting on.
pub struct EntityGuard {
    guard: Option<OwnedMutexGuard<()>>,
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl EntityGuard {
    pub fn new(guard: OwnedMutexGuard<()>) -> Self {
        Self {
            guard: Some(guard),
            release: None,
        }
    }

    pub fn on_release(mut self, release: impl FnOnce() + Send + 'static) -> Self {
        self.release = Some(Box::new(release));
        self
    }
}

impl Drop for EntityGuard {
    fn drop(&mut self) {
        drop(self.guard.take());
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    // ==================== Organizations ====================

    async fn insert_organization(&self, org: &Organization) -> Result<(), StoreError>;

    async fn get_organization(&self, id: Uuid) -> Result<Organization, StoreError>;

    async fn find_organization_by_uuid(&self, uuid: Uuid) -> Result<Option<Organization>, StoreError>;

    async fn find_organization_by_name(&self, name: &str) -> Result<Option<Organization>, StoreError>;

    async fn list_organizations(&self) -> Result<Vec<Organization>, StoreError>;

    /// Fails with `Conflict` while the organization still owns users.
    async fn delete_organization(&self, id: Uuid) -> Result<(), StoreError>;

    // ==================== Roles ====================

    async fn insert_role(&self, role: &Role) -> Result<(), StoreError>;

    async fn get_role(&self, id: Uuid) -> Result<Role, StoreError>;

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError>;

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError>;

    async fn update_role(&self, role: &Role) -> Result<(), StoreError>;

    /// Fails with `Conflict` while any user holds the role.
    async fn delete_role(&self, id: Uuid) -> Result<(), StoreError>;

    // ==================== Users ====================

    /// Fails with `NotFound` when the user's organization or role is absent
    /// and with `Conflict` on a duplicate email or authkey.
    async fn insert_user(&self, user: &User) -> Result<(), StoreError>;

    async fn get_user(&self, id: Uuid) -> Result<User, StoreError>;

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;

    async fn find_user_by_authkey_hash(&self, hash: &str) -> Result<Option<User>, StoreError>;

    async fn list_users(&self) -> Result<Vec<User>, StoreError>;

    async fn list_users_in_organization(&self, org_id: Uuid) -> Result<Vec<User>, StoreError>;

    async fn count_users_in_organization(&self, org_id: Uuid) -> Result<usize, StoreError>;

    async fn count_users_with_role(&self, role_id: Uuid) -> Result<usize, StoreError>;

    async fn update_user(&self, user: &User) -> Result<(), StoreError>;

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError>;

    // ==================== Advanced authkeys ====================

    async fn insert_auth_key(&self, key: &AdvancedAuthKey) -> Result<(), StoreError>;

    async fn get_auth_key(&self, id: Uuid) -> Result<AdvancedAuthKey, StoreError>;

    async fn find_auth_key_by_hash(&self, hash: &str) -> Result<Option<AdvancedAuthKey>, StoreError>;

    async fn list_auth_keys(&self) -> Result<Vec<AdvancedAuthKey>, StoreError>;

    async fn list_auth_keys_for_user(&self, user_id: Uuid) -> Result<Vec<AdvancedAuthKey>, StoreError>;

    async fn delete_auth_key(&self, id: Uuid) -> Result<(), StoreError>;

    /// Returns how many keys were removed.
    async fn delete_auth_keys_for_user(&self, user_id: Uuid) -> Result<usize, StoreError>;

    // ==================== Serialization ====================

    /// Serializes read-modify-write sequences on one user.
    async fn lock_user(&self, user_id: Uuid) -> EntityGuard;

    /// Serializes first-time provisioning of one email address.
    async fn lock_email(&self, email: &str) -> EntityGuard;
}
