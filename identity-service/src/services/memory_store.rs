//! In-process `CredentialStore` backed by concurrent maps.

use async_trait::async_trait;
use dashmap::{mapref::entry::Entry, DashMap};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use super::error::StoreError;
use super::store::{CredentialStore, EntityGuard};
use crate::models::{user::normalize_email, AdvancedAuthKey, Organization, Role, User};

#[derive(Default)]
pub struct InMemoryStore {
    organizations: DashMap<Uuid, Organization>,
    org_names: DashMap<String, Uuid>,
    roles: DashMap<Uuid, Role>,
    role_names: DashMap<String, Uuid>,
    users: DashMap<Uuid, User>,
    user_emails: DashMap<String, Uuid>,
    user_authkeys: DashMap<String, Uuid>,
    auth_keys: DashMap<Uuid, AdvancedAuthKey>,
    auth_key_hashes: DashMap<String, Uuid>,
    user_locks: Arc<DashMap<Uuid, Arc<Mutex<()>>>>,
    email_locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
    /// User writes that reference an organization or role hold this shared;
    /// deleting an organization or role holds it exclusively, so the
    /// "still in use" check and the removal cannot interleave with them.
    references: RwLock<()>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn require_organization(&self, id: Uuid) -> Result<(), StoreError> {
        if self.organizations.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::NotFound("Organization".to_string()))
        }
    }

    fn require_role(&self, id: Uuid) -> Result<(), StoreError> {
        if self.roles.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::NotFound("Role".to_string()))
        }
    }
}

/// Reserves `key` in a unique index for `owner`.
fn claim(index: &DashMap<String, Uuid>, key: &str, owner: Uuid, what: &str) -> Result<(), StoreError> {
    match index.entry(key.to_string()) {
        Entry::Occupied(entry) if *entry.get() != owner => {
            Err(StoreError::Conflict(format!("{} already exists", what)))
        }
        Entry::Occupied(_) => Ok(()),
        Entry::Vacant(entry) => {
            entry.insert(owner);
            Ok(())
        }
    }
}

fn release(index: &DashMap<String, Uuid>, key: &str, owner: Uuid) {
    index.remove_if(key, |_, id| *id == owner);
}

fn sorted<T: Clone, K: Ord>(map: &DashMap<Uuid, T>, sort_key: impl Fn(&T) -> K) -> Vec<T> {
    let mut items: Vec<T> = map.iter().map(|entry| entry.value().clone()).collect();
    items.sort_by_key(|item| sort_key(item));
    items
}

/// Locks `key`, dropping its entry on release once no other task holds or
/// waits for it.
async fn acquire<K>(locks: &Arc<DashMap<K, Arc<Mutex<()>>>>, key: K) -> EntityGuard
where
    K: std::hash::Hash + Eq + Clone + Send + Sync + 'static,
{
    let mutex = locks.entry(key.clone()).or_default().clone();
    let guard = mutex.lock_owned().await;
    let locks = Arc::clone(locks);
    EntityGuard::new(guard).on_release(move || {
        locks.remove_if(&key, |_, mutex| Arc::strong_count(mutex) == 1);
    })
}

#[async_trait]
impl CredentialStore for InMemoryStore {
    async fn insert_organization(&self, org: &Organization) -> Result<(), StoreError> {
        if self.organizations.contains_key(&org.id) {
            return Err(StoreError::Conflict("Organization already exists".to_string()));
        }
        claim(&self.org_names, &org.name, org.id, "Organization name")?;
        self.organizations.insert(org.id, org.clone());
        Ok(())
    }

    async fn get_organization(&self, id: Uuid) -> Result<Organization, StoreError> {
        self.organizations
            .get(&id)
            .map(|org| org.clone())
            .ok_or_else(|| StoreError::NotFound("Organization".to_string()))
    }

    async fn find_organization_by_uuid(&self, uuid: Uuid) -> Result<Option<Organization>, StoreError> {
        Ok(self
            .organizations
            .iter()
            .find(|entry| entry.uuid == uuid)
            .map(|entry| entry.value().clone()))
    }

    async fn find_organization_by_name(&self, name: &str) -> Result<Option<Organization>, StoreError> {
        let id = self.org_names.get(name).map(|entry| *entry.value());
        Ok(id.and_then(|id| self.organizations.get(&id).map(|org| org.clone())))
    }

    async fn list_organizations(&self) -> Result<Vec<Organization>, StoreError> {
        Ok(sorted(&self.organizations, |org| org.created_at))
    }

    async fn delete_organization(&self, id: Uuid) -> Result<(), StoreError> {
        let _references = self.references.write().await;
        self.require_organization(id)?;
        if self.count_users_in_organization(id).await? > 0 {
            return Err(StoreError::Conflict(
                "Organization still has users".to_string(),
            ));
        }
        if let Some((_, org)) = self.organizations.remove(&id) {
            release(&self.org_names, &org.name, org.id);
        }
        Ok(())
    }

    async fn insert_role(&self, role: &Role) -> Result<(), StoreError> {
        if self.roles.contains_key(&role.id) {
            return Err(StoreError::Conflict("Role already exists".to_string()));
        }
        claim(&self.role_names, &role.name, role.id, "Role name")?;
        self.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn get_role(&self, id: Uuid) -> Result<Role, StoreError> {
        self.roles
            .get(&id)
            .map(|role| role.clone())
            .ok_or_else(|| StoreError::NotFound("Role".to_string()))
    }

    async fn find_role_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let id = self.role_names.get(name).map(|entry| *entry.value());
        Ok(id.and_then(|id| self.roles.get(&id).map(|role| role.clone())))
    }

    async fn list_roles(&self) -> Result<Vec<Role>, StoreError> {
        Ok(sorted(&self.roles, |role| (role.rank, role.created_at)))
    }

    async fn update_role(&self, role: &Role) -> Result<(), StoreError> {
        let previous = self.get_role(role.id).await?;
        if previous.name != role.name {
            claim(&self.role_names, &role.name, role.id, "Role name")?;
            release(&self.role_names, &previous.name, role.id);
        }
        self.roles.insert(role.id, role.clone());
        Ok(())
    }

    async fn delete_role(&self, id: Uuid) -> Result<(), StoreError> {
        let _references = self.references.write().await;
        self.require_role(id)?;
        if self.count_users_with_role(id).await? > 0 {
            return Err(StoreError::Conflict("Role is still assigned".to_string()));
        }
        if let Some((_, role)) = self.roles.remove(&id) {
            release(&self.role_names, &role.name, role.id);
        }
        Ok(())
    }

    async fn insert_user(&self, user: &User) -> Result<(), StoreError> {
        if self.users.contains_key(&user.id) {
            return Err(StoreError::Conflict("User already exists".to_string()));
        }
        let _references = self.references.read().await;
        self.require_organization(user.org_id)?;
        self.require_role(user.role_id)?;

        let email = normalize_email(&user.email);
        claim(&self.user_emails, &email, user.id, "Email")?;
        if let Err(e) = claim(&self.user_authkeys, &user.authkey_hash, user.id, "Authkey") {
            release(&self.user_emails, &email, user.id);
            return Err(e);
        }

        self.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn get_user(&self, id: Uuid) -> Result<User, StoreError> {
        self.users
            .get(&id)
            .map(|user| user.clone())
            .ok_or_else(|| StoreError::NotFound("User".to_string()))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let id = self
            .user_emails
            .get(&normalize_email(email))
            .map(|entry| *entry.value());
        Ok(id.and_then(|id| self.users.get(&id).map(|user| user.clone())))
    }

    async fn find_user_by_authkey_hash(&self, hash: &str) -> Result<Option<User>, StoreError> {
        let id = self.user_authkeys.get(hash).map(|entry| *entry.value());
        Ok(id.and_then(|id| self.users.get(&id).map(|user| user.clone())))
    }

    async fn list_users(&self) -> Result<Vec<User>, StoreError> {
        Ok(sorted(&self.users, |user| user.created_at))
    }

    async fn list_users_in_organization(&self, org_id: Uuid) -> Result<Vec<User>, StoreError> {
        let mut users = self.list_users().await?;
        users.retain(|user| user.org_id == org_id);
        Ok(users)
    }

    async fn count_users_in_organization(&self, org_id: Uuid) -> Result<usize, StoreError> {
        Ok(self.users.iter().filter(|entry| entry.org_id == org_id).count())
    }

    async fn count_users_with_role(&self, role_id: Uuid) -> Result<usize, StoreError> {
        Ok(self.users.iter().filter(|entry| entry.role_id == role_id).count())
    }

    async fn update_user(&self, user: &User) -> Result<(), StoreError> {
        let _references = self.references.read().await;
        let previous = self.get_user(user.id).await?;
        self.require_organization(user.org_id)?;
        self.require_role(user.role_id)?;

        let old_email = normalize_email(&previous.email);
        let new_email = normalize_email(&user.email);
        let email_changed = old_email != new_email;
        if email_changed {
            claim(&self.user_emails, &new_email, user.id, "Email")?;
        }

        let key_changed = previous.authkey_hash != user.authkey_hash;
        if key_changed {
            if let Err(e) = claim(&self.user_authkeys, &user.authkey_hash, user.id, "Authkey") {
                if email_changed {
                    release(&self.user_emails, &new_email, user.id);
                }
                return Err(e);
            }
        }

        self.users.insert(user.id, user.clone());

        if email_changed {
            release(&self.user_emails, &old_email, user.id);
        }
        if key_changed {
            release(&self.user_authkeys, &previous.authkey_hash, user.id);
        }
        Ok(())
    }

    async fn delete_user(&self, id: Uuid) -> Result<(), StoreError> {
        let (_, user) = self
            .users
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound("User".to_string()))?;
        release(&self.user_emails, &normalize_email(&user.email), id);
        release(&self.user_authkeys, &user.authkey_hash, id);
        Ok(())
    }

    async fn insert_auth_key(&self, key: &AdvancedAuthKey) -> Result<(), StoreError> {
        if !self.users.contains_key(&key.user_id) {
            return Err(StoreError::NotFound("User".to_string()));
        }
        claim(&self.auth_key_hashes, &key.token_hash, key.id, "Authkey")?;
        self.auth_keys.insert(key.id, key.clone());
        Ok(())
    }

    async fn get_auth_key(&self, id: Uuid) -> Result<AdvancedAuthKey, StoreError> {
        self.auth_keys
            .get(&id)
            .map(|key| key.clone())
            .ok_or_else(|| StoreError::NotFound("Authkey".to_string()))
    }

    async fn find_auth_key_by_hash(&self, hash: &str) -> Result<Option<AdvancedAuthKey>, StoreError> {
        let id = self.auth_key_hashes.get(hash).map(|entry| *entry.value());
        Ok(id.and_then(|id| self.auth_keys.get(&id).map(|key| key.clone())))
    }

    async fn list_auth_keys(&self) -> Result<Vec<AdvancedAuthKey>, StoreError> {
        Ok(sorted(&self.auth_keys, |key| key.created_at))
    }

    async fn list_auth_keys_for_user(&self, user_id: Uuid) -> Result<Vec<AdvancedAuthKey>, StoreError> {
        let mut keys = self.list_auth_keys().await?;
        keys.retain(|key| key.user_id == user_id);
        Ok(keys)
    }

    async fn delete_auth_key(&self, id: Uuid) -> Result<(), StoreError> {
        let (_, key) = self
            .auth_keys
            .remove(&id)
            .ok_or_else(|| StoreError::NotFound("Authkey".to_string()))?;
        release(&self.auth_key_hashes, &key.token_hash, id);
        Ok(())
    }

    async fn delete_auth_keys_for_user(&self, user_id: Uuid) -> Result<usize, StoreError> {
        let ids: Vec<Uuid> = self
            .auth_keys
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.id)
            .collect();

        let mut removed = 0;
        for id in ids {
            if let Some((_, key)) = self.auth_keys.remove(&id) {
                release(&self.auth_key_hashes, &key.token_hash, id);
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn lock_user(&self, user_id: Uuid) -> EntityGuard {
        acquire(&self.user_locks, user_id).await
    }

    async fn lock_email(&self, email: &str) -> EntityGuard {
        acquire(&self.email_locks, normalize_email(email)).await
    }
}
