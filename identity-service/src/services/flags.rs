//! Runtime feature flags published as versioned snapshots.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Header-based federated login settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FederationConfig {
    pub enabled: bool,
    /// Organization used when no identifier is supplied, or always when
    /// `use_default_org` is set.
    pub default_org: Option<String>,
    pub use_default_org: bool,
    pub mail_attr: String,
    pub org_attr: String,
    pub group_attr: String,
    pub group_separator: String,
    /// Group token to role name.
    pub group_to_role: BTreeMap<String, String>,
}

impl Default for FederationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            default_org: None,
            use_default_org: false,
            mail_attr: "Email-Tag".to_string(),
            org_attr: "Federation-Tag".to_string(),
            group_attr: "Group-Tag".to_string(),
            group_separator: ",".to_string(),
            group_to_role: BTreeMap::new(),
        }
    }
}

impl FederationConfig {
    /// Parses `group=role name;group2=role name` pairs.
    pub fn parse_group_map(raw: &str) -> Result<BTreeMap<String, String>, String> {
        let mut map = BTreeMap::new();
        for pair in raw.split(';').map(str::trim).filter(|p| !p.is_empty()) {
            let (group, role) = pair
                .split_once('=')
                .ok_or_else(|| format!("group mapping '{}' is not group=role", pair))?;
            let (group, role) = (group.trim(), role.trim());
            if group.is_empty() || role.is_empty() {
                return Err(format!("group mapping '{}' has an empty side", pair));
            }
            map.insert(group.to_string(), role.to_string());
        }
        Ok(map)
    }
}

/// Process-wide switches consulted by every decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlags {
    pub allow_self_registration: bool,
    pub disable_user_login_change: bool,
    pub disable_user_password_change: bool,
    pub disable_user_add: bool,
    pub advanced_authkeys_required: bool,
    pub platform_live: bool,
    pub auth_enforced: bool,
    pub site_admin_bypasses_user_locks: bool,
    pub default_role: String,
    pub federation: FederationConfig,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            allow_self_registration: false,
            disable_user_login_change: false,
            disable_user_password_change: false,
            disable_user_add: false,
            advanced_authkeys_required: false,
            platform_live: true,
            auth_enforced: false,
            site_admin_bypasses_user_locks: false,
            default_role: "user".to_string(),
            federation: FederationConfig::default(),
        }
    }
}

impl FeatureFlags {
    /// The local email/password form is only offered while federation does
    /// not enforce header-based login.
    pub fn form_login_available(&self) -> bool {
        !(self.federation.enabled && self.auth_enforced)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.default_role.trim().is_empty() {
            return Err("default_role must not be empty".to_string());
        }
        if self.federation.group_separator.is_empty() {
            return Err("federation group separator must not be empty".to_string());
        }
        if self.federation.group_to_role.values().any(|r| r.trim().is_empty()) {
            return Err("federation group mapping has an empty role name".to_string());
        }
        Ok(())
    }
}

/// Partial update of the flags. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FlagsPatch {
    pub allow_self_registration: Option<bool>,
    pub disable_user_login_change: Option<bool>,
    pub disable_user_password_change: Option<bool>,
    pub disable_user_add: Option<bool>,
    pub advanced_authkeys_required: Option<bool>,
    pub platform_live: Option<bool>,
    pub auth_enforced: Option<bool>,
    pub site_admin_bypasses_user_locks: Option<bool>,
    pub default_role: Option<String>,
    pub federation: Option<FederationConfig>,
}

impl FlagsPatch {
    pub fn apply_to(&self, flags: &mut FeatureFlags) {
        fn set<T: Clone>(target: &mut T, value: &Option<T>) {
            if let Some(v) = value {
                *target = v.clone();
            }
        }

        set(&mut flags.allow_self_registration, &self.allow_self_registration);
        set(&mut flags.disable_user_login_change, &self.disable_user_login_change);
        set(&mut flags.disable_user_password_change, &self.disable_user_password_change);
        set(&mut flags.disable_user_add, &self.disable_user_add);
        set(&mut flags.advanced_authkeys_required, &self.advanced_authkeys_required);
        set(&mut flags.platform_live, &self.platform_live);
        set(&mut flags.auth_enforced, &self.auth_enforced);
        set(&mut flags.site_admin_bypasses_user_locks, &self.site_admin_bypasses_user_locks);
        set(&mut flags.default_role, &self.default_role);
        set(&mut flags.federation, &self.federation);
    }
}

/// Immutable point-in-time view of the flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlagSnapshot {
    pub version: u64,
    pub flags: FeatureFlags,
}

/// Owner of the current snapshot. Cloning shares the same channel.
#[derive(Clone)]
pub struct FlagStore {
    tx: Arc<watch::Sender<Arc<FlagSnapshot>>>,
}

impl FlagStore {
    pub fn new(flags: FeatureFlags) -> Self {
        let (tx, _rx) = watch::channel(Arc::new(FlagSnapshot { version: 1, flags }));
        Self { tx: Arc::new(tx) }
    }

    pub fn snapshot(&self) -> Arc<FlagSnapshot> {
        self.tx.borrow().clone()
    }

    /// Applies `change` to a copy of the current flags and publishes the
    /// result as the next version.
    pub fn update<F>(&self, change: F) -> Arc<FlagSnapshot>
    where
        F: FnOnce(&mut FeatureFlags),
    {
        let mut published = None;
        self.tx.send_modify(|current| {
            let mut flags = current.flags.clone();
            change(&mut flags);
            let next = Arc::new(FlagSnapshot {
                version: current.version + 1,
                flags,
            });
            *current = next.clone();
            published = Some(next);
        });
        published.unwrap_or_else(|| self.snapshot())
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<FlagSnapshot>> {
        self.tx.subscribe()
    }
}

impl Default for FlagStore {
    fn default() -> Self {
        Self::new(FeatureFlags::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_bumps_version_and_keeps_old_snapshot_intact() {
        let store = FlagStore::default();
        let before = store.snapshot();

        let after = store.update(|flags| flags.platform_live = false);

        assert_eq!(before.version + 1, after.version);
        assert!(before.flags.platform_live);
        assert!(!after.flags.platform_live);
        assert_eq!(store.snapshot().version, after.version);
    }

    #[test]
    fn subscribers_observe_updates() {
        let store = FlagStore::default();
        let mut rx = store.subscribe();

        store.update(|flags| flags.disable_user_add = true);

        tokio_test::block_on(async {
            rx.changed().await.expect("sender alive");
        });
        assert!(rx.borrow().flags.disable_user_add);
    }

    #[test]
    fn patch_only_touches_present_fields() {
        let mut flags = FeatureFlags::default();
        let patch = FlagsPatch {
            auth_enforced: Some(true),
            ..Default::default()
        };
        patch.apply_to(&mut flags);

        assert!(flags.auth_enforced);
        assert!(flags.platform_live);
        assert_eq!(flags.default_role, "user");
    }

    #[test]
    fn form_login_hidden_only_when_federation_enforced() {
        let mut flags = FeatureFlags::default();
        flags.auth_enforced = true;
        assert!(flags.form_login_available());

        flags.federation.enabled = true;
        assert!(!flags.form_login_available());
    }

    #[test]
    fn group_map_parsing() {
        let map = FederationConfig::parse_group_map("admin=admin; user = user ;").unwrap();
        assert_eq!(map.get("admin").map(String::as_str), Some("admin"));
        assert_eq!(map.get("user").map(String::as_str), Some("user"));

        assert!(FederationConfig::parse_group_map("admin").is_err());
        assert!(FederationConfig::parse_group_map("=admin").is_err());
    }

    #[test]
    fn validation_rejects_empty_separator() {
        let mut flags = FeatureFlags::default();
        assert!(flags.validate().is_ok());
        flags.federation.group_separator.clear();
        assert!(flags.validate().is_err());
    }
}
