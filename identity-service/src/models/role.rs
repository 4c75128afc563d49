//! Role model - capability sets with an explicit privilege rank.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

/// Capabilities the identity core checks. Content-level permissions of the
/// wider platform are not modelled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// May authenticate through any mechanism.
    Auth,
    /// Unrestricted administration of the platform.
    SiteAdmin,
    /// Administration of users inside the holder's own organization.
    OrgAdmin,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Auth => "auth",
            Capability::SiteAdmin => "site_admin",
            Capability::OrgAdmin => "org_admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "auth" | "perm_auth" => Some(Capability::Auth),
            "site_admin" | "perm_site_admin" => Some(Capability::SiteAdmin),
            "org_admin" | "perm_admin" => Some(Capability::OrgAdmin),
            _ => None,
        }
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A role. Lower `rank` means more privilege; `rank` is the only thing
/// privilege comparisons look at, never `id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub rank: u32,
    pub capabilities: BTreeSet<Capability>,
    pub created_at: DateTime<Utc>,
}

impl Role {
    pub fn new(
        name: impl Into<String>,
        rank: u32,
        capabilities: impl IntoIterator<Item = Capability>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            rank,
            capabilities: capabilities.into_iter().collect(),
            created_at: Utc::now(),
        }
    }

    /// Built-in site administrator role.
    pub fn site_admin() -> Self {
        Self::new(
            "admin",
            1,
            [Capability::Auth, Capability::SiteAdmin, Capability::OrgAdmin],
        )
    }

    /// Built-in organization administrator role.
    pub fn org_admin() -> Self {
        Self::new("org_admin", 2, [Capability::Auth, Capability::OrgAdmin])
    }

    /// Built-in regular user role.
    pub fn user() -> Self {
        Self::new("user", 3, [Capability::Auth])
    }

    pub fn has(&self, capability: Capability) -> bool {
        self.capabilities.contains(&capability)
    }

    pub fn can_authenticate(&self) -> bool {
        self.has(Capability::Auth)
    }

    pub fn is_site_admin(&self) -> bool {
        self.has(Capability::SiteAdmin)
    }

    pub fn is_org_admin(&self) -> bool {
        self.has(Capability::OrgAdmin)
    }

    /// Strictly more privileged than `other`.
    pub fn outranks(&self, other: &Role) -> bool {
        self.rank < other.rank
    }
}

/// Request to create an ad-hoc role.
#[derive(Debug, Clone, Deserialize)]
pub struct NewRole {
    pub name: String,
    pub rank: u32,
    #[serde(default)]
    pub capabilities: BTreeSet<Capability>,
}

/// Partial update of a role.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RoleChanges {
    pub rank: Option<u32>,
    pub capabilities: Option<BTreeSet<Capability>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoleView {
    pub id: Uuid,
    pub name: String,
    pub rank: u32,
    pub capabilities: BTreeSet<Capability>,
}

impl From<&Role> for RoleView {
    fn from(role: &Role) -> Self {
        Self {
            id: role.id,
            name: role.name.clone(),
            rank: role.rank,
            capabilities: role.capabilities.clone(),
        }
    }
}
