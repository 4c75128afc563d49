//! Organization model - the tenant that owns users.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An organization. `name` and `uuid` are both platform-wide unique.
///
/// `local` is false for organizations provisioned on the fly by a federated
/// login; those were never created by an administrator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Organization {
    pub id: Uuid,
    pub uuid: Uuid,
    pub name: String,
    pub local: bool,
    pub created_at: DateTime<Utc>,
}

impl Organization {
    pub fn new(name: impl Into<String>, local: bool) -> Self {
        Self {
            id: Uuid::new_v4(),
            uuid: Uuid::new_v4(),
            name: name.into(),
            local,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrganizationView {
    pub id: Uuid,
    pub uuid: Uuid,
    pub name: String,
    pub local: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&Organization> for OrganizationView {
    fn from(org: &Organization) -> Self {
        Self {
            id: org.id,
            uuid: org.uuid,
            name: org.name.clone(),
            local: org.local,
            created_at: org.created_at,
        }
    }
}
