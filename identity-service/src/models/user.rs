//! User model - platform accounts bound to one organization and one role.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// User entity.
///
/// `password_hash` is `None` for accounts that have no usable password
/// (federated or administratively created without one). `authkey_hash` is the
/// SHA-256 digest of the primary authkey; the raw key is only ever returned
/// at creation or reset time.
#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub org_id: Uuid,
    pub role_id: Uuid,
    pub password_hash: Option<String>,
    pub authkey_hash: String,
    pub disabled: bool,
    pub change_pw: bool,
    pub must_change_password_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: impl Into<String>,
        org_id: Uuid,
        role_id: Uuid,
        password_hash: Option<String>,
        authkey_hash: String,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            email: normalize_email(&email.into()),
            org_id,
            role_id,
            password_hash,
            authkey_hash,
            disabled: false,
            change_pw: false,
            must_change_password_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn view(&self) -> UserView {
        UserView::from(self)
    }
}

/// Emails are compared case-insensitively and stored trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Normalizes a forced-password-change reason. Blank text means no reason.
pub fn password_reason(reason: &str) -> Option<String> {
    let reason = reason.trim();
    (!reason.is_empty()).then(|| reason.to_string())
}

/// User response for API (without sensitive fields).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserView {
    pub id: Uuid,
    pub email: String,
    pub org_id: Uuid,
    pub role_id: Uuid,
    pub disabled: bool,
    pub change_pw: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub must_change_password_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserView {
    fn from(u: &User) -> Self {
        Self {
            id: u.id,
            email: u.email.clone(),
            org_id: u.org_id,
            role_id: u.role_id,
            disabled: u.disabled,
            change_pw: u.change_pw,
            must_change_password_reason: u.must_change_password_reason.clone(),
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

/// Request to create a user. Missing `org_id` means "the actor's own
/// organization"; missing `role_id` means the configured default role.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewUser {
    pub email: String,
    pub org_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub password: Option<String>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub change_pw: bool,
    /// Shown to the user on login. Only kept when `change_pw` is set.
    pub must_change_password_reason: Option<String>,
}

/// Result of a user creation: the view plus the one-time primary authkey.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedUser {
    pub user: UserView,
    pub authkey: String,
}

/// Fields a profile update may touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserField {
    Email,
    Password,
    OrgId,
    RoleId,
    Disabled,
    ChangePw,
}

impl UserField {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserField::Email => "email",
            UserField::Password => "password",
            UserField::OrgId => "org_id",
            UserField::RoleId => "role_id",
            UserField::Disabled => "disabled",
            UserField::ChangePw => "change_pw",
        }
    }
}

impl fmt::Display for UserField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Partial profile update. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserChanges {
    pub email: Option<String>,
    pub password: Option<String>,
    pub org_id: Option<Uuid>,
    pub role_id: Option<Uuid>,
    pub disabled: Option<bool>,
    pub change_pw: Option<bool>,
    /// Travels with `change_pw`; an empty string clears the reason.
    pub must_change_password_reason: Option<String>,
}

impl UserChanges {
    pub fn touches(&self, field: UserField) -> bool {
        match field {
            UserField::Email => self.email.is_some(),
            UserField::Password => self.password.is_some(),
            UserField::OrgId => self.org_id.is_some(),
            UserField::RoleId => self.role_id.is_some(),
            UserField::Disabled => self.disabled.is_some(),
            UserField::ChangePw => {
                self.change_pw.is_some() || self.must_change_password_reason.is_some()
            }
        }
    }

    /// Copy of the changes with `fields` cleared.
    pub fn without(&self, fields: &[UserField]) -> Self {
        let mut filtered = self.clone();
        for field in fields {
            match field {
                UserField::Email => filtered.email = None,
                UserField::Password => filtered.password = None,
                UserField::OrgId => filtered.org_id = None,
                UserField::RoleId => filtered.role_id = None,
                UserField::Disabled => filtered.disabled = None,
                UserField::ChangePw => {
                    filtered.change_pw = None;
                    filtered.must_change_password_reason = None;
                }
            }
        }
        filtered
    }
}

/// Outcome of an update that passed authorization. `ignored` lists the
/// fields the policy silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub user: UserView,
    pub ignored: Vec<UserField>,
}
