//! Advanced authkeys - revocable, optionally time-bounded API credentials.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::utils::token;

/// Stored advanced key. Only the digest and the first/last four characters
/// of the raw token are kept.
#[derive(Debug, Clone)]
pub struct AdvancedAuthKey {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token_hash: String,
    pub key_start: String,
    pub key_end: String,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expiration: Option<NaiveDate>,
}

impl AdvancedAuthKey {
    pub fn new(user_id: Uuid, raw_token: &str, options: KeyOptions) -> Self {
        let (key_start, key_end) = token::display_parts(raw_token);
        Self {
            id: Uuid::new_v4(),
            user_id,
            token_hash: token::hash_authkey(raw_token),
            key_start,
            key_end,
            comment: options.comment,
            created_at: Utc::now(),
            expiration: options.expiration,
        }
    }

    /// The expiration date itself is still a valid day.
    pub fn is_expired_on(&self, today: NaiveDate) -> bool {
        matches!(self.expiration, Some(expiration) if today > expiration)
    }

    pub fn view(&self) -> AuthKeyView {
        AuthKeyView::from(self)
    }
}

/// Options accepted when issuing a key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyOptions {
    pub expiration: Option<NaiveDate>,
    pub comment: Option<String>,
}

/// Key metadata safe to show again after creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthKeyView {
    pub id: Uuid,
    pub user_id: Uuid,
    pub key_start: String,
    pub key_end: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expiration: Option<NaiveDate>,
}

impl From<&AdvancedAuthKey> for AuthKeyView {
    fn from(key: &AdvancedAuthKey) -> Self {
        Self {
            id: key.id,
            user_id: key.user_id,
            key_start: key.key_start.clone(),
            key_end: key.key_end.clone(),
            comment: key.comment.clone(),
            created_at: key.created_at,
            expiration: key.expiration,
        }
    }
}

/// Issuance response (includes the raw token once).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedAuthKey {
    #[serde(flatten)]
    pub key: AuthKeyView,
    pub authkey_raw: String,
}
