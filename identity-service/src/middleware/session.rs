//! In-process session registry. The identity core only ever sees the user id
//! a session token resolves to.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;
use rand::RngCore;
use std::sync::Arc;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "session";

/// Lifetime of a session unless configured otherwise.
pub const DEFAULT_SESSION_TTL_MINUTES: i64 = 12 * 60;

#[derive(Debug, Clone, Copy)]
struct Session {
    user_id: Uuid,
    expiry_utc: DateTime<Utc>,
}

impl Session {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expiry_utc
    }
}

#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<String, Session>>,
    ttl: Duration,
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::with_ttl(Duration::minutes(DEFAULT_SESSION_TTL_MINUTES))
    }
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Opens a session and returns its opaque token. Expired sessions are
    /// swept on the way.
    pub fn create(&self, user_id: Uuid) -> String {
        let now = Utc::now();
        self.prune_at(now);

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);
        self.sessions.insert(
            token.clone(),
            Session {
                user_id,
                expiry_utc: now + self.ttl,
            },
        );
        token
    }

    pub fn resolve(&self, token: &str) -> Option<Uuid> {
        let now = Utc::now();
        let session = *self.sessions.get(token)?.value();
        if session.is_expired(now) {
            self.sessions.remove_if(token, |_, s| s.is_expired(now));
            return None;
        }
        Some(session.user_id)
    }

    pub fn revoke(&self, token: &str) {
        self.sessions.remove(token);
    }

    /// Ends every session of one user.
    pub fn revoke_user(&self, user_id: Uuid) {
        self.sessions.retain(|_, session| session.user_id != user_id);
    }

    /// Drops expired sessions and returns how many are left.
    pub fn prune(&self) -> usize {
        self.prune_at(Utc::now())
    }

    fn prune_at(&self, now: DateTime<Utc>) -> usize {
        self.sessions.retain(|_, session| !session.is_expired(now));
        self.sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sessions_resolve_until_revoked() {
        let registry = SessionRegistry::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let a1 = registry.create(alice);
        let a2 = registry.create(alice);
        let b1 = registry.create(bob);
        assert_ne!(a1, a2);
        assert_eq!(registry.resolve(&a1), Some(alice));

        registry.revoke(&a1);
        assert_eq!(registry.resolve(&a1), None);

        registry.revoke_user(alice);
        assert_eq!(registry.resolve(&a2), None);
        assert_eq!(registry.resolve(&b1), Some(bob));
    }

    #[test]
    fn expired_sessions_stop_resolving_and_are_dropped() {
        let registry = SessionRegistry::with_ttl(Duration::zero());
        let user = Uuid::new_v4();

        let tokens: Vec<String> = (0..1000).map(|_| registry.create(user)).collect();
        assert!(tokens.iter().all(|token| registry.resolve(token).is_none()));
        assert!(registry.is_empty());
    }

    #[test]
    fn login_sweeps_expired_sessions() {
        let expired = SessionRegistry::with_ttl(Duration::zero());
        for _ in 0..10 {
            expired.create(Uuid::new_v4());
        }
        assert!(expired.len() <= 1);
        assert_eq!(expired.prune(), 0);

        let live = SessionRegistry::with_ttl(Duration::hours(1));
        let token = live.create(Uuid::new_v4());
        assert_eq!(live.prune(), 1);
        assert!(live.resolve(&token).is_some());
    }
}
