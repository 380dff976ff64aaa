use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

struct Session {
    user_id: i64,
    expires_at: DateTime<Utc>,
}

/// Opaque server-side sessions: token -> user id with a TTL. Tokens are
/// random uuids carried by clients as bearer tokens; expired entries are
/// pruned lazily whenever a new session is created.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub async fn create(&self, user_id: i64) -> String {
        let token = Uuid::new_v4().to_string();
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        sessions.retain(|_, s| s.expires_at > now);
        sessions.insert(
            token.clone(),
            Session {
                user_id,
                expires_at: now + self.ttl,
            },
        );
        token
    }

    /// Resolve a token to its user id; `None` for unknown or expired tokens.
    pub async fn resolve(&self, token: &str) -> Option<i64> {
        let sessions = self.sessions.read().await;
        let session = sessions.get(token)?;
        if session.expires_at <= Utc::now() {
            return None;
        }
        Some(session.user_id)
    }

    pub async fn revoke(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tokens_resolve_until_revoked() {
        let store = SessionStore::new(Duration::hours(1));
        let token = store.create(42).await;

        assert_eq!(store.resolve(&token).await, Some(42));
        assert!(store.revoke(&token).await);
        assert_eq!(store.resolve(&token).await, None);
        assert!(!store.revoke(&token).await);
    }

    #[tokio::test]
    async fn expired_tokens_do_not_resolve() {
        let store = SessionStore::new(Duration::seconds(-1));
        let token = store.create(42).await;
        assert_eq!(store.resolve(&token).await, None);
    }

    #[tokio::test]
    async fn unknown_tokens_do_not_resolve() {
        let store = SessionStore::new(Duration::hours(1));
        assert_eq!(store.resolve("not-a-token").await, None);
    }
}
