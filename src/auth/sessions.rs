//! Process-local session registry for `SessionMode::Registry`.
//!
//! Entries live at most `ttl`; expired entries are rejected on lookup and
//! evicted by `purge_expired`, which `main` runs on an interval. Nothing here
//! survives a restart.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

use super::repo_types::PublicUser;

#[derive(Debug, Clone)]
pub struct SessionEntry {
    pub user: PublicUser,
    pub expires_at: OffsetDateTime,
}

#[derive(Clone)]
pub struct SessionRegistry {
    entries: Arc<RwLock<HashMap<Uuid, SessionEntry>>>,
    ttl: Duration,
}

impl SessionRegistry {
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    pub async fn create(&self, user: PublicUser) -> (Uuid, SessionEntry) {
        self.create_at(user, OffsetDateTime::now_utc()).await
    }

    pub async fn create_at(&self, user: PublicUser, now: OffsetDateTime) -> (Uuid, SessionEntry) {
        // v4 ids come from the OS CSPRNG.
        let id = Uuid::new_v4();
        let entry = SessionEntry {
            user,
            expires_at: now + self.ttl,
        };
        self.entries.write().await.insert(id, entry.clone());
        debug!(session_id = %id, user_id = %entry.user.id, "session created");
        (id, entry)
    }

    pub async fn get(&self, id: Uuid) -> Option<SessionEntry> {
        self.get_at(id, OffsetDateTime::now_utc()).await
    }

    pub async fn get_at(&self, id: Uuid, now: OffsetDateTime) -> Option<SessionEntry> {
        let entry = self.entries.read().await.get(&id).cloned()?;
        if entry.expires_at <= now {
            self.entries.write().await.remove(&id);
            return None;
        }
        Some(entry)
    }

    pub async fn remove(&self, id: Uuid) -> bool {
        self.entries.write().await.remove(&id).is_some()
    }

    /// Drops every expired entry and returns how many were dropped.
    pub async fn purge_expired(&self) -> usize {
        self.purge_expired_at(OffsetDateTime::now_utc()).await
    }

    pub async fn purge_expired_at(&self, now: OffsetDateTime) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration as TimeDuration;

    fn user() -> PublicUser {
        PublicUser {
            id: Uuid::new_v4(),
            fullname: "Ada".into(),
            email: "ada@example.com".into(),
            picture: None,
            google_linked: false,
        }
    }

    #[tokio::test]
    async fn ids_are_unique_and_resolvable() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let (a, _) = registry.create(user()).await;
        let (b, _) = registry.create(user()).await;
        assert_ne!(a, b);
        assert_eq!(a.get_version_num(), 4);
        assert!(registry.get(a).await.is_some());
        assert!(registry.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn expired_entries_are_rejected_and_evicted() {
        let registry = SessionRegistry::new(Duration::from_secs(60 * 60 * 24));
        let t0 = OffsetDateTime::now_utc();
        let (id, _) = registry.create_at(user(), t0).await;

        assert!(registry.get_at(id, t0 + TimeDuration::hours(23)).await.is_some());
        assert!(registry.get_at(id, t0 + TimeDuration::hours(25)).await.is_none());
        assert_eq!(registry.len().await, 0);
    }

    #[tokio::test]
    async fn purge_only_drops_expired() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let t0 = OffsetDateTime::now_utc();
        registry.create_at(user(), t0 - TimeDuration::minutes(5)).await;
        registry.create_at(user(), t0).await;

        assert_eq!(registry.purge_expired_at(t0).await, 1);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn remove_revokes() {
        let registry = SessionRegistry::new(Duration::from_secs(60));
        let (id, _) = registry.create(user()).await;
        assert!(registry.remove(id).await);
        assert!(!registry.remove(id).await);
        assert!(registry.get(id).await.is_none());
    }
}
