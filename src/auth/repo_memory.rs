//! In-process `UserStore` with the same uniqueness rules as the Postgres schema.

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::repo::{StoreError, StoreResult, UserStore};
use super::repo_types::{NewUser, User};

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<Vec<User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users.iter().find(|u| u.email.eq_ignore_ascii_case(email)).cloned())
    }

    async fn find_by_google_id(&self, google_id: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .iter()
            .find(|u| u.google_id.as_deref() == Some(google_id))
            .cloned())
    }

    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.email.eq_ignore_ascii_case(&user.email)) {
            return Err(StoreError::Duplicate("email"));
        }
        if let Some(gid) = &user.google_id {
            if users.iter().any(|u| u.google_id.as_ref() == Some(gid)) {
                return Err(StoreError::Duplicate("google_id"));
            }
        }
        if user.password_hash.is_none() && user.google_id.is_none() {
            return Err(StoreError::Backend(anyhow::anyhow!(
                "user needs a password or a google identity"
            )));
        }
        let stored = User {
            id: Uuid::new_v4(),
            fullname: user.fullname,
            email: user.email,
            password_hash: user.password_hash,
            google_id: user.google_id,
            picture: user.picture,
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(stored.clone());
        Ok(stored)
    }

    async fn link_google(&self, id: Uuid, google_id: &str, picture: Option<&str>) -> StoreResult<User> {
        let mut users = self.users.write().await;
        if users.iter().any(|u| u.id != id && u.google_id.as_deref() == Some(google_id)) {
            return Err(StoreError::Duplicate("google_id"));
        }
        let user = users
            .iter_mut()
            .find(|u| u.id == id)
            .ok_or_else(|| StoreError::Backend(anyhow::anyhow!("user {id} not found")))?;
        user.google_id = Some(google_id.to_string());
        if user.picture.is_none() {
            user.picture = picture.map(str::to_string);
        }
        Ok(user.clone())
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        Ok(self.users.read().await.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(email: &str) -> NewUser {
        NewUser {
            fullname: "Ada".into(),
            email: email.into(),
            password_hash: Some("$argon2id$fake".into()),
            google_id: None,
            picture: None,
        }
    }

    #[tokio::test]
    async fn email_uniqueness_ignores_case() {
        let store = MemoryUserStore::new();
        store.create(local("ada@example.com")).await.unwrap();
        let err = store.create(local("ADA@example.com")).await.unwrap_err();
        assert!(matches!(err, StoreError::Duplicate("email")));
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn link_keeps_existing_picture() {
        let store = MemoryUserStore::new();
        let mut new = local("ada@example.com");
        new.picture = Some("https://img/old.png".into());
        let user = store.create(new).await.unwrap();

        let linked = store
            .link_google(user.id, "g-123", Some("https://img/new.png"))
            .await
            .unwrap();
        assert_eq!(linked.google_id.as_deref(), Some("g-123"));
        assert_eq!(linked.picture.as_deref(), Some("https://img/old.png"));

        let found = store.find_by_google_id("g-123").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);
        assert!(store.find_by_google_id("g-999").await.unwrap().is_none());
    }
}
