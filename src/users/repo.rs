use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::users::repo_types::User;

/// Storage contract for users. Reads hand out owned copies.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Create a user with a fresh id and creation timestamp.
    async fn create(&self, email: &str, name: &str) -> anyhow::Result<User>;

    /// Find a user by id.
    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<User>>;

    /// All users, in insertion order.
    async fn find_all(&self) -> anyhow::Result<Vec<User>>;
}

#[derive(Debug, Default)]
pub struct InMemoryUserRepo {
    users: RwLock<Vec<User>>,
    next_id: AtomicU64,
}

impl InMemoryUserRepo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserRepo for InMemoryUserRepo {
    async fn create(&self, email: &str, name: &str) -> anyhow::Result<User> {
        let mut users = self.users.write().await;
        let n = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let user = User {
            id: format!("user-{}", n),
            email: email.to_string(),
            name: name.to_string(),
            created_at: OffsetDateTime::now_utc(),
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: &str) -> anyhow::Result<Option<User>> {
        Ok(self.users.read().await.iter().find(|u| u.id == id).cloned())
    }

    async fn find_all(&self) -> anyhow::Result<Vec<User>> {
        Ok(self.users.read().await.clone())
    }
}
