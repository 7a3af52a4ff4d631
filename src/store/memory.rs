//! In-memory User Store

use super::{Updated, User, UserId, UserMutation, UserStore};
use crate::config::SeedUserConfig;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, info};

/// Process-local user store backed by a hash map.
///
/// Emails are unique (case-insensitive); a save that would duplicate one is
/// refused as a constraint violation, like a unique index would.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<UserId, User>>,
}

impl MemoryUserStore {
    /// Create a new empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated with seed profiles from configuration
    pub async fn from_seed(seed: &[SeedUserConfig]) -> StoreResult<Self> {
        let store = Self::new();
        store.load_from_config(seed).await?;
        Ok(store)
    }

    /// Load seed profiles from configuration
    pub async fn load_from_config(&self, seed: &[SeedUserConfig]) -> StoreResult<()> {
        for entry in seed {
            let user = User::new(
                entry.id.unwrap_or_default(),
                entry.name.clone(),
                entry.email.clone(),
                entry.picture.clone(),
            );
            debug!("Seeding user {} <{}>", user.id, user.email);
            self.save(&user).await?;
        }

        if !seed.is_empty() {
            info!("Seeded {} users into the in-memory store", seed.len());
        }
        Ok(())
    }

    /// Number of stored users
    pub async fn len(&self) -> usize {
        self.users.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.users.read().await.is_empty()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>> {
        Ok(self.users.read().await.get(&id).cloned())
    }

    async fn save(&self, user: &User) -> StoreResult<()> {
        let mut users = self.users.write().await;
        check_unique_email(&users, user)?;
        users.insert(user.id, user.clone());
        Ok(())
    }

    async fn update(&self, id: UserId, mutation: UserMutation) -> StoreResult<Option<Updated>> {
        let mut users = self.users.write().await;
        let Some(current) = users.get(&id) else {
            return Ok(None);
        };

        let mut user = current.clone();
        if !mutation(&mut user) {
            return Ok(Some(Updated {
                user,
                changed: false,
            }));
        }

        check_unique_email(&users, &user)?;
        user.touch();
        users.insert(id, user.clone());

        Ok(Some(Updated {
            user,
            changed: true,
        }))
    }

    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let users = self.users.read().await;
        Ok(users
            .values()
            .find(|user| user.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn list(&self) -> StoreResult<Vec<User>> {
        let users = self.users.read().await;
        let mut all: Vec<User> = users.values().cloned().collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(all)
    }

    async fn delete(&self, id: UserId) -> StoreResult<bool> {
        Ok(self.users.write().await.remove(&id).is_some())
    }
}

fn check_unique_email(users: &HashMap<UserId, User>, user: &User) -> StoreResult<()> {
    let email_taken = users
        .values()
        .any(|existing| existing.id != user.id && existing.email.eq_ignore_ascii_case(&user.email));
    if email_taken {
        return Err(StoreError::Constraint(format!(
            "duplicate email {}",
            user.email
        )));
    }
    Ok(())
}
