//! User Store Port

use super::{User, UserId};
use crate::error::StoreResult;
use async_trait::async_trait;

/// In-place change to one user record, returning whether anything changed
pub type UserMutation = Box<dyn FnOnce(&mut User) -> bool + Send>;

/// Record as it stands after [`UserStore::update`]
#[derive(Debug, Clone)]
pub struct Updated {
    pub user: User,
    pub changed: bool,
}

/// Persistence boundary for user records.
///
/// Each record is an independent aggregate: `save` is atomic for one user
/// and nothing spans two users.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Load a user by id
    async fn find_by_id(&self, id: UserId) -> StoreResult<Option<User>>;

    /// Insert or replace a user record
    async fn save(&self, user: &User) -> StoreResult<()>;

    /// Apply `mutation` to the current record atomically.
    ///
    /// The mutation sees the latest stored state, so concurrent updates to
    /// one user never overwrite each other. A record the mutation leaves
    /// unchanged is not written. Returns `None` if the user does not exist.
    async fn update(&self, id: UserId, mutation: UserMutation) -> StoreResult<Option<Updated>>;

    /// Look a user up by email (case-insensitive)
    async fn find_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// All users, in creation order
    async fn list(&self) -> StoreResult<Vec<User>>;

    /// Delete a user, returning whether it existed
    async fn delete(&self, id: UserId) -> StoreResult<bool>;

    /// Load several users, skipping ids that no longer resolve
    async fn find_many(&self, ids: &[UserId]) -> StoreResult<Vec<User>> {
        let mut users = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(user) = self.find_by_id(*id).await? {
                users.push(user);
            }
        }
        Ok(users)
    }
}
