//! User Directory
//!
//! Create/read/update/delete over user profiles. Relation sets are never
//! edited here; they belong to the connection manager.

use super::{NewUser, ProfileUpdate, User, UserId, UserStore};
use crate::error::{ConflictKind, GraphError, GraphResult};
use std::sync::Arc;
use tracing::{info, instrument};

const MAX_NAME_LEN: usize = 255;
const MAX_EMAIL_LEN: usize = 320;

/// Profile-level access to the user store
pub struct UserDirectory {
    store: Arc<dyn UserStore>,
}

impl UserDirectory {
    pub fn new(store: Arc<dyn UserStore>) -> Self {
        Self { store }
    }

    /// Register a new user with a fresh id and empty relation sets
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create_user(&self, request: NewUser) -> GraphResult<User> {
        let name = validate_name(&request.name)?;
        let email = validate_email(&request.email)?;

        if self.store.find_by_email(&email).await?.is_some() {
            return Err(GraphError::Conflict(ConflictKind::EmailTaken));
        }

        let user = User::new(UserId::new(), name, email, request.picture);
        self.store.save(&user).await?;

        info!("User created: {}", user.id);
        Ok(user)
    }

    pub async fn get_user(&self, id: UserId) -> GraphResult<User> {
        self.store
            .find_by_id(id)
            .await?
            .ok_or(GraphError::UserNotFound(id))
    }

    pub async fn list_users(&self) -> GraphResult<Vec<User>> {
        Ok(self.store.list().await?)
    }

    /// Apply a profile update; relation sets are left untouched.
    ///
    /// Only name, email and picture are written, on top of the latest stored
    /// record, so a connection change landing meanwhile is kept.
    #[instrument(skip(self, update))]
    pub async fn update_profile(&self, id: UserId, update: ProfileUpdate) -> GraphResult<User> {
        let name = update.name.as_deref().map(validate_name).transpose()?;

        let email = update.email.as_deref().map(validate_email).transpose()?;
        if let Some(email) = &email {
            if let Some(existing) = self.store.find_by_email(email).await? {
                if existing.id != id {
                    return Err(GraphError::Conflict(ConflictKind::EmailTaken));
                }
            }
        }

        let picture = update
            .picture
            .map(|picture| Some(picture).filter(|p| !p.trim().is_empty()));

        let updated = self
            .store
            .update(
                id,
                Box::new(move |user: &mut User| {
                    let mut changed = false;
                    if let Some(name) = name {
                        changed |= assign(&mut user.name, name);
                    }
                    if let Some(email) = email {
                        changed |= assign(&mut user.email, email);
                    }
                    if let Some(picture) = picture {
                        changed |= assign(&mut user.picture, picture);
                    }
                    changed
                }),
            )
            .await?
            .ok_or(GraphError::UserNotFound(id))?;

        if updated.changed {
            info!("User profile updated: {}", id);
        }
        Ok(updated.user)
    }

    /// Delete a user record.
    ///
    /// Counterparts keep the id in their relation sets; listings skip ids
    /// that no longer resolve.
    #[instrument(skip(self))]
    pub async fn delete_user(&self, id: UserId) -> GraphResult<()> {
        if self.store.delete(id).await? {
            info!("User deleted: {}", id);
            Ok(())
        } else {
            Err(GraphError::UserNotFound(id))
        }
    }
}

fn assign<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        return false;
    }
    *slot = value;
    true
}

fn validate_name(name: &str) -> GraphResult<String> {
    let name = name.trim();
    if name.is_empty() || name.len() > MAX_NAME_LEN {
        return Err(GraphError::InvalidOperation(format!(
            "name must be between 1 and {} characters",
            MAX_NAME_LEN
        )));
    }
    Ok(name.to_string())
}

fn validate_email(email: &str) -> GraphResult<String> {
    let email = email.trim();
    let well_formed = email
        .split_once('@')
        .map(|(local, domain)| !local.is_empty() && !domain.is_empty())
        .unwrap_or(false);

    if !well_formed || email.len() > MAX_EMAIL_LEN {
        return Err(GraphError::InvalidOperation(format!(
            "invalid email address: {}",
            email
        )));
    }
    Ok(email.to_string())
}
