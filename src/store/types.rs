//! User Store Types

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;
use uuid::Uuid;

/// Unique, immutable user identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(Uuid);

impl UserId {
    /// Generate a fresh random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for UserId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(Self)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Ordered set of user ids held on a user record.
///
/// Insertion de-duplicates, so two racing writers appending the same id
/// still leave a single entry. First-insertion order is kept for listings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<UserId>", into = "Vec<UserId>")]
pub struct RelationSet(Vec<UserId>);

impl RelationSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn contains(&self, id: &UserId) -> bool {
        self.0.contains(id)
    }

    /// Insert an id, returning whether the set changed
    pub fn insert(&mut self, id: UserId) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    /// Remove an id, returning whether the set changed
    pub fn remove(&mut self, id: &UserId) -> bool {
        let before = self.0.len();
        self.0.retain(|existing| existing != id);
        self.0.len() != before
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[UserId] {
        &self.0
    }
}

impl From<Vec<UserId>> for RelationSet {
    fn from(ids: Vec<UserId>) -> Self {
        let mut set = RelationSet::new();
        for id in ids {
            set.insert(id);
        }
        set
    }
}

impl From<RelationSet> for Vec<UserId> {
    fn from(set: RelationSet) -> Self {
        set.0
    }
}

/// User record as persisted by the store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub picture: Option<String>,
    #[serde(default)]
    pub connections: RelationSet,
    #[serde(default)]
    pub sent_requests: RelationSet,
    #[serde(default)]
    pub pending_requests: RelationSet,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
}

impl User {
    /// Create a user with empty relation sets
    pub fn new(id: UserId, name: String, email: String, picture: Option<String>) -> Self {
        let now = SystemTime::now();
        Self {
            id,
            name,
            email,
            picture,
            connections: RelationSet::new(),
            sent_requests: RelationSet::new(),
            pending_requests: RelationSet::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Bump the modification timestamp before a save
    pub fn touch(&mut self) {
        self.updated_at = SystemTime::now();
    }
}

/// Lightweight profile used when relation sets are resolved for presentation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub picture: Option<String>,
}

impl From<&User> for UserProfile {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            email: user.email.clone(),
            picture: user.picture.clone(),
        }
    }
}

/// Fields accepted when registering a user in the directory
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Profile fields a generic update may touch.
///
/// Relation sets are deliberately absent: they only change through the
/// connection manager.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}
