//! User Store Module
//!
//! User records, the persistence port and the in-memory implementation.

pub mod directory;
pub mod memory;
pub mod repository;
pub mod types;

pub use directory::UserDirectory;
pub use memory::MemoryUserStore;
pub use repository::{Updated, UserMutation, UserStore};
pub use types::{NewUser, ProfileUpdate, RelationSet, User, UserId, UserProfile};
