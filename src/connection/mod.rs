//! Connection Graph Module
//!
//! Connection-request lifecycle between pairs of users.

pub mod manager;
pub mod types;

pub use manager::ConnectionManager;
pub use types::{Operation, PairMarkers, PairState};
