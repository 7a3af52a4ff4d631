//! Founderlink Library
//!
//! Connection graph service for a founder and collaborator network: users
//! send, accept, reject and remove connection requests, and the service
//! keeps the two sides of every relationship in agreement across
//! independently stored user records.

pub mod api;
pub mod config;
pub mod connection;
pub mod error;
pub mod metrics;
pub mod shutdown;
pub mod store;

pub use config::Config;
pub use connection::ConnectionManager;
pub use error::{GraphError, GraphResult};
pub use shutdown::ShutdownCoordinator;

/// Common error type for application plumbing
pub type Result<T> = anyhow::Result<T>;
