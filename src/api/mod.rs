//! HTTP API Module
//!
//! REST surface over the user directory and the connection graph.

pub mod auth;
pub mod handlers;
pub mod router;
pub mod server;
pub mod types;

pub use auth::{ApiAuth, Caller, CALLER_HEADER};
pub use handlers::AppState;
pub use router::Api;
pub use server::ApiServer;
pub use types::*;
