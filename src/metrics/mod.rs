//! Metrics Module
//!
//! Prometheus counters for connection graph operations.

pub mod collector;

pub use collector::Metrics;
