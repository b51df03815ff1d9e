//! Data models for the resilience layer.
//!
//! This module re-exports all model types used throughout the crate.

pub mod connection;
pub mod query;

// Re-export commonly used types
pub use connection::DatabaseType;
pub use query::{ColumnMetadata, QueryParam, QueryResult, render_params};
