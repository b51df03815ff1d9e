//! Resilience layer over pooled SQL database clients.
//!
//! Adds connection retry with backoff, structured query logging and
//! transaction-scoped execution on top of `sqlx` pools for SQLite, PostgreSQL
//! and MySQL.

pub mod client;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod retry;

pub use client::DatabaseClient;
pub use config::{Config, DatabaseConfig, PoolOptions};
pub use db::{DbConnection, IdleConnectionError, IdleErrorHandler};
pub use error::{DbError, DbResult};
pub use models::{QueryParam, QueryResult};
pub use retry::{Backoff, RetryError, RetryPolicy};
