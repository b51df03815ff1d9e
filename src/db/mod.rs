//! Database access layer.
//!
//! This module provides:
//! - Lazy connection pools per backend and leased connections
//! - Autocommit query execution with structured logging
//! - Transaction-scoped execution with guaranteed release
//! - Waiting for the database to become reachable
//! - Row decoding and parameter binding
//! - Reporting of errors on idle pooled connections

#[macro_use]
pub mod macros;
pub mod connection;
pub mod events;
pub mod executor;
mod params;
pub mod pool;
pub mod transaction;
pub mod types;
pub mod waiter;

pub use connection::DbConnection;
pub use events::{IdleConnectionError, IdleErrorHandler};
pub use executor::QueryExecutor;
pub use pool::DbPool;
pub use transaction::{TransactionOutcome, TransactionRunner};
pub use waiter::ConnectionWaiter;
