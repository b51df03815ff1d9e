//! The resilience client.
//!
//! [`DatabaseClient`] owns one lazy pool and composes the waiter, the
//! autocommit executor and the transaction runner on top of it. Clones share
//! the pool.

use crate::config::{DEFAULT_QUERY_TIMEOUT_SECS, DatabaseConfig};
use crate::db::{
    ConnectionWaiter, DbConnection, DbPool, IdleErrorHandler, QueryExecutor, TransactionRunner,
};
use crate::error::{DbError, DbResult};
use crate::models::{DatabaseType, QueryParam, QueryResult};
use crate::retry::RetryPolicy;
use futures_util::future::BoxFuture;
use std::fmt::Display;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct DatabaseClient {
    pool: DbPool,
    executor: QueryExecutor,
    transactions: TransactionRunner,
    waiter: ConnectionWaiter,
}

impl DatabaseClient {
    /// Build a client; idle-connection errors are only logged.
    ///
    /// No connection is opened here, so an unreachable database is not an
    /// error yet. Must be called from within a tokio runtime.
    pub fn new(config: &DatabaseConfig) -> DbResult<Self> {
        Self::with_idle_error_handler(config, IdleErrorHandler::log_only())
    }

    /// Build a client that reports idle-connection errors to `idle_errors`.
    pub fn with_idle_error_handler(
        config: &DatabaseConfig,
        idle_errors: IdleErrorHandler,
    ) -> DbResult<Self> {
        Ok(Self::from_pool(
            DbPool::connect_lazy(config, idle_errors)?,
            Duration::from_secs(DEFAULT_QUERY_TIMEOUT_SECS),
        ))
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: DbPool, query_timeout: Duration) -> Self {
        let executor = QueryExecutor::new(pool.clone(), query_timeout);
        Self {
            transactions: TransactionRunner::new(pool.clone()),
            waiter: ConnectionWaiter::new(executor.clone()),
            executor,
            pool,
        }
    }

    /// Use `query_timeout` for autocommit statements.
    pub fn with_query_timeout(self, query_timeout: Duration) -> Self {
        Self::from_pool(self.pool, query_timeout)
    }

    /// Probe with `SELECT 1` up to `max_attempts` times, `backoff` apart.
    pub async fn wait_for_connection(&self, max_attempts: u32, backoff: Duration) -> DbResult<()> {
        self.waiter.wait_for_connection(max_attempts, backoff).await
    }

    pub async fn wait_for_connection_with(&self, policy: &RetryPolicy) -> DbResult<()> {
        self.waiter.wait_for_connection_with(policy).await
    }

    /// Run one statement on whichever pooled connection is free.
    ///
    /// Not for multi-statement transactions: consecutive calls may use
    /// different connections. See [`run_transaction`](Self::run_transaction).
    pub async fn execute_query(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryResult> {
        self.executor.execute_query(sql, params).await
    }

    pub async fn query(&self, sql: &str) -> DbResult<QueryResult> {
        self.executor.query(sql).await
    }

    /// Run a write statement; the row count is the number of rows affected.
    pub async fn execute(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryResult> {
        self.executor.execute(sql, params).await
    }

    /// Run `unit` in a transaction on one dedicated connection.
    ///
    /// See [`TransactionRunner::run_transaction`].
    pub async fn run_transaction<T, E, F>(&self, unit: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut DbConnection) -> BoxFuture<'c, Result<T, E>>,
        E: From<DbError> + Display,
    {
        self.transactions.run_transaction(unit).await
    }

    /// Drain and close the pool.
    ///
    /// Waits for checked-out connections to be returned. Safe to call more
    /// than once; afterwards every operation fails with `PoolClosed`.
    pub async fn close(&self) {
        if self.pool.is_closed() {
            return;
        }
        info!(db_type = %self.pool.db_type(), "Closing connection pool");
        self.pool.close().await;
        info!("Connection pool closed");
    }

    pub fn is_closed(&self) -> bool {
        self.pool.is_closed()
    }

    pub fn db_type(&self) -> DatabaseType {
        self.pool.db_type()
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }
}
