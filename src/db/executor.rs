//! Autocommit query execution.
//!
//! Each call checks a connection out of the pool, runs one statement on it and
//! hands it back. Consecutive calls may land on different connections, so the
//! executor must never be used to run a multi-statement transaction; use
//! [`TransactionRunner`](crate::db::TransactionRunner) for that.

use crate::db::pool::DbPool;
use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, QueryResult, render_params};
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info};

/// Statement shape, which decides how results are collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementKind {
    Read,
    Write,
}

/// Query executor that runs statements on pooled connections.
#[derive(Debug, Clone)]
pub struct QueryExecutor {
    pool: DbPool,
    query_timeout: Duration,
}

impl QueryExecutor {
    pub fn new(pool: DbPool, query_timeout: Duration) -> Self {
        Self {
            pool,
            query_timeout,
        }
    }

    pub fn query_timeout(&self) -> Duration {
        self.query_timeout
    }

    /// Run a row-returning statement and log the outcome.
    ///
    /// Failures are logged with the statement and its parameters and returned
    /// unchanged.
    pub async fn execute_query(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryResult> {
        self.run(sql, params, StatementKind::Read).await
    }

    /// Shorthand for [`execute_query`](Self::execute_query) without parameters.
    pub async fn query(&self, sql: &str) -> DbResult<QueryResult> {
        self.execute_query(sql, &[]).await
    }

    /// Run a write statement; the result's row count is the number of rows affected.
    pub async fn execute(&self, sql: &str, params: &[QueryParam]) -> DbResult<QueryResult> {
        self.run(sql, params, StatementKind::Write).await
    }

    async fn run(
        &self,
        sql: &str,
        params: &[QueryParam],
        kind: StatementKind,
    ) -> DbResult<QueryResult> {
        let outcome = match timeout(self.query_timeout, self.run_on_connection(sql, params, kind))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(DbError::timeout("query execution", self.query_timeout)),
        };

        match outcome {
            Ok(result) => {
                info!(
                    sql = %sql,
                    params = %render_params(params),
                    row_count = result.row_count(),
                    execution_time_ms = result.execution_time_ms(),
                    "Executed query"
                );
                Ok(result)
            }
            Err(e) => {
                error!(
                    sql = %sql,
                    params = %render_params(params),
                    error = %e,
                    sql_state = ?e.sql_state(),
                    "Query failed"
                );
                Err(e)
            }
        }
    }

    async fn run_on_connection(
        &self,
        sql: &str,
        params: &[QueryParam],
        kind: StatementKind,
    ) -> DbResult<QueryResult> {
        let mut conn = self.pool.acquire().await?;
        let result = match kind {
            StatementKind::Read => conn.query(sql, params).await,
            StatementKind::Write => conn.execute(sql, params).await,
        };
        conn.release();
        result
    }
}
