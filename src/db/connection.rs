//! Leased connections.
//!
//! A [`DbConnection`] is one physical session checked out of the pool and
//! owned by a single caller. Dropping it returns the session to the pool,
//! unless a transaction is still open on it: such a session is closed instead,
//! so no half-finished transaction ever reaches another caller.

use crate::db::params::bind_params;
use crate::db::types::RowToJson;
use crate::error::DbResult;
use crate::models::{DatabaseType, QueryParam, QueryResult};
use sqlx::pool::PoolConnection;
use sqlx::{Executor, MySql, Postgres, Sqlite};
use std::time::Instant;
use tracing::{debug, warn};

/// Backend-specific pooled connection.
pub(crate) enum PooledConnection {
    MySql(PoolConnection<MySql>),
    Postgres(PoolConnection<Postgres>),
    SQLite(PoolConnection<Sqlite>),
}

/// A connection checked out of the pool.
///
/// Statements run on it execute in order on the same session, so they share
/// whatever transaction is open on it.
pub struct DbConnection {
    inner: PooledConnection,
    in_transaction: bool,
}

impl DbConnection {
    pub(crate) fn new(inner: PooledConnection) -> Self {
        Self {
            inner,
            in_transaction: false,
        }
    }

    pub fn db_type(&self) -> DatabaseType {
        match self.inner {
            PooledConnection::MySql(_) => DatabaseType::MySQL,
            PooledConnection::Postgres(_) => DatabaseType::PostgreSQL,
            PooledConnection::SQLite(_) => DatabaseType::SQLite,
        }
    }

    /// Whether a transaction begun by this layer is still open.
    pub fn in_transaction(&self) -> bool {
        self.in_transaction
    }

    /// Run a row-returning statement on this connection.
    pub async fn query(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<QueryResult> {
        let start = Instant::now();
        debug!(sql = %sql, params = params.len(), "Executing statement");

        let result = match &mut self.inner {
            PooledConnection::MySql(c) => process_rows(mysql::fetch_rows(c, sql, params).await?, start),
            PooledConnection::Postgres(c) => {
                process_rows(postgres::fetch_rows(c, sql, params).await?, start)
            }
            PooledConnection::SQLite(c) => {
                process_rows(sqlite::fetch_rows(c, sql, params).await?, start)
            }
        };
        Ok(result)
    }

    /// Run a write statement (INSERT, UPDATE, DELETE, DDL) on this connection.
    ///
    /// The result carries no rows; its row count is the number of rows affected.
    pub async fn execute(&mut self, sql: &str, params: &[QueryParam]) -> DbResult<QueryResult> {
        let start = Instant::now();
        debug!(sql = %sql, params = params.len(), "Executing write statement");

        let rows_affected = match &mut self.inner {
            PooledConnection::MySql(c) => mysql::execute(c, sql, params).await?,
            PooledConnection::Postgres(c) => postgres::execute(c, sql, params).await?,
            PooledConnection::SQLite(c) => sqlite::execute(c, sql, params).await?,
        };
        Ok(QueryResult::write_result(
            rows_affected,
            start.elapsed().as_millis() as u64,
        ))
    }

    pub(crate) async fn begin(&mut self) -> DbResult<()> {
        // Flag first: if this future is dropped mid-flight the session state is unknown
        self.in_transaction = true;
        match self.control("BEGIN").await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.in_transaction = false;
                Err(e)
            }
        }
    }

    pub(crate) async fn commit(&mut self) -> DbResult<()> {
        self.control("COMMIT").await?;
        self.in_transaction = false;
        Ok(())
    }

    pub(crate) async fn rollback(&mut self) -> DbResult<()> {
        self.control("ROLLBACK").await?;
        self.in_transaction = false;
        Ok(())
    }

    /// Hand the connection back to the pool.
    pub fn release(self) {
        debug!(
            db_type = %self.db_type(),
            in_transaction = self.in_transaction,
            "Releasing connection"
        );
    }

    async fn control(&mut self, statement: &'static str) -> DbResult<()> {
        impl_db_dispatch!(PooledConnection: &mut self.inner, {
            MySql(c) => (&mut **c).execute(statement).await.map(|_| ())?,
            Postgres(c) => (&mut **c).execute(statement).await.map(|_| ())?,
            SQLite(c) => (&mut **c).execute(statement).await.map(|_| ())?,
        });
        Ok(())
    }
}

impl Drop for DbConnection {
    fn drop(&mut self) {
        if !self.in_transaction {
            return;
        }
        warn!(
            db_type = %self.db_type(),
            "Connection dropped inside an open transaction, closing it instead of returning it to the pool"
        );
        impl_db_dispatch!(PooledConnection: &mut self.inner, {
            MySql(c) => c.close_on_drop(),
            Postgres(c) => c.close_on_drop(),
            SQLite(c) => c.close_on_drop(),
        })
    }
}

impl std::fmt::Debug for DbConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbConnection")
            .field("db_type", &self.db_type())
            .field("in_transaction", &self.in_transaction)
            .finish()
    }
}

/// Convert fetched rows into a QueryResult.
fn process_rows<R: RowToJson>(rows: Vec<R>, start: Instant) -> QueryResult {
    let execution_time_ms = start.elapsed().as_millis() as u64;
    let Some(first) = rows.first() else {
        return QueryResult::empty(execution_time_ms);
    };

    let columns = first.get_column_metadata();
    let json_rows = rows.iter().map(RowToJson::to_json_map).collect();
    QueryResult::from_rows(columns, json_rows, execution_time_ms)
}

// Each backend module below has the same shape. Without parameters the SQL is
// sent as-is rather than prepared, so statements that cannot be prepared
// (multi-statement scripts, some DDL) still work.

mod mysql {
    use super::*;
    use sqlx::MySqlConnection;
    use sqlx::mysql::MySqlRow;

    pub async fn fetch_rows(
        conn: &mut MySqlConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> Result<Vec<MySqlRow>, sqlx::Error> {
        if params.is_empty() {
            return conn.fetch_all(sql).await;
        }
        bind_params::<MySql>(sql, params).fetch_all(conn).await
    }

    pub async fn execute(
        conn: &mut MySqlConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> Result<u64, sqlx::Error> {
        if params.is_empty() {
            return Ok(conn.execute(sql).await?.rows_affected());
        }
        Ok(bind_params::<MySql>(sql, params)
            .execute(conn)
            .await?
            .rows_affected())
    }
}

mod postgres {
    use super::*;
    use sqlx::PgConnection;
    use sqlx::postgres::PgRow;

    pub async fn fetch_rows(
        conn: &mut PgConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> Result<Vec<PgRow>, sqlx::Error> {
        if params.is_empty() {
            return conn.fetch_all(sql).await;
        }
        bind_params::<Postgres>(sql, params).fetch_all(conn).await
    }

    pub async fn execute(
        conn: &mut PgConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> Result<u64, sqlx::Error> {
        if params.is_empty() {
            return Ok(conn.execute(sql).await?.rows_affected());
        }
        Ok(bind_params::<Postgres>(sql, params)
            .execute(conn)
            .await?
            .rows_affected())
    }
}

mod sqlite {
    use super::*;
    use sqlx::SqliteConnection;
    use sqlx::sqlite::SqliteRow;

    pub async fn fetch_rows(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> Result<Vec<SqliteRow>, sqlx::Error> {
        if params.is_empty() {
            return conn.fetch_all(sql).await;
        }
        bind_params::<Sqlite>(sql, params).fetch_all(conn).await
    }

    pub async fn execute(
        conn: &mut SqliteConnection,
        sql: &str,
        params: &[QueryParam],
    ) -> Result<u64, sqlx::Error> {
        if params.is_empty() {
            return Ok(conn.execute(sql).await?.rows_affected());
        }
        Ok(bind_params::<Sqlite>(sql, params)
            .execute(conn)
            .await?
            .rows_affected())
    }
}
