//! Transaction-scoped execution.
//!
//! [`TransactionRunner::run_transaction`] leases one connection, brackets a
//! caller-supplied unit of work with `BEGIN` and `COMMIT`/`ROLLBACK`, and
//! releases the connection on every exit path.

use crate::db::connection::DbConnection;
use crate::db::pool::DbPool;
use crate::error::DbError;
use futures_util::future::BoxFuture;
use std::fmt;
use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// How a transaction ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionOutcome {
    /// No connection could be checked out; nothing ran.
    AcquireFailed,
    /// `BEGIN` failed; the unit never ran.
    BeginFailed,
    Committed,
    RolledBack,
}

impl fmt::Display for TransactionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AcquireFailed => write!(f, "acquire_failed"),
            Self::BeginFailed => write!(f, "begin_failed"),
            Self::Committed => write!(f, "committed"),
            Self::RolledBack => write!(f, "rolled_back"),
        }
    }
}

/// Runs units of work inside a transaction on a dedicated connection.
#[derive(Debug, Clone)]
pub struct TransactionRunner {
    pool: DbPool,
}

impl TransactionRunner {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Run `unit` inside a transaction.
    ///
    /// The unit gets exclusive use of the leased connection; everything it runs
    /// there is one transaction, invisible to other connections until commit.
    /// If the unit succeeds the transaction is committed and its value
    /// returned. If the unit or the commit fails, the transaction is rolled
    /// back and that failure is returned. A failing rollback is logged and
    /// never replaces the original error; the connection it happened on is
    /// closed rather than reused.
    ///
    /// The unit's future must own what it captures besides the connection:
    ///
    /// ```ignore
    /// let name = String::from("widget");
    /// let inserted = runner
    ///     .run_transaction(move |conn| {
    ///         Box::pin(async move {
    ///             let result = conn
    ///                 .execute("INSERT INTO t (name) VALUES (?)", &[name.into()])
    ///                 .await?;
    ///             Ok::<_, DbError>(result.row_count())
    ///         })
    ///     })
    ///     .await?;
    /// ```
    pub async fn run_transaction<T, E, F>(&self, unit: F) -> Result<T, E>
    where
        F: for<'c> FnOnce(&'c mut DbConnection) -> BoxFuture<'c, Result<T, E>>,
        E: From<DbError> + fmt::Display,
    {
        let transaction_id = format!("tx_{}", Uuid::new_v4().simple());
        let start = Instant::now();

        let mut conn = match self.pool.acquire().await {
            Ok(conn) => conn,
            Err(e) => {
                error!(
                    transaction_id = %transaction_id,
                    outcome = %TransactionOutcome::AcquireFailed,
                    error = %e,
                    "Could not acquire a connection for the transaction"
                );
                return Err(E::from(e));
            }
        };

        if let Err(e) = conn.begin().await {
            error!(
                transaction_id = %transaction_id,
                outcome = %TransactionOutcome::BeginFailed,
                error = %e,
                "Failed to begin transaction"
            );
            conn.release();
            return Err(E::from(e));
        }
        debug!(transaction_id = %transaction_id, "Transaction started");

        let result = match unit(&mut conn).await {
            Ok(value) => match conn.commit().await {
                Ok(()) => Ok(value),
                Err(e) => {
                    warn!(transaction_id = %transaction_id, error = %e, "Commit failed");
                    Err(E::from(e))
                }
            },
            Err(e) => Err(e),
        };

        let outcome = match &result {
            Ok(_) => TransactionOutcome::Committed,
            Err(primary) => {
                if let Err(rollback_error) = conn.rollback().await {
                    error!(
                        transaction_id = %transaction_id,
                        error = %primary,
                        rollback_error = %rollback_error,
                        "Rollback failed"
                    );
                }
                TransactionOutcome::RolledBack
            }
        };
        conn.release();

        match &result {
            Ok(_) => info!(
                transaction_id = %transaction_id,
                outcome = %outcome,
                duration_ms = start.elapsed().as_millis() as u64,
                "Transaction finished"
            ),
            Err(e) => info!(
                transaction_id = %transaction_id,
                outcome = %outcome,
                duration_ms = start.elapsed().as_millis() as u64,
                error = %e,
                "Transaction finished"
            ),
        }
        result
    }
}
