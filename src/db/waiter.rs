//! Blocking until the database is reachable.

use crate::db::executor::QueryExecutor;
use crate::error::{DbError, DbResult};
use crate::retry::{RetryError, RetryPolicy};
use std::time::{Duration, Instant};
use tracing::{error, info};

const PROBE_SQL: &str = "SELECT 1";

/// Probes the database with `SELECT 1` until it answers or attempts run out.
///
/// Success means one connection worked once; it says nothing about later calls.
#[derive(Debug, Clone)]
pub struct ConnectionWaiter {
    executor: QueryExecutor,
}

impl ConnectionWaiter {
    pub fn new(executor: QueryExecutor) -> Self {
        Self { executor }
    }

    /// Try up to `max_attempts` times, sleeping `backoff` between attempts.
    ///
    /// Returns the last probe error once every attempt has failed. With
    /// `max_attempts == 0` no probe is issued and `InvalidInput` is returned.
    pub async fn wait_for_connection(&self, max_attempts: u32, backoff: Duration) -> DbResult<()> {
        self.wait_for_connection_with(&RetryPolicy::fixed(max_attempts, backoff))
            .await
    }

    /// Like [`wait_for_connection`](Self::wait_for_connection) with any retry policy.
    ///
    /// A closed pool is never retried.
    pub async fn wait_for_connection_with(&self, policy: &RetryPolicy) -> DbResult<()> {
        let start = Instant::now();
        info!(
            max_attempts = policy.max_attempts(),
            backoff = ?policy.backoff(),
            "Waiting for database connection"
        );

        let outcome = policy
            .run_if(
                |attempt| async move {
                    self.executor.query(PROBE_SQL).await.map(|_| attempt)
                },
                DbError::is_retryable,
            )
            .await;

        match outcome {
            Ok(attempt) => {
                info!(
                    attempt = attempt,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "Database connection established"
                );
                Ok(())
            }
            Err(RetryError::NoAttempts) => Err(DbError::invalid_input(
                "max_attempts must be at least 1; no connection attempted",
            )),
            Err(RetryError::Exhausted { attempts, last }) => {
                error!(
                    attempts = attempts,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    error = %last,
                    "Giving up on database connection"
                );
                Err(last)
            }
            Err(RetryError::NotRetryable { attempt, error }) => {
                error!(attempt = attempt, error = %error, "Database connection cannot be retried");
                Err(error)
            }
        }
    }
}
