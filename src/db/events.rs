//! Background error channel for idle pooled connections.
//!
//! A connection can die while it sits idle in the pool (server restart,
//! network drop, idle kill). Those failures happen outside any caller's
//! request, so they are reported here instead of being returned.

use crate::error::DbError;
use crate::models::DatabaseType;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::error;

/// An idle connection failed its liveness check and was discarded.
#[derive(Debug)]
pub struct IdleConnectionError {
    pub db_type: DatabaseType,
    pub error: DbError,
    /// Time since the physical connection was opened.
    pub age: Duration,
    /// Time the connection spent idle in the pool before the check.
    pub idle_for: Duration,
}

type Callback = Arc<dyn Fn(&IdleConnectionError) + Send + Sync>;

/// Receives idle-connection errors for the lifetime of a pool.
///
/// Every event is logged at `error` level; an optional callback runs after the
/// log line. The callback must not panic and should return quickly, since it
/// runs on the acquiring task.
#[derive(Clone, Default)]
pub struct IdleErrorHandler {
    callback: Option<Callback>,
}

impl IdleErrorHandler {
    /// Log only.
    pub fn log_only() -> Self {
        Self::default()
    }

    /// Log, then hand the event to `callback`.
    pub fn new(callback: impl Fn(&IdleConnectionError) + Send + Sync + 'static) -> Self {
        Self {
            callback: Some(Arc::new(callback)),
        }
    }

    pub fn notify(&self, event: &IdleConnectionError) {
        error!(
            db_type = %event.db_type,
            error = %event.error,
            connection_age_ms = event.age.as_millis() as u64,
            idle_ms = event.idle_for.as_millis() as u64,
            "Idle connection failed liveness check, discarding it"
        );
        if let Some(callback) = &self.callback {
            callback(event);
        }
    }
}

impl fmt::Debug for IdleErrorHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdleErrorHandler")
            .field("has_callback", &self.callback.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn sample_event() -> IdleConnectionError {
        IdleConnectionError {
            db_type: DatabaseType::PostgreSQL,
            error: DbError::connection("server closed the connection", "Reconnect"),
            age: Duration::from_secs(90),
            idle_for: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_log_only_handler_accepts_events() {
        let handler = IdleErrorHandler::log_only();
        handler.notify(&sample_event());
        assert!(format!("{:?}", handler).contains("has_callback: false"));
    }

    #[test]
    fn test_callback_receives_each_event() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        let handler = IdleErrorHandler::new(move |event| {
            assert_eq!(event.db_type, DatabaseType::PostgreSQL);
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let cloned = handler.clone();
        handler.notify(&sample_event());
        cloned.notify(&sample_event());
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }
}
