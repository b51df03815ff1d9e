//! Backend dispatch macro.
//!
//! Pools and leased connections are enums with one variant per backend
//! (`MySql`, `Postgres`, `SQLite`). When every arm does the same thing with a
//! differently typed payload, this macro writes the match.

/// Generate a match over a backend enum.
///
/// # Example
///
/// ```ignore
/// impl_db_dispatch!(DbPool: self, {
///     MySql(p) => p.close().await,
///     Postgres(p) => p.close().await,
///     SQLite(p) => p.close().await,
/// });
/// ```
#[macro_export]
macro_rules! impl_db_dispatch {
    ($kind:ident : $value:expr, { $($variant:ident($p:ident) => $body:expr),+ $(,)? }) => {
        match $value {
            $(
                $kind::$variant($p) => $body,
            )+
        }
    };
}

pub use impl_db_dispatch;
