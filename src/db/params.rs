//! Turning `QueryParam` slices into bound `sqlx` queries.
//!
//! One generic binder serves every backend. The only per-backend decision is
//! how a JSON value travels, which [`JsonParam`] makes.

use crate::models::QueryParam;
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Database, Encode, MySql, Postgres, Sqlite, Type};

type Bound<'q, DB> = Query<'q, DB, <DB as Database>::Arguments<'q>>;

/// How a backend receives a JSON parameter.
pub(crate) trait JsonParam: Database {
    fn bind_json<'q>(query: Bound<'q, Self>, value: &'q serde_json::Value) -> Bound<'q, Self>;
}

impl JsonParam for MySql {
    fn bind_json<'q>(query: Bound<'q, Self>, value: &'q serde_json::Value) -> Bound<'q, Self> {
        query.bind(Json(value))
    }
}

impl JsonParam for Postgres {
    fn bind_json<'q>(query: Bound<'q, Self>, value: &'q serde_json::Value) -> Bound<'q, Self> {
        query.bind(Json(value))
    }
}

impl JsonParam for Sqlite {
    // No JSON column type; stored as text
    fn bind_json<'q>(query: Bound<'q, Self>, value: &'q serde_json::Value) -> Bound<'q, Self> {
        query.bind(value.to_string())
    }
}

/// Prepare `sql` with `params` bound in order.
pub(crate) fn bind_params<'q, DB>(sql: &'q str, params: &'q [QueryParam]) -> Bound<'q, DB>
where
    DB: JsonParam,
    bool: Encode<'q, DB> + Type<DB>,
    i64: Encode<'q, DB> + Type<DB>,
    f64: Encode<'q, DB> + Type<DB>,
    &'q str: Encode<'q, DB> + Type<DB>,
    &'q [u8]: Encode<'q, DB> + Type<DB>,
    Option<&'q str>: Encode<'q, DB> + Type<DB>,
{
    params
        .iter()
        .fold(sqlx::query::<DB>(sql), |query, param| match param {
            QueryParam::Null => query.bind(None::<&'q str>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Json(v) => DB::bind_json(query, v),
            QueryParam::Bytes(v) => query.bind(v.as_slice()),
        })
}
