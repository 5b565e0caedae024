//! Parameter binding utilities for database queries.
//!
//! These functions bind [`SqlValue`] parameters to backend-specific sqlx query objects.
//! NULLs are bound with the Rust type matching their hint so typed backends see a
//! correctly typed NULL.

use crate::models::{SqlType, SqlValue};
use sqlx::postgres::PgArguments;
use sqlx::sqlite::SqliteArguments;
use sqlx::{Postgres, Sqlite};

/// Bind a parameter to a PostgreSQL query.
pub(crate) fn bind_postgres_param<'q>(
    query: sqlx::query::Query<'q, Postgres, PgArguments>,
    param: &'q SqlValue,
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    match param {
        SqlValue::Null(SqlType::Text) => query.bind(None::<String>),
        SqlValue::Null(SqlType::Int32) => query.bind(None::<i32>),
        SqlValue::Null(SqlType::Int64) => query.bind(None::<i64>),
        SqlValue::Null(SqlType::Float64) => query.bind(None::<f64>),
        SqlValue::Null(SqlType::Bool) => query.bind(None::<bool>),
        SqlValue::Null(SqlType::Timestamp) => query.bind(None::<chrono::DateTime<chrono::Utc>>),
        SqlValue::Null(SqlType::Binary) => query.bind(None::<Vec<u8>>),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Int32(v) => query.bind(*v),
        SqlValue::Int64(v) => query.bind(*v),
        SqlValue::Float64(v) => query.bind(*v),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
        SqlValue::Binary(v) => query.bind(v.as_slice()),
    }
}

/// Bind a parameter to a SQLite query.
pub(crate) fn bind_sqlite_param<'q>(
    query: sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>,
    param: &'q SqlValue,
) -> sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>> {
    match param {
        SqlValue::Null(SqlType::Text) => query.bind(None::<String>),
        SqlValue::Null(SqlType::Int32) => query.bind(None::<i32>),
        SqlValue::Null(SqlType::Int64) => query.bind(None::<i64>),
        SqlValue::Null(SqlType::Float64) => query.bind(None::<f64>),
        SqlValue::Null(SqlType::Bool) => query.bind(None::<bool>),
        SqlValue::Null(SqlType::Timestamp) => query.bind(None::<chrono::DateTime<chrono::Utc>>),
        SqlValue::Null(SqlType::Binary) => query.bind(None::<Vec<u8>>),
        SqlValue::Text(v) => query.bind(v.as_str()),
        SqlValue::Int32(v) => query.bind(*v),
        SqlValue::Int64(v) => query.bind(*v),
        SqlValue::Float64(v) => query.bind(*v),
        SqlValue::Bool(v) => query.bind(*v),
        SqlValue::Timestamp(v) => query.bind(*v),
        SqlValue::Binary(v) => query.bind(v.as_slice()),
    }
}
