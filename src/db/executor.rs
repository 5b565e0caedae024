//! Statement execution.
//!
//! The executor uses backend-specific implementations organized in submodules:
//! - `postgres`: native PostgreSQL driver
//! - `sqlite`: SQLite driver
//!
//! Each submodule provides identical functionality adapted to its backend: `execute`,
//! typed `fetch_all`/`fetch_one`, and opening a [`RowCursor`] on a pool or on a single
//! connection (a transaction). Functions are generic over the sqlx executor so the same
//! code serves pools, connections and transactions.

use crate::db::cursor::RowCursor;
use crate::error::{DbError, DbResult};
use crate::models::SqlValue;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, FromRow, Row, Statement};
use tracing::debug;

/// A typed destination both backends can populate.
pub trait FromStoreRow:
    for<'r> FromRow<'r, PgRow> + for<'r> FromRow<'r, SqliteRow> + Send + Unpin
{
}

impl<T> FromStoreRow for T where
    T: for<'r> FromRow<'r, PgRow> + for<'r> FromRow<'r, SqliteRow> + Send + Unpin
{
}

fn map_rows<R, T>(rows: &[R]) -> DbResult<Vec<T>>
where
    R: Row,
    T: for<'r> FromRow<'r, R>,
{
    rows.iter()
        .map(|row| T::from_row(row).map_err(DbError::from))
        .collect()
}

pub(crate) mod postgres {
    use super::*;
    use crate::db::params::bind_postgres_param;
    use crate::db::types;
    use sqlx::postgres::{PgArguments, PgConnection};
    use sqlx::{PgPool, Postgres};

    type PgQuery<'q> = sqlx::query::Query<'q, Postgres, PgArguments>;

    fn bind_all<'q>(sql: &'q str, params: &'q [SqlValue]) -> PgQuery<'q> {
        params
            .iter()
            .fold(sqlx::query(sql), |query, param| bind_postgres_param(query, param))
    }

    pub async fn execute<'c, E>(executor: E, sql: &str, params: &[SqlValue]) -> DbResult<u64>
    where
        E: Executor<'c, Database = Postgres>,
    {
        debug!(sql = %sql, params = params.len(), "Executing statement");
        let result = bind_all(sql, params).execute(executor).await?;
        Ok(result.rows_affected())
    }

    pub async fn fetch_all<'c, E, T>(
        executor: E,
        sql: &str,
        params: &[SqlValue],
    ) -> DbResult<Vec<T>>
    where
        E: Executor<'c, Database = Postgres>,
        T: for<'r> FromRow<'r, PgRow>,
    {
        debug!(sql = %sql, params = params.len(), "Executing query");
        let rows = bind_all(sql, params).fetch_all(executor).await?;
        debug!(rows = rows.len(), "Fetched rows");
        map_rows(&rows)
    }

    pub async fn fetch_one<'c, E, T>(executor: E, sql: &str, params: &[SqlValue]) -> DbResult<T>
    where
        E: Executor<'c, Database = Postgres>,
        T: for<'r> FromRow<'r, PgRow>,
    {
        debug!(sql = %sql, params = params.len(), "Executing query");
        let row = bind_all(sql, params).fetch_one(executor).await?;
        Ok(T::from_row(&row)?)
    }

    pub async fn open_on_pool<'c>(
        pool: &'c PgPool,
        sql: &'c str,
        params: &'c [SqlValue],
    ) -> DbResult<RowCursor<'c, PgRow>> {
        debug!(sql = %sql, params = params.len(), "Opening cursor");
        let statement = pool.prepare(sql).await?;
        let stream = bind_all(sql, params).fetch(pool);
        Ok(RowCursor::new(
            statement.columns(),
            stream,
            types::postgres::decode_row,
        ))
    }

    pub async fn open_on_conn<'c>(
        conn: &'c mut PgConnection,
        sql: &'c str,
        params: &'c [SqlValue],
    ) -> DbResult<RowCursor<'c, PgRow>> {
        debug!(sql = %sql, params = params.len(), "Opening cursor in transaction");
        let statement = (&mut *conn).prepare(sql).await?;
        let stream = bind_all(sql, params).fetch(conn);
        Ok(RowCursor::new(
            statement.columns(),
            stream,
            types::postgres::decode_row,
        ))
    }
}

pub(crate) mod sqlite {
    use super::*;
    use crate::db::params::bind_sqlite_param;
    use crate::db::types;
    use sqlx::sqlite::{SqliteArguments, SqliteConnection};
    use sqlx::{Sqlite, SqlitePool};

    type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

    fn bind_all<'q>(sql: &'q str, params: &'q [SqlValue]) -> SqliteQuery<'q> {
        params
            .iter()
            .fold(sqlx::query(sql), |query, param| bind_sqlite_param(query, param))
    }

    pub async fn execute<'c, E>(executor: E, sql: &str, params: &[SqlValue]) -> DbResult<u64>
    where
        E: Executor<'c, Database = Sqlite>,
    {
        debug!(sql = %sql, params = params.len(), "Executing statement");
        let result = bind_all(sql, params).execute(executor).await?;
        Ok(result.rows_affected())
    }

    pub async fn fetch_all<'c, E, T>(
        executor: E,
        sql: &str,
        params: &[SqlValue],
    ) -> DbResult<Vec<T>>
    where
        E: Executor<'c, Database = Sqlite>,
        T: for<'r> FromRow<'r, SqliteRow>,
    {
        debug!(sql = %sql, params = params.len(), "Executing query");
        let rows = bind_all(sql, params).fetch_all(executor).await?;
        debug!(rows = rows.len(), "Fetched rows");
        map_rows(&rows)
    }

    pub async fn fetch_one<'c, E, T>(executor: E, sql: &str, params: &[SqlValue]) -> DbResult<T>
    where
        E: Executor<'c, Database = Sqlite>,
        T: for<'r> FromRow<'r, SqliteRow>,
    {
        debug!(sql = %sql, params = params.len(), "Executing query");
        let row = bind_all(sql, params).fetch_one(executor).await?;
        Ok(T::from_row(&row)?)
    }

    pub async fn open_on_pool<'c>(
        pool: &'c SqlitePool,
        sql: &'c str,
        params: &'c [SqlValue],
    ) -> DbResult<RowCursor<'c, SqliteRow>> {
        debug!(sql = %sql, params = params.len(), "Opening cursor");
        let statement = pool.prepare(sql).await?;
        let stream = bind_all(sql, params).fetch(pool);
        Ok(RowCursor::new(
            statement.columns(),
            stream,
            types::sqlite::decode_row,
        ))
    }

    pub async fn open_on_conn<'c>(
        conn: &'c mut SqliteConnection,
        sql: &'c str,
        params: &'c [SqlValue],
    ) -> DbResult<RowCursor<'c, SqliteRow>> {
        debug!(sql = %sql, params = params.len(), "Opening cursor in transaction");
        let statement = (&mut *conn).prepare(sql).await?;
        let stream = bind_all(sql, params).fetch(conn);
        Ok(RowCursor::new(
            statement.columns(),
            stream,
            types::sqlite::decode_row,
        ))
    }
}
