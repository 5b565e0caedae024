//! Row cursors.
//!
//! [`Rows`] is the driver-neutral cursor contract consumed by the result materializer.
//! [`RowCursor`] wraps a live sqlx row stream, [`Cursor`] is the closed set of backend
//! cursors and [`MemoryRows`] serves pre-fetched rows.

use crate::db::types::{ColumnType, categorize_type};
use crate::error::{DbError, DbResult};
use crate::models::SqlValue;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, TypeInfo};
use std::collections::VecDeque;
use std::future::Future;

/// Forward-only, single-consumer cursor over a result set.
///
/// Call [`Rows::next`] before each [`Rows::scan`]. A cursor must be closed on every exit
/// path; closing releases the underlying connection.
pub trait Rows: Send {
    /// Column names in result order.
    fn columns(&self) -> DbResult<Vec<String>>;

    /// Column type tags in result order.
    fn column_types(&self) -> DbResult<Vec<ColumnType>>;

    /// Advance to the next row. Returns `false` when the result set is exhausted.
    fn next(&mut self) -> impl Future<Output = DbResult<bool>> + Send;

    /// Values of the current row.
    fn scan(&self) -> DbResult<Vec<SqlValue>>;

    fn close(&mut self) -> DbResult<()>;
}

/// Decodes one native row into values, given the column types.
pub type RowDecoder<R> = fn(&R, &[ColumnType]) -> DbResult<Vec<SqlValue>>;

/// Cursor over a live sqlx row stream.
pub struct RowCursor<'c, R> {
    columns: Vec<String>,
    types: Vec<ColumnType>,
    stream: Option<BoxStream<'c, Result<R, sqlx::Error>>>,
    current: Option<R>,
    decode: RowDecoder<R>,
}

impl<'c, R> RowCursor<'c, R> {
    /// Wrap a row stream. `columns` is the prepared statement's column metadata, so the
    /// cursor knows its columns even when the stream yields no rows.
    pub fn new<C: Column>(
        columns: &[C],
        stream: BoxStream<'c, Result<R, sqlx::Error>>,
        decode: RowDecoder<R>,
    ) -> Self {
        Self {
            columns: columns.iter().map(|c| c.name().to_string()).collect(),
            types: columns
                .iter()
                .map(|c| categorize_type(c.type_info().name()))
                .collect(),
            stream: Some(stream),
            current: None,
            decode,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.stream.is_none()
    }
}

impl<R: Send> Rows for RowCursor<'_, R> {
    fn columns(&self) -> DbResult<Vec<String>> {
        Ok(self.columns.clone())
    }

    fn column_types(&self) -> DbResult<Vec<ColumnType>> {
        Ok(self.types.clone())
    }

    async fn next(&mut self) -> DbResult<bool> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(false);
        };
        match stream.next().await {
            Some(Ok(row)) => {
                self.current = Some(row);
                Ok(true)
            }
            Some(Err(e)) => {
                self.current = None;
                Err(e.into())
            }
            None => {
                self.current = None;
                self.stream = None;
                Ok(false)
            }
        }
    }

    fn scan(&self) -> DbResult<Vec<SqlValue>> {
        match &self.current {
            Some(row) => (self.decode)(row, &self.types),
            None => Err(DbError::column("scan called without a current row")),
        }
    }

    fn close(&mut self) -> DbResult<()> {
        self.current = None;
        self.stream = None;
        Ok(())
    }
}

/// Backend cursor.
pub enum Cursor<'c> {
    Postgres(RowCursor<'c, PgRow>),
    Sqlite(RowCursor<'c, SqliteRow>),
}

impl Rows for Cursor<'_> {
    fn columns(&self) -> DbResult<Vec<String>> {
        match self {
            Cursor::Postgres(c) => c.columns(),
            Cursor::Sqlite(c) => c.columns(),
        }
    }

    fn column_types(&self) -> DbResult<Vec<ColumnType>> {
        match self {
            Cursor::Postgres(c) => c.column_types(),
            Cursor::Sqlite(c) => c.column_types(),
        }
    }

    async fn next(&mut self) -> DbResult<bool> {
        match self {
            Cursor::Postgres(c) => c.next().await,
            Cursor::Sqlite(c) => c.next().await,
        }
    }

    fn scan(&self) -> DbResult<Vec<SqlValue>> {
        match self {
            Cursor::Postgres(c) => c.scan(),
            Cursor::Sqlite(c) => c.scan(),
        }
    }

    fn close(&mut self) -> DbResult<()> {
        match self {
            Cursor::Postgres(c) => c.close(),
            Cursor::Sqlite(c) => c.close(),
        }
    }
}

impl<'c> From<RowCursor<'c, PgRow>> for Cursor<'c> {
    fn from(cursor: RowCursor<'c, PgRow>) -> Self {
        Cursor::Postgres(cursor)
    }
}

impl<'c> From<RowCursor<'c, SqliteRow>> for Cursor<'c> {
    fn from(cursor: RowCursor<'c, SqliteRow>) -> Self {
        Cursor::Sqlite(cursor)
    }
}

/// In-memory cursor over pre-fetched rows.
#[derive(Debug, Clone, Default)]
pub struct MemoryRows {
    columns: Vec<String>,
    types: Vec<ColumnType>,
    pending: VecDeque<Vec<SqlValue>>,
    current: Option<Vec<SqlValue>>,
    closed: bool,
}

impl MemoryRows {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = (S, ColumnType)>) -> Self {
        let (columns, types) = columns
            .into_iter()
            .map(|(name, ty)| (name.into(), ty))
            .unzip();
        Self {
            columns,
            types,
            ..Self::default()
        }
    }

    /// Append a row; its length must match the column count.
    pub fn with_row(mut self, row: Vec<SqlValue>) -> Self {
        self.push_row(row);
        self
    }

    pub fn push_row(&mut self, row: Vec<SqlValue>) {
        self.pending.push_back(row);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Read every remaining row of `rows` into memory, then close it.
    pub async fn drain_from<R: Rows>(rows: &mut R) -> DbResult<Self> {
        let result = async {
            let mut drained = Self {
                columns: rows.columns()?,
                types: rows.column_types()?,
                ..Self::default()
            };
            while rows.next().await? {
                drained.push_row(rows.scan()?);
            }
            Ok::<_, DbError>(drained)
        }
        .await;
        let closed = rows.close();
        let drained = result?;
        closed?;
        Ok(drained)
    }
}

impl Rows for MemoryRows {
    fn columns(&self) -> DbResult<Vec<String>> {
        Ok(self.columns.clone())
    }

    fn column_types(&self) -> DbResult<Vec<ColumnType>> {
        Ok(self.types.clone())
    }

    async fn next(&mut self) -> DbResult<bool> {
        if self.closed {
            return Ok(false);
        }
        self.current = self.pending.pop_front();
        Ok(self.current.is_some())
    }

    fn scan(&self) -> DbResult<Vec<SqlValue>> {
        let row = self
            .current
            .as_ref()
            .ok_or_else(|| DbError::column("scan called without a current row"))?;
        if row.len() != self.columns.len() {
            return Err(DbError::column(format!(
                "row has {} values for {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        Ok(row.clone())
    }

    fn close(&mut self) -> DbResult<()> {
        self.closed = true;
        self.current = None;
        self.pending.clear();
        Ok(())
    }
}
