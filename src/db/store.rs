//! The data store.
//!
//! [`DataStore`] pairs a connection pool with a SQL dialect. It offers the low-level
//! driver contract (`query`, `execute`, `fetch_all`, `fetch_one`, `begin`, batching) and
//! the engine operations built on it: resolving a [`QueryRequest`] into SQL, materializing
//! results as typed records, JSON or CSV, and writing records through synthesized
//! INSERT/UPDATE/DELETE statements.

use crate::config::{Backend, StoreConfig};
use crate::db::batch::{Batch, BatchSink, flush_in_batches};
use crate::db::cursor::{Cursor, MemoryRows};
use crate::db::dialect::Dialect;
use crate::db::executor::{self, FromStoreRow};
use crate::db::macros::with_pool;
use crate::db::pool::DbPool;
use crate::db::statements::{
    delete_params, insert_params, insert_statement, resolve_request, to_delete, update_params,
    update_statement,
};
use crate::db::transaction::{Tx, fail_fast};
use crate::error::{DbError, DbResult};
use crate::fluent::{InsertBuilder, SelectBuilder};
use crate::format;
use crate::models::{CsvOptions, EntityDescriptor, JsonOptions, QueryRequest, Record, SqlValue};
use tracing::{debug, info};

/// Connection pool plus dialect.
#[derive(Debug, Clone)]
pub struct DataStore {
    pool: DbPool,
    dialect: Dialect,
}

/// One record or a slice of records to write.
#[derive(Debug)]
pub enum Records<'a, R> {
    One(&'a R),
    Many(&'a [R]),
}

impl<R> Clone for Records<'_, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<R> Copy for Records<'_, R> {}

impl<'a, R> Records<'a, R> {
    pub fn as_slice(&self) -> &'a [R] {
        match *self {
            Records::One(record) => std::slice::from_ref(record),
            Records::Many(records) => records,
        }
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.as_slice().is_empty()
    }
}

impl<'a, R> From<&'a [R]> for Records<'a, R> {
    fn from(records: &'a [R]) -> Self {
        Records::Many(records)
    }
}

impl<'a, R> From<&'a Vec<R>> for Records<'a, R> {
    fn from(records: &'a Vec<R>) -> Self {
        Records::Many(records.as_slice())
    }
}

impl DataStore {
    /// Connect using a configuration, resolving its dialect.
    pub async fn connect(config: &StoreConfig) -> DbResult<Self> {
        let dialect = config.resolve_dialect()?;
        let pool = DbPool::connect(config).await?;
        Ok(Self { pool, dialect })
    }

    /// Wrap an existing pool.
    pub fn from_pool(pool: impl Into<DbPool>, dialect: Dialect) -> Self {
        Self {
            pool: pool.into(),
            dialect,
        }
    }

    pub fn backend(&self) -> Backend {
        self.pool.backend()
    }

    pub fn dialect(&self) -> &Dialect {
        &self.dialect
    }

    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    // =========================================================================
    // Driver contract
    // =========================================================================

    /// Open a cursor over the results of `sql`.
    pub async fn query<'c>(&'c self, sql: &'c str, params: &'c [SqlValue]) -> DbResult<Cursor<'c>> {
        with_pool!(&self.pool, |pool, exec| Ok(exec::open_on_pool(pool, sql, params)
            .await?
            .into()))
    }

    /// Execute a statement, returning the number of rows affected.
    pub async fn execute(&self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        with_pool!(&self.pool, |pool, exec| exec::execute(pool, sql, params).await)
    }

    /// Fetch every row of `sql` into `T`.
    pub async fn fetch_all<T: FromStoreRow>(
        &self,
        sql: &str,
        params: &[SqlValue],
    ) -> DbResult<Vec<T>> {
        with_pool!(&self.pool, |pool, exec| exec::fetch_all(pool, sql, params).await)
    }

    /// Fetch the first row of `sql` into `T`; no rows is an error.
    pub async fn fetch_one<T: FromStoreRow>(&self, sql: &str, params: &[SqlValue]) -> DbResult<T> {
        with_pool!(&self.pool, |pool, exec| exec::fetch_one(pool, sql, params).await)
    }

    /// Begin a transaction.
    pub async fn begin(&self) -> DbResult<Tx> {
        let tx: Tx = match &self.pool {
            DbPool::Postgres(pool) => pool.begin().await?.into(),
            DbPool::Sqlite(pool) => pool.begin().await?.into(),
        };
        info!(backend = %self.backend(), "Transaction started");
        Ok(tx)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Run a request and read its whole result into memory.
    pub async fn fetch_rows(&self, request: &QueryRequest<'_>) -> DbResult<MemoryRows> {
        let sql = resolve_request(request)?;
        let result = async {
            let mut cursor = self.query(&sql, &request.params).await?;
            MemoryRows::drain_from(&mut cursor).await
        }
        .await;
        fail_fast(result, request.fail_fast)
    }

    /// Run a request and map every row into `T`.
    pub async fn fetch<T: FromStoreRow>(&self, request: &QueryRequest<'_>) -> DbResult<Vec<T>> {
        let sql = resolve_request(request)?;
        fail_fast(self.fetch_all(&sql, &request.params).await, request.fail_fast)
    }

    /// Run a request and map its first row into `T`.
    pub async fn fetch_record<T: FromStoreRow>(&self, request: &QueryRequest<'_>) -> DbResult<T> {
        let sql = resolve_request(request)?;
        fail_fast(self.fetch_one(&sql, &request.params).await, request.fail_fast)
    }

    /// Run a request and render its rows as JSON.
    pub async fn get_json(
        &self,
        request: &QueryRequest<'_>,
        opts: &JsonOptions,
    ) -> DbResult<String> {
        let sql = resolve_request(request)?;
        let result = async {
            let mut cursor = self.query(&sql, &request.params).await?;
            format::rows_to_json(&mut cursor, opts).await
        }
        .await;
        fail_fast(result, request.fail_fast)
    }

    /// Run a request and render its rows as CSV.
    pub async fn get_csv(&self, request: &QueryRequest<'_>, opts: &CsvOptions) -> DbResult<String> {
        let sql = resolve_request(request)?;
        let result = async {
            let mut cursor = self.query(&sql, &request.params).await?;
            format::rows_to_csv(&mut cursor, opts).await
        }
        .await;
        fail_fast(result, request.fail_fast)
    }

    /// Check whether `schema.table` exists.
    pub async fn table_exists(&self, schema: &str, table: &str) -> DbResult<bool> {
        let params = [SqlValue::from(schema), SqlValue::from(table)];
        let (count,): (i64,) = self.fetch_one(self.dialect.table_exists_stmt, &params).await?;
        Ok(count > 0)
    }

    // =========================================================================
    // Writes
    // =========================================================================

    /// Insert records with the descriptor's generated INSERT.
    ///
    /// A single record is inserted directly, inside `tx` when given. For a slice, `batch`
    /// submits the records in batches of `batch_size` (0 means
    /// [`DEFAULT_BATCH_SIZE`](crate::db::batch::DEFAULT_BATCH_SIZE)), each batch in its own
    /// transaction. Without it every record is inserted inside `tx`, or inside a fresh
    /// transaction when `tx` is `None`. A caller transaction cannot be combined with
    /// batching. Returns the number of rows written.
    pub async fn insert_records<R: Record>(
        &self,
        descriptor: &EntityDescriptor,
        records: Records<'_, R>,
        batch: bool,
        batch_size: usize,
        tx: Option<&mut Tx>,
    ) -> DbResult<u64> {
        let records = match records {
            Records::One(record) => return self.insert_record(descriptor, record, tx).await,
            Records::Many(records) => records,
        };
        if batch && tx.is_some() {
            return Err(DbError::invalid_input(
                "a transaction cannot be supplied together with batching",
            ));
        }
        let sql = insert_statement(descriptor, &self.dialect)?;
        debug!(entity = %descriptor.entity(), records = records.len(), batch, "Inserting records");

        if batch {
            let param_rows = records.iter().map(|r| insert_params(descriptor, r));
            flush_in_batches(self, &sql, param_rows, batch_size).await?;
            return Ok(records.len() as u64);
        }

        match tx {
            Some(tx) => insert_each(tx, descriptor, &sql, records).await,
            None => {
                let mut tx = self.begin().await?;
                let result = insert_each(&mut tx, descriptor, &sql, records).await;
                tx.finish(result).await
            }
        }
    }

    /// Insert one record, inside `tx` when given.
    pub async fn insert_record<R: Record>(
        &self,
        descriptor: &EntityDescriptor,
        record: &R,
        tx: Option<&mut Tx>,
    ) -> DbResult<u64> {
        let sql = insert_statement(descriptor, &self.dialect)?;
        let params = insert_params(descriptor, record)?;
        self.execute_in(tx, &sql, &params).await
    }

    /// Update one record by its identity, inside `tx` when given.
    pub async fn update_record<R: Record>(
        &self,
        descriptor: &EntityDescriptor,
        record: &R,
        tx: Option<&mut Tx>,
    ) -> DbResult<u64> {
        let sql = update_statement(descriptor, &self.dialect)?;
        let params = update_params(descriptor, record)?;
        self.execute_in(tx, &sql, &params).await
    }

    /// Delete one record by its identity, inside `tx` when given.
    pub async fn delete_record<R: Record>(
        &self,
        descriptor: &EntityDescriptor,
        record: &R,
        tx: Option<&mut Tx>,
    ) -> DbResult<u64> {
        let sql = to_delete(descriptor, &self.dialect)?;
        let params = delete_params(descriptor, record)?;
        self.execute_in(tx, &sql, &params).await
    }

    async fn execute_in(
        &self,
        tx: Option<&mut Tx>,
        sql: &str,
        params: &[SqlValue],
    ) -> DbResult<u64> {
        match tx {
            Some(tx) => tx.execute(sql, params).await,
            None => self.execute(sql, params).await,
        }
    }

    // =========================================================================
    // Builders
    // =========================================================================

    /// Start a fluent select.
    pub fn select(&self) -> SelectBuilder<'_> {
        SelectBuilder::new(self)
    }

    /// Start a fluent insert into `descriptor`.
    pub fn insert<'s, R: Record>(
        &'s self,
        descriptor: &'s EntityDescriptor,
    ) -> InsertBuilder<'s, R> {
        InsertBuilder::new(self, descriptor)
    }
}

async fn insert_each<R: Record>(
    tx: &mut Tx,
    descriptor: &EntityDescriptor,
    sql: &str,
    records: &[R],
) -> DbResult<u64> {
    let mut written = 0;
    for record in records {
        let params = insert_params(descriptor, record)?;
        written += tx.execute(sql, &params).await?;
    }
    Ok(written)
}

impl BatchSink for DataStore {
    fn open_batch(&self) -> DbResult<Batch> {
        match &self.pool {
            DbPool::Postgres(_) => Ok(Batch::new()),
            DbPool::Sqlite(_) => Err(DbError::unsupported("batching", self.backend().to_string())),
        }
    }

    /// Run every queued statement on one connection inside one transaction.
    async fn submit_batch(&self, batch: Batch) -> DbResult<()> {
        let DbPool::Postgres(pool) = &self.pool else {
            return Err(DbError::unsupported("batching", self.backend().to_string()));
        };
        let mut tx = pool.begin().await?;
        let result = async {
            for (sql, params) in batch.statements() {
                executor::postgres::execute(&mut *tx, sql, params).await?;
            }
            Ok(())
        }
        .await;
        Tx::Postgres(tx).finish(result).await?;
        debug!(statements = batch.len(), "Submitted batch");
        Ok(())
    }
}
