//! Transaction coordination.
//!
//! [`Tx`] wraps exactly one native transaction. `commit` and `rollback` consume the
//! handle, so a transaction can only be terminated once. [`run_in_transaction`] scopes a
//! body to a transaction: it commits when the body succeeds and rolls back when the body
//! returns an error or panics.

use crate::config::Backend;
use crate::db::cursor::Cursor;
use crate::db::executor::FromStoreRow;
use crate::db::macros::with_tx;
use crate::db::store::DataStore;
use crate::error::{DbError, DbResult};
use crate::models::SqlValue;
use futures_util::FutureExt;
use sqlx::{Postgres, Sqlite, Transaction};
use std::any::Any as PanicPayload;
use std::panic::AssertUnwindSafe;
use tracing::{error, info, warn};

/// Backend-specific transaction.
pub enum Tx {
    Postgres(Transaction<'static, Postgres>),
    Sqlite(Transaction<'static, Sqlite>),
}

impl std::fmt::Debug for Tx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Tx").field(&self.backend()).finish()
    }
}

impl Tx {
    pub fn backend(&self) -> Backend {
        match self {
            Tx::Postgres(_) => Backend::Postgres,
            Tx::Sqlite(_) => Backend::Sqlite,
        }
    }

    /// Commit the transaction.
    pub async fn commit(self) -> DbResult<()> {
        let backend = self.backend();
        let result = match self {
            Tx::Postgres(tx) => tx.commit().await,
            Tx::Sqlite(tx) => tx.commit().await,
        };
        match result {
            Ok(()) => {
                info!(backend = %backend, "Transaction committed");
                Ok(())
            }
            Err(e) => {
                error!(backend = %backend, error = %e, "Transaction commit failed");
                Err(DbError::transaction(format!("commit failed: {}", e)))
            }
        }
    }

    /// Rollback the transaction.
    pub async fn rollback(self) -> DbResult<()> {
        let backend = self.backend();
        let result = match self {
            Tx::Postgres(tx) => tx.rollback().await,
            Tx::Sqlite(tx) => tx.rollback().await,
        };
        match result {
            Ok(()) => {
                info!(backend = %backend, "Transaction rolled back");
                Ok(())
            }
            Err(e) => {
                error!(backend = %backend, error = %e, "Transaction rollback failed");
                Err(DbError::transaction(format!("rollback failed: {}", e)))
            }
        }
    }

    /// Commit on `Ok`, roll back on `Err`.
    ///
    /// A rollback failure is logged; the original error is returned.
    pub async fn finish<T>(self, result: DbResult<T>) -> DbResult<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = self.rollback().await {
                    warn!(error = %rollback_err, cause = %e, "Rollback failed after error");
                }
                Err(e)
            }
        }
    }

    /// Execute a statement inside the transaction, returning rows affected.
    pub async fn execute(&mut self, sql: &str, params: &[SqlValue]) -> DbResult<u64> {
        with_tx!(self, |conn, exec| exec::execute(conn, sql, params).await)
    }

    /// Open a cursor inside the transaction.
    ///
    /// The cursor borrows the transaction until it is dropped.
    pub async fn query<'c>(
        &'c mut self,
        sql: &'c str,
        params: &'c [SqlValue],
    ) -> DbResult<Cursor<'c>> {
        with_tx!(self, |conn, exec| Ok(exec::open_on_conn(conn, sql, params)
            .await?
            .into()))
    }

    pub async fn fetch_all<T: FromStoreRow>(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> DbResult<Vec<T>> {
        with_tx!(self, |conn, exec| exec::fetch_all(conn, sql, params).await)
    }

    pub async fn fetch_one<T: FromStoreRow>(
        &mut self,
        sql: &str,
        params: &[SqlValue],
    ) -> DbResult<T> {
        with_tx!(self, |conn, exec| exec::fetch_one(conn, sql, params).await)
    }
}

impl From<Transaction<'static, Postgres>> for Tx {
    fn from(tx: Transaction<'static, Postgres>) -> Self {
        Tx::Postgres(tx)
    }
}

impl From<Transaction<'static, Sqlite>> for Tx {
    fn from(tx: Transaction<'static, Sqlite>) -> Self {
        Tx::Sqlite(tx)
    }
}

/// Run `body` inside a new transaction.
///
/// The transaction commits when `body` returns `Ok` and rolls back when it returns `Err`
/// or panics. A panic is converted into the returned error: a [`DbError`] payload (as
/// raised by fail-fast queries) is returned as is, a string payload becomes
/// [`DbError::Aborted`] with that message.
///
/// ```ignore
/// run_in_transaction(&store, async |tx| {
///     let sql = "INSERT INTO fishing_spots (location) VALUES ($1)";
///     tx.execute(sql, &["Rivertown".into()]).await?;
///     Ok(())
/// })
/// .await?;
/// ```
pub async fn run_in_transaction<T, F>(store: &DataStore, body: F) -> DbResult<T>
where
    F: AsyncFnOnce(&mut Tx) -> DbResult<T>,
{
    let mut tx = store.begin().await?;
    let result = match AssertUnwindSafe(body(&mut tx)).catch_unwind().await {
        Ok(result) => result,
        Err(payload) => {
            let err = panic_to_error(payload);
            warn!(error = %err, "Transaction body panicked");
            Err(err)
        }
    };
    tx.finish(result).await
}

/// Raise `err` as a panic carrying the error itself.
///
/// [`run_in_transaction`] recovers the original [`DbError`] from such a panic.
pub fn raise(err: DbError) -> ! {
    std::panic::panic_any(err)
}

/// Pass `result` through, or raise its error when `fail_fast` is set.
pub(crate) fn fail_fast<T>(result: DbResult<T>, fail_fast: bool) -> DbResult<T> {
    match result {
        Err(e) if fail_fast && is_fail_fast_kind(&e) => raise(e),
        other => other,
    }
}

fn is_fail_fast_kind(err: &DbError) -> bool {
    use crate::error::ErrorKind;
    matches!(
        err.kind(),
        ErrorKind::Execution | ErrorKind::Materialization
    )
}

fn panic_to_error(payload: Box<dyn PanicPayload + Send>) -> DbError {
    let payload = match payload.downcast::<DbError>() {
        Ok(err) => return *err,
        Err(payload) => payload,
    };
    let payload = match payload.downcast::<String>() {
        Ok(message) => return DbError::aborted(*message),
        Err(payload) => payload,
    };
    match payload.downcast::<&'static str>() {
        Ok(message) => DbError::aborted(*message),
        Err(_) => DbError::aborted("unknown panic"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_conversion() {
        let err = panic_to_error(Box::new(DbError::MissingDataset));
        assert_eq!(err, DbError::MissingDataset);

        let err = panic_to_error(Box::new("boom"));
        assert_eq!(err.to_string(), "boom");

        let err = panic_to_error(Box::new(String::from("formatted boom")));
        assert_eq!(err, DbError::aborted("formatted boom"));

        let err = panic_to_error(Box::new(42u8));
        assert_eq!(err.to_string(), "unknown panic");
    }

    #[test]
    fn test_fail_fast_passes_through_when_disabled() {
        let result: DbResult<()> = Err(DbError::timeout("query"));
        assert!(fail_fast(result, false).is_err());
    }

    #[test]
    fn test_fail_fast_ignores_resolution_errors() {
        let result: DbResult<()> = Err(DbError::MissingDataset);
        assert!(matches!(fail_fast(result, true), Err(DbError::MissingDataset)));
    }

    #[test]
    fn test_fail_fast_raises_execution_errors() {
        let caught = std::panic::catch_unwind(|| {
            let _ = fail_fast::<()>(Err(DbError::timeout("query")), true);
        })
        .unwrap_err();
        assert_eq!(panic_to_error(caught), DbError::timeout("query"));
    }
}
