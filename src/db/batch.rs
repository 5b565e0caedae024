//! Batched statement submission.
//!
//! A [`Batch`] queues `(sql, params)` pairs that a [`BatchSink`] submits in one
//! round trip. [`flush_in_batches`] chunks a run of parameter rows for one statement
//! into batches of a fixed size.

use crate::error::DbResult;
use crate::models::SqlValue;
use std::future::Future;
use tracing::info;

/// Batch size used when a caller passes 0.
pub const DEFAULT_BATCH_SIZE: usize = 100;

/// Ordered queue of statements awaiting submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Batch {
    statements: Vec<(String, Vec<SqlValue>)>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one statement with its parameters.
    pub fn queue(&mut self, sql: impl Into<String>, params: Vec<SqlValue>) {
        self.statements.push((sql.into(), params));
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    pub fn statements(&self) -> &[(String, Vec<SqlValue>)] {
        &self.statements
    }
}

/// A driver that can submit batches natively.
pub trait BatchSink {
    /// Start an empty batch, or fail when batching is unsupported.
    fn open_batch(&self) -> DbResult<Batch>;

    /// Submit every queued statement in one round trip.
    fn submit_batch(&self, batch: Batch) -> impl Future<Output = DbResult<()>> + Send;
}

/// Queue `sql` once per parameter row and submit every `batch_size` rows.
///
/// The remainder is submitted last. The first failed submission stops the run; rows not
/// yet submitted are dropped.
pub async fn flush_in_batches<S, I>(
    sink: &S,
    sql: &str,
    param_rows: I,
    batch_size: usize,
) -> DbResult<()>
where
    S: BatchSink + Sync,
    I: IntoIterator<Item = DbResult<Vec<SqlValue>>>,
{
    let batch_size = if batch_size == 0 {
        DEFAULT_BATCH_SIZE
    } else {
        batch_size
    };

    let mut batch = sink.open_batch()?;
    let mut flushed = 0;
    for params in param_rows {
        batch.queue(sql, params?);
        if batch.len() >= batch_size {
            let full = std::mem::replace(&mut batch, sink.open_batch()?);
            flushed += full.len();
            sink.submit_batch(full).await?;
            info!(rows = flushed, "Flushed batch");
        }
    }

    if !batch.is_empty() {
        flushed += batch.len();
        sink.submit_batch(batch).await?;
        info!(rows = flushed, "Flushed final batch");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        submitted: Mutex<Vec<Batch>>,
        fail_on: Option<usize>,
    }

    impl BatchSink for RecordingSink {
        fn open_batch(&self) -> DbResult<Batch> {
            Ok(Batch::new())
        }

        async fn submit_batch(&self, batch: Batch) -> DbResult<()> {
            let mut submitted = self.submitted.lock().unwrap();
            if self.fail_on == Some(submitted.len()) {
                return Err(DbError::database("batch rejected", None, ""));
            }
            submitted.push(batch);
            Ok(())
        }
    }

    fn rows(n: i64) -> Vec<DbResult<Vec<SqlValue>>> {
        (0..n).map(|i| Ok(vec![SqlValue::Int64(i)])).collect()
    }

    const SQL: &str = "INSERT INTO fishing_spots (location) VALUES ($1)";

    #[tokio::test]
    async fn test_half_sized_batches_submit_twice() {
        let sink = RecordingSink::default();
        flush_in_batches(&sink, SQL, rows(10), 5).await.unwrap();

        let submitted = sink.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 2);
        assert!(submitted.iter().all(|b| b.len() == 5));
        assert_eq!(submitted[1].statements()[0].1, vec![SqlValue::Int64(5)]);
        assert_eq!(submitted[0].statements()[0].0, SQL);
    }

    #[tokio::test]
    async fn test_remainder_is_flushed() {
        let sink = RecordingSink::default();
        flush_in_batches(&sink, SQL, rows(7), 3).await.unwrap();
        let sizes: Vec<usize> = sink.submitted.lock().unwrap().iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_zero_batch_size_uses_default() {
        let sink = RecordingSink::default();
        flush_in_batches(&sink, SQL, rows(250), 0).await.unwrap();
        let sizes: Vec<usize> = sink.submitted.lock().unwrap().iter().map(Batch::len).collect();
        assert_eq!(sizes, vec![100, 100, 50]);
    }

    #[tokio::test]
    async fn test_empty_input_submits_nothing() {
        let sink = RecordingSink::default();
        flush_in_batches(&sink, SQL, rows(0), 10).await.unwrap();
        assert!(sink.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failed_submit_stops_the_run() {
        let sink = RecordingSink {
            fail_on: Some(1),
            ..Default::default()
        };
        let err = flush_in_batches(&sink, SQL, rows(9), 3).await.unwrap_err();
        assert!(matches!(err, DbError::Database { .. }));
        assert_eq!(sink.submitted.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_parameter_error_aborts_before_submit() {
        let sink = RecordingSink::default();
        let mut input = rows(2);
        input.push(Err(DbError::invalid_input("bad record")));
        let err = flush_in_batches(&sink, SQL, input, 10).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidInput { .. }));
        assert!(sink.submitted.lock().unwrap().is_empty());
    }
}
