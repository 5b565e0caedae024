//! Backend dispatch macros.
//!
//! Each store and transaction operation has one implementation per backend in
//! [`crate::db::executor`]. These macros match the closed pool or transaction union and
//! bring the matching executor module into scope under a caller-chosen name, so one body
//! is written once and expanded per backend.

/// Dispatch over a [`DbPool`](crate::db::pool::DbPool).
///
/// `$p` binds the backend's pool by reference and `$exec` names its executor module.
///
/// ```ignore
/// with_pool!(&self.pool, |pool, exec| exec::execute(pool, sql, params).await)
/// ```
macro_rules! with_pool {
    ($pool:expr, |$p:ident, $exec:ident| $body:expr) => {
        match $pool {
            $crate::db::pool::DbPool::Postgres($p) => {
                use $crate::db::executor::postgres as $exec;
                $body
            }
            $crate::db::pool::DbPool::Sqlite($p) => {
                use $crate::db::executor::sqlite as $exec;
                $body
            }
        }
    };
}

/// Dispatch over a [`Tx`](crate::db::transaction::Tx).
///
/// `$conn` binds the transaction's connection mutably, as required by the sqlx executor
/// traits, and `$exec` names the backend's executor module.
macro_rules! with_tx {
    ($tx:expr, |$conn:ident, $exec:ident| $body:expr) => {
        match $tx {
            $crate::db::transaction::Tx::Postgres(tx) => {
                use $crate::db::executor::postgres as $exec;
                let $conn = &mut **tx;
                $body
            }
            $crate::db::transaction::Tx::Sqlite(tx) => {
                use $crate::db::executor::sqlite as $exec;
                let $conn = &mut **tx;
                $body
            }
        }
    };
}

pub(crate) use with_pool;
pub(crate) use with_tx;
