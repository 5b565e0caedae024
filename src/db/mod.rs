//! Database access layer.
//!
//! - `dialect`: product-specific SQL pieces (binds, sequences, table checks)
//! - `statements`: statement synthesis from entity descriptors
//! - `pool`, `executor`, `params`, `types`: per-backend plumbing over sqlx
//! - `cursor`: the row cursor contract consumed by the materializer
//! - `transaction`: transaction handles and scoped transactions
//! - `batch`: chunked batch submission
//! - `store`: the [`DataStore`] tying it together

pub mod batch;
pub mod cursor;
pub mod dialect;
pub mod executor;
mod macros;
mod params;
pub mod pool;
pub mod statements;
pub mod store;
pub mod transaction;
pub mod types;

pub use batch::{Batch, BatchSink, DEFAULT_BATCH_SIZE};
pub use cursor::{Cursor, MemoryRows, RowCursor, Rows};
pub use dialect::Dialect;
pub use executor::FromStoreRow;
pub use pool::DbPool;
pub use store::{DataStore, Records};
pub use transaction::{Tx, raise, run_in_transaction};
pub use types::ColumnType;
