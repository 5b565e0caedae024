//! sqlstore
//!
//! A driver-agnostic data access layer over sqlx. An [`EntityDescriptor`] maps a record
//! type onto a table; the store synthesizes SELECT/INSERT/UPDATE/DELETE statements for the
//! configured dialect, executes them on a PostgreSQL or SQLite pool, and materializes
//! results as typed records, JSON or CSV. Writes can run inside a scoped transaction
//! ([`run_in_transaction`]) or be flushed in batches.
//!
//! ```ignore
//! let store = DataStore::connect(&StoreConfig::from_env()?).await?;
//! let spots = EntityDescriptor::for_record::<FishingSpot>("fishing_spots")?;
//!
//! store.insert(&spots).records(&new_spots).execute().await?;
//! let json = store.select().descriptor(&spots).suffix("order by id").fetch_json().await?;
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod fluent;
pub mod format;
pub mod models;

pub use config::{Backend, PoolOptions, StoreConfig};
pub use db::{
    ColumnType, DataStore, Dialect, FromStoreRow, MemoryRows, Records, Rows, Tx, raise,
    run_in_transaction,
};
pub use error::{DbError, DbResult, ErrorKind};
pub use fluent::{InsertBuilder, SelectBuilder};
pub use models::{
    CsvOptions, EntityDescriptor, FieldDescriptor, FieldValue, Identity, JsonOptions,
    QueryRequest, Record, SqlType, SqlValue,
};
