//! Data models.
//!
//! - `value`: tagged scalar values for parameters and results
//! - `entity`: entity descriptors, field tables and the `Record` trait
//! - `query`: query requests and output options

pub mod entity;
pub mod query;
pub mod value;

pub use entity::{
    EntityDescriptor, FieldDescriptor, FieldKind, FieldValue, INSERT_KEY, Identity, Record,
    SELECT_KEY, UPDATE_KEY,
};
pub use query::{CsvOptions, JsonOptions, QueryRequest};
pub use value::{SqlType, SqlValue};
