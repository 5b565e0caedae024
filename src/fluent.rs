//! Fluent query and insert builders.
//!
//! ```ignore
//! let json = store
//!     .select()
//!     .descriptor(&spots)
//!     .suffix("where id > $1 order by id")
//!     .param(2)
//!     .force_array(true)
//!     .fetch_json()
//!     .await?;
//!
//! store.insert(&spots).records(&new_spots).batch(true).execute().await?;
//! ```

use crate::db::executor::FromStoreRow;
use crate::db::store::{DataStore, Records};
use crate::db::transaction::Tx;
use crate::error::DbResult;
use crate::models::{CsvOptions, EntityDescriptor, JsonOptions, QueryRequest, Record, SqlValue};

/// Builds a [`QueryRequest`] and its output options, then runs it.
///
/// Output keys are camelCased unless [`SelectBuilder::camel_case`] turns it off.
#[derive(Debug)]
pub struct SelectBuilder<'s> {
    store: &'s DataStore,
    request: QueryRequest<'s>,
    json: JsonOptions,
    csv: CsvOptions,
}

impl<'s> SelectBuilder<'s> {
    pub fn new(store: &'s DataStore) -> Self {
        Self {
            store,
            request: QueryRequest::default(),
            json: JsonOptions {
                camel_case: true,
                ..Default::default()
            },
            csv: CsvOptions {
                camel_case: true,
                ..Default::default()
            },
        }
    }

    pub fn descriptor(mut self, descriptor: &'s EntityDescriptor) -> Self {
        self.request.descriptor = Some(descriptor);
        self
    }

    /// Use a named statement of the descriptor.
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.request.statement_key = Some(key.into());
        self
    }

    pub fn sql(mut self, sql: impl Into<String>) -> Self {
        self.request.statement = Some(sql.into());
        self
    }

    pub fn suffix(mut self, suffix: impl Into<String>) -> Self {
        self.request.suffix = suffix.into();
        self
    }

    pub fn param(mut self, param: impl Into<SqlValue>) -> Self {
        self.request.params.push(param.into());
        self
    }

    /// Substitute a value into the next `%s`/`%d`/`%v` placeholder.
    pub fn apply(mut self, value: impl ToString) -> Self {
        self.request.appends.push(value.to_string());
        self
    }

    pub fn camel_case(mut self, camel_case: bool) -> Self {
        self.json.camel_case = camel_case;
        self.csv.camel_case = camel_case;
        self
    }

    pub fn force_array(mut self, force_array: bool) -> Self {
        self.json.force_array = force_array;
        self
    }

    pub fn omit_null(mut self, omit_null: bool) -> Self {
        self.json.omit_null = omit_null;
        self
    }

    pub fn date_format(mut self, date_format: impl Into<String>) -> Self {
        let date_format = date_format.into();
        self.csv.date_format = date_format.clone();
        self.json.date_format = date_format;
        self
    }

    pub fn header(mut self, header: bool) -> Self {
        self.csv.header = header;
        self
    }

    pub fn fail_fast(mut self, fail_fast: bool) -> Self {
        self.request.fail_fast = fail_fast;
        self
    }

    pub fn request(&self) -> &QueryRequest<'s> {
        &self.request
    }

    pub async fn fetch<T: FromStoreRow>(self) -> DbResult<Vec<T>> {
        self.store.fetch(&self.request).await
    }

    pub async fn fetch_one<T: FromStoreRow>(self) -> DbResult<T> {
        self.store.fetch_record(&self.request).await
    }

    pub async fn fetch_json(self) -> DbResult<String> {
        self.store.get_json(&self.request, &self.json).await
    }

    pub async fn fetch_csv(self) -> DbResult<String> {
        self.store.get_csv(&self.request, &self.csv).await
    }
}

/// Collects records and write options for [`DataStore::insert_records`].
pub struct InsertBuilder<'s, R> {
    store: &'s DataStore,
    descriptor: &'s EntityDescriptor,
    records: Records<'s, R>,
    batch: bool,
    batch_size: usize,
    tx: Option<&'s mut Tx>,
}

impl<'s, R: Record> InsertBuilder<'s, R> {
    pub fn new(store: &'s DataStore, descriptor: &'s EntityDescriptor) -> Self {
        Self {
            store,
            descriptor,
            records: Records::Many(&[]),
            batch: false,
            batch_size: 0,
            tx: None,
        }
    }

    pub fn records(mut self, records: impl Into<Records<'s, R>>) -> Self {
        self.records = records.into();
        self
    }

    pub fn record(mut self, record: &'s R) -> Self {
        self.records = Records::One(record);
        self
    }

    pub fn batch(mut self, batch: bool) -> Self {
        self.batch = batch;
        self
    }

    /// Rows per batch; 0 keeps the default.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn tx(mut self, tx: &'s mut Tx) -> Self {
        self.tx = Some(tx);
        self
    }

    /// Insert the records, returning the number of rows written.
    pub async fn execute(self) -> DbResult<u64> {
        self.store
            .insert_records(
                self.descriptor,
                self.records,
                self.batch,
                self.batch_size,
                self.tx,
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::dialect::POSTGRES;
    use crate::models::FieldDescriptor;
    use sqlx::postgres::PgPoolOptions;

    fn lazy_store() -> DataStore {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://localhost/fishing")
            .unwrap();
        DataStore::from_pool(pool, POSTGRES)
    }

    #[tokio::test]
    async fn test_select_builder_collects_request() {
        let store = lazy_store();
        let spots = EntityDescriptor::new(
            "fishing_spots",
            vec![FieldDescriptor::column("location", "location")],
        )
        .unwrap();
        let builder = store
            .select()
            .descriptor(&spots)
            .suffix("limit %d")
            .apply(5)
            .param("Rivertown")
            .fail_fast(true);

        let request = builder.request();
        assert_eq!(request.suffix, "limit %d");
        assert_eq!(request.appends, vec!["5".to_string()]);
        assert_eq!(request.params, vec![SqlValue::from("Rivertown")]);
        assert!(request.fail_fast);
        assert!(builder.json.camel_case);
        assert!(builder.csv.header);
    }

    #[tokio::test]
    async fn test_output_options_apply_to_both_formats() {
        let store = lazy_store();
        let builder = store
            .select()
            .camel_case(false)
            .date_format("%Y")
            .header(false)
            .omit_null(true);
        assert!(!builder.json.camel_case && !builder.csv.camel_case);
        assert_eq!(builder.json.date_format, "%Y");
        assert_eq!(builder.csv.date_format, "%Y");
        assert!(!builder.csv.header);
        assert!(builder.json.omit_null);
    }
}
