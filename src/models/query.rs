//! Query-related data models.
//!
//! This module defines the request that describes one fetch and the orthogonal
//! rendering options for JSON and CSV output.

use crate::models::{EntityDescriptor, SqlValue};
use serde::{Deserialize, Serialize};

/// Describes one fetch.
///
/// The final statement is resolved in this order: explicit `statement_key`, explicit
/// `statement`, then the descriptor's cached default select.
#[derive(Debug, Clone, Default)]
pub struct QueryRequest<'a> {
    pub descriptor: Option<&'a EntityDescriptor>,
    pub statement_key: Option<String>,
    pub statement: Option<String>,
    /// Appended after a single space, e.g. `order by id limit %d`.
    pub suffix: String,
    pub params: Vec<SqlValue>,
    /// Values substituted into `%s`/`%d`/`%v` placeholders of the statement.
    pub appends: Vec<String>,
    /// Raise execution and materialization errors as a panic instead of returning them.
    pub fail_fast: bool,
}

impl<'a> QueryRequest<'a> {
    /// Query the descriptor's default select.
    pub fn for_entity(descriptor: &'a EntityDescriptor) -> Self {
        Self {
            descriptor: Some(descriptor),
            ..Self::default()
        }
    }

    /// Query raw SQL text.
    pub fn sql(sql: impl Into<String>) -> Self {
        Self {
            statement: Some(sql.into()),
            ..Self::default()
        }
    }

    pub fn with_descriptor(mut self, descriptor: &'a EntityDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.statement_key = Some(key.into());
        self
    }

    pub fn with_statement(mut self, sql: impl Into<String>) -> Self {
        self.statement = Some(sql.into());
        self
    }

    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Add a positional bind parameter.
    pub fn with_param(mut self, param: impl Into<SqlValue>) -> Self {
        self.params.push(param.into());
        self
    }

    /// Add a template substitution value.
    pub fn with_append(mut self, value: impl ToString) -> Self {
        self.appends.push(value.to_string());
        self
    }

    pub fn with_fail_fast(mut self, fail_fast: bool) -> Self {
        self.fail_fast = fail_fast;
        self
    }
}

/// JSON rendering controls.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonOptions {
    #[serde(default)]
    pub camel_case: bool,
    /// Always wrap rows in an array, even for zero or one row.
    #[serde(default)]
    pub force_array: bool,
    /// chrono strftime pattern; empty renders RFC 3339.
    #[serde(default)]
    pub date_format: String,
    /// Drop keys whose value is null.
    #[serde(default)]
    pub omit_null: bool,
}

/// CSV rendering controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CsvOptions {
    #[serde(default)]
    pub camel_case: bool,
    #[serde(default)]
    pub date_format: String,
    #[serde(default = "default_header")]
    pub header: bool,
}

fn default_header() -> bool {
    true
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            camel_case: false,
            date_format: String::new(),
            header: default_header(),
        }
    }
}
