//! Result materialization.
//!
//! Renders any [`Rows`] cursor into JSON or CSV text. Both renderers read the column
//! names and types once, scan every row, and close the cursor on every exit path.
//!
//! - `json`: object or array of objects, typed values, optional null omission
//! - `csv`: quoted header, quoted text and time fields, bare numbers

mod csv;
mod json;

pub use csv::rows_to_csv;
pub use json::rows_to_json;

use crate::db::cursor::Rows;
use crate::error::{DbError, DbResult};
use chrono::{DateTime, SecondsFormat, Utc};
use convert_case::{Case, Casing};
use std::fmt::Write as _;

/// Output key for a column name.
pub fn output_key(column: &str, camel_case: bool) -> String {
    if camel_case {
        column.to_case(Case::Camel)
    } else {
        column.to_string()
    }
}

/// Render a timestamp with a chrono strftime pattern, or RFC 3339 when the pattern is empty.
pub fn format_timestamp(ts: &DateTime<Utc>, date_format: &str) -> DbResult<String> {
    if date_format.is_empty() {
        return Ok(ts.to_rfc3339_opts(SecondsFormat::AutoSi, true));
    }
    let mut out = String::new();
    write!(out, "{}", ts.format(date_format))
        .map_err(|_| DbError::output(format!("invalid date format '{}'", date_format)))?;
    Ok(out)
}

/// Close `rows` and return the render result; a render error wins over a close error.
fn close_after<R: Rows, T>(rows: &mut R, result: DbResult<T>) -> DbResult<T> {
    let closed = rows.close();
    let value = result?;
    closed?;
    Ok(value)
}
