//! CSV rendering.

use super::{close_after, format_timestamp, output_key};
use crate::db::cursor::Rows;
use crate::db::types::ColumnType;
use crate::error::{DbError, DbResult};
use crate::models::{CsvOptions, SqlValue};
use tracing::debug;

/// Render every row of `rows` as CSV text.
///
/// Text and time fields are double-quoted with embedded quotes doubled; numbers are bare
/// and NULL is an empty field. Each line ends with `\n`. Boolean and binary columns have
/// no CSV rendering and fail with an unsupported output type error before any row is read.
pub async fn rows_to_csv<R: Rows>(rows: &mut R, opts: &CsvOptions) -> DbResult<String> {
    let result = write_rows(rows, opts).await;
    close_after(rows, result)
}

async fn write_rows<R: Rows>(rows: &mut R, opts: &CsvOptions) -> DbResult<String> {
    let columns = rows.columns()?;
    let types = rows.column_types()?;
    for (column, ty) in columns.iter().zip(&types) {
        if matches!(ty, ColumnType::Bool | ColumnType::Binary) {
            return Err(DbError::unsupported_output_type(column, ty.name()));
        }
    }

    let mut out = String::new();
    if opts.header {
        let header: Vec<String> = columns
            .iter()
            .map(|column| quote(&output_key(column, opts.camel_case)))
            .collect();
        out.push_str(&header.join(","));
        out.push('\n');
    }

    let mut count = 0;
    while rows.next().await? {
        let values = rows.scan()?;
        let fields = columns
            .iter()
            .zip(&values)
            .map(|(column, value)| encode_field(column, value, &opts.date_format))
            .collect::<DbResult<Vec<_>>>()?;
        out.push_str(&fields.join(","));
        out.push('\n');
        count += 1;
    }
    debug!(rows = count, "Rendered CSV");
    Ok(out)
}

fn quote(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn encode_field(column: &str, value: &SqlValue, date_format: &str) -> DbResult<String> {
    match value {
        SqlValue::Null(_) => Ok(String::new()),
        SqlValue::Text(s) => Ok(quote(s)),
        SqlValue::Int32(v) => Ok(v.to_string()),
        SqlValue::Int64(v) => Ok(v.to_string()),
        SqlValue::Float64(v) => Ok(format!("{:.6}", v)),
        SqlValue::Timestamp(ts) => Ok(quote(&format_timestamp(ts, date_format)?)),
        SqlValue::Bool(_) | SqlValue::Binary(_) => Err(DbError::unsupported_output_type(
            column,
            value.type_name(),
        )),
    }
}
