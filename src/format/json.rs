//! JSON rendering.

use super::{close_after, format_timestamp, output_key};
use crate::db::cursor::Rows;
use crate::error::{DbError, DbResult};
use crate::models::{JsonOptions, SqlValue};
use base64::{Engine as _, engine::general_purpose::STANDARD};
use tracing::debug;

/// Render every row of `rows` as JSON.
///
/// More than one row, or `force_array`, renders an array of objects. Otherwise a single
/// row renders as a bare object and zero rows as `{}`. NULL columns render as `null`, or
/// are dropped entirely when `omit_null` is set. The cursor is closed before returning.
pub async fn rows_to_json<R: Rows>(rows: &mut R, opts: &JsonOptions) -> DbResult<String> {
    let result = write_rows(rows, opts).await;
    close_after(rows, result)
}

async fn write_rows<R: Rows>(rows: &mut R, opts: &JsonOptions) -> DbResult<String> {
    let keys = rows
        .columns()?
        .iter()
        .map(|column| encode_str(&output_key(column, opts.camel_case)))
        .collect::<DbResult<Vec<_>>>()?;

    let mut out = String::new();
    let mut count = 0;
    while rows.next().await? {
        let values = rows.scan()?;
        if count > 0 {
            out.push(',');
        }
        out.push('{');
        let mut written = 0;
        for (key, value) in keys.iter().zip(&values) {
            let encoded = encode_value(value, &opts.date_format)?;
            if opts.omit_null && encoded == "null" {
                continue;
            }
            if written > 0 {
                out.push(',');
            }
            out.push_str(key);
            out.push(':');
            out.push_str(&encoded);
            written += 1;
        }
        out.push('}');
        count += 1;
    }
    debug!(rows = count, "Rendered JSON");

    Ok(if count > 1 || opts.force_array {
        format!("[{}]", out)
    } else if count == 0 {
        "{}".to_string()
    } else {
        out
    })
}

fn encode_str(s: &str) -> DbResult<String> {
    serde_json::to_string(s).map_err(|e| DbError::output(e.to_string()))
}

fn encode_value(value: &SqlValue, date_format: &str) -> DbResult<String> {
    match value {
        SqlValue::Null(_) => Ok("null".to_string()),
        SqlValue::Text(s) => encode_str(s),
        SqlValue::Int32(v) => Ok(v.to_string()),
        SqlValue::Int64(v) => Ok(v.to_string()),
        SqlValue::Float64(v) => Ok(serde_json::Number::from_f64(*v)
            .map(|n| n.to_string())
            .unwrap_or_else(|| "null".to_string())),
        SqlValue::Bool(v) => Ok(v.to_string()),
        SqlValue::Timestamp(ts) => encode_str(&format_timestamp(ts, date_format)?),
        SqlValue::Binary(bytes) => encode_str(&STANDARD.encode(bytes)),
    }
}
