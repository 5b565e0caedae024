//! Database-agnostic type mappings.
//!
//! Type conversion uses a two-phase approach:
//! 1. `categorize_type` classifies a native column type name into a [`ColumnType`] tag
//! 2. Backend-specific decoders extract each column of a row into a [`SqlValue`]
//!
//! Unmapped native types fall back to text.

use crate::error::{DbError, DbResult};
use crate::models::{SqlType, SqlValue};
use sqlx::postgres::PgRow;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, TypeInfo, ValueRef};

// =============================================================================
// Type Classification
// =============================================================================

/// Logical column type reported by a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColumnType {
    Text,
    Int16,
    Int32,
    Int64,
    Float32,
    Float64,
    Numeric,
    Bool,
    Timestamp,
    TimestampTz,
    Date,
    Binary,
    Uuid,
}

impl ColumnType {
    /// Type hint for a NULL read from a column of this type.
    pub fn null_hint(&self) -> SqlType {
        match self {
            Self::Int16 | Self::Int32 => SqlType::Int32,
            Self::Int64 => SqlType::Int64,
            Self::Float32 | Self::Float64 | Self::Numeric => SqlType::Float64,
            Self::Bool => SqlType::Bool,
            Self::Timestamp | Self::TimestampTz | Self::Date => SqlType::Timestamp,
            Self::Binary => SqlType::Binary,
            Self::Text | Self::Uuid => SqlType::Text,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Int16 => "int16",
            Self::Int32 => "int32",
            Self::Int64 => "int64",
            Self::Float32 => "float32",
            Self::Float64 => "float64",
            Self::Numeric => "numeric",
            Self::Bool => "bool",
            Self::Timestamp => "timestamp",
            Self::TimestampTz => "timestamptz",
            Self::Date => "date",
            Self::Binary => "binary",
            Self::Uuid => "uuid",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl From<SqlType> for ColumnType {
    fn from(ty: SqlType) -> Self {
        match ty {
            SqlType::Text => Self::Text,
            SqlType::Int32 => Self::Int32,
            SqlType::Int64 => Self::Int64,
            SqlType::Float64 => Self::Float64,
            SqlType::Bool => Self::Bool,
            SqlType::Timestamp => Self::TimestampTz,
            SqlType::Binary => Self::Binary,
        }
    }
}

/// Classify a native type name (PostgreSQL or SQLite) into a [`ColumnType`].
pub fn categorize_type(type_name: &str) -> ColumnType {
    match type_name.to_uppercase().as_str() {
        "INT2" | "SMALLINT" | "SMALLSERIAL" => ColumnType::Int16,
        "INT4" | "INT" | "INTEGER" | "SERIAL" => ColumnType::Int32,
        "INT8" | "BIGINT" | "BIGSERIAL" => ColumnType::Int64,
        "FLOAT4" | "REAL" => ColumnType::Float32,
        "FLOAT8" | "DOUBLE" | "DOUBLE PRECISION" | "FLOAT" => ColumnType::Float64,
        "NUMERIC" | "DECIMAL" => ColumnType::Numeric,
        "BOOL" | "BOOLEAN" => ColumnType::Bool,
        "TIMESTAMP" | "DATETIME" => ColumnType::Timestamp,
        "TIMESTAMPTZ" => ColumnType::TimestampTz,
        "DATE" => ColumnType::Date,
        "BYTEA" | "BLOB" => ColumnType::Binary,
        "UUID" => ColumnType::Uuid,
        _ => ColumnType::Text,
    }
}

// =============================================================================
// Database-Specific Decoders
// =============================================================================

pub(crate) mod postgres {
    use super::*;
    use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Utc};
    use rust_decimal::Decimal;
    use rust_decimal::prelude::ToPrimitive;
    use sqlx::postgres::PgValueRef;
    use sqlx::postgres::types::{PgInterval, PgTimeTz};
    use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

    /// Decode every column of a row according to its declared type.
    pub fn decode_row(row: &PgRow, types: &[ColumnType]) -> DbResult<Vec<SqlValue>> {
        types
            .iter()
            .enumerate()
            .map(|(idx, ty)| decode_column(row, idx, *ty))
            .collect()
    }

    fn decode_column(row: &PgRow, idx: usize, ty: ColumnType) -> DbResult<SqlValue> {
        let value: SqlValue = match ty {
            ColumnType::Int16 => row.try_get::<Option<i16>, _>(idx)?.into(),
            ColumnType::Int32 => row.try_get::<Option<i32>, _>(idx)?.into(),
            ColumnType::Int64 => row.try_get::<Option<i64>, _>(idx)?.into(),
            ColumnType::Float32 => row.try_get::<Option<f32>, _>(idx)?.into(),
            ColumnType::Float64 => row.try_get::<Option<f64>, _>(idx)?.into(),
            ColumnType::Numeric => decode_numeric(row, idx)?,
            ColumnType::Bool => row.try_get::<Option<bool>, _>(idx)?.into(),
            ColumnType::Timestamp => row
                .try_get::<Option<NaiveDateTime>, _>(idx)?
                .map(|ts| ts.and_utc())
                .into(),
            ColumnType::TimestampTz => row.try_get::<Option<DateTime<Utc>>, _>(idx)?.into(),
            ColumnType::Date => row
                .try_get::<Option<NaiveDate>, _>(idx)?
                .map(|d| d.and_time(NaiveTime::MIN).and_utc())
                .into(),
            ColumnType::Binary => row.try_get::<Option<Vec<u8>>, _>(idx)?.into(),
            ColumnType::Uuid => row
                .try_get::<Option<uuid::Uuid>, _>(idx)?
                .map(|u| u.to_string())
                .into(),
            ColumnType::Text => decode_text(row, idx)?,
        };
        Ok(value)
    }

    fn decode_numeric(row: &PgRow, idx: usize) -> DbResult<SqlValue> {
        match row.try_get::<Option<Decimal>, _>(idx)? {
            Some(d) => d.to_f64().map(SqlValue::Float64).ok_or_else(|| {
                DbError::column(format!("NUMERIC value {} does not fit a float", d))
            }),
            None => Ok(SqlValue::Null(SqlType::Float64)),
        }
    }

    /// Text and every type without its own tag. Types that do not decode as a string
    /// are rendered the way PostgreSQL prints them, falling back to the raw value.
    fn decode_text(row: &PgRow, idx: usize) -> DbResult<SqlValue> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(SqlValue::NULL);
        }
        let type_name = raw.type_info().name().to_string();
        let text = match type_name.as_str() {
            "JSON" | "JSONB" => row.try_get::<serde_json::Value, _>(idx)?.to_string(),
            "TIME" => row.try_get::<NaiveTime, _>(idx)?.to_string(),
            "TIMETZ" => {
                let tz = row.try_get::<PgTimeTz<NaiveTime, FixedOffset>, _>(idx)?;
                format!("{}{}", tz.time, tz.offset)
            }
            "INTERVAL" => format_interval(&row.try_get::<PgInterval, _>(idx)?),
            "\"CHAR\"" => char::from(row.try_get::<i8, _>(idx)? as u8).to_string(),
            "INET" | "CIDR" => format_inet(raw_bytes(&raw)?)?,
            name if name.ends_with("[]") => decode_array(row, idx, name)?,
            _ => match row.try_get::<String, _>(idx) {
                Ok(text) => text,
                Err(sqlx::Error::ColumnDecode { .. }) => raw_text(raw_bytes(&raw)?),
                Err(e) => return Err(e.into()),
            },
        };
        Ok(SqlValue::Text(text))
    }

    fn decode_array(row: &PgRow, idx: usize, type_name: &str) -> DbResult<String> {
        let element = type_name.trim_end_matches("[]");
        let text = match categorize_type(element) {
            ColumnType::Int16 => format_array(row.try_get::<Vec<Option<i16>>, _>(idx)?),
            ColumnType::Int32 => format_array(row.try_get::<Vec<Option<i32>>, _>(idx)?),
            ColumnType::Int64 => format_array(row.try_get::<Vec<Option<i64>>, _>(idx)?),
            ColumnType::Float32 => format_array(row.try_get::<Vec<Option<f32>>, _>(idx)?),
            ColumnType::Float64 => format_array(row.try_get::<Vec<Option<f64>>, _>(idx)?),
            ColumnType::Numeric => format_array(row.try_get::<Vec<Option<Decimal>>, _>(idx)?),
            ColumnType::Uuid => format_array(row.try_get::<Vec<Option<uuid::Uuid>>, _>(idx)?),
            ColumnType::Bool => format_array(
                row.try_get::<Vec<Option<bool>>, _>(idx)?
                    .into_iter()
                    .map(|b| b.map(|b| if b { 't' } else { 'f' }))
                    .collect(),
            ),
            _ => match row.try_get::<Vec<Option<String>>, _>(idx) {
                Ok(items) => {
                    format_array(items.into_iter().map(|v| v.map(quote_element)).collect())
                }
                Err(sqlx::Error::ColumnDecode { .. }) => {
                    raw_text(raw_bytes(&row.try_get_raw(idx)?)?)
                }
                Err(e) => return Err(e.into()),
            },
        };
        Ok(text)
    }

    fn raw_bytes<'r>(raw: &PgValueRef<'r>) -> DbResult<&'r [u8]> {
        raw.as_bytes()
            .map_err(|e| DbError::column(format!("unreadable column value: {}", e)))
    }

    /// Render `{a,b,NULL}` as PostgreSQL prints one-dimensional arrays.
    pub(super) fn format_array<T: std::fmt::Display>(items: Vec<Option<T>>) -> String {
        let items: Vec<String> = items
            .into_iter()
            .map(|item| item.map_or_else(|| "NULL".to_string(), |v| v.to_string()))
            .collect();
        format!("{{{}}}", items.join(","))
    }

    pub(super) fn quote_element(value: String) -> String {
        let needs_quotes = value.is_empty()
            || value.eq_ignore_ascii_case("null")
            || value
                .chars()
                .any(|c| matches!(c, ',' | '{' | '}' | '"' | '\\') || c.is_whitespace());
        if !needs_quotes {
            return value;
        }
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{}\"", escaped)
    }

    /// Render an interval in PostgreSQL's default output style.
    pub(super) fn format_interval(interval: &PgInterval) -> String {
        let plural = |n: i64, unit: &str| {
            if n.abs() == 1 {
                format!("{} {}", n, unit)
            } else {
                format!("{} {}s", n, unit)
            }
        };
        let mut parts = Vec::new();
        let years = i64::from(interval.months / 12);
        let months = i64::from(interval.months % 12);
        if years != 0 {
            parts.push(plural(years, "year"));
        }
        if months != 0 {
            parts.push(plural(months, "mon"));
        }
        if interval.days != 0 {
            parts.push(plural(i64::from(interval.days), "day"));
        }
        if interval.microseconds != 0 || parts.is_empty() {
            let sign = if interval.microseconds < 0 { "-" } else { "" };
            let micros = interval.microseconds.unsigned_abs();
            let secs = micros / 1_000_000;
            let mut time = format!(
                "{}{:02}:{:02}:{:02}",
                sign,
                secs / 3600,
                secs / 60 % 60,
                secs % 60
            );
            let fraction = micros % 1_000_000;
            if fraction != 0 {
                time.push_str(format!(".{:06}", fraction).trim_end_matches('0'));
            }
            parts.push(time);
        }
        parts.join(" ")
    }

    /// Render the binary INET/CIDR encoding: family, bits, is_cidr, length, address.
    pub(super) fn format_inet(bytes: &[u8]) -> DbResult<String> {
        let malformed = || DbError::column("malformed INET value");
        let (header, addr) = bytes.split_at_checked(4).ok_or_else(malformed)?;
        let bits = header[1];
        let is_cidr = header[2] != 0;
        let (ip, max_bits): (IpAddr, u8) = match header[0] {
            2 => {
                let octets: [u8; 4] = addr.try_into().map_err(|_| malformed())?;
                (Ipv4Addr::from(octets).into(), 32)
            }
            3 => {
                let octets: [u8; 16] = addr.try_into().map_err(|_| malformed())?;
                (Ipv6Addr::from(octets).into(), 128)
            }
            _ => return Err(malformed()),
        };
        if bits == max_bits && !is_cidr {
            Ok(ip.to_string())
        } else {
            Ok(format!("{}/{}", ip, bits))
        }
    }

    /// UTF-8 text as is, anything else as `\x` hex like BYTEA.
    pub(super) fn raw_text(bytes: &[u8]) -> String {
        match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => {
                let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
                format!("\\x{}", hex)
            }
        }
    }
}

pub(crate) mod sqlite {
    use super::*;
    use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};

    /// Text layouts SQLite date functions and sqlx produce for DATETIME columns.
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ];

    /// Decode every column of a row.
    ///
    /// SQLite stores values by storage class, not by declared type, so each value is
    /// read by its storage class and the declared type decides how to interpret it
    /// (integers in a BOOLEAN column, text in a DATETIME column). The declared type also
    /// supplies the hint for NULLs.
    pub fn decode_row(row: &SqliteRow, types: &[ColumnType]) -> DbResult<Vec<SqlValue>> {
        (0..row.len())
            .map(|idx| {
                let declared = types.get(idx).copied().unwrap_or(ColumnType::Text);
                decode_column(row, idx, declared)
            })
            .collect()
    }

    fn decode_column(row: &SqliteRow, idx: usize, declared: ColumnType) -> DbResult<SqlValue> {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(SqlValue::Null(declared.null_hint()));
        }
        let storage = raw.type_info().name().to_string();

        let value = match (storage.as_str(), declared) {
            ("INTEGER" | "BOOLEAN", ColumnType::Bool) => {
                SqlValue::Bool(row.try_get_unchecked::<i64, _>(idx)? != 0)
            }
            ("INTEGER", ColumnType::Timestamp | ColumnType::TimestampTz | ColumnType::Date) => {
                let secs = row.try_get_unchecked::<i64, _>(idx)?;
                match DateTime::from_timestamp(secs, 0) {
                    Some(ts) => SqlValue::Timestamp(ts),
                    None => SqlValue::Int64(secs),
                }
            }
            ("INTEGER" | "BOOLEAN", _) => {
                let v = row.try_get_unchecked::<i64, _>(idx)?;
                match (declared, i32::try_from(v)) {
                    (ColumnType::Int16 | ColumnType::Int32, Ok(v)) => SqlValue::Int32(v),
                    _ => SqlValue::Int64(v),
                }
            }
            ("REAL", _) => SqlValue::Float64(row.try_get_unchecked::<f64, _>(idx)?),
            ("BLOB", _) => SqlValue::Binary(row.try_get_unchecked::<Vec<u8>, _>(idx)?),
            (_, ColumnType::Timestamp | ColumnType::TimestampTz | ColumnType::Date) => {
                let text = row.try_get_unchecked::<String, _>(idx)?;
                match parse_timestamp(&text) {
                    Some(ts) => SqlValue::Timestamp(ts),
                    None => SqlValue::Text(text),
                }
            }
            _ => SqlValue::Text(row.try_get_unchecked::<String, _>(idx)?),
        };
        Ok(value)
    }

    /// Parse a stored timestamp; values without an offset are taken as UTC.
    pub(super) fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(text)
            .or_else(|_| DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f%:z"))
        {
            return Some(ts.with_timezone(&Utc));
        }
        if let Some(ts) = DATETIME_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        {
            return Some(ts.and_utc());
        }
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .ok()
            .map(|d| d.and_time(NaiveTime::MIN).and_utc())
    }
}
