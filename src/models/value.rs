//! Tagged scalar values shared by parameter binding and result decoding.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Type hint carried by a SQL NULL so typed drivers can bind it correctly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
    #[default]
    Text,
    Int32,
    Int64,
    Float64,
    Bool,
    Timestamp,
    Binary,
}

/// A single scalar value moving between Rust code and the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SqlValue {
    Null(SqlType),
    Text(String),
    Int32(i32),
    Int64(i64),
    Float64(f64),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    Binary(Vec<u8>),
}

impl SqlValue {
    /// An untyped (text-hinted) NULL.
    pub const NULL: SqlValue = SqlValue::Null(SqlType::Text);

    /// Check if this value is SQL NULL.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null(_))
    }

    /// The scalar type of this value (the hint for NULLs).
    pub fn sql_type(&self) -> SqlType {
        match self {
            Self::Null(hint) => *hint,
            Self::Text(_) => SqlType::Text,
            Self::Int32(_) => SqlType::Int32,
            Self::Int64(_) => SqlType::Int64,
            Self::Float64(_) => SqlType::Float64,
            Self::Bool(_) => SqlType::Bool,
            Self::Timestamp(_) => SqlType::Timestamp,
            Self::Binary(_) => SqlType::Binary,
        }
    }

    /// Get the type name of this value for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null(_) => "null",
            Self::Text(_) => "text",
            Self::Int32(_) => "int32",
            Self::Int64(_) => "int64",
            Self::Float64(_) => "float64",
            Self::Bool(_) => "bool",
            Self::Timestamp(_) => "timestamp",
            Self::Binary(_) => "binary",
        }
    }
}

impl std::fmt::Display for SqlValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Null(_) => write!(f, "NULL"),
            Self::Text(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::Float64(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
            Self::Timestamp(v) => write!(f, "{}", v.to_rfc3339()),
            Self::Binary(v) => write!(f, "<{} bytes>", v.len()),
        }
    }
}

macro_rules! impl_from_scalar {
    ($($ty:ty => $variant:ident($conv:expr), $hint:ident;)+) => {
        $(
            impl From<$ty> for SqlValue {
                fn from(v: $ty) -> Self {
                    SqlValue::$variant($conv(v))
                }
            }

            impl From<Option<$ty>> for SqlValue {
                fn from(v: Option<$ty>) -> Self {
                    match v {
                        Some(v) => SqlValue::from(v),
                        None => SqlValue::Null(SqlType::$hint),
                    }
                }
            }
        )+
    };
}

impl_from_scalar! {
    String => Text(|v| v), Text;
    &str => Text(|v: &str| v.to_string()), Text;
    i16 => Int32(i32::from), Int32;
    i32 => Int32(|v| v), Int32;
    i64 => Int64(|v| v), Int64;
    f32 => Float64(f64::from), Float64;
    f64 => Float64(|v| v), Float64;
    bool => Bool(|v| v), Bool;
    DateTime<Utc> => Timestamp(|v| v), Timestamp;
    Vec<u8> => Binary(|v| v), Binary;
}

impl From<&String> for SqlValue {
    fn from(v: &String) -> Self {
        SqlValue::Text(v.clone())
    }
}

impl From<&Option<String>> for SqlValue {
    fn from(v: &Option<String>) -> Self {
        SqlValue::from(v.as_deref())
    }
}
