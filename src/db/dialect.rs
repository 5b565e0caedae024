//! SQL dialects.
//!
//! A dialect is a small value object holding the product-specific pieces of SQL text the
//! statement synthesizer needs: bind placeholders, sequence expressions and the
//! table-existence check.

use crate::error::{DbError, DbResult};

/// Renders the placeholder for a bound parameter (column name, zero-based index).
pub type BindFn = fn(column: &str, index: usize) -> String;

/// Renders the expression producing the next value of a sequence.
pub type SequenceFn = fn(sequence: &str) -> String;

#[derive(Clone, Copy)]
pub struct Dialect {
    pub name: &'static str,
    /// Parameterized by (schema, table); returns a single count.
    pub table_exists_stmt: &'static str,
    pub bind: BindFn,
    /// `None` when the product has no sequences.
    pub sequence: Option<SequenceFn>,
}

impl std::fmt::Debug for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dialect").field("name", &self.name).finish()
    }
}

impl PartialEq for Dialect {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

fn dollar_bind(_column: &str, index: usize) -> String {
    format!("${}", index + 1)
}

fn numbered_question_bind(_column: &str, index: usize) -> String {
    format!("?{}", index + 1)
}

fn question_bind(_column: &str, _index: usize) -> String {
    "?".to_string()
}

fn named_bind(column: &str, _index: usize) -> String {
    format!(":{}", column)
}

fn nextval_sequence(sequence: &str) -> String {
    format!("nextval('{}')", sequence)
}

fn dot_nextval_sequence(sequence: &str) -> String {
    format!("{}.nextval", sequence)
}

pub const POSTGRES: Dialect = Dialect {
    name: "postgres",
    table_exists_stmt: "SELECT count(*) FROM information_schema.tables WHERE table_schema = $1 AND table_name = $2",
    bind: dollar_bind,
    sequence: Some(nextval_sequence),
};

pub const SQLITE: Dialect = Dialect {
    name: "sqlite",
    table_exists_stmt: "SELECT count(*) FROM pragma_table_list WHERE schema = ?1 AND name = ?2",
    bind: numbered_question_bind,
    sequence: None,
};

pub const MYSQL: Dialect = Dialect {
    name: "mysql",
    table_exists_stmt: "SELECT count(*) FROM information_schema.tables WHERE table_schema = ? AND table_name = ?",
    bind: question_bind,
    sequence: None,
};

pub const ORACLE: Dialect = Dialect {
    name: "oracle",
    table_exists_stmt: "SELECT count(*) FROM all_tables WHERE owner = :owner AND table_name = :table_name",
    bind: named_bind,
    sequence: Some(dot_nextval_sequence),
};

impl Dialect {
    /// Resolve a dialect by product or driver name.
    pub fn for_name(name: &str) -> DbResult<Dialect> {
        match name.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" | "pgx" => Ok(POSTGRES),
            "sqlite" | "sqlite3" => Ok(SQLITE),
            "mysql" | "mariadb" => Ok(MYSQL),
            "oracle" | "godror" => Ok(ORACLE),
            other => Err(DbError::unsupported("dialect", other)),
        }
    }

    /// Infer the dialect from a connection URL scheme.
    pub fn for_url(url: &str) -> DbResult<Dialect> {
        let scheme = url.split(':').next().unwrap_or_default();
        Self::for_name(scheme)
    }

    /// Placeholder for the parameter at `index` (zero-based).
    pub fn bind_param(&self, column: &str, index: usize) -> String {
        (self.bind)(column, index)
    }

    /// Expression yielding the next value of `sequence`.
    pub fn sequence_expression(&self, sequence: &str) -> DbResult<String> {
        match self.sequence {
            Some(render) => Ok(render(sequence)),
            None => Err(DbError::unsupported(
                "sequence identity for dialect",
                self.name,
            )),
        }
    }
}
