//! Entity descriptors: the static mapping from a record type to a table.
//!
//! A descriptor is built once per entity and shared across queries. It owns the ordered
//! field table that the statement synthesizer walks, plus a write-once cache of
//! previously synthesized SQL keyed by purpose (`"select"`, `"insert"`, ...).

use crate::error::{DbError, DbResult};
use crate::models::SqlValue;
use std::collections::HashMap;
use std::sync::RwLock;

/// Column name that excludes a field from every generated statement.
pub const EXCLUDED_COLUMN: &str = "_";

/// Command cache key for the generated default select.
pub const SELECT_KEY: &str = "select";

/// Command cache key for the generated insert.
pub const INSERT_KEY: &str = "insert";

/// Command cache key for the generated update.
pub const UPDATE_KEY: &str = "update";

/// How an identity column gets its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    /// The database generates the value; inserts omit the column.
    AutoIncrement,
    /// The value comes from a named sequence rendered by the dialect.
    Sequence { sequence: Option<String> },
}

impl Identity {
    pub fn sequence(name: impl Into<String>) -> Self {
        Self::Sequence {
            sequence: Some(name.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    Column {
        column: String,
        identity: Option<Identity>,
    },
    /// A composite field whose own fields are expanded in place.
    Embedded(Vec<FieldDescriptor>),
}

/// One entry of an entity's field table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub field: String,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    /// A plain column mapping.
    pub fn column(field: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            kind: FieldKind::Column {
                column: column.into(),
                identity: None,
            },
        }
    }

    /// A field that never appears in generated SQL.
    pub fn excluded(field: impl Into<String>) -> Self {
        Self::column(field, EXCLUDED_COLUMN)
    }

    /// A composite field expanded into its own sub-fields.
    pub fn embedded(field: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            field: field.into(),
            kind: FieldKind::Embedded(fields),
        }
    }

    /// Mark this column as a database generated identity.
    pub fn auto_increment(self) -> Self {
        self.with_identity(Identity::AutoIncrement)
    }

    /// Mark this column as a sequence backed identity.
    pub fn sequence(self, sequence: impl Into<String>) -> Self {
        self.with_identity(Identity::sequence(sequence))
    }

    pub fn with_identity(mut self, identity: Identity) -> Self {
        if let FieldKind::Column { identity: slot, .. } = &mut self.kind {
            *slot = Some(identity);
        }
        self
    }

    /// Column name, or `None` for embedded fields.
    pub fn column_name(&self) -> Option<&str> {
        match &self.kind {
            FieldKind::Column { column, .. } => Some(column),
            FieldKind::Embedded(_) => None,
        }
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.kind {
            FieldKind::Column { identity, .. } => identity.as_ref(),
            FieldKind::Embedded(_) => None,
        }
    }

    pub fn is_excluded(&self) -> bool {
        self.column_name() == Some(EXCLUDED_COLUMN)
    }
}

/// Value of one field as seen by parameter extraction.
pub enum FieldValue<'a> {
    Value(SqlValue),
    Embedded(&'a dyn Record),
}

/// A record type whose fields can be mapped onto an entity.
///
/// `fields` lists the field table in declaration order; `field_value` returns the
/// current value of a named field. `Option` fields should return a typed NULL for `None`.
///
/// ```ignore
/// impl Record for FishingSpot {
///     fn fields() -> Vec<FieldDescriptor> {
///         vec![
///             FieldDescriptor::column("id", "id").auto_increment(),
///             FieldDescriptor::column("location", "location"),
///         ]
///     }
///
///     fn field_value(&self, field: &str) -> Option<FieldValue<'_>> {
///         match field {
///             "id" => Some(FieldValue::Value(self.id.into())),
///             "location" => Some(FieldValue::Value(self.location.clone().into())),
///             _ => None,
///         }
///     }
/// }
/// ```
pub trait Record: Send + Sync {
    fn fields() -> Vec<FieldDescriptor>
    where
        Self: Sized;

    fn field_value(&self, field: &str) -> Option<FieldValue<'_>>;
}

/// Mapping of one table or view.
#[derive(Debug)]
pub struct EntityDescriptor {
    name: String,
    schema: Option<String>,
    fields: Vec<FieldDescriptor>,
    commands: RwLock<HashMap<String, String>>,
}

impl EntityDescriptor {
    /// Create a descriptor, rejecting field tables with more than one identity.
    pub fn new(name: impl Into<String>, fields: Vec<FieldDescriptor>) -> DbResult<Self> {
        let name = name.into();
        let identities = collect_identities(&fields);
        if identities.len() > 1 {
            return Err(DbError::invalid_identity(
                identities.join(","),
                format!("entity '{}' declares more than one identity field", name),
            ));
        }
        Ok(Self {
            name,
            schema: None,
            fields,
            commands: RwLock::new(HashMap::new()),
        })
    }

    /// Create a descriptor from a record type's field table.
    pub fn for_record<R: Record>(name: impl Into<String>) -> DbResult<Self> {
        Self::new(name, R::fields())
    }

    pub fn with_schema(mut self, schema: impl Into<String>) -> Self {
        let schema = schema.into();
        self.schema = (!schema.is_empty()).then_some(schema);
        self
    }

    /// Register a named statement.
    pub fn with_command(self, key: impl Into<String>, sql: impl Into<String>) -> Self {
        self.write_commands().insert(key.into(), sql.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Qualified entity name (`schema.table` or `table`).
    pub fn entity(&self) -> String {
        match &self.schema {
            Some(schema) => format!("{}.{}", schema, self.name),
            None => self.name.clone(),
        }
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    /// Non-excluded column names in declaration order, embedded fields expanded.
    pub fn columns(&self) -> Vec<&str> {
        let mut columns = Vec::new();
        walk_columns(&self.fields, &mut |field| {
            if let Some(column) = field.column_name() {
                columns.push(column);
            }
        });
        columns
    }

    /// The identity field, if any.
    pub fn identity(&self) -> Option<&FieldDescriptor> {
        let mut found = None;
        walk_columns(&self.fields, &mut |field| {
            if found.is_none() && field.identity().is_some() {
                found = Some(field);
            }
        });
        found
    }

    /// Look up a cached or named statement.
    pub fn command(&self, key: &str) -> Option<String> {
        self.commands
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(key)
            .cloned()
    }

    /// Cache a statement under `key` unless one is already present.
    ///
    /// Returns the statement that ends up cached.
    pub fn put_command(&self, key: &str, sql: String) -> String {
        self.write_commands()
            .entry(key.to_string())
            .or_insert(sql)
            .clone()
    }

    fn write_commands(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, String>> {
        self.commands
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Visit every non-excluded column field, expanding embedded fields in place.
pub(crate) fn walk_columns<'a>(
    fields: &'a [FieldDescriptor],
    visit: &mut dyn FnMut(&'a FieldDescriptor),
) {
    for field in fields {
        match &field.kind {
            FieldKind::Embedded(inner) => walk_columns(inner, visit),
            FieldKind::Column { .. } if field.is_excluded() => {}
            FieldKind::Column { .. } => visit(field),
        }
    }
}

fn collect_identities(fields: &[FieldDescriptor]) -> Vec<String> {
    let mut names = Vec::new();
    walk_columns(fields, &mut |field| {
        if field.identity().is_some() {
            names.push(field.field.clone());
        }
    });
    names
}
