//! Statement synthesis.
//!
//! Turns an [`EntityDescriptor`]'s field table into SELECT/INSERT/UPDATE/DELETE text for a
//! [`Dialect`], resolves the statement a [`QueryRequest`] refers to, and extracts the
//! positional parameter arrays that match the generated statements.

use crate::db::dialect::Dialect;
use crate::error::{DbError, DbResult};
use crate::models::entity::walk_columns;
use crate::models::{
    EntityDescriptor, FieldDescriptor, FieldKind, FieldValue, INSERT_KEY, Identity, QueryRequest,
    Record, SELECT_KEY, SqlValue, UPDATE_KEY,
};
use tracing::debug;

/// Resolve the final text of a select.
///
/// Order: explicit `key` (looked up in the descriptor's commands), explicit `statement`,
/// then the descriptor's cached default select, generated and cached on first use. The
/// suffix is appended after one space and `appends` are substituted into the result.
pub fn resolve_select(
    descriptor: Option<&EntityDescriptor>,
    key: Option<&str>,
    statement: Option<&str>,
    suffix: &str,
    appends: &[String],
) -> DbResult<String> {
    let key = key.filter(|k| !k.is_empty());
    let statement = statement.filter(|s| !s.is_empty());

    let base = match (key, statement) {
        (Some(key), _) => {
            let descriptor = descriptor.ok_or(DbError::MissingDataset)?;
            descriptor
                .command(key)
                .ok_or_else(|| DbError::statement_not_found(descriptor.entity(), key))?
        }
        (None, Some(sql)) => sql.to_string(),
        (None, None) => {
            let descriptor = descriptor.ok_or(DbError::MissingDataset)?;
            match descriptor.command(SELECT_KEY) {
                Some(sql) => sql,
                None => descriptor.put_command(SELECT_KEY, to_select(descriptor)),
            }
        }
    };

    let sql = format!("{} {}", base, suffix);
    if appends.is_empty() {
        Ok(sql)
    } else {
        apply_appends(&sql, appends)
    }
}

/// Resolve the statement described by a request.
pub fn resolve_request(request: &QueryRequest<'_>) -> DbResult<String> {
    resolve_select(
        request.descriptor,
        request.statement_key.as_deref(),
        request.statement.as_deref(),
        &request.suffix,
        &request.appends,
    )
}

/// `SELECT c1,...,cN FROM entity` over the non-excluded columns.
pub fn to_select(descriptor: &EntityDescriptor) -> String {
    let sql = format!(
        "SELECT {} FROM {}",
        descriptor.columns().join(","),
        descriptor.entity()
    );
    debug!(entity = %descriptor.entity(), sql = %sql, "Synthesized select");
    sql
}

/// `INSERT INTO entity (cols) VALUES (binds)`.
///
/// Auto-increment identities are omitted. Sequence identities render the dialect's
/// sequence expression in place of a bind and do not consume a parameter index.
pub fn to_insert(descriptor: &EntityDescriptor, dialect: &Dialect) -> DbResult<String> {
    let mut columns = Vec::new();
    let mut values = Vec::new();
    let mut failure = None;
    let mut index = 0;

    walk_columns(descriptor.fields(), &mut |field| {
        if failure.is_some() {
            return;
        }
        let Some(column) = field.column_name() else {
            return;
        };
        match field.identity() {
            Some(Identity::AutoIncrement) => {}
            Some(Identity::Sequence { sequence: Some(sequence) }) => {
                match dialect.sequence_expression(sequence) {
                    Ok(expr) => {
                        columns.push(column);
                        values.push(expr);
                    }
                    Err(e) => failure = Some(e),
                }
            }
            Some(Identity::Sequence { sequence: None }) => {
                failure = Some(DbError::invalid_identity(
                    &field.field,
                    "sequence identity must name its sequence",
                ));
            }
            None => {
                columns.push(column);
                values.push(dialect.bind_param(column, index));
                index += 1;
            }
        }
    });

    if let Some(e) = failure {
        return Err(e);
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        descriptor.entity(),
        columns.join(","),
        values.join(",")
    );
    debug!(entity = %descriptor.entity(), sql = %sql, "Synthesized insert");
    Ok(sql)
}

/// `UPDATE entity SET c1 = b1,... WHERE id = bN`.
///
/// SET columns bind at indices `0..n`, the identity binds last at index `n`, matching
/// [`update_params`].
pub fn to_update(descriptor: &EntityDescriptor, dialect: &Dialect) -> DbResult<String> {
    let identity = require_identity(descriptor)?;
    let id_column = identity.column_name().unwrap_or_default();

    let mut assignments = Vec::new();
    walk_columns(descriptor.fields(), &mut |field| {
        if field.identity().is_some() {
            return;
        }
        if let Some(column) = field.column_name() {
            let bind = dialect.bind_param(column, assignments.len());
            assignments.push(format!("{} = {}", column, bind));
        }
    });

    let sql = format!(
        "UPDATE {} SET {} WHERE {} = {}",
        descriptor.entity(),
        assignments.join(","),
        id_column,
        dialect.bind_param(id_column, assignments.len())
    );
    debug!(entity = %descriptor.entity(), sql = %sql, "Synthesized update");
    Ok(sql)
}

/// `DELETE FROM entity WHERE id = b0`.
pub fn to_delete(descriptor: &EntityDescriptor, dialect: &Dialect) -> DbResult<String> {
    let identity = require_identity(descriptor)?;
    let id_column = identity.column_name().unwrap_or_default();
    Ok(format!(
        "DELETE FROM {} WHERE {} = {}",
        descriptor.entity(),
        id_column,
        dialect.bind_param(id_column, 0)
    ))
}

/// Cached insert for the descriptor, synthesized on first use.
pub fn insert_statement(descriptor: &EntityDescriptor, dialect: &Dialect) -> DbResult<String> {
    match descriptor.command(INSERT_KEY) {
        Some(sql) => Ok(sql),
        None => Ok(descriptor.put_command(INSERT_KEY, to_insert(descriptor, dialect)?)),
    }
}

/// Cached update for the descriptor, synthesized on first use.
pub fn update_statement(descriptor: &EntityDescriptor, dialect: &Dialect) -> DbResult<String> {
    match descriptor.command(UPDATE_KEY) {
        Some(sql) => Ok(sql),
        None => Ok(descriptor.put_command(UPDATE_KEY, to_update(descriptor, dialect)?)),
    }
}

/// Parameters for [`to_insert`]: every non-identity column in declaration order.
pub fn insert_params(
    descriptor: &EntityDescriptor,
    record: &dyn Record,
) -> DbResult<Vec<SqlValue>> {
    let mut params = Vec::new();
    walk_values(descriptor.fields(), record, &mut |field, value| {
        if field.identity().is_none() {
            params.push(value);
        }
    })?;
    Ok(params)
}

/// Parameters for [`to_update`]: SET values first, the identity value last.
pub fn update_params(
    descriptor: &EntityDescriptor,
    record: &dyn Record,
) -> DbResult<Vec<SqlValue>> {
    require_identity(descriptor)?;
    let mut params = Vec::new();
    let mut id = None;
    walk_values(descriptor.fields(), record, &mut |field, value| {
        if field.identity().is_some() {
            id = Some(value);
        } else {
            params.push(value);
        }
    })?;
    params.push(id.unwrap_or(SqlValue::NULL));
    Ok(params)
}

/// Parameters for [`to_delete`]: the identity value alone.
pub fn delete_params(
    descriptor: &EntityDescriptor,
    record: &dyn Record,
) -> DbResult<Vec<SqlValue>> {
    require_identity(descriptor)?;
    let mut id = None;
    walk_values(descriptor.fields(), record, &mut |field, value| {
        if field.identity().is_some() {
            id = Some(value);
        }
    })?;
    Ok(vec![id.unwrap_or(SqlValue::NULL)])
}

/// Substitute `appends` into the `%s`/`%d`/`%v` placeholders of `template`.
///
/// `%%` renders a literal percent sign; any other `%` sequence is left untouched.
pub fn apply_appends(template: &str, appends: &[String]) -> DbResult<String> {
    let mut out = String::with_capacity(template.len());
    let mut values = appends.iter();
    let mut used = 0;
    let mut chars = template.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('s' | 'd' | 'v') => {
                chars.next();
                let value = values.next().ok_or_else(|| {
                    DbError::invalid_input(format!(
                        "statement has more placeholders than the {} supplied append values",
                        appends.len()
                    ))
                })?;
                out.push_str(value);
                used += 1;
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            _ => out.push('%'),
        }
    }

    if used != appends.len() {
        return Err(DbError::invalid_input(format!(
            "statement has {} placeholders but {} append values were supplied",
            used,
            appends.len()
        )));
    }
    Ok(out)
}

fn require_identity(descriptor: &EntityDescriptor) -> DbResult<&FieldDescriptor> {
    descriptor.identity().ok_or_else(|| {
        DbError::invalid_identity(
            descriptor.entity(),
            "an identity field is required for update and delete statements",
        )
    })
}

/// Visit `(field, value)` for every non-excluded column, expanding embedded records.
///
/// An embedded field whose value is NULL contributes a NULL for each of its columns.
fn walk_values(
    fields: &[FieldDescriptor],
    record: &dyn Record,
    visit: &mut dyn FnMut(&FieldDescriptor, SqlValue),
) -> DbResult<()> {
    for field in fields {
        if field.is_excluded() {
            continue;
        }
        let value = record.field_value(&field.field).ok_or_else(|| {
            DbError::invalid_input(format!("record has no value for field '{}'", field.field))
        })?;
        match (&field.kind, value) {
            (FieldKind::Column { .. }, FieldValue::Value(v)) => visit(field, v),
            (FieldKind::Embedded(inner), FieldValue::Embedded(nested)) => {
                walk_values(inner, nested, visit)?
            }
            (FieldKind::Embedded(inner), FieldValue::Value(v)) if v.is_null() => {
                walk_columns(inner, &mut |f| visit(f, SqlValue::NULL))
            }
            _ => {
                return Err(DbError::invalid_input(format!(
                    "field '{}' does not match its descriptor",
                    field.field
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::dialect::{ORACLE, POSTGRES, SQLITE};

    struct FishingSpot {
        id: i64,
        location: Option<String>,
    }

    impl Record for FishingSpot {
        fn fields() -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::column("id", "id").auto_increment(),
                FieldDescriptor::column("location", "location"),
                FieldDescriptor::excluded("cached_label"),
            ]
        }

        fn field_value(&self, field: &str) -> Option<FieldValue<'_>> {
            match field {
                "id" => Some(FieldValue::Value(self.id.into())),
                "location" => Some(FieldValue::Value((&self.location).into())),
                _ => None,
            }
        }
    }

    struct Address {
        street: String,
        city: Option<String>,
    }

    impl Record for Address {
        fn fields() -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::column("street", "street"),
                FieldDescriptor::column("city", "city"),
            ]
        }

        fn field_value(&self, field: &str) -> Option<FieldValue<'_>> {
            match field {
                "street" => Some(FieldValue::Value((&self.street).into())),
                "city" => Some(FieldValue::Value((&self.city).into())),
                _ => None,
            }
        }
    }

    struct Angler {
        id: i64,
        name: String,
        address: Option<Address>,
    }

    impl Record for Angler {
        fn fields() -> Vec<FieldDescriptor> {
            vec![
                FieldDescriptor::column("id", "angler_id").sequence("angler_seq"),
                FieldDescriptor::column("name", "name"),
                FieldDescriptor::embedded("address", Address::fields()),
            ]
        }

        fn field_value(&self, field: &str) -> Option<FieldValue<'_>> {
            match field {
                "id" => Some(FieldValue::Value(self.id.into())),
                "name" => Some(FieldValue::Value((&self.name).into())),
                "address" => Some(match &self.address {
                    Some(address) => FieldValue::Embedded(address),
                    None => FieldValue::Value(SqlValue::NULL),
                }),
                _ => None,
            }
        }
    }

    fn spots() -> EntityDescriptor {
        EntityDescriptor::for_record::<FishingSpot>("fishing_spots").unwrap()
    }

    fn anglers() -> EntityDescriptor {
        EntityDescriptor::for_record::<Angler>("anglers")
            .unwrap()
            .with_schema("club")
    }

    #[test]
    fn test_select_skips_excluded_columns() {
        assert_eq!(to_select(&spots()), "SELECT id,location FROM fishing_spots");
        assert_eq!(
            to_select(&anglers()),
            "SELECT angler_id,name,street,city FROM club.anglers"
        );
    }

    #[test]
    fn test_insert_omits_auto_increment_identity() {
        let sql = to_insert(&spots(), &POSTGRES).unwrap();
        assert_eq!(sql, "INSERT INTO fishing_spots (location) VALUES ($1)");
    }

    #[test]
    fn test_insert_renders_sequence_without_consuming_bind_index() {
        let sql = to_insert(&anglers(), &POSTGRES).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO club.anglers (angler_id,name,street,city) VALUES (nextval('angler_seq'),$1,$2,$3)"
        );

        let sql = to_insert(&anglers(), &ORACLE).unwrap();
        assert_eq!(
            sql,
            "INSERT INTO club.anglers (angler_id,name,street,city) VALUES (angler_seq.nextval,:name,:street,:city)"
        );
    }

    #[test]
    fn test_insert_rejects_unnamed_sequence() {
        let fields = vec![
            FieldDescriptor::column("id", "id")
                .with_identity(Identity::Sequence { sequence: None }),
            FieldDescriptor::column("name", "name"),
        ];
        let ds = EntityDescriptor::new("t", fields).unwrap();
        let err = to_insert(&ds, &POSTGRES).unwrap_err();
        assert!(matches!(err, DbError::InvalidIdentity { ref field, .. } if field == "id"));
    }

    #[test]
    fn test_insert_sequence_on_dialect_without_sequences() {
        let err = to_insert(&anglers(), &SQLITE).unwrap_err();
        assert!(matches!(err, DbError::Unsupported { .. }));
    }

    #[test]
    fn test_update_binds_identity_last() {
        let sql = to_update(&anglers(), &POSTGRES).unwrap();
        assert_eq!(
            sql,
            "UPDATE club.anglers SET name = $1,street = $2,city = $3 WHERE angler_id = $4"
        );
    }

    #[test]
    fn test_update_and_delete_require_identity() {
        let ds = EntityDescriptor::new("log", vec![FieldDescriptor::column("msg", "msg")]).unwrap();
        assert!(matches!(
            to_update(&ds, &POSTGRES),
            Err(DbError::InvalidIdentity { .. })
        ));
        assert!(matches!(
            to_delete(&ds, &POSTGRES),
            Err(DbError::InvalidIdentity { .. })
        ));
    }

    #[test]
    fn test_delete() {
        assert_eq!(
            to_delete(&spots(), &SQLITE).unwrap(),
            "DELETE FROM fishing_spots WHERE id = ?1"
        );
    }

    #[test]
    fn test_resolve_default_select_is_cached() {
        let ds = spots();
        assert!(ds.command(SELECT_KEY).is_none());
        let first = resolve_select(Some(&ds), Some(""), None, "", &[]).unwrap();
        assert_eq!(
            ds.command(SELECT_KEY).as_deref(),
            Some("SELECT id,location FROM fishing_spots")
        );
        let second = resolve_select(Some(&ds), Some(""), None, "", &[]).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_resolve_prefers_key_over_statement() {
        let ds = spots().with_command(
            "by_location",
            "SELECT * FROM fishing_spots WHERE location = $1",
        );
        let sql = resolve_select(
            Some(&ds),
            Some("by_location"),
            Some("SELECT 1"),
            "ORDER BY id",
            &[],
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM fishing_spots WHERE location = $1 ORDER BY id"
        );
    }

    #[test]
    fn test_resolve_errors() {
        assert!(matches!(
            resolve_select(None, Some("by_id"), None, "", &[]),
            Err(DbError::MissingDataset)
        ));
        assert!(matches!(
            resolve_select(None, None, None, "", &[]),
            Err(DbError::MissingDataset)
        ));
        let err = resolve_select(Some(&spots()), Some("nope"), None, "", &[]).unwrap_err();
        assert_eq!(err.to_string(), "Unable to find statement for fishing_spots: nope");
    }

    #[test]
    fn test_resolve_raw_sql_with_appends() {
        let sql = resolve_select(
            None,
            None,
            Some("SELECT * FROM fishing_spots"),
            "WHERE location LIKE 'Pine%%' LIMIT %d",
            &["10".to_string()],
        )
        .unwrap();
        assert_eq!(
            sql,
            "SELECT * FROM fishing_spots WHERE location LIKE 'Pine%' LIMIT 10"
        );
    }

    #[test]
    fn test_appends_count_mismatch() {
        assert!(apply_appends("LIMIT %d OFFSET %d", &["1".to_string()]).is_err());
        assert!(apply_appends("LIMIT 1", &["1".to_string()]).is_err());
        assert_eq!(apply_appends("x LIKE 'a%'", &[]).unwrap(), "x LIKE 'a%'");
    }

    #[test]
    fn test_insert_params_skip_identity() {
        let spot = FishingSpot {
            id: 9,
            location: None,
        };
        let params = insert_params(&spots(), &spot).unwrap();
        assert_eq!(params, vec![SqlValue::Null(crate::models::SqlType::Text)]);
    }

    #[test]
    fn test_params_expand_embedded_records() {
        let angler = Angler {
            id: 3,
            name: "Ada".into(),
            address: Some(Address {
                street: "1 Lake Rd".into(),
                city: Some("Pine Island".into()),
            }),
        };
        let ds = anglers();
        assert_eq!(
            insert_params(&ds, &angler).unwrap(),
            vec![
                SqlValue::from("Ada"),
                SqlValue::from("1 Lake Rd"),
                SqlValue::from("Pine Island"),
            ]
        );
        assert_eq!(
            update_params(&ds, &angler).unwrap(),
            vec![
                SqlValue::from("Ada"),
                SqlValue::from("1 Lake Rd"),
                SqlValue::from("Pine Island"),
                SqlValue::Int64(3),
            ]
        );
        assert_eq!(delete_params(&ds, &angler).unwrap(), vec![SqlValue::Int64(3)]);
    }

    #[test]
    fn test_missing_embedded_record_binds_nulls() {
        let angler = Angler {
            id: 4,
            name: "Bo".into(),
            address: None,
        };
        let params = insert_params(&anglers(), &angler).unwrap();
        assert_eq!(params.len(), 3);
        assert!(params[1].is_null() && params[2].is_null());
    }

    #[test]
    fn test_statement_cache() {
        let ds = spots();
        let sql = insert_statement(&ds, &POSTGRES).unwrap();
        assert_eq!(ds.command(INSERT_KEY), Some(sql));
    }
}
