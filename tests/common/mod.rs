//! Shared fixtures for integration tests.
#![allow(dead_code)]

use sqlstore::{
    DataStore, EntityDescriptor, FieldDescriptor, FieldValue, Record, SqlValue, StoreConfig,
};
use tempfile::TempDir;

/// A store on a fresh SQLite file; the directory lives as long as the fixture.
pub struct SqliteFixture {
    pub store: DataStore,
    _dir: TempDir,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct FishingSpot {
    pub id: i64,
    pub location: Option<String>,
    pub depth: Option<i64>,
}

impl FishingSpot {
    pub fn new(location: &str, depth: i64) -> Self {
        Self {
            id: 0,
            location: Some(location.to_string()),
            depth: Some(depth),
        }
    }
}

impl Record for FishingSpot {
    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::column("id", "id").auto_increment(),
            FieldDescriptor::column("location", "location"),
            FieldDescriptor::column("depth", "depth"),
        ]
    }

    fn field_value(&self, field: &str) -> Option<FieldValue<'_>> {
        match field {
            "id" => Some(FieldValue::Value(self.id.into())),
            "location" => Some(FieldValue::Value(SqlValue::from(&self.location))),
            "depth" => Some(FieldValue::Value(self.depth.into())),
            _ => None,
        }
    }
}

/// Gear a catch was landed with; stored inline in the `catches` table.
#[derive(Debug, Clone, PartialEq)]
pub struct Tackle {
    pub lure: Option<String>,
    pub line_lbs: Option<i64>,
}

impl Record for Tackle {
    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::column("lure", "lure"),
            FieldDescriptor::column("line_lbs", "line_lbs"),
        ]
    }

    fn field_value(&self, field: &str) -> Option<FieldValue<'_>> {
        match field {
            "lure" => Some(FieldValue::Value(SqlValue::from(&self.lure))),
            "line_lbs" => Some(FieldValue::Value(self.line_lbs.into())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Catch {
    pub id: i64,
    pub species: Option<String>,
    pub weight_g: Option<i64>,
    pub tackle: Option<Tackle>,
}

impl Record for Catch {
    fn fields() -> Vec<FieldDescriptor> {
        vec![
            FieldDescriptor::column("id", "id").auto_increment(),
            FieldDescriptor::column("species", "species"),
            FieldDescriptor::column("weight_g", "weight_g"),
            FieldDescriptor::embedded("tackle", Tackle::fields()),
        ]
    }

    fn field_value(&self, field: &str) -> Option<FieldValue<'_>> {
        match field {
            "id" => Some(FieldValue::Value(self.id.into())),
            "species" => Some(FieldValue::Value(SqlValue::from(&self.species))),
            "weight_g" => Some(FieldValue::Value(self.weight_g.into())),
            "tackle" => Some(match &self.tackle {
                Some(tackle) => FieldValue::Embedded(tackle),
                None => FieldValue::Value(SqlValue::NULL),
            }),
            _ => None,
        }
    }
}

// All-NULL tackle columns read back as no tackle.
impl<'r, R> sqlx::FromRow<'r, R> for Catch
where
    R: sqlx::Row,
    &'r str: sqlx::ColumnIndex<R>,
    i64: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
    String: sqlx::Decode<'r, R::Database> + sqlx::Type<R::Database>,
{
    fn from_row(row: &'r R) -> Result<Self, sqlx::Error> {
        let lure: Option<String> = row.try_get("lure")?;
        let line_lbs: Option<i64> = row.try_get("line_lbs")?;
        let has_tackle = lure.is_some() || line_lbs.is_some();
        Ok(Self {
            id: row.try_get("id")?,
            species: row.try_get("species")?,
            weight_g: row.try_get("weight_g")?,
            tackle: has_tackle.then_some(Tackle { lure, line_lbs }),
        })
    }
}

pub fn catches_descriptor() -> EntityDescriptor {
    EntityDescriptor::for_record::<Catch>("catches").unwrap()
}

pub fn spots_descriptor() -> EntityDescriptor {
    EntityDescriptor::for_record::<FishingSpot>("fishing_spots").unwrap()
}

pub async fn sqlite_store() -> SqliteFixture {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite:{}?mode=rwc", dir.path().join("fishing.db").display());
    let config = StoreConfig::sqlite(&url).unwrap();
    let store = DataStore::connect(&config).await.unwrap();

    store
        .execute(
            "CREATE TABLE fishing_spots (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                location TEXT,
                depth INTEGER
            )",
            &[],
        )
        .await
        .unwrap();
    store
        .execute(
            "CREATE TABLE catches (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                species TEXT,
                weight_g INTEGER,
                lure TEXT,
                line_lbs INTEGER
            )",
            &[],
        )
        .await
        .unwrap();

    SqliteFixture { store, _dir: dir }
}

/// Seed the four spots used across the output tests.
pub async fn seed_spots(store: &DataStore) {
    for (location, depth) in [
        (Some("Alpine Grove"), 12),
        (Some("Rivertown"), 4),
        (Some("Pine Island"), 20),
        (None, 7),
    ] {
        store
            .execute(
                "INSERT INTO fishing_spots (location, depth) VALUES (?1, ?2)",
                &[SqlValue::from(location), SqlValue::from(depth as i64)],
            )
            .await
            .unwrap();
    }
}

pub async fn count_spots(store: &DataStore) -> i64 {
    let (count,): (i64,) = store
        .fetch_one("SELECT count(*) FROM fishing_spots", &[])
        .await
        .unwrap();
    count
}
