//! Integration tests for scoped transactions on SQLite.

mod common;

use common::{count_spots, sqlite_store};
use sqlstore::{DbError, SqlValue, Tx, raise, run_in_transaction};

const INSERT: &str = "INSERT INTO fishing_spots (location, depth) VALUES (?1, ?2)";

async fn insert_spot(tx: &mut Tx, location: &str) -> Result<u64, DbError> {
    tx.execute(INSERT, &[SqlValue::from(location), SqlValue::Int64(3)])
        .await
}

#[tokio::test]
async fn test_body_error_rolls_back() {
    let fixture = sqlite_store().await;
    let store = &fixture.store;

    let result: Result<(), DbError> = run_in_transaction(store, async |tx| {
        insert_spot(tx, "Alpine Grove").await?;
        insert_spot(tx, "Rivertown").await?;
        Err(DbError::aborted("boom"))
    })
    .await;

    let err = result.unwrap_err();
    assert_eq!(err.to_string(), "boom");
    assert_eq!(count_spots(store).await, 0);
}

#[tokio::test]
async fn test_panic_rolls_back_and_becomes_an_error() {
    let fixture = sqlite_store().await;
    let store = &fixture.store;

    let result: Result<(), DbError> = run_in_transaction(store, async |tx| {
        insert_spot(tx, "Pine Island").await?;
        panic!("line snapped");
    })
    .await;

    assert_eq!(result.unwrap_err(), DbError::aborted("line snapped"));
    assert_eq!(count_spots(store).await, 0);
}

#[tokio::test]
async fn test_raised_error_is_recovered() {
    let fixture = sqlite_store().await;
    let store = &fixture.store;

    let result: Result<(), DbError> = run_in_transaction(store, async |tx| {
        insert_spot(tx, "Pine Island").await?;
        raise(DbError::timeout("cast"))
    })
    .await;

    assert_eq!(result.unwrap_err(), DbError::timeout("cast"));
    assert_eq!(count_spots(store).await, 0);
}

#[tokio::test]
async fn test_success_commits() {
    let fixture = sqlite_store().await;
    let store = &fixture.store;

    let inserted = run_in_transaction(store, async |tx| {
        let a = insert_spot(tx, "Alpine Grove").await?;
        let b = insert_spot(tx, "Rivertown").await?;
        let (count,): (i64,) = tx
            .fetch_one("SELECT count(*) FROM fishing_spots", &[])
            .await?;
        assert_eq!(count, 2);
        Ok(a + b)
    })
    .await
    .unwrap();

    assert_eq!(inserted, 2);
    assert_eq!(count_spots(store).await, 2);
}

#[tokio::test]
async fn test_explicit_commit_and_rollback() {
    let fixture = sqlite_store().await;
    let store = &fixture.store;

    let mut tx = store.begin().await.unwrap();
    insert_spot(&mut tx, "Alpine Grove").await.unwrap();
    tx.rollback().await.unwrap();
    assert_eq!(count_spots(store).await, 0);

    let mut tx = store.begin().await.unwrap();
    insert_spot(&mut tx, "Rivertown").await.unwrap();
    tx.commit().await.unwrap();
    assert_eq!(count_spots(store).await, 1);
}

#[tokio::test]
async fn test_driver_error_raised_in_body_rolls_back() {
    let fixture = sqlite_store().await;
    let store = &fixture.store;

    let result: Result<(), DbError> = run_in_transaction(store, async |tx| {
        insert_spot(tx, "Alpine Grove").await?;
        match tx.fetch_all::<(i64,)>("SELECT id FROM no_such_table", &[]).await {
            Ok(_) => Ok(()),
            Err(e) => raise(e),
        }
    })
    .await;

    assert!(matches!(result, Err(DbError::Database { .. })));
    assert_eq!(count_spots(store).await, 0);
}

#[tokio::test]
async fn test_cursor_inside_transaction() {
    let fixture = sqlite_store().await;
    let store = &fixture.store;

    let mut tx = store.begin().await.unwrap();
    insert_spot(&mut tx, "Alpine Grove").await.unwrap();
    {
        use sqlstore::Rows;
        let mut cursor = tx
            .query("SELECT location FROM fishing_spots", &[])
            .await
            .unwrap();
        assert_eq!(cursor.columns().unwrap(), vec!["location"]);
        assert!(cursor.next().await.unwrap());
        assert_eq!(cursor.scan().unwrap(), vec![SqlValue::from("Alpine Grove")]);
        assert!(!cursor.next().await.unwrap());
        cursor.close().unwrap();
    }
    tx.commit().await.unwrap();
}

#[tokio::test]
async fn test_failed_rollback_is_reported() {
    let fixture = sqlite_store().await;
    let store = &fixture.store;

    let mut tx = store.begin().await.unwrap();
    tx.execute("ROLLBACK", &[]).await.unwrap();
    let err = tx.rollback().await.unwrap_err();
    assert!(matches!(err, DbError::Transaction { .. }));
    assert!(err.to_string().contains("rollback failed"));
}
