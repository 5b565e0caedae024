//! Connection pool management.
//!
//! A store runs on one of two database-specific pools: PostgreSQL (native batching) or
//! SQLite. Both are concrete sqlx pools, so every native column type reaches the decoder.

use crate::config::{Backend, StoreConfig};
use crate::error::{DbError, DbResult};
use sqlx::postgres::PgPoolOptions;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{PgPool, SqlitePool};
use std::str::FromStr;
use tracing::info;

/// Database-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

impl DbPool {
    /// Create a pool for the configured backend.
    pub async fn connect(config: &StoreConfig) -> DbResult<Self> {
        config.pool.validate()?;
        let opts = &config.pool;
        let max_connections = opts.max_connections_or_default(config.is_sqlite());
        let min_connections = opts.min_connections_or_default().min(max_connections);

        info!(
            backend = %config.backend,
            max_connections = max_connections,
            "Connecting to database"
        );

        let pool = match config.backend {
            Backend::Postgres => {
                let pool = PgPoolOptions::new()
                    .max_connections(max_connections)
                    .min_connections(min_connections)
                    .idle_timeout(opts.idle_timeout_or_default())
                    .acquire_timeout(opts.acquire_timeout_or_default())
                    .connect(&config.url)
                    .await
                    .map_err(|e| connect_error(e, config.backend))?;
                DbPool::Postgres(pool)
            }
            Backend::Sqlite => {
                let options = SqliteConnectOptions::from_str(&config.url).map_err(|e| {
                    DbError::connection(
                        format!("Invalid SQLite connection string: {}", e),
                        "Check the connection URL format: sqlite:path/to/db.sqlite",
                    )
                })?;
                let pool = SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .min_connections(min_connections)
                    .idle_timeout(opts.idle_timeout_or_default())
                    .acquire_timeout(opts.acquire_timeout_or_default())
                    .connect_with(options)
                    .await
                    .map_err(|e| connect_error(e, config.backend))?;
                DbPool::Sqlite(pool)
            }
        };

        info!(backend = %config.backend, "Connected successfully");
        Ok(pool)
    }

    pub fn backend(&self) -> Backend {
        match self {
            DbPool::Postgres(_) => Backend::Postgres,
            DbPool::Sqlite(_) => Backend::Sqlite,
        }
    }

    /// Close the connection pool.
    pub async fn close(&self) {
        match self {
            DbPool::Postgres(pool) => pool.close().await,
            DbPool::Sqlite(pool) => pool.close().await,
        }
    }
}

impl From<PgPool> for DbPool {
    fn from(pool: PgPool) -> Self {
        DbPool::Postgres(pool)
    }
}

impl From<SqlitePool> for DbPool {
    fn from(pool: SqlitePool) -> Self {
        DbPool::Sqlite(pool)
    }
}

fn connect_error(e: sqlx::Error, backend: Backend) -> DbError {
    match DbError::from(e) {
        err @ DbError::Connection { .. } => err,
        other => DbError::connection(
            format!("{} ({} backend)", other, backend),
            "Check the connection URL and that the database is reachable",
        ),
    }
}
