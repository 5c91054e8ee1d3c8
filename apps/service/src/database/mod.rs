/// Event log storage
///
/// A durable, append-only table of classified check events on LibSQL
/// (SQLite). Rows are never updated or deleted.
pub mod migrations;
pub mod models;
pub mod repository;

pub use models::LatestPair;
pub use repository::{EventLog, EventStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Libsql(#[from] libsql::Error),

    #[error("connection pool error: {0}")]
    Pool(#[from] deadpool::managed::PoolError<libsql::Error>),

    #[error("connection pool setup failed: {0}")]
    PoolBuild(#[from] deadpool::managed::BuildError),

    #[error("corrupt event row: {0}")]
    Corrupt(String),
}

/// Initialize database with schema
pub async fn initialize_database(conn: &libsql::Connection) -> Result<(), StoreError> {
    migrations::run_migrations(conn).await
}
