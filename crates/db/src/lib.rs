//! Persistence for generation jobs, media descriptors and model routes.
//!
//! The orchestration layer talks to storage only through the [`JobStore`]
//! and [`RouteCatalog`] traits. Postgres implementations wrap the
//! zero-sized repositories in [`repositories`]; in-memory implementations
//! in [`memory`] back local development and tests.

use sqlx::postgres::PgPoolOptions;

pub mod catalog;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use catalog::{PgRouteCatalog, RouteCatalog};
pub use memory::{MemoryJobStore, MemoryRouteCatalog};
pub use store::{JobStore, PgJobStore, StoreError};

pub type DbPool = sqlx::PgPool;

/// Create a connection pool from a database URL.
pub async fn create_pool(database_url: &str) -> Result<DbPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(20)
        .connect(database_url)
        .await
}

/// Run a trivial query to confirm the database is reachable.
pub async fn health_check(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

/// Apply all pending migrations from `crates/db/migrations`.
pub async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
