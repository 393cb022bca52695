// src/db.rs
use std::time::Duration;

use sqlx::migrate::MigrateError;
use sqlx::postgres::PgPoolOptions;
use sqlx::{Pool, Postgres};
use tracing::info;

pub async fn create_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<Pool<Postgres>, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url)
        .await
}

/// Applies the SQL files under `migrations/` that the database has not seen.
pub async fn run_migrations(pool: &Pool<Postgres>) -> Result<(), MigrateError> {
    info!("Applying database migrations");
    sqlx::migrate!("./migrations").run(pool).await
}
