//! PostgreSQL pool for the submissions store.

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::debug;

use crate::config::Config;

/// How long a request waits for a pooled connection before failing.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(5);

/// Connect to PostgreSQL using the configured URL and pool size.
///
/// The submissions table is not touched here; the store creates it on
/// first insert.
pub async fn create_pool(config: &Config) -> Result<PgPool> {
    debug!(
        max_connections = config.database_max_connections,
        "connecting to PostgreSQL"
    );

    PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(&config.database_url)
        .await
        .context("failed to connect to PostgreSQL")
}

/// Whether a trivial query succeeds on the pool.
pub async fn check_health(pool: &PgPool) -> bool {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await
        .is_ok()
}
