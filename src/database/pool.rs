use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;

use crate::config::get_config;
use crate::error::{Error, Result};

pub async fn create_pool() -> Result<PgPool> {
    let config = get_config();

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .min_connections(1)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .connect(&config.database_url)
        .await
        .map_err(|e| Error::Config(format!("Failed to connect to database: {}", e)))?;

    info!("Database connection pool established");
    Ok(pool)
}
