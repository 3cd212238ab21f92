use crate::config::Config;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;

/// Creates and returns a new database connection pool.
pub async fn setup_db_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .connect(config.database_url())
        .await
}

/// Creates the HTTP client used to reach the messaging gateway.
pub fn setup_http_client(config: &Config) -> Result<reqwest::Client, reqwest::Error> {
    reqwest::Client::builder()
        .timeout(Duration::from_millis(config.gateway_timeout_ms))
        .build()
}
