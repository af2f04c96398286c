//! Database connection pool built from settings.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::settings::DatabaseSettings;

/// Open a connection pool and verify the first connection.
pub async fn connect(settings: &DatabaseSettings) -> Result<PgPool, sqlx::Error> {
    let pool = PgPoolOptions::new()
        .max_connections(settings.max_connections)
        .acquire_timeout(settings.acquire_timeout())
        .connect(&settings.url())
        .await?;

    tracing::info!(max_connections = settings.max_connections, "connected to database");
    Ok(pool)
}
