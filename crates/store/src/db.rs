use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use listpilot_core::config::PostgresConfig;

/// Create a PostgreSQL connection pool and run migrations.
/// Returns None if Postgres is not configured; callers fall back to the
/// in-memory store.
pub async fn init_pg_pool(config: &PostgresConfig) -> Option<PgPool> {
    if !config.is_configured() {
        warn!("Postgres not configured (PG_USERNAME unset) — falling back to in-memory store");
        return None;
    }

    let url = config.connection_string();
    match PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&url)
        .await
    {
        Ok(pool) => {
            info!("PostgreSQL connected: {}", config.host);
            match sqlx::migrate!("./migrations").run(&pool).await {
                Ok(_) => {
                    info!("Database migrations applied successfully");
                    Some(pool)
                }
                Err(e) => {
                    warn!("Failed to run migrations: {} — falling back to in-memory store", e);
                    None
                }
            }
        }
        Err(e) => {
            warn!("Failed to connect to PostgreSQL: {} — falling back to in-memory store", e);
            None
        }
    }
}
