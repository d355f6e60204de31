use std::sync::Arc;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::config::Config;
use crate::store::{MemoryStore, PgStore, Store};

pub async fn connect_pg(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await?;
    Ok(pool)
}

/// Picks the store backend from config, migrating Postgres when asked to.
pub async fn open_store(cfg: &Config) -> anyhow::Result<Arc<dyn Store>> {
    let Some(url) = cfg.database_url.as_deref() else {
        tracing::warn!("DATABASE_URL not set; using in-memory store (data is lost on exit)");
        return Ok(Arc::new(MemoryStore::new()));
    };

    let pool = connect_pg(url, cfg.db_max_connections).await?;
    if cfg.run_migrations {
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::info!("database migrations applied");
    }
    Ok(Arc::new(PgStore::new(pool)))
}
