use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use sqlx::postgres::{PgPool, PgPoolOptions};

/// Database settings. Every flag falls back to an environment variable, and
/// `.env` is loaded before parsing.
#[derive(Args, Clone, Debug)]
pub struct DbConfig {
    /// PostgreSQL connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    #[arg(long, env = "DB_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    #[arg(long, env = "DB_ACQUIRE_TIMEOUT_SECS", default_value_t = 3)]
    pub acquire_timeout_secs: u64,

    /// Do not run the embedded migrations on startup.
    #[arg(long, env = "SKIP_MIGRATIONS")]
    pub skip_migrations: bool,
}

impl DbConfig {
    pub async fn connect(&self) -> Result<PgPool> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(Duration::from_secs(self.acquire_timeout_secs))
            .connect(&self.database_url)
            .await
            .context("can't connect to database")
    }
}
