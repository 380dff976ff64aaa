pub mod models;

use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

use crate::config::Config;

#[derive(Clone)]
pub struct Database {
    pub pool: SqlitePool,
}

impl Database {
    pub async fn connect(config: &Config) -> anyhow::Result<Self> {
        Self::connect_with(&config.database_url, config.database_max_connections).await
    }

    pub async fn connect_with(url: &str, max_connections: u32) -> anyhow::Result<Self> {
        // Ensure the data directory exists for file-backed databases
        if let Some(path) = url.strip_prefix("sqlite:") {
            let path = path.split('?').next().unwrap_or(path);
            if let Some(parent) = std::path::Path::new(path).parent() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;

        tracing::debug!(url, max_connections, "Connected to sqlite");
        Ok(Self { pool })
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}
