//! Application state wiring the stores to their SQLite implementations.

use std::path::PathBuf;

use anyhow::Context;

use quotabot_infra::config::{load_config, resolve_data_dir};
use quotabot_infra::sqlite::pool::DatabasePool;
use quotabot_infra::sqlite::session::SqliteSessionStore;
use quotabot_infra::sqlite::transaction::SqliteTransactionStore;
use quotabot_types::config::BotConfig;

/// Shared state for CLI commands: configuration plus the SQLite stores.
pub struct AppState {
    pub config: BotConfig,
    pub data_dir: PathBuf,
    pub sessions: SqliteSessionStore,
    pub transactions: SqliteTransactionStore,
}

impl AppState {
    /// Initialize the application state: resolve the data directory, load
    /// the configuration, open the database.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("creating data dir {}", data_dir.display()))?;

        let config = load_config(&data_dir).await;

        let database_url = format!("sqlite://{}/quotabot.db", data_dir.display());
        let pool = DatabasePool::new(&database_url)
            .await
            .context("opening database")?;

        Ok(Self {
            config,
            data_dir,
            sessions: SqliteSessionStore::new(pool.clone()),
            transactions: SqliteTransactionStore::new(pool),
        })
    }
}
