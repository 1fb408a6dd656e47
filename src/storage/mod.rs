//! Bet persistence
//!
//! SQLite is the primary store; a JSON file takes over when the database
//! cannot be opened.

mod file;
mod sqlite;


pub use file::JsonFileStore;
pub use sqlite::SqliteStore;

use crate::config::DatabaseConfig;
use crate::error::Result;
use crate::types::{BetRecord, BetStatistics, BetStatus, LogEntry};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Record store for bets and the audit log
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BetStore: Send + Sync {
    /// Backend name for logging
    fn backend(&self) -> &'static str;

    /// Insert a bet; returns it with the assigned id
    async fn save(&self, bet: &BetRecord) -> Result<BetRecord>;

    /// Move a bet forward; backward transitions are rejected
    async fn update_status(&self, id: &str, status: BetStatus, result: Option<Value>) -> Result<()>;

    /// Bets in any of the given statuses, oldest first
    async fn bets_by_status(&self, statuses: &[BetStatus]) -> Result<Vec<BetRecord>>;

    async fn log_action(&self, entry: &LogEntry) -> Result<()>;

    /// Most recent entries first
    async fn recent_logs(&self, limit: usize) -> Result<Vec<LogEntry>>;

    async fn statistics(&self) -> Result<BetStatistics>;
}

/// Open the configured database, falling back to the JSON file
pub async fn open(config: &DatabaseConfig) -> Result<Arc<dyn BetStore>> {
    match SqliteStore::connect(&config.url).await {
        Ok(store) => {
            tracing::info!("Connected to database {}", config.url);
            Ok(Arc::new(store))
        }
        Err(e) => {
            tracing::warn!(
                "Database {} unavailable ({}), falling back to {}",
                config.url,
                e,
                config.fallback_file.display()
            );
            let store = JsonFileStore::open(&config.fallback_file).await?;
            Ok(Arc::new(store))
        }
    }
}
