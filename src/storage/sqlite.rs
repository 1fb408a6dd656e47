//! SQLite-backed bet store

use super::BetStore;
use crate::error::{BotError, Result};
use crate::types::{BetRecord, BetStatistics, BetStatus, LogEntry};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use uuid::Uuid;

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub async fn connect(url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    /// Private in-memory database, one connection kept alive
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None::<std::time::Duration>)
            .max_lifetime(None::<std::time::Duration>)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.initialize().await?;
        Ok(store)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS bets (
                id TEXT PRIMARY KEY,
                race TEXT NOT NULL,
                horse_name TEXT NOT NULL,
                odds TEXT NOT NULL,
                stake TEXT,
                bet_type TEXT NOT NULL DEFAULT 'win',
                raw_message TEXT NOT NULL DEFAULT '',
                status TEXT NOT NULL DEFAULT 'pending',
                result TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS logs (
                id TEXT PRIMARY KEY,
                action_type TEXT NOT NULL,
                description TEXT NOT NULL,
                bet_id TEXT REFERENCES bets(id),
                details TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        for index in [
            "CREATE INDEX IF NOT EXISTS idx_bets_status ON bets(status)",
            "CREATE INDEX IF NOT EXISTS idx_bets_created_at ON bets(created_at)",
            "CREATE INDEX IF NOT EXISTS idx_logs_created_at ON logs(created_at)",
            "CREATE INDEX IF NOT EXISTS idx_logs_bet_id ON logs(bet_id)",
        ] {
            sqlx::query(index).execute(&self.pool).await?;
        }

        Ok(())
    }
}

fn timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| BotError::Internal(format!("bad timestamp '{}': {}", raw, e)))
}

fn parse_stored_decimal(raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw).map_err(|e| BotError::Internal(format!("bad decimal '{}': {}", raw, e)))
}

fn row_to_bet(row: &SqliteRow) -> Result<BetRecord> {
    let stake: Option<String> = row.try_get("stake")?;
    let status: String = row.try_get("status")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(BetRecord {
        id: Some(row.try_get("id")?),
        race: row.try_get("race")?,
        horse_name: row.try_get("horse_name")?,
        odds: parse_stored_decimal(&row.try_get::<String, _>("odds")?)?,
        stake: stake.as_deref().map(parse_stored_decimal).transpose()?,
        bet_type: row.try_get("bet_type")?,
        raw_message: row.try_get("raw_message")?,
        status: status.parse()?,
        created_at: parse_timestamp(&created_at)?,
    })
}

fn row_to_log(row: &SqliteRow) -> Result<LogEntry> {
    let details: Option<String> = row.try_get("details")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(LogEntry {
        id: Some(row.try_get("id")?),
        action_type: row.try_get("action_type")?,
        description: row.try_get("description")?,
        bet_id: row.try_get("bet_id")?,
        details: details.as_deref().map(serde_json::from_str::<Value>).transpose()?,
        created_at: parse_timestamp(&created_at)?,
    })
}

#[async_trait]
impl BetStore for SqliteStore {
    fn backend(&self) -> &'static str {
        "sqlite"
    }

    async fn save(&self, bet: &BetRecord) -> Result<BetRecord> {
        let mut saved = bet.clone();
        let id = saved.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        saved.assign_id(id.clone())?;

        sqlx::query(
            r#"
            INSERT INTO bets (id, race, horse_name, odds, stake, bet_type, raw_message, status, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&saved.race)
        .bind(&saved.horse_name)
        .bind(saved.odds.to_string())
        .bind(saved.stake.map(|s| s.to_string()))
        .bind(&saved.bet_type)
        .bind(&saved.raw_message)
        .bind(saved.status.as_str())
        .bind(timestamp(&saved.created_at))
        .execute(&self.pool)
        .await?;

        tracing::info!("Bet saved: {} - {} (id {})", saved.horse_name, saved.race, id);
        Ok(saved)
    }

    async fn update_status(&self, id: &str, status: BetStatus, result: Option<Value>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let current: Option<String> = sqlx::query_scalar("SELECT status FROM bets WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        let current: BetStatus = current.ok_or_else(|| BotError::NotFound(id.to_string()))?.parse()?;

        if !current.can_transition_to(status) {
            return Err(BotError::InvalidTransition { from: current, to: status });
        }

        let result = result.map(|r| r.to_string());
        sqlx::query("UPDATE bets SET status = ?, updated_at = ?, result = COALESCE(?, result) WHERE id = ?")
            .bind(status.as_str())
            .bind(timestamp(&Utc::now()))
            .bind(result)
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!("Bet {} status updated to {}", id, status);
        Ok(())
    }

    async fn bets_by_status(&self, statuses: &[BetStatus]) -> Result<Vec<BetRecord>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let sql = format!(
            "SELECT * FROM bets WHERE status IN ({}) ORDER BY created_at ASC",
            placeholders
        );
        let mut query = sqlx::query(&sql);
        for status in statuses {
            query = query.bind(status.as_str());
        }

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_bet).collect()
    }

    async fn log_action(&self, entry: &LogEntry) -> Result<()> {
        let id = entry.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        sqlx::query(
            r#"
            INSERT INTO logs (id, action_type, description, bet_id, details, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&entry.action_type)
        .bind(&entry.description)
        .bind(&entry.bet_id)
        .bind(entry.details.as_ref().map(|d| d.to_string()))
        .bind(timestamp(&entry.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn recent_logs(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let rows = sqlx::query("SELECT * FROM logs ORDER BY created_at DESC LIMIT ?")
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(row_to_log).collect()
    }

    async fn statistics(&self) -> Result<BetStatistics> {
        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM bets GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        let mut stats = BetStatistics::default();
        for (status, count) in rows {
            let count = u64::try_from(count).unwrap_or(0);
            stats.total += count;
            *stats.by_status.entry(status.parse()?).or_insert(0) += count;
        }
        Ok(stats)
    }
}
