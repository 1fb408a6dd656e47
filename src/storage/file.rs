//! Local JSON-file bet store, used when the database is unreachable

use super::BetStore;
use crate::error::{BotError, Result};
use crate::types::{BetRecord, BetStatistics, BetStatus, LogEntry};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredBet {
    bet: BetRecord,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct FileState {
    #[serde(default)]
    bets: Vec<StoredBet>,
    #[serde(default)]
    logs: Vec<LogEntry>,
}

pub struct JsonFileStore {
    path: PathBuf,
    state: Mutex<FileState>,
}

impl JsonFileStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let state = match tokio::fs::read_to_string(&path).await {
            Ok(contents) if contents.trim().is_empty() => FileState::default(),
            Ok(contents) => serde_json::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => FileState::default(),
            Err(e) => return Err(e.into()),
        };

        tracing::info!(
            "Using bet file {} ({} bets, {} log entries)",
            path.display(),
            state.bets.len(),
            state.logs.len()
        );
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Write through a temp file so a crash never leaves a truncated store
    async fn persist(&self, state: &FileState) -> Result<()> {
        let data = serde_json::to_vec_pretty(state)?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, data).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl BetStore for JsonFileStore {
    fn backend(&self) -> &'static str {
        "json_file"
    }

    async fn save(&self, bet: &BetRecord) -> Result<BetRecord> {
        let mut saved = bet.clone();
        let id = saved.id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        saved.assign_id(id.clone())?;

        let mut state = self.state.lock().await;
        if state.bets.iter().any(|b| b.bet.id.as_deref() == Some(id.as_str())) {
            return Err(BotError::InvalidBet(format!("bet {} already stored", id)));
        }
        state.bets.push(StoredBet {
            bet: saved.clone(),
            result: None,
            updated_at: None,
        });
        if let Err(e) = self.persist(&state).await {
            state.bets.pop();
            return Err(e);
        }

        tracing::info!("Bet saved to file: {} - {} (id {})", saved.horse_name, saved.race, id);
        Ok(saved)
    }

    async fn update_status(&self, id: &str, status: BetStatus, result: Option<Value>) -> Result<()> {
        let mut state = self.state.lock().await;
        let index = state
            .bets
            .iter()
            .position(|b| b.bet.id.as_deref() == Some(id))
            .ok_or_else(|| BotError::NotFound(id.to_string()))?;

        let mut updated = state.bets[index].clone();
        updated.bet.advance(status)?;
        updated.updated_at = Some(Utc::now());
        if result.is_some() {
            updated.result = result;
        }

        // Restored if the write fails
        let previous = std::mem::replace(&mut state.bets[index], updated);
        if let Err(e) = self.persist(&state).await {
            state.bets[index] = previous;
            return Err(e);
        }

        tracing::info!("Bet {} status updated to {}", id, status);
        Ok(())
    }

    async fn bets_by_status(&self, statuses: &[BetStatus]) -> Result<Vec<BetRecord>> {
        let state = self.state.lock().await;
        let mut bets: Vec<BetRecord> = state
            .bets
            .iter()
            .filter(|b| statuses.contains(&b.bet.status))
            .map(|b| b.bet.clone())
            .collect();
        bets.sort_by_key(|b| b.created_at);
        Ok(bets)
    }

    async fn log_action(&self, entry: &LogEntry) -> Result<()> {
        let mut entry = entry.clone();
        if entry.id.is_none() {
            entry.id = Some(Uuid::new_v4().to_string());
        }

        let mut state = self.state.lock().await;
        state.logs.push(entry);
        if let Err(e) = self.persist(&state).await {
            state.logs.pop();
            return Err(e);
        }
        Ok(())
    }

    async fn recent_logs(&self, limit: usize) -> Result<Vec<LogEntry>> {
        let state = self.state.lock().await;
        let mut logs = state.logs.clone();
        logs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        logs.truncate(limit);
        Ok(logs)
    }

    async fn statistics(&self) -> Result<BetStatistics> {
        let state = self.state.lock().await;
        let mut stats = BetStatistics::default();
        for stored in &state.bets {
            stats.total += 1;
            *stats.by_status.entry(stored.bet.status).or_insert(0) += 1;
        }
        Ok(stats)
    }
}
