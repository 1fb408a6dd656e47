//! Bet execution
//!
//! Queued bets are drained one at a time by a single worker which moves each
//! bet through `processing` to `completed` or `failed`, records the outcome
//! and writes an audit entry.

mod http;

#[cfg(test)]
mod tests;

pub use http::HttpWorkerExecutor;

use crate::config::ExecutorConfig;
use crate::error::{BotError, Result};
use crate::storage::BetStore;
use crate::types::{BetRecord, BetStatus, LogEntry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// Outcome of one placement attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ExecutionReport {
    pub fn ok(details: Option<Value>) -> Self {
        Self {
            success: true,
            error: None,
            details,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            details: None,
        }
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Something that can actually place a bet
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BetExecutor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Err means the attempt could not be made at all; a rejected bet is
    /// an Ok report with `success == false`.
    async fn place_bet(&self, bet: &BetRecord) -> Result<ExecutionReport>;
}

/// Logs the bet and reports success without contacting anything
pub struct DryRunExecutor;

#[async_trait]
impl BetExecutor for DryRunExecutor {
    fn name(&self) -> &'static str {
        "dry_run"
    }

    async fn place_bet(&self, bet: &BetRecord) -> Result<ExecutionReport> {
        tracing::info!(
            "[DRY RUN] Would place {} bet: {} stake {}",
            bet.bet_type,
            bet.summary(),
            bet.stake.map(|s| s.to_string()).unwrap_or_else(|| "-".into())
        );
        Ok(ExecutionReport::ok(Some(serde_json::json!({ "dry_run": true }))))
    }
}

/// Producer handle for the execution FIFO
#[derive(Clone)]
pub struct ExecutionQueue {
    tx: mpsc::UnboundedSender<BetRecord>,
    depth: Arc<AtomicUsize>,
}

pub struct ExecutionReceiver {
    rx: mpsc::UnboundedReceiver<BetRecord>,
    depth: Arc<AtomicUsize>,
}

impl ExecutionQueue {
    pub fn channel() -> (Self, ExecutionReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        let depth = Arc::new(AtomicUsize::new(0));
        (
            Self { tx, depth: depth.clone() },
            ExecutionReceiver { rx, depth },
        )
    }

    /// Append a persisted bet. Bets without an id cannot be tracked and are refused.
    pub fn enqueue(&self, bet: BetRecord) -> Result<()> {
        if bet.id.is_none() {
            return Err(BotError::InvalidBet(format!("{} has no id", bet.summary())));
        }
        self.tx
            .send(bet)
            .map_err(|_| BotError::Execution("execution queue closed".into()))?;
        self.depth.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ExecutionReceiver {
    async fn next(&mut self) -> Option<BetRecord> {
        let bet = self.rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::Relaxed);
        Some(bet)
    }
}

/// Single consumer of the execution queue
pub struct ExecutionWorker {
    executor: Arc<dyn BetExecutor>,
    store: Arc<dyn BetStore>,
    pause: Duration,
}

impl ExecutionWorker {
    pub fn new(executor: Arc<dyn BetExecutor>, store: Arc<dyn BetStore>, config: &ExecutorConfig) -> Self {
        Self {
            executor,
            store,
            pause: config.pause_between_bets(),
        }
    }

    /// Drain the queue until shutdown or until every producer is gone.
    /// Returns the number of bets attempted.
    pub async fn run(&self, mut rx: ExecutionReceiver, mut shutdown: oneshot::Receiver<()>) -> usize {
        tracing::info!("Execution worker started ({})", self.executor.name());
        let mut attempted = 0;

        loop {
            let bet = tokio::select! {
                biased;
                _ = &mut shutdown => break,
                bet = rx.next() => bet,
            };
            let Some(bet) = bet else {
                break;
            };

            attempted += 1;
            if let Err(e) = self.execute(bet).await {
                tracing::error!("Bet execution bookkeeping failed: {}", e);
            }

            if !self.pause.is_zero() {
                tokio::select! {
                    biased;
                    _ = &mut shutdown => break,
                    _ = tokio::time::sleep(self.pause) => {}
                }
            }
        }

        tracing::info!("Execution worker stopped after {} bet(s)", attempted);
        attempted
    }

    /// Place one bet and record the outcome
    pub async fn execute(&self, bet: BetRecord) -> Result<ExecutionReport> {
        let id = bet
            .id
            .clone()
            .ok_or_else(|| BotError::InvalidBet(format!("{} has no id", bet.summary())))?;

        self.store.update_status(&id, BetStatus::Processing, None).await?;
        tracing::info!("Placing bet {}: {}", id, bet.summary());

        let report = match self.executor.place_bet(&bet).await {
            Ok(report) => report,
            Err(e) => ExecutionReport::failed(e.to_string()),
        };

        let (status, action, description) = if report.success {
            (
                BetStatus::Completed,
                "bet_placed",
                format!("Bet placed: {}", bet.summary()),
            )
        } else {
            (
                BetStatus::Failed,
                "bet_failed",
                format!(
                    "Bet failed: {} ({})",
                    bet.summary(),
                    report.error.as_deref().unwrap_or("unknown error")
                ),
            )
        };

        self.store.update_status(&id, status, Some(report.to_value())).await?;
        self.store
            .log_action(
                &LogEntry::new(action, description)
                    .with_bet(Some(id.clone()))
                    .with_details(report.to_value()),
            )
            .await?;

        if report.success {
            tracing::info!("Bet {} completed", id);
        } else {
            tracing::warn!("Bet {} failed: {}", id, report.error.as_deref().unwrap_or("-"));
        }
        Ok(report)
    }
}
