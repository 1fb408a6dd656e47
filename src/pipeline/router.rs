//! Persists dequeued bets and hands them to execution

use super::dispatcher::BetHandler;
use crate::config::BettingConfig;
use crate::error::{BotError, Result};
use crate::executor::ExecutionQueue;
use crate::storage::BetStore;
use crate::types::{BetRecord, BetStatus, LogEntry};
use async_trait::async_trait;
use std::sync::Arc;

/// Saves each bet, applies the stake policy, marks it queued and enqueues
/// it for execution
pub struct BetRouter {
    store: Arc<dyn BetStore>,
    execution: ExecutionQueue,
    betting: BettingConfig,
}

impl BetRouter {
    pub fn new(store: Arc<dyn BetStore>, execution: ExecutionQueue, betting: BettingConfig) -> Self {
        Self {
            store,
            execution,
            betting,
        }
    }

    fn apply_stake(&self, bet: &mut BetRecord) {
        let resolved = self.betting.resolve_stake(bet.stake);
        match bet.stake {
            Some(requested) if requested != resolved => tracing::warn!(
                "Stake {} for {} outside [{}, {}], using {}",
                requested,
                bet.summary(),
                self.betting.min_stake,
                self.betting.max_stake,
                resolved
            ),
            None => tracing::debug!("Applying default stake {} to {}", resolved, bet.summary()),
            _ => {}
        }
        bet.stake = Some(resolved);
    }

    async fn queue_for_execution(&self, mut bet: BetRecord) -> Result<()> {
        let id = match bet.id.clone() {
            Some(id) => id,
            None => return Ok(()),
        };

        if bet.status == BetStatus::Pending {
            self.store.update_status(&id, BetStatus::Queued, None).await?;
            bet.advance(BetStatus::Queued)?;
        }

        let description = format!("Bet queued: {}", bet.summary());
        self.execution.enqueue(bet)?;
        self.store
            .log_action(&LogEntry::new("bet_queued", description).with_bet(Some(id)))
            .await?;
        Ok(())
    }

    /// Re-enqueue bets left `pending` or `queued` by a previous run.
    /// Returns how many were handed to execution.
    pub async fn requeue_unfinished(&self) -> Result<usize> {
        let unfinished = self
            .store
            .bets_by_status(&[BetStatus::Pending, BetStatus::Queued])
            .await?;
        if unfinished.is_empty() {
            return Ok(0);
        }

        tracing::info!("Resuming {} unfinished bet(s)", unfinished.len());
        let mut requeued = 0;
        for mut bet in unfinished {
            self.apply_stake(&mut bet);
            let summary = bet.summary();
            match self.queue_for_execution(bet).await {
                Ok(()) => requeued += 1,
                Err(e) => tracing::error!("Could not resume {}: {}", summary, e),
            }
        }
        Ok(requeued)
    }
}

#[async_trait]
impl BetHandler for BetRouter {
    fn name(&self) -> &str {
        "bet_router"
    }

    async fn handle(&self, bet: &BetRecord) -> Result<()> {
        if !matches!(bet.status, BetStatus::Pending | BetStatus::Queued) {
            return Err(BotError::InvalidBet(format!(
                "{} arrived as {}, only pending or queued bets are routed",
                bet.summary(),
                bet.status
            )));
        }

        let mut bet = bet.clone();
        self.apply_stake(&mut bet);

        let saved = if bet.id.is_some() {
            bet
        } else {
            self.store.save(&bet).await?
        };

        tracing::info!(
            "Bet {} saved via {}: {}",
            saved.id.as_deref().unwrap_or("-"),
            self.store.backend(),
            saved.summary()
        );
        self.queue_for_execution(saved).await
    }
}
