//! End-to-end relay tests: chat message in, completed bet out

#[cfg(test)]
mod tests {
    use crate::config::{BettingConfig, ExecutorConfig, ParserConfig, SessionConfig};
    use crate::executor::{DryRunExecutor, ExecutionQueue, ExecutionWorker};
    use crate::ingester::{ChannelSource, InboundMessage};
    use crate::pipeline::{BetRouter, SessionManager};
    use crate::storage::{BetStore, SqliteStore};
    use crate::types::BetStatus;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::oneshot;

    async fn wait_for_completed(store: &dyn BetStore, expected: u64) {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let stats = store.statistics().await.unwrap();
            if stats.count(BetStatus::Completed) >= expected {
                return;
            }
            assert!(tokio::time::Instant::now() < deadline, "bets not completed in time: {:?}", stats);
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }

    #[tokio::test]
    async fn test_message_to_completed_bet() {
        let store: Arc<dyn BetStore> = Arc::new(SqliteStore::in_memory().await.unwrap());
        let executor_config = ExecutorConfig {
            pause_between_bets_ms: 0,
            ..Default::default()
        };

        let (execution, execution_rx) = ExecutionQueue::channel();
        let worker = ExecutionWorker::new(Arc::new(DryRunExecutor), store.clone(), &executor_config);
        let (worker_stop, worker_shutdown) = oneshot::channel();
        let worker_handle = tokio::spawn(async move { worker.run(execution_rx, worker_shutdown).await });

        let (source, feed) = ChannelSource::new("integration");
        let mut session = SessionManager::new(Arc::new(source), &ParserConfig::default(), SessionConfig::default());
        session.register_callback(Arc::new(BetRouter::new(
            store.clone(),
            execution.clone(),
            BettingConfig::default(),
        )));
        session.start().await.unwrap();

        feed.send(InboundMessage::text("Race: City Cup\nHorse: Storm\nOdds: 2.5\nStake: 20")).unwrap();
        feed.send(InboundMessage::text("good morning everyone, nice weather today")).unwrap();
        feed.send(InboundMessage::text("Bet: Derby - Thunder @ 3.2")).unwrap();

        wait_for_completed(store.as_ref(), 2).await;
        session.stop().await;

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.count(BetStatus::Completed), 2);

        let done = store.bets_by_status(&[BetStatus::Completed]).await.unwrap();
        let storm = done.iter().find(|b| b.horse_name == "Storm").unwrap();
        assert_eq!(storm.stake, Some(dec!(20)));
        let thunder = done.iter().find(|b| b.horse_name == "Thunder").unwrap();
        assert_eq!(thunder.stake, Some(dec!(10)));

        let actions: Vec<String> = store
            .recent_logs(10)
            .await
            .unwrap()
            .into_iter()
            .map(|l| l.action_type)
            .collect();
        assert_eq!(actions.iter().filter(|a| *a == "bet_queued").count(), 2);
        assert_eq!(actions.iter().filter(|a| *a == "bet_placed").count(), 2);

        worker_stop.send(()).unwrap();
        assert_eq!(worker_handle.await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_unfinished_bets_resume_after_restart() {
        let store: Arc<dyn BetStore> = Arc::new(SqliteStore::in_memory().await.unwrap());
        let leftover = crate::types::BetRecord::new("Oaks", "Lumen", dec!(5.5), "Bet: Oaks - Lumen @ 5.5");
        store.save(&leftover).await.unwrap();

        let (execution, execution_rx) = ExecutionQueue::channel();
        let router = BetRouter::new(store.clone(), execution.clone(), BettingConfig::default());
        assert_eq!(router.requeue_unfinished().await.unwrap(), 1);
        drop(router);
        drop(execution);

        let worker = ExecutionWorker::new(
            Arc::new(DryRunExecutor),
            store.clone(),
            &ExecutorConfig {
                pause_between_bets_ms: 0,
                ..Default::default()
            },
        );
        let (_stop, shutdown) = oneshot::channel();
        assert_eq!(worker.run(execution_rx, shutdown).await, 1);

        let done = store.bets_by_status(&[BetStatus::Completed]).await.unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].horse_name, "Lumen");
    }
}
