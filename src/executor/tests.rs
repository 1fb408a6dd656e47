//! Unit tests for executor module

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::storage::SqliteStore;
    use rust_decimal_macros::dec;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn no_pause() -> ExecutorConfig {
        ExecutorConfig {
            pause_between_bets_ms: 0,
            ..Default::default()
        }
    }

    async fn queued_bet(store: &SqliteStore, horse: &str) -> BetRecord {
        let bet = BetRecord::new("R1 Kempton", horse, dec!(3.0), "raw").with_stake(Some(dec!(10)));
        let mut saved = store.save(&bet).await.unwrap();
        let id = saved.id.clone().unwrap();
        store.update_status(&id, BetStatus::Queued, None).await.unwrap();
        saved.advance(BetStatus::Queued).unwrap();
        saved
    }

    /// Accepts one connection and answers with the given status and body
    async fn one_shot_worker(status: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&request);
                if let Some(end) = text.find("\r\n\r\n") {
                    let length = text[..end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower.strip_prefix("content-length:").map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if request.len() >= end + 4 + length {
                        break;
                    }
                }
            }

            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
        });

        format!("http://{}", addr)
    }

    #[test]
    fn test_report_serialization_skips_empty_fields() {
        let report = ExecutionReport::ok(None);
        assert_eq!(report.to_value(), serde_json::json!({"success": true}));

        let failed = ExecutionReport::failed("odds moved");
        assert_eq!(failed.to_value()["error"], "odds moved");
    }

    #[test]
    fn test_queue_refuses_unsaved_bet() {
        let (queue, _rx) = ExecutionQueue::channel();
        let err = queue.enqueue(BetRecord::new("R1", "Nova", dec!(2), "raw")).unwrap_err();
        assert!(matches!(err, BotError::InvalidBet(_)));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_execute_success_completes_bet() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let bet = queued_bet(&store, "Nova").await;

        let mut executor = MockBetExecutor::new();
        executor.expect_name().return_const("mock");
        executor
            .expect_place_bet()
            .times(1)
            .returning(|_| Ok(ExecutionReport::ok(Some(serde_json::json!({"ticket": "A1"})))));

        let worker = ExecutionWorker::new(Arc::new(executor), store.clone(), &no_pause());
        let report = worker.execute(bet).await.unwrap();
        assert!(report.success);

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.count(BetStatus::Completed), 1);

        let logs = store.recent_logs(5).await.unwrap();
        assert_eq!(logs[0].action_type, "bet_placed");
        assert_eq!(logs[0].details.as_ref().unwrap()["details"]["ticket"], "A1");
    }

    #[tokio::test]
    async fn test_execute_error_marks_bet_failed() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let bet = queued_bet(&store, "Blaze").await;

        let mut executor = MockBetExecutor::new();
        executor.expect_name().return_const("mock");
        executor
            .expect_place_bet()
            .returning(|_| Err(BotError::Execution("site unreachable".into())));

        let worker = ExecutionWorker::new(Arc::new(executor), store.clone(), &no_pause());
        let report = worker.execute(bet).await.unwrap();
        assert!(!report.success);
        assert!(report.error.unwrap().contains("site unreachable"));

        let stats = store.statistics().await.unwrap();
        assert_eq!(stats.count(BetStatus::Failed), 1);
        let logs = store.recent_logs(1).await.unwrap();
        assert_eq!(logs[0].action_type, "bet_failed");
    }

    #[tokio::test]
    async fn test_execute_rejects_terminal_bet() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let bet = queued_bet(&store, "Ghost").await;
        let id = bet.id.clone().unwrap();
        store.update_status(&id, BetStatus::Failed, None).await.unwrap();

        let mut executor = MockBetExecutor::new();
        executor.expect_place_bet().never();

        let worker = ExecutionWorker::new(Arc::new(executor), store, &no_pause());
        let err = worker.execute(bet).await.unwrap_err();
        assert!(matches!(err, BotError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_worker_drains_in_order() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let (queue, rx) = ExecutionQueue::channel();
        for horse in ["First", "Second", "Third"] {
            queue.enqueue(queued_bet(&store, horse).await).unwrap();
        }
        assert_eq!(queue.len(), 3);
        drop(queue);

        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let mut executor = MockBetExecutor::new();
        executor.expect_name().return_const("mock");
        executor.expect_place_bet().returning(move |bet| {
            recorder.lock().push(bet.horse_name.clone());
            Ok(ExecutionReport::ok(None))
        });

        let worker = ExecutionWorker::new(Arc::new(executor), store.clone(), &no_pause());
        let (_shutdown_tx, shutdown_rx) = oneshot::channel();
        let attempted = worker.run(rx, shutdown_rx).await;

        assert_eq!(attempted, 3);
        assert_eq!(*seen.lock(), vec!["First", "Second", "Third"]);
        assert_eq!(store.statistics().await.unwrap().count(BetStatus::Completed), 3);
    }

    #[tokio::test]
    async fn test_worker_stops_on_shutdown() {
        let store = Arc::new(SqliteStore::in_memory().await.unwrap());
        let (_queue, rx) = ExecutionQueue::channel();
        let worker = ExecutionWorker::new(Arc::new(DryRunExecutor), store, &no_pause());

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let handle = tokio::spawn(async move { worker.run(rx, shutdown_rx).await });
        shutdown_tx.send(()).unwrap();

        let attempted = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(attempted, 0);
    }

    #[tokio::test]
    async fn test_dry_run_always_succeeds() {
        let bet = BetRecord::new("R2", "Dusk", dec!(6.5), "raw");
        let report = DryRunExecutor.place_bet(&bet).await.unwrap();
        assert!(report.success);
        assert_eq!(report.details.unwrap()["dry_run"], true);
    }

    #[tokio::test]
    async fn test_http_worker_accepts_bet() {
        let url = one_shot_worker("200 OK", r#"{"success":true,"ticket":"X9"}"#).await;
        let executor = HttpWorkerExecutor::new(&url, Duration::from_secs(5)).unwrap();

        let bet = BetRecord::new("R4", "Orbit", dec!(2.25), "raw");
        let report = executor.place_bet(&bet).await.unwrap();
        assert!(report.success);
        assert_eq!(report.details.unwrap()["ticket"], "X9");
    }

    #[tokio::test]
    async fn test_http_worker_rejection_is_failed_report() {
        let url = one_shot_worker("422 Unprocessable Entity", r#"{"error":"market closed"}"#).await;
        let executor = HttpWorkerExecutor::new(&url, Duration::from_secs(5)).unwrap();

        let bet = BetRecord::new("R4", "Orbit", dec!(2.25), "raw");
        let report = executor.place_bet(&bet).await.unwrap();
        assert!(!report.success);
        assert_eq!(report.error.as_deref(), Some("market closed"));
    }

    #[tokio::test]
    async fn test_http_worker_unreachable_is_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let executor = HttpWorkerExecutor::new(&format!("http://{}", addr), Duration::from_secs(2)).unwrap();
        let bet = BetRecord::new("R4", "Orbit", dec!(2.25), "raw");
        assert!(executor.place_bet(&bet).await.is_err());
    }
}
