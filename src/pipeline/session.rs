//! Session lifecycle: source connection plus the processing loop

use super::dispatcher::{payload_handler, run_processing_loop, BetHandler, Dispatcher};
use super::queue::{intake_queue, IntakeReceiver, IntakeSender, MessageSink};
use crate::config::{ParserConfig, SessionConfig};
use crate::error::{BotError, Result};
use crate::ingester::{MessageParser, MessageSource};
use crate::types::BetPayload;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

struct RunningSession {
    shutdown: oneshot::Sender<()>,
    processor: JoinHandle<IntakeReceiver>,
    listener: JoinHandle<()>,
}

/// Owns the message source connection and the queue-processing task
pub struct SessionManager {
    source: Arc<dyn MessageSource>,
    dispatcher: Dispatcher,
    parser: Arc<MessageParser>,
    classify_first: bool,
    config: SessionConfig,
    intake_tx: IntakeSender,
    intake_rx: Option<IntakeReceiver>,
    running: Option<RunningSession>,
}

impl SessionManager {
    pub fn new(source: Arc<dyn MessageSource>, parser_config: &ParserConfig, config: SessionConfig) -> Self {
        let (intake_tx, intake_rx) = intake_queue();
        Self {
            source,
            dispatcher: Dispatcher::new(),
            parser: Arc::new(MessageParser::new(parser_config)),
            classify_first: parser_config.classify_first,
            config,
            intake_tx,
            intake_rx: Some(intake_rx),
            running: None,
        }
    }

    /// Append a handler to the dispatch list. Safe before or after `start`.
    pub fn register_callback(&self, handler: Arc<dyn BetHandler>) {
        self.dispatcher.register(handler);
    }

    /// Subscribe with a closure receiving the mapping form of each bet
    pub fn add_bet_handler<F, Fut>(&self, name: impl Into<String>, handler: F)
    where
        F: Fn(BetPayload) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        self.dispatcher.register(payload_handler(name, handler));
    }

    /// Producer handle wired to the current intake queue
    pub fn sink(&self) -> MessageSink {
        MessageSink::new(self.intake_tx.clone(), self.parser.clone(), self.classify_first)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    pub fn queued(&self) -> usize {
        self.intake_tx.len()
    }

    /// Connect the source, spawn the processing loop and the listener.
    /// Returns once the loop has confirmed it is running.
    pub async fn start(&mut self) -> Result<()> {
        if self.running.is_some() {
            return Err(BotError::Session("session already running".into()));
        }

        if let Err(e) = self.source.connect().await {
            tracing::error!("Failed to connect message source {}: {}", self.source.name(), e);
            return Err(e);
        }

        let intake = match self.intake_rx.take() {
            Some(rx) => rx,
            None => {
                let (tx, rx) = intake_queue();
                self.intake_tx = tx;
                rx
            }
        };

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (ready_tx, ready_rx) = oneshot::channel();
        let processor = tokio::spawn(run_processing_loop(
            intake,
            self.dispatcher.clone(),
            shutdown_rx,
            Some(ready_tx),
        ));

        if ready_rx.await.is_err() {
            processor.abort();
            if let Err(e) = self.source.disconnect().await {
                tracing::warn!("Failed to disconnect {} after aborted start: {}", self.source.name(), e);
            }
            return Err(BotError::Session("processing loop failed to start".into()));
        }

        let source = self.source.clone();
        let sink = self.sink();
        let listener = tokio::spawn(async move {
            if let Err(e) = source.listen(sink).await {
                tracing::error!("Message source {} stopped: {}", source.name(), e);
            }
        });

        self.running = Some(RunningSession {
            shutdown: shutdown_tx,
            processor,
            listener,
        });

        tracing::info!(
            "Session started on {} with {} handler(s)",
            self.source.name(),
            self.dispatcher.len()
        );
        Ok(())
    }

    /// Cancel the processing loop (bounded wait), then disconnect the source.
    /// No-op when not running.
    pub async fn stop(&mut self) {
        let Some(mut running) = self.running.take() else {
            tracing::debug!("Session stop requested while not running");
            return;
        };

        let _ = running.shutdown.send(());
        let timeout = self.config.stop_timeout();
        match tokio::time::timeout(timeout, &mut running.processor).await {
            Ok(Ok(intake)) => self.intake_rx = Some(intake),
            Ok(Err(e)) => tracing::error!("Bet queue processor ended abnormally: {}", e),
            Err(_) => {
                tracing::warn!("Bet queue processor did not stop within {:?}, aborting", timeout);
                running.processor.abort();
            }
        }

        if let Err(e) = self.source.disconnect().await {
            tracing::warn!("Failed to disconnect {}: {}", self.source.name(), e);
        }
        running.listener.abort();

        tracing::info!("Session stopped");
    }
}
