//! Callback fan-out and the serial processing loop

use super::queue::IntakeReceiver;
use crate::error::Result;
use crate::ingester::snippet;
use crate::types::{BetPayload, BetRecord, QueuedBet};
use async_trait::async_trait;
use futures_util::FutureExt;
use parking_lot::RwLock;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Party interested in every dequeued bet (persistence, execution enqueue, UI)
#[async_trait]
pub trait BetHandler: Send + Sync {
    fn name(&self) -> &str;
    async fn handle(&self, bet: &BetRecord) -> Result<()>;
}

/// Adapts an async closure over a typed record
pub struct FnHandler<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> BetHandler for FnHandler<F>
where
    F: Fn(BetRecord) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, bet: &BetRecord) -> Result<()> {
        (self.f)(bet.clone()).await
    }
}

pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn BetHandler>
where
    F: Fn(BetRecord) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(FnHandler { name: name.into(), f })
}

/// Adapts an async closure over the mapping form of a bet
pub struct PayloadHandler<F> {
    name: String,
    f: F,
}

#[async_trait]
impl<F, Fut> BetHandler for PayloadHandler<F>
where
    F: Fn(BetPayload) -> Fut + Send + Sync,
    Fut: Future<Output = Result<()>> + Send,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, bet: &BetRecord) -> Result<()> {
        (self.f)(bet.to_dict()).await
    }
}

pub fn payload_handler<F, Fut>(name: impl Into<String>, f: F) -> Arc<dyn BetHandler>
where
    F: Fn(BetPayload) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    Arc::new(PayloadHandler { name: name.into(), f })
}

/// Outcome of running every handler for one bet
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<(String, String)>,
}

impl DispatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Ordered list of registered handlers, shared between the session and its loop
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: Arc<RwLock<Vec<Arc<dyn BetHandler>>>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, handler: Arc<dyn BetHandler>) {
        let mut handlers = self.handlers.write();
        handlers.push(handler);
        tracing::debug!("New bet handler registered. Total: {}", handlers.len());
    }

    pub fn len(&self) -> usize {
        self.handlers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run every handler in registration order, one at a time.
    /// A failing or panicking handler never stops the ones after it.
    pub async fn dispatch(&self, bet: &BetRecord) -> DispatchReport {
        let handlers: Vec<Arc<dyn BetHandler>> = self.handlers.read().clone();
        let mut report = DispatchReport::default();

        for handler in handlers {
            let outcome = AssertUnwindSafe(handler.handle(bet)).catch_unwind().await;
            let failure = match outcome {
                Ok(Ok(())) => {
                    report.succeeded.push(handler.name().to_string());
                    continue;
                }
                Ok(Err(e)) => e.to_string(),
                Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
            };

            tracing::error!(
                handler = handler.name(),
                bet_id = bet.id.as_deref().unwrap_or("-"),
                "Bet handler failed for {} ({}): {}",
                bet.summary(),
                snippet(&bet.raw_message, 60),
                failure
            );
            report.failed.push((handler.name().to_string(), failure));
        }

        report
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Consume the intake queue until cancelled or every producer is gone.
///
/// Cancellation is only observed while waiting for the next item; a bet
/// already dequeued always finishes its handler run. The receiver is
/// returned so a restarted session keeps whatever is still queued.
pub async fn run_processing_loop(
    mut intake: IntakeReceiver,
    dispatcher: Dispatcher,
    mut shutdown: oneshot::Receiver<()>,
    ready: Option<oneshot::Sender<()>>,
) -> IntakeReceiver {
    tracing::info!("Bet queue processor started");
    if let Some(ready) = ready {
        let _ = ready.send(());
    }

    loop {
        let item = tokio::select! {
            biased;
            _ = &mut shutdown => {
                tracing::info!("Bet queue processor cancelled");
                break;
            }
            item = intake.next() => item,
        };

        let Some(item) = item else {
            tracing::info!("Intake queue closed, processor exiting");
            break;
        };

        if let Err(panic) = AssertUnwindSafe(process_item(&dispatcher, item)).catch_unwind().await {
            tracing::error!(
                "Unexpected failure while processing queued bet: {}",
                panic_message(panic.as_ref())
            );
        }
    }

    intake
}

async fn process_item(dispatcher: &Dispatcher, item: QueuedBet) {
    let bet = match item.into_record() {
        Ok(bet) => bet,
        Err(e) => {
            tracing::warn!("Discarding malformed queued bet: {}", e);
            return;
        }
    };

    let report = dispatcher.dispatch(&bet).await;
    if report.all_succeeded() {
        tracing::debug!("Bet {} handled by {} handler(s)", bet.summary(), report.succeeded.len());
    } else {
        tracing::warn!(
            "Bet {} handled with {} failure(s) out of {}",
            bet.summary(),
            report.failed.len(),
            report.failed.len() + report.succeeded.len()
        );
    }
}
