//! Intake queue between message receipt and bet processing

use crate::error::{BotError, Result};
use crate::ingester::{is_bet_message, snippet, InboundMessage, MessageParser};
use crate::types::{BetPayload, QueuedBet};
use serde_json::Value;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Create an unbounded FIFO intake queue
pub fn intake_queue() -> (IntakeSender, IntakeReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        IntakeSender { tx, depth: depth.clone() },
        IntakeReceiver { rx, depth },
    )
}

/// Producer side; cheap to clone, usable from any task
#[derive(Clone)]
pub struct IntakeSender {
    tx: mpsc::UnboundedSender<QueuedBet>,
    depth: Arc<AtomicUsize>,
}

impl IntakeSender {
    pub fn push(&self, item: impl Into<QueuedBet>) -> Result<()> {
        self.tx
            .send(item.into())
            .map_err(|_| BotError::Session("intake queue closed".into()))?;
        self.depth.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Items waiting to be consumed
    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer side, owned by the processing loop
pub struct IntakeReceiver {
    rx: mpsc::UnboundedReceiver<QueuedBet>,
    depth: Arc<AtomicUsize>,
}

impl IntakeReceiver {
    /// Next item in arrival order; None once every sender is gone
    pub async fn next(&mut self) -> Option<QueuedBet> {
        let item = self.rx.recv().await?;
        self.depth.fetch_sub(1, Ordering::Relaxed);
        Some(item)
    }

    pub fn len(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Message-arrival handler handed to sources: classifies, parses and enqueues
#[derive(Clone)]
pub struct MessageSink {
    intake: IntakeSender,
    parser: Arc<MessageParser>,
    classify_first: bool,
}

impl MessageSink {
    pub fn new(intake: IntakeSender, parser: Arc<MessageParser>, classify_first: bool) -> Self {
        Self {
            intake,
            parser,
            classify_first,
        }
    }

    /// Handle one inbound message. Returns true when a bet was enqueued.
    pub fn deliver(&self, message: InboundMessage) -> bool {
        match message {
            InboundMessage::Text(text) => self.deliver_text(&text),
            InboundMessage::Structured(payload) => self.deliver_structured(payload),
        }
    }

    fn deliver_structured(&self, payload: BetPayload) -> bool {
        if payload.contains_key("raw_message") {
            return self.enqueue(QueuedBet::Payload(payload));
        }
        match payload.get("text").and_then(Value::as_str) {
            Some(text) => self.deliver_text(text),
            None => {
                tracing::debug!("Structured message without bet fields or text, ignoring");
                false
            }
        }
    }

    fn deliver_text(&self, text: &str) -> bool {
        tracing::debug!("New message received: {}", snippet(text, 50));

        if self.classify_first && !is_bet_message(text) {
            tracing::debug!("Message not classified as a bet, skipping");
            return false;
        }

        match self.parser.parse_message(text) {
            Some(bet) => {
                tracing::info!("New bet detected and queued: {} - {}", bet.horse_name, bet.race);
                self.enqueue(QueuedBet::Record(bet))
            }
            None => {
                tracing::debug!("No bet extracted from: {}", snippet(text, 50));
                false
            }
        }
    }

    fn enqueue(&self, item: QueuedBet) -> bool {
        match self.intake.push(item) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("Failed to enqueue bet: {}", e);
                false
            }
        }
    }
}
