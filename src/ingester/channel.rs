//! In-process message source fed through a channel (replay, tests)

use super::{InboundMessage, MessageSource};
use crate::error::{BotError, Result};
use crate::pipeline::MessageSink;
use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};

pub struct ChannelSource {
    name: String,
    rx: Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
    connected: watch::Sender<bool>,
    reject: Option<String>,
}

impl ChannelSource {
    /// Source plus the sender used to feed it
    pub fn new(name: impl Into<String>) -> (Self, mpsc::UnboundedSender<InboundMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (connected, _) = watch::channel(false);
        let source = Self {
            name: name.into(),
            rx: Mutex::new(rx),
            connected,
            reject: None,
        };
        (source, tx)
    }

    /// Source whose `connect` always fails with the given reason
    pub fn rejecting(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let (source, _tx) = Self::new(name);
        Self {
            reject: Some(reason.into()),
            ..source
        }
    }

    pub fn is_connected(&self) -> bool {
        *self.connected.borrow()
    }
}

#[async_trait]
impl MessageSource for ChannelSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn connect(&self) -> Result<()> {
        if let Some(reason) = &self.reject {
            return Err(BotError::Connection(reason.clone()));
        }
        self.connected.send_replace(true);
        tracing::info!("Channel source {} connected", self.name);
        Ok(())
    }

    async fn listen(&self, sink: MessageSink) -> Result<()> {
        let mut state = self.connected.subscribe();
        let mut rx = self.rx.lock().await;

        loop {
            if !*state.borrow_and_update() {
                break;
            }
            tokio::select! {
                msg = rx.recv() => match msg {
                    Some(msg) => {
                        sink.deliver(msg);
                    }
                    None => {
                        tracing::debug!("Channel source {} drained", self.name);
                        break;
                    }
                },
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.send_replace(false);
        tracing::info!("Channel source {} disconnected", self.name);
        Ok(())
    }
}
