//! Telegram group monitoring over the Bot API
//!
//! Long-polls `getUpdates` and forwards text (or media captions) posted in
//! the configured group to the sink.

use super::{InboundMessage, MessageSource};
use crate::config::TelegramConfig;
use crate::error::{BotError, Result};
use crate::pipeline::MessageSink;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tokio::sync::watch;

const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Telegram Bot API source for a single group
pub struct TelegramBotSource {
    config: TelegramConfig,
    http: reqwest::Client,
    connected: watch::Sender<bool>,
    /// Next update id to request; survives reconnects so nothing is redelivered
    offset: AtomicI64,
}

impl TelegramBotSource {
    pub fn new(config: TelegramConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs + 10))
            .build()?;
        let (connected, _) = watch::channel(false);

        Ok(Self {
            config,
            http,
            connected,
            offset: AtomicI64::new(0),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token,
            method
        )
    }

    async fn call(&self, method: &str, query: &[(&str, String)]) -> Result<Value> {
        let data: Value = self
            .http
            .get(self.method_url(method))
            .query(query)
            .send()
            .await?
            .json()
            .await?;

        if data["ok"].as_bool() != Some(true) {
            let reason = data["description"].as_str().unwrap_or("request rejected");
            return Err(BotError::Connection(format!("{} failed: {}", method, reason)));
        }
        Ok(data["result"].clone())
    }

    async fn poll_once(&self, sink: &MessageSink, chat_id: i64) -> Result<usize> {
        let offset = self.offset.load(Ordering::Relaxed);
        let updates = self
            .call(
                "getUpdates",
                &[
                    ("offset", offset.to_string()),
                    ("timeout", self.config.poll_timeout_secs.to_string()),
                    ("allowed_updates", r#"["message","channel_post"]"#.to_string()),
                ],
            )
            .await?;

        let batch = extract_messages(&updates, chat_id);
        if let Some(last) = batch.last_update_id {
            self.offset.store(last + 1, Ordering::Relaxed);
        }

        let mut enqueued = 0;
        for text in batch.texts {
            if sink.deliver(InboundMessage::Text(text)) {
                enqueued += 1;
            }
        }
        Ok(enqueued)
    }
}

/// Texts from one `getUpdates` result that belong to the watched chat
#[derive(Debug, Default, PartialEq)]
pub struct UpdateBatch {
    pub texts: Vec<String>,
    pub last_update_id: Option<i64>,
}

pub fn extract_messages(updates: &Value, chat_id: i64) -> UpdateBatch {
    let mut batch = UpdateBatch::default();
    let Some(updates) = updates.as_array() else {
        return batch;
    };

    for update in updates {
        if let Some(update_id) = update["update_id"].as_i64() {
            batch.last_update_id = Some(batch.last_update_id.map_or(update_id, |last| last.max(update_id)));
        }

        let Some(message) = update.get("message").or_else(|| update.get("channel_post")) else {
            continue;
        };
        if message["chat"]["id"].as_i64() != Some(chat_id) {
            continue;
        }

        let text = message["text"].as_str().or_else(|| message["caption"].as_str());
        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
            batch.texts.push(text.to_string());
        }
    }

    batch
}

#[async_trait]
impl MessageSource for TelegramBotSource {
    fn name(&self) -> &str {
        "telegram_bot"
    }

    async fn connect(&self) -> Result<()> {
        self.config.validate()?;

        let me = self.call("getMe", &[]).await.map_err(|e| match e {
            BotError::Http(e) => BotError::Connection(format!("Telegram unreachable: {}", e)),
            other => other,
        })?;

        tracing::info!(
            "Connected to Telegram as @{}",
            me["username"].as_str().unwrap_or("unknown")
        );
        self.connected.send_replace(true);
        Ok(())
    }

    async fn listen(&self, sink: MessageSink) -> Result<()> {
        let chat_id = self
            .config
            .chat_id()
            .ok_or_else(|| BotError::Config(format!("invalid group_id '{}'", self.config.group_id)))?;
        let mut state = self.connected.subscribe();

        tracing::info!("Monitoring Telegram group {}", chat_id);

        while *state.borrow_and_update() {
            tokio::select! {
                result = self.poll_once(&sink, chat_id) => match result {
                    Ok(0) => {}
                    Ok(n) => tracing::debug!("Queued {} bet(s) from Telegram", n),
                    Err(e) => {
                        tracing::warn!("Telegram API error: {}", e);
                        tokio::select! {
                            _ = tokio::time::sleep(RETRY_DELAY) => {}
                            _ = state.changed() => {}
                        }
                    }
                },
                changed = state.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        tracing::info!("Telegram listener stopped");
        Ok(())
    }

    async fn disconnect(&self) -> Result<()> {
        self.connected.send_replace(false);
        tracing::info!("Disconnected from Telegram");
        Ok(())
    }
}
