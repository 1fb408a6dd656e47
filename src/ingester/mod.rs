//! Chat message ingestion
//!
//! Sources deliver raw chat messages to a [`MessageSink`]; the classifier
//! gates obvious noise and the parser turns tips into [`BetRecord`]s.
//!
//! [`BetRecord`]: crate::types::BetRecord

pub mod channel;
pub mod classifier;
pub mod parser;
pub mod telegram;


pub use channel::ChannelSource;
pub use classifier::{classify, is_bet_message, Classification};
pub use parser::{parse_message, Confidence, MessageParser, ParsedBet, TierStrategy};
pub use telegram::TelegramBotSource;

use crate::error::Result;
use crate::pipeline::MessageSink;
use crate::types::BetPayload;
use async_trait::async_trait;

/// A message as received from a source
#[derive(Debug, Clone)]
pub enum InboundMessage {
    /// Plain chat text, still to be classified and parsed
    Text(String),
    /// Already structured bet fields
    Structured(BetPayload),
}

impl InboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        InboundMessage::Text(text.into())
    }
}

/// Source of raw chat messages (Telegram, replay files, tests)
#[async_trait]
pub trait MessageSource: Send + Sync {
    fn name(&self) -> &str;

    /// Establish the connection. Fails fast on missing or rejected credentials.
    async fn connect(&self) -> Result<()>;

    /// Deliver messages to the sink until disconnected
    async fn listen(&self, sink: MessageSink) -> Result<()>;

    async fn disconnect(&self) -> Result<()>;
}

/// First `max_chars` characters of a message, for log context
pub fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.trim().replace('\n', " | ");
    match flat.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &flat[..idx]),
        None => flat,
    }
}
