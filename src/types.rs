//! Core bet types shared by the ingester, pipeline, storage and executor

use crate::error::{BotError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Loosely-typed bet payload, the mapping shape handed across component boundaries
pub type BetPayload = Map<String, Value>;

/// Default bet category when a message does not name one
pub const DEFAULT_BET_TYPE: &str = "win";

/// Lifecycle marker of a bet
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Pending,
    Queued,
    Processing,
    Completed,
    Failed,
}

impl BetStatus {
    pub const ALL: [BetStatus; 5] = [
        BetStatus::Pending,
        BetStatus::Queued,
        BetStatus::Processing,
        BetStatus::Completed,
        BetStatus::Failed,
    ];

    fn rank(self) -> u8 {
        match self {
            BetStatus::Pending => 0,
            BetStatus::Queued => 1,
            BetStatus::Processing => 2,
            BetStatus::Completed | BetStatus::Failed => 3,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, BetStatus::Completed | BetStatus::Failed)
    }

    /// Statuses only move forward; terminal statuses accept nothing
    pub fn can_transition_to(self, next: BetStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BetStatus::Pending => "pending",
            BetStatus::Queued => "queued",
            BetStatus::Processing => "processing",
            BetStatus::Completed => "completed",
            BetStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BetStatus {
    type Err = BotError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(BetStatus::Pending),
            "queued" => Ok(BetStatus::Queued),
            "processing" => Ok(BetStatus::Processing),
            "completed" => Ok(BetStatus::Completed),
            "failed" => Ok(BetStatus::Failed),
            other => Err(BotError::InvalidBet(format!("unknown status '{}'", other))),
        }
    }
}

/// One wagering intent extracted from a chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BetRecord {
    /// Assigned by the store on first save
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Event identifier
    pub race: String,
    /// Participant identifier
    pub horse_name: String,
    /// Quoted price, always positive
    pub odds: Decimal,
    /// None means "apply the configured default stake"
    pub stake: Option<Decimal>,
    pub bet_type: String,
    /// Original message text, kept for audit
    pub raw_message: String,
    pub status: BetStatus,
    pub created_at: DateTime<Utc>,
}

impl BetRecord {
    pub fn new(
        race: impl Into<String>,
        horse_name: impl Into<String>,
        odds: Decimal,
        raw_message: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            race: race.into(),
            horse_name: horse_name.into(),
            odds,
            stake: None,
            bet_type: DEFAULT_BET_TYPE.to_string(),
            raw_message: raw_message.into(),
            status: BetStatus::Pending,
            created_at: Utc::now(),
        }
    }

    pub fn with_stake(mut self, stake: Option<Decimal>) -> Self {
        self.stake = stake;
        self
    }

    pub fn with_bet_type(mut self, bet_type: impl Into<String>) -> Self {
        self.bet_type = bet_type.into();
        self
    }

    /// Check the invariants every emitted record must hold
    pub fn validate(&self) -> Result<()> {
        if self.race.trim().is_empty() {
            return Err(BotError::InvalidBet("race is empty".into()));
        }
        if self.horse_name.trim().is_empty() {
            return Err(BotError::InvalidBet("horse_name is empty".into()));
        }
        if self.odds <= Decimal::ZERO {
            return Err(BotError::InvalidBet(format!("odds must be positive, got {}", self.odds)));
        }
        if let Some(stake) = self.stake {
            if stake <= Decimal::ZERO {
                return Err(BotError::InvalidBet(format!("stake must be positive, got {}", stake)));
            }
        }
        Ok(())
    }

    /// Move the status forward
    pub fn advance(&mut self, next: BetStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(BotError::InvalidTransition { from: self.status, to: next });
        }
        self.status = next;
        Ok(())
    }

    /// Record the store-assigned id. Re-assigning the same id is a no-op.
    pub fn assign_id(&mut self, id: impl Into<String>) -> Result<()> {
        let id = id.into();
        match &self.id {
            Some(existing) if *existing != id => Err(BotError::InvalidBet(format!(
                "id already assigned ({}), refusing {}",
                existing, id
            ))),
            _ => {
                self.id = Some(id);
                Ok(())
            }
        }
    }

    /// Short human-readable form for logs
    pub fn summary(&self) -> String {
        format!("{} - {} @ {}", self.horse_name, self.race, self.odds)
    }

    pub fn to_dict(&self) -> BetPayload {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => BetPayload::new(),
        }
    }

    /// Build a record from a payload, applying defaults and validating
    pub fn from_dict(payload: &BetPayload) -> Result<Self> {
        let fields: PayloadFields = serde_json::from_value(Value::Object(payload.clone()))?;

        let bet_type = fields
            .bet_type
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| DEFAULT_BET_TYPE.to_string());

        let record = BetRecord {
            id: fields.id,
            race: fields.race.trim().to_string(),
            horse_name: fields.horse_name.trim().to_string(),
            odds: fields.odds,
            stake: fields.stake,
            bet_type,
            raw_message: fields.raw_message,
            status: fields.status.unwrap_or(BetStatus::Pending),
            created_at: fields.created_at.unwrap_or_else(Utc::now),
        };
        record.validate()?;
        Ok(record)
    }
}

#[derive(Deserialize)]
struct PayloadFields {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    race: String,
    #[serde(default)]
    horse_name: String,
    odds: Decimal,
    #[serde(default)]
    stake: Option<Decimal>,
    #[serde(default)]
    bet_type: Option<String>,
    #[serde(default)]
    raw_message: String,
    #[serde(default)]
    status: Option<BetStatus>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

/// Item carried by the intake queue: either an untyped payload or a typed record
#[derive(Debug, Clone)]
pub enum QueuedBet {
    Payload(BetPayload),
    Record(BetRecord),
}

impl QueuedBet {
    /// Normalize to a single record shape at the consumption boundary
    pub fn into_record(self) -> Result<BetRecord> {
        match self {
            QueuedBet::Payload(payload) => BetRecord::from_dict(&payload),
            QueuedBet::Record(record) => {
                record.validate()?;
                Ok(record)
            }
        }
    }
}

impl From<BetRecord> for QueuedBet {
    fn from(record: BetRecord) -> Self {
        QueuedBet::Record(record)
    }
}

impl From<BetPayload> for QueuedBet {
    fn from(payload: BetPayload) -> Self {
        QueuedBet::Payload(payload)
    }
}

/// Audit log entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub action_type: String,
    pub description: String,
    #[serde(default)]
    pub bet_id: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
    pub created_at: DateTime<Utc>,
}

impl LogEntry {
    pub fn new(action_type: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: None,
            action_type: action_type.into(),
            description: description.into(),
            bet_id: None,
            details: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_bet(mut self, bet_id: Option<String>) -> Self {
        self.bet_id = bet_id;
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Bet counts by status
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BetStatistics {
    pub total: u64,
    pub by_status: BTreeMap<BetStatus, u64>,
}

impl BetStatistics {
    pub fn count(&self, status: BetStatus) -> u64 {
        self.by_status.get(&status).copied().unwrap_or(0)
    }
}
