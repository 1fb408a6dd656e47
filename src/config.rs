//! Configuration loading
//!
//! Values come from an optional TOML file, then `BETRELAY__SECTION__KEY`
//! environment variables, then the flat legacy variables
//! (`TELEGRAM_BOT_TOKEN`, `DEFAULT_STAKE`, ...).

use crate::error::{BotError, Result};
use regex::Regex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

static BOT_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+:[A-Za-z0-9_-]+$").expect("valid regex"));
static API_HASH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Fa-f0-9]{32}$").expect("valid regex"));

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub betting: BettingConfig,
    #[serde(default)]
    pub parser: ParserConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub executor: ExecutorConfig,
    #[serde(default)]
    pub app: AppConfig,
}

/// Legacy flat variables and the config keys they feed
const LEGACY_ENV: &[(&str, &str)] = &[
    ("TELEGRAM_BOT_TOKEN", "telegram.bot_token"),
    ("TELEGRAM_GROUP_ID", "telegram.group_id"),
    ("TELEGRAM_API_ID", "telegram.api_id"),
    ("TELEGRAM_API_HASH", "telegram.api_hash"),
    ("DEFAULT_STAKE", "betting.default_stake"),
    ("MIN_STAKE", "betting.min_stake"),
    ("MAX_STAKE", "betting.max_stake"),
    ("LOG_LEVEL", "app.log_level"),
];

impl Config {
    /// Load from file (optional) and environment
    pub fn load(path: &str) -> Result<Self> {
        dotenvy::dotenv().ok();

        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("BETRELAY")
                    .prefix_separator("__")
                    .separator("__"),
            );

        for (var, key) in LEGACY_ENV {
            builder = builder.set_override_option(*key, std::env::var(var).ok())?;
        }

        let config: Config = builder.build()?.try_deserialize()?;
        config.betting.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    #[serde(default)]
    pub bot_token: String,
    /// Chat the tips are posted in
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub api_id: Option<String>,
    #[serde(default)]
    pub api_hash: Option<String>,
    /// Long-poll timeout for getUpdates
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_api_base")]
    pub api_base: String,
}

fn default_poll_timeout() -> u64 {
    30
}

fn default_api_base() -> String {
    "https://api.telegram.org".to_string()
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            group_id: String::new(),
            api_id: None,
            api_hash: None,
            poll_timeout_secs: default_poll_timeout(),
            api_base: default_api_base(),
        }
    }
}

impl TelegramConfig {
    /// Fail-fast credential check run before connecting
    pub fn validate(&self) -> Result<()> {
        if self.bot_token.is_empty() || self.group_id.is_empty() {
            return Err(BotError::Config("telegram bot_token and group_id are required".into()));
        }
        if !is_valid_bot_token(&self.bot_token) {
            return Err(BotError::Config("telegram bot_token is malformed".into()));
        }
        if !is_valid_group_id(&self.group_id) {
            return Err(BotError::Config(format!("telegram group_id '{}' is not an integer", self.group_id)));
        }
        if let Some(api_id) = &self.api_id {
            if !is_valid_api_id(api_id) {
                return Err(BotError::Config("telegram api_id must be a positive integer".into()));
            }
        }
        if let Some(api_hash) = &self.api_hash {
            if !is_valid_api_hash(api_hash) {
                return Err(BotError::Config("telegram api_hash must be 32 hex characters".into()));
            }
        }
        Ok(())
    }

    pub fn chat_id(&self) -> Option<i64> {
        self.group_id.trim().parse().ok()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_url")]
    pub url: String,
    /// JSON file used when the database cannot be opened
    #[serde(default = "default_fallback_file")]
    pub fallback_file: PathBuf,
}

fn default_db_url() -> String {
    "sqlite://bets.db".to_string()
}

fn default_fallback_file() -> PathBuf {
    PathBuf::from("bets.json")
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_db_url(),
            fallback_file: default_fallback_file(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BettingConfig {
    #[serde(default = "default_stake")]
    pub default_stake: Decimal,
    #[serde(default = "default_min_stake")]
    pub min_stake: Decimal,
    #[serde(default = "default_max_stake")]
    pub max_stake: Decimal,
}

fn default_stake() -> Decimal {
    Decimal::from(10)
}

fn default_min_stake() -> Decimal {
    Decimal::from(5)
}

fn default_max_stake() -> Decimal {
    Decimal::from(100)
}

impl Default for BettingConfig {
    fn default() -> Self {
        Self {
            default_stake: default_stake(),
            min_stake: default_min_stake(),
            max_stake: default_max_stake(),
        }
    }
}

impl BettingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_stake <= Decimal::ZERO || self.min_stake > self.max_stake {
            return Err(BotError::Config(format!(
                "stake bounds invalid: min={} max={}",
                self.min_stake, self.max_stake
            )));
        }
        if !self.is_valid_stake(self.default_stake) {
            return Err(BotError::Config(format!(
                "default_stake {} outside [{}, {}]",
                self.default_stake, self.min_stake, self.max_stake
            )));
        }
        Ok(())
    }

    pub fn is_valid_stake(&self, stake: Decimal) -> bool {
        stake >= self.min_stake && stake <= self.max_stake
    }

    /// Resolve the stake to place: default when absent, clamped to bounds
    pub fn resolve_stake(&self, stake: Option<Decimal>) -> Decimal {
        stake
            .unwrap_or(self.default_stake)
            .clamp(self.min_stake, self.max_stake)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserConfig {
    /// Run the cheap classifier before the parser
    #[serde(default = "default_true")]
    pub classify_first: bool,
    /// Allow the last-resort windowed scan tier
    #[serde(default = "default_true")]
    pub windowed_scan: bool,
    /// Characters taken on each side of an `@odds` token by the windowed scan
    #[serde(default = "default_window_chars")]
    pub window_chars: usize,
}

fn default_true() -> bool {
    true
}

fn default_window_chars() -> usize {
    60
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            classify_first: true,
            windowed_scan: true,
            window_chars: default_window_chars(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_stop_timeout")]
    pub stop_timeout_secs: u64,
}

fn default_stop_timeout() -> u64 {
    5
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            stop_timeout_secs: default_stop_timeout(),
        }
    }
}

impl SessionConfig {
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_secs(self.stop_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutorConfig {
    /// Endpoint of the browser worker; dry-run when unset
    #[serde(default)]
    pub worker_url: Option<String>,
    #[serde(default = "default_pause_ms")]
    pub pause_between_bets_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

fn default_pause_ms() -> u64 {
    2000
}

fn default_request_timeout() -> u64 {
    60
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            worker_url: None,
            pause_between_bets_ms: default_pause_ms(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ExecutorConfig {
    pub fn pause_between_bets(&self) -> Duration {
        Duration::from_millis(self.pause_between_bets_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

pub fn is_valid_bot_token(token: &str) -> bool {
    BOT_TOKEN_RE.is_match(token)
}

pub fn is_valid_api_hash(hash: &str) -> bool {
    API_HASH_RE.is_match(hash)
}

pub fn is_valid_api_id(api_id: &str) -> bool {
    api_id.trim().parse::<i64>().map(|id| id > 0).unwrap_or(false)
}

/// Group ids are integers, negative for supergroups and channels
pub fn is_valid_group_id(group_id: &str) -> bool {
    group_id.trim().parse::<i64>().is_ok()
}
