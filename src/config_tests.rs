//! Tests for configuration

#[cfg(test)]
mod tests {
    use super::super::config::*;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    const VALID_TOKEN: &str = "123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw";

    #[test]
    fn test_betting_config_defaults() {
        let config: BettingConfig = toml::from_str("").unwrap();
        assert_eq!(config.default_stake, dec!(10));
        assert_eq!(config.min_stake, dec!(5));
        assert_eq!(config.max_stake, dec!(100));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_config_from_toml() {
        let toml_str = r#"
[telegram]
bot_token = "123456789:AAHdqTcvCH1vGWJxfSeofSAs0K5PALDsaw"
group_id = "-1001234567890"

[database]
url = "sqlite://relay.db"

[parser]
windowed_scan = false

[executor]
worker_url = "http://localhost:8080"
pause_between_bets_ms = 500
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.telegram.chat_id(), Some(-1001234567890));
        assert_eq!(config.telegram.poll_timeout_secs, 30);
        assert_eq!(config.database.url, "sqlite://relay.db");
        assert_eq!(config.database.fallback_file.to_str(), Some("bets.json"));
        assert!(!config.parser.windowed_scan);
        assert!(config.parser.classify_first);
        assert_eq!(config.executor.pause_between_bets(), Duration::from_millis(500));
        assert_eq!(config.executor.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.session.stop_timeout(), Duration::from_secs(5));
        assert_eq!(config.app.log_level, "info");
        assert!(config.telegram.validate().is_ok());
    }

    #[test]
    fn test_resolve_stake() {
        let config = BettingConfig::default();
        assert_eq!(config.resolve_stake(None), dec!(10));
        assert_eq!(config.resolve_stake(Some(dec!(20))), dec!(20));
        assert_eq!(config.resolve_stake(Some(dec!(500))), dec!(100));
        assert_eq!(config.resolve_stake(Some(dec!(1))), dec!(5));
        assert!(config.is_valid_stake(dec!(5)));
        assert!(!config.is_valid_stake(dec!(100.01)));
    }

    #[test]
    fn test_invalid_stake_bounds() {
        let config = BettingConfig {
            default_stake: dec!(10),
            min_stake: dec!(50),
            max_stake: dec!(20),
        };
        assert!(config.validate().is_err());

        let config = BettingConfig {
            default_stake: dec!(200),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_telegram_validation() {
        let mut config = TelegramConfig::default();
        assert!(config.validate().is_err());

        config.bot_token = VALID_TOKEN.into();
        config.group_id = "not-a-number".into();
        assert!(config.validate().is_err());

        config.group_id = "-100123".into();
        assert!(config.validate().is_ok());

        config.api_hash = Some("xyz".into());
        assert!(config.validate().is_err());
        config.api_hash = Some("0123456789abcdef0123456789abcdef".into());
        config.api_id = Some("0".into());
        assert!(config.validate().is_err());
        config.api_id = Some("12345".into());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_credential_validators() {
        assert!(is_valid_bot_token(VALID_TOKEN));
        assert!(!is_valid_bot_token("no-colon-here"));
        assert!(!is_valid_bot_token("abc:def"));

        assert!(is_valid_api_hash("0123456789ABCDEF0123456789abcdef"));
        assert!(!is_valid_api_hash("0123"));

        assert!(is_valid_api_id("42"));
        assert!(!is_valid_api_id("-42"));
        assert!(!is_valid_api_id("abc"));

        assert!(is_valid_group_id("-1001234567890"));
        assert!(is_valid_group_id("42"));
        assert!(!is_valid_group_id("group"));
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = Config::load(path.to_str().unwrap()).unwrap();
        assert!(config.betting.validate().is_ok());
        assert_eq!(config.session.stop_timeout_secs, 5);
    }
}
