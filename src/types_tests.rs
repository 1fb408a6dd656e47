//! Tests for core types

#[cfg(test)]
mod tests {
    use super::super::error::BotError;
    use super::super::types::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    fn sample() -> BetRecord {
        BetRecord::new("City Cup", "Storm", dec!(2.5), "Race: City Cup\nHorse: Storm\nOdds: 2.5")
    }

    #[test]
    fn test_status_serialization() {
        assert_eq!(serde_json::to_string(&BetStatus::Pending).unwrap(), "\"pending\"");
        assert_eq!(serde_json::to_string(&BetStatus::Completed).unwrap(), "\"completed\"");
        let failed: BetStatus = serde_json::from_str("\"failed\"").unwrap();
        assert_eq!(failed, BetStatus::Failed);
    }

    #[test]
    fn test_status_from_str() {
        for status in BetStatus::ALL {
            assert_eq!(status.as_str().parse::<BetStatus>().unwrap(), status);
        }
        assert_eq!(" QUEUED ".parse::<BetStatus>().unwrap(), BetStatus::Queued);
        assert!("settled".parse::<BetStatus>().is_err());
    }

    #[test]
    fn test_status_only_moves_forward() {
        assert!(BetStatus::Pending.can_transition_to(BetStatus::Queued));
        assert!(BetStatus::Pending.can_transition_to(BetStatus::Failed));
        assert!(BetStatus::Queued.can_transition_to(BetStatus::Processing));
        assert!(BetStatus::Processing.can_transition_to(BetStatus::Completed));

        assert!(!BetStatus::Queued.can_transition_to(BetStatus::Pending));
        assert!(!BetStatus::Queued.can_transition_to(BetStatus::Queued));
        assert!(!BetStatus::Completed.can_transition_to(BetStatus::Failed));
        assert!(!BetStatus::Failed.can_transition_to(BetStatus::Completed));
        assert!(BetStatus::Failed.is_terminal());
        assert!(!BetStatus::Processing.is_terminal());
    }

    #[test]
    fn test_new_record_defaults() {
        let bet = sample();
        assert_eq!(bet.id, None);
        assert_eq!(bet.stake, None);
        assert_eq!(bet.bet_type, DEFAULT_BET_TYPE);
        assert_eq!(bet.status, BetStatus::Pending);
        assert!(bet.validate().is_ok());
        assert_eq!(bet.summary(), "Storm - City Cup @ 2.5");
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let mut bet = sample();
        bet.odds = dec!(0);
        assert!(matches!(bet.validate(), Err(BotError::InvalidBet(_))));

        let mut bet = sample();
        bet.race = "   ".into();
        assert!(bet.validate().is_err());

        let bet = sample().with_stake(Some(dec!(-5)));
        assert!(bet.validate().is_err());
    }

    #[test]
    fn test_advance() {
        let mut bet = sample();
        bet.advance(BetStatus::Queued).unwrap();
        assert_eq!(bet.status, BetStatus::Queued);

        let err = bet.advance(BetStatus::Pending).unwrap_err();
        assert!(matches!(
            err,
            BotError::InvalidTransition { from: BetStatus::Queued, to: BetStatus::Pending }
        ));
        assert_eq!(bet.status, BetStatus::Queued);
    }

    #[test]
    fn test_assign_id_once() {
        let mut bet = sample();
        bet.assign_id("abc").unwrap();
        bet.assign_id("abc").unwrap();
        assert!(bet.assign_id("xyz").is_err());
        assert_eq!(bet.id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_dict_round_trip() {
        let mut bet = sample().with_stake(Some(dec!(20))).with_bet_type("place");
        bet.assign_id("id-1").unwrap();

        let dict = bet.to_dict();
        assert_eq!(dict["race"], json!("City Cup"));
        assert_eq!(dict["status"], json!("pending"));
        assert_eq!(BetRecord::from_dict(&dict).unwrap(), bet);
    }

    #[test]
    fn test_to_dict_omits_missing_id() {
        assert!(!sample().to_dict().contains_key("id"));
    }

    #[test]
    fn test_from_dict_applies_defaults() {
        let payload = json!({
            "race": "  Derby ",
            "horse_name": "Thunder",
            "odds": "3.2",
            "raw_message": "Bet: Derby - Thunder @ 3.2",
        });
        let payload = payload.as_object().unwrap();

        let bet = BetRecord::from_dict(payload).unwrap();
        assert_eq!(bet.race, "Derby");
        assert_eq!(bet.odds, dec!(3.2));
        assert_eq!(bet.stake, None);
        assert_eq!(bet.bet_type, "win");
        assert_eq!(bet.status, BetStatus::Pending);
    }

    #[test]
    fn test_from_dict_rejects_invalid() {
        let missing_odds = json!({"race": "Derby", "horse_name": "Thunder"});
        assert!(BetRecord::from_dict(missing_odds.as_object().unwrap()).is_err());

        let empty_horse = json!({"race": "Derby", "horse_name": "", "odds": "2"});
        assert!(BetRecord::from_dict(empty_horse.as_object().unwrap()).is_err());
    }

    #[test]
    fn test_queued_bet_normalizes() {
        let record = QueuedBet::from(sample()).into_record().unwrap();
        assert_eq!(record.horse_name, "Storm");

        let from_payload = QueuedBet::from(sample().to_dict()).into_record().unwrap();
        assert_eq!(from_payload.race, "City Cup");

        let mut broken = sample();
        broken.horse_name.clear();
        assert!(QueuedBet::Record(broken).into_record().is_err());
    }

    #[test]
    fn test_log_entry_builders() {
        let entry = LogEntry::new("bet_queued", "queued")
            .with_bet(Some("id-1".into()))
            .with_details(json!({"stake": "10"}));
        assert_eq!(entry.bet_id.as_deref(), Some("id-1"));
        assert_eq!(entry.details.unwrap()["stake"], "10");
    }

    #[test]
    fn test_statistics_count() {
        let mut stats = BetStatistics::default();
        stats.by_status.insert(BetStatus::Completed, 3);
        stats.total = 3;
        assert_eq!(stats.count(BetStatus::Completed), 3);
        assert_eq!(stats.count(BetStatus::Failed), 0);
    }
}
