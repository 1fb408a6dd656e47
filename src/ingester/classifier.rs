//! Cheap pre-filter deciding whether a message is worth parsing

use super::parser::ODDS_TOKEN;

/// Domain keywords, English and Portuguese
const KEYWORDS: &[&str] = &[
    "race", "horse", "bet", "odds", "stake", "corrida", "cavalo", "aposta",
];

/// Structured labels that lower the keyword requirement to one
const STRUCTURED_LABELS: &[&str] = &["race:", "horse:", "bet:", "corrida:", "cavalo:", "aposta:"];

const MIN_LENGTH: usize = 10;

/// Signals collected by the classifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub keyword_hits: usize,
    pub has_label: bool,
    pub has_odds_token: bool,
    pub long_enough: bool,
}

impl Classification {
    pub fn is_bet(&self) -> bool {
        let keywords_ok = self.keyword_hits >= 2 || (self.keyword_hits >= 1 && self.has_label);
        keywords_ok && self.has_odds_token && self.long_enough
    }
}

pub fn classify(text: &str) -> Classification {
    let lower = text.to_lowercase();
    let keyword_hits = KEYWORDS.iter().filter(|k| lower.contains(*k)).count();
    let has_label = STRUCTURED_LABELS.iter().any(|l| lower.contains(l));

    Classification {
        keyword_hits,
        has_label,
        has_odds_token: ODDS_TOKEN.is_match(&lower),
        long_enough: text.trim().chars().count() > MIN_LENGTH,
    }
}

/// True when the text plausibly describes a bet. The parser remains the
/// authoritative check.
pub fn is_bet_message(text: &str) -> bool {
    classify(text).is_bet()
}
