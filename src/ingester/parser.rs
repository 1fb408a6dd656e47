//! Tip parsing
//!
//! The parser walks an ordered list of tier strategies and keeps the first
//! candidate that yields a race, a participant and a positive price.
//! Structured layouts come first so a loose heuristic never wins over a
//! labeled message:
//!
//! 1. Labeled patterns (`Race: X / Horse: Y / Odds: Z`, `Bet: X - Y @ Z`, ...)
//! 2. Keyword proximity over separate `horse` / `race` lines
//! 3. A windowed scan around any `@price` token (low confidence)

use crate::config::ParserConfig;
use crate::types::{BetRecord, DEFAULT_BET_TYPE};
use regex::{Captures, Regex};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::LazyLock;

const NUM: &str = r"(\d+(?:[.,]\d+)?)";

/// Odds-shaped token: `@2.5`, `2.5@`, `odds: 2.5`, `(2.5)`
pub(crate) static ODDS_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"(?i)@\s*{NUM}|{NUM}\s*@|odds\s*:?\s*{NUM}|\(\s*{NUM}\s*\)")).expect("valid regex")
});

static AT_ODDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"@\s*{NUM}")).expect("valid regex"));

static STAKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(&format!(r"(?i)stake[ \t]*:[ \t]*{NUM}")).expect("valid regex"));

static BET_TYPE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)(?:^|[ \t])(?:bet[ \t]+)?(?:type|tipo)[ \t]*:[ \t]*([^\n]+?)[ \t]*$").expect("valid regex")
});

static HORSE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)horse|cavalo").expect("valid regex"));

static RACE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)race|corrida").expect("valid regex"));

/// Label words ignored by the windowed scan
const NOISE_WORDS: &[&str] = &[
    "bet", "tip", "odds", "stake", "type", "race", "horse", "aposta", "corrida", "cavalo", "tipo",
];

const MIN_WORD_CHARS: usize = 3;
const MAX_PARTICIPANT_WORDS: usize = 3;

static DEFAULT_PARSER: LazyLock<MessageParser> = LazyLock::new(MessageParser::default);

/// Parse with the default tier list
pub fn parse_message(text: &str) -> Option<BetRecord> {
    DEFAULT_PARSER.parse_message(text)
}

/// How much the matching tier can be trusted
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Fields pulled out by a tier, before secondary extraction
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub race: String,
    pub participant: String,
    pub odds: Decimal,
}

impl Candidate {
    fn new(race: &str, participant: &str, odds: Decimal) -> Option<Self> {
        let race = clean_value(race);
        let participant = clean_value(participant);
        if race.is_empty() || participant.is_empty() || odds <= Decimal::ZERO {
            return None;
        }
        Some(Self { race, participant, odds })
    }
}

/// One step of the fallback chain
pub trait TierStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn confidence(&self) -> Confidence;
    fn try_match(&self, text: &str) -> Option<Candidate>;
}

/// Capture-group positions of a pattern
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupOrder {
    pub race: usize,
    pub participant: usize,
    pub odds: usize,
}

impl GroupOrder {
    pub const RACE_FIRST: GroupOrder = GroupOrder { race: 1, participant: 2, odds: 3 };
    pub const PARTICIPANT_FIRST: GroupOrder = GroupOrder { race: 2, participant: 1, odds: 3 };
    pub const PARTICIPANT_ODDS_RACE: GroupOrder = GroupOrder { race: 3, participant: 1, odds: 2 };
}

/// Fixed-shape labeled pattern capturing race, participant and odds
pub struct PatternTier {
    name: &'static str,
    regex: Regex,
    groups: GroupOrder,
}

impl PatternTier {
    pub fn new(name: &'static str, pattern: &str, groups: GroupOrder) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            regex: Regex::new(pattern)?,
            groups,
        })
    }

    fn group<'t>(caps: &Captures<'t>, idx: usize) -> Option<&'t str> {
        caps.get(idx).map(|m| m.as_str())
    }
}

impl TierStrategy for PatternTier {
    fn name(&self) -> &'static str {
        self.name
    }

    fn confidence(&self) -> Confidence {
        Confidence::High
    }

    fn try_match(&self, text: &str) -> Option<Candidate> {
        let caps = self.regex.captures(text)?;
        let odds = parse_positive(Self::group(&caps, self.groups.odds)?)?;
        Candidate::new(
            Self::group(&caps, self.groups.race)?,
            Self::group(&caps, self.groups.participant)?,
            odds,
        )
    }
}

/// Labeled layouts in trial order
fn labeled_tiers() -> Vec<PatternTier> {
    let odds_label = format!(r"odds\s*:\s*@?\s*{NUM}");
    let specs: Vec<(&'static str, String, GroupOrder)> = vec![
        (
            "labeled_block",
            format!(
                r"(?ism)^\s*(?:race|corrida)\s*:\s*(.+?)\s*$.*?^\s*(?:horse|cavalo)\s*:\s*(.+?)\s*$.*?^\s*{odds_label}"
            ),
            GroupOrder::RACE_FIRST,
        ),
        (
            "labeled_block_horse_first",
            format!(
                r"(?ism)^\s*(?:horse|cavalo)\s*:\s*(.+?)\s*$.*?^\s*(?:race|corrida)\s*:\s*(.+?)\s*$.*?^\s*{odds_label}"
            ),
            GroupOrder::PARTICIPANT_FIRST,
        ),
        (
            "compact_dash",
            format!(r"(?i)(?:bet|aposta|tip)\s*:\s*(.+?)\s*-\s*(.+?)\s*@\s*{NUM}"),
            GroupOrder::RACE_FIRST,
        ),
        (
            "compact_horse_first",
            format!(r"(?im)(?:bet|aposta|tip)\s*:\s*(.+?)\s*@\s*{NUM}\s*(?:-|in|at|em|na|no)\s+(.+?)\s*$"),
            GroupOrder::PARTICIPANT_ODDS_RACE,
        ),
        (
            "race_parenthesized",
            format!(r"(?i)(?:race|corrida)\s+(.+?)\s*:\s*(.+?)\s*\(\s*{NUM}\s*\)"),
            GroupOrder::RACE_FIRST,
        ),
        (
            "horse_parenthesized",
            format!(
                r"(?im)(?:horse|cavalo)\s*:?\s*(.+?)\s*\(\s*{NUM}\s*\)\s*(?:-|in|at|em|na|no)\s+(?:(?:race|corrida)\s*:?\s*)?(.+?)\s*$"
            ),
            GroupOrder::PARTICIPANT_ODDS_RACE,
        ),
    ];

    specs
        .into_iter()
        .filter_map(|(name, pattern, groups)| match PatternTier::new(name, &pattern, groups) {
            Ok(tier) => Some(tier),
            Err(e) => {
                tracing::error!("Pattern tier {} failed to compile: {}", name, e);
                None
            }
        })
        .collect()
}

/// Separate `horse` and `race` lines; value after the colon or with the keyword removed
pub struct KeywordProximity;

impl KeywordProximity {
    fn line_value(line: &str, keyword: &Regex) -> String {
        let value = match line.split_once(':') {
            Some((_, rest)) => rest.to_string(),
            None => keyword.replace_all(line, "").into_owned(),
        };
        ODDS_TOKEN.replace_all(&value, "").into_owned()
    }
}

impl TierStrategy for KeywordProximity {
    fn name(&self) -> &'static str {
        "keyword_proximity"
    }

    fn confidence(&self) -> Confidence {
        Confidence::Medium
    }

    fn try_match(&self, text: &str) -> Option<Candidate> {
        let lines: Vec<&str> = text.lines().map(str::trim).filter(|l| !l.is_empty()).collect();

        let horse_idx = lines.iter().position(|l| HORSE_WORD.is_match(l))?;
        let race_idx = lines
            .iter()
            .enumerate()
            .position(|(i, l)| i != horse_idx && RACE_WORD.is_match(l))?;

        let odds = lines.iter().find_map(|l| odds_in(l))?;

        Candidate::new(
            &Self::line_value(lines[race_idx], &RACE_WORD),
            &Self::line_value(lines[horse_idx], &HORSE_WORD),
            odds,
        )
    }
}

/// Last resort: words around an `@price` token, first half as the race,
/// the rest (up to three words) as the participant
pub struct WindowedScan {
    window_chars: usize,
}

impl WindowedScan {
    pub fn new(window_chars: usize) -> Self {
        Self { window_chars }
    }

    fn words(text: &str) -> Vec<String> {
        text.split_whitespace()
            .map(|w| w.trim_matches(|c: char| !c.is_alphanumeric()).to_string())
            .filter(|w| w.chars().count() >= MIN_WORD_CHARS)
            .filter(|w| !w.chars().all(|c| c.is_ascii_digit()))
            .filter(|w| !NOISE_WORDS.contains(&w.to_lowercase().as_str()))
            .collect()
    }
}

impl TierStrategy for WindowedScan {
    fn name(&self) -> &'static str {
        "windowed_scan"
    }

    fn confidence(&self) -> Confidence {
        Confidence::Low
    }

    fn try_match(&self, text: &str) -> Option<Candidate> {
        if self.window_chars == 0 {
            return None;
        }

        AT_ODDS.captures_iter(text).find_map(|caps| {
            let token = caps.get(0)?;
            let odds = parse_positive(caps.get(1)?.as_str())?;

            let before = tail_chars(&text[..token.start()], self.window_chars);
            let after = head_chars(&text[token.end()..], self.window_chars);

            let mut words = Self::words(before);
            if words.len() < 2 {
                words.extend(Self::words(after));
            }
            if words.len() < 2 {
                return None;
            }

            let split = words.len() / 2;
            let end = (split + MAX_PARTICIPANT_WORDS).min(words.len());
            Candidate::new(&words[..split].join(" "), &words[split..end].join(" "), odds)
        })
    }
}

/// Successful parse with provenance
#[derive(Debug, Clone)]
pub struct ParsedBet {
    pub bet: BetRecord,
    pub tier: &'static str,
    pub confidence: Confidence,
}

/// Ordered tier list plus secondary field extraction
pub struct MessageParser {
    tiers: Vec<Box<dyn TierStrategy>>,
}

impl MessageParser {
    pub fn new(config: &ParserConfig) -> Self {
        let mut tiers: Vec<Box<dyn TierStrategy>> = labeled_tiers()
            .into_iter()
            .map(|t| Box::new(t) as Box<dyn TierStrategy>)
            .collect();
        tiers.push(Box::new(KeywordProximity));
        if config.windowed_scan {
            tiers.push(Box::new(WindowedScan::new(config.window_chars)));
        }
        Self { tiers }
    }

    pub fn with_tiers(tiers: Vec<Box<dyn TierStrategy>>) -> Self {
        Self { tiers }
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    pub fn parse_message(&self, text: &str) -> Option<BetRecord> {
        self.parse_detailed(text).map(|p| p.bet)
    }

    pub fn parse_detailed(&self, text: &str) -> Option<ParsedBet> {
        for tier in &self.tiers {
            let Some(candidate) = tier.try_match(text) else {
                continue;
            };
            let Some(bet) = build_record(candidate, text) else {
                tracing::debug!("Tier {} matched but secondary fields were unusable", tier.name());
                continue;
            };

            if tier.confidence() == Confidence::Low {
                tracing::warn!("Low-confidence parse via {}: {}", tier.name(), bet.summary());
            } else {
                tracing::debug!("Parsed via {}: {}", tier.name(), bet.summary());
            }

            return Some(ParsedBet {
                bet,
                tier: tier.name(),
                confidence: tier.confidence(),
            });
        }
        None
    }
}

impl Default for MessageParser {
    fn default() -> Self {
        Self::new(&ParserConfig::default())
    }
}

fn build_record(candidate: Candidate, text: &str) -> Option<BetRecord> {
    let stake = match STAKE.captures(text) {
        Some(caps) => {
            let value = parse_decimal(caps.get(1)?.as_str())?;
            (value > Decimal::ZERO).then_some(value)
        }
        None => None,
    };

    let bet_type = BET_TYPE
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| DEFAULT_BET_TYPE.to_string());

    let record = BetRecord::new(candidate.race, candidate.participant, candidate.odds, text)
        .with_stake(stake)
        .with_bet_type(bet_type);
    record.validate().ok()?;
    Some(record)
}

fn odds_in(line: &str) -> Option<Decimal> {
    ODDS_TOKEN.captures_iter(line).find_map(|caps| {
        caps.iter()
            .skip(1)
            .flatten()
            .find_map(|m| parse_positive(m.as_str()))
    })
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(&raw.trim().replace(',', ".")).ok()
}

fn parse_positive(raw: &str) -> Option<Decimal> {
    parse_decimal(raw).filter(|d| *d > Decimal::ZERO)
}

fn clean_value(raw: &str) -> String {
    raw.trim()
        .trim_matches(|c: char| c == '-' || c == ':' || c == '|' || c == '/')
        .trim()
        .to_string()
}

fn tail_chars(s: &str, n: usize) -> &str {
    match s.char_indices().rev().nth(n.saturating_sub(1)) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

fn head_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
