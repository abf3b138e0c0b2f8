//! Classifier for competition and grade names.
//! Keyword rules, not a model: ordered tables, first match wins.
//!
//! Rule precedence:
//!   1. gendered possessives ("women's", "men's") before bare gender words
//!   2. type keywords in table order (league/pennant names mean Senior)
//!   3. an under-age token (u12, under 14) forces Junior
//!   4. an age-plus token (35+, 60+) forces Midweek/Masters, unless 3 applied

use model::{Gender, TeamType};
use regex::Regex;
use std::sync::LazyLock;

static UNDER_AGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(?:u|under[\s-]?)\d{1,2}\b").unwrap());
static AGE_PLUS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\d{2}\+").unwrap());

/// Matched as substrings, before anything else.
const GENDER_POSSESSIVES: &[(&str, Gender)] = &[
    ("women's", Gender::Women),
    ("men's", Gender::Men),
];

/// Matched as whole words only, so "Mentone" is not "men".
const GENDER_WORDS: &[(&str, Gender)] = &[
    ("women", Gender::Women),
    ("men", Gender::Men),
    ("girls", Gender::Girls),
    ("boys", Gender::Boys),
    ("mixed", Gender::Mixed),
];

const TYPE_KEYWORDS: &[(&str, TeamType)] = &[
    ("premier league", TeamType::Senior),
    ("vic league", TeamType::Senior),
    ("pennant", TeamType::Senior),
    ("senior", TeamType::Senior),
    ("junior", TeamType::Junior),
    ("midweek", TeamType::MidweekMasters),
    ("masters", TeamType::MidweekMasters),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Classification {
    pub kind:   TeamType,
    pub gender: Gender,
}

/// Total and deterministic; unknown input yields `Unknown` on both axes.
pub fn classify(text: &str) -> Classification {
    let lower = text.to_lowercase().replace(['\u{2019}', '\u{2018}'], "'");
    Classification {
        kind: classify_type(&lower),
        gender: classify_gender(&lower),
    }
}

fn classify_type(lower: &str) -> TeamType {
    if UNDER_AGE.is_match(lower) {
        return TeamType::Junior;
    }
    if AGE_PLUS.is_match(lower) {
        return TeamType::MidweekMasters;
    }
    TYPE_KEYWORDS
        .iter()
        .find(|(kw, _)| lower.contains(kw))
        .map(|(_, t)| *t)
        .unwrap_or(TeamType::Unknown)
}

fn classify_gender(lower: &str) -> Gender {
    if let Some((_, g)) = GENDER_POSSESSIVES.iter().find(|(kw, _)| lower.contains(kw)) {
        return *g;
    }
    let words: Vec<&str> = lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    GENDER_WORDS
        .iter()
        .find(|(kw, _)| words.contains(kw))
        .map(|(_, g)| *g)
        .unwrap_or(Gender::Unknown)
}
