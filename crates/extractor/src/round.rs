//! Round page layouts. Each field is pulled on its own; a field that is
//! missing or malformed comes back as `None` and nothing else is affected.

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::LazyLock;

use crate::dates::parse_fixture_date;
use crate::text_of;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

// ── Detail layout (variant A) ────────────────────────────────────────────────
selector!(DETAIL_GAME, ".fixture-details");
selector!(DETAIL_HOME, ".fixture-details-team-home");
selector!(DETAIL_AWAY, ".fixture-details-team-away");
selector!(DETAIL_NAME, ".fixture-details-team-name");
selector!(DETAIL_SCORE, ".fixture-details-team-score");
selector!(DETAIL_DATE, ".fixture-details-date-long");
selector!(DETAIL_VENUE, ".fixture-details-venue");
selector!(DETAIL_ROUND, ".fixture-details-round");

// ── Card layout (variant B) ──────────────────────────────────────────────────
selector!(CARD_GAME, "div.card-body");
selector!(CARD_TEAM, "a[href*='/teams/']");
selector!(CARD_VENUE, "a[href*='/venues/']");
selector!(CARD_SCORE, "b, strong, .score");
selector!(CARD_BLOCK, "div");

static ROUND_NO: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)round\s+(\d+)").unwrap());
static SCORE_PAIR: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d+)\s*[-–]\s*(\d+)$").unwrap());

/// Fields of one game as they appear on the page.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawGame {
    pub home_name:  Option<String>,
    pub away_name:  Option<String>,
    pub home_score: Option<u32>,
    pub away_score: Option<u32>,
    pub date:       Option<chrono::NaiveDateTime>,
    pub venue:      Option<String>,
    pub round:      Option<u32>,
}

pub trait RoundLayout: Send + Sync {
    fn name(&self) -> &'static str;
    /// `None` when this layout does not recognise the page at all.
    fn games(&self, doc: &Html) -> Option<Vec<RawGame>>;
}

pub struct DetailLayout;
pub struct CardLayout;

impl RoundLayout for DetailLayout {
    fn name(&self) -> &'static str {
        "fixture-details"
    }

    fn games(&self, doc: &Html) -> Option<Vec<RawGame>> {
        let games: Vec<RawGame> = doc.select(&DETAIL_GAME).map(|g| detail_game(&g)).collect();
        (!games.is_empty()).then_some(games)
    }
}

fn detail_game(g: &ElementRef) -> RawGame {
    let home = first(g, &DETAIL_HOME);
    let away = first(g, &DETAIL_AWAY);
    RawGame {
        home_name:  home.as_ref().and_then(|h| first_text(h, &DETAIL_NAME)),
        away_name:  away.as_ref().and_then(|a| first_text(a, &DETAIL_NAME)),
        home_score: home.as_ref().and_then(|h| first_text(h, &DETAIL_SCORE)).and_then(|s| parse_score(&s)),
        away_score: away.as_ref().and_then(|a| first_text(a, &DETAIL_SCORE)).and_then(|s| parse_score(&s)),
        date:       first_text(g, &DETAIL_DATE).and_then(|t| parse_fixture_date(&t)),
        venue:      first_text(g, &DETAIL_VENUE),
        round:      first_text(g, &DETAIL_ROUND).and_then(|t| parse_round(&t)),
    }
}

impl RoundLayout for CardLayout {
    fn name(&self) -> &'static str {
        "cards"
    }

    fn games(&self, doc: &Html) -> Option<Vec<RawGame>> {
        let games: Vec<RawGame> = doc
            .select(&CARD_GAME)
            .filter(|c| c.select(&CARD_TEAM).next().is_some())
            .map(|c| card_game(&c))
            .collect();
        (!games.is_empty()).then_some(games)
    }
}

fn card_game(c: &ElementRef) -> RawGame {
    let teams: Vec<String> = c.select(&CARD_TEAM).map(|a| text_of(&a)).filter(|t| !t.is_empty()).collect();
    let scores: (Option<u32>, Option<u32>) = c
        .select(&CARD_SCORE)
        .find_map(|el| {
            let text = text_of(&el);
            SCORE_PAIR.captures(&text).map(|caps| (caps[1].parse().ok(), caps[2].parse().ok()))
        })
        .unwrap_or((None, None));
    let date = c
        .select(&CARD_BLOCK)
        .find_map(|el| parse_fixture_date(&text_of(&el)));

    RawGame {
        home_name:  teams.first().cloned(),
        away_name:  teams.get(1).cloned(),
        home_score: scores.0,
        away_score: scores.1,
        date,
        venue:      first_text(c, &CARD_VENUE),
        round:      parse_round(&text_of(c)),
    }
}

fn first<'a>(el: &ElementRef<'a>, sel: &Selector) -> Option<ElementRef<'a>> {
    el.select(sel).next()
}

fn first_text(el: &ElementRef, sel: &Selector) -> Option<String> {
    el.select(sel).next().map(|e| text_of(&e)).filter(|t| !t.is_empty())
}

/// "-" or blank means not played yet.
pub fn parse_score(text: &str) -> Option<u32> {
    let t = text.trim();
    if t.is_empty() || t == "-" {
        return None;
    }
    t.parse().ok()
}

fn parse_round(text: &str) -> Option<u32> {
    ROUND_NO.captures(text).and_then(|c| c[1].parse().ok())
}

/// First layout that recognises the page wins.
pub fn extract_raw_games(doc: &Html, layouts: &[Box<dyn RoundLayout>]) -> Vec<RawGame> {
    for layout in layouts {
        if let Some(games) = layout.games(doc) {
            tracing::debug!(layout = layout.name(), count = games.len(), "round page parsed");
            return games;
        }
    }
    Vec::new()
}

pub fn default_layouts() -> Vec<Box<dyn RoundLayout>> {
    vec![Box::new(DetailLayout), Box::new(CardLayout)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scores() {
        assert_eq!(parse_score(" 3 "), Some(3));
        assert_eq!(parse_score("-"), None);
        assert_eq!(parse_score(""), None);
        assert_eq!(parse_score("F/F"), None);
    }

    #[test]
    fn rounds() {
        assert_eq!(parse_round("Round 7"), Some(7));
        assert_eq!(parse_round("ROUND  12 - Sat"), Some(12));
        assert_eq!(parse_round("Finals"), None);
    }
}
