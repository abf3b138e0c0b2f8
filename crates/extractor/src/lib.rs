/// Fixture Sync — Extractor
///
/// Turns fetched pages into candidate records. Two page kinds:
///   - competition index: fixture links `/games/{comp}/{fixture}` under section headings
///   - round page: team links and the games of the round
///
/// Extraction never fails. Whatever cannot be read is left out.

pub mod dates;
pub mod filter;
pub mod index;
pub mod round;

use chrono::NaiveDateTime;
use model::canonical;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::LazyLock;

pub use filter::TeamFilter;
use index::IndexLayout;
use round::RoundLayout;

static ANCHOR: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

// ── Candidates ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompetitionCandidate {
    /// Fixture link text, i.e. the grade ("Men's Vic League 1 - 2025").
    pub name:        String,
    /// Section heading the link sat under; empty if none.
    pub heading:     String,
    pub comp_ref:    String,
    pub fixture_ref: String,
    pub href:        String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamSighting {
    pub name:      String,
    pub club_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SideCandidate {
    pub name:      String,
    pub club_name: String,
    pub score:     Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameCandidate {
    /// Round printed on the page, if any.
    pub round: Option<u32>,
    pub date:  Option<NaiveDateTime>,
    pub venue: Option<String>,
    pub home:  SideCandidate,
    pub away:  SideCandidate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidate {
    Competition(CompetitionCandidate),
    Team(TeamSighting),
    Game(GameCandidate),
}

#[derive(Debug, Clone)]
pub enum PageKind {
    CompetitionIndex,
    /// Games are kept only if one side's canonical club key is in `focus`.
    Round { focus: Vec<String> },
}

// ── Extractor ────────────────────────────────────────────────────────────────

pub struct Extractor {
    filter:        TeamFilter,
    index_layouts: Vec<Box<dyn IndexLayout>>,
    round_layouts: Vec<Box<dyn RoundLayout>>,
}

impl Extractor {
    pub fn new(filter: TeamFilter) -> Self {
        Self {
            filter,
            index_layouts: index::default_layouts(),
            round_layouts: round::default_layouts(),
        }
    }

    pub fn with_layouts(
        filter: TeamFilter,
        index_layouts: Vec<Box<dyn IndexLayout>>,
        round_layouts: Vec<Box<dyn RoundLayout>>,
    ) -> Self {
        Self { filter, index_layouts, round_layouts }
    }

    pub fn filter(&self) -> &TeamFilter {
        &self.filter
    }

    pub fn extract(&self, html: &str, kind: &PageKind) -> Vec<Candidate> {
        match kind {
            PageKind::CompetitionIndex => self
                .competitions(html)
                .into_iter()
                .map(Candidate::Competition)
                .collect(),
            PageKind::Round { focus } => {
                let doc = Html::parse_document(html);
                let mut out: Vec<Candidate> = self.team_sightings(&doc).into_iter().map(Candidate::Team).collect();
                out.extend(self.games(&doc, focus).into_iter().map(Candidate::Game));
                out
            }
        }
    }

    pub fn competitions(&self, html: &str) -> Vec<CompetitionCandidate> {
        let doc = Html::parse_document(html);
        index::extract_competitions(&doc, &self.index_layouts)
    }

    /// Every link on the page that reads like a team, one per club.
    fn team_sightings(&self, doc: &Html) -> Vec<TeamSighting> {
        let mut seen = HashSet::new();
        doc.select(&ANCHOR)
            .map(|a| text_of(&a))
            .filter(|t| self.filter.is_valid_team(t))
            .filter_map(|name| {
                let club_name = self.filter.club_name_of(&name);
                seen.insert(canonical(&club_name)).then_some(TeamSighting { name, club_name })
            })
            .collect()
    }

    fn games(&self, doc: &Html, focus: &[String]) -> Vec<GameCandidate> {
        if focus.is_empty() {
            return Vec::new();
        }
        round::extract_raw_games(doc, &self.round_layouts)
            .into_iter()
            .filter_map(|raw| {
                let (Some(home_name), Some(away_name)) = (raw.home_name, raw.away_name) else {
                    tracing::debug!("skipping game with a missing participant name");
                    return None;
                };
                let home = self.side(home_name, raw.home_score);
                let away = self.side(away_name, raw.away_score);
                let involved = [&home, &away]
                    .iter()
                    .any(|s| focus.contains(&canonical(&s.club_name)));
                involved.then_some(GameCandidate {
                    round: raw.round,
                    date: raw.date,
                    venue: raw.venue,
                    home,
                    away,
                })
            })
            .collect()
    }

    fn side(&self, name: String, score: Option<u32>) -> SideCandidate {
        SideCandidate { club_name: self.filter.club_name_of(&name), name, score }
    }
}

/// Trimmed text of an element. Text nodes are space-joined (so `<br>` separates)
/// and inner whitespace collapsed.
pub fn text_of(el: &ElementRef) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    const INDEX: &str = r#"
        <html><body>
          <h2>Senior Competition 2025</h2>
          <div class="px-4 py-2 border-top"><a href="/games/21935/37291">Men's Vic League 1 - 2025</a></div>
          <div class="px-4 py-2 border-top"><a href="/games/21935/37292">Women's Vic League 1 - 2025</a></div>
          <h2>Midweek Competition 2025</h2>
          <div class="px-4 py-2 border-top"><a href="/games/21940/37400">Men's Masters 45+ - 2025</a></div>
          <div class="px-4 py-2 border-top"><a href="/venues/12">Not a fixture</a></div>
          <div class="px-4 py-2 border-top"><a href="/games/21935/37291">Men's Vic League 1 - 2025</a></div>
        </body></html>"#;

    const ROUND_DETAIL: &str = r#"
        <div class="fixture-details">
          <div class="fixture-details-round">Round 3</div>
          <div class="fixture-details-date-long">Saturday, 12 April 2025 - 2:00 PM</div>
          <div class="fixture-details-venue">Mentone Grammar Playing Fields</div>
          <div class="fixture-details-teams">
            <div class="fixture-details-team-home">
              <a class="fixture-details-team-name" href="/teams/1">Mentone Hockey Club</a>
              <div class="fixture-details-team-score">3</div>
            </div>
            <div class="fixture-details-team-away">
              <a class="fixture-details-team-name" href="/teams/2">Hawthorn Hockey Club</a>
              <div class="fixture-details-team-score">1</div>
            </div>
          </div>
        </div>
        <div class="fixture-details">
          <div class="fixture-details-date-long">TBC</div>
          <div class="fixture-details-teams">
            <div class="fixture-details-team-home">
              <a class="fixture-details-team-name" href="/teams/3">Camberwell Hockey Club</a>
              <div class="fixture-details-team-score">-</div>
            </div>
            <div class="fixture-details-team-away">
              <a class="fixture-details-team-name" href="/teams/4">Mentone Hockey Club</a>
            </div>
          </div>
        </div>
        <div class="fixture-details">
          <div class="fixture-details-teams">
            <div class="fixture-details-team-home"><a class="fixture-details-team-name">Box Hill Hockey Club</a></div>
            <div class="fixture-details-team-away"><a class="fixture-details-team-name">Camberwell Hockey Club</a></div>
          </div>
        </div>
        <a href="/venues/9">Mentone Grammar Playing Fields</a>"#;

    const ROUND_CARDS: &str = r#"
        <div class="card-body">
          <div class="row">
            <div class="col-md">Sat 19 Apr 2025<br>15:30</div>
            <div class="col-md"><a href="/venues/4">State Netball Hockey Centre</a></div>
            <div class="col-lg-3"><a href="/teams/2">Hawthorn Hockey Club</a></div>
            <div class="col-lg-2"><b>2 - 2</b></div>
            <div class="col-lg-3"><a href="/teams/1">Mentone Hockey Club</a></div>
          </div>
        </div>"#;

    fn extractor() -> Extractor {
        Extractor::new(TeamFilter::default())
    }

    fn focus() -> Vec<String> {
        vec![canonical("Mentone")]
    }

    #[test]
    fn index_sections_carry_headings_and_dedupe() {
        let comps = extractor().competitions(INDEX);
        assert_eq!(comps.len(), 3);
        assert_eq!(comps[0].comp_ref, "21935");
        assert_eq!(comps[0].fixture_ref, "37291");
        assert_eq!(comps[0].heading, "Senior Competition 2025");
        assert_eq!(comps[2].heading, "Midweek Competition 2025");
        assert_eq!(comps[2].name, "Men's Masters 45+ - 2025");
    }

    #[test]
    fn index_falls_back_to_link_scan() {
        let html = r#"<ul><li><a href="https://x.test/games/5/6">Under 14 Boys</a></li></ul>"#;
        let comps = extractor().competitions(html);
        assert_eq!(comps.len(), 1);
        assert_eq!((comps[0].comp_ref.as_str(), comps[0].fixture_ref.as_str()), ("5", "6"));
        assert_eq!(comps[0].heading, "");
    }

    #[test]
    fn round_page_sightings_skip_venues() {
        let candidates = extractor().extract(ROUND_DETAIL, &PageKind::Round { focus: vec![] });
        let teams: Vec<_> = candidates
            .iter()
            .filter_map(|c| match c {
                Candidate::Team(t) => Some(t.club_name.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(teams, vec!["Mentone", "Hawthorn", "Camberwell", "Box Hill"]);
        assert!(!candidates.iter().any(|c| matches!(c, Candidate::Game(_))));
    }

    #[test]
    fn detail_layout_games_for_focus_only() {
        let games: Vec<GameCandidate> = extractor()
            .extract(ROUND_DETAIL, &PageKind::Round { focus: focus() })
            .into_iter()
            .filter_map(|c| match c {
                Candidate::Game(g) => Some(g),
                _ => None,
            })
            .collect();
        assert_eq!(games.len(), 2);

        let first = &games[0];
        assert_eq!(first.round, Some(3));
        assert_eq!(
            first.date,
            NaiveDate::from_ymd_opt(2025, 4, 12).unwrap().and_hms_opt(14, 0, 0)
        );
        assert_eq!(first.venue.as_deref(), Some("Mentone Grammar Playing Fields"));
        assert_eq!((first.home.score, first.away.score), (Some(3), Some(1)));
        assert_eq!(first.away.club_name, "Hawthorn");

        let second = &games[1];
        assert_eq!(second.date, None);
        assert_eq!(second.venue, None);
        assert_eq!(second.round, None);
        assert_eq!((second.home.score, second.away.score), (None, None));
        assert_eq!(second.away.name, "Mentone Hockey Club");
    }

    #[test]
    fn card_layout_is_the_fallback() {
        let games: Vec<GameCandidate> = extractor()
            .extract(ROUND_CARDS, &PageKind::Round { focus: focus() })
            .into_iter()
            .filter_map(|c| match c {
                Candidate::Game(g) => Some(g),
                _ => None,
            })
            .collect();
        assert_eq!(games.len(), 1);
        let g = &games[0];
        assert_eq!(g.home.club_name, "Hawthorn");
        assert_eq!(g.away.club_name, "Mentone");
        assert_eq!((g.home.score, g.away.score), (Some(2), Some(2)));
        assert_eq!(g.venue.as_deref(), Some("State Netball Hockey Centre"));
        assert_eq!(
            g.date,
            NaiveDate::from_ymd_opt(2025, 4, 19).unwrap().and_hms_opt(15, 30, 0)
        );
    }

    #[test]
    fn unrecognised_page_yields_nothing() {
        assert!(extractor().extract("<html><p>Maintenance</p></html>", &PageKind::Round { focus: focus() }).is_empty());
        assert!(extractor().extract("", &PageKind::CompetitionIndex).is_empty());
    }
}
