/// Fixture Sync — Model
/// Persisted documents (clubs, competitions, teams, games) and their identities.

pub mod identity;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub use identity::{assign_id, canonical, EntityKind};

// ── Collections ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Clubs,
    Competitions,
    Teams,
    Games,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Clubs,
        Collection::Competitions,
        Collection::Teams,
        Collection::Games,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Clubs => "clubs",
            Collection::Competitions => "competitions",
            Collection::Teams => "teams",
            Collection::Games => "games",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed reference to another document. The store has no joins, so this is all
/// a relationship ever is.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocRef {
    pub collection: String,
    pub id: String,
}

impl DocRef {
    pub fn new(collection: Collection, id: impl Into<String>) -> Self {
        Self {
            collection: collection.as_str().to_string(),
            id: id.into(),
        }
    }
}

// ── Classification axes ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TeamType {
    Senior,
    Junior,
    #[serde(rename = "Midweek/Masters")]
    MidweekMasters,
    #[default]
    Unknown,
}

impl fmt::Display for TeamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TeamType::Senior => f.write_str("Senior"),
            TeamType::Junior => f.write_str("Junior"),
            TeamType::MidweekMasters => f.write_str("Midweek/Masters"),
            TeamType::Unknown => f.write_str("Unknown"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Gender {
    Men,
    Women,
    Boys,
    Girls,
    Mixed,
    #[default]
    Unknown,
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Gender::Men => "Men",
            Gender::Women => "Women",
            Gender::Boys => "Boys",
            Gender::Girls => "Girls",
            Gender::Mixed => "Mixed",
            Gender::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}

/// Declared in lifecycle order, so `Ord` is the monotonic rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    Scheduled,
    InProgress,
    Completed,
}

impl GameStatus {
    /// Both scores known => completed; otherwise a date in the past => in progress.
    pub fn derive(
        home_score: Option<u32>,
        away_score: Option<u32>,
        date: Option<NaiveDateTime>,
        now: NaiveDateTime,
    ) -> Self {
        if home_score.is_some() && away_score.is_some() {
            GameStatus::Completed
        } else if date.is_some_and(|d| d < now) {
            GameStatus::InProgress
        } else {
            GameStatus::Scheduled
        }
    }
}

impl fmt::Display for GameStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameStatus::Scheduled => f.write_str("scheduled"),
            GameStatus::InProgress => f.write_str("in_progress"),
            GameStatus::Completed => f.write_str("completed"),
        }
    }
}

// ── Documents ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Club {
    pub id:           String,
    pub display_name: String,
    pub short_code:   String,
    pub is_home_club: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Competition {
    pub id:      String,
    pub name:    String,
    pub heading: String,
    #[serde(rename = "type")]
    pub kind:    TeamType,
    pub gender:  Gender,
    pub season:  String,
    pub external_comp_ref:    String,
    pub external_fixture_ref: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Team {
    pub id:    String,
    pub name:  String,
    /// "{Club} - {grade}"
    pub label: String,
    pub grade: String,
    pub club_ref:        DocRef,
    pub competition_ref: DocRef,
    pub external_comp_ref:    String,
    pub external_fixture_ref: String,
    #[serde(rename = "type")]
    pub kind:   TeamType,
    pub gender: Gender,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameSide {
    /// Canonical club key; the identity input for this side.
    pub key:  String,
    pub name: String,
    /// Absent until the team has been discovered from its own page.
    pub team_ref: Option<DocRef>,
    pub club_ref: Option<DocRef>,
    pub score:    Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Game {
    pub id:              String,
    pub competition_ref: DocRef,
    pub fixture_ref:     String,
    pub round:           u32,
    pub date:            Option<NaiveDateTime>,
    pub venue:           Option<String>,
    pub home_team:       GameSide,
    pub away_team:       GameSide,
    pub status:          GameStatus,
    pub created_at:      DateTime<Utc>,
    pub updated_at:      DateTime<Utc>,
}

impl Game {
    /// Participant keys in canonical (sorted) order.
    pub fn participant_keys(&self) -> (&str, &str) {
        let (a, b) = (self.home_team.key.as_str(), self.away_team.key.as_str());
        if a <= b { (a, b) } else { (b, a) }
    }

    /// Side belonging to the given club key, if either.
    pub fn side_for(&self, key: &str) -> Option<&GameSide> {
        if self.home_team.key == key {
            Some(&self.home_team)
        } else if self.away_team.key == key {
            Some(&self.away_team)
        } else {
            None
        }
    }
}
