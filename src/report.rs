//! Read-side queries over the store: upcoming games, weekly results,
//! a team's games, teams by type, teams of a competition.

use chrono::{Duration, NaiveDateTime};
use model::{canonical, identity, Collection, Game, GameStatus, Team, TeamType};
use serde_json::Value;
use std::fmt;

use crate::store::{query_as, DocumentStore, QueryOp, StoreError};

/// Store format of a fixture date ("2025-04-12T14:00:00").
fn date_key(at: NaiveDateTime) -> Value {
    Value::String(at.format("%Y-%m-%dT%H:%M:%S").to_string())
}

fn games_between<S: DocumentStore + ?Sized>(
    store: &S,
    from: NaiveDateTime,
    to: NaiveDateTime,
) -> Result<Vec<Game>, StoreError> {
    let mut games: Vec<Game> = query_as(store, Collection::Games, "date", QueryOp::Ge, &date_key(from))?
        .into_iter()
        .filter(|g: &Game| g.date.is_some_and(|d| d <= to))
        .collect();
    games.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.id.cmp(&b.id)));
    Ok(games)
}

/// Games not yet completed, dated within the next `days` days.
pub fn upcoming_games<S: DocumentStore + ?Sized>(
    store: &S,
    now: NaiveDateTime,
    days: i64,
) -> Result<Vec<Game>, StoreError> {
    Ok(games_between(store, now, now + Duration::days(days))?
        .into_iter()
        .filter(|g| g.status != GameStatus::Completed)
        .collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Draw,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Outcome::Win => "WIN",
            Outcome::Loss => "LOSS",
            Outcome::Draw => "DRAW",
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultLine {
    pub game:       Game,
    pub ours:       u32,
    pub theirs:     u32,
    pub opponent:   String,
    pub outcome:    Outcome,
}

/// Completed games of `club` in the last seven days, from its side of the score.
pub fn weekly_results<S: DocumentStore + ?Sized>(
    store: &S,
    club: &str,
    now: NaiveDateTime,
) -> Result<Vec<ResultLine>, StoreError> {
    let key = canonical(club);
    let lines = games_between(store, now - Duration::days(7), now)?
        .into_iter()
        .filter(|g| g.status == GameStatus::Completed)
        .filter_map(|g| {
            let ours = g.side_for(&key)?;
            let theirs = if g.home_team.key == key { &g.away_team } else { &g.home_team };
            let (o, t) = (ours.score?, theirs.score?);
            let outcome = match o.cmp(&t) {
                std::cmp::Ordering::Greater => Outcome::Win,
                std::cmp::Ordering::Less => Outcome::Loss,
                std::cmp::Ordering::Equal => Outcome::Draw,
            };
            let opponent = theirs.name.clone();
            Some(ResultLine { game: g, ours: o, theirs: t, opponent, outcome })
        })
        .collect();
    Ok(lines)
}

/// Home and away games of one team, by date; undated games last.
pub fn team_games<S: DocumentStore + ?Sized>(store: &S, team_id: &str) -> Result<Vec<Game>, StoreError> {
    let id = Value::String(team_id.to_string());
    let mut games: Vec<Game> = query_as(store, Collection::Games, "home_team.team_ref.id", QueryOp::Eq, &id)?;
    games.extend(query_as::<Game, _>(store, Collection::Games, "away_team.team_ref.id", QueryOp::Eq, &id)?);
    games.sort_by(|a, b| {
        (a.date.is_none(), a.date, a.round, &a.id).cmp(&(b.date.is_none(), b.date, b.round, &b.id))
    });
    games.dedup_by(|a, b| a.id == b.id);
    Ok(games)
}

/// Teams of one type belonging to `club`.
pub fn teams_by_type<S: DocumentStore + ?Sized>(
    store: &S,
    club: &str,
    kind: TeamType,
) -> Result<Vec<Team>, StoreError> {
    let club_id = identity::club_id(club);
    let kind_value = serde_json::to_value(kind)?;
    let mut teams: Vec<Team> = query_as(store, Collection::Teams, "type", QueryOp::Eq, &kind_value)?
        .into_iter()
        .filter(|t: &Team| t.club_ref.id == club_id)
        .collect();
    teams.sort_by(|a, b| a.label.cmp(&b.label));
    Ok(teams)
}

/// Every team entered in a competition, by the competition's document id.
pub fn competition_teams<S: DocumentStore + ?Sized>(
    store: &S,
    competition_id: &str,
) -> Result<Vec<Team>, StoreError> {
    let mut teams: Vec<Team> = query_as(
        store,
        Collection::Teams,
        "competition_ref.id",
        QueryOp::Eq,
        &Value::String(competition_id.to_string()),
    )?;
    teams.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(teams)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{save, SqliteStore};
    use chrono::{NaiveDate, TimeZone, Utc};
    use model::{DocRef, GameSide, Gender};

    fn at(m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, m, d).unwrap().and_hms_opt(14, 0, 0).unwrap()
    }

    fn side(club: &str, score: Option<u32>) -> GameSide {
        GameSide { key: canonical(club), name: format!("{club} Hockey Club"), team_ref: None, club_ref: None, score }
    }

    fn game(round: u32, date: NaiveDateTime, home: GameSide, away: GameSide, status: GameStatus) -> Game {
        let ts = Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap();
        Game {
            id: identity::game_id("37291", round, &home.key, &away.key),
            competition_ref: DocRef::new(Collection::Competitions, identity::competition_id("21935")),
            fixture_ref: "37291".into(),
            round,
            date: Some(date),
            venue: None,
            home_team: home,
            away_team: away,
            status,
            created_at: ts,
            updated_at: ts,
        }
    }

    fn seeded() -> SqliteStore {
        let s = SqliteStore::in_memory().unwrap();
        let games = [
            game(1, at(4, 5), side("Mentone", Some(3)), side("Hawthorn", Some(1)), GameStatus::Completed),
            game(2, at(4, 10), side("Camberwell", Some(2)), side("Mentone", Some(2)), GameStatus::Completed),
            game(3, at(4, 11), side("Mentone", Some(0)), side("Waverley", Some(4)), GameStatus::Completed),
            game(4, at(4, 19), side("Mentone", None), side("Hawthorn", None), GameStatus::Scheduled),
            game(5, at(5, 30), side("Mentone", None), side("Camberwell", None), GameStatus::Scheduled),
        ];
        for g in &games {
            save(&s, Collection::Games, &g.id, g).unwrap();
        }
        s
    }

    #[test]
    fn upcoming_is_windowed_and_sorted() {
        let s = seeded();
        let up = upcoming_games(&s, at(4, 12), 14).unwrap();
        assert_eq!(up.iter().map(|g| g.round).collect::<Vec<_>>(), [4]);
        assert_eq!(upcoming_games(&s, at(4, 12), 60).unwrap().len(), 2);
    }

    #[test]
    fn weekly_results_from_the_clubs_side() {
        let s = seeded();
        let lines = weekly_results(&s, "Mentone", at(4, 12)).unwrap();
        let view: Vec<(u32, String, u32, u32)> = lines
            .iter()
            .map(|l| (l.game.round, l.outcome.to_string(), l.ours, l.theirs))
            .collect();
        assert_eq!(
            view,
            [(1, "WIN".to_string(), 3, 1), (2, "DRAW".to_string(), 2, 2), (3, "LOSS".to_string(), 0, 4)]
        );
        assert_eq!(lines[2].opponent, "Waverley Hockey Club");
    }

    #[test]
    fn team_games_cover_both_sides() {
        let s = seeded();
        let mentone = DocRef::new(Collection::Teams, identity::team_id("37291", "Mentone"));
        let mut undated = game(6, at(6, 1), side("Hawthorn", None), side("Mentone", None), GameStatus::Scheduled);
        undated.date = None;
        let mut unrelated = game(7, at(4, 2), side("Hawthorn", None), side("Camberwell", None), GameStatus::Scheduled);
        unrelated.home_team.team_ref = Some(DocRef::new(Collection::Teams, identity::team_id("37291", "Hawthorn")));
        for g in [undated, unrelated] {
            save(&s, Collection::Games, &g.id, &g).unwrap();
        }
        for v in s.all(Collection::Games).unwrap() {
            let mut g: Game = serde_json::from_value(v.body).unwrap();
            for half in [&mut g.home_team, &mut g.away_team] {
                if half.key == canonical("Mentone") {
                    half.team_ref = Some(mentone.clone());
                }
            }
            save(&s, Collection::Games, &g.id, &g).unwrap();
        }

        let games = team_games(&s, &mentone.id).unwrap();
        assert_eq!(games.iter().map(|g| g.round).collect::<Vec<_>>(), [1, 2, 3, 4, 5, 6]);
        assert!(team_games(&s, "team_nobody").unwrap().is_empty());
    }

    fn team(fixture: &str, club: &str, kind: TeamType) -> Team {
        Team {
            id: identity::team_id(fixture, club),
            name: format!("{club} Hockey Club"),
            label: format!("{club} - {fixture}"),
            grade: fixture.into(),
            club_ref: DocRef::new(Collection::Clubs, identity::club_id(club)),
            competition_ref: DocRef::new(Collection::Competitions, identity::competition_id(fixture)),
            external_comp_ref: fixture.into(),
            external_fixture_ref: fixture.into(),
            kind,
            gender: Gender::Unknown,
        }
    }

    #[test]
    fn team_lookups() {
        let s = SqliteStore::in_memory().unwrap();
        for t in [
            team("100", "Mentone", TeamType::Senior),
            team("100", "Hawthorn", TeamType::Senior),
            team("200", "Mentone", TeamType::MidweekMasters),
        ] {
            save(&s, Collection::Teams, &t.id, &t).unwrap();
        }
        let seniors = teams_by_type(&s, "Mentone", TeamType::Senior).unwrap();
        assert_eq!(seniors.len(), 1);
        assert_eq!(seniors[0].external_fixture_ref, "100");
        assert_eq!(teams_by_type(&s, "Mentone", TeamType::MidweekMasters).unwrap().len(), 1);

        let comp = competition_teams(&s, &identity::competition_id("100")).unwrap();
        assert_eq!(comp.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(), ["Hawthorn Hockey Club", "Mentone Hockey Club"]);
    }
}
