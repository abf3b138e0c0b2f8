/// Fixture Sync — Reconciler
/// Merges a freshly extracted record into the persisted one.
///
/// Policy:
///   - nothing persisted: the candidate is written as-is (create)
///   - optional fields (score, venue, date, refs): candidate wins only when present
///   - status is derived again from the merged record and never moves backwards;
///     completed is terminal
///   - competitions are append-only, clubs immutable, teams only gain classification
///   - noop only when the merged record equals the persisted one

use chrono::{DateTime, NaiveDateTime, Utc};
use model::{canonical, Club, Collection, Competition, Game, GameSide, GameStatus, Gender, Team, TeamType};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteDecision {
    Create,
    Update,
    Noop,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled<T> {
    pub record:   T,
    pub decision: WriteDecision,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcileError {
    /// Same id, different natural key. Should never happen; if it does, data is at risk.
    #[error("identity collision on {collection}/{id}: {detail}")]
    IdentityCollision { collection: Collection, id: String, detail: String },
}

fn collision(collection: Collection, id: &str, detail: String) -> ReconcileError {
    ReconcileError::IdentityCollision { collection, id: id.to_string(), detail }
}

fn settle<T: PartialEq>(merged: T, existing: &T) -> Reconciled<T> {
    let decision = if &merged == existing { WriteDecision::Noop } else { WriteDecision::Update };
    Reconciled { record: merged, decision }
}

fn created<T>(record: T) -> Reconciled<T> {
    Reconciled { record, decision: WriteDecision::Create }
}

/// Old -> new, never backwards.
pub fn merge_status(old: GameStatus, new: GameStatus) -> GameStatus {
    old.max(new)
}

// ── Games ────────────────────────────────────────────────────────────────────

/// `now` stamps `updated_at`; `wall` is the frame fixture dates are printed in.
pub fn reconcile_game(
    candidate: Game,
    existing: Option<&Game>,
    now: DateTime<Utc>,
    wall: NaiveDateTime,
) -> Result<Reconciled<Game>, ReconcileError> {
    let Some(existing) = existing else {
        return Ok(created(candidate));
    };

    if existing.fixture_ref != candidate.fixture_ref
        || existing.round != candidate.round
        || existing.participant_keys() != candidate.participant_keys()
    {
        return Err(collision(
            Collection::Games,
            &existing.id,
            format!(
                "stored {}/r{} {:?}, candidate {}/r{} {:?}",
                existing.fixture_ref,
                existing.round,
                existing.participant_keys(),
                candidate.fixture_ref,
                candidate.round,
                candidate.participant_keys(),
            ),
        ));
    }

    // Orientation follows the latest page; each side merges with its own stored side.
    let home_prev = existing.side_for(&candidate.home_team.key);
    let away_prev = existing.side_for(&candidate.away_team.key);
    let home = merge_side(candidate.home_team, home_prev);
    let away = merge_side(candidate.away_team, away_prev);
    let date = candidate.date.or(existing.date);
    let derived = GameStatus::derive(home.score, away.score, date, wall);

    let mut merged = Game {
        id:              existing.id.clone(),
        competition_ref: candidate.competition_ref,
        fixture_ref:     existing.fixture_ref.clone(),
        round:           existing.round,
        date,
        venue:           candidate.venue.or_else(|| existing.venue.clone()),
        home_team:       home,
        away_team:       away,
        status:          merge_status(existing.status, candidate.status.max(derived)),
        created_at:      existing.created_at,
        updated_at:      existing.updated_at,
    };

    if merged == *existing {
        return Ok(Reconciled { record: merged, decision: WriteDecision::Noop });
    }
    if existing.status == GameStatus::Completed && candidate.status != GameStatus::Completed {
        debug!(id = %existing.id, "kept terminal status over {}", candidate.status);
    }
    merged.updated_at = now;
    Ok(Reconciled { record: merged, decision: WriteDecision::Update })
}

fn merge_side(candidate: GameSide, existing: Option<&GameSide>) -> GameSide {
    let Some(existing) = existing else {
        return candidate;
    };
    GameSide {
        key:      candidate.key,
        name:     candidate.name,
        team_ref: candidate.team_ref.or_else(|| existing.team_ref.clone()),
        club_ref: candidate.club_ref.or_else(|| existing.club_ref.clone()),
        score:    candidate.score.or(existing.score),
    }
}

// ── Teams, competitions, clubs ───────────────────────────────────────────────

pub fn reconcile_team(candidate: Team, existing: Option<&Team>) -> Result<Reconciled<Team>, ReconcileError> {
    let Some(existing) = existing else {
        return Ok(created(candidate));
    };
    if existing.external_fixture_ref != candidate.external_fixture_ref || existing.club_ref != candidate.club_ref {
        return Err(collision(
            Collection::Teams,
            &existing.id,
            format!(
                "stored {}/{}, candidate {}/{}",
                existing.external_fixture_ref, existing.club_ref.id, candidate.external_fixture_ref, candidate.club_ref.id
            ),
        ));
    }

    let mut merged = existing.clone();
    if merged.kind == TeamType::Unknown {
        merged.kind = candidate.kind;
    }
    if merged.gender == Gender::Unknown {
        merged.gender = candidate.gender;
    }
    if merged.label.is_empty() {
        merged.label = candidate.label;
    }
    if merged.grade.is_empty() {
        merged.grade = candidate.grade;
    }
    Ok(settle(merged, existing))
}

/// Append-only: the first sighting stands.
pub fn reconcile_competition(
    candidate: Competition,
    existing: Option<&Competition>,
) -> Result<Reconciled<Competition>, ReconcileError> {
    let Some(existing) = existing else {
        return Ok(created(candidate));
    };
    if existing.external_comp_ref != candidate.external_comp_ref {
        return Err(collision(
            Collection::Competitions,
            &existing.id,
            format!("stored comp {}, candidate comp {}", existing.external_comp_ref, candidate.external_comp_ref),
        ));
    }
    Ok(Reconciled { record: existing.clone(), decision: WriteDecision::Noop })
}

/// Immutable once created.
pub fn reconcile_club(candidate: Club, existing: Option<&Club>) -> Result<Reconciled<Club>, ReconcileError> {
    let Some(existing) = existing else {
        return Ok(created(candidate));
    };
    if canonical(&existing.display_name) != canonical(&candidate.display_name) {
        return Err(collision(
            Collection::Clubs,
            &existing.id,
            format!("stored '{}', candidate '{}'", existing.display_name, candidate.display_name),
        ));
    }
    Ok(Reconciled { record: existing.clone(), decision: WriteDecision::Noop })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};
    use model::{identity, DocRef};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 1, 0, 0, 0).unwrap()
    }

    fn t1() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 4, 20, 0, 0, 0).unwrap()
    }

    /// Wall clock ahead of the 12 Apr 14:00 fixture date.
    fn before_kickoff() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, 1).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    fn after_kickoff() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 4, 20).unwrap().and_hms_opt(9, 0, 0).unwrap()
    }

    fn side(club: &str, score: Option<u32>, resolved: bool) -> GameSide {
        GameSide {
            key: canonical(club),
            name: format!("{club} Hockey Club"),
            team_ref: resolved.then(|| DocRef::new(Collection::Teams, identity::team_id("37291", club))),
            club_ref: resolved.then(|| DocRef::new(Collection::Clubs, identity::club_id(club))),
            score,
        }
    }

    fn game(home: GameSide, away: GameSide, status: GameStatus) -> Game {
        Game {
            id: identity::game_id("37291", 3, &home.key, &away.key),
            competition_ref: DocRef::new(Collection::Competitions, identity::competition_id("21935")),
            fixture_ref: "37291".into(),
            round: 3,
            date: NaiveDate::from_ymd_opt(2025, 4, 12).unwrap().and_hms_opt(14, 0, 0),
            venue: Some("Mentone Grammar Playing Fields".into()),
            home_team: home,
            away_team: away,
            status,
            created_at: t0(),
            updated_at: t0(),
        }
    }

    #[test]
    fn first_sighting_is_created_verbatim() {
        let g = game(side("Mentone", None, true), side("Hawthorn", None, true), GameStatus::Scheduled);
        let r = reconcile_game(g.clone(), None, t1(), before_kickoff()).unwrap();
        assert_eq!(r.decision, WriteDecision::Create);
        assert_eq!(r.record, g);
    }

    #[test]
    fn identical_resighting_is_noop() {
        let stored = game(side("Mentone", Some(3), true), side("Hawthorn", Some(1), true), GameStatus::Completed);
        let mut again = stored.clone();
        again.created_at = t1();
        again.updated_at = t1();
        let r = reconcile_game(again, Some(&stored), t1(), before_kickoff()).unwrap();
        assert_eq!(r.decision, WriteDecision::Noop);
        assert_eq!(r.record, stored);
    }

    #[test]
    fn missing_fields_never_erase_stored_ones() {
        let stored = game(side("Mentone", Some(3), true), side("Hawthorn", Some(1), true), GameStatus::Completed);
        let mut gap = game(side("Mentone", None, false), side("Hawthorn", None, false), GameStatus::Scheduled);
        gap.date = None;
        gap.venue = None;
        let r = reconcile_game(gap, Some(&stored), t1(), before_kickoff()).unwrap();
        assert_eq!(r.decision, WriteDecision::Noop);
        assert_eq!(r.record.home_team.score, Some(3));
        assert_eq!(r.record.away_team.score, Some(1));
        assert_eq!(r.record.venue, stored.venue);
        assert_eq!(r.record.date, stored.date);
        assert_eq!(r.record.home_team.team_ref, stored.home_team.team_ref);
    }

    #[test]
    fn swapped_orientation_merges_by_club() {
        let stored = game(side("Mentone", Some(3), true), side("Hawthorn", None, true), GameStatus::InProgress);
        let swapped = game(side("Hawthorn", Some(1), false), side("Mentone", None, false), GameStatus::InProgress);
        assert_eq!(swapped.id, stored.id);
        let r = reconcile_game(swapped, Some(&stored), t1(), before_kickoff()).unwrap();
        assert_eq!(r.decision, WriteDecision::Update);
        assert_eq!(r.record.away_team.key, canonical("Mentone"));
        assert_eq!(r.record.away_team.score, Some(3));
        assert_eq!(r.record.home_team.score, Some(1));
        assert!(r.record.home_team.team_ref.is_some());
        assert_eq!(r.record.updated_at, t1());
        assert_eq!(r.record.created_at, t0());
    }

    #[test]
    fn status_never_regresses() {
        use GameStatus::*;
        let all = [Scheduled, InProgress, Completed];
        for a in all {
            for b in all {
                for c in all {
                    let mut stored: Option<Game> = None;
                    let mut seen = Vec::new();
                    for s in [a, b, c] {
                        let cand = game(side("Mentone", None, true), side("Hawthorn", None, true), s);
                        let r = reconcile_game(cand, stored.as_ref(), t1(), before_kickoff()).unwrap();
                        seen.push(r.record.status);
                        stored = Some(r.record);
                    }
                    assert!(seen.windows(2).all(|w| w[0] <= w[1]), "{a:?} {b:?} {c:?} -> {seen:?}");
                    assert_eq!(*seen.last().unwrap(), a.max(b).max(c));
                }
            }
        }
    }

    #[test]
    fn scores_from_two_runs_complete_the_game() {
        let stored = game(side("Mentone", Some(3), true), side("Hawthorn", None, true), GameStatus::InProgress);
        let later = game(side("Mentone", None, true), side("Hawthorn", Some(1), true), GameStatus::InProgress);
        let r = reconcile_game(later, Some(&stored), t1(), after_kickoff()).unwrap();
        assert_eq!(r.decision, WriteDecision::Update);
        assert_eq!((r.record.home_team.score, r.record.away_team.score), (Some(3), Some(1)));
        assert_eq!(r.record.status, GameStatus::Completed);
    }

    #[test]
    fn stored_date_in_the_past_promotes_scheduled_game() {
        let stored = game(side("Mentone", None, true), side("Hawthorn", None, true), GameStatus::Scheduled);
        let mut undated = stored.clone();
        undated.date = None;
        undated.status = GameStatus::Scheduled;
        let r = reconcile_game(undated, Some(&stored), t1(), after_kickoff()).unwrap();
        assert_eq!(r.decision, WriteDecision::Update);
        assert_eq!(r.record.date, stored.date);
        assert_eq!(r.record.status, GameStatus::InProgress);
        assert_eq!(r.record.updated_at, t1());
    }

    #[test]
    fn derived_status_still_never_regresses() {
        let stored = game(side("Mentone", Some(3), true), side("Hawthorn", Some(1), true), GameStatus::Completed);
        let mut early = stored.clone();
        early.date = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap().and_hms_opt(14, 0, 0);
        early.home_team.score = None;
        early.status = GameStatus::Scheduled;
        let r = reconcile_game(early, Some(&stored), t1(), before_kickoff()).unwrap();
        assert_eq!(r.record.status, GameStatus::Completed);
    }

    #[test]
    fn same_status_alone_is_noop() {
        let stored = game(side("Mentone", None, true), side("Hawthorn", None, true), GameStatus::InProgress);
        let r = reconcile_game(stored.clone(), Some(&stored), t1(), before_kickoff()).unwrap();
        assert_eq!(r.decision, WriteDecision::Noop);
    }

    #[test]
    fn opponent_reference_attaches_later_without_touching_id_or_scores() {
        let mut first = game(side("Mentone", Some(2), true), side("Hawthorn", Some(2), false), GameStatus::Completed);
        first.away_team.club_ref = None;
        let created = reconcile_game(first, None, t0(), before_kickoff()).unwrap().record;
        assert!(created.away_team.team_ref.is_none());

        let later = game(side("Mentone", Some(2), true), side("Hawthorn", Some(2), true), GameStatus::Completed);
        let r = reconcile_game(later, Some(&created), t1(), before_kickoff()).unwrap();
        assert_eq!(r.decision, WriteDecision::Update);
        assert_eq!(r.record.id, created.id);
        assert!(r.record.away_team.team_ref.is_some());
        assert_eq!((r.record.home_team.score, r.record.away_team.score), (Some(2), Some(2)));
    }

    #[test]
    fn mismatched_natural_key_is_a_collision() {
        let stored = game(side("Mentone", None, true), side("Hawthorn", None, true), GameStatus::Scheduled);
        let mut other = game(side("Mentone", None, true), side("Camberwell", None, true), GameStatus::Scheduled);
        other.id = stored.id.clone();
        let err = reconcile_game(other, Some(&stored), t1(), before_kickoff()).unwrap_err();
        assert!(matches!(err, ReconcileError::IdentityCollision { collection: Collection::Games, .. }));
    }

    fn team(kind: TeamType, gender: Gender) -> Team {
        Team {
            id: identity::team_id("37291", "Mentone"),
            name: "Mentone Hockey Club".into(),
            label: "Mentone - Men's Vic League 1".into(),
            grade: "Men's Vic League 1 - 2025".into(),
            club_ref: DocRef::new(Collection::Clubs, identity::club_id("Mentone")),
            competition_ref: DocRef::new(Collection::Competitions, identity::competition_id("21935")),
            external_comp_ref: "21935".into(),
            external_fixture_ref: "37291".into(),
            kind,
            gender,
        }
    }

    #[test]
    fn team_only_gains_classification() {
        let stored = team(TeamType::Unknown, Gender::Men);
        let mut cand = team(TeamType::Senior, Gender::Women);
        cand.name = "Mentone Hockey Club 2025".into();
        let r = reconcile_team(cand, Some(&stored)).unwrap();
        assert_eq!(r.decision, WriteDecision::Update);
        assert_eq!(r.record.kind, TeamType::Senior);
        assert_eq!(r.record.gender, Gender::Men);
        assert_eq!(r.record.name, "Mentone Hockey Club");

        let again = reconcile_team(team(TeamType::Junior, Gender::Men), Some(&r.record)).unwrap();
        assert_eq!(again.decision, WriteDecision::Noop);
    }

    #[test]
    fn competitions_are_append_only() {
        let comp = Competition {
            id: identity::competition_id("21935"),
            name: "Senior Competition 2025".into(),
            heading: "Senior Competition 2025".into(),
            kind: TeamType::Senior,
            gender: Gender::Unknown,
            season: "2025".into(),
            external_comp_ref: "21935".into(),
            external_fixture_ref: "37291".into(),
        };
        let mut renamed = comp.clone();
        renamed.name = "Something else".into();
        renamed.external_fixture_ref = "37292".into();
        let r = reconcile_competition(renamed, Some(&comp)).unwrap();
        assert_eq!(r.decision, WriteDecision::Noop);
        assert_eq!(r.record, comp);
    }

    #[test]
    fn clubs_are_immutable_and_checked() {
        let club = Club {
            id: identity::club_id("Mentone"),
            display_name: "Mentone Hockey Club".into(),
            short_code: "M".into(),
            is_home_club: true,
        };
        let r = reconcile_club(club.clone(), Some(&club)).unwrap();
        assert_eq!(r.decision, WriteDecision::Noop);

        let mut other = club.clone();
        other.display_name = "Hawthorn Hockey Club".into();
        assert!(reconcile_club(other, Some(&club)).is_err());
    }
}
