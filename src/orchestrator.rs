/// Fixture Sync — Orchestrator
///
/// Flow:
///   1. index page -> competitions (fatal if none)
///   2. round 1 of every fixture -> clubs and teams; home-club teams are tracked
///   3. every (fixture, round) with a tracked team -> games, on a bounded worker pool
///
/// A fixture's rounds stop at the first non-retryable fetch (the site 404s past
/// the last round). Everything else is scoped to the page or document it hit.

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDateTime, Utc};
use classifier::{classify, Classification};
use extractor::{Candidate, CompetitionCandidate, Extractor, GameCandidate, PageKind, SideCandidate, TeamFilter, TeamSighting};
use fetcher::{FetchFailure, Fetcher, Page, Transport};
use futures_util::stream::{self, StreamExt};
use logger::{now_iso, EventLogger, FetchFailureEvent, IdentityCollisionEvent, RunSummaryEvent, WriteCounts};
use model::{canonical, identity, Club, Collection, Competition, DocRef, Game, GameSide, GameStatus, Team, TeamType, Gender};
use reconciler::{ReconcileError, Reconciled, WriteDecision};
use regex::Regex;
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, LazyLock, Mutex};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::snapshot::{self, TeamRecord};
use crate::store::{self, CasOutcome, DocumentStore, QueryOp, StoreError};

/// Read-merge-CAS attempts per document before giving up on it.
const MAX_WRITE_ATTEMPTS: u32 = 3;

static SEASON_SUFFIX: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+-\s+(\d{4})\s*$").unwrap());

// ── Run mode / errors / clock ────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Competitions, clubs, teams, snapshot.
    Discover,
    /// Games for already-known teams.
    Games,
    Full,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Discover => "discover",
            RunMode::Games => "games",
            RunMode::Full => "full",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RunMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "discover" => Ok(RunMode::Discover),
            "games" => Ok(RunMode::Games),
            "full" => Ok(RunMode::Full),
            other => anyhow::bail!("unknown mode {other:?} (expected discover, games or full)"),
        }
    }
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("no competitions discovered at {url}")]
    NoCompetitions { url: String },
}

#[derive(Debug, Error)]
enum WriteError {
    #[error(transparent)]
    Collision(#[from] ReconcileError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Copy)]
pub enum Clock {
    System,
    Fixed(DateTime<Utc>),
}

impl Clock {
    fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::System => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// Wall-clock time, the frame fixture dates are printed in.
    fn wall(&self) -> NaiveDateTime {
        match self {
            Clock::System => Local::now().naive_local(),
            Clock::Fixed(t) => t.naive_utc(),
        }
    }
}

// ── Summary ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub competitions_scanned: u64,
    pub teams_tracked:  u64,
    pub competitions:   WriteCounts,
    pub clubs:          WriteCounts,
    pub teams:          WriteCounts,
    pub games:          WriteCounts,
    pub pages_fetched:  u64,
    pub fetch_failures: u64,
    pub collisions:     u64,
    pub store_failures: u64,
    pub cancelled:      bool,
}

impl RunSummary {
    fn counts_mut(&mut self, collection: Collection) -> &mut WriteCounts {
        match collection {
            Collection::Clubs => &mut self.clubs,
            Collection::Competitions => &mut self.competitions,
            Collection::Teams => &mut self.teams,
            Collection::Games => &mut self.games,
        }
    }

    /// Creates and updates across every collection.
    pub fn writes(&self) -> u64 {
        [&self.competitions, &self.clubs, &self.teams, &self.games]
            .iter()
            .map(|c| c.created + c.updated)
            .sum()
    }

    pub fn to_event(&self, mode: RunMode, elapsed_ms: u64) -> RunSummaryEvent {
        RunSummaryEvent {
            ts:             now_iso(),
            event:          "RUN_SUMMARY",
            mode:           mode.to_string(),
            competitions_scanned: self.competitions_scanned,
            teams_tracked:  self.teams_tracked,
            competitions:   self.competitions.clone(),
            clubs:          self.clubs.clone(),
            teams:          self.teams.clone(),
            games:          self.games.clone(),
            pages_fetched:  self.pages_fetched,
            fetch_failures: self.fetch_failures,
            collisions:     self.collisions,
            store_failures: self.store_failures,
            cancelled:      self.cancelled,
            elapsed_ms,
        }
    }
}

fn bump(counts: &mut WriteCounts, decision: WriteDecision) {
    match decision {
        WriteDecision::Create => counts.created += 1,
        WriteDecision::Update => counts.updated += 1,
        WriteDecision::Noop => counts.noop += 1,
    }
}

/// One round page of one fixture.
struct RoundUnit<'a> {
    comp_ref:    &'a str,
    fixture_ref: &'a str,
    round:       u32,
    focus:       &'a [String],
}

// ── Orchestrator ─────────────────────────────────────────────────────────────

pub struct Orchestrator<T: Transport, S: DocumentStore> {
    cfg:       Config,
    fetcher:   Fetcher<T>,
    extractor: Extractor,
    store:     Arc<S>,
    events:    Option<EventLogger>,
    clock:     Clock,
    summary:   Mutex<RunSummary>,
}

impl<T: Transport, S: DocumentStore> Orchestrator<T, S> {
    pub fn new(cfg: Config, fetcher: Fetcher<T>, store: Arc<S>) -> Self {
        let extractor = Extractor::new(TeamFilter::new(&cfg.club_designator, &cfg.excluded_fragments));
        Self {
            cfg,
            fetcher,
            extractor,
            store,
            events: None,
            clock: Clock::System,
            summary: Mutex::new(RunSummary::default()),
        }
    }

    pub fn with_events(mut self, events: EventLogger) -> Self {
        self.events = Some(events);
        self
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub async fn run(&self, mode: RunMode) -> Result<RunSummary> {
        self.tally(|s| *s = RunSummary::default());
        info!("=== Fixture sync: mode={} home_club={} ===", mode, self.cfg.home_club);

        match mode {
            RunMode::Discover => {
                let tracked = self.discover().await?;
                self.save_snapshot(&tracked);
            }
            RunMode::Games => {
                let tracked = self.tracked_teams()?;
                self.sync_games(&tracked).await;
            }
            RunMode::Full => {
                let tracked = self.discover().await?;
                self.save_snapshot(&tracked);
                self.sync_games(&tracked).await;
            }
        }

        let cancelled = self.fetcher.cancel_signal().is_cancelled();
        let mut summary = self.summary.lock().map(|s| s.clone()).unwrap_or_default();
        summary.cancelled = cancelled;
        Ok(summary)
    }

    fn tally(&self, f: impl FnOnce(&mut RunSummary)) {
        if let Ok(mut s) = self.summary.lock() {
            f(&mut s);
        }
    }

    // ── Discovery ────────────────────────────────────────────────────────────

    async fn discover(&self) -> Result<Vec<TeamRecord>> {
        let url = self.cfg.index_url.clone();
        info!("Discovering competitions from {}", url);

        let page = match self.fetch(&url).await {
            Ok(page) => page,
            Err(e) => {
                error!("Failed to get competition index: {}", e);
                return Err(SyncError::NoCompetitions { url }.into());
            }
        };
        let comps = self.extractor.competitions(&page.body);
        if comps.is_empty() {
            error!("No competitions found at {}. Aborting run.", url);
            return Err(SyncError::NoCompetitions { url }.into());
        }
        // A competition can list several fixtures; its record comes from the first one.
        let mut seen = HashSet::new();
        for c in comps.iter().filter(|c| seen.insert(c.comp_ref.as_str())) {
            let competition = self.competition_record(c);
            let comp_id = competition.id.clone();
            self.write(Collection::Competitions, &comp_id, competition, reconciler::reconcile_competition);
        }
        info!("Found {} competitions ({} fixtures)", seen.len(), comps.len());
        self.tally(|s| s.competitions_scanned = seen.len() as u64);

        let found: Vec<Vec<TeamRecord>> = stream::iter(comps.iter())
            .map(|c| self.discover_fixture(c))
            .buffer_unordered(self.cfg.concurrency)
            .collect()
            .await;

        let mut tracked: Vec<TeamRecord> = found.into_iter().flatten().collect();
        tracked.sort_by(|a, b| a.id.cmp(&b.id));
        tracked.dedup_by(|a, b| a.id == b.id);
        info!("Team discovery complete. Found {} {} teams.", tracked.len(), self.cfg.home_club);
        self.tally(|s| s.teams_tracked = tracked.len() as u64);
        Ok(tracked)
    }

    /// Clubs and teams from the fixture's round 1 page.
    async fn discover_fixture(&self, c: &CompetitionCandidate) -> Vec<TeamRecord> {
        if self.fetcher.cancel_signal().is_cancelled() {
            return Vec::new();
        }
        let url = self.cfg.round_url(&c.comp_ref, &c.fixture_ref, 1);
        debug!("Checking {} at {}", c.name, url);
        let Ok(page) = self.fetch(&url).await else {
            return Vec::new();
        };

        let home = canonical(&self.cfg.home_club);
        let mut tracked = Vec::new();
        for candidate in self.extractor.extract(&page.body, &PageKind::Round { focus: Vec::new() }) {
            let Candidate::Team(sighting) = candidate else {
                continue;
            };
            let club = self.club_record(&sighting.club_name);
            let club_id = club.id.clone();
            self.write(Collection::Clubs, &club_id, club, reconciler::reconcile_club);

            let team = self.team_record(c, &sighting);
            let team_id = team.id.clone();
            let Some(stored) = self.write(Collection::Teams, &team_id, team, reconciler::reconcile_team) else {
                continue;
            };
            if canonical(&sighting.club_name) == home {
                info!("Found team: {} ({}, {})", stored.label, stored.kind, stored.gender);
                tracked.push(TeamRecord::from_team(&stored, &sighting.club_name));
            }
        }
        if tracked.is_empty() {
            debug!("No {} teams found in {}", self.cfg.home_club, c.name);
        }
        tracked
    }

    fn competition_record(&self, c: &CompetitionCandidate) -> Competition {
        let name = if c.heading.is_empty() { c.name.clone() } else { c.heading.clone() };
        let Classification { kind, gender } = classify(&name);
        Competition {
            id:      identity::competition_id(&c.comp_ref),
            heading: c.heading.clone(),
            kind,
            gender,
            season:  season_of(&c.name).unwrap_or_else(|| self.cfg.default_season.clone()),
            external_comp_ref:    c.comp_ref.clone(),
            external_fixture_ref: c.fixture_ref.clone(),
            name,
        }
    }

    fn club_record(&self, club_name: &str) -> Club {
        Club {
            id:           identity::club_id(club_name),
            display_name: club_name.to_string(),
            short_code:   short_code(club_name),
            is_home_club: canonical(club_name) == canonical(&self.cfg.home_club),
        }
    }

    fn team_record(&self, c: &CompetitionCandidate, sighting: &TeamSighting) -> Team {
        // The grade names the team; the section heading fills whatever it leaves open.
        let mut cls = classify(&c.name);
        let fallback = classify(&c.heading);
        if cls.kind == TeamType::Unknown {
            cls.kind = fallback.kind;
        }
        if cls.gender == Gender::Unknown {
            cls.gender = fallback.gender;
        }
        Team {
            id:    identity::team_id(&c.fixture_ref, &sighting.club_name),
            name:  sighting.name.clone(),
            label: format!("{} - {}", sighting.club_name, grade_of(&c.name)),
            grade: c.name.clone(),
            club_ref:        DocRef::new(Collection::Clubs, identity::club_id(&sighting.club_name)),
            competition_ref: DocRef::new(Collection::Competitions, identity::competition_id(&c.comp_ref)),
            external_comp_ref:    c.comp_ref.clone(),
            external_fixture_ref: c.fixture_ref.clone(),
            kind:   cls.kind,
            gender: cls.gender,
        }
    }

    fn save_snapshot(&self, tracked: &[TeamRecord]) {
        match snapshot::write_snapshot(&self.cfg.snapshot_path, tracked) {
            Ok(()) => info!("Saved {} teams to {}", tracked.len(), self.cfg.snapshot_path.display()),
            Err(e) => warn!("Failed to save team snapshot: {:#}", e),
        }
    }

    /// Snapshot file if there is one, else the home club's teams in the store.
    fn tracked_teams(&self) -> Result<Vec<TeamRecord>> {
        if let Some(records) = snapshot::read_snapshot(&self.cfg.snapshot_path)? {
            info!("Loaded {} teams from {}", records.len(), self.cfg.snapshot_path.display());
            self.tally(|s| s.teams_tracked = records.len() as u64);
            return Ok(records);
        }
        let home_id = identity::club_id(&self.cfg.home_club);
        let teams: Vec<Team> = store::query_as(
            &*self.store,
            Collection::Teams,
            "club_ref.id",
            QueryOp::Eq,
            &serde_json::Value::String(home_id),
        )
        .context("load tracked teams from store")?;
        info!("Loaded {} teams from store", teams.len());
        self.tally(|s| s.teams_tracked = teams.len() as u64);
        let filter = self.extractor.filter();
        Ok(teams
            .iter()
            .map(|t| TeamRecord::from_team(t, &filter.club_name_of(&t.name)))
            .collect())
    }

    // ── Games ────────────────────────────────────────────────────────────────

    async fn sync_games(&self, tracked: &[TeamRecord]) {
        if tracked.is_empty() {
            warn!("No tracked teams, nothing to poll for games");
            return;
        }

        // fixture -> (comp, club keys to look for)
        let mut fixtures: BTreeMap<String, (String, Vec<String>)> = BTreeMap::new();
        for t in tracked {
            let entry = fixtures
                .entry(t.fixture_id.clone())
                .or_insert_with(|| (t.comp_id.clone(), Vec::new()));
            let key = canonical(&t.club);
            if !entry.1.contains(&key) {
                entry.1.push(key);
            }
        }

        // Round-major, so each fixture's ceiling is known before its later rounds are picked up.
        let units: Vec<RoundUnit<'_>> = (1..=self.cfg.max_rounds)
            .flat_map(|round| {
                fixtures.iter().map(move |(fixture, (comp, focus))| RoundUnit {
                    comp_ref: comp,
                    fixture_ref: fixture,
                    round,
                    focus,
                })
            })
            .collect();
        info!(
            "Polling up to {} rounds across {} fixtures ({} workers)",
            self.cfg.max_rounds,
            fixtures.len(),
            self.cfg.concurrency
        );

        let ceilings: Mutex<HashMap<String, u32>> = Mutex::new(HashMap::new());
        stream::iter(units)
            .map(|unit| self.sync_round(unit, &ceilings))
            .buffer_unordered(self.cfg.concurrency)
            .for_each(|_| async {})
            .await;
    }

    async fn sync_round(&self, unit: RoundUnit<'_>, ceilings: &Mutex<HashMap<String, u32>>) {
        if self.fetcher.cancel_signal().is_cancelled() {
            return;
        }
        let past_end = ceilings
            .lock()
            .map(|c| c.get(unit.fixture_ref).is_some_and(|&last| unit.round >= last))
            .unwrap_or(false);
        if past_end {
            return;
        }

        let url = self.cfg.round_url(unit.comp_ref, unit.fixture_ref, unit.round);
        let page = match self.fetch(&url).await {
            Ok(page) => page,
            Err(FetchFailure::NonRetryable { status, .. }) => {
                debug!("No round {} for fixture {} (HTTP {})", unit.round, unit.fixture_ref, status);
                if let Ok(mut c) = ceilings.lock() {
                    let last = c.entry(unit.fixture_ref.to_string()).or_insert(unit.round);
                    *last = (*last).min(unit.round);
                }
                return;
            }
            Err(_) => return,
        };

        let now = self.clock.now();
        let wall = self.clock.wall();
        let kind = PageKind::Round { focus: unit.focus.to_vec() };
        let mut seen = 0;
        for candidate in self.extractor.extract(&page.body, &kind) {
            let Candidate::Game(g) = candidate else {
                continue;
            };
            let game = match self.game_record(&unit, g, now, wall) {
                Ok(game) => game,
                Err(e) => {
                    warn!("Could not resolve sides for a game in {}: {}", url, e);
                    self.tally(|s| s.store_failures += 1);
                    continue;
                }
            };
            let id = game.id.clone();
            self.write(Collection::Games, &id, game, |c, e| reconciler::reconcile_game(c, e, now, wall));
            seen += 1;
        }
        debug!(fixture = unit.fixture_ref, round = unit.round, games = seen, "round processed");
    }

    fn game_record(
        &self,
        unit: &RoundUnit<'_>,
        g: GameCandidate,
        now: DateTime<Utc>,
        wall: NaiveDateTime,
    ) -> Result<Game, StoreError> {
        if let Some(printed) = g.round.filter(|&r| r != unit.round) {
            debug!("Page for round {} prints round {}; using {}", unit.round, printed, unit.round);
        }
        let home = self.side(unit.fixture_ref, g.home)?;
        let away = self.side(unit.fixture_ref, g.away)?;
        Ok(Game {
            id:              identity::game_id(unit.fixture_ref, unit.round, &home.key, &away.key),
            competition_ref: DocRef::new(Collection::Competitions, identity::competition_id(unit.comp_ref)),
            fixture_ref:     unit.fixture_ref.to_string(),
            round:           unit.round,
            status:          GameStatus::derive(home.score, away.score, g.date, wall),
            date:            g.date,
            venue:           g.venue,
            home_team:       home,
            away_team:       away,
            created_at:      now,
            updated_at:      now,
        })
    }

    /// References are attached only once the team or club document exists.
    fn side(&self, fixture_ref: &str, s: SideCandidate) -> Result<GameSide, StoreError> {
        let team_id = identity::team_id(fixture_ref, &s.club_name);
        let club_id = identity::club_id(&s.club_name);
        let team_ref = store::exists(&*self.store, Collection::Teams, &team_id)?
            .then(|| DocRef::new(Collection::Teams, team_id));
        let club_ref = store::exists(&*self.store, Collection::Clubs, &club_id)?
            .then(|| DocRef::new(Collection::Clubs, club_id));
        Ok(GameSide {
            key: canonical(&s.club_name),
            name: s.name,
            team_ref,
            club_ref,
            score: s.score,
        })
    }

    // ── Fetch / write plumbing ───────────────────────────────────────────────

    async fn fetch(&self, url: &str) -> Result<Page, FetchFailure> {
        let result = self.fetcher.fetch(url).await;
        match &result {
            Ok(_) => self.tally(|s| s.pages_fetched += 1),
            Err(e @ FetchFailure::TransientExhausted { .. }) => {
                warn!("Skipping {}: {}", url, e);
                self.tally(|s| s.fetch_failures += 1);
                self.emit(&FetchFailureEvent {
                    ts:     now_iso(),
                    event:  "FETCH_FAILURE",
                    url:    url.to_string(),
                    kind:   "transient_exhausted".into(),
                    detail: e.to_string(),
                });
            }
            Err(FetchFailure::NonRetryable { .. }) | Err(FetchFailure::Cancelled { .. }) => {}
        }
        result
    }

    /// Reconcile one document and store it. Failures stay scoped to this document.
    fn write<D, F>(&self, collection: Collection, id: &str, candidate: D, merge: F) -> Option<D>
    where
        D: Serialize + DeserializeOwned + Clone,
        F: Fn(D, Option<&D>) -> Result<Reconciled<D>, ReconcileError>,
    {
        match self.reconcile_and_store(collection, id, candidate, &merge) {
            Ok(r) => {
                self.tally(|s| bump(s.counts_mut(collection), r.decision));
                Some(r.record)
            }
            Err(WriteError::Collision(e)) => {
                error!("IDENTITY COLLISION: {}", e);
                self.tally(|s| s.collisions += 1);
                let ReconcileError::IdentityCollision { collection, id, detail } = e;
                self.emit(&IdentityCollisionEvent {
                    ts:         now_iso(),
                    event:      "IDENTITY_COLLISION",
                    collection: collection.to_string(),
                    id,
                    detail,
                });
                None
            }
            Err(WriteError::Store(e)) => {
                warn!("Store write for {}/{} failed: {}", collection, id, e);
                self.tally(|s| s.store_failures += 1);
                None
            }
        }
    }

    /// Always merges against the latest stored version; a concurrent writer
    /// makes the CAS fail and the merge is redone.
    fn reconcile_and_store<D, F>(
        &self,
        collection: Collection,
        id: &str,
        candidate: D,
        merge: &F,
    ) -> Result<Reconciled<D>, WriteError>
    where
        D: Serialize + DeserializeOwned + Clone,
        F: Fn(D, Option<&D>) -> Result<Reconciled<D>, ReconcileError>,
    {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            let (existing, version) = match store::load::<D, S>(&*self.store, collection, id)? {
                Some((doc, version)) => (Some(doc), Some(version)),
                None => (None, None),
            };
            let merged = merge(candidate.clone(), existing.as_ref())?;
            if merged.decision == WriteDecision::Noop {
                return Ok(merged);
            }
            let body = serde_json::to_value(&merged.record).map_err(StoreError::from)?;
            match self.store.compare_and_set(collection, id, version, &body)? {
                CasOutcome::Applied(_) => return Ok(merged),
                CasOutcome::Conflict => debug!("{}/{} changed underneath (attempt {}), re-reading", collection, id, attempt),
            }
        }
        Err(StoreError::Contention { collection, id: id.to_string(), attempts: MAX_WRITE_ATTEMPTS }.into())
    }

    fn emit<E: Serialize>(&self, event: &E) {
        if let Some(events) = &self.events {
            if let Err(e) = events.log(event) {
                warn!("Event log write failed: {}", e);
            }
        }
    }
}

// ── Name helpers ─────────────────────────────────────────────────────────────

/// "Men's Vic League 1 - 2025" -> "2025"
fn season_of(name: &str) -> Option<String> {
    SEASON_SUFFIX.captures(name).map(|c| c[1].to_string())
}

/// "Men's Vic League 1 - 2025" -> "Men's Vic League 1"
fn grade_of(name: &str) -> String {
    SEASON_SUFFIX.replace(name, "").trim().to_string()
}

/// Upper-case initials: "Box Hill" -> "BH".
fn short_code(club_name: &str) -> String {
    club_name
        .split_whitespace()
        .filter_map(|w| w.chars().find(|c| c.is_alphanumeric()))
        .flat_map(char::to_uppercase)
        .collect()
}
