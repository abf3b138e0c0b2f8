/// Fixture Sync — report
///
///   fixture-report upcoming [days]       games in the next N days (default 7)
///   fixture-report weekly                home club results of the last 7 days
///   fixture-report team <team_id>        home and away games of one team (document id)
///   fixture-report teams <type>          Senior | Junior | Midweek/Masters
///   fixture-report competition <comp_id> teams of one competition (document id)

use anyhow::{bail, Context, Result};
use chrono::Local;
use fixture_sync::{report, Config, SqliteStore};
use model::TeamType;
use std::env;

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cfg = Config::from_env()?;
    let store = SqliteStore::open(&cfg.db_path).with_context(|| format!("open db at {}", cfg.db_path.display()))?;
    let now = Local::now().naive_local();

    let args: Vec<String> = env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("upcoming") | None => {
            let days = match args.get(1) {
                Some(d) => d.parse::<i64>().with_context(|| format!("days must be a number, got {d:?}"))?,
                None => 7,
            };
            let games = report::upcoming_games(&store, now, days)?;
            println!("Upcoming games (next {days} days): {}", games.len());
            for g in games {
                let date = g.date.map(|d| d.format("%a %d %b %H:%M").to_string()).unwrap_or_else(|| "TBC".into());
                println!(
                    "  {date}  R{}  {} vs {}  @ {}",
                    g.round,
                    g.home_team.name,
                    g.away_team.name,
                    g.venue.as_deref().unwrap_or("venue TBC")
                );
            }
        }
        Some("weekly") => {
            let lines = report::weekly_results(&store, &cfg.home_club, now)?;
            println!("{} results, last 7 days: {}", cfg.home_club, lines.len());
            for l in lines {
                println!("  {:<4} {}-{} vs {}  (R{})", l.outcome, l.ours, l.theirs, l.opponent, l.game.round);
            }
        }
        Some("team") => {
            let Some(id) = args.get(1) else {
                bail!("usage: fixture-report team <team_id>");
            };
            let games = report::team_games(&store, id)?;
            println!("Games for {id}: {}", games.len());
            for g in games {
                let date = g.date.map(|d| d.format("%a %d %b %H:%M").to_string()).unwrap_or_else(|| "TBC".into());
                let score = match (g.home_team.score, g.away_team.score) {
                    (Some(h), Some(a)) => format!("{h}-{a}"),
                    _ => g.status.to_string(),
                };
                println!("  {date}  R{}  {} vs {}  {score}", g.round, g.home_team.name, g.away_team.name);
            }
        }
        Some("teams") => {
            let Some(raw) = args.get(1) else {
                bail!("usage: fixture-report teams <Senior|Junior|Midweek/Masters>");
            };
            let kind: TeamType = serde_json::from_value(serde_json::Value::String(raw.clone()))
                .with_context(|| format!("unknown team type {raw:?}"))?;
            let teams = report::teams_by_type(&store, &cfg.home_club, kind)?;
            println!("{kind} teams: {}", teams.len());
            for t in teams {
                println!("  {} ({})", t.label, t.gender);
            }
        }
        Some("competition") => {
            let Some(id) = args.get(1) else {
                bail!("usage: fixture-report competition <comp_id>");
            };
            let teams = report::competition_teams(&store, id)?;
            println!("Teams in {id}: {}", teams.len());
            for t in teams {
                println!("  {}  [{}]", t.name, t.label);
            }
        }
        Some(other) => bail!("unknown report {other:?} (upcoming, weekly, team, teams, competition)"),
    }
    Ok(())
}
