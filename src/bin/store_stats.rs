use anyhow::{Context, Result};
use fixture_sync::{Config, DocumentStore, SqliteStore};
use model::{Collection, Game, GameStatus};
use std::collections::BTreeMap;

fn main() -> Result<()> {
    dotenv::dotenv().ok();
    let cfg = Config::from_env()?;
    let db_path = cfg.db_path.display().to_string();
    let store = SqliteStore::open(&cfg.db_path).with_context(|| format!("open db at {db_path}"))?;

    println!("db_path={db_path}");
    for c in Collection::ALL {
        let count = store.count(c).with_context(|| format!("count {c}"))?;
        println!("{c}: {count}");
    }

    let mut by_status: BTreeMap<String, u64> = BTreeMap::new();
    for doc in store.all(Collection::Games).context("read games")? {
        let status = serde_json::from_value::<Game>(doc.body)
            .map(|g| g.status.to_string())
            .unwrap_or_else(|_| "<unreadable>".to_string());
        *by_status.entry(status).or_default() += 1;
    }
    for s in [GameStatus::Scheduled, GameStatus::InProgress, GameStatus::Completed] {
        println!("games.{s}: {}", by_status.remove(&s.to_string()).unwrap_or(0));
    }
    for (s, n) in by_status {
        println!("games.{s}: {n}");
    }

    Ok(())
}
