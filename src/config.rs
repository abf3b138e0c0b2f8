//! Run configuration, read from the environment (after `.env`).

use anyhow::{bail, Context, Result};
use chrono::Datelike;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub index_url:          String,
    pub games_base_url:     String,
    pub home_club:          String,
    pub club_designator:    String,
    pub excluded_fragments: Vec<String>,
    pub max_rounds:         u32,
    pub request_timeout:    Duration,
    pub max_retries:        u32,
    pub retry_delay:        Duration,
    pub politeness_delay:   Duration,
    pub concurrency:        usize,
    pub deadline:           Option<Duration>,
    pub db_path:            PathBuf,
    pub snapshot_path:      PathBuf,
    pub log_dir:            PathBuf,
    pub default_season:     String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            index_url:          "https://www.revolutionise.com.au/vichockey/games/".into(),
            games_base_url:     "https://www.hockeyvictoria.org.au/games/".into(),
            home_club:          "Mentone".into(),
            club_designator:    "hockey club".into(),
            excluded_fragments: vec!["playing fields".into(), "grammar".into()],
            max_rounds:         20,
            request_timeout:    Duration::from_secs(10),
            max_retries:        3,
            retry_delay:        Duration::from_millis(2000),
            politeness_delay:   Duration::from_millis(500),
            concurrency:        4,
            deadline:           None,
            db_path:            PathBuf::from("data/fixtures.db"),
            snapshot_path:      PathBuf::from("data/teams.json"),
            log_dir:            PathBuf::from("logs"),
            default_season:     chrono::Local::now().year().to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as `from_env` but over any key lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut cfg = Self::default();
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());

        if let Some(v) = get("SYNC_INDEX_URL") {
            cfg.index_url = non_empty("SYNC_INDEX_URL", v)?;
        }
        if let Some(v) = get("SYNC_GAMES_BASE_URL") {
            cfg.games_base_url = non_empty("SYNC_GAMES_BASE_URL", v)?;
        }
        if let Some(v) = get("SYNC_HOME_CLUB") {
            cfg.home_club = non_empty("SYNC_HOME_CLUB", v)?;
        }
        if let Some(v) = get("SYNC_CLUB_DESIGNATOR") {
            cfg.club_designator = non_empty("SYNC_CLUB_DESIGNATOR", v)?;
        }
        if let Some(v) = get("SYNC_EXCLUDED_FRAGMENTS") {
            cfg.excluded_fragments = v
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }
        if let Some(v) = get("SYNC_MAX_ROUNDS") {
            cfg.max_rounds = number("SYNC_MAX_ROUNDS", &v)?;
        }
        if let Some(v) = get("SYNC_REQUEST_TIMEOUT_SECS") {
            cfg.request_timeout = Duration::from_secs(number("SYNC_REQUEST_TIMEOUT_SECS", &v)?);
        }
        if let Some(v) = get("SYNC_MAX_RETRIES") {
            cfg.max_retries = number("SYNC_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("SYNC_RETRY_DELAY_MS") {
            cfg.retry_delay = Duration::from_millis(number("SYNC_RETRY_DELAY_MS", &v)?);
        }
        if let Some(v) = get("SYNC_POLITENESS_DELAY_MS") {
            cfg.politeness_delay = Duration::from_millis(number("SYNC_POLITENESS_DELAY_MS", &v)?);
        }
        if let Some(v) = get("SYNC_CONCURRENCY") {
            cfg.concurrency = number("SYNC_CONCURRENCY", &v)?;
            if cfg.concurrency == 0 {
                bail!("SYNC_CONCURRENCY must be at least 1");
            }
        }
        if let Some(v) = get("SYNC_DEADLINE_SECS").filter(|v| !v.is_empty()) {
            cfg.deadline = Some(Duration::from_secs(number("SYNC_DEADLINE_SECS", &v)?));
        }
        if let Some(v) = get("SYNC_DB_PATH") {
            cfg.db_path = PathBuf::from(non_empty("SYNC_DB_PATH", v)?);
        }
        if let Some(v) = get("SYNC_SNAPSHOT_PATH") {
            cfg.snapshot_path = PathBuf::from(non_empty("SYNC_SNAPSHOT_PATH", v)?);
        }
        if let Some(v) = get("SYNC_LOG_DIR") {
            cfg.log_dir = PathBuf::from(non_empty("SYNC_LOG_DIR", v)?);
        }
        if let Some(v) = get("SYNC_DEFAULT_SEASON") {
            cfg.default_season = non_empty("SYNC_DEFAULT_SEASON", v)?;
        }
        Ok(cfg)
    }

    /// `{base}/{comp}/{fixture}/round/{n}`
    pub fn round_url(&self, comp_ref: &str, fixture_ref: &str, round: u32) -> String {
        format!(
            "{}/{comp_ref}/{fixture_ref}/round/{round}",
            self.games_base_url.trim_end_matches('/')
        )
    }
}

fn non_empty(key: &str, value: String) -> Result<String> {
    if value.is_empty() {
        bail!("{key} is set but empty");
    }
    Ok(value)
}

fn number<N>(key: &str, value: &str) -> Result<N>
where
    N: FromStr,
    N::Err: std::error::Error + Send + Sync + 'static,
{
    value.parse::<N>().with_context(|| format!("{key}={value:?} is not a valid number"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let cfg = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(cfg.max_rounds, 20);
        assert_eq!(cfg.retry_delay, Duration::from_secs(2));
        assert_eq!(cfg.excluded_fragments, vec!["playing fields", "grammar"]);
        assert!(cfg.deadline.is_none());
        assert_eq!(
            cfg.round_url("21935", "37291", 3),
            "https://www.hockeyvictoria.org.au/games/21935/37291/round/3"
        );
    }

    #[test]
    fn overrides_are_applied() {
        let cfg = Config::from_lookup(lookup(&[
            ("SYNC_HOME_CLUB", "Hawthorn"),
            ("SYNC_MAX_ROUNDS", "5"),
            ("SYNC_EXCLUDED_FRAGMENTS", " reserve , ,oval"),
            ("SYNC_DEADLINE_SECS", "90"),
        ]))
        .unwrap();
        assert_eq!(cfg.home_club, "Hawthorn");
        assert_eq!(cfg.max_rounds, 5);
        assert_eq!(cfg.excluded_fragments, vec!["reserve", "oval"]);
        assert_eq!(cfg.deadline, Some(Duration::from_secs(90)));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(Config::from_lookup(lookup(&[("SYNC_MAX_ROUNDS", "twenty")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SYNC_HOME_CLUB", "  ")])).is_err());
        assert!(Config::from_lookup(lookup(&[("SYNC_CONCURRENCY", "0")])).is_err());
    }
}
