/// Fixture Sync — Logger
/// JSONL event stream: one file per day under the log dir.

use anyhow::Result;
use chrono::Utc;
use serde::Serialize;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct EventLogger {
    log_dir: PathBuf,
}

impl EventLogger {
    pub fn new(log_dir: impl Into<PathBuf>) -> Self {
        let dir = log_dir.into();
        fs::create_dir_all(&dir).ok();
        Self { log_dir: dir }
    }

    pub fn dir(&self) -> &Path {
        &self.log_dir
    }

    pub fn log<T: Serialize>(&self, event: &T) -> Result<()> {
        let date  = Utc::now().format("%Y-%m-%d").to_string();
        let path  = self.log_dir.join(format!("{date}.jsonl"));
        let line  = serde_json::to_string(event)?;
        let mut f = OpenOptions::new().create(true).append(true).open(&path)?;
        writeln!(f, "{line}")?;
        Ok(())
    }
}

pub fn now_iso() -> String {
    Utc::now().to_rfc3339()
}

// ── Event types ──────────────────────────────────────────────────────────────

#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub created: u64,
    pub updated: u64,
    pub noop:    u64,
}

#[derive(Serialize, Debug)]
pub struct RunSummaryEvent {
    pub ts:            String,
    pub event:         &'static str,   // "RUN_SUMMARY"
    pub mode:           String,         // "discover" | "games" | "full"
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
    pub elapsed_ms:     u64,
}

#[derive(Serialize, Debug)]
pub struct FetchFailureEvent {
    pub ts:        String,
    pub event:     &'static str,   // "FETCH_FAILURE"
    pub url:       String,
    pub kind:      String,         // "transient_exhausted"
    pub detail:    String,
}

#[derive(Serialize, Debug)]
pub struct IdentityCollisionEvent {
    pub ts:         String,
    pub event:      &'static str,   // "IDENTITY_COLLISION"
    pub collection: String,
    pub id:         String,
    pub detail:     String,
}
