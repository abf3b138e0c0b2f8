//! Flat team snapshot: a JSON array with one object per tracked team.
//! Written by discovery, read by a later `games` run instead of re-scraping.

use anyhow::{Context, Result};
use model::{Gender, Team, TeamType};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamRecord {
    pub id:             String,
    pub name:           String,
    pub label:          String,
    pub club:           String,
    pub club_id:        String,
    pub competition_id: String,
    pub comp_id:        String,
    pub fixture_id:     String,
    pub comp_name:      String,
    #[serde(rename = "type")]
    pub kind:           TeamType,
    pub gender:         Gender,
}

impl TeamRecord {
    pub fn from_team(team: &Team, club: &str) -> Self {
        Self {
            id:             team.id.clone(),
            name:           team.name.clone(),
            label:          team.label.clone(),
            club:           club.to_string(),
            club_id:        team.club_ref.id.clone(),
            competition_id: team.competition_ref.id.clone(),
            comp_id:        team.external_comp_ref.clone(),
            fixture_id:     team.external_fixture_ref.clone(),
            comp_name:      team.grade.clone(),
            kind:           team.kind,
            gender:         team.gender,
        }
    }
}

pub fn write_snapshot(path: &Path, records: &[TeamRecord]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).ok();
    }
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json).with_context(|| format!("write snapshot {}", path.display()))?;
    Ok(())
}

/// `None` when there is no snapshot file yet.
pub fn read_snapshot(path: &Path) -> Result<Option<Vec<TeamRecord>>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = fs::read_to_string(path).with_context(|| format!("read snapshot {}", path.display()))?;
    let records = serde_json::from_str(&text).with_context(|| format!("parse snapshot {}", path.display()))?;
    Ok(Some(records))
}
