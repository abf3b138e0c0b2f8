//! Deterministic document ids.
//!
//! An id is `{prefix}_{hex}` where the hex part is a truncated SHA-256 over the
//! entity kind and its canonical natural key. Text parts go through
//! [`canonical`] first, so casing and punctuation drift between runs does not
//! produce a new document.

use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::Collection;

/// Hex digits kept from the digest.
const ID_HEX_LEN: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Club,
    Competition,
    Team,
    Game,
}

impl EntityKind {
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::Club => "club",
            EntityKind::Competition => "comp",
            EntityKind::Team => "team",
            EntityKind::Game => "game",
        }
    }

    pub fn collection(&self) -> Collection {
        match self {
            EntityKind::Club => Collection::Clubs,
            EntityKind::Competition => Collection::Competitions,
            EntityKind::Team => Collection::Teams,
            EntityKind::Game => Collection::Games,
        }
    }
}

/// Lowercase, NFKD-folded, punctuation stripped, whitespace collapsed.
pub fn canonical(text: &str) -> String {
    let folded: String = text
        .nfkd()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Hash the already-canonical key parts. Parts are length-prefixed so
/// `["ab", "c"]` and `["a", "bc"]` never meet.
pub fn assign_id(kind: EntityKind, natural_key: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.prefix().as_bytes());
    for part in natural_key {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part.as_bytes());
    }
    let digest = hasher.finalize();
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{}_{}", kind.prefix(), &hex[..ID_HEX_LEN])
}

pub fn club_id(club_name: &str) -> String {
    assign_id(EntityKind::Club, &[&canonical(club_name)])
}

pub fn competition_id(external_comp_ref: &str) -> String {
    assign_id(EntityKind::Competition, &[external_comp_ref.trim()])
}

/// One team per (fixture, club); the display name is deliberately not an input.
pub fn team_id(external_fixture_ref: &str, club_name: &str) -> String {
    assign_id(EntityKind::Team, &[external_fixture_ref.trim(), &canonical(club_name)])
}

/// Participant keys are sorted, so home/away order never changes the id.
pub fn game_id(fixture_ref: &str, round: u32, participant_a: &str, participant_b: &str) -> String {
    let a = canonical(participant_a);
    let b = canonical(participant_b);
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let round = round.to_string();
    assign_id(EntityKind::Game, &[fixture_ref.trim(), &round, &lo, &hi])
}
