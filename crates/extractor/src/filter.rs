//! Team-name filter. Venue and sponsor links sit at the same level as team
//! links on the source pages, so a name must carry the club designator and
//! must not carry any known venue fragment.

#[derive(Debug, Clone)]
pub struct TeamFilter {
    designator: String,
    excluded:   Vec<String>,
}

impl TeamFilter {
    pub fn new(designator: &str, excluded: &[String]) -> Self {
        Self {
            designator: designator.trim().to_lowercase(),
            excluded: excluded
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn is_valid_team(&self, name: &str) -> bool {
        let lower = name.to_lowercase();
        lower.contains(&self.designator) && self.excluded.iter().all(|kw| !lower.contains(kw.as_str()))
    }

    /// Club part of a team name: the words before the designator, else the part
    /// before " - ", else the whole name.
    pub fn club_name_of(&self, name: &str) -> String {
        let words: Vec<&str> = name.split_whitespace().collect();
        let needle: Vec<&str> = self.designator.split_whitespace().collect();

        if !needle.is_empty() && words.len() >= needle.len() {
            let hit = words.windows(needle.len()).position(|w| {
                w.iter().zip(&needle).all(|(a, b)| a.eq_ignore_ascii_case(b))
            });
            if let Some(i) = hit.filter(|&i| i > 0) {
                return words[..i].join(" ");
            }
        }

        match name.split_once(" - ") {
            Some((club, _)) if !club.trim().is_empty() => club.trim().to_string(),
            _ => words.join(" "),
        }
    }
}

impl Default for TeamFilter {
    fn default() -> Self {
        Self::new("hockey club", &["playing fields".to_string(), "grammar".to_string()])
    }
}
