//! Competition index page. Every fixture link looks like `/games/{comp}/{fixture}`.

use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::{text_of, CompetitionCandidate};

static COMP_FIXTURE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"/games/(\d+)/(\d+)").unwrap());
static SECTION_OR_HEADING: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("h2, div.px-4.py-2.border-top").unwrap());
static LINK: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

pub trait IndexLayout: Send + Sync {
    fn name(&self) -> &'static str;
    fn competitions(&self, doc: &Html) -> Vec<CompetitionCandidate>;
}

/// Bordered blocks under `h2` section headings.
pub struct SectionLayout;

/// Any fixture link anywhere on the page; no headings.
pub struct LinkScanLayout;

impl IndexLayout for SectionLayout {
    fn name(&self) -> &'static str {
        "sections"
    }

    fn competitions(&self, doc: &Html) -> Vec<CompetitionCandidate> {
        let mut heading = String::new();
        let mut out = Vec::new();
        for el in doc.select(&SECTION_OR_HEADING) {
            if el.value().name() == "h2" {
                heading = text_of(&el);
                continue;
            }
            if let Some(link) = el.select(&LINK).next() {
                if let Some(c) = candidate(link.value().attr("href").unwrap_or(""), &text_of(&link), &heading) {
                    out.push(c);
                }
            }
        }
        out
    }
}

impl IndexLayout for LinkScanLayout {
    fn name(&self) -> &'static str {
        "link-scan"
    }

    fn competitions(&self, doc: &Html) -> Vec<CompetitionCandidate> {
        doc.select(&LINK)
            .filter_map(|a| candidate(a.value().attr("href").unwrap_or(""), &text_of(&a), ""))
            .collect()
    }
}

fn candidate(href: &str, name: &str, heading: &str) -> Option<CompetitionCandidate> {
    let caps = COMP_FIXTURE.captures(href)?;
    if name.is_empty() {
        return None;
    }
    Some(CompetitionCandidate {
        name:        name.to_string(),
        heading:     heading.to_string(),
        comp_ref:    caps[1].to_string(),
        fixture_ref: caps[2].to_string(),
        href:        href.to_string(),
    })
}

/// First layout that finds anything wins. One candidate per (comp, fixture).
pub fn extract_competitions(doc: &Html, layouts: &[Box<dyn IndexLayout>]) -> Vec<CompetitionCandidate> {
    for layout in layouts {
        let found = layout.competitions(doc);
        if found.is_empty() {
            continue;
        }
        tracing::debug!(layout = layout.name(), count = found.len(), "competition index parsed");
        let mut seen = HashSet::new();
        return found
            .into_iter()
            .filter(|c| seen.insert((c.comp_ref.clone(), c.fixture_ref.clone())))
            .collect();
    }
    Vec::new()
}

pub fn default_layouts() -> Vec<Box<dyn IndexLayout>> {
    vec![Box::new(SectionLayout), Box::new(LinkScanLayout)]
}
