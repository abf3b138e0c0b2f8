//! Fixture date parsing. Layouts are tried in priority order; text that
//! matches none of them is absent, never "now".

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

/// Date and time together, e.g. "Saturday, 12 April 2025 - 2:00 PM".
const DATETIME_LAYOUTS: &[&str] = &[
    "%A, %d %B %Y %I:%M %p",
    "%A %d %B %Y %I:%M %p",
    "%a %d %b %Y %H:%M",
    "%a %d %b %Y %I:%M %p",
    "%d/%m/%Y %H:%M",
    "%Y-%m-%d %H:%M",
];

/// Date only; the time defaults to midday.
const DATE_LAYOUTS: &[&str] = &[
    "%A, %d %B %Y",
    "%A %d %B %Y",
    "%a %d %b %Y",
    "%d/%m/%Y",
    "%Y-%m-%d",
];

const DEFAULT_TIME: (u32, u32) = (12, 0);

pub fn parse_fixture_date(text: &str) -> Option<NaiveDateTime> {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.is_empty() {
        return None;
    }

    let joined = collapsed.replace(" - ", " ");
    if let Some(dt) = DATETIME_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDateTime::parse_from_str(&joined, layout).ok())
    {
        return Some(dt);
    }

    let date_part = collapsed.split(" - ").next().unwrap_or(&collapsed);
    let midday = NaiveTime::from_hms_opt(DEFAULT_TIME.0, DEFAULT_TIME.1, 0)?;
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| NaiveDate::parse_from_str(date_part, layout).ok())
        .map(|d| d.and_time(midday))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d).unwrap().and_hms_opt(h, min, 0).unwrap()
    }

    #[test]
    fn long_layout_with_time() {
        assert_eq!(
            parse_fixture_date("Saturday, 12 April 2025 - 2:00 PM"),
            Some(dt(2025, 4, 12, 14, 0))
        );
    }

    #[test]
    fn long_layout_without_time_defaults_to_midday() {
        assert_eq!(parse_fixture_date("Saturday, 12 April 2025"), Some(dt(2025, 4, 12, 12, 0)));
    }

    #[test]
    fn short_layouts() {
        assert_eq!(parse_fixture_date("Sat 19 Apr 2025\n 15:30"), Some(dt(2025, 4, 19, 15, 30)));
        assert_eq!(parse_fixture_date("03/05/2025 09:15"), Some(dt(2025, 5, 3, 9, 15)));
        assert_eq!(parse_fixture_date("Sat 19 Apr 2025"), Some(dt(2025, 4, 19, 12, 0)));
    }

    #[test]
    fn garbage_is_absent() {
        assert_eq!(parse_fixture_date(""), None);
        assert_eq!(parse_fixture_date("TBC"), None);
        assert_eq!(parse_fixture_date("Saturday, 31 February 2025"), None);
    }
}
