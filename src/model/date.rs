//! Date parsing for spreadsheet cells and the ISO-8601 wire format.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// The day-first and ISO formats tried, in order, before any generic parsing. The first format
/// that yields a valid calendar date wins; ambiguous inputs are not second-guessed.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum CandidateFormat {
    /// `dd/mm/yyyy`
    DayMonthYear,
    /// `dd/mm/yy`
    DayMonthShortYear,
    /// `yyyy-mm-dd`
    YearMonthDay,
}

pub const CANDIDATE_FORMATS: &[CandidateFormat] = &[
    CandidateFormat::DayMonthYear,
    CandidateFormat::DayMonthShortYear,
    CandidateFormat::YearMonthDay,
];

impl CandidateFormat {
    /// Attempts to parse `s` with this format.
    pub fn parse(&self, s: &str) -> Option<NaiveDate> {
        match self {
            CandidateFormat::DayMonthYear => {
                let [d, m, y] = split_digits(s, '/')?;
                if y.len() != 4 || d.len() > 2 || m.len() > 2 {
                    return None;
                }
                ymd(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
            }
            CandidateFormat::DayMonthShortYear => {
                let [d, m, y] = split_digits(s, '/')?;
                if y.len() != 2 || d.len() > 2 || m.len() > 2 {
                    return None;
                }
                let yy: i32 = y.parse().ok()?;
                // Same pivot as strptime's %y: 69-99 are 1900s, 00-68 are 2000s.
                let year = if yy >= 69 { 1900 + yy } else { 2000 + yy };
                ymd(year, m.parse().ok()?, d.parse().ok()?)
            }
            CandidateFormat::YearMonthDay => {
                let [y, m, d] = split_digits(s, '-')?;
                if y.len() != 4 || d.len() > 2 || m.len() > 2 {
                    return None;
                }
                ymd(y.parse().ok()?, m.parse().ok()?, d.parse().ok()?)
            }
        }
    }
}

fn split_digits(s: &str, sep: char) -> Option<[&str; 3]> {
    let mut parts = s.split(sep);
    let a = parts.next()?;
    let b = parts.next()?;
    let c = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    let all_digits = |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit());
    if all_digits(a) && all_digits(b) && all_digits(c) {
        Some([a, b, c])
    } else {
        None
    }
}

fn ymd(year: i32, month: u32, day: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parses a date typed as text. The candidate formats are tried first, then a handful of
/// generic representations. Calendar dates without a time are taken as midnight UTC.
pub fn parse_date_text(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(date) = CANDIDATE_FORMATS.iter().find_map(|f| f.parse(s)) {
        return Some(midnight_utc(date));
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }
    for fmt in ["%Y/%m/%d", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, fmt) {
            return Some(midnight_utc(date));
        }
    }
    None
}

pub(crate) fn midnight_utc(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(chrono::NaiveTime::MIN).and_utc()
}

/// Serializes timestamps as ISO-8601 UTC with millisecond precision, e.g.
/// `2024-03-05T00:00:00.000Z`.
pub(crate) mod iso_millis {
    use chrono::{DateTime, SecondsFormat, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    pub(crate) fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}
