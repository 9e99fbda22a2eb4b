//! Field normalization rules
//!
//! Every rule takes the raw cell text (if the label was found at all) and
//! returns an [`Extracted`] value. The rules are uniform across fields:
//! whitespace is trimmed and collapsed first, empty text is `Absent`, and
//! text that a typed rule does not recognize is kept verbatim as `Malformed`.

use crate::record::Extracted;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;

/// Date layouts the source site is known to use, tried in order
const DATE_FORMATS: &[&str] = &[
    "%d %b %Y",
    "%d %B %Y",
    "%d-%b-%Y",
    "%d-%B-%Y",
    "%Y-%m-%d",
];

/// Canonical output layout for recognized dates
pub const CANONICAL_DATE_FORMAT: &str = "%Y-%m-%d";

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([01]?\d|2[0-3])[:.h]([0-5]\d)\b").expect("valid regex"));

static COUNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[A-Za-z][A-Za-z ]*:\s*)?(\d+)\b").expect("valid regex"));

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{4}$").expect("valid regex"));

/// Trims the text and collapses every run of whitespace (including NBSP) into one space
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Free-text field: present unless empty
pub fn text(raw: Option<&str>) -> Extracted<String> {
    match cleaned(raw) {
        Some(value) => Extracted::Present(value),
        None => Extracted::Absent,
    }
}

/// Date field, canonicalized to `YYYY-MM-DD` when the layout is recognized
///
/// A leading weekday ("Tuesday 12 March 2024") is ignored. Partial dates such
/// as "xx MAR 2024" stay verbatim and are flagged as malformed.
pub fn date(raw: Option<&str>) -> Extracted<String> {
    let Some(value) = cleaned(raw) else {
        return Extracted::Absent;
    };

    match parse_date(&value) {
        Some(parsed) => Extracted::Present(parsed.format(CANONICAL_DATE_FORMAT).to_string()),
        None => Extracted::Malformed(value),
    }
}

/// Parses any recognized date layout
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let candidate = strip_weekday(value);
    let candidate = title_case_words(candidate);

    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(&candidate, format).ok())
}

/// Time field, canonicalized to `HH:MM` from the first clock time in the text
///
/// The site writes times like "c. 14:30", "14:30 LT" or "1430"; only forms
/// with a separator are recognized.
pub fn time(raw: Option<&str>) -> Extracted<String> {
    let Some(value) = cleaned(raw) else {
        return Extracted::Absent;
    };

    match TIME_RE.captures(&value) {
        Some(caps) => {
            let hours: u32 = caps[1].parse().unwrap_or(0);
            let minutes: u32 = caps[2].parse().unwrap_or(0);
            Extracted::Present(format!("{:02}:{:02}", hours, minutes))
        }
        None => Extracted::Malformed(value),
    }
}

/// Non-negative count, either bare ("0") or labelled ("Fatalities: 0 / Occupants: 2")
pub fn count(raw: Option<&str>) -> Extracted<u32> {
    let Some(value) = cleaned(raw) else {
        return Extracted::Absent;
    };

    COUNT_RE
        .captures(&value)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .map(Extracted::Present)
        .unwrap_or(Extracted::Malformed(value))
}

/// Four-digit year
pub fn year(raw: Option<&str>) -> Extracted<String> {
    let Some(value) = cleaned(raw) else {
        return Extracted::Absent;
    };

    if YEAR_RE.is_match(&value) {
        Extracted::Present(value)
    } else {
        Extracted::Malformed(value)
    }
}

fn cleaned(raw: Option<&str>) -> Option<String> {
    let value = collapse_whitespace(raw?);
    if value.is_empty() || value == "-" {
        None
    } else {
        Some(value)
    }
}

/// Drops a leading weekday name if the next token is the day number
fn strip_weekday(value: &str) -> &str {
    let mut parts = value.splitn(2, ' ');
    match (parts.next(), parts.next()) {
        (Some(first), Some(rest))
            if first.chars().all(|c| c.is_ascii_alphabetic() || c == ',')
                && rest.starts_with(|c: char| c.is_ascii_digit()) =>
        {
            rest
        }
        _ => value,
    }
}

/// "12 MAR 2024" -> "12 Mar 2024"; month names are matched in title case
fn title_case_words(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut word_start = true;
    for c in value.chars() {
        if c.is_ascii_alphabetic() {
            if word_start {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c.to_ascii_lowercase());
            }
            word_start = false;
        } else {
            out.push(c);
            word_start = true;
        }
    }
    out
}
