//! Accident detail page parser
//!
//! Detail pages lay their data out as two-column label/value table rows
//! (`<td>Date:</td><td>Tuesday 12 March 2024</td>`). The parser collects
//! those rows, then runs each recognized label through its normalization
//! rule. Fields are independent: one unreadable value never fails the page.

use crate::record::normalize::{self, collapse_whitespace};
use crate::record::{AccidentRecord, RecordFields};
use crate::ParseError;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::LazyLock;

static ROW: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table tr").expect("valid selector"));

/// Parses a detail page into a scored record
///
/// # Arguments
///
/// * `html` - The detail page body
/// * `url` - The record URL; becomes the record key
///
/// # Returns
///
/// * `Ok(AccidentRecord)` - At least one checklist field was found
/// * `Err(ParseError::EmptyRecord)` - None of the checklist fields was found
pub fn parse_record_page(html: &str, url: &str) -> Result<AccidentRecord, ParseError> {
    let fields = parse_record_fields(html, url)?;

    let malformed = fields.malformed_expected();
    if !malformed.is_empty() {
        tracing::debug!("{}: kept verbatim text for {:?}", url, malformed);
    }

    Ok(fields.into_record(url))
}

/// Extracts every known field of a detail page without collapsing it
pub fn parse_record_fields(html: &str, url: &str) -> Result<RecordFields, ParseError> {
    let document = Html::parse_document(html);
    let cells = label_values(&document);
    let get = |label: &str| cells.get(label).map(String::as_str);

    let fields = RecordFields {
        date: normalize::date(get("date")),
        time: normalize::time(get("time")),
        aircraft_type: normalize::text(get("type")),
        operator: normalize::text(get("owner/operator")),
        registration: normalize::text(get("registration")),
        msn: normalize::text(get("msn")),
        year_of_manufacture: normalize::year(get("year of manufacture")),
        engine_model: normalize::text(get("engine model")),
        fatalities: normalize::count(get("fatalities")),
        other_fatalities: normalize::count(get("other fatalities")),
        aircraft_damage: normalize::text(get("aircraft damage")),
        category: normalize::text(get("category")),
        location: normalize::text(get("location")),
        phase: normalize::text(get("phase")),
        nature: normalize::text(get("nature")),
        departure_airport: normalize::text(get("departure airport")),
        destination_airport: normalize::text(get("destination airport")),
        investigating_agency: normalize::text(get("investigating agency")),
    };

    if !fields.has_expected_content() {
        return Err(ParseError::EmptyRecord {
            url: url.to_string(),
        });
    }

    Ok(fields)
}

/// Collects label → value text from every row with at least two cells
///
/// Labels are lowercased, whitespace-collapsed and stripped of a trailing
/// colon. The first row carrying a label wins.
fn label_values(document: &Html) -> HashMap<String, String> {
    let mut cells = HashMap::new();

    for row in document.select(&ROW) {
        let tds: Vec<ElementRef<'_>> = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|element| element.value().name() == "td")
            .collect();

        if tds.len() < 2 {
            continue;
        }

        let label = collapse_whitespace(&tds[0].text().collect::<String>());
        let label = label.trim_end_matches(':').trim_end().to_lowercase();
        if label.is_empty() {
            continue;
        }

        let value = tds[1].text().collect::<String>();
        cells.entry(label).or_insert(value);
    }

    cells
}
