//! Accident record model
//!
//! A detail page is first parsed into [`RecordFields`], where every field is an
//! [`Extracted`] value. Scoring and normalization operate on that form; the
//! published [`AccidentRecord`] collapses it into nullable columns.

mod confidence;
mod extract;
pub mod normalize;

pub use confidence::{
    present_ratio, ConfidenceRating, CONFIDENCE_TABLE_VERSION, EXPECTED_FIELDS, HIGH_THRESHOLD,
    MEDIUM_THRESHOLD,
};
pub use extract::Extracted;

/// Output columns, in their fixed order
pub const COLUMNS: [&str; 20] = [
    "Date",
    "Time",
    "Type",
    "Owner/operator",
    "Registration",
    "MSN",
    "Year of manufacture",
    "Engine model",
    "Fatalities",
    "Other fatalities",
    "Aircraft damage",
    "Category",
    "Location",
    "Phase",
    "Nature",
    "Departure airport",
    "Destination airport",
    "Investigating agency",
    "Confidence Rating",
    "URL",
];

/// Every field of a detail page as extracted, before collapsing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFields {
    pub date: Extracted<String>,
    pub time: Extracted<String>,
    pub aircraft_type: Extracted<String>,
    pub operator: Extracted<String>,
    pub registration: Extracted<String>,
    pub msn: Extracted<String>,
    pub year_of_manufacture: Extracted<String>,
    pub engine_model: Extracted<String>,
    pub fatalities: Extracted<u32>,
    pub other_fatalities: Extracted<u32>,
    pub aircraft_damage: Extracted<String>,
    pub category: Extracted<String>,
    pub location: Extracted<String>,
    pub phase: Extracted<String>,
    pub nature: Extracted<String>,
    pub departure_airport: Extracted<String>,
    pub destination_airport: Extracted<String>,
    pub investigating_agency: Extracted<String>,
}

impl RecordFields {
    /// The checklist fields, in [`EXPECTED_FIELDS`] order
    fn expected(&self) -> [&Extracted<String>; 6] {
        [
            &self.date,
            &self.aircraft_type,
            &self.operator,
            &self.registration,
            &self.location,
            &self.phase,
        ]
    }

    /// Number of checklist fields that are present and well-formed
    pub fn present_expected_count(&self) -> usize {
        self.expected().iter().filter(|f| f.is_present()).count()
    }

    /// True if at least one checklist field yielded anything (well-formed or not)
    pub fn has_expected_content(&self) -> bool {
        self.expected().iter().any(|f| !f.is_absent())
    }

    /// Labels of checklist fields whose text was kept verbatim
    pub fn malformed_expected(&self) -> Vec<&'static str> {
        EXPECTED_FIELDS
            .iter()
            .zip(self.expected())
            .filter(|(_, field)| field.is_malformed())
            .map(|(label, _)| *label)
            .collect()
    }

    pub fn confidence(&self) -> ConfidenceRating {
        ConfidenceRating::from_present_count(self.present_expected_count())
    }

    /// Collapses the extraction results into the published record
    pub fn into_record(self, url: impl Into<String>) -> AccidentRecord {
        let confidence = self.confidence();
        AccidentRecord {
            url: url.into(),
            date: self.date.into_text(),
            time: self.time.into_text(),
            aircraft_type: self.aircraft_type.into_text(),
            operator: self.operator.into_text(),
            registration: self.registration.into_text(),
            msn: self.msn.into_text(),
            year_of_manufacture: self.year_of_manufacture.into_text(),
            engine_model: self.engine_model.into_text(),
            fatalities: self.fatalities.present(),
            other_fatalities: self.other_fatalities.present(),
            aircraft_damage: self.aircraft_damage.into_text(),
            category: self.category.into_text(),
            location: self.location.into_text(),
            phase: self.phase.into_text(),
            nature: self.nature.into_text(),
            departure_airport: self.departure_airport.into_text(),
            destination_airport: self.destination_airport.into_text(),
            investigating_agency: self.investigating_agency.into_text(),
            confidence,
        }
    }
}

/// One accident, as written to the dataset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccidentRecord {
    /// Detail page URL; unique within a year's dataset
    pub url: String,
    pub date: Option<String>,
    pub time: Option<String>,
    pub aircraft_type: Option<String>,
    pub operator: Option<String>,
    pub registration: Option<String>,
    pub msn: Option<String>,
    pub year_of_manufacture: Option<String>,
    pub engine_model: Option<String>,
    pub fatalities: Option<u32>,
    pub other_fatalities: Option<u32>,
    pub aircraft_damage: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub phase: Option<String>,
    pub nature: Option<String>,
    pub departure_airport: Option<String>,
    pub destination_airport: Option<String>,
    pub investigating_agency: Option<String>,
    pub confidence: ConfidenceRating,
}

impl AccidentRecord {
    /// The record as one output row, aligned with [`COLUMNS`]
    ///
    /// Missing values become empty strings so every row has the same width.
    pub fn to_row(&self) -> Vec<String> {
        fn text(value: &Option<String>) -> String {
            value.clone().unwrap_or_default()
        }
        fn number(value: Option<u32>) -> String {
            value.map(|n| n.to_string()).unwrap_or_default()
        }

        vec![
            text(&self.date),
            text(&self.time),
            text(&self.aircraft_type),
            text(&self.operator),
            text(&self.registration),
            text(&self.msn),
            text(&self.year_of_manufacture),
            text(&self.engine_model),
            number(self.fatalities),
            number(self.other_fatalities),
            text(&self.aircraft_damage),
            text(&self.category),
            text(&self.location),
            text(&self.phase),
            text(&self.nature),
            text(&self.departure_airport),
            text(&self.destination_airport),
            text(&self.investigating_agency),
            self.confidence.as_str().to_string(),
            self.url.clone(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn present(value: &str) -> Extracted<String> {
        Extracted::Present(value.to_string())
    }

    #[test]
    fn test_confidence_counts_only_well_formed_fields() {
        let fields = RecordFields {
            date: present("2024-03-12"),
            aircraft_type: present("Boeing 737"),
            operator: present("Ryanair"),
            registration: Extracted::Malformed("?".to_string()),
            location: Extracted::Absent,
            phase: Extracted::Absent,
            ..RecordFields::default()
        };
        assert_eq!(fields.present_expected_count(), 3);
        assert_eq!(fields.confidence(), ConfidenceRating::Medium);
        assert_eq!(fields.malformed_expected(), vec!["Registration"]);
    }

    #[test]
    fn test_adding_a_field_never_lowers_confidence() {
        let mut fields = RecordFields::default();
        let mut previous = fields.confidence();
        let setters: [fn(&mut RecordFields); 6] = [
            |f: &mut RecordFields| f.date = present("2024-03-12"),
            |f: &mut RecordFields| f.aircraft_type = present("Cessna 172"),
            |f: &mut RecordFields| f.operator = present("Private"),
            |f: &mut RecordFields| f.registration = present("N12345"),
            |f: &mut RecordFields| f.location = present("Denver, CO"),
            |f: &mut RecordFields| f.phase = present("Landing"),
        ];
        for set in setters {
            set(&mut fields);
            let current = fields.confidence();
            assert!(current >= previous);
            previous = current;
        }
        assert_eq!(previous, ConfidenceRating::High);
    }

    #[test]
    fn test_non_checklist_fields_do_not_affect_confidence() {
        let a = RecordFields {
            date: present("2024-03-12"),
            ..RecordFields::default()
        };
        let b = RecordFields {
            date: present("2024-03-12"),
            nature: present("Training"),
            fatalities: Extracted::Present(0),
            ..RecordFields::default()
        };
        assert_eq!(a.confidence(), b.confidence());
    }

    #[test]
    fn test_row_has_constant_width() {
        let record = RecordFields::default().into_record("https://asn.example/wikibase/1");
        let row = record.to_row();
        assert_eq!(row.len(), COLUMNS.len());
        assert_eq!(row[18], "low");
        assert_eq!(row[19], "https://asn.example/wikibase/1");
        assert!(row[..18].iter().all(|cell| cell.is_empty()));
    }

    #[test]
    fn test_malformed_count_becomes_null_but_text_survives() {
        let fields = RecordFields {
            date: Extracted::Malformed("xx MAR 2024".to_string()),
            fatalities: Extracted::Malformed("unknown".to_string()),
            ..RecordFields::default()
        };
        let record = fields.into_record("u");
        assert_eq!(record.date.as_deref(), Some("xx MAR 2024"));
        assert_eq!(record.fatalities, None);
    }
}
