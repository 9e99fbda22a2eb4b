//! Confidence rating for extracted records
//!
//! The rating is a pure function of how many checklist fields were extracted
//! well-formed. The checklist and thresholds form one versioned table so that
//! ratings in older output files stay reproducible:
//!
//! | Version | Checklist                                                    | High    | Medium  | Low    |
//! |---------|--------------------------------------------------------------|---------|---------|--------|
//! | 1       | date, type, operator, registration, location, phase (6)      | >= 0.8  | >= 0.5  | < 0.5  |
//!
//! With six fields that means 5-6 present is high, 3-4 is medium, 0-2 is low.

use std::fmt;
use std::str::FromStr;

/// Version of the checklist and threshold table below
pub const CONFIDENCE_TABLE_VERSION: u32 = 1;

/// Labels of the fields every complete record is expected to carry
pub const EXPECTED_FIELDS: [&str; 6] = [
    "Date",
    "Type",
    "Owner/operator",
    "Registration",
    "Location",
    "Phase",
];

/// Minimum present ratio for a high rating
pub const HIGH_THRESHOLD: f64 = 0.8;

/// Minimum present ratio for a medium rating
pub const MEDIUM_THRESHOLD: f64 = 0.5;

/// Ordinal extraction quality of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfidenceRating {
    Low,
    Medium,
    High,
}

impl ConfidenceRating {
    /// Rates a record from the number of well-formed checklist fields
    pub fn from_present_count(present: usize) -> Self {
        Self::from_ratio(present_ratio(present))
    }

    /// Maps a present ratio in [0, 1] onto the threshold table
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= HIGH_THRESHOLD {
            Self::High
        } else if ratio >= MEDIUM_THRESHOLD {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ConfidenceRating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConfidenceRating {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(format!("unknown confidence rating '{}'", other)),
        }
    }
}

/// Fraction of checklist fields present, clamped to [0, 1]
pub fn present_ratio(present: usize) -> f64 {
    present.min(EXPECTED_FIELDS.len()) as f64 / EXPECTED_FIELDS.len() as f64
}
