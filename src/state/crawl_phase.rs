/// Phase definitions for a single year's crawl
///
/// A crawl moves `Discovering -> FetchingRecords -> Completed`; `Aborted` is
/// reachable from any phase that is not already terminal.
use std::fmt;

/// Represents the current phase of a year's crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrawlPhase {
    // ===== Active Phases =====
    /// Walking listing pages and collecting record links
    Discovering,

    /// Fetching, parsing and committing detail pages
    FetchingRecords,

    // ===== Terminal Phases =====
    /// Every discovered record was attempted and the output was flushed
    Completed,

    /// Stopped early by an unrecoverable error or cancellation
    Aborted,
}

impl CrawlPhase {
    /// Returns true if this is a terminal phase (no further transitions)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }

    /// Returns true if the transition `self -> next` is allowed
    pub fn can_transition_to(&self, next: CrawlPhase) -> bool {
        match (self, next) {
            (Self::Discovering, Self::FetchingRecords) => true,
            (Self::FetchingRecords, Self::Completed) => true,
            (from, Self::Aborted) => !from.is_terminal(),
            _ => false,
        }
    }

    /// Converts the phase to its database string representation
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Discovering => "discovering",
            Self::FetchingRecords => "fetching_records",
            Self::Completed => "completed",
            Self::Aborted => "aborted",
        }
    }

    /// Parses a phase from its database string representation
    ///
    /// Returns None if the string doesn't match any known phase.
    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "discovering" => Some(Self::Discovering),
            "fetching_records" => Some(Self::FetchingRecords),
            "completed" => Some(Self::Completed),
            "aborted" => Some(Self::Aborted),
            _ => None,
        }
    }

    /// Returns all phases
    pub fn all_phases() -> Vec<Self> {
        vec![
            Self::Discovering,
            Self::FetchingRecords,
            Self::Completed,
            Self::Aborted,
        ]
    }
}

impl fmt::Display for CrawlPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_string())
    }
}
