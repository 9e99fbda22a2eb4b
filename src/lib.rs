//! ASN Harvest: a resumable crawler for the Aviation Safety Network database
//!
//! This crate extracts one calendar year of accident records from the paginated
//! ASN wikibase, scores each record's extraction quality, and emits a validated,
//! deduplicated CSV dataset. Progress is committed to SQLite after every record
//! so an interrupted crawl resumes without re-fetching completed pages.

pub mod config;
pub mod crawler;
pub mod output;
pub mod record;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for ASN Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Storage error: {0}")]
    Store(#[from] storage::StoreError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("Invalid state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        from: state::CrawlPhase,
        to: state::CrawlPhase,
    },

    #[error("Crawl for year {year} was cancelled")]
    Cancelled { year: i32 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Coarse classification of a failed fetch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Timeout,
    Http,
    Connection,
}

/// A request that failed after the retry policy gave up
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("HTTP {status} for {url}")]
    Http { url: String, status: u16 },

    #[error("Connection error for {url}: {message}")]
    Connection { url: String, message: String },
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            Self::Timeout { .. } => FetchErrorKind::Timeout,
            Self::Http { .. } => FetchErrorKind::Http,
            Self::Connection { .. } => FetchErrorKind::Connection,
        }
    }

    /// Returns true if another attempt may succeed
    ///
    /// Timeouts, connection failures and 5xx responses are transient.
    /// Every other HTTP status (4xx in particular) is permanent for that URL.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::Connection { .. } => true,
            Self::Http { status, .. } => (500..600).contains(status),
        }
    }

    /// The HTTP status code, if the server answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Timeout { url } | Self::Http { url, .. } | Self::Connection { url, .. } => url,
        }
    }
}

/// HTML that could not be turned into listing links or a record
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unexpected page structure at {url}: {message}")]
    UnexpectedStructure { url: String, message: String },

    #[error("No expected fields could be extracted from {url}")]
    EmptyRecord { url: String },
}

/// Result type alias for ASN Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{analyze, scrape_year, Coordinator};
pub use record::{AccidentRecord, ConfidenceRating};
pub use state::{CrawlPhase, CrawlState};
