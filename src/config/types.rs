use serde::Deserialize;

/// Main configuration structure for ASN Harvest
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub source: SourceConfig,
    #[serde(default)]
    pub fetcher: FetcherConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    pub output: OutputConfig,
}

/// Location of the accident database
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Site root, e.g. "https://asn.flightsafety.org"
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Listing path template; `{year}` and `{page}` are substituted
    #[serde(rename = "listing-path", default = "default_listing_path")]
    pub listing_path: String,
}

fn default_listing_path() -> String {
    "/database/year/{year}/{page}".to_string()
}

/// HTTP behaviour and retry policy
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// Whole-request timeout (seconds)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// TCP connect timeout (seconds)
    #[serde(rename = "connect-timeout-secs")]
    pub connect_timeout_secs: u64,

    /// Attempts per URL, including the first one
    #[serde(rename = "max-attempts")]
    pub max_attempts: u32,

    /// Backoff before the first retry (milliseconds)
    #[serde(rename = "retry-base-delay-ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound for a single backoff delay (milliseconds)
    #[serde(rename = "retry-max-delay-ms")]
    pub retry_max_delay_ms: u64,

    /// Random jitter added on top of each backoff, as a percentage of it
    #[serde(rename = "retry-jitter-percent")]
    pub retry_jitter_percent: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            connect_timeout_secs: 5,
            max_attempts: 3,
            retry_base_delay_ms: 2000,
            retry_max_delay_ms: 8000,
            retry_jitter_percent: 50,
        }
    }
}

/// Request pacing, applied before every request regardless of outcome
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,

    #[serde(rename = "listing-delay-min-ms")]
    pub listing_delay_min_ms: u64,

    #[serde(rename = "listing-delay-max-ms")]
    pub listing_delay_max_ms: u64,

    #[serde(rename = "record-delay-min-ms")]
    pub record_delay_min_ms: u64,

    #[serde(rename = "record-delay-max-ms")]
    pub record_delay_max_ms: u64,

    /// Minimum spacing between any two requests, across all workers
    #[serde(rename = "min-interval-ms")]
    pub min_interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listing_delay_min_ms: 2000,
            listing_delay_max_ms: 4000,
            record_delay_min_ms: 1000,
            record_delay_max_ms: 3000,
            min_interval_ms: 1000,
        }
    }
}

impl RateLimitConfig {
    /// A configuration with every delay switched off (for tests and local mirrors)
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

/// Crawl loop behaviour
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlerConfig {
    /// Number of concurrent record fetchers (1 = strictly sequential)
    pub workers: u32,

    /// Hard cap on listing pages visited per year
    #[serde(rename = "max-pages")]
    pub max_pages: u32,

    /// Rewrite the CSV after this many new commits (0 = only at the end)
    #[serde(rename = "csv-flush-interval")]
    pub csv_flush_interval: u32,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            max_pages: 500,
            csv_flush_interval: 25,
        }
    }
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize)]
pub struct UserAgentConfig {
    /// Name of the crawler
    #[serde(rename = "crawler-name")]
    pub crawler_name: String,

    /// Version of the crawler
    #[serde(rename = "crawler-version")]
    pub crawler_version: String,

    /// URL with information about the crawler
    #[serde(rename = "contact-url")]
    pub contact_url: String,

    /// Email address for crawler-related contact
    #[serde(rename = "contact-email")]
    pub contact_email: String,
}

impl UserAgentConfig {
    /// Format: CrawlerName/Version (+ContactURL; ContactEmail)
    pub fn header_value(&self) -> String {
        format!(
            "{}/{} (+{}; {})",
            self.crawler_name, self.crawler_version, self.contact_url, self.contact_email
        )
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Directory receiving `asn_accidents_<year>.csv`
    pub directory: String,

    /// Path to the SQLite progress database
    #[serde(rename = "database-path")]
    pub database_path: String,
}
