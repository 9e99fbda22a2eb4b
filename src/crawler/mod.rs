//! Crawler module for fetching and processing ASN pages
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic and rate limiting
//! - Listing page parsing (record links and pagination)
//! - Detail page parsing (accident records)
//! - Overall per-year crawl coordination

mod coordinator;
mod fetcher;
mod listing;
mod parser;
mod rate_limit;
mod retry;

pub use coordinator::{analyze, scrape_year, Coordinator, YearOutcome};
pub use fetcher::{build_http_client, FetchedPage, Fetcher};
pub use listing::{parse_listing_page, ListingAnomaly, ListingPage, RecordLink};
pub use parser::{parse_record_fields, parse_record_page};
pub use rate_limit::{RateLimiter, RequestKind};
pub use retry::RetryPolicy;
