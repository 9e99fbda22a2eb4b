//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `CrawlPhase`: the per-year state machine (discovering, fetching records, completed, aborted)
//! - `CrawlState`: discovered links, completed URLs, the output buffer and skipped records

mod crawl_phase;
mod crawl_state;

// Re-export main types
pub use crawl_phase::CrawlPhase;
pub use crawl_state::{CrawlState, SkippedRecord};
