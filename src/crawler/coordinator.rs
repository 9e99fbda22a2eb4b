//! Crawler coordinator - per-year crawl orchestration
//!
//! This module drives one year through its phases:
//! - Discovering: walk listing pages and collect record links
//! - FetchingRecords: fetch, parse and commit every link not yet completed
//! - Completed: validate the committed records and write the dataset
//!
//! Any unrecoverable error or a cancellation moves the crawl to Aborted. The
//! progress store is the only state that outlives a run; everything else is
//! rebuilt from it on the next start.

use crate::config::Config;
use crate::crawler::fetcher::Fetcher;
use crate::crawler::listing::{parse_listing_page, ListingPage, RecordLink};
use crate::crawler::parser::parse_record_page;
use crate::output::{
    dataset_path, write_dataset, CrawlSummary, Dataset, DiscoveryReport, ValidationReport,
};
use crate::record::{normalize, AccidentRecord};
use crate::state::{CrawlPhase, CrawlState};
use crate::storage::{open_store, ProgressStore, SqliteProgressStore};
use crate::url::SourceUrls;
use crate::{FetchError, HarvestError, ParseError};
use chrono::NaiveDate;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Attempts per commit before the crawl is aborted
const COMMIT_ATTEMPTS: u32 = 3;

/// Pause between commit attempts, multiplied by the attempt number
const COMMIT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Result of a finished year
#[derive(Debug, Clone)]
pub struct YearOutcome {
    pub dataset: Dataset,
    pub summary: CrawlSummary,
}

/// Main crawler coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    store: SqliteProgressStore,
    fetcher: Fetcher,
    urls: SourceUrls,
    config_hash: String,
    fresh: bool,
    cancel: CancellationToken,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The crawler configuration
    /// * `fresh` - Whether to forget stored progress for the year before crawling
    ///
    /// # Returns
    ///
    /// * `Ok(Coordinator)` - Successfully created coordinator
    /// * `Err(HarvestError)` - Failed to open the store or build the client
    pub fn new(config: Config, fresh: bool) -> Result<Self, HarvestError> {
        let store = open_store(Path::new(&config.output.database_path))?;
        let fetcher = Fetcher::from_config(&config)?;
        let urls = SourceUrls::new(&config.source)?;

        Ok(Self {
            config: Arc::new(config),
            store,
            fetcher,
            urls,
            config_hash: String::from("unknown"),
            fresh,
            cancel: CancellationToken::new(),
        })
    }

    /// Records the hash of the config file on every run row
    pub fn with_config_hash(mut self, hash: impl Into<String>) -> Self {
        self.config_hash = hash.into();
        self
    }

    /// Replaces the cancellation token (e.g. one wired to Ctrl-C)
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn store(&self) -> &SqliteProgressStore {
        &self.store
    }

    /// Location of the dataset for a year
    pub fn output_path(&self, year: i32) -> PathBuf {
        dataset_path(Path::new(&self.config.output.directory), year)
    }

    /// Runs only the discovery phase and reports what it found
    ///
    /// Nothing is written to the progress store.
    pub async fn analyze(&mut self, year: i32) -> Result<DiscoveryReport, HarvestError> {
        let completed = self.store.load_completed(year)?;
        let mut state = CrawlState::with_completed(year, completed);

        self.discover(&mut state).await?;

        let already_completed = state.completed_count();
        Ok(DiscoveryReport {
            year,
            pages_visited: state.pages_visited(),
            reported_total: state.reported_total(),
            links: state.discovered_count(),
            duplicate_links: state.duplicate_links(),
            anomalies: state.anomalies().to_vec(),
            already_completed,
        })
    }

    /// Crawls one year to completion and writes its dataset
    ///
    /// # Returns
    ///
    /// * `Ok(YearOutcome)` - The crawl reached Completed
    /// * `Err(HarvestError)` - The crawl was aborted; everything committed so far
    ///   stays in the store and a partial dataset is written
    pub async fn scrape_year(&mut self, year: i32) -> Result<YearOutcome, HarvestError> {
        let started = Instant::now();

        if self.fresh {
            tracing::info!("Clearing stored progress for {}", year);
            self.store.clear_year(year)?;
        }

        let completed = self.store.load_completed(year)?;
        if !completed.is_empty() {
            tracing::info!(
                "Resuming {}: {} records already completed",
                year,
                completed.len()
            );
        }

        let mut state = CrawlState::with_completed(year, completed);
        let run_id = self.store.begin_run(year, &self.config_hash)?;
        tracing::info!("Starting run {} for {}", run_id, year);

        match self.run(&mut state, run_id).await {
            Ok((dataset, validation)) => {
                let mut summary = self.summarize(&state, run_id, validation, started);
                summary.output_path = Some(self.output_path(year));
                summary.count_confidence(&dataset);

                tracing::info!(
                    "Completed {}: {} records, {} skipped in {:?}",
                    year,
                    dataset.len(),
                    state.skipped().len(),
                    started.elapsed()
                );

                Ok(YearOutcome { dataset, summary })
            }
            Err(e) => {
                self.abort(&mut state, run_id, &e);
                Err(e)
            }
        }
    }

    /// Closes the progress store
    pub fn close(self) -> Result<(), HarvestError> {
        self.store.close()?;
        Ok(())
    }

    async fn run(
        &mut self,
        state: &mut CrawlState,
        run_id: i64,
    ) -> Result<(Dataset, ValidationReport), HarvestError> {
        let year = state.year();

        self.discover(state).await?;
        self.check_cancelled(year)?;

        state.transition(CrawlPhase::FetchingRecords)?;
        self.store
            .update_run_phase(run_id, CrawlPhase::FetchingRecords)?;

        let pending = state.pending();
        tracing::info!(
            "Year {}: {} discovered, {} already completed, {} to fetch",
            year,
            state.discovered_count(),
            state.completed_count(),
            pending.len()
        );

        if self.config.crawler.workers <= 1 {
            self.fetch_sequential(state, run_id, pending).await?;
        } else {
            self.fetch_pooled(state, run_id, pending).await?;
        }

        let (dataset, validation) = self.build_dataset(state)?;
        write_dataset(&self.output_path(year), &dataset)?;

        state.transition(CrawlPhase::Completed)?;
        self.store.update_run_phase(run_id, CrawlPhase::Completed)?;

        // Every commit is already durable; the checkpoint only tidies the WAL
        if let Err(e) = self.store.snapshot(year) {
            tracing::warn!("Could not checkpoint progress store for {}: {}", year, e);
        }

        Ok((dataset, validation))
    }

    // ===== Discovering =====

    async fn discover(&self, state: &mut CrawlState) -> Result<(), HarvestError> {
        let year = state.year();
        let max_pages = self.config.crawler.max_pages;

        for page in 1..=max_pages {
            self.check_cancelled(year)?;

            let url = self.urls.listing_url(year, page)?;
            let listing = match self.fetch_listing(year, &url).await {
                Ok(listing) => listing,
                Err(HarvestError::Cancelled { year }) => {
                    return Err(HarvestError::Cancelled { year })
                }
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        "Stopping discovery for {} at page {}: {}",
                        year,
                        page,
                        e
                    );
                    break;
                }
            };

            if let Err(anomaly) = state.record_page(page, listing.total_records) {
                // Later pages no longer line up with the ones already read
                tracing::warn!("Stopping discovery for {}: {}", year, anomaly);
                state.record_anomaly(anomaly);
                break;
            }
            if let Some(anomaly) = listing.caption_anomaly(page) {
                tracing::warn!("Inconsistent listing for {}: {}", year, anomaly);
                state.record_anomaly(anomaly);
            }

            let is_last = listing.is_last_page();
            let found = listing.links.len();
            let added = state.add_links(listing.links);

            tracing::info!(
                "Year {} page {}: {} links ({} new), {} discovered",
                year,
                page,
                found,
                added,
                state.discovered_count()
            );

            if is_last {
                break;
            }
            if page == max_pages {
                tracing::warn!(
                    "Reached max-pages ({}) for {} before the last listing page",
                    max_pages,
                    year
                );
            }
        }

        Ok(())
    }

    async fn fetch_listing(&self, year: i32, url: &Url) -> Result<ListingPage, HarvestError> {
        let page = tokio::select! {
            _ = self.cancel.cancelled() => return Err(HarvestError::Cancelled { year }),
            page = self.fetcher.fetch_listing(url.as_str()) => page?,
        };
        Ok(parse_listing_page(&page.body, url)?)
    }

    // ===== FetchingRecords =====

    async fn fetch_sequential(
        &mut self,
        state: &mut CrawlState,
        run_id: i64,
        pending: Vec<RecordLink>,
    ) -> Result<(), HarvestError> {
        let year = state.year();

        for link in pending {
            self.check_cancelled(year)?;

            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return Err(HarvestError::Cancelled { year }),
                outcome = process_record(&self.fetcher, &link.url) => outcome,
            };

            self.apply_outcome(state, run_id, &link, outcome).await?;
        }

        Ok(())
    }

    /// Fetches and parses on a pool of tasks; commits stay on this task
    async fn fetch_pooled(
        &mut self,
        state: &mut CrawlState,
        run_id: i64,
        pending: Vec<RecordLink>,
    ) -> Result<(), HarvestError> {
        let year = state.year();
        let workers = self.config.crawler.workers as usize;
        tracing::info!("Fetching with {} workers", workers);

        let queue = Arc::new(Mutex::new(VecDeque::from(pending)));
        let stop = self.cancel.child_token();
        let (tx, mut rx) = mpsc::channel(workers * 2);

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let queue = Arc::clone(&queue);
            let fetcher = self.fetcher.clone();
            let stop = stop.clone();
            let tx = tx.clone();

            handles.push(tokio::spawn(async move {
                loop {
                    if stop.is_cancelled() {
                        break;
                    }
                    let Some(link) = queue.lock().await.pop_front() else {
                        break;
                    };

                    let outcome = tokio::select! {
                        _ = stop.cancelled() => break,
                        outcome = process_record(&fetcher, &link.url) => outcome,
                    };

                    if tx.send((link, outcome)).await.is_err() {
                        break;
                    }
                }
                tracing::debug!("Worker {} finished", worker_id);
            }));
        }
        drop(tx);

        let mut result = Ok(());
        while let Some((link, outcome)) = rx.recv().await {
            if let Err(e) = self.apply_outcome(state, run_id, &link, outcome).await {
                stop.cancel();
                result = Err(e);
                break;
            }
        }
        drop(rx);

        for handle in handles {
            if let Err(e) = handle.await {
                tracing::error!("Worker task failed: {}", e);
            }
        }

        result?;
        self.check_cancelled(year)
    }

    /// Commits a parsed record or records a skip
    async fn apply_outcome(
        &mut self,
        state: &mut CrawlState,
        run_id: i64,
        link: &RecordLink,
        outcome: Result<AccidentRecord, HarvestError>,
    ) -> Result<(), HarvestError> {
        let year = state.year();

        match outcome {
            Ok(record) => {
                if let Some(listed) = listing_date_mismatch(link, &record) {
                    tracing::warn!(
                        "{}: listing date {} disagrees with record date {}",
                        link.url,
                        listed,
                        record.date.as_deref().unwrap_or_default()
                    );
                }

                self.commit(year, &record, run_id).await?;
                state.mark_completed(record);

                let fetched = state.buffer().len();
                tracing::debug!("Committed {}", link.url);
                if fetched % 10 == 0 {
                    tracing::info!(
                        "Year {}: {}/{} completed, {} skipped",
                        year,
                        state.completed_count(),
                        state.discovered_count(),
                        state.skipped().len()
                    );
                }

                let interval = self.config.crawler.csv_flush_interval as usize;
                if interval > 0 && fetched % interval == 0 {
                    self.flush_partial(state);
                }
            }
            Err(e) => {
                let reason = skip_reason(&e);
                tracing::warn!("Skipping {}: {}", link.url, reason);

                if let Err(store_err) = self.store.record_skipped(year, &link.url, &reason, Some(run_id))
                {
                    tracing::warn!("Could not record skip for {}: {}", link.url, store_err);
                }
                state.mark_skipped(link.url.clone(), reason);
            }
        }

        Ok(())
    }

    /// Durably commits a record, retrying before giving up on the crawl
    async fn commit(
        &mut self,
        year: i32,
        record: &AccidentRecord,
        run_id: i64,
    ) -> Result<(), HarvestError> {
        let mut attempt = 1;
        loop {
            match self
                .store
                .mark_completed(year, &record.url, record, Some(run_id))
            {
                Ok(_) => return Ok(()),
                Err(e) if attempt < COMMIT_ATTEMPTS => {
                    tracing::warn!(
                        "Commit attempt {}/{} for {} failed: {}",
                        attempt,
                        COMMIT_ATTEMPTS,
                        record.url,
                        e
                    );
                    tokio::time::sleep(COMMIT_RETRY_DELAY * attempt).await;
                    attempt += 1;
                }
                Err(e) => {
                    tracing::error!("Giving up on commit for {}: {}", record.url, e);
                    return Err(e.into());
                }
            }
        }
    }

    // ===== Completed / Aborted =====

    /// Committed records for the year, in discovery order
    ///
    /// Records committed by earlier runs whose links were not rediscovered are
    /// kept after the discovered ones, in commit order.
    fn build_dataset(
        &self,
        state: &CrawlState,
    ) -> Result<(Dataset, ValidationReport), HarvestError> {
        let year = state.year();
        let stored = self.store.load_records(year)?;

        let mut order: HashMap<&str, usize> = HashMap::with_capacity(state.discovered_count());
        for (index, link) in state.discovered().iter().enumerate() {
            order.insert(link.url.as_str(), index);
        }

        let mut indexed: Vec<(usize, usize, AccidentRecord)> = stored
            .into_iter()
            .enumerate()
            .map(|(commit_index, record)| {
                let position = order
                    .get(record.url.as_str())
                    .copied()
                    .unwrap_or(usize::MAX);
                (position, commit_index, record)
            })
            .collect();
        indexed.sort_by_key(|(position, commit_index, _)| (*position, *commit_index));

        let records = indexed.into_iter().map(|(_, _, record)| record).collect();
        Ok(Dataset::validated(year, records))
    }

    /// Rewrites the dataset with what is committed so far
    fn flush_partial(&self, state: &CrawlState) {
        let year = state.year();
        let result = self.build_dataset(state).and_then(|(dataset, _)| {
            write_dataset(&self.output_path(year), &dataset).map_err(HarvestError::from)
        });

        match result {
            Ok(()) => tracing::debug!("Flushed partial dataset for {}", year),
            Err(e) => tracing::warn!("Could not flush partial dataset for {}: {}", year, e),
        }
    }

    fn abort(&mut self, state: &mut CrawlState, run_id: i64, cause: &HarvestError) {
        let year = state.year();
        tracing::error!("Aborting crawl for {}: {}", year, cause);

        if !state.phase().is_terminal() {
            if let Err(e) = state.transition(CrawlPhase::Aborted) {
                tracing::error!("{}", e);
            }
        }
        if let Err(e) = self.store.update_run_phase(run_id, CrawlPhase::Aborted) {
            tracing::error!("Could not mark run {} aborted: {}", run_id, e);
        }

        self.flush_partial(state);
    }

    fn summarize(
        &self,
        state: &CrawlState,
        run_id: i64,
        validation: ValidationReport,
        started: Instant,
    ) -> CrawlSummary {
        let fetched = state.buffer().len();
        let completed = state.completed_count();

        CrawlSummary {
            year: state.year(),
            run_id: Some(run_id),
            phase: state.phase(),
            pages_visited: state.pages_visited(),
            reported_total: state.reported_total(),
            discovered: state.discovered_count(),
            duplicate_links: state.duplicate_links(),
            anomalies: state.anomalies().to_vec(),
            resumed: completed.saturating_sub(fetched),
            fetched,
            completed,
            skipped: state.skipped().to_vec(),
            low: 0,
            medium: 0,
            high: 0,
            validation,
            output_path: None,
            elapsed: started.elapsed(),
        }
    }

    fn check_cancelled(&self, year: i32) -> Result<(), HarvestError> {
        if self.cancel.is_cancelled() {
            return Err(HarvestError::Cancelled { year });
        }
        Ok(())
    }
}

/// Fetches and parses one detail page
async fn process_record(fetcher: &Fetcher, url: &str) -> Result<AccidentRecord, HarvestError> {
    let page = fetcher.fetch_record(url).await?;
    Ok(parse_record_page(&page.body, url)?)
}

/// The listing's date for `link`, if it parses and differs from the record's
///
/// Records whose own date could not be normalized are not compared.
fn listing_date_mismatch(link: &RecordLink, record: &AccidentRecord) -> Option<NaiveDate> {
    let listed = normalize::parse_date(link.date_text.as_deref()?)?;
    let recorded = NaiveDate::parse_from_str(record.date.as_deref()?, "%Y-%m-%d").ok()?;
    (listed != recorded).then_some(listed)
}

/// Short, URL-free description of why a record was skipped
fn skip_reason(error: &HarvestError) -> String {
    match error {
        HarvestError::Fetch(FetchError::Http { status, .. }) => format!("HTTP {}", status),
        HarvestError::Fetch(FetchError::Timeout { .. }) => "timed out".to_string(),
        HarvestError::Fetch(FetchError::Connection { message, .. }) => {
            format!("connection failed: {}", message)
        }
        HarvestError::Parse(ParseError::EmptyRecord { .. }) => {
            "no expected fields found".to_string()
        }
        HarvestError::Parse(ParseError::UnexpectedStructure { message, .. }) => {
            format!("unexpected page structure: {}", message)
        }
        other => other.to_string(),
    }
}

/// Crawls one year with a fresh coordinator and returns its dataset
///
/// # Example
///
/// ```no_run
/// use asn_harvest::config::load_config;
/// use asn_harvest::scrape_year;
/// use std::path::Path;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(Path::new("config.toml"))?;
/// let dataset = scrape_year(config, 2024).await?;
/// println!("{} records", dataset.len());
/// # Ok(())
/// # }
/// ```
pub async fn scrape_year(config: Config, year: i32) -> Result<Dataset, HarvestError> {
    let mut coordinator = Coordinator::new(config, false)?;
    let result = coordinator.scrape_year(year).await;
    coordinator.close()?;
    Ok(result?.dataset)
}

/// Runs discovery only for one year
pub async fn analyze(config: Config, year: i32) -> Result<DiscoveryReport, HarvestError> {
    let mut coordinator = Coordinator::new(config, false)?;
    let result = coordinator.analyze(year).await;
    coordinator.close()?;
    result
}
