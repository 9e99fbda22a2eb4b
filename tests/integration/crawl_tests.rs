//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock ASN servers and test
//! the full per-year crawl cycle end-to-end.

use asn_harvest::config::{
    Config, CrawlerConfig, FetcherConfig, OutputConfig, RateLimitConfig, SourceConfig,
    UserAgentConfig,
};
use asn_harvest::crawler::{Coordinator, ListingAnomaly};
use asn_harvest::record::COLUMNS;
use asn_harvest::storage::{open_store, ProgressStore, StoreError};
use asn_harvest::{ConfidenceRating, CrawlPhase, HarvestError};
use std::path::Path;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const YEAR: i32 = 2024;

/// Creates a test configuration pointing at the mock server
fn create_test_config(base_url: &str, dir: &Path) -> Config {
    Config {
        source: SourceConfig {
            base_url: base_url.to_string(),
            listing_path: "/database/year/{year}/{page}".to_string(),
        },
        fetcher: FetcherConfig {
            timeout_secs: 5,
            connect_timeout_secs: 2,
            max_attempts: 3,
            retry_base_delay_ms: 5, // Very short for testing
            retry_max_delay_ms: 20,
            retry_jitter_percent: 0,
        },
        rate_limit: RateLimitConfig::disabled(),
        crawler: CrawlerConfig {
            workers: 1,
            max_pages: 20,
            csv_flush_interval: 1,
        },
        user_agent: UserAgentConfig {
            crawler_name: "TestBot".to_string(),
            crawler_version: "1.0.0".to_string(),
            contact_url: "https://example.com/contact".to_string(),
            contact_email: "test@example.com".to_string(),
        },
        output: OutputConfig {
            directory: dir.join("output").display().to_string(),
            database_path: dir.join("progress.db").display().to_string(),
        },
    }
}

/// Builds a listing page with one table row per `(href, date)`
fn listing_page(caption: &str, rows: &[(&str, &str)]) -> String {
    let rows: String = rows
        .iter()
        .map(|(href, date)| {
            format!(
                r#"<tr class="list"><td class="list"><nobr><a href="{}">{}</a></nobr></td>
                   <td class="list">Boeing 737</td><td class="list">EI-ABC</td></tr>"#,
                href, date
            )
        })
        .collect();

    format!(
        r#"<html><body><div id="contentwrapper">
            <span class="caption">{}</span>
            <table class="hp">
              <tr><th>date</th><th>type</th><th>reg.</th></tr>
              {}
            </table>
        </div></body></html>"#,
        caption, rows
    )
}

/// Builds a detail page with one label/value row per entry
fn detail_page(rows: &[(&str, &str)]) -> String {
    let rows: String = rows
        .iter()
        .map(|(label, value)| {
            format!(
                r#"<tr><td class="caption">{}</td><td class="desc">{}</td></tr>"#,
                label, value
            )
        })
        .collect();

    format!(
        r#"<html><body><div class="innertube"><table>{}</table></div></body></html>"#,
        rows
    )
}

fn full_detail(date: &str, registration: &str) -> String {
    detail_page(&[
        ("Date:", date),
        ("Time:", "14:05"),
        ("Type:", "Airbus A320-214"),
        ("Owner/operator:", "Example Airways"),
        ("Registration:", registration),
        ("Fatalities:", "Fatalities: 0 / Occupants: 150"),
        ("Aircraft damage:", "Minor"),
        ("Location:", "Example City Airport"),
        ("Phase:", "Landing"),
    ])
}

async fn mount_listing(server: &MockServer, page: u32, body: String) {
    Mock::given(method("GET"))
        .and(path(format!("/database/year/{}/{}", YEAR, page)))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, record_path: &str, body: String, expected: u64) {
    Mock::given(method("GET"))
        .and(path(record_path))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected)
        .mount(server)
        .await;
}

/// Two records on page 1, then an empty page 2
async fn mount_two_record_year(server: &MockServer, detail_fetches: u64) {
    mount_listing(
        server,
        1,
        listing_page(
            "2 occurrences in the ASN safety database",
            &[("/wikibase/1", "12 MAR 2024"), ("/wikibase/2", "14 MAR 2024")],
        ),
    )
    .await;
    mount_listing(server, 2, listing_page("", &[])).await;

    mount_detail(
        server,
        "/wikibase/1",
        detail_page(&[
            ("Date:", "12 MAR 2024"),
            ("Type:", "Boeing 737"),
            ("Fatalities:", "0"),
            ("Owner/operator:", "Example Air"),
            ("Registration:", "EI-ABC"),
        ]),
        detail_fetches,
    )
    .await;
    mount_detail(
        server,
        "/wikibase/2",
        full_detail("Thursday 14 March 2024", "D-AXYZ"),
        detail_fetches,
    )
    .await;
}

#[tokio::test]
async fn test_full_crawl_writes_dataset() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_two_record_year(&server, 1).await;

    let config = create_test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, false).unwrap();
    let outcome = coordinator.scrape_year(YEAR).await.unwrap();

    // Dataset follows listing order
    let urls: Vec<_> = outcome.dataset.urls().collect();
    assert_eq!(
        urls,
        vec![
            format!("{}/wikibase/1", server.uri()),
            format!("{}/wikibase/2", server.uri()),
        ]
    );

    // 4 of 6 checklist fields present -> medium
    let first = &outcome.dataset.records[0];
    assert_eq!(first.date.as_deref(), Some("2024-03-12"));
    assert_eq!(first.aircraft_type.as_deref(), Some("Boeing 737"));
    assert_eq!(first.fatalities, Some(0));
    assert_eq!(first.confidence, ConfidenceRating::Medium);

    let second = &outcome.dataset.records[1];
    assert_eq!(second.date.as_deref(), Some("2024-03-14"));
    assert_eq!(second.confidence, ConfidenceRating::High);

    // Summary
    assert_eq!(outcome.summary.phase, CrawlPhase::Completed);
    assert_eq!(outcome.summary.pages_visited, 2);
    assert_eq!(outcome.summary.discovered, 2);
    assert_eq!(outcome.summary.fetched, 2);
    assert!(outcome.summary.skipped.is_empty());
    assert_eq!((outcome.summary.high, outcome.summary.medium), (1, 1));

    // CSV on disk
    let csv_path = dir.path().join("output/asn_accidents_2024.csv");
    let content = std::fs::read_to_string(&csv_path).unwrap();
    let lines: Vec<_> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0], COLUMNS.join(","));
    assert!(lines[1].starts_with("2024-03-12,,Boeing 737,Example Air,EI-ABC,,,,0,"));
    assert!(lines[1].ends_with(&format!(",medium,{}/wikibase/1", server.uri())));

    // Run recorded as completed
    let run = coordinator.store().latest_run(YEAR).unwrap().unwrap();
    assert_eq!(run.phase, CrawlPhase::Completed);
    assert_eq!(coordinator.store().load_completed(YEAR).unwrap().len(), 2);
}

#[tokio::test]
async fn test_pagination_stops_after_empty_page() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_listing(&server, 1, listing_page("", &[("/wikibase/1", "1 JAN 2024")])).await;
    mount_listing(
        &server,
        2,
        listing_page("", &[("/wikibase/2", "2 JAN 2024"), ("/wikibase/3", "3 JAN 2024")]),
    )
    .await;
    mount_listing(&server, 3, listing_page("", &[])).await;

    // Never requested
    Mock::given(method("GET"))
        .and(path(format!("/database/year/{}/4", YEAR)))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, false).unwrap();
    let report = coordinator.analyze(YEAR).await.unwrap();

    assert_eq!(report.pages_visited, 3);
    assert_eq!(report.links, 3);
}

#[tokio::test]
async fn test_caption_range_ends_pagination() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_listing(
        &server,
        1,
        listing_page(
            "1 occurrences in the ASN safety database, showing occurrence 1 - 1",
            &[("/wikibase/1", "1 JAN 2024")],
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!("/database/year/{}/2", YEAR)))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, false).unwrap();
    let report = coordinator.analyze(YEAR).await.unwrap();

    assert_eq!(report.pages_visited, 1);
    assert_eq!(report.reported_total, Some(1));
}

#[tokio::test]
async fn test_missing_record_is_skipped() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_listing(
        &server,
        1,
        listing_page("", &[("/wikibase/1", "1 JAN 2024"), ("/wikibase/404", "2 JAN 2024")]),
    )
    .await;
    mount_listing(&server, 2, listing_page("", &[])).await;
    mount_detail(&server, "/wikibase/1", full_detail("1 JAN 2024", "N1"), 1).await;

    // 4xx is permanent: exactly one request
    Mock::given(method("GET"))
        .and(path("/wikibase/404"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, false).unwrap();
    let outcome = coordinator.scrape_year(YEAR).await.unwrap();

    assert_eq!(outcome.dataset.len(), 1);
    assert_eq!(outcome.summary.skipped.len(), 1);
    assert_eq!(
        outcome.summary.skipped[0].url,
        format!("{}/wikibase/404", server.uri())
    );
    assert_eq!(outcome.summary.skipped[0].reason, "HTTP 404");

    let content =
        std::fs::read_to_string(dir.path().join("output/asn_accidents_2024.csv")).unwrap();
    assert!(!content.contains("/wikibase/404"));

    let skipped = coordinator.store().load_skipped(YEAR).unwrap();
    assert_eq!(skipped.len(), 1);
}

#[tokio::test]
async fn test_empty_record_is_skipped() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_listing(&server, 1, listing_page("", &[("/wikibase/1", "1 JAN 2024")])).await;
    mount_listing(&server, 2, listing_page("", &[])).await;
    mount_detail(
        &server,
        "/wikibase/1",
        "<html><body><p>This record has been removed.</p></body></html>".to_string(),
        1,
    )
    .await;

    let config = create_test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, false).unwrap();
    let outcome = coordinator.scrape_year(YEAR).await.unwrap();

    assert!(outcome.dataset.is_empty());
    assert_eq!(outcome.summary.skipped[0].reason, "no expected fields found");
}

#[tokio::test]
async fn test_server_errors_are_retried() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_listing(&server, 1, listing_page("", &[("/wikibase/1", "1 JAN 2024")])).await;
    mount_listing(&server, 2, listing_page("", &[])).await;

    // Two failures, then success on the third attempt
    Mock::given(method("GET"))
        .and(path("/wikibase/1"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    mount_detail(&server, "/wikibase/1", full_detail("1 JAN 2024", "N1"), 1).await;

    let config = create_test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, false).unwrap();
    let outcome = coordinator.scrape_year(YEAR).await.unwrap();

    assert_eq!(outcome.dataset.len(), 1);
    assert!(outcome.summary.skipped.is_empty());
}

#[tokio::test]
async fn test_retry_exhaustion_is_skipped() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_listing(
        &server,
        1,
        listing_page("", &[("/wikibase/500", "1 JAN 2024"), ("/wikibase/2", "2 JAN 2024")]),
    )
    .await;
    mount_listing(&server, 2, listing_page("", &[])).await;
    Mock::given(method("GET"))
        .and(path("/wikibase/500"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    mount_detail(&server, "/wikibase/2", full_detail("2 JAN 2024", "N2"), 1).await;

    let config = create_test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, false).unwrap();
    let outcome = coordinator.scrape_year(YEAR).await.unwrap();

    assert_eq!(outcome.dataset.len(), 1);
    assert_eq!(outcome.summary.skipped[0].reason, "HTTP 500");
}

#[tokio::test]
async fn test_second_run_fetches_nothing() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_two_record_year(&server, 1).await;

    let config = create_test_config(&server.uri(), dir.path());
    let first = {
        let mut coordinator = Coordinator::new(config.clone(), false).unwrap();
        let outcome = coordinator.scrape_year(YEAR).await.unwrap();
        coordinator.close().unwrap();
        outcome
    };
    server.verify().await;

    // Same source, populated store: no detail page may be requested again
    server.reset().await;
    mount_two_record_year(&server, 0).await;

    let mut coordinator = Coordinator::new(config, false).unwrap();
    let second = coordinator.scrape_year(YEAR).await.unwrap();

    assert_eq!(second.dataset, first.dataset);
    assert_eq!(second.summary.fetched, 0);
    assert_eq!(second.summary.resumed, 2);
}

#[tokio::test]
async fn test_resume_skips_committed_records() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = create_test_config(&server.uri(), dir.path());

    mount_listing(
        &server,
        1,
        listing_page(
            "",
            &[
                ("/wikibase/1", "1 JAN 2024"),
                ("/wikibase/2", "2 JAN 2024"),
                ("/wikibase/3", "3 JAN 2024"),
            ],
        ),
    )
    .await;
    mount_listing(&server, 2, listing_page("", &[])).await;
    mount_detail(&server, "/wikibase/1", full_detail("1 JAN 2024", "N1"), 0).await;
    mount_detail(&server, "/wikibase/2", full_detail("2 JAN 2024", "N2"), 0).await;
    mount_detail(&server, "/wikibase/3", full_detail("3 JAN 2024", "N3"), 1).await;

    // An earlier, interrupted run committed the first two records
    {
        let mut store = open_store(Path::new(&config.output.database_path)).unwrap();
        for n in 1..=2 {
            let url = format!("{}/wikibase/{}", server.uri(), n);
            let record = asn_harvest::crawler::parse_record_page(
                &full_detail(&format!("{} JAN 2024", n), &format!("N{}", n)),
                &url,
            )
            .unwrap();
            assert!(store.mark_completed(YEAR, &url, &record, None).unwrap());
        }
        assert_eq!(store.load_completed(YEAR).unwrap().len(), 2);
        store.close().unwrap();
    }

    let mut coordinator = Coordinator::new(config, false).unwrap();
    let outcome = coordinator.scrape_year(YEAR).await.unwrap();

    assert_eq!(outcome.dataset.len(), 3);
    assert_eq!(outcome.summary.resumed, 2);
    assert_eq!(outcome.summary.fetched, 1);
    assert_eq!(
        outcome.dataset.records[2].registration.as_deref(),
        Some("N3")
    );
    assert_eq!(coordinator.store().load_completed(YEAR).unwrap().len(), 3);
}

#[tokio::test]
async fn test_fresh_crawl_refetches() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_two_record_year(&server, 2).await;

    let config = create_test_config(&server.uri(), dir.path());
    {
        let mut coordinator = Coordinator::new(config.clone(), false).unwrap();
        coordinator.scrape_year(YEAR).await.unwrap();
        coordinator.close().unwrap();
    }

    let mut coordinator = Coordinator::new(config, true).unwrap();
    let outcome = coordinator.scrape_year(YEAR).await.unwrap();
    assert_eq!(outcome.summary.fetched, 2);
    assert_eq!(outcome.summary.resumed, 0);
}

#[tokio::test]
async fn test_analyze_fetches_no_records() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_two_record_year(&server, 0).await;

    let config = create_test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, false).unwrap();
    let report = coordinator.analyze(YEAR).await.unwrap();

    assert_eq!(report.links, 2);
    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.reported_total, Some(2));
    assert_eq!(report.remaining(), 2);
    assert!(coordinator.store().latest_run(YEAR).unwrap().is_none());
}

#[tokio::test]
async fn test_cancelled_crawl_is_aborted() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    token.cancel();

    let config = create_test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, false)
        .unwrap()
        .with_cancellation(token);

    let err = coordinator.scrape_year(YEAR).await.unwrap_err();
    assert!(matches!(err, HarvestError::Cancelled { year: YEAR }));

    let run = coordinator.store().latest_run(YEAR).unwrap().unwrap();
    assert_eq!(run.phase, CrawlPhase::Aborted);
    assert!(coordinator.store().load_completed(YEAR).unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_links_across_pages() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_listing(
        &server,
        1,
        listing_page("", &[("/wikibase/1", "1 JAN 2024"), ("/wikibase/2", "2 JAN 2024")]),
    )
    .await;
    mount_listing(
        &server,
        2,
        listing_page("", &[("/wikibase/2#dup", "2 JAN 2024"), ("/wikibase/3", "3 JAN 2024")]),
    )
    .await;
    mount_listing(&server, 3, listing_page("", &[])).await;
    for n in 1..=3 {
        mount_detail(
            &server,
            &format!("/wikibase/{}", n),
            full_detail(&format!("{} JAN 2024", n), &format!("N{}", n)),
            1,
        )
        .await;
    }

    let config = create_test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, false).unwrap();
    let outcome = coordinator.scrape_year(YEAR).await.unwrap();

    assert_eq!(outcome.dataset.len(), 3);
    assert_eq!(outcome.summary.duplicate_links, 1);
    assert!(outcome.summary.validation.is_clean());
}

#[tokio::test]
async fn test_worker_pool_commits_every_record() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let hrefs: Vec<String> = (1..=6).map(|n| format!("/wikibase/{}", n)).collect();
    let rows: Vec<(&str, &str)> = hrefs.iter().map(|h| (h.as_str(), "1 JAN 2024")).collect();
    mount_listing(&server, 1, listing_page("", &rows)).await;
    mount_listing(&server, 2, listing_page("", &[])).await;
    for (n, href) in hrefs.iter().enumerate() {
        mount_detail(&server, href, full_detail("1 JAN 2024", &format!("N{}", n + 1)), 1).await;
    }

    let mut config = create_test_config(&server.uri(), dir.path());
    config.crawler.workers = 3;

    let mut coordinator = Coordinator::new(config, false).unwrap();
    let outcome = coordinator.scrape_year(YEAR).await.unwrap();

    // Output order is discovery order regardless of completion order
    let registrations: Vec<_> = outcome
        .dataset
        .records
        .iter()
        .map(|r| r.registration.clone().unwrap())
        .collect();
    assert_eq!(registrations, vec!["N1", "N2", "N3", "N4", "N5", "N6"]);
    assert_eq!(coordinator.store().load_completed(YEAR).unwrap().len(), 6);
}

#[tokio::test]
async fn test_listing_failure_on_first_page_aborts() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    Mock::given(method("GET"))
        .and(path(format!("/database/year/{}/1", YEAR)))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><body>maintenance</body></html>"))
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, false).unwrap();
    let err = coordinator.scrape_year(YEAR).await.unwrap_err();

    assert!(matches!(err, HarvestError::Parse(_)));
    let run = coordinator.store().latest_run(YEAR).unwrap().unwrap();
    assert_eq!(run.phase, CrawlPhase::Aborted);
}

#[tokio::test]
async fn test_scrape_year_entry_point() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_two_record_year(&server, 1).await;

    let config = create_test_config(&server.uri(), dir.path());
    let dataset = asn_harvest::scrape_year(config, YEAR).await.unwrap();

    assert_eq!(dataset.year, YEAR);
    assert_eq!(dataset.len(), 2);
    assert!(dataset.rows().iter().all(|row| row.len() == COLUMNS.len()));
}

#[tokio::test]
async fn test_changed_total_stops_discovery() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_listing(
        &server,
        1,
        listing_page(
            "245 occurrences in the ASN safety database, showing occurrence 1 - 100",
            &[("/wikibase/1", "1 JAN 2024")],
        ),
    )
    .await;
    mount_listing(
        &server,
        2,
        listing_page(
            "300 occurrences in the ASN safety database, showing occurrence 101 - 200",
            &[("/wikibase/2", "2 JAN 2024")],
        ),
    )
    .await;
    Mock::given(method("GET"))
        .and(path(format!("/database/year/{}/3", YEAR)))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config, false).unwrap();
    let report = coordinator.analyze(YEAR).await.unwrap();

    // The first total is kept and page 2's links are not trusted
    assert_eq!(report.reported_total, Some(245));
    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.links, 1);
    assert_eq!(
        report.anomalies,
        vec![
            ListingAnomaly::LinkCountMismatch {
                page: 1,
                expected: 100,
                found: 1,
            },
            ListingAnomaly::TotalChanged {
                page: 2,
                expected: 245,
                found: 300,
            },
        ]
    );
}

#[tokio::test]
async fn test_failing_commits_abort_the_crawl() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_listing(
        &server,
        1,
        listing_page("", &[("/wikibase/1", "1 JAN 2024"), ("/wikibase/2", "2 JAN 2024")]),
    )
    .await;
    mount_listing(&server, 2, listing_page("", &[])).await;
    // Fetched once; the failed commit does not trigger a refetch
    mount_detail(&server, "/wikibase/1", full_detail("1 JAN 2024", "N1"), 1).await;
    mount_detail(&server, "/wikibase/2", full_detail("2 JAN 2024", "N2"), 0).await;

    let config = create_test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config.clone(), false).unwrap();

    // Every insert into the completed table fails from here on
    let conn = rusqlite::Connection::open(&config.output.database_path).unwrap();
    conn.execute_batch(
        "CREATE TRIGGER reject_commits BEFORE INSERT ON completed_records
         BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END;",
    )
    .unwrap();

    let err = coordinator.scrape_year(YEAR).await.unwrap_err();
    let failed_url = format!("{}/wikibase/1", server.uri());
    assert!(matches!(
        err,
        HarvestError::Store(StoreError::WriteFailure { ref url, .. }) if *url == failed_url
    ));

    let store = coordinator.store();
    assert_eq!(store.latest_run(YEAR).unwrap().unwrap().phase, CrawlPhase::Aborted);
    assert!(store.load_completed(YEAR).unwrap().is_empty());
    // Not downgraded to a skip either
    assert!(store.load_skipped(YEAR).unwrap().is_empty());
}

#[tokio::test]
async fn test_interrupted_crawl_resumes_where_it_stopped() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    mount_listing(
        &server,
        1,
        listing_page("", &[("/wikibase/1", "1 JAN 2024"), ("/wikibase/2", "2 JAN 2024")]),
    )
    .await;
    mount_listing(&server, 2, listing_page("", &[])).await;
    mount_detail(&server, "/wikibase/1", full_detail("1 JAN 2024", "N1"), 1).await;

    // Record 2 is still in flight when the interrupt arrives
    Mock::given(method("GET"))
        .and(path("/wikibase/2"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(full_detail("2 JAN 2024", "N2"))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let config = create_test_config(&server.uri(), dir.path());
    let token = CancellationToken::new();
    let interrupt = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        interrupt.cancel();
    });

    {
        let mut coordinator = Coordinator::new(config.clone(), false)
            .unwrap()
            .with_cancellation(token);
        let err = coordinator.scrape_year(YEAR).await.unwrap_err();
        assert!(matches!(err, HarvestError::Cancelled { year: YEAR }));

        let store = coordinator.store();
        assert_eq!(store.latest_run(YEAR).unwrap().unwrap().phase, CrawlPhase::Aborted);
        assert_eq!(
            store.load_completed(YEAR).unwrap(),
            [format!("{}/wikibase/1", server.uri())].into_iter().collect()
        );
        coordinator.close().unwrap();
    }

    // The partial dataset holds the one committed record
    let content =
        std::fs::read_to_string(dir.path().join("output/asn_accidents_2024.csv")).unwrap();
    assert_eq!(content.lines().count(), 2);

    // Rerun: only the interrupted record is fetched
    server.reset().await;
    mount_listing(
        &server,
        1,
        listing_page("", &[("/wikibase/1", "1 JAN 2024"), ("/wikibase/2", "2 JAN 2024")]),
    )
    .await;
    mount_listing(&server, 2, listing_page("", &[])).await;
    mount_detail(&server, "/wikibase/1", full_detail("1 JAN 2024", "N1"), 0).await;
    mount_detail(&server, "/wikibase/2", full_detail("2 JAN 2024", "N2"), 1).await;

    let mut coordinator = Coordinator::new(config, false).unwrap();
    let outcome = coordinator.scrape_year(YEAR).await.unwrap();

    assert_eq!(outcome.summary.resumed, 1);
    assert_eq!(outcome.summary.fetched, 1);
    let registrations: Vec<_> = outcome
        .dataset
        .records
        .iter()
        .map(|r| r.registration.clone().unwrap())
        .collect();
    assert_eq!(registrations, vec!["N1", "N2"]);
}

#[tokio::test]
async fn test_blocked_checkpoint_keeps_run_completed() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_two_record_year(&server, 1).await;

    let config = create_test_config(&server.uri(), dir.path());
    let mut coordinator = Coordinator::new(config.clone(), false).unwrap();

    // A concurrent reader (e.g. --stats) holds the write-ahead log open
    let reader = rusqlite::Connection::open(&config.output.database_path).unwrap();
    reader.execute_batch("BEGIN").unwrap();
    let _: i64 = reader
        .query_row("SELECT COUNT(*) FROM runs", [], |row| row.get(0))
        .unwrap();

    let outcome = coordinator.scrape_year(YEAR).await.unwrap();
    reader.execute_batch("COMMIT").unwrap();

    assert_eq!(outcome.dataset.len(), 2);
    let run = coordinator.store().latest_run(YEAR).unwrap().unwrap();
    assert_eq!(run.phase, CrawlPhase::Completed);
    assert!(run.finished_at.is_some());
}
