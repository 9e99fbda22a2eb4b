//! Listing page parser
//!
//! A year's listing is split across numbered pages. Each page carries a table
//! of occurrences (one row per accident, linking to its detail page) and a
//! caption such as `1234 occurrences in the ASN safety database, showing
//! occurrence 1 - 100`.

use crate::record::normalize::collapse_whitespace;
use crate::url::resolve_link;
use crate::ParseError;
use regex::Regex;
use scraper::{Html, Selector};
use std::sync::LazyLock;
use url::Url;

static CONTAINER: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("div#contentwrapper, table.hp").expect("valid selector"));
static CAPTION: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("span.caption").expect("valid selector"));
static TABLE: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("table.hp").expect("valid selector"));
static ROW: LazyLock<Selector> = LazyLock::new(|| Selector::parse("tr").expect("valid selector"));
static ANCHOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("a[href]").expect("valid selector"));

static TOTAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*occurrences").expect("valid regex"));
static RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)showing occurrences?\s+(\d+)\s*-\s*(\d+)").expect("valid regex")
});

/// A link to one accident detail page, as found on a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLink {
    /// Absolute detail URL, fragment removed
    pub url: String,
    /// The listing's date cell for this row, if any
    pub date_text: Option<String>,
}

/// One parsed listing page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListingPage {
    /// Record links in page order
    pub links: Vec<RecordLink>,
    /// Total occurrences for the year, from the caption
    pub total_records: Option<u32>,
    /// Occurrence range shown on this page, from the caption
    pub range: Option<(u32, u32)>,
}

impl ListingPage {
    /// True if no further page should be requested after this one
    ///
    /// An empty page always ends pagination. A caption whose range reaches the
    /// advertised total does too.
    pub fn is_last_page(&self) -> bool {
        if self.links.is_empty() {
            return true;
        }
        matches!(
            (self.range, self.total_records),
            (Some((_, end)), Some(total)) if end >= total
        )
    }

    /// Checks the caption range against itself and against the links found
    ///
    /// A range must satisfy `1 <= start <= end <= total`, and a page showing
    /// `start - end` must carry exactly `end - start + 1` links. Pages
    /// without a range are not checked.
    pub fn caption_anomaly(&self, page: u32) -> Option<ListingAnomaly> {
        let (start, end) = self.range?;

        let within_total = self.total_records.map_or(true, |total| end <= total);
        if start == 0 || start > end || !within_total {
            return Some(ListingAnomaly::InvalidRange {
                page,
                start,
                end,
                total: self.total_records,
            });
        }

        let expected = (end - start + 1) as usize;
        (self.links.len() != expected).then(|| ListingAnomaly::LinkCountMismatch {
            page,
            expected,
            found: self.links.len(),
        })
    }
}

/// A listing caption that disagrees with itself, its page or earlier pages
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListingAnomaly {
    /// The advertised total differs from the one on an earlier page
    TotalChanged { page: u32, expected: u32, found: u32 },

    /// The shown range is not within `1..=total`
    InvalidRange {
        page: u32,
        start: u32,
        end: u32,
        total: Option<u32>,
    },

    /// The page lists a different number of links than its range covers
    LinkCountMismatch {
        page: u32,
        expected: usize,
        found: usize,
    },
}

impl std::fmt::Display for ListingAnomaly {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TotalChanged {
                page,
                expected,
                found,
            } => write!(
                f,
                "page {}: total changed from {} to {} occurrences",
                page, expected, found
            ),
            Self::InvalidRange {
                page,
                start,
                end,
                total: Some(total),
            } => write!(
                f,
                "page {}: invalid range {} - {} of {}",
                page, start, end, total
            ),
            Self::InvalidRange {
                page, start, end, ..
            } => write!(f, "page {}: invalid range {} - {}", page, start, end),
            Self::LinkCountMismatch {
                page,
                expected,
                found,
            } => write!(
                f,
                "page {}: expected {} links, found {}",
                page, expected, found
            ),
        }
    }
}

/// Parses a listing page into record links plus pagination metadata
///
/// # Arguments
///
/// * `html` - The listing page body
/// * `page_url` - The URL the page was fetched from; relative links resolve against it
///
/// # Returns
///
/// * `Ok(ListingPage)` - Parsed page; an empty `links` list means past the last page
/// * `Err(ParseError::UnexpectedStructure)` - Neither the content wrapper nor the
///   occurrence table is present
pub fn parse_listing_page(html: &str, page_url: &Url) -> Result<ListingPage, ParseError> {
    let document = Html::parse_document(html);

    if document.select(&CONTAINER).next().is_none() {
        return Err(ParseError::UnexpectedStructure {
            url: page_url.to_string(),
            message: "no div#contentwrapper or table.hp".to_string(),
        });
    }

    let caption = document
        .select(&CAPTION)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()));

    let (total_records, range) = match caption.as_deref() {
        Some(text) => parse_caption(text),
        None => (None, None),
    };

    Ok(ListingPage {
        links: extract_links(&document, page_url),
        total_records,
        range,
    })
}

/// Reads the occurrence total and shown range out of a caption
fn parse_caption(text: &str) -> (Option<u32>, Option<(u32, u32)>) {
    let total = TOTAL_RE
        .captures(text)
        .and_then(|caps| caps[1].parse().ok());

    let range = RANGE_RE.captures(text).and_then(|caps| {
        let start = caps[1].parse().ok()?;
        let end = caps[2].parse().ok()?;
        Some((start, end))
    });

    (total, range)
}

fn extract_links(document: &Html, page_url: &Url) -> Vec<RecordLink> {
    let mut links = Vec::new();

    for table in document.select(&TABLE) {
        // First row is the column header
        for row in table.select(&ROW).skip(1) {
            let Some(anchor) = row.select(&ANCHOR).next() else {
                continue;
            };
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(url) = resolve_link(href, page_url) else {
                tracing::debug!("Skipping unusable listing link: {}", href);
                continue;
            };

            let date_text = collapse_whitespace(&anchor.text().collect::<String>());
            links.push(RecordLink {
                url: url.to_string(),
                date_text: (!date_text.is_empty()).then_some(date_text),
            });
        }
    }

    links
}
