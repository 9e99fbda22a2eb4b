//! URL handling for the ASN wikibase
//!
//! This module builds listing-page URLs from the configured source and
//! resolves detail links found on those pages into record keys.

mod normalize;

use crate::config::SourceConfig;
use crate::ConfigError;

pub use normalize::resolve_link;

/// Addresses of one ASN source
///
/// Built once from `[source]` and shared by the coordinator and its workers.
#[derive(Debug, Clone)]
pub struct SourceUrls {
    base: ::url::Url,
    listing_path: String,
}

impl SourceUrls {
    /// Creates the URL builder for a configured source
    ///
    /// # Returns
    ///
    /// * `Ok(SourceUrls)` - The base URL parsed
    /// * `Err(ConfigError::InvalidUrl)` - The base URL is malformed
    pub fn new(source: &SourceConfig) -> Result<Self, ConfigError> {
        let base = ::url::Url::parse(&source.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", source.base_url, e)))?;

        Ok(Self {
            base,
            listing_path: source.listing_path.clone(),
        })
    }

    pub fn base(&self) -> &::url::Url {
        &self.base
    }

    /// URL of one listing page of a year (pages are 1-based)
    ///
    /// # Examples
    ///
    /// ```
    /// use asn_harvest::config::SourceConfig;
    /// use asn_harvest::url::SourceUrls;
    ///
    /// let urls = SourceUrls::new(&SourceConfig {
    ///     base_url: "https://aviation-safety.net".to_string(),
    ///     listing_path: "/database/year/{year}/{page}".to_string(),
    /// })
    /// .unwrap();
    /// let url = urls.listing_url(2024, 3).unwrap();
    /// assert_eq!(url.as_str(), "https://aviation-safety.net/database/year/2024/3");
    /// ```
    pub fn listing_url(&self, year: i32, page: u32) -> Result<::url::Url, ::url::ParseError> {
        let path = self
            .listing_path
            .replace("{year}", &year.to_string())
            .replace("{page}", &page.to_string());
        self.base.join(&path)
    }
}
