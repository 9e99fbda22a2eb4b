use url::Url;

/// Resolves a listing `href` to the absolute detail URL used as a record key
///
/// # Normalization Steps
///
/// 1. Trim and reject empty, fragment-only and non-navigational hrefs
///    (`javascript:`, `mailto:`, `tel:`, `data:`)
/// 2. Resolve against the page URL
/// 3. Reject anything that is not HTTP or HTTPS
/// 4. Remove the fragment (everything after #)
///
/// Host case is already normalized by the `url` crate. Query strings are kept
/// as-is since the wikibase uses them to address records.
///
/// # Examples
///
/// ```
/// use asn_harvest::url::resolve_link;
/// use url::Url;
///
/// let base = Url::parse("https://aviation-safety.net/database/year/2024/1").unwrap();
/// let url = resolve_link("/wikibase/123456#top", &base).unwrap();
/// assert_eq!(url.as_str(), "https://aviation-safety.net/wikibase/123456");
/// ```
pub fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lowered = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lowered.starts_with(scheme))
    {
        return None;
    }

    let mut url = base_url.join(href).ok()?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return None;
    }

    url.set_fragment(None);
    Some(url)
}
