//! HTML link extraction for the `links` handler
//!
//! Anchors are resolved against the page URL and kept only when the
//! absolute form starts with the handler's base URL.

use scraper::{Html, Selector};
use url::Url;

/// Extracts followable links from an HTML document
///
/// # Link Extraction Rules
///
/// **Include:**
/// - `<a href="...">` tags anywhere in the document
///
/// **Exclude:**
/// - `javascript:`, `mailto:`, `tel:` and `data:` hrefs
/// - Fragment-only hrefs (same page anchors)
/// - Anything that does not start with `base_prefix` once resolved
///
/// # Arguments
///
/// * `html` - The HTML content to parse
/// * `page_url` - The URL the page was served from, for resolving relative links
/// * `base_prefix` - Required prefix of every returned link
///
/// # Returns
///
/// Absolute URLs in document order. Duplicates are kept; the frontier
/// drops them.
///
/// # Example
///
/// ```
/// use harvester::crawler::extract_links;
/// use url::Url;
///
/// let html = r#"<a href="/p/1">One</a><a href="https://elsewhere.example/">Off-site</a>"#;
/// let page = Url::parse("https://shop.example/c/shoes").unwrap();
/// let links = extract_links(html, &page, "https://shop.example/p/");
/// assert_eq!(links, vec!["https://shop.example/p/1"]);
/// ```
pub fn extract_links(html: &str, page_url: &Url, base_prefix: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };

    document
        .select(&selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_link(href, page_url))
        .filter(|link| link.starts_with(base_prefix))
        .collect()
}

/// Resolves a link href to an absolute URL and validates it
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only links
/// - Invalid URLs
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    base_url.join(href).ok().map(String::from)
}
