use crate::crawler::FetchedPage;
use crate::handlers::{Handler, HandlerError};
use crate::xml::{Document, XPath};

/// Emits the string values selected by an XPath in an XML sitemap
#[derive(Debug, Clone)]
pub struct SitemapHandler {
    xpath: XPath,
}

impl SitemapHandler {
    pub fn new(xpath: XPath) -> Self {
        Self { xpath }
    }
}

impl Handler for SitemapHandler {
    fn name(&self) -> &'static str {
        "sitemap"
    }

    fn handle(&self, page: &FetchedPage) -> Result<Vec<String>, HandlerError> {
        let document = Document::parse(&page.body)?;
        let urls: Vec<String> = self
            .xpath
            .select_strings(&document)
            .into_iter()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .collect();

        tracing::debug!(url = %page.url, count = urls.len(), "Sitemap entries");
        Ok(urls)
    }
}
