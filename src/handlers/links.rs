use crate::crawler::{extract_links, FetchedPage};
use crate::handlers::{check_redirect, Handler, HandlerError};
use crate::storage::ArtifactSink;
use std::sync::Arc;
use url::Url;

/// Follows `<a href>` links under a base URL, optionally storing the page first
#[derive(Debug, Clone)]
pub struct LinksHandler {
    base_url: String,
    sink: Option<Arc<ArtifactSink>>,
    allow_redirects: bool,
}

impl LinksHandler {
    /// With `sink = None` the page is only scanned for links
    pub fn new(base_url: String, sink: Option<Arc<ArtifactSink>>, allow_redirects: bool) -> Self {
        Self {
            base_url,
            sink,
            allow_redirects,
        }
    }
}

impl Handler for LinksHandler {
    fn name(&self) -> &'static str {
        "links"
    }

    fn handle(&self, page: &FetchedPage) -> Result<Vec<String>, HandlerError> {
        if let Some(sink) = &self.sink {
            check_redirect(page, self.allow_redirects)?;
            sink.store(&page.body, &page.url)
                .map_err(HandlerError::Store)?;
        }

        let page_url = Url::parse(&page.final_url)
            .map_err(|_| HandlerError::InvalidUrl(page.final_url.clone()))?;
        let links = extract_links(&page.text(), &page_url, &self.base_url);

        tracing::debug!(url = %page.url, count = links.len(), "Extracted links");
        Ok(links)
    }
}
