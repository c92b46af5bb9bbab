use crate::crawler::FetchedPage;
use crate::handlers::{check_redirect, Handler, HandlerError};
use crate::storage::ArtifactSink;
use std::sync::Arc;

/// Stores the raw response as an artifact and discovers nothing
#[derive(Debug, Clone)]
pub struct DumpHandler {
    sink: Arc<ArtifactSink>,
    allow_redirects: bool,
}

impl DumpHandler {
    pub fn new(sink: Arc<ArtifactSink>, allow_redirects: bool) -> Self {
        Self {
            sink,
            allow_redirects,
        }
    }
}

impl Handler for DumpHandler {
    fn name(&self) -> &'static str {
        "dump"
    }

    fn handle(&self, page: &FetchedPage) -> Result<Vec<String>, HandlerError> {
        check_redirect(page, self.allow_redirects)?;
        self.sink
            .store(&page.body, &page.url)
            .map_err(HandlerError::Store)?;
        Ok(Vec::new())
    }
}
