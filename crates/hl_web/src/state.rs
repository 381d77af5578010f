use crate::annotate::Annotator;
use hl_core::Stores;
use hl_scrapers::IngestPipeline;
use std::sync::Arc;

pub struct AppState {
    pub stores: Stores,
    pub annotator: Annotator,
    pub ingest: Arc<IngestPipeline>,
    /// Page scraped by `/scrape`.
    pub source_url: String,
}

impl AppState {
    pub fn new(stores: Stores, ingest: IngestPipeline, source_url: impl Into<String>) -> Self {
        Self {
            annotator: Annotator::new(&stores),
            stores,
            ingest: Arc::new(ingest),
            source_url: source_url.into(),
        }
    }
}
