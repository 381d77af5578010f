pub mod cli;
pub mod ingest;
pub mod logging;
pub mod scrapers;

pub use cli::{handle_command, ScrapeArgs};
pub use ingest::{FailedCandidate, IngestPipeline, IngestReport};
pub use logging::init_logging;
pub use scrapers::{Candidate, HeadlineExtractor, HttpFetcher, PageFetcher};

pub mod prelude {
    pub use super::ingest::{IngestPipeline, IngestReport};
    pub use super::scrapers::{Candidate, HeadlineExtractor, PageFetcher};
    pub use hl_core::{Article, Error, Result};
}
