use futures::future::join_all;
use hl_core::config::ScrapeConfig;
use hl_core::{Article, ArticleStorage, Error, Result};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::Instrument;
use url::Url;

use crate::scrapers::{utils, Candidate, HeadlineExtractor, HttpFetcher, PageFetcher};

const DEFAULT_CONCURRENCY: usize = 8;

#[derive(Debug, Clone, Serialize)]
pub struct FailedCandidate {
    pub candidate: Candidate,
    pub error: String,
}

/// What one ingestion run did with every candidate it extracted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IngestReport {
    pub source: String,
    pub found: usize,
    pub created: Vec<Article>,
    pub skipped: Vec<Candidate>,
    pub failed: Vec<FailedCandidate>,
}

impl IngestReport {
    /// Candidates a create was issued for.
    pub fn attempted(&self) -> usize {
        self.created.len() + self.failed.len()
    }
}

enum Outcome {
    Created(Article),
    Skipped(Candidate),
    Failed(FailedCandidate),
}

/// Fetches a page, extracts its headline cards and stores each one as a new
/// article.
pub struct IngestPipeline {
    storage: Arc<dyn ArticleStorage>,
    fetcher: Arc<dyn PageFetcher>,
    extractor: HeadlineExtractor,
    semaphore: Arc<Semaphore>,
    dedup: bool,
}

impl IngestPipeline {
    pub fn new(
        storage: Arc<dyn ArticleStorage>,
        fetcher: Arc<dyn PageFetcher>,
        extractor: HeadlineExtractor,
    ) -> Self {
        Self {
            storage,
            fetcher,
            extractor,
            semaphore: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            dedup: false,
        }
    }

    pub fn from_config(storage: Arc<dyn ArticleStorage>, config: &ScrapeConfig) -> Result<Self> {
        let fetcher = Arc::new(HttpFetcher::from_config(config)?);
        let extractor = HeadlineExtractor::new(config.layout.clone())?;
        Ok(Self::new(storage, fetcher, extractor)
            .with_concurrency(config.concurrency)
            .with_dedup(config.dedup))
    }

    /// Upper bound on creates in flight at once.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        self
    }

    /// Skip candidates whose link is already stored or repeats earlier on
    /// the same page. Off by default: every run stores every card again.
    pub fn with_dedup(mut self, dedup: bool) -> Self {
        self.dedup = dedup;
        self
    }

    pub fn dedup(&self) -> bool {
        self.dedup
    }

    /// Run one ingestion against `source`.
    ///
    /// Fails only when the URL is invalid or the page cannot be fetched, in
    /// which case nothing is stored. Individual create failures are logged
    /// and reported, and never abort the run. Returns once every create has
    /// finished.
    pub async fn ingest(&self, source: &str) -> Result<IngestReport> {
        let url = utils::parse_url(source)?;
        let span = tracing::info_span!("ingest", host = url.host_str().unwrap_or(source));
        self.run(url).instrument(span).await
    }

    async fn run(&self, url: Url) -> Result<IngestReport> {
        tracing::info!("🦗 Fetching {}", url);
        let body = match self.fetcher.fetch(&url).await {
            Ok(body) => body,
            Err(e) => {
                tracing::error!("Fetch failed: {}", e);
                return Err(e);
            }
        };

        let candidates = self.extractor.extract(&body, Some(&url));
        tracing::info!("📰 Extracted {} headline(s)", candidates.len());

        let mut report = IngestReport {
            source: url.to_string(),
            found: candidates.len(),
            ..IngestReport::default()
        };

        let mut seen = HashSet::new();
        let mut pending = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if self.dedup && !seen.insert(candidate.link.clone()) {
                report.skipped.push(candidate);
            } else {
                pending.push(candidate);
            }
        }

        let outcomes = join_all(pending.into_iter().map(|c| self.store_candidate(c))).await;
        for outcome in outcomes {
            match outcome {
                Outcome::Created(article) => report.created.push(article),
                Outcome::Skipped(candidate) => report.skipped.push(candidate),
                Outcome::Failed(failed) => report.failed.push(failed),
            }
        }

        tracing::info!(
            created = report.created.len(),
            skipped = report.skipped.len(),
            failed = report.failed.len(),
            "✅ Ingestion finished"
        );
        Ok(report)
    }

    async fn store_candidate(&self, candidate: Candidate) -> Outcome {
        let _permit = match self.semaphore.acquire().await {
            Ok(permit) => permit,
            Err(e) => return failed(candidate, Error::External(e.into())),
        };

        if self.dedup {
            match self.storage.find_by_link(&candidate.link).await {
                Ok(Some(_)) => {
                    tracing::debug!("⏭️ Already stored: {}", candidate.link);
                    return Outcome::Skipped(candidate);
                }
                Ok(None) => {}
                Err(e) => return failed(candidate, e),
            }
        }

        match self.storage.create_article(candidate.clone().into()).await {
            Ok(article) => {
                tracing::debug!("🆕 {}", article.headline);
                Outcome::Created(article)
            }
            Err(e) => failed(candidate, e),
        }
    }
}

fn failed(candidate: Candidate, error: Error) -> Outcome {
    tracing::warn!("❌ Failed to store '{}': {}", candidate.headline, error);
    Outcome::Failed(FailedCandidate {
        candidate,
        error: error.to_string(),
    })
}
