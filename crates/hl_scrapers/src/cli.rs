use clap::Args;
use hl_core::config::ScrapeConfig;
use hl_core::{ArticleStorage, Result};
use std::sync::Arc;

use crate::ingest::{IngestPipeline, IngestReport};

#[derive(Args, Debug, Clone, Default)]
pub struct ScrapeArgs {
    /// Page to scrape. Defaults to scrape.source_url from the config.
    #[arg(long)]
    pub source: Option<String>,
    /// Skip headlines whose link is already stored
    #[arg(long)]
    pub dedup: bool,
}

impl ScrapeArgs {
    /// Fold the flags into the file/default configuration.
    pub fn apply(&self, config: &ScrapeConfig) -> ScrapeConfig {
        let mut config = config.clone();
        if let Some(source) = &self.source {
            config.source_url = source.clone();
        }
        config.dedup |= self.dedup;
        config
    }
}

pub async fn handle_command(
    args: ScrapeArgs,
    storage: Arc<dyn ArticleStorage>,
    config: &ScrapeConfig,
) -> Result<IngestReport> {
    let config = args.apply(config);
    let pipeline = IngestPipeline::from_config(storage, &config)?;
    let report = pipeline.ingest(&config.source_url).await?;
    print_report(&report);
    Ok(report)
}

pub fn print_report(report: &IngestReport) {
    println!("Found {} headlines on {}", report.found, report.source);
    for article in &report.created {
        println!("🆕 {} - {}", article.headline, article.link);
    }
    for candidate in &report.skipped {
        println!("⏭️ {} - {}", candidate.headline, candidate.link);
    }
    for failed in &report.failed {
        eprintln!("❌ {} - {}", failed.candidate.headline, failed.error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_overrides() {
        let base = ScrapeConfig::default();

        let untouched = ScrapeArgs::default().apply(&base);
        assert_eq!(untouched.source_url, base.source_url);
        assert!(!untouched.dedup);

        let args = ScrapeArgs {
            source: Some("https://example.com/front".to_string()),
            dedup: true,
        };
        let applied = args.apply(&base);
        assert_eq!(applied.source_url, "https://example.com/front");
        assert!(applied.dedup);
    }

    #[tokio::test]
    async fn test_handle_command_rejects_bad_source() {
        let storage = Arc::new(hl_storage::MemoryStorage::new());
        let args = ScrapeArgs {
            source: Some("::nope::".to_string()),
            dedup: false,
        };
        let result = handle_command(args, storage, &ScrapeConfig::default()).await;
        assert!(matches!(result, Err(hl_core::Error::InvalidUrl(_))));
    }
}
