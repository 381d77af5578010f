use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::{Error, Result};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scrape: ScrapeConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageKind {
    #[default]
    Memory,
    Sqlite,
}

impl FromStr for StorageKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "memory" => Ok(StorageKind::Memory),
            "sqlite" => Ok(StorageKind::Sqlite),
            other => Err(Error::Config(format!(
                "unknown storage backend `{}` (expected memory or sqlite)",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageKind,
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::default(),
            path: default_db_path(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("headlines.db")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScrapeConfig {
    #[serde(default = "default_source_url")]
    pub source_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Skip candidates whose link is already stored.
    #[serde(default)]
    pub dedup: bool,
    #[serde(default)]
    pub layout: CardLayout,
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            concurrency: default_concurrency(),
            dedup: false,
            layout: CardLayout::default(),
        }
    }
}

fn default_source_url() -> String {
    "https://www.huffpost.com/".to_string()
}
fn default_timeout_secs() -> u64 {
    30
}
fn default_user_agent() -> String {
    concat!("headline-notes/", env!("CARGO_PKG_VERSION")).to_string()
}
fn default_concurrency() -> usize {
    8
}

/// Where a headline card and its parts live in the page markup. `card` is a
/// CSS selector; the rest are class names of direct children.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct CardLayout {
    #[serde(default = "default_card")]
    pub card: String,
    #[serde(default = "default_headline")]
    pub headline: String,
    #[serde(default = "default_headline_text")]
    pub headline_text: String,
    #[serde(default = "default_description")]
    pub description: String,
}

impl Default for CardLayout {
    fn default() -> Self {
        Self {
            card: default_card(),
            headline: default_headline(),
            headline_text: default_headline_text(),
            description: default_description(),
        }
    }
}

fn default_card() -> String {
    ".card__headlines".to_string()
}
fn default_headline() -> String {
    "card__headline".to_string()
}
fn default_headline_text() -> String {
    "card__headline__text".to_string()
}
fn default_description() -> String {
    "card__description".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl Config {
    /// Reads a TOML file; `None` yields the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("failed to read {}: {}", path.display(), e))
                })?;
                Self::from_toml(&content)?
            }
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(format!("invalid config: {}", e)))
    }

    pub fn validate(&self) -> Result<()> {
        if self.scrape.concurrency == 0 {
            return Err(Error::Config("scrape.concurrency must be at least 1".to_string()));
        }
        if self.scrape.timeout_secs == 0 {
            return Err(Error::Config("scrape.timeout_secs must be at least 1".to_string()));
        }
        url::Url::parse(&self.scrape.source_url)
            .map_err(|e| Error::Config(format!("scrape.source_url is not a URL: {}", e)))?;
        if self.log.level.parse::<tracing::Level>().is_err() {
            return Err(Error::Config(format!("unknown log level `{}`", self.log.level)));
        }
        Ok(())
    }
}
