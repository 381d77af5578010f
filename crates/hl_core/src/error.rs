use std::fmt;
use thiserror::Error;

use crate::types::NoteId;

/// Which kind of entity an identifier failed to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Article,
    Note,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Article => f.write_str("article"),
            EntityKind::Note => f.write_str("note"),
        }
    }
}

/// The half of a note link/unlink sequence that failed after the other half
/// had already been applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationStage {
    /// The note was created but could not be appended to the article.
    Link,
    /// The note was deleted but is still listed on the article.
    Unlink,
}

impl fmt::Display for AnnotationStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnnotationStage::Link => f.write_str("link"),
            AnnotationStage::Unlink => f.write_str("unlink"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{kind} not found: {id}")]
    NotFound { kind: EntityKind, id: String },

    #[error("Upstream fetch of {url} failed: {reason}")]
    UpstreamFetch { url: String, reason: String },

    #[error("Note {note_id} left inconsistent after failed {stage} step: {source}")]
    Orphan {
        note_id: NoteId,
        stage: AnnotationStage,
        #[source]
        source: Box<Error>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Scraping error: {0}")]
    Scraping(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("External error: {0}")]
    External(#[from] anyhow::Error),
}

impl Error {
    pub fn article_not_found(id: impl fmt::Display) -> Self {
        Error::NotFound {
            kind: EntityKind::Article,
            id: id.to_string(),
        }
    }

    pub fn note_not_found(id: impl fmt::Display) -> Self {
        Error::NotFound {
            kind: EntityKind::Note,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
