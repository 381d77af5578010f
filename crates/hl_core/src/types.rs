use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::{EntityKind, Error};
use crate::Result;

macro_rules! opaque_id {
    ($name:ident, $kind:expr) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0, f)
            }
        }

        /// Identifiers arrive as opaque strings; one that does not parse
        /// cannot name a stored entity, so it is reported as not found.
        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                Uuid::parse_str(s.trim()).map(Self).map_err(|_| Error::NotFound {
                    kind: $kind,
                    id: s.to_string(),
                })
            }
        }
    };
}

opaque_id!(ArticleId, EntityKind::Article);
opaque_id!(NoteId, EntityKind::Note);

/// Free-form fields attached to a note.
pub type NotePayload = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub id: ArticleId,
    pub headline: String,
    pub summary: String,
    pub link: String,
    pub saved: bool,
    pub notes: Vec<NoteId>,
    pub created_at: DateTime<Utc>,
}

impl Article {
    /// Builds the stored form of a validated draft.
    pub fn from_new(draft: NewArticle) -> Self {
        Self {
            id: ArticleId::new(),
            headline: draft.headline,
            summary: draft.summary,
            link: draft.link,
            saved: false,
            notes: Vec::new(),
            created_at: Utc::now(),
        }
    }

    pub fn with_notes(self, notes: Vec<Note>) -> ArticleWithNotes {
        ArticleWithNotes {
            id: self.id,
            headline: self.headline,
            summary: self.summary,
            link: self.link,
            saved: self.saved,
            created_at: self.created_at,
            notes,
        }
    }
}

/// Fields supplied when creating an article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewArticle {
    pub headline: String,
    pub summary: String,
    pub link: String,
}

impl NewArticle {
    pub fn new(
        headline: impl Into<String>,
        summary: impl Into<String>,
        link: impl Into<String>,
    ) -> Self {
        Self {
            headline: headline.into(),
            summary: summary.into(),
            link: link.into(),
        }
    }

    /// Every backend runs this before inserting. Whitespace counts as
    /// content; only empty fields are rejected.
    pub fn validated(self) -> Result<Self> {
        if self.headline.is_empty() {
            return Err(Error::Validation("headline must not be empty".to_string()));
        }
        if self.link.is_empty() {
            return Err(Error::Validation("link must not be empty".to_string()));
        }
        Ok(self)
    }
}

/// A stored note. The payload is kept as given, with no schema and no
/// reserved keys; the id lives beside it, never inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub payload: NotePayload,
}

impl Note {
    pub fn new(payload: NotePayload) -> Self {
        Self {
            id: NoteId::new(),
            payload,
        }
    }
}

/// An article whose note references have been resolved. References that no
/// longer resolve are left out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleWithNotes {
    pub id: ArticleId,
    pub headline: String,
    pub summary: String,
    pub link: String,
    pub saved: bool,
    pub created_at: DateTime<Utc>,
    pub notes: Vec<Note>,
}
