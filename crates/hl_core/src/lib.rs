pub mod config;
pub mod error;
pub mod storage;
pub mod types;

pub use config::Config;
pub use error::{AnnotationStage, EntityKind, Error, Result};
pub use storage::{ArticleStorage, NoteStorage, Stores};
pub use types::{Article, ArticleId, ArticleWithNotes, NewArticle, Note, NoteId, NotePayload};
