use async_trait::async_trait;
use std::sync::Arc;

use crate::types::{Article, ArticleId, ArticleWithNotes, NewArticle, Note, NoteId, NotePayload};
use crate::Result;

/// The article collection. Every single-article mutation is atomic: readers
/// see either the state before or the state after it.
#[async_trait]
pub trait ArticleStorage: Send + Sync {
    /// Insert a new article. Fails with `Error::Validation` when the headline
    /// or link is empty. Never checks for an existing article with the same link.
    async fn create_article(&self, draft: NewArticle) -> Result<Article>;

    /// Fetch one article by id
    async fn get_article(&self, id: &ArticleId) -> Result<Article>;

    /// All articles in insertion order
    async fn list_all(&self) -> Result<Vec<Article>>;

    /// Articles marked as saved, in insertion order
    async fn list_saved(&self) -> Result<Vec<Article>>;

    /// Set the saved flag and return the updated article
    async fn set_saved(&self, id: &ArticleId, saved: bool) -> Result<Article>;

    /// Append a note reference. The note id is not checked against the note store.
    async fn attach_note(&self, id: &ArticleId, note_id: &NoteId) -> Result<Article>;

    /// Remove every occurrence of a note reference; absent references are a no-op.
    async fn detach_note(&self, id: &ArticleId, note_id: &NoteId) -> Result<Article>;

    /// First article stored with exactly this link, if any
    async fn find_by_link(&self, link: &str) -> Result<Option<Article>>;
}

/// The note collection.
#[async_trait]
pub trait NoteStorage: Send + Sync {
    /// Store a new note with a freshly assigned id
    async fn create_note(&self, payload: NotePayload) -> Result<Note>;

    /// Resolve the given ids in order, skipping the ones that do not exist
    async fn get_notes(&self, ids: &[NoteId]) -> Result<Vec<Note>>;

    /// Remove a note and return it
    async fn delete_note(&self, id: &NoteId) -> Result<Note>;
}

/// Handles to both collections of one backend, passed explicitly to every
/// component that needs them.
#[derive(Clone)]
pub struct Stores {
    pub articles: Arc<dyn ArticleStorage>,
    pub notes: Arc<dyn NoteStorage>,
}

impl Stores {
    pub fn new(articles: Arc<dyn ArticleStorage>, notes: Arc<dyn NoteStorage>) -> Self {
        Self { articles, notes }
    }

    /// Use one backend for both collections.
    pub fn from_backend<B>(backend: B) -> Self
    where
        B: ArticleStorage + NoteStorage + 'static,
    {
        let backend = Arc::new(backend);
        Self {
            articles: backend.clone(),
            notes: backend,
        }
    }
}

/// Load an article and resolve its note references. Dangling references are
/// dropped from the result instead of failing the read.
pub async fn get_with_notes(
    articles: &dyn ArticleStorage,
    notes: &dyn NoteStorage,
    id: &ArticleId,
) -> Result<ArticleWithNotes> {
    let article = articles.get_article(id).await?;
    let resolved = notes.get_notes(&article.notes).await?;
    if resolved.len() < article.notes.len() {
        tracing::debug!(
            "article {} has {} dangling note reference(s)",
            article.id,
            article.notes.len() - resolved.len()
        );
    }
    Ok(article.with_notes(resolved))
}
