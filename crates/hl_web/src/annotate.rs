//! Note attach/detach across the note and article collections.
//!
//! Neither sequence is a transaction. Attach creates the note, then links
//! it; if linking fails the note is deleted again. Detach deletes the note,
//! then unlinks it; a delete cannot be taken back, so a failed unlink leaves
//! a dangling reference, which reads already skip.

use hl_core::{
    AnnotationStage, Article, ArticleId, ArticleStorage, ArticleWithNotes, Error, NoteId,
    NotePayload, NoteStorage, Result, Stores,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct Annotator {
    articles: Arc<dyn ArticleStorage>,
    notes: Arc<dyn NoteStorage>,
}

impl Annotator {
    pub fn new(stores: &Stores) -> Self {
        Self {
            articles: stores.articles.clone(),
            notes: stores.notes.clone(),
        }
    }

    /// Create a note from `payload` and append it to the article.
    ///
    /// When the article cannot be updated the new note is removed and the
    /// article error is returned. If that removal fails too, the note is
    /// orphaned and `Error::Orphan` is returned.
    pub async fn attach(&self, article_id: &ArticleId, payload: NotePayload) -> Result<Article> {
        let note = self.notes.create_note(payload).await?;

        let link_err = match self.articles.attach_note(article_id, &note.id).await {
            Ok(article) => {
                tracing::debug!("attached note {} to article {}", note.id, article_id);
                return Ok(article);
            }
            Err(e) => e,
        };

        tracing::warn!(
            "linking note {} to article {} failed: {}; removing the note",
            note.id,
            article_id,
            link_err
        );
        match self.notes.delete_note(&note.id).await {
            Ok(_) => Err(link_err),
            Err(undo_err) => {
                tracing::error!("note {} is orphaned, removal failed: {}", note.id, undo_err);
                Err(Error::Orphan {
                    note_id: note.id,
                    stage: AnnotationStage::Link,
                    source: Box::new(link_err),
                })
            }
        }
    }

    /// Delete a note and remove it from the article's list.
    ///
    /// A note the article does not list is left alone and the article is
    /// returned unchanged. A note listed but already gone from the note
    /// collection is only unlinked.
    pub async fn detach(&self, article_id: &ArticleId, note_id: &NoteId) -> Result<Article> {
        let article = self.articles.get_article(article_id).await?;
        if !article.notes.contains(note_id) {
            return Ok(article);
        }

        let deleted = match self.notes.delete_note(note_id).await {
            Ok(_) => true,
            Err(e) if e.is_not_found() => {
                tracing::debug!("note {} already deleted, unlinking only", note_id);
                false
            }
            Err(e) => return Err(e),
        };

        match self.articles.detach_note(article_id, note_id).await {
            Ok(article) => Ok(article),
            Err(e) if deleted => {
                tracing::warn!(
                    "note {} deleted but still listed on article {}: {}",
                    note_id,
                    article_id,
                    e
                );
                Err(Error::Orphan {
                    note_id: *note_id,
                    stage: AnnotationStage::Unlink,
                    source: Box::new(e),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// The article with its notes resolved.
    pub async fn read(&self, article_id: &ArticleId) -> Result<ArticleWithNotes> {
        hl_core::storage::get_with_notes(self.articles.as_ref(), self.notes.as_ref(), article_id)
            .await
    }
}
