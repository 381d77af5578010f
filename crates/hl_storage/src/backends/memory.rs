use async_trait::async_trait;
use hl_core::config::StorageConfig;
use hl_core::{
    Article, ArticleId, ArticleStorage, Error, NewArticle, Note, NoteId, NotePayload, NoteStorage,
    Result,
};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::StorageBackend;

/// Articles kept in insertion order.
#[derive(Debug, Default)]
pub struct ArticleCollection {
    articles: Vec<Article>,
}

impl ArticleCollection {
    pub fn insert(&mut self, draft: NewArticle) -> Result<Article> {
        let article = Article::from_new(draft.validated()?);
        self.articles.push(article.clone());
        Ok(article)
    }

    pub fn get(&self, id: &ArticleId) -> Result<Article> {
        self.articles
            .iter()
            .find(|a| a.id == *id)
            .cloned()
            .ok_or_else(|| Error::article_not_found(id))
    }

    pub fn all(&self) -> Vec<Article> {
        self.articles.clone()
    }

    pub fn saved(&self) -> Vec<Article> {
        self.articles.iter().filter(|a| a.saved).cloned().collect()
    }

    pub fn find_by_link(&self, link: &str) -> Option<Article> {
        self.articles.iter().find(|a| a.link == link).cloned()
    }

    /// Apply `change` to one article and return its new state.
    pub fn update<F>(&mut self, id: &ArticleId, change: F) -> Result<Article>
    where
        F: FnOnce(&mut Article),
    {
        let article = self
            .articles
            .iter_mut()
            .find(|a| a.id == *id)
            .ok_or_else(|| Error::article_not_found(id))?;
        change(article);
        Ok(article.clone())
    }
}

#[derive(Debug, Default)]
pub struct NoteCollection {
    notes: HashMap<NoteId, Note>,
}

impl NoteCollection {
    pub fn insert(&mut self, payload: NotePayload) -> Note {
        let note = Note::new(payload);
        self.notes.insert(note.id, note.clone());
        note
    }

    pub fn resolve(&self, ids: &[NoteId]) -> Vec<Note> {
        ids.iter().filter_map(|id| self.notes.get(id).cloned()).collect()
    }

    pub fn remove(&mut self, id: &NoteId) -> Result<Note> {
        self.notes.remove(id).ok_or_else(|| Error::note_not_found(id))
    }
}

/// Process-local storage. The two collections are locked independently, the
/// same way two documents in separate collections would be.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    articles: Arc<RwLock<ArticleCollection>>,
    notes: Arc<RwLock<NoteCollection>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageBackend for MemoryStorage {
    fn get_error_message() -> &'static str {
        "Memory storage should be available"
    }

    async fn open(_config: &StorageConfig) -> Result<Self> {
        Ok(Self::new())
    }
}

#[async_trait]
impl ArticleStorage for MemoryStorage {
    async fn create_article(&self, draft: NewArticle) -> Result<Article> {
        let mut store = self.articles.write().await;
        store.insert(draft)
    }

    async fn get_article(&self, id: &ArticleId) -> Result<Article> {
        let store = self.articles.read().await;
        store.get(id)
    }

    async fn list_all(&self) -> Result<Vec<Article>> {
        let store = self.articles.read().await;
        Ok(store.all())
    }

    async fn list_saved(&self) -> Result<Vec<Article>> {
        let store = self.articles.read().await;
        Ok(store.saved())
    }

    async fn set_saved(&self, id: &ArticleId, saved: bool) -> Result<Article> {
        let mut store = self.articles.write().await;
        store.update(id, |article| article.saved = saved)
    }

    async fn attach_note(&self, id: &ArticleId, note_id: &NoteId) -> Result<Article> {
        let mut store = self.articles.write().await;
        store.update(id, |article| article.notes.push(*note_id))
    }

    async fn detach_note(&self, id: &ArticleId, note_id: &NoteId) -> Result<Article> {
        let mut store = self.articles.write().await;
        store.update(id, |article| article.notes.retain(|n| n != note_id))
    }

    async fn find_by_link(&self, link: &str) -> Result<Option<Article>> {
        let store = self.articles.read().await;
        Ok(store.find_by_link(link))
    }
}

#[async_trait]
impl NoteStorage for MemoryStorage {
    async fn create_note(&self, payload: NotePayload) -> Result<Note> {
        let mut store = self.notes.write().await;
        Ok(store.insert(payload))
    }

    async fn get_notes(&self, ids: &[NoteId]) -> Result<Vec<Note>> {
        let store = self.notes.read().await;
        Ok(store.resolve(ids))
    }

    async fn delete_note(&self, id: &NoteId) -> Result<Note> {
        let mut store = self.notes.write().await;
        store.remove(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hl_core::storage::get_with_notes;
    use serde_json::json;

    fn payload(text: &str) -> NotePayload {
        let mut map = NotePayload::new();
        map.insert("text".to_string(), json!(text));
        map
    }

    async fn seeded() -> (MemoryStorage, Article) {
        let storage = MemoryStorage::new();
        let article = storage
            .create_article(NewArticle::new("Test Headline", "A summary", "https://example.com/a"))
            .await
            .unwrap();
        (storage, article)
    }

    #[tokio::test]
    async fn test_create_article() {
        let (storage, article) = seeded().await;
        assert!(!article.saved);
        assert_eq!(article.headline, "Test Headline");

        let empty_summary = storage
            .create_article(NewArticle::new("Other", "", "https://example.com/b"))
            .await
            .unwrap();
        assert_eq!(empty_summary.summary, "");

        for draft in [
            NewArticle::new("", "s", "https://example.com/c"),
            NewArticle::new("h", "s", ""),
        ] {
            assert!(matches!(
                storage.create_article(draft).await,
                Err(Error::Validation(_))
            ));
        }
        assert_eq!(storage.list_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_list_keeps_insertion_order() {
        let storage = MemoryStorage::new();
        for i in 0..5 {
            storage
                .create_article(NewArticle::new(format!("h{}", i), "", format!("/l{}", i)))
                .await
                .unwrap();
        }
        let headlines: Vec<_> = storage
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.headline)
            .collect();
        assert_eq!(headlines, vec!["h0", "h1", "h2", "h3", "h4"]);
    }

    #[tokio::test]
    async fn test_set_saved_round_trip() {
        let (storage, article) = seeded().await;

        let saved = storage.set_saved(&article.id, true).await.unwrap();
        assert!(saved.saved);
        assert_eq!(storage.list_saved().await.unwrap().len(), 1);

        let cleared = storage.set_saved(&article.id, false).await.unwrap();
        assert!(!cleared.saved);
        assert!(storage.list_saved().await.unwrap().is_empty());

        let unknown = ArticleId::new();
        assert!(storage.set_saved(&unknown, true).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_attach_and_detach_note_ids() {
        let (storage, article) = seeded().await;
        let first = NoteId::new();
        let second = NoteId::new();

        storage.attach_note(&article.id, &first).await.unwrap();
        let updated = storage.attach_note(&article.id, &second).await.unwrap();
        assert_eq!(updated.notes, vec![first, second]);

        let updated = storage.detach_note(&article.id, &first).await.unwrap();
        assert_eq!(updated.notes, vec![second]);

        // absent reference is a no-op
        let updated = storage.detach_note(&article.id, &first).await.unwrap();
        assert_eq!(updated.notes, vec![second]);

        assert!(storage
            .attach_note(&ArticleId::new(), &first)
            .await
            .unwrap_err()
            .is_not_found());
        assert!(storage
            .detach_note(&ArticleId::new(), &first)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_dangling_notes_are_omitted() {
        let (storage, article) = seeded().await;
        let kept = storage.create_note(payload("kept")).await.unwrap();
        let dropped = storage.create_note(payload("dropped")).await.unwrap();
        storage.attach_note(&article.id, &kept.id).await.unwrap();
        storage.attach_note(&article.id, &dropped.id).await.unwrap();

        storage.delete_note(&dropped.id).await.unwrap();

        let resolved = get_with_notes(&storage, &storage, &article.id).await.unwrap();
        assert_eq!(resolved.notes, vec![kept]);
        assert!(get_with_notes(&storage, &storage, &ArticleId::new())
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_whitespace_headline_is_content() {
        let storage = MemoryStorage::new();
        let article = storage
            .create_article(NewArticle::new("   ", "", "https://example.com/blank"))
            .await
            .unwrap();
        assert_eq!(article.headline, "   ");
        assert!(storage
            .create_article(NewArticle::new("", "", "https://example.com/empty"))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_note_payload_may_carry_id_field() {
        let storage = MemoryStorage::new();
        let mut fields = payload("good find");
        fields.insert("id".to_string(), json!("ref-42"));

        let note = storage.create_note(fields.clone()).await.unwrap();
        assert_eq!(note.payload, fields);
        let resolved = storage.get_notes(&[note.id]).await.unwrap();
        assert_eq!(resolved[0].payload["id"], "ref-42");
    }

    #[tokio::test]
    async fn test_delete_missing_note() {
        let storage = MemoryStorage::new();
        assert!(storage.delete_note(&NoteId::new()).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_concurrent_attach_loses_nothing() {
        let (storage, article) = seeded().await;
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let storage = storage.clone();
                let id = article.id;
                tokio::spawn(async move {
                    let note_id = NoteId::new();
                    storage.attach_note(&id, &note_id).await.unwrap();
                    note_id
                })
            })
            .collect();

        let mut expected = Vec::new();
        for handle in handles {
            expected.push(handle.await.unwrap());
        }

        let stored = storage.get_article(&article.id).await.unwrap().notes;
        assert_eq!(stored.len(), expected.len());
        assert!(expected.iter().all(|id| stored.contains(id)));
    }
}
