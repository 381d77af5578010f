use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hl_core::config::StorageConfig;
use hl_core::{
    Article, ArticleId, ArticleStorage, Error, NewArticle, Note, NoteId, NotePayload, NoteStorage,
    Result,
};
use sqlx::sqlite::{SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::StorageBackend;

// No foreign keys: article_notes may reference notes that were deleted.
const MIGRATIONS: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS articles (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        headline TEXT NOT NULL,
        summary TEXT NOT NULL,
        link TEXT NOT NULL,
        saved INTEGER NOT NULL DEFAULT 0,
        created_at TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS notes (
        id TEXT PRIMARY KEY,
        payload TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS article_notes (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        article_id TEXT NOT NULL,
        note_id TEXT NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_articles_link ON articles (link)",
    "CREATE INDEX IF NOT EXISTS idx_article_notes_article ON article_notes (article_id)",
];

fn db_err(context: &'static str) -> impl Fn(sqlx::Error) -> Error {
    move |e| Error::Database(format!("{}: {}", context, e))
}

pub struct SQLiteStorage {
    pool: SqlitePool,
    db_path: PathBuf,
}

#[async_trait]
impl StorageBackend for SQLiteStorage {
    fn get_error_message() -> &'static str {
        "SQLite database should be available at the configured storage.path"
    }

    async fn open(config: &StorageConfig) -> Result<Self> {
        Self::new_with_path(&config.path).await
    }
}

impl SQLiteStorage {
    pub async fn new_with_path(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))
            .map_err(db_err("Invalid database path"))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db_err("Failed to connect to database"))?;

        for (i, migration) in MIGRATIONS.iter().enumerate() {
            sqlx::query(migration)
                .execute(&pool)
                .await
                .map_err(|e| Error::Database(format!("Failed to run migration {}: {}", i, e)))?;
        }

        tracing::debug!("opened sqlite storage at {}", db_path.display());

        Ok(Self {
            pool,
            db_path: db_path.to_path_buf(),
        })
    }

    pub fn get_db_path(&self) -> &Path {
        &self.db_path
    }
}

fn parse_article_row(row: &SqliteRow, notes: Vec<NoteId>) -> Result<Article> {
    let id: String = row.try_get("id").map_err(db_err("Failed to read article id"))?;
    let created_at: String = row
        .try_get("created_at")
        .map_err(db_err("Failed to read article timestamp"))?;
    let saved: i64 = row.try_get("saved").map_err(db_err("Failed to read saved flag"))?;

    Ok(Article {
        id: id.parse()?,
        headline: row.try_get("headline").map_err(db_err("Failed to read headline"))?,
        summary: row.try_get("summary").map_err(db_err("Failed to read summary"))?,
        link: row.try_get("link").map_err(db_err("Failed to read link"))?,
        saved: saved != 0,
        notes,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map_err(|e| Error::Database(format!("Failed to parse date: {}", e)))?
            .with_timezone(&Utc),
    })
}

async fn load_note_ids(conn: &mut SqliteConnection, id: &str) -> Result<Vec<NoteId>> {
    let rows = sqlx::query("SELECT note_id FROM article_notes WHERE article_id = ? ORDER BY seq")
        .bind(id)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err("Failed to load note references"))?;

    rows.iter()
        .map(|row| {
            let note_id: String = row.try_get("note_id").map_err(db_err("Failed to read note id"))?;
            note_id.parse()
        })
        .collect()
}

async fn load_article(conn: &mut SqliteConnection, id: &ArticleId) -> Result<Option<Article>> {
    let key = id.to_string();
    let row = sqlx::query("SELECT * FROM articles WHERE id = ?")
        .bind(&key)
        .fetch_optional(&mut *conn)
        .await
        .map_err(db_err("Failed to load article"))?;

    match row {
        Some(row) => {
            let notes = load_note_ids(conn, &key).await?;
            parse_article_row(&row, notes).map(Some)
        }
        None => Ok(None),
    }
}

async fn load_articles(conn: &mut SqliteConnection, saved_only: bool) -> Result<Vec<Article>> {
    let sql = if saved_only {
        "SELECT * FROM articles WHERE saved = 1 ORDER BY seq"
    } else {
        "SELECT * FROM articles ORDER BY seq"
    };
    let rows = sqlx::query(sql)
        .fetch_all(&mut *conn)
        .await
        .map_err(db_err("Failed to list articles"))?;

    let mut articles = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row.try_get("id").map_err(db_err("Failed to read article id"))?;
        let notes = load_note_ids(conn, &id).await?;
        articles.push(parse_article_row(&row, notes)?);
    }
    Ok(articles)
}

fn parse_note_row(row: &SqliteRow) -> Result<Note> {
    let id: String = row.try_get("id").map_err(db_err("Failed to read note id"))?;
    let payload: String = row.try_get("payload").map_err(db_err("Failed to read note payload"))?;
    Ok(Note {
        id: id.parse()?,
        payload: serde_json::from_str(&payload)?,
    })
}

impl SQLiteStorage {
    /// Run `change` against one article inside a transaction and return the
    /// article as committed. The write goes first so the transaction takes
    /// the write lock up front; a missing article rolls it back.
    async fn update_article<'q>(
        &self,
        id: &ArticleId,
        change: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> Result<Article> {
        let mut tx = self.pool.begin().await.map_err(db_err("Failed to begin transaction"))?;

        change
            .execute(&mut *tx)
            .await
            .map_err(db_err("Failed to update article"))?;

        let article = match load_article(&mut tx, id).await? {
            Some(article) => article,
            None => {
                tx.rollback().await.map_err(db_err("Failed to roll back transaction"))?;
                return Err(Error::article_not_found(id));
            }
        };

        tx.commit().await.map_err(db_err("Failed to commit transaction"))?;
        Ok(article)
    }
}

#[async_trait]
impl ArticleStorage for SQLiteStorage {
    async fn create_article(&self, draft: NewArticle) -> Result<Article> {
        let article = Article::from_new(draft.validated()?);

        sqlx::query(
            r#"
            INSERT INTO articles (id, headline, summary, link, saved, created_at)
            VALUES (?, ?, ?, ?, 0, ?)
            "#,
        )
        .bind(article.id.to_string())
        .bind(&article.headline)
        .bind(&article.summary)
        .bind(&article.link)
        .bind(article.created_at.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_err("Failed to store article"))?;

        Ok(article)
    }

    async fn get_article(&self, id: &ArticleId) -> Result<Article> {
        let mut conn = self.pool.acquire().await.map_err(db_err("Failed to acquire connection"))?;
        load_article(&mut conn, id)
            .await?
            .ok_or_else(|| Error::article_not_found(id))
    }

    async fn list_all(&self) -> Result<Vec<Article>> {
        let mut conn = self.pool.acquire().await.map_err(db_err("Failed to acquire connection"))?;
        load_articles(&mut conn, false).await
    }

    async fn list_saved(&self) -> Result<Vec<Article>> {
        let mut conn = self.pool.acquire().await.map_err(db_err("Failed to acquire connection"))?;
        load_articles(&mut conn, true).await
    }

    async fn set_saved(&self, id: &ArticleId, saved: bool) -> Result<Article> {
        let change = sqlx::query("UPDATE articles SET saved = ? WHERE id = ?")
            .bind(saved as i64)
            .bind(id.to_string());
        self.update_article(id, change).await
    }

    async fn attach_note(&self, id: &ArticleId, note_id: &NoteId) -> Result<Article> {
        let change = sqlx::query("INSERT INTO article_notes (article_id, note_id) VALUES (?, ?)")
            .bind(id.to_string())
            .bind(note_id.to_string());
        self.update_article(id, change).await
    }

    async fn detach_note(&self, id: &ArticleId, note_id: &NoteId) -> Result<Article> {
        let change = sqlx::query("DELETE FROM article_notes WHERE article_id = ? AND note_id = ?")
            .bind(id.to_string())
            .bind(note_id.to_string());
        self.update_article(id, change).await
    }

    async fn find_by_link(&self, link: &str) -> Result<Option<Article>> {
        let mut conn = self.pool.acquire().await.map_err(db_err("Failed to acquire connection"))?;
        let row = sqlx::query("SELECT id FROM articles WHERE link = ? ORDER BY seq LIMIT 1")
            .bind(link)
            .fetch_optional(&mut *conn)
            .await
            .map_err(db_err("Failed to look up link"))?;

        match row {
            Some(row) => {
                let id: String = row.try_get("id").map_err(db_err("Failed to read article id"))?;
                load_article(&mut conn, &id.parse()?).await
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl NoteStorage for SQLiteStorage {
    async fn create_note(&self, payload: NotePayload) -> Result<Note> {
        let note = Note::new(payload);
        let body = serde_json::to_string(&note.payload)?;

        sqlx::query("INSERT INTO notes (id, payload) VALUES (?, ?)")
            .bind(note.id.to_string())
            .bind(body)
            .execute(&self.pool)
            .await
            .map_err(db_err("Failed to store note"))?;

        Ok(note)
    }

    async fn get_notes(&self, ids: &[NoteId]) -> Result<Vec<Note>> {
        let mut conn = self.pool.acquire().await.map_err(db_err("Failed to acquire connection"))?;
        let mut notes = Vec::with_capacity(ids.len());
        for id in ids {
            let row = sqlx::query("SELECT id, payload FROM notes WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&mut *conn)
                .await
                .map_err(db_err("Failed to load note"))?;
            if let Some(row) = row {
                notes.push(parse_note_row(&row)?);
            }
        }
        Ok(notes)
    }

    async fn delete_note(&self, id: &NoteId) -> Result<Note> {
        let row = sqlx::query("DELETE FROM notes WHERE id = ? RETURNING id, payload")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err("Failed to delete note"))?;

        match row {
            Some(row) => parse_note_row(&row),
            None => Err(Error::note_not_found(id)),
        }
    }
}
