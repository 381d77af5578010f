use axum::{
    body::Bytes,
    extract::{FromRequest, Path, Request, State},
    http::{header::CONTENT_TYPE, HeaderMap},
    Form, Json,
};
use hl_core::{Article, ArticleId, ArticleWithNotes, Error, NoteId, NotePayload};
use hl_scrapers::IngestReport;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ApiError;
use crate::AppState;

type ApiResult<T> = std::result::Result<Json<T>, ApiError>;

#[derive(Debug, Serialize)]
pub struct ArticlesView {
    pub articles: Vec<Article>,
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health() -> Json<Health> {
    Json(Health {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn list_articles(State(state): State<Arc<AppState>>) -> ApiResult<ArticlesView> {
    let articles = state.stores.articles.list_all().await?;
    Ok(Json(ArticlesView { articles }))
}

pub async fn list_saved(State(state): State<Arc<AppState>>) -> ApiResult<ArticlesView> {
    let articles = state.stores.articles.list_saved().await?;
    Ok(Json(ArticlesView { articles }))
}

/// Scrapes the configured source and waits for every create to finish.
pub async fn scrape(State(state): State<Arc<AppState>>) -> ApiResult<IngestReport> {
    let report = state.ingest.ingest(&state.source_url).await?;
    Ok(Json(report))
}

pub async fn save(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> ApiResult<Article> {
    let id: ArticleId = id.parse()?;
    Ok(Json(state.stores.articles.set_saved(&id, true).await?))
}

pub async fn unsave(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<Article> {
    let id: ArticleId = id.parse()?;
    Ok(Json(state.stores.articles.set_saved(&id, false).await?))
}

pub async fn read_article(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<ArticleWithNotes> {
    let id: ArticleId = id.parse()?;
    Ok(Json(state.annotator.read(&id).await?))
}

/// The body is the note payload itself: a JSON object, or a form whose
/// fields are stored as string values.
pub async fn attach_note(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    request: Request,
) -> ApiResult<Article> {
    let id: ArticleId = id.parse()?;
    let payload = if is_form(request.headers()) {
        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .map_err(|e| Error::Validation(format!("note form is malformed: {}", e.body_text())))?;
        fields.into_iter().map(|(k, v)| (k, Value::String(v))).collect()
    } else {
        let body = Bytes::from_request(request, &())
            .await
            .map_err(|e| Error::Validation(format!("note body is unreadable: {}", e.body_text())))?;
        parse_payload(&body)?
    };
    Ok(Json(state.annotator.attach(&id, payload).await?))
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.starts_with("application/x-www-form-urlencoded"))
        .unwrap_or(false)
}

pub async fn detach_note(
    State(state): State<Arc<AppState>>,
    Path((id, note_id)): Path<(String, String)>,
) -> ApiResult<Article> {
    let id: ArticleId = id.parse()?;
    let note_id: NoteId = note_id.parse()?;
    Ok(Json(state.annotator.detach(&id, &note_id).await?))
}

fn parse_payload(body: &[u8]) -> Result<NotePayload, Error> {
    match serde_json::from_slice(body) {
        Ok(Value::Object(payload)) => Ok(payload),
        Ok(_) => Err(Error::Validation("note body must be a JSON object".to_string())),
        Err(e) => Err(Error::Validation(format!("note body is not valid JSON: {}", e))),
    }
}
