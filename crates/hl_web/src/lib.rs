use axum::{
    routing::{delete, get, put},
    Router,
};
use hl_core::{Error, Result};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod annotate;
pub mod error;
pub mod handlers;
pub mod state;

pub use annotate::Annotator;
pub use error::ApiError;
pub use state::AppState;

pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::permissive();

    Router::new()
        .route("/", get(handlers::list_articles))
        .route("/saved", get(handlers::list_saved))
        .route("/scrape", get(handlers::scrape).post(handlers::scrape))
        .route("/save/:id", put(handlers::save))
        .route("/delsave/:id", put(handlers::unsave))
        .route(
            "/articles/:id",
            get(handlers::read_article).post(handlers::attach_note),
        )
        .route("/articles/:id/notes/:note_id", delete(handlers::detach_note))
        .route("/health", get(handlers::health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(Arc::new(state))
}

/// Bind `addr` and serve until the process is stopped.
pub async fn serve(addr: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Config(format!("Cannot bind {}: {}", addr, e)))?;
    tracing::info!("listening on http://{}", addr);
    axum::serve(listener, create_app(state)).await?;
    Ok(())
}

pub mod prelude {
    pub use crate::{create_app, serve, Annotator, ApiError, AppState};
    pub use hl_core::{Article, Error, Result};
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::{
        body::{to_bytes, Body},
        http::{Method, Request, StatusCode},
    };
    use hl_core::config::CardLayout;
    use hl_core::{ArticleStorage, NewArticle, Stores};
    use hl_scrapers::{HeadlineExtractor, IngestPipeline, PageFetcher};
    use hl_storage::MemoryStorage;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use url::Url;

    const SOURCE: &str = "https://news.example.com/";

    struct StaticFetcher(String);

    #[async_trait]
    impl PageFetcher for StaticFetcher {
        async fn fetch(&self, _url: &Url) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    struct DownFetcher;

    #[async_trait]
    impl PageFetcher for DownFetcher {
        async fn fetch(&self, url: &Url) -> Result<String> {
            Err(Error::UpstreamFetch {
                url: url.to_string(),
                reason: "HTTP status 503".to_string(),
            })
        }
    }

    const PAGE: &str = r#"
        <div class="card__headlines">
          <div class="card__headline">
            <a href="/entry/one"><h3 class="card__headline__text">One</h3></a>
          </div>
          <div class="card__description"><a href="/entry/one">First</a></div>
        </div>
        <div class="card__headlines">
          <div class="card__headline">
            <a href="/entry/two"><h3 class="card__headline__text">Two</h3></a>
          </div>
        </div>
    "#;

    fn app_with(storage: &MemoryStorage, fetcher: Arc<dyn PageFetcher>) -> Router {
        let stores = Stores::from_backend(storage.clone());
        let extractor = HeadlineExtractor::new(CardLayout::default()).unwrap();
        let ingest = IngestPipeline::new(stores.articles.clone(), fetcher, extractor);
        create_app(AppState::new(stores, ingest, SOURCE))
    }

    fn app(storage: &MemoryStorage) -> Router {
        app_with(storage, Arc::new(StaticFetcher(PAGE.to_string())))
    }

    async fn call(app: Router, method: Method, uri: &str, body: Option<&str>) -> (StatusCode, Value) {
        call_with(app, method, uri, "application/json", body).await
    }

    async fn call_with(
        app: Router,
        method: Method,
        uri: &str,
        content_type: &str,
        body: Option<&str>,
    ) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", content_type)
            .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn seed(storage: &MemoryStorage) -> hl_core::Article {
        storage
            .create_article(NewArticle::new("Seeded", "", "https://news.example.com/seeded"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let storage = MemoryStorage::new();
        let (status, body) = call(app(&storage), Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_scrape_then_list() {
        let storage = MemoryStorage::new();
        let (status, report) = call(app(&storage), Method::POST, "/scrape", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(report["found"], 2);
        assert_eq!(report["created"].as_array().unwrap().len(), 2);

        let (status, body) = call(app(&storage), Method::GET, "/", None).await;
        assert_eq!(status, StatusCode::OK);
        let articles = body["articles"].as_array().unwrap();
        assert_eq!(articles.len(), 2);
        assert!(articles
            .iter()
            .any(|a| a["link"] == "https://news.example.com/entry/one" && a["summary"] == "First"));
    }

    #[tokio::test]
    async fn test_scrape_upstream_failure() {
        let storage = MemoryStorage::new();
        let (status, body) = call(app_with(&storage, Arc::new(DownFetcher)), Method::GET, "/scrape", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"]["code"], "upstream_error");
        assert!(storage.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_unsave() {
        let storage = MemoryStorage::new();
        let article = seed(&storage).await;

        let (status, body) = call(app(&storage), Method::PUT, &format!("/save/{}", article.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["saved"], true);

        let (_, saved) = call(app(&storage), Method::GET, "/saved", None).await;
        assert_eq!(saved["articles"].as_array().unwrap().len(), 1);

        let (status, body) = call(app(&storage), Method::PUT, &format!("/delsave/{}", article.id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["saved"], false);

        let (_, saved) = call(app(&storage), Method::GET, "/saved", None).await;
        assert!(saved["articles"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_ids_are_not_found() {
        let storage = MemoryStorage::new();
        let (status, body) = call(app(&storage), Method::PUT, "/save/not-an-id", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "not_found");

        let missing = hl_core::ArticleId::new();
        let (status, _) = call(app(&storage), Method::GET, &format!("/articles/{}", missing), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_note_lifecycle() {
        let storage = MemoryStorage::new();
        let article = seed(&storage).await;
        let uri = format!("/articles/{}", article.id);

        let (status, body) = call(app(&storage), Method::POST, &uri, Some(r#"{"text":"good find"}"#)).await;
        assert_eq!(status, StatusCode::OK);
        let note_id = body["notes"][0].as_str().unwrap().to_string();

        let (status, body) = call(app(&storage), Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["notes"],
            json!([{ "id": note_id, "payload": { "text": "good find" } }])
        );

        let (status, body) = call(
            app(&storage),
            Method::DELETE,
            &format!("{}/notes/{}", uri, note_id),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["notes"].as_array().unwrap().is_empty());

        let (_, body) = call(app(&storage), Method::GET, &uri, None).await;
        assert!(body["notes"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_attach_rejects_bad_bodies() {
        let storage = MemoryStorage::new();
        let article = seed(&storage).await;
        let uri = format!("/articles/{}", article.id);

        for body in ["[1, 2]", "\"text\"", "{not json"] {
            let (status, value) = call(app(&storage), Method::POST, &uri, Some(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {}", body);
            assert_eq!(value["error"]["code"], "bad_request");
        }
        assert!(storage.get_article(&article.id).await.unwrap().notes.is_empty());
    }

    #[tokio::test]
    async fn test_attach_form_body() {
        let storage = MemoryStorage::new();
        let article = seed(&storage).await;
        let uri = format!("/articles/{}", article.id);

        let (status, _) = call_with(
            app(&storage),
            Method::POST,
            &uri,
            "application/x-www-form-urlencoded",
            Some("title=Good+find&body=worth%20a%20read"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(app(&storage), Method::GET, &uri, None).await;
        assert_eq!(
            body["notes"][0]["payload"],
            json!({ "title": "Good find", "body": "worth a read" })
        );
    }

    #[tokio::test]
    async fn test_attach_payload_with_id_field() {
        let storage = MemoryStorage::new();
        let article = seed(&storage).await;
        let uri = format!("/articles/{}", article.id);

        let (status, _) = call(app(&storage), Method::POST, &uri, Some(r#"{"id":"ref-42"}"#)).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = call(app(&storage), Method::GET, &uri, None).await;
        assert_eq!(body["notes"][0]["payload"]["id"], "ref-42");
    }
}
