//! HTTP query endpoint.
//!
//! `GET /search?q=<text>` returns the backend's hybrid-ranked result object.
//! A missing or blank `q` is a 400; any embedding or backend failure is a
//! 500 carrying the underlying message.

use crate::embeddings::Embedder;
use crate::orchestrator::SearchCoordinator;
use crate::traits::HybridIndex;
use crate::SearchError;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    q: Option<String>,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }
}

impl From<SearchError> for ApiError {
    fn from(error: SearchError) -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: error.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(ErrorBody { error: self.message })).into_response()
    }
}

pub fn router<I, E>(coordinator: Arc<SearchCoordinator<I, E>>) -> Router
where
    I: HybridIndex + Send + Sync + 'static,
    E: Embedder + 'static,
{
    Router::new()
        .route("/", get(handle_home))
        .route("/health", get(handle_health))
        .route("/search", get(handle_search::<I, E>))
        .with_state(coordinator)
}

pub async fn serve(bind: &str, app: Router) -> Result<(), std::io::Error> {
    let addr: SocketAddr = bind.parse().map_err(|error| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid bind address {bind}: {error}"),
        )
    })?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "search server listening");
    axum::serve(listener, app).await
}

async fn handle_search<I, E>(
    State(coordinator): State<Arc<SearchCoordinator<I, E>>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, ApiError>
where
    I: HybridIndex + Send + Sync + 'static,
    E: Embedder + 'static,
{
    let text = params
        .q
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Query parameter 'q' is required"))?;

    info!(q = %text, "received query");
    match coordinator.search_text(&text).await {
        Ok(result) => Ok(Json(result.raw)),
        Err(search_error) => {
            error!(q = %text, error = %search_error, "search failed");
            Err(search_error.into())
        }
    }
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn handle_home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

const HOME_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>HS Code Semantic Search</title>
<style>
  body { font-family: sans-serif; margin: 40px; background: #f4f4f4; }
  input[type=text] { width: 400px; padding: 10px; font-size: 16px; }
  input[type=submit] { padding: 10px 20px; font-size: 16px; }
  pre { background: #fff; padding: 15px; border: 1px solid #ddd; }
</style>
</head>
<body>
  <h1>HS Code Semantic Search</h1>
  <form id="search-form">
    <input type="text" id="q" placeholder="Try 'tea' or 'smartphone'...">
    <input type="submit" value="Search" id="search-button">
  </form>
  <div id="results"></div>
  <script>
    document.getElementById('search-form').addEventListener('submit', function (e) {
      e.preventDefault();
      const results = document.getElementById('results');
      const button = document.getElementById('search-button');
      results.innerHTML = '<p>Loading...</p>';
      button.disabled = true;
      fetch('/search?q=' + encodeURIComponent(document.getElementById('q').value))
        .then(response => response.json())
        .then(data => {
          const pre = document.createElement('pre');
          pre.textContent = JSON.stringify(data, null, 2);
          results.replaceChildren(pre);
        })
        .catch(err => { results.textContent = 'Error: ' + err; })
        .finally(() => { button.disabled = false; });
    });
  </script>
</body>
</html>
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::stores::TypesenseStore;
    use crate::{ImportSummary, SearchQuery, SearchResult};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    struct EchoIndex;

    #[async_trait]
    impl HybridIndex for EchoIndex {
        async fn ensure_ready(&self) -> Result<(), SearchError> {
            Ok(())
        }

        async fn recreate_collection(&self, _dimensions: usize) -> Result<(), SearchError> {
            Ok(())
        }

        async fn import_documents(
            &self,
            _jsonl: String,
            _batch_size: usize,
        ) -> Result<ImportSummary, SearchError> {
            Ok(ImportSummary::default())
        }

        async fn hybrid_search(
            &self,
            query: &SearchQuery,
            query_vector: &[f32],
        ) -> Result<SearchResult, SearchError> {
            Ok(SearchResult {
                query: query.text.clone(),
                found: 0,
                hits: Vec::new(),
                raw: serde_json::json!({
                    "q": query.text,
                    "per_page": query.top_k,
                    "dims": query_vector.len(),
                    "hits": []
                }),
            })
        }
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).expect("request builds"))
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body reads");
        (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
    }

    fn echo_app() -> Router {
        router(Arc::new(SearchCoordinator::new(EchoIndex, CharacterNgramEmbedder::default(), 10)))
    }

    #[tokio::test]
    async fn search_returns_backend_result_object() {
        let (status, body) = get_json(echo_app(), "/search?q=green%20tea").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["q"], "green tea");
        assert_eq!(body["per_page"], 10);
        assert_eq!(body["dims"], 384);
    }

    #[tokio::test]
    async fn missing_query_is_a_client_error() {
        for uri in ["/search", "/search?q=", "/search?q=%20%20"] {
            let (status, body) = get_json(echo_app(), uri).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "uri {uri}");
            assert_eq!(body["error"], "Query parameter 'q' is required");
        }
    }

    #[tokio::test]
    async fn unreachable_backend_is_a_server_error() {
        let store = TypesenseStore::new("http://127.0.0.1:9", "xyz", "hs_codes", Duration::from_millis(500))
            .expect("endpoint parses");
        let app = router(Arc::new(SearchCoordinator::new(store, CharacterNgramEmbedder::default(), 10)));

        let (status, body) = get_json(app, "/search?q=tea").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().is_some_and(|message| !message.is_empty()));
    }

    #[tokio::test]
    async fn health_reports_version() {
        let (status, body) = get_json(echo_app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }
}
