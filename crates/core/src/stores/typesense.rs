use crate::traits::HybridIndex;
use crate::{ImportSummary, SearchError, SearchHit, SearchQuery, SearchResult};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const BACKEND: &str = "typesense";
const API_KEY_HEADER: &str = "X-TYPESENSE-API-KEY";

pub struct TypesenseStore {
    client: Arc<Client>,
    endpoint: String,
    api_key: String,
    collection: String,
    import_timeout: Duration,
}

impl TypesenseStore {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        collection: impl Into<String>,
        connection_timeout: Duration,
    ) -> Result<Self, SearchError> {
        let endpoint = endpoint.into();
        url::Url::parse(&endpoint)?;

        let client = Client::builder()
            .connect_timeout(connection_timeout)
            .build()?;

        Ok(Self {
            client: Arc::new(client),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            collection: collection.into(),
            import_timeout: Duration::from_secs(120),
        })
    }

    pub fn with_import_timeout(mut self, timeout: Duration) -> Self {
        self.import_timeout = timeout;
        self
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.endpoint, path.trim_start_matches('/'))
    }

    fn collection_url(&self) -> String {
        self.url(&format!("collections/{}", self.collection))
    }

    pub async fn health(&self) -> Result<(), SearchError> {
        let response = self
            .client
            .get(self.url("health"))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let body: Value = response.json().await?;
        if body.get("ok").and_then(Value::as_bool) != Some(true) {
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("health check reported {body}"),
            });
        }
        Ok(())
    }

    pub async fn collection_exists(&self) -> Result<bool, SearchError> {
        let response = self
            .client
            .get(self.collection_url())
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(backend_error(status)),
        }
    }

    pub async fn drop_collection(&self) -> Result<bool, SearchError> {
        let response = self
            .client
            .delete(self.collection_url())
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await?;

        match response.status() {
            status if status.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            status => Err(backend_error(status)),
        }
    }

    pub async fn create_collection(&self, dimensions: usize) -> Result<(), SearchError> {
        let response = self
            .client
            .post(self.url("collections"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&collection_schema(&self.collection, dimensions))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let details = response.text().await.unwrap_or_default();
            return Err(SearchError::Request(format!(
                "collection setup failed with {status}: {details}"
            )));
        }
        Ok(())
    }
}

pub fn collection_schema(name: &str, dimensions: usize) -> Value {
    json!({
        "name": name,
        "fields": [
            {"name": "hscode", "type": "string", "facet": true},
            {"name": "description", "type": "string"},
            {"name": "parent", "type": "string", "facet": true, "optional": true},
            {"name": "level", "type": "int32", "facet": true},
            {"name": "section", "type": "string", "facet": true, "optional": true},
            {"name": "embedding", "type": "float[]", "num_dim": dimensions}
        ]
    })
}

pub fn hybrid_search_body(collection: &str, query: &SearchQuery, query_vector: &[f32]) -> Value {
    let vector = query_vector
        .iter()
        .map(|value| value.to_string())
        .collect::<Vec<_>>()
        .join(",");

    json!({
        "searches": [{
            "collection": collection,
            "q": query.text,
            "query_by": query.query_by.join(","),
            "vector_query": format!("embedding:([{vector}], k:{})", query.top_k),
            "per_page": query.top_k,
        }]
    })
}

pub fn parse_import_response(body: &str) -> Result<ImportSummary, SearchError> {
    let mut summary = ImportSummary::default();
    let mut first_error = None;

    for line in body.lines().filter(|line| !line.trim().is_empty()) {
        let result: Value = serde_json::from_str(line)?;
        if result.get("success").and_then(Value::as_bool) == Some(true) {
            summary.imported += 1;
        } else {
            summary.failed += 1;
            if first_error.is_none() {
                first_error = Some(
                    result
                        .get("error")
                        .and_then(Value::as_str)
                        .unwrap_or("document rejected")
                        .to_string(),
                );
            }
        }
    }

    match first_error {
        Some(error) => Err(SearchError::BackendResponse {
            backend: BACKEND.to_string(),
            details: format!("{} of {} documents rejected; first error: {error}", summary.failed, summary.imported + summary.failed),
        }),
        None => Ok(summary),
    }
}

/// Picks the first result of a multi-search response. A per-search
/// `error` field is a failed query even though the HTTP call succeeded.
pub fn parse_search_response(query: &str, response: &Value) -> Result<SearchResult, SearchError> {
    let raw = response
        .pointer("/results/0")
        .cloned()
        .ok_or_else(|| SearchError::BackendResponse {
            backend: BACKEND.to_string(),
            details: "multi_search response has no results".to_string(),
        })?;

    if let Some(error) = raw.get("error") {
        return Err(SearchError::BackendResponse {
            backend: BACKEND.to_string(),
            details: error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string()),
        });
    }

    let hits = raw
        .pointer("/hits")
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default();

    let mut result = Vec::new();
    for hit in hits {
        let document = hit.pointer("/document").cloned().unwrap_or(Value::Null);
        let text = |field: &str| {
            document
                .get(field)
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        result.push(SearchHit {
            hscode: text("hscode").unwrap_or_default(),
            description: text("description").unwrap_or_default(),
            parent: text("parent"),
            level: document.get("level").and_then(Value::as_i64),
            section: text("section"),
            text_match: hit.pointer("/text_match").and_then(Value::as_f64),
            vector_distance: hit.pointer("/vector_distance").and_then(Value::as_f64),
        });
    }

    Ok(SearchResult {
        query: query.to_string(),
        found: raw.pointer("/found").and_then(Value::as_u64).unwrap_or(0),
        hits: result,
        raw,
    })
}

fn backend_error(status: StatusCode) -> SearchError {
    SearchError::BackendResponse {
        backend: BACKEND.to_string(),
        details: status.to_string(),
    }
}

#[async_trait]
impl HybridIndex for TypesenseStore {
    async fn ensure_ready(&self) -> Result<(), SearchError> {
        self.health()
            .await
            .map_err(|error| SearchError::NotReady(format!("{BACKEND} at {}: {error}", self.endpoint)))?;

        if !self.collection_exists().await? {
            return Err(SearchError::NotReady(format!(
                "collection '{}' does not exist; run the index step first",
                self.collection
            )));
        }
        Ok(())
    }

    async fn recreate_collection(&self, dimensions: usize) -> Result<(), SearchError> {
        self.health()
            .await
            .map_err(|error| SearchError::NotReady(format!("{BACKEND} at {}: {error}", self.endpoint)))?;

        if self.drop_collection().await? {
            info!(collection = %self.collection, "deleted old collection");
        } else {
            info!(collection = %self.collection, "no old collection found");
        }

        self.create_collection(dimensions).await?;
        info!(collection = %self.collection, dimensions, "created collection");
        Ok(())
    }

    async fn import_documents(
        &self,
        jsonl: String,
        batch_size: usize,
    ) -> Result<ImportSummary, SearchError> {
        if jsonl.trim().is_empty() {
            return Ok(ImportSummary::default());
        }

        let response = self
            .client
            .post(format!(
                "{}/documents/import?action=create&batch_size={}",
                self.collection_url(),
                batch_size.max(1)
            ))
            .header(API_KEY_HEADER, &self.api_key)
            .header("Content-Type", "text/plain")
            .timeout(self.import_timeout)
            .body(jsonl)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(backend_error(response.status()));
        }

        let body = response.text().await?;
        parse_import_response(&body)
    }

    async fn hybrid_search(
        &self,
        query: &SearchQuery,
        query_vector: &[f32],
    ) -> Result<SearchResult, SearchError> {
        let body = hybrid_search_body(&self.collection, query, query_vector);
        debug!(collection = %self.collection, q = %query.text, "dispatching multi_search");

        let response = self
            .client
            .post(self.url("multi_search"))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let details = response.text().await.unwrap_or_default();
            return Err(SearchError::BackendResponse {
                backend: BACKEND.to_string(),
                details: format!("{status}: {details}"),
            });
        }

        let parsed: Value = response.json().await?;
        parse_search_response(&query.text, &parsed)
    }
}
