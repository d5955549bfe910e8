use crate::embeddings::{check_dimensions, Embedder};
use crate::traits::HybridIndex;
use crate::{SearchError, SearchQuery, SearchResult};
use tracing::info;

/// Turns query text into a vector and sends both to the hybrid index.
pub struct SearchCoordinator<I, E>
where
    I: HybridIndex,
    E: Embedder,
{
    index: I,
    embedder: E,
    top_k: usize,
}

impl<I, E> SearchCoordinator<I, E>
where
    I: HybridIndex + Send + Sync,
    E: Embedder,
{
    pub fn new(index: I, embedder: E, top_k: usize) -> Self {
        Self {
            index,
            embedder,
            top_k: top_k.max(1),
        }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Probes the embedding model and the backend; serving must not begin
    /// unless both answer.
    pub async fn startup_check(&self) -> Result<(), SearchError> {
        self.embedder.probe().await?;
        self.index.ensure_ready().await?;
        info!(model = self.embedder.model_name(), "search collaborators ready");
        Ok(())
    }

    pub async fn search_text(&self, text: &str) -> Result<SearchResult, SearchError> {
        self.search(&SearchQuery::new(text, self.top_k)).await
    }

    pub async fn search(&self, query: &SearchQuery) -> Result<SearchResult, SearchError> {
        if query.text.trim().is_empty() {
            return Err(SearchError::Request("query is empty".to_string()));
        }

        let query_vector = self.embedder.embed(&query.text).await?;
        check_dimensions(&query_vector, self.embedder.dimensions())?;

        self.index.hybrid_search(query, &query_vector).await
    }
}
