use crate::{ImportSummary, SearchError, SearchQuery, SearchResult};
use async_trait::async_trait;

/// A search backend that stores catalog documents in one schema-defined
/// collection and answers combined keyword and nearest-neighbour queries.
#[async_trait]
pub trait HybridIndex {
    /// Fails with [`SearchError::NotReady`] when the backend is unreachable
    /// or the collection is missing.
    async fn ensure_ready(&self) -> Result<(), SearchError>;

    /// Drops the collection if present and creates it empty.
    async fn recreate_collection(&self, dimensions: usize) -> Result<(), SearchError>;

    /// Imports newline-delimited JSON documents in one blocking call. Any
    /// rejected document fails the whole import.
    async fn import_documents(
        &self,
        jsonl: String,
        batch_size: usize,
    ) -> Result<ImportSummary, SearchError>;

    async fn hybrid_search(
        &self,
        query: &SearchQuery,
        query_vector: &[f32],
    ) -> Result<SearchResult, SearchError>;
}
