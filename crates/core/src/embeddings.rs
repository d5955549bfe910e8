use crate::error::SearchError;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const DEFAULT: usize = 384;

/// Dimension of all-MiniLM-L6-v2 sentence vectors; the search collection's
/// `embedding` field is declared with it.
pub const DEFAULT_EMBEDDING_DIMENSIONS: usize = DEFAULT;

#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    fn dimensions(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        match vectors.pop() {
            Some(vector) if vectors.is_empty() => Ok(vector),
            _ => Err(SearchError::Embedding(format!(
                "{} returned an unexpected number of vectors",
                self.model_name()
            ))),
        }
    }

    /// Embeds a fixed text once and checks the vector width, so a process
    /// can refuse to start against a missing or mismatched model.
    async fn probe(&self) -> Result<(), SearchError> {
        let vector = self
            .embed("live horses")
            .await
            .map_err(|error| SearchError::NotReady(format!("{}: {error}", self.model_name())))?;
        check_dimensions(&vector, self.dimensions())
            .map_err(|error| SearchError::NotReady(error.to_string()))
    }
}

pub fn check_dimensions(vector: &[f32], expected: usize) -> Result<(), SearchError> {
    if vector.len() != expected {
        return Err(SearchError::Embedding(format!(
            "embedding dimension {} != {}",
            vector.len(),
            expected
        )));
    }
    Ok(())
}

#[async_trait]
impl<E: Embedder + ?Sized> Embedder for Box<E> {
    fn model_name(&self) -> &str {
        (**self).model_name()
    }

    fn dimensions(&self) -> usize {
        (**self).dimensions()
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        (**self).embed_batch(texts).await
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, SearchError> {
        (**self).embed(text).await
    }

    async fn probe(&self) -> Result<(), SearchError> {
        (**self).probe().await
    }
}

/// Offline hashed character-trigram embedder. Deterministic, so it also
/// serves as the embedder in tests.
#[derive(Debug, Clone, Copy)]
pub struct CharacterNgramEmbedder {
    pub dimensions: usize,
}

impl Default for CharacterNgramEmbedder {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }
}

impl CharacterNgramEmbedder {
    pub fn embed_text(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0f32; self.dimensions.max(1)];
        let lowered = text.to_lowercase();
        let chars: Vec<char> = lowered.chars().collect();

        if chars.is_empty() {
            return vector;
        }

        for window in chars.windows(3) {
            let token = window.iter().collect::<String>();
            let mut hash = 1469598103934665603u64;
            for byte in token.bytes() {
                hash ^= byte as u64;
                hash = hash.wrapping_mul(1099511628211);
            }
            let bucket = (hash % vector.len() as u64) as usize;
            vector[bucket] += 1.0;
        }

        let magnitude = vector.iter().map(|value| value * value).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for value in &mut vector {
                *value /= magnitude;
            }
        }

        vector
    }
}

#[async_trait]
impl Embedder for CharacterNgramEmbedder {
    fn model_name(&self) -> &str {
        "char-trigram"
    }

    fn dimensions(&self) -> usize {
        self.dimensions.max(1)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        Ok(texts.iter().map(|text| self.embed_text(text)).collect())
    }
}

/// Client for a sentence-embedding service speaking the
/// text-embeddings-inference protocol: `POST /embed {"inputs": [...]}`.
pub struct RemoteEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: usize,
}

impl RemoteEmbedder {
    pub fn new(
        endpoint: impl Into<String>,
        model: impl Into<String>,
        dimensions: usize,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let endpoint = endpoint.into();
        url::Url::parse(&endpoint)?;
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.into(),
            dimensions,
        })
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/embed", self.endpoint))
            .json(&json!({ "inputs": texts }))
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SearchError::BackendResponse {
                backend: "embedding".to_string(),
                details: response.status().to_string(),
            });
        }

        let vectors: Vec<Vec<f32>> = response.json().await?;
        if vectors.len() != texts.len() {
            return Err(SearchError::Embedding(format!(
                "embedding count {} doesn't match input count {}",
                vectors.len(),
                texts.len()
            )));
        }
        Ok(vectors)
    }
}

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

#[cfg(feature = "local-embeddings")]
mod local {
    use super::{Embedder, DEFAULT_EMBEDDING_DIMENSIONS};
    use crate::error::SearchError;
    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::{Arc, Mutex};

    /// all-MiniLM-L6-v2 run in-process through ONNX Runtime.
    pub struct LocalEmbedder {
        model: Arc<Mutex<TextEmbedding>>,
        batch_size: usize,
    }

    impl LocalEmbedder {
        pub fn new(batch_size: usize) -> Result<Self, SearchError> {
            let model = TextEmbedding::try_new(
                InitOptions::new(EmbeddingModel::AllMiniLML6V2).with_show_download_progress(true),
            )
            .map_err(|error| {
                SearchError::NotReady(format!("failed to initialize local embedding model: {error}"))
            })?;

            Ok(Self {
                model: Arc::new(Mutex::new(model)),
                batch_size: batch_size.max(1),
            })
        }
    }

    #[async_trait]
    impl Embedder for LocalEmbedder {
        fn model_name(&self) -> &str {
            "all-MiniLM-L6-v2"
        }

        fn dimensions(&self) -> usize {
            DEFAULT_EMBEDDING_DIMENSIONS
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
            let model = Arc::clone(&self.model);
            let texts = texts.to_vec();
            let batch_size = self.batch_size;

            tokio::task::spawn_blocking(move || {
                let mut model = model
                    .lock()
                    .map_err(|_| SearchError::Embedding("local model lock poisoned".to_string()))?;
                model
                    .embed(texts, Some(batch_size))
                    .map_err(|error| SearchError::Embedding(error.to_string()))
            })
            .await
            .map_err(|error| SearchError::Embedding(format!("embedding task join error: {error}")))?
        }
    }
}
