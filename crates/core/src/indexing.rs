use crate::embeddings::{check_dimensions, Embedder};
use crate::models::{DatasetRow, IndexedDocument};
use crate::normalize::clean_for_index;
use crate::traits::HybridIndex;
use crate::{ImportSummary, SearchError};
use std::fs;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone)]
pub struct IndexingOptions {
    pub embed_batch_size: usize,
    pub import_batch_size: usize,
}

impl Default for IndexingOptions {
    fn default() -> Self {
        Self {
            embed_batch_size: 64,
            import_batch_size: 100,
        }
    }
}

/// Embeds the index-time cleaned description of every row. The stored
/// description stays the extraction-time text.
pub async fn build_documents<E: Embedder + ?Sized>(
    rows: &[DatasetRow],
    embedder: &E,
    options: &IndexingOptions,
) -> Result<Vec<IndexedDocument>, SearchError> {
    let mut documents = Vec::with_capacity(rows.len());

    for batch in rows.chunks(options.embed_batch_size.max(1)) {
        let texts = batch
            .iter()
            .map(|row| clean_for_index(&row.description))
            .collect::<Vec<_>>();
        let vectors = embedder.embed_batch(&texts).await?;

        if vectors.len() != batch.len() {
            return Err(SearchError::Embedding(format!(
                "embedding count {} doesn't match row count {}",
                vectors.len(),
                batch.len()
            )));
        }

        for (row, embedding) in batch.iter().zip(vectors) {
            check_dimensions(&embedding, embedder.dimensions())?;
            documents.push(IndexedDocument {
                hscode: row.hscode.clone(),
                description: row.description.clone(),
                parent: non_empty(&row.parent),
                level: i32::from(row.level),
                section: non_empty(&row.section),
                embedding,
            });
        }

        info!(embedded = documents.len(), total = rows.len(), "generated vectors");
    }

    Ok(documents)
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn to_jsonl(documents: &[IndexedDocument]) -> Result<String, SearchError> {
    let mut body = String::new();
    for document in documents {
        body.push_str(&serde_json::to_string(document)?);
        body.push('\n');
    }
    Ok(body)
}

pub fn write_jsonl(path: &Path, documents: &[IndexedDocument]) -> Result<String, SearchError> {
    let body = to_jsonl(documents)?;
    fs::write(path, &body)?;
    info!(path = %path.display(), documents = documents.len(), "wrote interchange file");
    Ok(body)
}

/// Replaces the collection's contents with the given documents.
pub async fn load_index<I: HybridIndex + Send + Sync + ?Sized>(
    index: &I,
    jsonl: String,
    dimensions: usize,
    options: &IndexingOptions,
) -> Result<ImportSummary, SearchError> {
    index.recreate_collection(dimensions).await?;
    let summary = index
        .import_documents(jsonl, options.import_batch_size)
        .await?;
    info!(imported = summary.imported, "indexing complete");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::CharacterNgramEmbedder;
    use crate::{SearchQuery, SearchResult};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::sync::Mutex;
    use tempfile::tempdir;

    fn dataset_row(hscode: &str, parent: &str, description: &str) -> DatasetRow {
        DatasetRow {
            section: "Section II".to_string(),
            hscode: hscode.to_string(),
            description: description.to_string(),
            parent: parent.to_string(),
            level: hscode.len() as u8,
            datetime_extracted: Utc::now(),
        }
    }

    #[tokio::test]
    async fn documents_embed_cleaned_text_but_keep_description() {
        let embedder = CharacterNgramEmbedder::default();
        let rows = vec![
            dataset_row("0902", "09", "Tea, whether or not flavoured."),
            dataset_row("090210", "0902", "Green tea (+)."),
        ];
        let options = IndexingOptions {
            embed_batch_size: 1,
            ..IndexingOptions::default()
        };

        let documents = build_documents(&rows, &embedder, &options).await.expect("documents build");
        assert_eq!(documents.len(), 2);
        assert_eq!(documents[0].description, "Tea, whether or not flavoured.");
        assert_eq!(documents[0].embedding, embedder.embed_text("Tea, whether or not flavoured"));
        assert_eq!(documents[1].embedding, embedder.embed_text("Green tea"));
        assert_eq!(documents[1].parent.as_deref(), Some("0902"));
        assert_eq!(documents[1].level, 6);
    }

    #[tokio::test]
    async fn wrong_vector_width_aborts() {
        struct Narrow;

        #[async_trait]
        impl Embedder for Narrow {
            fn model_name(&self) -> &str {
                "narrow"
            }

            fn dimensions(&self) -> usize {
                384
            }

            async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SearchError> {
                Ok(texts.iter().map(|_| vec![0.0; 8]).collect())
            }
        }

        let rows = vec![dataset_row("0902", "09", "Tea")];
        let result = build_documents(&rows, &Narrow, &IndexingOptions::default()).await;
        assert!(matches!(result, Err(SearchError::Embedding(_))));
    }

    #[test]
    fn interchange_file_is_one_object_per_line() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("hs_codes.jsonl");
        let documents = vec![
            IndexedDocument {
                hscode: "09".to_string(),
                description: "Coffee, tea, mate and spices".to_string(),
                parent: Some("TOTAL".to_string()),
                level: 2,
                section: Some("Section II".to_string()),
                embedding: vec![0.25, 0.5],
            },
            IndexedDocument {
                hscode: "0902".to_string(),
                description: "Tea".to_string(),
                parent: Some("09".to_string()),
                level: 4,
                section: None,
                embedding: vec![1.0, 0.0],
            },
        ];

        let body = write_jsonl(&path, &documents)?;
        assert_eq!(fs::read_to_string(&path)?, body);
        let lines: Vec<_> = body.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            r#"{"hscode":"09","description":"Coffee, tea, mate and spices","parent":"TOTAL","level":2,"section":"Section II","embedding":[0.25,0.5]}"#
        );
        let decoded: IndexedDocument = serde_json::from_str(lines[1])?;
        assert_eq!(decoded.section, None);
        Ok(())
    }

    #[test]
    fn unwritable_interchange_path_is_an_io_error() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let path = dir.path().join("missing").join("hs_codes.jsonl");
        let result = write_jsonl(&path, &[]);
        assert!(matches!(result, Err(SearchError::Io(_))));
        Ok(())
    }

    #[derive(Default)]
    struct RecordingIndex {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl HybridIndex for RecordingIndex {
        async fn ensure_ready(&self) -> Result<(), SearchError> {
            Ok(())
        }

        async fn recreate_collection(&self, dimensions: usize) -> Result<(), SearchError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(format!("recreate:{dimensions}"));
            }
            Ok(())
        }

        async fn import_documents(
            &self,
            jsonl: String,
            batch_size: usize,
        ) -> Result<ImportSummary, SearchError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(format!("import:{batch_size}"));
            }
            Ok(ImportSummary {
                imported: jsonl.lines().count(),
                failed: 0,
            })
        }

        async fn hybrid_search(
            &self,
            _query: &SearchQuery,
            _query_vector: &[f32],
        ) -> Result<SearchResult, SearchError> {
            Err(SearchError::Request("not used".to_string()))
        }
    }

    #[tokio::test]
    async fn load_recreates_collection_before_import() {
        let index = RecordingIndex::default();
        let summary = load_index(&index, "{}\n{}\n".to_string(), 384, &IndexingOptions::default())
            .await
            .expect("load succeeds");

        assert_eq!(summary.imported, 2);
        let calls = index.calls.lock().expect("lock").clone();
        assert_eq!(calls, vec!["recreate:384".to_string(), "import:100".to_string()]);
    }
}
