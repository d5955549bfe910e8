pub mod classifier;
pub mod dataset;
pub mod embeddings;
pub mod error;
pub mod extractor;
pub mod hierarchy;
pub mod indexing;
pub mod ingest;
pub mod models;
pub mod normalize;
pub mod orchestrator;
pub mod report;
pub mod server;
pub mod stores;
pub mod traits;

pub use classifier::RowClassifier;
pub use dataset::{read_dataset, write_dataset};
#[cfg(feature = "local-embeddings")]
pub use embeddings::LocalEmbedder;
pub use embeddings::{
    CharacterNgramEmbedder, Embedder, RemoteEmbedder, DEFAULT_EMBEDDING_DIMENSIONS,
};
pub use error::{ExtractError, RecordError, SearchError};
pub use extractor::{
    FallbackTableExtractor, LopdfTableExtractor, TableExtractor, TableServiceConfig,
    TableServiceExtractor,
};
pub use hierarchy::{build_record, clean_code, parent_code, validate_hierarchy, OrphanRecord};
pub use indexing::{build_documents, load_index, to_jsonl, write_jsonl, IndexingOptions};
pub use ingest::{
    canonical_section, discover_sections, extract_catalog, extract_catalog_at, persist_run,
    ExtractionRun, FileOutcome, SectionFiles,
};
pub use models::{
    ClassifiedRow, DatasetRow, ExtractionOptions, HsRecord, ImportSummary, IndexedDocument,
    RawRow, RowKind, RunContext, SearchHit, SearchQuery, SearchResult, Table, ROOT_PARENT,
};
pub use normalize::{clean_for_index, normalize_description};
pub use orchestrator::SearchCoordinator;
pub use report::{FileReport, FileStatus, RunReport};
pub use stores::TypesenseStore;
pub use traits::HybridIndex;
