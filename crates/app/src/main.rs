use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use hs_catalog_core::{
    build_documents, extract_catalog, load_index, persist_run, read_dataset, server,
    validate_hierarchy, write_jsonl, CharacterNgramEmbedder, Embedder, ExtractError,
    ExtractionOptions, FallbackTableExtractor, IndexingOptions, RemoteEmbedder, SearchCoordinator,
    SearchQuery, TypesenseStore, DEFAULT_EMBEDDING_DIMENSIONS,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "hs-catalog", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Typesense base URL
    #[arg(long, env = "TYPESENSE_URL", default_value = "http://localhost:8108", global = true)]
    typesense_url: String,

    /// Typesense admin API key
    #[arg(long, env = "TYPESENSE_API_KEY", default_value = "xyz", global = true)]
    typesense_api_key: String,

    /// Typesense collection
    #[arg(long, env = "TYPESENSE_COLLECTION", default_value = "hs_codes", global = true)]
    collection: String,

    /// Connection timeout for the search backend, in seconds. Defaults to
    /// 10 for `index` and 5 otherwise.
    #[arg(long, global = true)]
    connect_timeout: Option<u64>,

    /// Sentence embedding model used for documents and queries.
    #[arg(long, env = "EMBEDDER", value_enum, default_value_t = EmbedderKind::Ngram, global = true)]
    embedder: EmbedderKind,

    /// Base URL of a text-embeddings-inference server (remote embedder).
    #[arg(long, env = "EMBEDDING_ENDPOINT", global = true)]
    embedding_endpoint: Option<String>,

    /// Model name reported for the remote embedder.
    #[arg(long, env = "EMBEDDING_MODEL", default_value = "all-MiniLM-L6-v2", global = true)]
    embedding_model: String,

    /// Vector width expected from the embedder.
    #[arg(long, default_value_t = DEFAULT_EMBEDDING_DIMENSIONS, global = true)]
    dimensions: usize,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum EmbedderKind {
    /// Offline hashed character trigrams.
    Ngram,
    /// HTTP embedding server.
    Remote,
    /// In-process all-MiniLM-L6-v2 (needs the `local-embeddings` feature).
    Local,
}

#[derive(Subcommand)]
enum Command {
    /// Extract every chapter PDF under the tariff folder into one dataset.
    Extract {
        /// Root folder holding one sub-folder per section.
        #[arg(long, default_value = "Tariff")]
        folder: PathBuf,
        /// Combined dataset output.
        #[arg(long, default_value = "all_chapters_extracted.csv")]
        dataset: PathBuf,
        /// Run report output.
        #[arg(long, default_value = "extraction_log.txt")]
        report: PathBuf,
        /// Left x-coordinates (PDF points) where columns 1.. begin.
        #[arg(long, value_delimiter = ',')]
        column_edges: Option<Vec<f32>>,
    },
    /// Embed the dataset and reload the search collection from scratch.
    Index {
        #[arg(long, default_value = "all_chapters_extracted.csv")]
        dataset: PathBuf,
        /// Line-delimited interchange file written before import.
        #[arg(long, default_value = "hs_codes.jsonl")]
        jsonl: PathBuf,
        #[arg(long, default_value = "100")]
        batch_size: usize,
        /// Import timeout, in seconds.
        #[arg(long, default_value = "120")]
        timeout: u64,
    },
    /// Serve the HTTP query endpoint.
    Serve {
        #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:5000")]
        bind: String,
        #[arg(long, default_value = "10")]
        top_k: usize,
    },
    /// Run one hybrid query and print the ranked hits.
    Search {
        #[arg(long)]
        query: String,
        #[arg(long, default_value = "10")]
        top_k: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();
    info!(
        version = env!("CARGO_PKG_VERSION"),
        started_at = %Utc::now().to_rfc3339(),
        "hs-catalog boot"
    );

    match &cli.command {
        Command::Extract {
            folder,
            dataset,
            report,
            column_edges,
        } => {
            let mut options = ExtractionOptions::default();
            if let Some(edges) = column_edges {
                options.column_edges = edges.clone();
            }
            run_extract(folder.clone(), dataset.clone(), report.clone(), options).await
        }
        Command::Index {
            dataset,
            jsonl,
            batch_size,
            timeout,
        } => {
            let embedder = build_embedder(&cli)?;
            let store = build_store(&cli, 10)?.with_import_timeout(Duration::from_secs(*timeout));
            run_index(embedder, store, dataset, jsonl, *batch_size).await
        }
        Command::Serve { bind, top_k } => {
            let embedder = build_embedder(&cli)?;
            let store = build_store(&cli, 5)?;
            run_serve(embedder, store, bind, *top_k).await
        }
        Command::Search { query, top_k } => {
            let embedder = build_embedder(&cli)?;
            let store = build_store(&cli, 5)?;
            run_search(embedder, store, query, *top_k).await
        }
    }
}

fn lexical_embedder_warning(kind: EmbedderKind) -> Option<&'static str> {
    match kind {
        EmbedderKind::Ngram => Some(
            "character-trigram vectors match spelling, not meaning; \
             use --embedder remote or --embedder local for semantic search",
        ),
        EmbedderKind::Remote | EmbedderKind::Local => None,
    }
}

fn build_embedder(cli: &Cli) -> anyhow::Result<Box<dyn Embedder>> {
    if let Some(message) = lexical_embedder_warning(cli.embedder) {
        warn!(embedder = ?cli.embedder, "{message}");
    }

    let embedder: Box<dyn Embedder> = match cli.embedder {
        EmbedderKind::Ngram => Box::new(CharacterNgramEmbedder {
            dimensions: cli.dimensions,
        }),
        EmbedderKind::Remote => {
            let endpoint = cli
                .embedding_endpoint
                .clone()
                .context("--embedding-endpoint is required for the remote embedder")?;
            Box::new(RemoteEmbedder::new(
                endpoint,
                cli.embedding_model.clone(),
                cli.dimensions,
                Duration::from_secs(30),
            )?)
        }
        EmbedderKind::Local => local_embedder()?,
    };
    Ok(embedder)
}

fn build_store(cli: &Cli, default_connect_secs: u64) -> anyhow::Result<TypesenseStore> {
    let timeout = cli.connect_timeout.unwrap_or(default_connect_secs);
    Ok(TypesenseStore::new(
        cli.typesense_url.clone(),
        cli.typesense_api_key.clone(),
        cli.collection.clone(),
        Duration::from_secs(timeout),
    )?)
}

#[cfg(feature = "local-embeddings")]
fn local_embedder() -> anyhow::Result<Box<dyn Embedder>> {
    let embedder = hs_catalog_core::LocalEmbedder::new(64)?;
    Ok(Box::new(embedder) as Box<dyn Embedder>)
}

#[cfg(not(feature = "local-embeddings"))]
fn local_embedder() -> anyhow::Result<Box<dyn Embedder>> {
    bail!("this build has no local embedder; rebuild with --features local-embeddings")
}

async fn run_extract(
    folder: PathBuf,
    dataset: PathBuf,
    report: PathBuf,
    options: ExtractionOptions,
) -> anyhow::Result<()> {
    if !folder.is_dir() {
        bail!("tariff folder {} does not exist", folder.display());
    }

    // table extraction is synchronous and may use a blocking HTTP client
    let outcome = tokio::task::spawn_blocking(move || {
        let extractor = FallbackTableExtractor::from_env(&options);
        let run = extract_catalog(&folder, &options, &extractor)?;
        let written = persist_run(&run, &dataset, &report);
        Ok::<_, ExtractError>((run, written, dataset, report))
    })
    .await??;

    let (run, written, dataset, report) = outcome;
    println!(
        "{} file(s) succeeded, {} failed; log written to {}",
        run.report.succeeded(),
        run.report.failed(),
        report.display()
    );

    let written = match written {
        Ok(rows) => rows,
        Err(run_error) => {
            error!(error = %run_error, "extraction produced no dataset");
            return Err(run_error.into());
        }
    };

    for orphan in validate_hierarchy(&run.records) {
        warn!(
            code = %orphan.code_clean,
            parent = %orphan.parent,
            section = %orphan.section,
            "parent code missing from dataset"
        );
    }

    println!("{written} rows saved to {}", dataset.display());
    Ok(())
}

async fn run_index(
    embedder: Box<dyn Embedder>,
    store: TypesenseStore,
    dataset: &Path,
    jsonl: &Path,
    batch_size: usize,
) -> anyhow::Result<()> {
    let rows = read_dataset(dataset)
        .with_context(|| format!("reading dataset {}", dataset.display()))?;
    info!(rows = rows.len(), model = embedder.model_name(), "generating vectors");

    let options = IndexingOptions {
        import_batch_size: batch_size,
        ..IndexingOptions::default()
    };
    let documents = build_documents(&rows, &embedder, &options).await?;
    let body = write_jsonl(jsonl, &documents)?;

    let summary = load_index(&store, body, embedder.dimensions(), &options).await?;
    println!(
        "{} documents imported into {}",
        summary.imported,
        store.collection()
    );
    Ok(())
}

async fn run_serve(
    embedder: Box<dyn Embedder>,
    store: TypesenseStore,
    bind: &str,
    top_k: usize,
) -> anyhow::Result<()> {
    let coordinator = SearchCoordinator::new(store, embedder, top_k);
    coordinator
        .startup_check()
        .await
        .context("search collaborators are not ready; refusing to serve")?;
    let app = server::router(Arc::new(coordinator));
    server::serve(bind, app).await?;
    Ok(())
}

async fn run_search(
    embedder: Box<dyn Embedder>,
    store: TypesenseStore,
    query: &str,
    top_k: usize,
) -> anyhow::Result<()> {
    let coordinator = SearchCoordinator::new(store, embedder, top_k);
    let result = coordinator.search(&SearchQuery::new(query, top_k)).await?;

    println!("query: {} found={}", result.query, result.found);
    for hit in result.hits {
        println!(
            "{} level={} parent={} distance={}",
            hit.hscode,
            hit.level.map_or_else(|| "-".to_string(), |level| level.to_string()),
            hit.parent.as_deref().unwrap_or("-"),
            hit.vector_distance
                .map_or_else(|| "-".to_string(), |distance| format!("{distance:.4}")),
        );
        println!("  {}", hit.description);
        if let Some(section) = &hit.section {
            println!("  {section}");
        }
    }
    Ok(())
}
