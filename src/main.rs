//! # vectorkb CLI (`vkb`)
//!
//! Command-line interface for the indexing and retrieval pipeline.
//!
//! ```bash
//! # Index local files or URLs into a named knowledge base
//! vkb index ./docs https://example.com/guide.txt --kb kb_docs
//!
//! # Search the knowledge base
//! vkb search "how do I request reimbursement" --kb kb_docs --top-k 5
//! ```
//!
//! All commands accept `--config` pointing to a TOML configuration
//! file; a missing file falls back to built-in defaults (JSONL store
//! under `data/kb`, offline hash embeddings).

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use vectorkb::collector::SourceCollector;
use vectorkb::config;
use vectorkb::embedding::create_embedder;
use vectorkb::index::index_sources;
use vectorkb::search::search_kb;
use vectorkb::store::open_store;

/// vectorkb — a local-first document indexing and semantic retrieval
/// pipeline.
#[derive(Parser)]
#[command(
    name = "vkb",
    about = "vectorkb — local-first document indexing and semantic retrieval",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file uses defaults.
    #[arg(long, global = true, default_value = "./config/vkb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Index local files, directories, or URLs into a knowledge base.
    ///
    /// Sources are chunked, embedded, and appended to the configured
    /// vector store. Zero-chunk sources are reported as "empty" and
    /// skipped.
    Index {
        /// Files, directories, or http(s) URLs to index.
        #[arg(required = true)]
        paths: Vec<String>,

        /// Target knowledge base (collection) name.
        #[arg(long, default_value = "kb_default")]
        kb: String,

        /// Maximum chunk length in characters (overrides config).
        #[arg(long)]
        chunk_size: Option<usize>,

        /// Overlap between consecutive chunks (overrides config).
        #[arg(long)]
        overlap: Option<usize>,

        /// Embedding model name (overrides config).
        #[arg(long)]
        model: Option<String>,
    },

    /// Search a knowledge base semantically.
    Search {
        /// The query text.
        query: String,

        /// Knowledge base (collection) name to search.
        #[arg(long, default_value = "kb_default")]
        kb: String,

        /// Maximum number of results.
        #[arg(long, default_value_t = 5)]
        top_k: usize,

        /// Embedding model name (overrides config).
        #[arg(long)]
        model: Option<String>,

        /// Print the full response as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_or_default(&cli.config)?;
    let store = open_store(&cfg.store)?;
    let embedder = create_embedder(&cfg.embedding)?;

    match cli.command {
        Commands::Index {
            paths,
            kb,
            chunk_size,
            overlap,
            model,
        } => {
            let chunk_size = chunk_size.unwrap_or(cfg.chunking.chunk_size);
            let overlap = overlap.unwrap_or(cfg.chunking.overlap);
            let model = model.unwrap_or_else(|| cfg.embedding.model.clone());

            let collector = SourceCollector::new(&cfg.collector)?;
            let sources = collector.collect(&paths).await?;

            let report = index_sources(
                store.as_ref(),
                embedder.as_ref(),
                &kb,
                &sources,
                chunk_size,
                overlap,
                &model,
            )
            .await?;

            println!("index {}", report.kb);
            println!("  files indexed: {}", report.files_indexed);
            println!("  chunks indexed: {}", report.chunks_indexed);
            println!(
                "  chunking: size {} overlap {} model {}",
                report.chunk_size, report.overlap, report.model
            );
            for detail in &report.details {
                println!("  - {}: {} {}", detail.source, detail.chunks, detail.status);
            }
            println!("ok");
        }

        Commands::Search {
            query,
            kb,
            top_k,
            model,
            json,
        } => {
            let model = model.unwrap_or_else(|| cfg.embedding.model.clone());
            let response = search_kb(
                store.as_ref(),
                embedder.as_ref(),
                &kb,
                &query,
                top_k,
                &model,
            )
            .await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&response)?);
                return Ok(());
            }

            if !response.success {
                anyhow::bail!(
                    "search failed: {}",
                    response.error.unwrap_or_else(|| "unknown error".to_string())
                );
            }

            if response.results.is_empty() {
                println!("No results.");
                return Ok(());
            }

            for hit in &response.results {
                let location = match (hit.source.as_deref(), hit.chunk_index) {
                    (Some(source), Some(index)) => format!("{} #{}", source, index),
                    (Some(source), None) => source.to_string(),
                    _ => "(unknown source)".to_string(),
                };
                match hit.distance {
                    Some(distance) => println!("{}. [{:.4}] {}", hit.rank, distance, location),
                    None => println!("{}. {}", hit.rank, location),
                }
                let excerpt: String = hit.text.chars().take(240).collect();
                println!("   \"{}\"", excerpt.replace('\n', " "));
                if let Some(id) = &hit.id {
                    println!("   id: {}", id);
                }
                println!();
            }
        }
    }

    Ok(())
}
