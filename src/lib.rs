//! # vectorkb
//!
//! A local-first document indexing and semantic retrieval pipeline.
//!
//! vectorkb ingests text documents (local files or URLs), splits them
//! into overlapping sentence-aware chunks, embeds each chunk through an
//! injected embedding capability, and persists the vectors in a named
//! collection for exact nearest-neighbor search.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌─────────────────┐   ┌──────────────┐
//! │ Collector │──▶│    Indexer       │──▶│ VectorStore   │
//! │ files/URL │   │ chunk + embed   │   │ sqlite│jsonl  │
//! └───────────┘   └─────────────────┘   └──────┬───────┘
//!                                              │
//!                 ┌─────────────────┐          │
//!                 │    Searcher      │◀─────────┘
//!                 │ embed + top-k   │
//!                 └─────────────────┘
//! ```
//!
//! Both store backends satisfy one contract: same response shape, same
//! descending-similarity order, same `1 − cosine` distance convention,
//! same tie-breaking by insertion order.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`chunk`] | Sentence-boundary chunking with overlap |
//! | [`collector`] | Path/URL resolution with allow-listing |
//! | [`embedding`] | Embedding capability and vector utilities |
//! | [`store`] | Vector storage contract and backends |
//! | [`index`] | Ingestion orchestration |
//! | [`search`] | Query orchestration |
//! | [`error`] | Error taxonomy |

pub mod chunk;
pub mod collector;
pub mod config;
pub mod embedding;
pub mod error;
pub mod index;
pub mod search;
pub mod store;
