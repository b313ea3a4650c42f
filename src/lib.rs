//! Stratum: a tenant-scoped Grounded-Theory coding-discovery engine.
//!
//! Ingests interview transcripts, segments them into fragments, embeds
//! and indexes them across three heterogeneous stores — relational,
//! vector, graph — and drives an iterative, LLM-assisted coding
//! workflow (open codes → axial relations → saturation) behind a
//! resumable background worker, the Semantic-Runner.
//!
//! # Components
//!
//! - [`artifact`] (C1) — tenant-scoped blob store for memos, checkpoints, reports.
//! - [`relational`] (C2) — candidate ledger, fragments, audit, saturation curve.
//! - [`vector`] (C3) — kNN search and Discovery (native + weighted-vector fallback).
//! - [`graph`] (C4) — Neo4j-shaped projection and graph-algorithm facade.
//! - [`ingestion`] (C5) — document → fragments → embeddings → tri-store commit.
//! - [`retrieval`] (C6) — BM25 + cosine hybrid search.
//! - [`ledger`] (C7) — candidate-ledger coding operations and interview ordering.
//! - [`axial`] (C8) — typed Category→Code relations with an evidence gate.
//! - [`runner`] (C9) — the Semantic-Runner background worker.
//! - [`llm`] (C10) — LLM Gateway: chat-JSON with retries and schema validation.
//! - [`reports`] (C11) — read-only recent-artifacts aggregation.
//!
//! # Example
//!
//! ```
//! use stratum::domain::ProjectId;
//! use stratum::relational::RelationalStore;
//!
//! let store = RelationalStore::open_in_memory().unwrap();
//! let project = ProjectId::from_string("demo");
//! assert_eq!(store.count_pending(&project).unwrap(), 0);
//! ```

pub mod artifact;
pub mod axial;
pub mod config;
pub mod domain;
pub mod embedding;
pub mod error;
pub mod graph;
pub mod ingestion;
pub mod ledger;
pub mod llm;
pub mod relational;
pub mod reports;
pub mod retrieval;
mod retry;
pub mod runner;
pub mod vector;

pub use config::Config;
pub use error::{Error, ErrorFamily};
pub use retry::{backoff_delay, is_transient_message, sleep_backoff};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
