//! C5 — Ingestion Pipeline.
//!
//! `ingest_document` is spec.md §4.5's ordered commit: join turns, split
//! into fragments, hash stable ids, embed in one batch, then write
//! relational → vector → graph in that order. A batch-embedding failure
//! aborts the whole document rather than writing fragments with partial
//! embeddings; a partial write across stores is reported by
//! `verify_consistency`, never auto-repaired here.

mod segment;

pub use segment::{join_consecutive_speakers, split_into_fragments, SplitConfig, TranscriptDocument, Turn};

use crate::domain::{Fragment, FragmentId, ProjectId};
use crate::embedding::{Embedder, EmbeddingError};
use crate::graph::{GraphError, GraphStore};
use crate::relational::{RelationalError, RelationalStore};
use crate::vector::{split_on_fail_upsert, SearchFilter, VectorError, VectorPayload, VectorPoint, VectorStore};
use sha2::{Digest, Sha256};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Relational(#[from] RelationalError),
    #[error(transparent)]
    Vector(#[from] VectorError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

pub type IngestResult<T> = Result<T, IngestError>;

#[derive(Debug, Clone)]
pub struct IngestSummary {
    pub archivo: String,
    pub fragments_created: usize,
    pub fragments_embedded: usize,
    pub partial: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct IngestTotals {
    pub documents: usize,
    pub fragments_created: usize,
    pub fragments_embedded: usize,
    pub partial_documents: usize,
}

#[derive(Debug, Clone)]
pub struct ConsistencyReport {
    pub archivo: String,
    pub relational_count: usize,
    pub vector_count: usize,
    pub orphans_in_vector: usize,
}

/// `sha256(archivo ++ ":" ++ par_idx)`, truncated to 32 hex chars — stable
/// across re-ingestion of the same document, so `insert_fragment`'s
/// `INSERT OR REPLACE` is idempotent on a re-run.
pub fn stable_hash(archivo: &str, par_idx: u32) -> FragmentId {
    let mut hasher = Sha256::new();
    hasher.update(archivo.as_bytes());
    hasher.update(b":");
    hasher.update(par_idx.to_le_bytes());
    let digest = hasher.finalize();
    FragmentId::from_string(format!("{:x}", digest)[..32].to_string())
}

pub struct IngestionPipeline<V: VectorStore, G: GraphStore, E: Embedder> {
    relational: Arc<RelationalStore>,
    vector: Arc<V>,
    graph: Arc<G>,
    embedder: Arc<E>,
}

impl<V: VectorStore, G: GraphStore, E: Embedder> IngestionPipeline<V, G, E> {
    pub fn new(relational: Arc<RelationalStore>, vector: Arc<V>, graph: Arc<G>, embedder: Arc<E>) -> Self {
        Self { relational, vector, graph, embedder }
    }

    pub async fn ingest_document(
        &self,
        project_id: &ProjectId,
        doc: &TranscriptDocument,
        split: &SplitConfig,
    ) -> IngestResult<IngestSummary> {
        let joined = join_consecutive_speakers(&doc.turns);
        let mut fragments = Vec::new();
        let mut par_idx = 0u32;
        for turn in &joined {
            for text in split_into_fragments(&turn.text, split) {
                let fragment_id = stable_hash(&doc.archivo, par_idx);
                fragments.push(Fragment {
                    fragment_id,
                    project_id: project_id.clone(),
                    archivo: doc.archivo.clone(),
                    par_idx,
                    speaker: turn.speaker.clone(),
                    char_len: text.chars().count() as u32,
                    text,
                    embedding: None,
                    metadata: doc.metadata.clone(),
                });
                par_idx += 1;
            }
        }

        if fragments.is_empty() {
            return Ok(IngestSummary {
                archivo: doc.archivo.clone(),
                fragments_created: 0,
                fragments_embedded: 0,
                partial: false,
                error: None,
            });
        }

        let texts: Vec<String> = fragments.iter().map(|f| f.text.clone()).collect();
        let embeddings = match self.embedder.embed_batch(&texts).await {
            Ok(vectors) => vectors,
            Err(e) => {
                tracing::error!(archivo = %doc.archivo, error = %e, "ingestion.embedding_batch_failed");
                return Ok(IngestSummary {
                    archivo: doc.archivo.clone(),
                    fragments_created: fragments.len(),
                    fragments_embedded: 0,
                    partial: true,
                    error: Some(e.to_string()),
                });
            }
        };
        for (fragment, vector) in fragments.iter_mut().zip(embeddings.iter()) {
            fragment.embedding = Some(vector.clone());
        }

        for fragment in &fragments {
            self.relational.insert_fragment(fragment)?;
        }

        let points: Vec<VectorPoint> = fragments
            .iter()
            .map(|f| VectorPoint {
                fragment_id: f.fragment_id.clone(),
                vector: f.embedding.clone().unwrap_or_default(),
                payload: VectorPayload {
                    project_id: project_id.clone(),
                    archivo: f.archivo.clone(),
                    par_idx: f.par_idx,
                    speaker: f.speaker.clone(),
                },
            })
            .collect();
        let vector = self.vector.clone();
        let write_one = move |batch: Vec<VectorPoint>| {
            let vector = vector.clone();
            async move { vector.upsert_batch(batch).await.map(|_| ()) }
        };
        split_on_fail_upsert(points, &write_one).await?;

        for fragment in &fragments {
            self.graph
                .merge_entrevista_fragmento(project_id, &doc.archivo, &fragment.fragment_id)
                .await?;
        }

        Ok(IngestSummary {
            archivo: doc.archivo.clone(),
            fragments_created: fragments.len(),
            fragments_embedded: fragments.len(),
            partial: false,
            error: None,
        })
    }

    pub async fn ingest_documents(
        &self,
        project_id: &ProjectId,
        docs: &[TranscriptDocument],
        split: &SplitConfig,
    ) -> IngestResult<(Vec<IngestSummary>, IngestTotals)> {
        let mut summaries = Vec::new();
        let mut totals = IngestTotals::default();
        for doc in docs {
            let summary = self.ingest_document(project_id, doc, split).await?;
            totals.documents += 1;
            totals.fragments_created += summary.fragments_created;
            totals.fragments_embedded += summary.fragments_embedded;
            if summary.partial {
                totals.partial_documents += 1;
            }
            summaries.push(summary);
        }
        Ok((summaries, totals))
    }

    /// Out-of-band check, never auto-repairing: a fragment is only "live"
    /// if present in both the relational and vector stores. Samples one
    /// embedded fragment's own vector to probe the vector store for the
    /// archivo's point count and any ids it holds that relational does not.
    pub async fn verify_consistency(&self, project_id: &ProjectId, archivo: &str) -> IngestResult<ConsistencyReport> {
        let relational_fragments = self.relational.list_fragments(project_id, Some(archivo))?;
        let filter = SearchFilter::for_project(project_id.clone())
            .without_speaker_filter()
            .for_archivo(archivo.to_string());

        let mut vector_count = 0usize;
        let mut orphans = 0usize;
        let mut probe_vector = None;
        for fragment in &relational_fragments {
            if let Some(v) = self.vector.get_vector(project_id, &fragment.fragment_id).await? {
                probe_vector = Some(v);
                break;
            }
        }
        if let Some(sample) = probe_vector {
            let limit = (relational_fragments.len().max(1)) * 4;
            let hits = self.vector.search(&sample, &filter, limit).await?;
            vector_count = hits.len();
            let relational_ids: std::collections::HashSet<&FragmentId> =
                relational_fragments.iter().map(|f| &f.fragment_id).collect();
            orphans = hits.iter().filter(|h| !relational_ids.contains(&h.fragment_id)).count();
        }

        Ok(ConsistencyReport {
            archivo: archivo.to_string(),
            relational_count: relational_fragments.len(),
            vector_count,
            orphans_in_vector: orphans,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::graph::InMemoryGraphStore;
    use crate::vector::InMemoryVectorStore;

    fn doc() -> TranscriptDocument {
        TranscriptDocument {
            archivo: "e01.txt".to_string(),
            turns: vec![
                Turn { speaker: Some("interviewer".to_string()), text: "Que paso el dia de la inundacion?".to_string() },
                Turn {
                    speaker: Some("participant".to_string()),
                    text: "Llego el pueblo entero a ayudar. Nadie se quedo en casa esa noche.".to_string(),
                },
            ],
            metadata: Default::default(),
        }
    }

    fn pipeline() -> IngestionPipeline<InMemoryVectorStore, InMemoryGraphStore, HashEmbedder> {
        IngestionPipeline::new(
            Arc::new(RelationalStore::open_in_memory().unwrap()),
            Arc::new(InMemoryVectorStore::new()),
            Arc::new(InMemoryGraphStore::new()),
            Arc::new(HashEmbedder::new(32)),
        )
    }

    #[tokio::test]
    async fn ingest_document_writes_all_three_stores() {
        let pipeline = pipeline();
        let project = ProjectId::from_string("p1");
        let summary = pipeline.ingest_document(&project, &doc(), &SplitConfig::default()).await.unwrap();
        assert!(!summary.partial);
        assert_eq!(summary.fragments_created, 2);
        assert_eq!(summary.fragments_embedded, 2);

        let fragments = pipeline.relational.list_fragments(&project, Some("e01.txt")).unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(pipeline.vector.point_count(&project), 2);

        let (nodes, _edges) = pipeline.graph.export_subgraph(&project).await.unwrap();
        assert!(!nodes.is_empty());
    }

    #[tokio::test]
    async fn stable_hash_is_deterministic() {
        assert_eq!(stable_hash("e01.txt", 3), stable_hash("e01.txt", 3));
        assert_ne!(stable_hash("e01.txt", 3), stable_hash("e01.txt", 4));
    }

    #[tokio::test]
    async fn empty_document_produces_empty_summary() {
        let pipeline = pipeline();
        let project = ProjectId::from_string("p1");
        let empty = TranscriptDocument { archivo: "empty.txt".to_string(), turns: vec![], metadata: Default::default() };
        let summary = pipeline.ingest_document(&project, &empty, &SplitConfig::default()).await.unwrap();
        assert_eq!(summary.fragments_created, 0);
        assert!(!summary.partial);
    }

    #[tokio::test]
    async fn verify_consistency_reports_matching_counts() {
        let pipeline = pipeline();
        let project = ProjectId::from_string("p1");
        pipeline.ingest_document(&project, &doc(), &SplitConfig::default()).await.unwrap();
        let report = pipeline.verify_consistency(&project, "e01.txt").await.unwrap();
        assert_eq!(report.relational_count, 2);
        assert_eq!(report.vector_count, 2);
        assert_eq!(report.orphans_in_vector, 0);
    }
}
