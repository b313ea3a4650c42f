//! C6 — Hybrid Retrieval.
//!
//! `search` is spec.md §4.6's fusion query: embed the query text, kNN over
//! the project (widened to `max(3*top_k, 10)` and retried once without the
//! speaker filter if the first pass is empty), BM25 lexical rank over the
//! same candidate pool via C2's FTS5 index, then
//! `final = (1-w)*semantic + w*bm25`.

use crate::domain::{FragmentId, ProjectId};
use crate::embedding::{Embedder, EmbeddingError};
use crate::relational::{RelationalError, RelationalStore};
use crate::vector::{SearchFilter, VectorError, VectorStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Relational(#[from] RelationalError),
    #[error(transparent)]
    Vector(#[from] VectorError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

pub type RetrievalResult<T> = Result<T, RetrievalError>;

#[derive(Debug, Clone)]
pub struct RetrievalHit {
    pub fragment_id: FragmentId,
    pub archivo: String,
    pub par_idx: u32,
    pub semantic_score: f32,
    pub bm25_score: Option<f32>,
    pub final_score: f32,
}

#[derive(Debug, Clone)]
pub struct SearchParams {
    pub query: String,
    pub top_k: usize,
    pub project_id: ProjectId,
    pub use_hybrid: bool,
    pub bm25_weight: f32,
    pub score_threshold: Option<f32>,
}

pub struct HybridRetriever<V: VectorStore, E: Embedder> {
    relational: Arc<RelationalStore>,
    vector: Arc<V>,
    embedder: Arc<E>,
}

impl<V: VectorStore, E: Embedder> HybridRetriever<V, E> {
    pub fn new(relational: Arc<RelationalStore>, vector: Arc<V>, embedder: Arc<E>) -> Self {
        Self { relational, vector, embedder }
    }

    pub async fn search(&self, params: SearchParams) -> RetrievalResult<Vec<RetrievalHit>> {
        if params.top_k == 0 {
            return Ok(Vec::new());
        }
        let query_vector = self.embedder.embed_one(&params.query).await?;
        let limit = (3 * params.top_k).max(10);

        let mut filter = SearchFilter::for_project(params.project_id.clone());
        let had_speaker_filter = !filter.exclude_speakers.is_empty();
        let mut hits = self.vector.search(&query_vector, &filter, limit).await?;
        if hits.is_empty() && had_speaker_filter {
            filter = filter.without_speaker_filter();
            hits = self.vector.search(&query_vector, &filter, limit).await?;
        }

        let mut results: Vec<RetrievalHit> = hits
            .into_iter()
            .map(|h| RetrievalHit {
                fragment_id: h.fragment_id,
                archivo: h.payload.archivo,
                par_idx: h.payload.par_idx,
                semantic_score: h.score,
                bm25_score: None,
                final_score: h.score,
            })
            .collect();

        if params.use_hybrid && !results.is_empty() {
            let lexical = self.relational.lexical_search(&params.project_id, &params.query, limit)?;
            let pool: HashSet<&FragmentId> = results.iter().map(|r| &r.fragment_id).collect();
            let raw: HashMap<FragmentId, f64> =
                lexical.into_iter().filter(|(id, _)| pool.contains(id)).collect();
            let max_rank = raw.values().fold(0.0f64, |acc, r| acc.max(r.abs()));
            for hit in results.iter_mut() {
                if let Some(rank) = raw.get(&hit.fragment_id) {
                    let normalized = if max_rank > 0.0 {
                        (1.0 - (rank.abs() / max_rank)).clamp(0.0, 1.0) as f32
                    } else {
                        0.0
                    };
                    hit.bm25_score = Some(normalized);
                    hit.final_score = (1.0 - params.bm25_weight) * hit.semantic_score + params.bm25_weight * normalized;
                }
            }
        }

        results.sort_by(|a, b| b.final_score.partial_cmp(&a.final_score).unwrap_or(std::cmp::Ordering::Equal));
        if let Some(threshold) = params.score_threshold {
            results.retain(|r| r.final_score >= threshold);
        }
        results.truncate(params.top_k);
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Fragment;
    use crate::embedding::HashEmbedder;
    use crate::vector::{InMemoryVectorStore, VectorPayload, VectorPoint};

    fn fragment(archivo: &str, par_idx: u32, text: &str, speaker: Option<&str>) -> Fragment {
        Fragment {
            fragment_id: FragmentId::from_string(format!("{archivo}-{par_idx}")),
            project_id: ProjectId::from_string("p1"),
            archivo: archivo.to_string(),
            par_idx,
            speaker: speaker.map(str::to_string),
            char_len: text.chars().count() as u32,
            text: text.to_string(),
            embedding: None,
            metadata: Default::default(),
        }
    }

    async fn index(relational: &RelationalStore, vector: &InMemoryVectorStore, embedder: &HashEmbedder, f: &Fragment) {
        relational.insert_fragment(f).unwrap();
        let v = embedder.embed_one(&f.text).await.unwrap();
        vector
            .upsert_batch(vec![VectorPoint {
                fragment_id: f.fragment_id.clone(),
                vector: v,
                payload: VectorPayload {
                    project_id: f.project_id.clone(),
                    archivo: f.archivo.clone(),
                    par_idx: f.par_idx,
                    speaker: f.speaker.clone(),
                },
            }])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn empty_project_returns_no_hits() {
        let relational = Arc::new(RelationalStore::open_in_memory().unwrap());
        let vector = Arc::new(InMemoryVectorStore::new());
        let embedder = Arc::new(HashEmbedder::new(32));
        let retriever = HybridRetriever::new(relational, vector, embedder);
        let hits = retriever
            .search(SearchParams {
                query: "pueblo entero".to_string(),
                top_k: 3,
                project_id: ProjectId::from_string("p1"),
                use_hybrid: true,
                bm25_weight: 0.35,
                score_threshold: None,
            })
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn retries_without_speaker_filter_when_only_match_is_an_interviewer_turn() {
        let relational = Arc::new(RelationalStore::open_in_memory().unwrap());
        let vector = Arc::new(InMemoryVectorStore::new());
        let embedder = Arc::new(HashEmbedder::new(32));
        let f = fragment("e01.txt", 0, "testimonio exclusivo del entrevistador sobre el caso", Some("interviewer"));
        index(&relational, &vector, &embedder, &f).await;

        let retriever = HybridRetriever::new(relational, vector, embedder);
        let hits = retriever
            .search(SearchParams {
                query: f.text.clone(),
                top_k: 3,
                project_id: f.project_id.clone(),
                use_hybrid: false,
                bm25_weight: 0.35,
                score_threshold: None,
            })
            .await
            .unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fragment_id, f.fragment_id);
    }

    #[tokio::test]
    async fn hybrid_fusion_blends_lexical_and_semantic_scores() {
        let relational = Arc::new(RelationalStore::open_in_memory().unwrap());
        let vector = Arc::new(InMemoryVectorStore::new());
        let embedder = Arc::new(HashEmbedder::new(32));
        let exact = fragment("e01.txt", 0, "llego el pueblo entero a ayudar", Some("participant"));
        let other = fragment("e01.txt", 1, "el presupuesto municipal crecio este anio", Some("participant"));
        index(&relational, &vector, &embedder, &exact).await;
        index(&relational, &vector, &embedder, &other).await;

        let retriever = HybridRetriever::new(relational, vector, embedder);
        let hits = retriever
            .search(SearchParams {
                query: "pueblo entero".to_string(),
                top_k: 2,
                project_id: exact.project_id.clone(),
                use_hybrid: true,
                bm25_weight: 0.35,
                score_threshold: None,
            })
            .await
            .unwrap();
        assert_eq!(hits[0].fragment_id, exact.fragment_id);
        assert!(hits[0].bm25_score.is_some());
    }

    #[tokio::test]
    async fn score_threshold_drops_weak_matches() {
        let relational = Arc::new(RelationalStore::open_in_memory().unwrap());
        let vector = Arc::new(InMemoryVectorStore::new());
        let embedder = Arc::new(HashEmbedder::new(32));
        let f = fragment("e01.txt", 0, "llego el pueblo entero a ayudar", Some("participant"));
        index(&relational, &vector, &embedder, &f).await;

        let retriever = HybridRetriever::new(relational, vector, embedder);
        let hits = retriever
            .search(SearchParams {
                query: "tema completamente distinto sin relacion".to_string(),
                top_k: 3,
                project_id: f.project_id.clone(),
                use_hybrid: false,
                bm25_weight: 0.35,
                score_threshold: Some(0.9),
            })
            .await
            .unwrap();
        assert!(hits.is_empty());
    }
}
