//! C7 — Candidate Ledger & Coding Ops.
//!
//! The five operations of spec.md §4.7, transcribed from
//! `original_source/app/coding.py`: `assign_open_code`/`unassign_open_code`
//! (direct ledger + graph writes, never touching the promoted table for
//! assignment), `suggest_similar_fragments`/`find_similar_codes` (both
//! consume C3's kNN, grounded on `suggest_similar_fragments`/
//! `find_similar_codes` in `coding.py`), and `list_available_interviews`'s
//! theoretical-sampling ranking (`_order_interviews_theoretical_sampling_with_debug`).

mod sampling;

pub use sampling::{InterviewOrder, InterviewScoreDebug, RankedInterview};

use crate::domain::{
    CandidateCode, CandidateId, CandidateStatus, FragmentId, ProjectId, SourceOrigin,
};
use crate::graph::GraphStore;
use crate::llm::{LlmError, LlmGateway};
use crate::relational::{AuditEntry, RelationalError, RelationalStore};
use crate::vector::{SearchFilter, VectorError, VectorStore};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Relational(#[from] RelationalError),
    #[error(transparent)]
    Vector(#[from] VectorError),
    #[error(transparent)]
    Graph(#[from] crate::graph::GraphError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("fragment '{0}' not found")]
    FragmentNotFound(String),
    #[error("fragment '{0}' has no stored embedding")]
    NoEmbedding(String),
    #[error("code '{0}' has no evidence fragments")]
    CodeHasNoEvidence(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

#[derive(Debug, Clone)]
pub struct SimilarFragmentHit {
    pub fragment_id: FragmentId,
    pub score: f32,
    pub archivo: String,
    pub par_idx: u32,
}

#[derive(Debug, Clone)]
pub struct SimilarFragmentsResult {
    pub suggestions: Vec<SimilarFragmentHit>,
    pub comparison_memo: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SimilarCode {
    pub codigo: String,
    pub score: f32,
    pub occurrences: u32,
}

pub struct CandidateLedger<V: VectorStore, G: GraphStore> {
    relational: Arc<RelationalStore>,
    vector: Arc<V>,
    graph: Arc<G>,
    llm: Option<Arc<LlmGateway>>,
}

impl<V: VectorStore, G: GraphStore> CandidateLedger<V, G> {
    pub fn new(relational: Arc<RelationalStore>, vector: Arc<V>, graph: Arc<G>, llm: Option<Arc<LlmGateway>>) -> Self {
        Self {
            relational,
            vector,
            graph,
            llm,
        }
    }

    /// Never writes the promoted open-codes table directly: inserts a
    /// `manual`-origin candidate at full confidence, leaving the usual
    /// promotion step (`RelationalStore::promote`) to commit it.
    pub async fn assign_open_code(
        &self,
        project_id: &ProjectId,
        fragment_id: &FragmentId,
        codigo: &str,
        cita: &str,
        archivo: &str,
    ) -> LedgerResult<CandidateCode> {
        let candidate = CandidateCode {
            id: CandidateId::new(),
            project_id: project_id.clone(),
            codigo: codigo.to_string(),
            fragment_id: Some(fragment_id.clone()),
            archivo: archivo.to_string(),
            cita: cita.to_string(),
            source_origin: SourceOrigin::Manual,
            score_confidence: 1.0,
            status: CandidateStatus::Pendiente,
            memo: None,
            created_at: chrono::Utc::now(),
            promoted_at: None,
        };
        self.relational.insert_candidates(&[candidate.clone()])?;
        Ok(candidate)
    }

    /// Deletes the promoted row and its graph edge, and records an audit
    /// entry — mirrors the original's two-store unassign.
    pub async fn unassign_open_code(&self, project_id: &ProjectId, fragment_id: &FragmentId, codigo: &str, actor: &str) -> LedgerResult<()> {
        self.relational.delete_open_code(project_id, fragment_id, codigo)?;
        self.graph.unassign_code_edge(project_id, fragment_id, codigo).await?;
        self.relational.record_audit(
            project_id,
            &AuditEntry {
                actor: actor.to_string(),
                action: "unassign".to_string(),
                entity: format!("{}::{}", fragment_id.as_str(), codigo),
                before: None,
                after: None,
            },
        )?;
        Ok(())
    }

    /// kNN over the source fragment's own embedding, excluding itself and
    /// (optionally, via `request_memo`) asking the LLM Gateway for a short
    /// comparison memo.
    pub async fn suggest_similar_fragments(
        &self,
        project_id: &ProjectId,
        fragment_id: &FragmentId,
        top_k: usize,
        request_memo: bool,
    ) -> LedgerResult<SimilarFragmentsResult> {
        let fragment = self
            .relational
            .get_fragment(fragment_id)?
            .ok_or_else(|| LedgerError::FragmentNotFound(fragment_id.to_string()))?;
        let vector = self
            .vector
            .get_vector(project_id, fragment_id)
            .await?
            .ok_or_else(|| LedgerError::NoEmbedding(fragment_id.to_string()))?;

        let filter = SearchFilter::for_project(project_id.clone()).without_speaker_filter();
        let hits = self.vector.search(&vector, &filter, top_k + 1).await?;
        let suggestions: Vec<SimilarFragmentHit> = hits
            .into_iter()
            .filter(|h| &h.fragment_id != fragment_id)
            .take(top_k)
            .map(|h| SimilarFragmentHit {
                fragment_id: h.fragment_id,
                score: h.score,
                archivo: h.payload.archivo,
                par_idx: h.payload.par_idx,
            })
            .collect();

        let comparison_memo = if request_memo && !suggestions.is_empty() {
            if let Some(llm) = &self.llm {
                let system = "You compare qualitative-coding fragments and write a short comparison memo.";
                let user = format!(
                    "Seed fragment: {}\nCandidate fragments: {}\nWrite a <=400-token comparison memo as JSON {{\"memo\": \"...\"}}.",
                    fragment.text,
                    suggestions.iter().map(|s| s.fragment_id.to_string()).collect::<Vec<_>>().join(", ")
                );
                match llm.chat_json(system, &user, "mini", &["memo"]).await {
                    Ok(obj) => obj.get("memo").and_then(|v| v.as_str()).map(str::to_string),
                    Err(_) => None,
                }
            } else {
                None
            }
        } else {
            None
        };

        Ok(SimilarFragmentsResult { suggestions, comparison_memo })
    }

    /// Take one evidence fragment's embedding for `codigo`, kNN for ~50
    /// neighbours, look up their codes, exclude the source code, rank by
    /// average neighbour score.
    pub async fn find_similar_codes(&self, project_id: &ProjectId, codigo: &str, top_k: usize) -> LedgerResult<Vec<SimilarCode>> {
        let evidence = self.relational.fragments_coded_with(project_id, codigo)?;
        let Some(seed_id) = evidence.first() else {
            return Err(LedgerError::CodeHasNoEvidence(codigo.to_string()));
        };
        if self.relational.get_fragment(seed_id)?.is_none() {
            return Err(LedgerError::FragmentNotFound(seed_id.to_string()));
        }
        let Some(vector) = self.vector.get_vector(project_id, seed_id).await? else {
            return Err(LedgerError::NoEmbedding(seed_id.to_string()));
        };

        let filter = SearchFilter::for_project(project_id.clone()).without_speaker_filter();
        let hits = self.vector.search(&vector, &filter, 50).await?;

        let mut scores: HashMap<String, Vec<f32>> = HashMap::new();
        for hit in hits {
            if evidence.contains(&hit.fragment_id) {
                continue;
            }
            let codes = self.relational.codes_for_fragment(project_id, &hit.fragment_id)?;
            for other in codes {
                if other == codigo {
                    continue;
                }
                scores.entry(other).or_default().push(hit.score);
            }
        }

        let mut results: Vec<SimilarCode> = scores
            .into_iter()
            .map(|(codigo, scores)| {
                let occurrences = scores.len() as u32;
                let avg = scores.iter().sum::<f32>() / occurrences as f32;
                SimilarCode { codigo, score: avg, occurrences }
            })
            .collect();
        results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(top_k);
        Ok(results)
    }

    pub fn list_available_interviews(
        &self,
        project_id: &ProjectId,
        order: InterviewOrder,
        limit: usize,
        analyzed_archivos: &[String],
        include_analyzed: bool,
        saturated: bool,
        focus_mode_active: bool,
    ) -> LedgerResult<(Vec<RankedInterview>, Vec<InterviewScoreDebug>)> {
        let summaries = self.relational.archivo_summaries(project_id)?;
        Ok(sampling::rank_interviews(
            summaries,
            order,
            limit,
            analyzed_archivos,
            include_analyzed,
            saturated,
            focus_mode_active,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Fragment;
    use crate::graph::InMemoryGraphStore;
    use crate::vector::InMemoryVectorStore;

    fn fragment(project: &str, archivo: &str, par_idx: u32, text: &str, embedding: Vec<f32>) -> Fragment {
        Fragment {
            fragment_id: FragmentId::new(),
            project_id: ProjectId::from_string(project),
            archivo: archivo.to_string(),
            par_idx,
            speaker: Some("participant".to_string()),
            char_len: text.chars().count() as u32,
            text: text.to_string(),
            embedding: Some(embedding),
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn assign_open_code_inserts_pending_manual_candidate() {
        let relational = Arc::new(RelationalStore::open_in_memory().unwrap());
        let vector = Arc::new(InMemoryVectorStore::new());
        let graph = Arc::new(InMemoryGraphStore::new());
        let ledger = CandidateLedger::new(relational.clone(), vector, graph, None);
        let project = ProjectId::from_string("p1");
        let f = fragment("p1", "e01.txt", 0, "texto", vec![1.0, 0.0]);
        relational.insert_fragment(&f).unwrap();

        let candidate = ledger
            .assign_open_code(&project, &f.fragment_id, "fatiga", "texto", "e01.txt")
            .await
            .unwrap();
        assert_eq!(candidate.source_origin, SourceOrigin::Manual);
        assert_eq!(candidate.score_confidence, 1.0);
        assert_eq!(relational.count_pending(&project).unwrap(), 1);
    }

    #[tokio::test]
    async fn unassign_removes_promoted_row_and_graph_edge() {
        let relational = Arc::new(RelationalStore::open_in_memory().unwrap());
        let vector = Arc::new(InMemoryVectorStore::new());
        let graph = Arc::new(InMemoryGraphStore::new());
        let ledger = CandidateLedger::new(relational.clone(), vector, graph.clone(), None);
        let project = ProjectId::from_string("p1");
        let f = fragment("p1", "e01.txt", 0, "texto", vec![1.0, 0.0]);
        relational.insert_fragment(&f).unwrap();
        graph.merge_fragment_code(&project, &f.fragment_id, "fatiga").await.unwrap();

        ledger.unassign_open_code(&project, &f.fragment_id, "fatiga", "tester").await.unwrap();
        let (_, edges) = graph.export_subgraph(&project).await.unwrap();
        assert!(edges.is_empty());
    }

    #[tokio::test]
    async fn suggest_similar_fragments_excludes_the_seed_itself() {
        let relational = Arc::new(RelationalStore::open_in_memory().unwrap());
        let vector = Arc::new(InMemoryVectorStore::new());
        let graph = Arc::new(InMemoryGraphStore::new());
        let project = ProjectId::from_string("p1");
        let seed = fragment("p1", "e01.txt", 0, "seed", vec![1.0, 0.0]);
        let other = fragment("p1", "e01.txt", 1, "other", vec![0.9, 0.1]);
        relational.insert_fragment(&seed).unwrap();
        relational.insert_fragment(&other).unwrap();
        vector
            .upsert_batch(vec![
                crate::vector::VectorPoint {
                    fragment_id: seed.fragment_id.clone(),
                    vector: seed.embedding.clone().unwrap(),
                    payload: crate::vector::VectorPayload {
                        project_id: project.clone(),
                        archivo: "e01.txt".to_string(),
                        par_idx: 0,
                        speaker: Some("participant".to_string()),
                    },
                },
                crate::vector::VectorPoint {
                    fragment_id: other.fragment_id.clone(),
                    vector: other.embedding.clone().unwrap(),
                    payload: crate::vector::VectorPayload {
                        project_id: project.clone(),
                        archivo: "e01.txt".to_string(),
                        par_idx: 1,
                        speaker: Some("participant".to_string()),
                    },
                },
            ])
            .await
            .unwrap();

        let ledger = CandidateLedger::new(relational, vector, graph, None);
        let result = ledger.suggest_similar_fragments(&project, &seed.fragment_id, 5, false).await.unwrap();
        assert!(result.suggestions.iter().all(|s| s.fragment_id != seed.fragment_id));
        assert!(result.suggestions.iter().any(|s| s.fragment_id == other.fragment_id));
    }
}
