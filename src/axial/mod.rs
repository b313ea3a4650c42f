//! C8 — Axial Engine.
//!
//! `assign_axial_relation` is transcribed from
//! `original_source/app/axial.py::assign_axial_relation` and
//! `_validate_evidence`: relation-type membership check, ≥2 distinct
//! evidence ids, existence check, coded-with-target-code check, in that
//! order — each a distinct `AxialError` variant so the blocking reasons are
//! individually inspectable. `run_graph_analysis` delegates straight to C4.

use crate::domain::{AxialRelation, FragmentId, ProjectId, RelationType};
use crate::graph::{run_algorithm, AlgorithmResult, GraphAlgorithm, GraphError, GraphStore};
use crate::relational::{RelationalError, RelationalStore};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AxialError {
    #[error(transparent)]
    Relational(#[from] RelationalError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    /// The CLI/API-level "not ready" classification: every reason that
    /// blocked this assignment, collected rather than short-circuited on
    /// the first failure, so a caller can report them all at once.
    #[error("axial relation is not ready: {blocking_reasons:?}")]
    NotReady { blocking_reasons: Vec<String> },
}

pub type AxialResult<T> = Result<T, AxialError>;

fn dedup_preserving_order(ids: &[FragmentId]) -> Vec<FragmentId> {
    let mut seen = std::collections::HashSet::new();
    let mut out = Vec::new();
    for id in ids {
        if seen.insert(id.clone()) {
            out.push(id.clone());
        }
    }
    out
}

pub struct AxialEngine<G: GraphStore> {
    relational: Arc<RelationalStore>,
    graph: Arc<G>,
}

impl<G: GraphStore> AxialEngine<G> {
    pub fn new(relational: Arc<RelationalStore>, graph: Arc<G>) -> Self {
        Self { relational, graph }
    }

    /// Validates evidence (≥2 distinct ids, each existing and coded with
    /// `codigo`), writes the relational ledger row, then upserts the graph
    /// projection. Relational is the canonical write: a graph-write failure
    /// is logged and retryable but does not roll back the relational row.
    pub async fn assign_axial_relation(
        &self,
        project_id: &ProjectId,
        categoria: &str,
        codigo: &str,
        tipo: RelationType,
        evidencia: &[FragmentId],
        memo: Option<&str>,
    ) -> AxialResult<AxialRelation> {
        let mut blocking_reasons = Vec::new();

        let unique = dedup_preserving_order(evidencia);
        if unique.len() < 2 {
            blocking_reasons.push("se requieren al menos dos fragmentos unicos en la evidencia".to_string());
        }

        let mut missing = Vec::new();
        let mut not_coded = Vec::new();
        if !unique.is_empty() {
            let coded_with_target = self.relational.fragments_coded_with(project_id, codigo)?;
            let coded_set: std::collections::HashSet<&FragmentId> = coded_with_target.iter().collect();
            for id in &unique {
                match self.relational.get_fragment(id)? {
                    None => missing.push(id.to_string()),
                    Some(_) if !coded_set.contains(id) => not_coded.push(id.to_string()),
                    Some(_) => {}
                }
            }
        }
        if !missing.is_empty() {
            blocking_reasons.push(format!("fragmentos inexistentes: {}", missing.join(", ")));
        }
        if !not_coded.is_empty() {
            blocking_reasons.push(format!(
                "fragmentos no codificados con '{codigo}': {}",
                not_coded.join(", ")
            ));
        }

        if !blocking_reasons.is_empty() {
            return Err(AxialError::NotReady { blocking_reasons });
        }

        let relation = AxialRelation {
            project_id: project_id.clone(),
            category: categoria.to_string(),
            codigo: codigo.to_string(),
            relation_type: tipo,
            evidence_fragment_ids: unique.clone(),
            created_at: chrono::Utc::now(),
        };
        self.relational.insert_axial_relation(&relation)?;

        if let Err(e) = self
            .graph
            .merge_category_code_relationship(project_id, categoria, codigo, tipo, &unique, memo)
            .await
        {
            tracing::warn!(error = %e, categoria, codigo, "axial.graph_write_failed_retryable");
        }

        Ok(relation)
    }

    /// Delegates straight to C4; never mixes projects, persists only as
    /// node properties.
    pub async fn run_graph_analysis(&self, project_id: &ProjectId, algorithm: GraphAlgorithm, persist: bool) -> AxialResult<AlgorithmResult> {
        run_algorithm(self.graph.as_ref(), project_id, algorithm, persist)
            .await
            .map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Fragment;
    use crate::graph::InMemoryGraphStore;

    fn fragment(project: &str, archivo: &str, par_idx: u32) -> Fragment {
        Fragment {
            fragment_id: FragmentId::new(),
            project_id: ProjectId::from_string(project),
            archivo: archivo.to_string(),
            par_idx,
            speaker: Some("participant".to_string()),
            char_len: 4,
            text: "text".to_string(),
            embedding: None,
            metadata: Default::default(),
        }
    }

    #[tokio::test]
    async fn rejects_fewer_than_two_unique_evidence_ids() {
        let relational = Arc::new(RelationalStore::open_in_memory().unwrap());
        let graph = Arc::new(InMemoryGraphStore::new());
        let engine = AxialEngine::new(relational, graph);
        let project = ProjectId::from_string("p1");
        let f = FragmentId::new();

        let err = engine
            .assign_axial_relation(&project, "Infra", "fatiga", RelationType::Causa, &[f.clone(), f], None)
            .await
            .unwrap_err();
        assert!(matches!(err, AxialError::NotReady { .. }));
    }

    #[tokio::test]
    async fn rejects_evidence_not_coded_with_target_code() {
        let relational = Arc::new(RelationalStore::open_in_memory().unwrap());
        let graph = Arc::new(InMemoryGraphStore::new());
        let project = ProjectId::from_string("p1");
        let f1 = fragment("p1", "e01.txt", 0);
        let f2 = fragment("p1", "e01.txt", 1);
        relational.insert_fragment(&f1).unwrap();
        relational.insert_fragment(&f2).unwrap();

        let engine = AxialEngine::new(relational, graph);
        let err = engine
            .assign_axial_relation(
                &project,
                "Infra",
                "fatiga",
                RelationType::Causa,
                &[f1.fragment_id, f2.fragment_id],
                None,
            )
            .await
            .unwrap_err();
        match err {
            AxialError::NotReady { blocking_reasons } => {
                assert!(blocking_reasons.iter().any(|r| r.contains("no codificados")));
            }
            other => panic!("expected NotReady, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn succeeds_when_evidence_exists_and_is_coded() {
        let relational = Arc::new(RelationalStore::open_in_memory().unwrap());
        let graph = Arc::new(InMemoryGraphStore::new());
        let project = ProjectId::from_string("p1");
        let f1 = fragment("p1", "e01.txt", 0);
        let f2 = fragment("p1", "e01.txt", 1);
        relational.insert_fragment(&f1).unwrap();
        relational.insert_fragment(&f2).unwrap();
        let candidate = crate::domain::CandidateCode {
            id: crate::domain::CandidateId::new(),
            project_id: project.clone(),
            codigo: "fatiga".to_string(),
            fragment_id: Some(f1.fragment_id.clone()),
            archivo: "e01.txt".to_string(),
            cita: "texto".to_string(),
            source_origin: crate::domain::SourceOrigin::Manual,
            score_confidence: 1.0,
            status: crate::domain::CandidateStatus::Pendiente,
            memo: None,
            created_at: chrono::Utc::now(),
            promoted_at: None,
        };
        relational.insert_candidates(&[candidate.clone()]).unwrap();
        relational.promote(&candidate.id).unwrap();
        let candidate2 = crate::domain::CandidateCode {
            id: crate::domain::CandidateId::new(),
            fragment_id: Some(f2.fragment_id.clone()),
            ..candidate
        };
        relational.insert_candidates(&[candidate2.clone()]).unwrap();
        relational.promote(&candidate2.id).unwrap();

        let engine = AxialEngine::new(relational, graph);
        let relation = engine
            .assign_axial_relation(
                &project,
                "Infra",
                "fatiga",
                RelationType::Causa,
                &[f1.fragment_id, f2.fragment_id],
                Some("memo"),
            )
            .await
            .unwrap();
        assert_eq!(relation.evidence_fragment_ids.len(), 2);
    }
}
