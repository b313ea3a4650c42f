//! C4 — Graph Store Adapter.
//!
//! Models the Neo4j-shaped projection in spec.md §3/§4.4: `Entrevista`,
//! `Fragmento`, `Codigo`, `Categoria` nodes and typed, `project_id`-carrying
//! edges. This `GraphStore` trait is new to this crate — distinct from the
//! teacher's own generic node/edge/context `plexus::storage::GraphStore` —
//! but follows the same trait-with-multiple-backends shape (an
//! always-available in-memory implementation plus a native one behind a
//! Cargo feature).

mod algorithm;
mod edge;
mod in_memory;
#[cfg(feature = "graph-native")]
mod neo4j;
mod node;

pub use algorithm::{run_algorithm_fallback, AlgorithmResult, GraphAlgorithm};
pub use edge::{EdgeType, GraphEdge};
pub use in_memory::InMemoryGraphStore;
#[cfg(feature = "graph-native")]
pub use neo4j::Neo4jGraphStore;
pub use node::{NodeLabel, NodeRef};

use crate::domain::{FragmentId, ProjectId, RelationType};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("graph backend unavailable: {0}")]
    Unavailable(String),
    #[error("constraint violation: {0}")]
    Constraint(String),
    #[error("unsupported relation type: {0}")]
    UnsupportedRelation(String),
}

pub type GraphResult<T> = Result<T, GraphError>;

/// A summary of nodes sharing more than one relation source, used by the
/// "multi-source overlap" read-only query named in spec.md §4.4.
#[derive(Debug, Clone)]
pub struct OverlapSummary {
    pub codigo: String,
    pub categories: Vec<String>,
}

/// A subgraph summary keyed by a node attribute value (e.g. all codes
/// under a given category), used by "subgraph-by-attribute" reads.
#[derive(Debug, Clone)]
pub struct AttributeSubgraph {
    pub attribute_value: String,
    pub nodes: Vec<NodeRef>,
    pub edges: Vec<GraphEdge>,
}

#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Ensure the composite-uniqueness constraints `(label, nombre|id,
    /// project_id)` exist. Idempotent; called before any write.
    async fn ensure_constraints(&self) -> GraphResult<()>;

    /// MERGE `Entrevista(nombre, project_id)` -[:CONTIENE {project_id}]->
    /// `Fragmento(id, project_id)`.
    async fn merge_entrevista_fragmento(
        &self,
        project_id: &ProjectId,
        archivo: &str,
        fragment_id: &FragmentId,
    ) -> GraphResult<()>;

    /// MERGE `Categoria` -[:REL {tipo, evidencia, memo, project_id}]->
    /// `Codigo`, both nodes scoped by `project_id`.
    async fn merge_category_code_relationship(
        &self,
        project_id: &ProjectId,
        categoria: &str,
        codigo: &str,
        tipo: RelationType,
        evidencia: &[FragmentId],
        memo: Option<&str>,
    ) -> GraphResult<()>;

    /// Remove a promoted code's projection: the `Fragmento`-[:CODIFICADO]->
    /// `Codigo` edge, scoped to the project, leaving the nodes themselves.
    async fn unassign_code_edge(
        &self,
        project_id: &ProjectId,
        fragment_id: &FragmentId,
        codigo: &str,
    ) -> GraphResult<()>;

    /// MERGE `Fragmento`-[:CODIFICADO {project_id}]->`Codigo`, both
    /// project-scoped.
    async fn merge_fragment_code(
        &self,
        project_id: &ProjectId,
        fragment_id: &FragmentId,
        codigo: &str,
    ) -> GraphResult<()>;

    async fn multi_source_overlap(&self, project_id: &ProjectId) -> GraphResult<Vec<OverlapSummary>>;

    async fn subgraph_by_category(&self, project_id: &ProjectId, categoria: &str) -> GraphResult<AttributeSubgraph>;

    /// Recognise and remove legacy edges with `origen='descubierta'` that
    /// have no backing ledger row — `sweep_discovered_only_edges` in
    /// spec.md §4.4's "discovered-only" migration note.
    async fn sweep_discovered_only_edges(&self, project_id: &ProjectId, backed_pairs: &[(FragmentId, String)]) -> GraphResult<usize>;

    /// Fetch the project-scoped subgraph as (nodes, edges) for algorithm
    /// execution, used by the in-memory fallback engine and by
    /// `run_algorithm_fallback`.
    async fn export_subgraph(&self, project_id: &ProjectId) -> GraphResult<(Vec<NodeRef>, Vec<GraphEdge>)>;

    /// Persist algorithm results as node properties
    /// (`score_centralidad`/`community_id`), filtered by `project_id` on
    /// both source and target.
    async fn persist_node_scores(&self, project_id: &ProjectId, scores: &[(NodeRef, f64)], property: &str) -> GraphResult<()>;

    /// True when this backend can run algorithms natively (GDS/MAGE);
    /// false routes `run_algorithm` to the in-memory fallback engine.
    fn supports_native_algorithms(&self) -> bool {
        false
    }

    async fn run_native_algorithm(
        &self,
        _project_id: &ProjectId,
        _algorithm: GraphAlgorithm,
    ) -> GraphResult<AlgorithmResult> {
        Err(GraphError::Unavailable("native algorithm engine not configured".to_string()))
    }
}

/// `run_graph_analysis`: dispatch to the backend's native engine when
/// available, else the in-memory fallback over the exported subgraph.
pub async fn run_algorithm<S: GraphStore + ?Sized>(
    store: &S,
    project_id: &ProjectId,
    algorithm: GraphAlgorithm,
    persist: bool,
) -> GraphResult<AlgorithmResult> {
    let result = if store.supports_native_algorithms() {
        store.run_native_algorithm(project_id, algorithm).await?
    } else {
        let (nodes, edges) = store.export_subgraph(project_id).await?;
        run_algorithm_fallback(&nodes, &edges, algorithm)
    };
    if persist {
        let property = match algorithm {
            GraphAlgorithm::Louvain | GraphAlgorithm::Leiden => "community_id",
            GraphAlgorithm::Pagerank | GraphAlgorithm::Betweenness => "score_centralidad",
        };
        store.persist_node_scores(project_id, &result.scores, property).await?;
    }
    Ok(result)
}
