//! `InMemoryGraphStore` — `petgraph`-backed graph store, the default graph
//! backend and the always-available algorithm-fallback engine.

use super::{
    AttributeSubgraph, EdgeType, GraphEdge, GraphResult, GraphStore, NodeLabel, NodeRef, OverlapSummary,
};
use crate::domain::{FragmentId, ProjectId, RelationType};
use async_trait::async_trait;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Default)]
struct Inner {
    graph: StableGraph<NodeRef, GraphEdge>,
    index: HashMap<NodeRef, NodeIndex>,
}

impl Inner {
    fn node_index(&mut self, node: NodeRef) -> NodeIndex {
        if let Some(&idx) = self.index.get(&node) {
            return idx;
        }
        let idx = self.graph.add_node(node.clone());
        self.index.insert(node, idx);
        idx
    }
}

/// `petgraph::stable_graph`-backed store, scoped entirely in-process.
/// Every write re-derives the composite key so no single-attribute
/// uniqueness constraint is ever relied on.
pub struct InMemoryGraphStore {
    inner: RwLock<Inner>,
}

impl InMemoryGraphStore {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    fn upsert_edge(&self, project_id: &ProjectId, src: NodeRef, dst: NodeRef, edge_type: EdgeType, evidencia: Vec<FragmentId>, memo: Option<String>) {
        let mut inner = self.inner.write().unwrap();
        let src_idx = inner.node_index(src.clone());
        let dst_idx = inner.node_index(dst.clone());
        // Remove any existing edge of the same type between these nodes so
        // repeated MERGEs stay idempotent rather than accumulating parallels.
        let existing: Vec<_> = inner
            .graph
            .edges_connecting(src_idx, dst_idx)
            .filter(|e| e.weight().edge_type == edge_type)
            .map(|e| e.id())
            .collect();
        for id in existing {
            inner.graph.remove_edge(id);
        }
        inner.graph.add_edge(
            src_idx,
            dst_idx,
            GraphEdge {
                project_id: project_id.clone(),
                src,
                dst,
                edge_type,
                evidencia,
                memo,
                origen: None,
            },
        );
    }
}

impl Default for InMemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphStore for InMemoryGraphStore {
    async fn ensure_constraints(&self) -> GraphResult<()> {
        // Composite uniqueness is structural here: `NodeRef` equality
        // already is `(label, key, project_id)`, and `node_index` dedupes
        // on it, so there is nothing further to create.
        Ok(())
    }

    async fn merge_entrevista_fragmento(
        &self,
        project_id: &ProjectId,
        archivo: &str,
        fragment_id: &FragmentId,
    ) -> GraphResult<()> {
        let entrevista = NodeRef::new(NodeLabel::Entrevista, archivo, project_id.clone());
        let fragmento = NodeRef::new(NodeLabel::Fragmento, fragment_id.as_str(), project_id.clone());
        self.upsert_edge(project_id, entrevista, fragmento, EdgeType::Contiene, vec![], None);
        Ok(())
    }

    async fn merge_category_code_relationship(
        &self,
        project_id: &ProjectId,
        categoria: &str,
        codigo: &str,
        tipo: RelationType,
        evidencia: &[FragmentId],
        memo: Option<&str>,
    ) -> GraphResult<()> {
        let categoria_node = NodeRef::new(NodeLabel::Categoria, categoria, project_id.clone());
        let codigo_node = NodeRef::new(NodeLabel::Codigo, codigo, project_id.clone());
        self.upsert_edge(
            project_id,
            categoria_node,
            codigo_node,
            EdgeType::Axial(tipo),
            evidencia.to_vec(),
            memo.map(|m| m.to_string()),
        );
        Ok(())
    }

    async fn unassign_code_edge(&self, project_id: &ProjectId, fragment_id: &FragmentId, codigo: &str) -> GraphResult<()> {
        let mut inner = self.inner.write().unwrap();
        let fragmento = NodeRef::new(NodeLabel::Fragmento, fragment_id.as_str(), project_id.clone());
        let codigo_node = NodeRef::new(NodeLabel::Codigo, codigo, project_id.clone());
        let (Some(&src_idx), Some(&dst_idx)) = (inner.index.get(&fragmento), inner.index.get(&codigo_node)) else {
            return Ok(());
        };
        let existing: Vec<_> = inner
            .graph
            .edges_connecting(src_idx, dst_idx)
            .filter(|e| e.weight().edge_type == EdgeType::Codificado)
            .map(|e| e.id())
            .collect();
        for id in existing {
            inner.graph.remove_edge(id);
        }
        Ok(())
    }

    async fn merge_fragment_code(&self, project_id: &ProjectId, fragment_id: &FragmentId, codigo: &str) -> GraphResult<()> {
        let fragmento = NodeRef::new(NodeLabel::Fragmento, fragment_id.as_str(), project_id.clone());
        let codigo_node = NodeRef::new(NodeLabel::Codigo, codigo, project_id.clone());
        self.upsert_edge(project_id, fragmento, codigo_node, EdgeType::Codificado, vec![], None);
        Ok(())
    }

    async fn multi_source_overlap(&self, project_id: &ProjectId) -> GraphResult<Vec<OverlapSummary>> {
        let inner = self.inner.read().unwrap();
        let mut by_code: HashMap<String, Vec<String>> = HashMap::new();
        for edge in inner.graph.edge_weights() {
            if &edge.project_id != project_id {
                continue;
            }
            if let EdgeType::Axial(_) = edge.edge_type {
                by_code.entry(edge.dst.key.clone()).or_default().push(edge.src.key.clone());
            }
        }
        Ok(by_code
            .into_iter()
            .filter(|(_, cats)| cats.len() > 1)
            .map(|(codigo, categories)| OverlapSummary { codigo, categories })
            .collect())
    }

    async fn subgraph_by_category(&self, project_id: &ProjectId, categoria: &str) -> GraphResult<AttributeSubgraph> {
        let inner = self.inner.read().unwrap();
        let categoria_node = NodeRef::new(NodeLabel::Categoria, categoria, project_id.clone());
        let mut nodes = vec![categoria_node.clone()];
        let mut edges = Vec::new();
        for edge in inner.graph.edge_weights() {
            if &edge.project_id == project_id && edge.src == categoria_node {
                edges.push(edge.clone());
                nodes.push(edge.dst.clone());
            }
        }
        Ok(AttributeSubgraph {
            attribute_value: categoria.to_string(),
            nodes,
            edges,
        })
    }

    async fn sweep_discovered_only_edges(&self, project_id: &ProjectId, backed_pairs: &[(FragmentId, String)]) -> GraphResult<usize> {
        let mut inner = self.inner.write().unwrap();
        let backed: std::collections::HashSet<(&str, &str)> =
            backed_pairs.iter().map(|(f, c)| (f.as_str(), c.as_str())).collect();
        let to_remove: Vec<_> = inner
            .graph
            .edge_indices()
            .filter(|&idx| {
                let e = &inner.graph[idx];
                e.project_id == *project_id
                    && e.origen.as_deref() == Some("descubierta")
                    && !backed.contains(&(e.src.key.as_str(), e.dst.key.as_str()))
            })
            .collect();
        let removed = to_remove.len();
        for idx in to_remove {
            inner.graph.remove_edge(idx);
        }
        Ok(removed)
    }

    async fn export_subgraph(&self, project_id: &ProjectId) -> GraphResult<(Vec<NodeRef>, Vec<GraphEdge>)> {
        let inner = self.inner.read().unwrap();
        let edges: Vec<GraphEdge> = inner
            .graph
            .edge_weights()
            .filter(|e| &e.project_id == project_id)
            .cloned()
            .collect();
        let mut nodes: Vec<NodeRef> = inner
            .index
            .keys()
            .filter(|n| &n.project_id == project_id)
            .cloned()
            .collect();
        nodes.sort_by(|a, b| a.key.cmp(&b.key));
        Ok((nodes, edges))
    }

    async fn persist_node_scores(&self, _project_id: &ProjectId, scores: &[(NodeRef, f64)], property: &str) -> GraphResult<()> {
        // The in-memory store has no node-property bag beyond `NodeRef`
        // identity; tests assert against `export_subgraph`/the returned
        // `AlgorithmResult` directly. Log for parity with the native store.
        tracing::debug!(count = scores.len(), property, "graph.persist_node_scores.in_memory_noop");
        Ok(())
    }

    fn supports_native_algorithms(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn merge_entrevista_fragmento_creates_contiene_edge() {
        let store = InMemoryGraphStore::new();
        let project = ProjectId::from_string("p1");
        let fid = FragmentId::from_string("f1");
        store.merge_entrevista_fragmento(&project, "e01.txt", &fid).await.unwrap();
        let (nodes, edges) = store.export_subgraph(&project).await.unwrap();
        assert_eq!(nodes.len(), 2);
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].edge_type, EdgeType::Contiene);
    }

    #[tokio::test]
    async fn every_edge_carries_project_id_matching_both_endpoints() {
        let store = InMemoryGraphStore::new();
        let project = ProjectId::from_string("p1");
        store
            .merge_category_code_relationship(
                &project,
                "Infra",
                "Deficit",
                RelationType::Condicion,
                &[FragmentId::from_string("f1"), FragmentId::from_string("f2")],
                None,
            )
            .await
            .unwrap();
        let (_, edges) = store.export_subgraph(&project).await.unwrap();
        assert_eq!(edges.len(), 1);
        let edge = &edges[0];
        assert_eq!(edge.project_id, edge.src.project_id);
        assert_eq!(edge.project_id, edge.dst.project_id);
    }

    #[tokio::test]
    async fn unassign_removes_only_the_codificado_edge() {
        let store = InMemoryGraphStore::new();
        let project = ProjectId::from_string("p1");
        let fid = FragmentId::from_string("f1");
        store.merge_fragment_code(&project, &fid, "fatiga").await.unwrap();
        store.unassign_code_edge(&project, &fid, "fatiga").await.unwrap();
        let (_, edges) = store.export_subgraph(&project).await.unwrap();
        assert!(edges.is_empty());
    }

    #[tokio::test]
    async fn repeated_merge_is_idempotent() {
        let store = InMemoryGraphStore::new();
        let project = ProjectId::from_string("p1");
        let fid = FragmentId::from_string("f1");
        store.merge_entrevista_fragmento(&project, "e01.txt", &fid).await.unwrap();
        store.merge_entrevista_fragmento(&project, "e01.txt", &fid).await.unwrap();
        let (_, edges) = store.export_subgraph(&project).await.unwrap();
        assert_eq!(edges.len(), 1);
    }
}
