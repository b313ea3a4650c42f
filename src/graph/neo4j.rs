//! `Neo4jGraphStore` — native backend behind the `graph-native` feature,
//! grounded on `neo4rs`'s `Graph`/`query` API and on the composite-uniqueness
//! MERGE pattern from `original_source/app/queries.py`'s Cypher statements
//! (every node MERGE keys on `(label, nombre|id, project_id)`, never on a
//! single attribute).

use super::{
    AlgorithmResult, AttributeSubgraph, EdgeType, GraphAlgorithm, GraphEdge, GraphError, GraphResult,
    GraphStore, NodeLabel, NodeRef, OverlapSummary,
};
use crate::domain::{FragmentId, ProjectId, RelationType};
use async_trait::async_trait;
use neo4rs::{query, Graph};

pub struct Neo4jGraphStore {
    graph: Graph,
}

impl Neo4jGraphStore {
    pub async fn connect(uri: &str, user: &str, password: &str) -> GraphResult<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| GraphError::Unavailable(e.to_string()))?;
        Ok(Self { graph })
    }

    async fn run(&self, q: neo4rs::Query) -> GraphResult<()> {
        self.graph.run(q).await.map_err(|e| GraphError::Unavailable(e.to_string()))
    }
}

#[async_trait]
impl GraphStore for Neo4jGraphStore {
    async fn ensure_constraints(&self) -> GraphResult<()> {
        for (label, key) in [
            (NodeLabel::Entrevista.as_str(), "nombre"),
            (NodeLabel::Fragmento.as_str(), "id"),
            (NodeLabel::Codigo.as_str(), "nombre"),
            (NodeLabel::Categoria.as_str(), "nombre"),
        ] {
            let cypher = format!(
                "CREATE CONSTRAINT IF NOT EXISTS FOR (n:{label}) REQUIRE (n.{key}, n.project_id) IS UNIQUE"
            );
            self.run(query(&cypher)).await?;
        }
        Ok(())
    }

    async fn merge_entrevista_fragmento(
        &self,
        project_id: &ProjectId,
        archivo: &str,
        fragment_id: &FragmentId,
    ) -> GraphResult<()> {
        let q = query(
            "MERGE (e:Entrevista {nombre: $archivo, project_id: $project_id}) \
             MERGE (f:Fragmento {id: $fragment_id, project_id: $project_id}) \
             MERGE (e)-[:CONTIENE {project_id: $project_id}]->(f)",
        )
        .param("archivo", archivo)
        .param("fragment_id", fragment_id.as_str())
        .param("project_id", project_id.as_str());
        self.run(q).await
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
        let rel_type = tipo.as_str().to_uppercase();
        let evidencia_ids: Vec<&str> = evidencia.iter().map(|e| e.as_str()).collect();
        let cypher = format!(
            "MERGE (c:Categoria {{nombre: $categoria, project_id: $project_id}}) \
             MERGE (k:Codigo {{nombre: $codigo, project_id: $project_id}}) \
             MERGE (c)-[r:{rel_type} {{project_id: $project_id}}]->(k) \
             SET r.evidencia = $evidencia, r.memo = $memo"
        );
        let q = query(&cypher)
            .param("categoria", categoria)
            .param("codigo", codigo)
            .param("project_id", project_id.as_str())
            .param("evidencia", evidencia_ids)
            .param("memo", memo.unwrap_or_default());
        self.run(q).await
    }

    async fn unassign_code_edge(&self, project_id: &ProjectId, fragment_id: &FragmentId, codigo: &str) -> GraphResult<()> {
        let q = query(
            "MATCH (f:Fragmento {id: $fragment_id, project_id: $project_id})-[r:CODIFICADO {project_id: $project_id}]->(k:Codigo {nombre: $codigo, project_id: $project_id}) \
             DELETE r",
        )
        .param("fragment_id", fragment_id.as_str())
        .param("codigo", codigo)
        .param("project_id", project_id.as_str());
        self.run(q).await
    }

    async fn merge_fragment_code(&self, project_id: &ProjectId, fragment_id: &FragmentId, codigo: &str) -> GraphResult<()> {
        let q = query(
            "MERGE (f:Fragmento {id: $fragment_id, project_id: $project_id}) \
             MERGE (k:Codigo {nombre: $codigo, project_id: $project_id}) \
             MERGE (f)-[:CODIFICADO {project_id: $project_id}]->(k)",
        )
        .param("fragment_id", fragment_id.as_str())
        .param("codigo", codigo)
        .param("project_id", project_id.as_str());
        self.run(q).await
    }

    async fn multi_source_overlap(&self, project_id: &ProjectId) -> GraphResult<Vec<OverlapSummary>> {
        let q = query(
            "MATCH (c:Categoria {project_id: $project_id})-[:REL*0..]->(k:Codigo {project_id: $project_id}) \
             WITH k, collect(DISTINCT c.nombre) AS categories \
             WHERE size(categories) > 1 \
             RETURN k.nombre AS codigo, categories",
        )
        .param("project_id", project_id.as_str());
        let mut stream = self
            .graph
            .execute(q)
            .await
            .map_err(|e| GraphError::Unavailable(e.to_string()))?;
        let mut out = Vec::new();
        while let Ok(Some(row)) = stream.next().await {
            let codigo: String = row.get("codigo").unwrap_or_default();
            let categories: Vec<String> = row.get("categories").unwrap_or_default();
            out.push(OverlapSummary { codigo, categories });
        }
        Ok(out)
    }

    async fn subgraph_by_category(&self, project_id: &ProjectId, categoria: &str) -> GraphResult<AttributeSubgraph> {
        let q = query(
            "MATCH (c:Categoria {nombre: $categoria, project_id: $project_id})-[r]->(k) \
             RETURN k.nombre AS nombre",
        )
        .param("categoria", categoria)
        .param("project_id", project_id.as_str());
        let mut stream = self
            .graph
            .execute(q)
            .await
            .map_err(|e| GraphError::Unavailable(e.to_string()))?;
        let mut nodes = vec![NodeRef::new(NodeLabel::Categoria, categoria, project_id.clone())];
        let edges = Vec::new();
        while let Ok(Some(row)) = stream.next().await {
            let nombre: String = row.get("nombre").unwrap_or_default();
            nodes.push(NodeRef::new(NodeLabel::Codigo, nombre, project_id.clone()));
        }
        Ok(AttributeSubgraph {
            attribute_value: categoria.to_string(),
            nodes,
            edges,
        })
    }

    async fn sweep_discovered_only_edges(&self, project_id: &ProjectId, backed_pairs: &[(FragmentId, String)]) -> GraphResult<usize> {
        let backed_ids: Vec<String> = backed_pairs
            .iter()
            .map(|(f, c)| format!("{}:{}", f.as_str(), c))
            .collect();
        let q = query(
            "MATCH (f:Fragmento {project_id: $project_id})-[r:CODIFICADO {project_id: $project_id, origen: 'descubierta'}]->(k:Codigo {project_id: $project_id}) \
             WHERE NOT (f.id + ':' + k.nombre) IN $backed \
             DELETE r \
             RETURN count(r) AS removed",
        )
        .param("project_id", project_id.as_str())
        .param("backed", backed_ids);
        let mut stream = self
            .graph
            .execute(q)
            .await
            .map_err(|e| GraphError::Unavailable(e.to_string()))?;
        let removed = if let Ok(Some(row)) = stream.next().await {
            row.get::<i64>("removed").unwrap_or(0) as usize
        } else {
            0
        };
        Ok(removed)
    }

    async fn export_subgraph(&self, project_id: &ProjectId) -> GraphResult<(Vec<NodeRef>, Vec<GraphEdge>)> {
        let q = query(
            "MATCH (a {project_id: $project_id})-[r {project_id: $project_id}]->(b {project_id: $project_id}) \
             RETURN labels(a)[0] AS a_label, coalesce(a.nombre, a.id) AS a_key, \
                    labels(b)[0] AS b_label, coalesce(b.nombre, b.id) AS b_key, \
                    type(r) AS rel_type",
        )
        .param("project_id", project_id.as_str());
        let mut stream = self
            .graph
            .execute(q)
            .await
            .map_err(|e| GraphError::Unavailable(e.to_string()))?;
        let mut nodes = Vec::new();
        let mut edges = Vec::new();
        while let Ok(Some(row)) = stream.next().await {
            let a_label: String = row.get("a_label").unwrap_or_default();
            let a_key: String = row.get("a_key").unwrap_or_default();
            let b_label: String = row.get("b_label").unwrap_or_default();
            let b_key: String = row.get("b_key").unwrap_or_default();
            let rel_type: String = row.get("rel_type").unwrap_or_default();
            let Some(a_label) = label_from_str(&a_label) else { continue };
            let Some(b_label) = label_from_str(&b_label) else { continue };
            let src = NodeRef::new(a_label, a_key, project_id.clone());
            let dst = NodeRef::new(b_label, b_key, project_id.clone());
            let edge_type = if rel_type == "CONTIENE" {
                EdgeType::Contiene
            } else if rel_type == "CODIFICADO" {
                EdgeType::Codificado
            } else if let Ok(rel) = rel_type.to_lowercase().parse::<RelationType>() {
                EdgeType::Axial(rel)
            } else {
                continue;
            };
            nodes.push(src.clone());
            nodes.push(dst.clone());
            edges.push(GraphEdge {
                project_id: project_id.clone(),
                src,
                dst,
                edge_type,
                evidencia: vec![],
                memo: None,
                origen: None,
            });
        }
        nodes.sort_by(|a, b| (a.label.as_str(), &a.key).cmp(&(b.label.as_str(), &b.key)));
        nodes.dedup();
        Ok((nodes, edges))
    }

    async fn persist_node_scores(&self, project_id: &ProjectId, scores: &[(NodeRef, f64)], property: &str) -> GraphResult<()> {
        for (node, score) in scores {
            let cypher = format!(
                "MATCH (n:{} {{project_id: $project_id}}) WHERE coalesce(n.nombre, n.id) = $key SET n.{} = $score",
                node.label.as_str(),
                property
            );
            let q = query(&cypher)
                .param("project_id", project_id.as_str())
                .param("key", node.key.as_str())
                .param("score", *score);
            self.run(q).await?;
        }
        Ok(())
    }

    fn supports_native_algorithms(&self) -> bool {
        // GDS/MAGE plugin availability is a deployment detail, not something
        // this client probes; callers opt in explicitly via config.
        false
    }

    async fn run_native_algorithm(&self, _project_id: &ProjectId, _algorithm: GraphAlgorithm) -> GraphResult<AlgorithmResult> {
        Err(GraphError::Unavailable(
            "GDS/MAGE native algorithm execution is not wired up; falls back to in-memory engine".to_string(),
        ))
    }
}

fn label_from_str(s: &str) -> Option<NodeLabel> {
    match s {
        "Entrevista" => Some(NodeLabel::Entrevista),
        "Fragmento" => Some(NodeLabel::Fragmento),
        "Codigo" => Some(NodeLabel::Codigo),
        "Categoria" => Some(NodeLabel::Categoria),
        _ => None,
    }
}
