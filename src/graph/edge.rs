//! Edge-list model: `(project_id, src_id, dst_id, type)` keyed, per Design
//! Note "Cycles / back-references" — no cyclic ownership at the language
//! level, just a table of node refs plus an edge-list table.

use super::NodeRef;
use crate::domain::{FragmentId, ProjectId, RelationType};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    /// `Entrevista` -[:CONTIENE]-> `Fragmento`
    Contiene,
    /// `Fragmento` -[:CODIFICADO]-> `Codigo`
    Codificado,
    /// `Categoria` -[:REL {tipo}]-> `Codigo`
    Axial(RelationType),
}

impl EdgeType {
    pub fn as_str(&self) -> &str {
        match self {
            EdgeType::Contiene => "CONTIENE",
            EdgeType::Codificado => "CODIFICADO",
            EdgeType::Axial(rel) => rel.as_str(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    pub project_id: ProjectId,
    pub src: NodeRef,
    pub dst: NodeRef,
    pub edge_type: EdgeType,
    #[serde(default)]
    pub evidencia: Vec<FragmentId>,
    #[serde(default)]
    pub memo: Option<String>,
    /// Legacy provenance marker: `"descubierta"` edges without ledger
    /// backing are swept by `GraphStore::sweep_discovered_only_edges`.
    #[serde(default)]
    pub origen: Option<String>,
}
