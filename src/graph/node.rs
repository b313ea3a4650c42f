//! Node labels for the graph projection: `Entrevista`, `Fragmento`,
//! `Codigo`, `Categoria`, each requiring a composite `(label, key,
//! project_id)` uniqueness constraint — no single-attribute uniqueness may
//! exist, per spec.md §3.

use crate::domain::ProjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum NodeLabel {
    Entrevista,
    Fragmento,
    Codigo,
    Categoria,
}

impl NodeLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeLabel::Entrevista => "Entrevista",
            NodeLabel::Fragmento => "Fragmento",
            NodeLabel::Codigo => "Codigo",
            NodeLabel::Categoria => "Categoria",
        }
    }
}

/// A node identity: label + key (`nombre` for named nodes, `id` for
/// `Fragmento`) + the tenant it belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeRef {
    pub label: NodeLabel,
    pub key: String,
    pub project_id: ProjectId,
}

impl NodeRef {
    pub fn new(label: NodeLabel, key: impl Into<String>, project_id: ProjectId) -> Self {
        Self {
            label,
            key: key.into(),
            project_id,
        }
    }
}
