//! Shared domain model for the coding-discovery subsystem.
//!
//! These types cross every component boundary (C1-C11): the relational,
//! vector, and graph adapters all read and write the same `Fragment`,
//! `CandidateCode`, and `OpenCode` shapes, and the runner and axial engine
//! share `MemoStatement` and `RelationType`.

mod ids;
mod memo;
mod runner_task;

pub use ids::{CandidateId, FragmentId, ProjectId, RunnerTaskId};
pub use memo::{EpistemicType, MemoStatement};
pub use runner_task::{Auth, AuthorizationError, RunnerStatus, RunnerTask};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Typed property values for open, dynamic metadata bags.
///
/// Mirrors the teacher's own `PropertyValue` — untagged so JSON round-trips
/// as plain scalars/arrays/objects rather than `{"String": "..."}` wrappers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropertyValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<PropertyValue>),
    Object(HashMap<String, PropertyValue>),
}

pub type Metadata = HashMap<String, PropertyValue>;

/// A project: the tenant-scoped unit of work containing interviews,
/// fragments, and the evolving code book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub org: String,
    pub name: String,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// A single coded-or-codeable unit of transcript text.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fragment {
    pub fragment_id: FragmentId,
    pub project_id: ProjectId,
    /// Source interview filename ("archivo" in the ledger's own vocabulary).
    pub archivo: String,
    /// Paragraph/turn index within the interview, in ingest order.
    pub par_idx: u32,
    pub speaker: Option<String>,
    pub text: String,
    pub char_len: u32,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Fragment {
    /// A fragment is interviewer turn when its speaker matches the
    /// project's configured interviewer label(s); callers filter on
    /// this via `speaker`, not a dedicated flag, since interviewer
    /// labels vary by project.
    pub fn is_speaker(&self, label: &str) -> bool {
        self.speaker.as_deref() == Some(label)
    }
}

/// Where a candidate code entry originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceOrigin {
    Manual,
    Llm,
    SemanticSuggestion,
    LinkPrediction,
}

/// Validation-tray status of a candidate code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStatus {
    Pendiente,
    Validado,
    Rechazado,
    Hipotesis,
}

/// An unvalidated or provisional code entry awaiting review.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateCode {
    pub id: CandidateId,
    pub project_id: ProjectId,
    pub codigo: String,
    pub fragment_id: Option<FragmentId>,
    pub archivo: String,
    pub cita: String,
    pub source_origin: SourceOrigin,
    pub score_confidence: f32,
    pub status: CandidateStatus,
    #[serde(default)]
    pub memo: Option<MemoStatement>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    #[serde(default)]
    pub promoted_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// A validated, committed open code assigned to a fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenCode {
    pub project_id: ProjectId,
    pub fragment_id: FragmentId,
    pub codigo: String,
    pub promoted_from: Option<CandidateId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// The four axial relation types a Grounded Theory coder may assign
/// between categories and codes. Spanish tokens are preserved verbatim
/// since they are the literal wire values used by the ledger and by the
/// graph projection's edge labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationType {
    #[serde(rename = "partede")]
    PartDe,
    Causa,
    Condicion,
    Consecuencia,
}

impl RelationType {
    pub const ALL: [RelationType; 4] = [
        RelationType::PartDe,
        RelationType::Causa,
        RelationType::Condicion,
        RelationType::Consecuencia,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationType::PartDe => "partede",
            RelationType::Causa => "causa",
            RelationType::Condicion => "condicion",
            RelationType::Consecuencia => "consecuencia",
        }
    }
}

impl std::str::FromStr for RelationType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "partede" => Ok(RelationType::PartDe),
            "causa" => Ok(RelationType::Causa),
            "condicion" => Ok(RelationType::Condicion),
            "consecuencia" => Ok(RelationType::Consecuencia),
            other => Err(format!("unknown axial relation type: {other}")),
        }
    }
}

/// A category produced by axial coding, grouping related open codes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub project_id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// An axial relation between a category and a code, backed by coded
/// evidence fragments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AxialRelation {
    pub project_id: ProjectId,
    pub category: String,
    pub codigo: String,
    pub relation_type: RelationType,
    pub evidence_fragment_ids: Vec<FragmentId>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}
