//! Unified error type for boundary code (CLI, the facade API, tests).
//!
//! Each component defines its own `thiserror` enum; this type exists only
//! for call sites that need one error type across components, the way
//! the teacher's `PlexusError` wraps `StorageError`.

use thiserror::Error;

use crate::artifact::ArtifactError;
use crate::axial::AxialError;
use crate::graph::GraphError;
use crate::ingestion::IngestError;
use crate::ledger::LedgerError;
use crate::llm::LlmError;
use crate::relational::RelationalError;
use crate::runner::RunnerError;
use crate::vector::VectorError;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Relational(#[from] RelationalError),
    #[error(transparent)]
    Vector(#[from] VectorError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Axial(#[from] AxialError),
    #[error(transparent)]
    Runner(#[from] RunnerError),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

/// The broad error-kind families named in the interface contract, used by
/// any external surface (out of scope here) to map onto transport status
/// codes without this crate depending on an HTTP framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFamily {
    Validation,
    Transient,
    Persistent,
    Consistency,
    Forbidden,
}

impl Error {
    pub fn family(&self) -> ErrorFamily {
        match self {
            Error::Artifact(ArtifactError::TenantRequired(_)) => ErrorFamily::Validation,
            Error::Artifact(ArtifactError::StorageUnavailable(_)) => ErrorFamily::Persistent,
            Error::Artifact(ArtifactError::TransientIo(_)) => ErrorFamily::Transient,
            Error::Vector(VectorError::Transport { .. }) => ErrorFamily::Transient,
            Error::Axial(AxialError::NotReady { .. }) => ErrorFamily::Validation,
            Error::Runner(RunnerError::Forbidden(_)) => ErrorFamily::Forbidden,
            _ => ErrorFamily::Persistent,
        }
    }
}
