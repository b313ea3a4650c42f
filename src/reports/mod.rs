//! C11 — Report Artifacts Surface.
//!
//! Read-only aggregation over the tenant artifact store (C1) and the
//! relational store (C2), used by report composition to find what's
//! already been written for a project without becoming a second source
//! of truth. Grounded on the prefix layout in spec.md §6 and on
//! `original_source/app/report_artifacts.py`'s bounded scan (kind
//! classification, 350 kB per-item size cap, client-side recency sort).

use std::sync::Arc;

use thiserror::Error;

use crate::artifact::{ArtifactError, ArtifactStore};
use crate::domain::ProjectId;
use crate::relational::{ArchivoSummary, RelationalError, RelationalStore};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Relational(#[from] RelationalError),
}

pub type ReportResult<T> = Result<T, ReportError>;

/// Preview bytes are capped so a caller can't accidentally pull a
/// multi-megabyte checkpoint into a report draft.
pub const MAX_PREVIEW_BYTES: usize = 350_000;

/// Which logical-path family an artifact belongs to, inferred from its
/// prefix under the tenant root (never from file extension alone) —
/// the same `kind` taxonomy the original listing assigns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactCategory {
    /// `reports/*.md`/`.json` that isn't under `doctoral/`.
    Report,
    /// `reports/doctoral/*.md`.
    DoctoralReport,
    /// `reports/runner/*.md` — legacy pre-ledger runner output.
    LegacyRunnerReport,
    /// `notes/*.md` that isn't under `runner_semantic/`.
    Note,
    /// `notes/runner_semantic/*.md`.
    RunnerMemo,
    /// `logs/runner_reports/*.json`.
    RunnerReport,
    /// `logs/runner_checkpoints/*.json`.
    RunnerCheckpoint,
    Other,
}

impl ArtifactCategory {
    fn classify(logical_path: &str) -> Self {
        if logical_path.starts_with("reports/doctoral/") {
            ArtifactCategory::DoctoralReport
        } else if logical_path.starts_with("reports/runner/") {
            ArtifactCategory::LegacyRunnerReport
        } else if logical_path.starts_with("reports/") {
            ArtifactCategory::Report
        } else if logical_path.starts_with("notes/runner_semantic/") {
            ArtifactCategory::RunnerMemo
        } else if logical_path.starts_with("notes/") {
            ArtifactCategory::Note
        } else if logical_path.starts_with("logs/runner_reports/") {
            ArtifactCategory::RunnerReport
        } else if logical_path.starts_with("logs/runner_checkpoints/") {
            ArtifactCategory::RunnerCheckpoint
        } else {
            ArtifactCategory::Other
        }
    }

    /// Only markdown/JSON artifacts are surfaced to report composition,
    /// matching the original listing's suffix filter.
    fn is_reportable_suffix(logical_path: &str) -> bool {
        logical_path.ends_with(".md") || logical_path.ends_with(".markdown") || logical_path.ends_with(".json")
    }
}

#[derive(Debug, Clone)]
pub struct ArtifactSummary {
    pub logical_path: String,
    pub bytes: usize,
    pub category: ArtifactCategory,
}

/// A small tail of per-interview rows, sourced from the relational store
/// rather than the artifact store, since interview aggregates live there.
#[derive(Debug, Clone)]
pub struct InterviewReportRow {
    pub archivo: String,
    pub fragmentos: u64,
    pub updated_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl From<ArchivoSummary> for InterviewReportRow {
    fn from(s: ArchivoSummary) -> Self {
        Self {
            archivo: s.archivo,
            fragmentos: s.fragmentos,
            updated_at: s.actualizado,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecentArtifacts {
    pub artifacts: Vec<ArtifactSummary>,
    pub interview_rows: Vec<InterviewReportRow>,
}

/// The four prefixes this surface scans, in priority order.
const SCAN_PREFIXES: [&str; 4] = [
    "reports/",
    "notes/",
    "logs/runner_reports/",
    "logs/runner_checkpoints/",
];

/// Read-only aggregator; never writes, never used as source of truth.
pub struct ReportArtifactsSurface<A: ArtifactStore> {
    artifact: Arc<A>,
    relational: Arc<RelationalStore>,
}

impl<A: ArtifactStore> ReportArtifactsSurface<A> {
    pub fn new(artifact: Arc<A>, relational: Arc<RelationalStore>) -> Self {
        Self { artifact, relational }
    }

    /// Lists the most recent durable artifacts for a project, capped at
    /// `limit` total, plus a small tail of per-interview rows.
    pub async fn recent_artifacts(
        &self,
        org: &str,
        project_id: &ProjectId,
        limit: usize,
    ) -> ReportResult<RecentArtifacts> {
        let project = project_id.as_str();
        let mut artifacts = Vec::new();
        for prefix in SCAN_PREFIXES {
            let listed = self.artifact.list(org, project, prefix).await?;
            artifacts.extend(
                listed
                    .into_iter()
                    .filter(|meta| ArtifactCategory::is_reportable_suffix(&meta.logical_path))
                    .filter(|meta| meta.bytes <= MAX_PREVIEW_BYTES)
                    .map(|meta| ArtifactSummary {
                        category: ArtifactCategory::classify(&meta.logical_path),
                        logical_path: meta.logical_path,
                        bytes: meta.bytes,
                    }),
            );
        }
        // Most recently written artifacts sort after older ones because
        // every logical path in this layout is timestamp- or
        // task-id-prefixed; lexical descending order is a stable proxy
        // for recency without needing a separate mtime index.
        artifacts.sort_by(|a, b| b.logical_path.cmp(&a.logical_path));
        artifacts.truncate(limit);

        let mut interview_rows: Vec<InterviewReportRow> = self
            .relational
            .archivo_summaries(project_id)?
            .into_iter()
            .map(InterviewReportRow::from)
            .collect();
        interview_rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        interview_rows.truncate(limit.min(10));

        Ok(RecentArtifacts { artifacts, interview_rows })
    }

    /// Fetches an artifact's content, truncated to `MAX_PREVIEW_BYTES`
    /// so a report draft never inlines an oversized checkpoint or log.
    pub async fn preview(
        &self,
        org: &str,
        project: &str,
        logical_path: &str,
    ) -> ReportResult<Vec<u8>> {
        let mut bytes = self.artifact.get(org, project, logical_path).await?;
        bytes.truncate(MAX_PREVIEW_BYTES);
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MockArtifactStore;
    use crate::domain::ProjectId;

    fn project() -> ProjectId {
        ProjectId::from("proj1")
    }

    #[tokio::test]
    async fn classifies_and_caps_listing() {
        let artifact = Arc::new(MockArtifactStore::new(false));
        let relational = Arc::new(RelationalStore::open_in_memory().unwrap());
        artifact
            .put("acme", "proj1", "reports/executive_summary.md", b"x".to_vec(), None)
            .await
            .unwrap();
        artifact
            .put(
                "acme",
                "proj1",
                "notes/runner_semantic/20260101_semantic_runner_a_s1_i1_codigo.md",
                b"y".to_vec(),
                None,
            )
            .await
            .unwrap();
        artifact
            .put("acme", "proj1", "logs/runner_checkpoints/task1.json", b"{}".to_vec(), None)
            .await
            .unwrap();

        let surface = ReportArtifactsSurface::new(artifact, relational);
        let recent = surface.recent_artifacts("acme", &project(), 10).await.unwrap();
        assert_eq!(recent.artifacts.len(), 3);
        assert!(recent
            .artifacts
            .iter()
            .any(|a| a.category == ArtifactCategory::Report));
        assert!(recent
            .artifacts
            .iter()
            .any(|a| a.category == ArtifactCategory::RunnerMemo));
        assert!(recent
            .artifacts
            .iter()
            .any(|a| a.category == ArtifactCategory::RunnerCheckpoint));
    }

    #[tokio::test]
    async fn listing_is_capped_at_limit() {
        let artifact = Arc::new(MockArtifactStore::new(false));
        let relational = Arc::new(RelationalStore::open_in_memory().unwrap());
        for i in 0..5 {
            artifact
                .put("acme", "proj1", &format!("reports/r{i}.md"), b"x".to_vec(), None)
                .await
                .unwrap();
        }
        let surface = ReportArtifactsSurface::new(artifact, relational);
        let recent = surface.recent_artifacts("acme", &project(), 2).await.unwrap();
        assert_eq!(recent.artifacts.len(), 2);
    }

    #[tokio::test]
    async fn preview_truncates_oversized_artifacts() {
        let artifact = Arc::new(MockArtifactStore::new(false));
        let relational = Arc::new(RelationalStore::open_in_memory().unwrap());
        let big = vec![0u8; MAX_PREVIEW_BYTES + 1_000];
        artifact
            .put("acme", "proj1", "reports/huge.json", big, None)
            .await
            .unwrap();
        let surface = ReportArtifactsSurface::new(artifact, relational);
        let preview = surface.preview("acme", "proj1", "reports/huge.json").await.unwrap();
        assert_eq!(preview.len(), MAX_PREVIEW_BYTES);
    }

    #[tokio::test]
    async fn never_used_as_source_of_truth_empty_project_returns_empty() {
        let artifact = Arc::new(MockArtifactStore::new(false));
        let relational = Arc::new(RelationalStore::open_in_memory().unwrap());
        let surface = ReportArtifactsSurface::new(artifact, relational);
        let recent = surface.recent_artifacts("acme", &project(), 10).await.unwrap();
        assert!(recent.artifacts.is_empty());
        assert!(recent.interview_rows.is_empty());
    }
}
