//! C3 — Vector Store Adapter.
//!
//! `VectorStore` is a new trait scoped to this crate's domain (points keyed
//! by `FragmentId`, filtered by `project_id`) — distinct from the teacher's
//! own `embedding::VectorStore` (which is keyed by `NodeId`/`context_id`).
//! The split-on-fail upsert retry, the speaker-filtered `search`, and the
//! native/fallback `discover` policy are transcribed from
//! `original_source/app/queries.py::discover_search`.

mod discover;
mod in_memory;
#[cfg(feature = "vector-sqlite")]
mod sqlite_vec_store;
#[cfg(feature = "vector-native")]
mod qdrant_store;

pub use discover::{discover_with, DiscoverRequest, DiscoveryType};
pub use in_memory::InMemoryVectorStore;
#[cfg(feature = "vector-sqlite")]
pub use sqlite_vec_store::SqliteVecStore;
#[cfg(feature = "vector-native")]
pub use qdrant_store::QdrantVectorStore;

use crate::domain::{FragmentId, ProjectId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VectorError {
    #[error("vector store transport error: {0}")]
    Transport(String),
    #[error("vector store transient error (status {status:?}): {message}")]
    Transient { message: String, status: Option<u16> },
    #[error("embedding dimension mismatch: expected {expected}, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

pub type VectorResult<T> = Result<T, VectorError>;

/// The payload echoed back alongside a vector hit, matching the
/// `archivo`/`par_idx`/`speaker`/`project_id` fields the original system's
/// Qdrant payload carries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorPayload {
    pub project_id: ProjectId,
    pub archivo: String,
    pub par_idx: u32,
    pub speaker: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VectorPoint {
    pub fragment_id: FragmentId,
    pub vector: Vec<f32>,
    pub payload: VectorPayload,
}

#[derive(Debug, Clone)]
pub struct SearchFilter {
    pub project_id: ProjectId,
    pub archivo: Option<String>,
    /// Speaker labels to exclude via `must_not` (default: `["interviewer"]`).
    pub exclude_speakers: Vec<String>,
}

impl SearchFilter {
    pub fn for_project(project_id: ProjectId) -> Self {
        Self {
            project_id,
            archivo: None,
            exclude_speakers: vec!["interviewer".to_string()],
        }
    }

    pub fn without_speaker_filter(mut self) -> Self {
        self.exclude_speakers.clear();
        self
    }

    pub fn for_archivo(mut self, archivo: impl Into<String>) -> Self {
        self.archivo = Some(archivo.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct SearchHit {
    pub fragment_id: FragmentId,
    pub score: f32,
    pub payload: VectorPayload,
}

/// `upsert_batch`'s per-split latency log line, surfaced for tests and
/// observability rather than swallowed.
#[derive(Debug, Clone)]
pub struct UpsertReport {
    pub written: usize,
    pub splits: u32,
}

#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Batch upsert with split-on-failure retry: on a transient error the
    /// batch is halved and retried recursively down to size 1.
    async fn upsert_batch(&self, points: Vec<VectorPoint>) -> VectorResult<UpsertReport>;

    async fn search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        top_k: usize,
    ) -> VectorResult<Vec<SearchHit>>;

    /// Top-1 point for a single anchor vector within the project, used by
    /// `discover`'s anchor-resolution step. Returns `None` if the project
    /// has no points yet.
    async fn top1(&self, vector: &[f32], project_id: &ProjectId) -> VectorResult<Option<SearchHit>>;

    /// Direct point lookup by id, the embedding counterpart to
    /// `RelationalStore::get_fragment` — the relational row never carries
    /// the embedding itself, so the runner and C7's similarity ops fetch it
    /// here instead of re-embedding the fragment's text on every step.
    async fn get_vector(&self, project_id: &ProjectId, fragment_id: &FragmentId) -> VectorResult<Option<Vec<f32>>>;

    /// True when this backend can run the native Discovery API
    /// (positive/negative context pairs); false routes `discover` to the
    /// weighted-vector fallback unconditionally.
    fn supports_native_discovery(&self) -> bool {
        false
    }

    /// Native Discovery call. Only invoked when `supports_native_discovery`
    /// is true and at least one positive anchor passed the quality gate.
    async fn discover_native(
        &self,
        _positive_ids: &[FragmentId],
        _negative_ids: &[FragmentId],
        _target: Option<&[f32]>,
        _project_id: &ProjectId,
        _top_k: usize,
    ) -> VectorResult<Vec<SearchHit>> {
        Ok(Vec::new())
    }
}

/// The exact keyword set the original system checks on a vector-store error
/// message to decide whether a retry is worthwhile (`_is_transient_qdrant_error`).
pub fn is_transient_vector_error(message: &str) -> bool {
    crate::retry::is_transient_message(message)
}

/// Split-on-failure batch upsert: given a raw single-attempt write
/// function, try the whole batch; on a transient error halve the batch and
/// retry recursively down to size 1. A persistent (non-transient) error on
/// a single point is propagated rather than retried.
///
/// `write_one` writes exactly the points passed in one attempt (no
/// internal retry) so this function owns the splitting policy entirely.
pub async fn split_on_fail_upsert<'a, F, Fut>(
    points: Vec<VectorPoint>,
    write_one: &'a F,
) -> VectorResult<UpsertReport>
where
    F: Fn(Vec<VectorPoint>) -> Fut + Sync,
    Fut: std::future::Future<Output = VectorResult<()>> + 'a,
{
    if points.is_empty() {
        return Ok(UpsertReport { written: 0, splits: 0 });
    }
    let start = std::time::Instant::now();
    let len = points.len();
    match write_one(points.clone()).await {
        Ok(()) => {
            tracing::debug!(batch_size = len, elapsed_ms = start.elapsed().as_millis() as u64, "vector.upsert.ok");
            Ok(UpsertReport { written: len, splits: 0 })
        }
        Err(e) if is_transient_vector_error(&e.to_string()) && len > 1 => {
            tracing::warn!(batch_size = len, error = %e, "vector.upsert.split_on_fail");
            let mid = len / 2;
            let mut tail = points;
            let head = tail.split_off(mid);
            // `head`/`tail` naming mirrors the recursive halves, not call order.
            let mut written = 0usize;
            let mut splits = 1u32;
            let r1 = Box::pin(split_on_fail_upsert(tail, write_one)).await?;
            written += r1.written;
            splits += r1.splits;
            let r2 = Box::pin(split_on_fail_upsert(head, write_one)).await?;
            written += r2.written;
            splits += r2.splits;
            Ok(UpsertReport { written, splits })
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod split_tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn pt(id: &str) -> VectorPoint {
        VectorPoint {
            fragment_id: FragmentId::from_string(id),
            vector: vec![1.0],
            payload: VectorPayload {
                project_id: ProjectId::from_string("p1"),
                archivo: "e01".to_string(),
                par_idx: 0,
                speaker: None,
            },
        }
    }

    #[tokio::test]
    async fn splits_down_until_the_single_bad_point_is_isolated() {
        let attempts = AtomicUsize::new(0);
        let good: Mutex<Vec<String>> = Mutex::new(Vec::new());
        let write_one = |batch: Vec<VectorPoint>| {
            attempts.fetch_add(1, Ordering::SeqCst);
            let bad = batch.iter().any(|p| p.fragment_id.as_str() == "bad");
            let ids: Vec<String> = batch.iter().map(|p| p.fragment_id.as_str().to_string()).collect();
            async move {
                if bad {
                    Err(VectorError::Transient { message: "gateway timeout".into(), status: Some(502) })
                } else {
                    good.lock().unwrap().extend(ids);
                    Ok(())
                }
            }
        };
        let points = vec![pt("a"), pt("bad"), pt("c"), pt("d")];
        let result = split_on_fail_upsert(points, &write_one).await;
        // "bad" alone still fails even at size 1 — persistent for that point.
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn whole_batch_succeeds_without_splitting() {
        let write_one = |_: Vec<VectorPoint>| async { Ok(()) };
        let points = vec![pt("a"), pt("b"), pt("c")];
        let report = split_on_fail_upsert(points, &write_one).await.unwrap();
        assert_eq!(report.written, 3);
        assert_eq!(report.splits, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_filter_defaults_exclude_interviewer() {
        let f = SearchFilter::for_project(ProjectId::from_string("p1"));
        assert_eq!(f.exclude_speakers, vec!["interviewer".to_string()]);
    }

    #[test]
    fn without_speaker_filter_clears_exclusions() {
        let f = SearchFilter::for_project(ProjectId::from_string("p1")).without_speaker_filter();
        assert!(f.exclude_speakers.is_empty());
    }
}
