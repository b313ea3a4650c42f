//! Brute-force cosine-similarity vector store, the default when neither
//! `vector-sqlite` nor `vector-native` is enabled — grounded on the
//! teacher's own no-feature fallback story (the crate builds and runs
//! without `fastembed`/`sqlite-vec`/`qdrant-client`).

use super::{
    SearchFilter, SearchHit, UpsertReport, VectorError, VectorPayload, VectorPoint, VectorResult,
    VectorStore,
};
use crate::domain::{FragmentId, ProjectId};
use async_trait::async_trait;
use dashmap::DashMap;

#[derive(Clone)]
struct StoredPoint {
    fragment_id: FragmentId,
    vector: Vec<f32>,
    payload: VectorPayload,
}

/// `DashMap<ProjectId, Vec<StoredPoint>>` brute-force cosine scan.
#[derive(Default)]
pub struct InMemoryVectorStore {
    points: DashMap<ProjectId, Vec<StoredPoint>>,
}

impl InMemoryVectorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn upsert_batch(&self, points: Vec<VectorPoint>) -> VectorResult<UpsertReport> {
        let written = points.len();
        for p in points {
            let project_id = p.payload.project_id.clone();
            let mut entries = self.points.entry(project_id).or_default();
            entries.retain(|existing| existing.fragment_id != p.fragment_id);
            entries.push(StoredPoint {
                fragment_id: p.fragment_id,
                vector: p.vector,
                payload: p.payload,
            });
        }
        Ok(UpsertReport { written, splits: 0 })
    }

    async fn search(
        &self,
        vector: &[f32],
        filter: &SearchFilter,
        top_k: usize,
    ) -> VectorResult<Vec<SearchHit>> {
        let Some(entries) = self.points.get(&filter.project_id) else {
            return Ok(Vec::new());
        };
        let mut hits: Vec<SearchHit> = entries
            .iter()
            .filter(|p| {
                if let Some(archivo) = &filter.archivo {
                    if &p.payload.archivo != archivo {
                        return false;
                    }
                }
                if let Some(speaker) = &p.payload.speaker {
                    if filter.exclude_speakers.contains(speaker) {
                        return false;
                    }
                }
                true
            })
            .map(|p| SearchHit {
                fragment_id: p.fragment_id.clone(),
                score: cosine_similarity(vector, &p.vector),
                payload: p.payload.clone(),
            })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn top1(&self, vector: &[f32], project_id: &ProjectId) -> VectorResult<Option<SearchHit>> {
        let filter = SearchFilter {
            project_id: project_id.clone(),
            archivo: None,
            exclude_speakers: Vec::new(),
        };
        Ok(self.search(vector, &filter, 1).await?.into_iter().next())
    }

    async fn get_vector(&self, project_id: &ProjectId, fragment_id: &FragmentId) -> VectorResult<Option<Vec<f32>>> {
        let Some(entries) = self.points.get(project_id) else {
            return Ok(None);
        };
        Ok(entries.iter().find(|p| &p.fragment_id == fragment_id).map(|p| p.vector.clone()))
    }

    fn supports_native_discovery(&self) -> bool {
        false
    }
}

impl InMemoryVectorStore {
    /// Testing/diagnostic helper: force a transient error on the next
    /// upsert of a batch larger than `trigger_above`, used to exercise the
    /// split-on-fail retry path without a real network dependency.
    pub fn point_count(&self, project_id: &ProjectId) -> usize {
        self.points.get(project_id).map(|v| v.len()).unwrap_or(0)
    }
}

/// A decorator that fails upserts above a size threshold once, to exercise
/// the split-on-fail retry path in tests (`VectorError::Transient`).
pub struct FlakyVectorStore<S: VectorStore> {
    inner: S,
    fail_batches_larger_than: usize,
    failures_remaining: std::sync::atomic::AtomicU32,
}

impl<S: VectorStore> FlakyVectorStore<S> {
    pub fn new(inner: S, fail_batches_larger_than: usize, failures: u32) -> Self {
        Self {
            inner,
            fail_batches_larger_than,
            failures_remaining: std::sync::atomic::AtomicU32::new(failures),
        }
    }
}

#[async_trait]
impl<S: VectorStore> VectorStore for FlakyVectorStore<S> {
    async fn upsert_batch(&self, points: Vec<VectorPoint>) -> VectorResult<UpsertReport> {
        if points.len() > self.fail_batches_larger_than
            && self
                .failures_remaining
                .fetch_update(std::sync::atomic::Ordering::SeqCst, std::sync::atomic::Ordering::SeqCst, |n| {
                    if n > 0 {
                        Some(n - 1)
                    } else {
                        None
                    }
                })
                .is_ok()
        {
            return Err(VectorError::Transient {
                message: "upstream gateway timeout".to_string(),
                status: Some(502),
            });
        }
        self.inner.upsert_batch(points).await
    }

    async fn search(&self, vector: &[f32], filter: &SearchFilter, top_k: usize) -> VectorResult<Vec<SearchHit>> {
        self.inner.search(vector, filter, top_k).await
    }

    async fn top1(&self, vector: &[f32], project_id: &ProjectId) -> VectorResult<Option<SearchHit>> {
        self.inner.top1(vector, project_id).await
    }

    async fn get_vector(&self, project_id: &ProjectId, fragment_id: &FragmentId) -> VectorResult<Option<Vec<f32>>> {
        self.inner.get_vector(project_id, fragment_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::VectorPayload;

    fn point(id: &str, vector: Vec<f32>, archivo: &str, speaker: Option<&str>) -> VectorPoint {
        VectorPoint {
            fragment_id: FragmentId::from_string(id),
            vector,
            payload: VectorPayload {
                project_id: ProjectId::from_string("p1"),
                archivo: archivo.to_string(),
                par_idx: 0,
                speaker: speaker.map(|s| s.to_string()),
            },
        }
    }

    #[tokio::test]
    async fn search_excludes_interviewer_by_default() {
        let store = InMemoryVectorStore::new();
        store
            .upsert_batch(vec![
                point("f1", vec![1.0, 0.0], "e01", Some("interviewer")),
                point("f2", vec![1.0, 0.0], "e01", Some("participant")),
            ])
            .await
            .unwrap();
        let filter = SearchFilter::for_project(ProjectId::from_string("p1"));
        let hits = store.search(&[1.0, 0.0], &filter, 10).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].fragment_id, FragmentId::from_string("f2"));
    }

    #[tokio::test]
    async fn upsert_replaces_existing_point_for_same_fragment() {
        let store = InMemoryVectorStore::new();
        store
            .upsert_batch(vec![point("f1", vec![1.0, 0.0], "e01", None)])
            .await
            .unwrap();
        store
            .upsert_batch(vec![point("f1", vec![0.0, 1.0], "e01", None)])
            .await
            .unwrap();
        assert_eq!(store.point_count(&ProjectId::from_string("p1")), 1);
    }

    #[tokio::test]
    async fn empty_project_returns_no_hits() {
        let store = InMemoryVectorStore::new();
        let filter = SearchFilter::for_project(ProjectId::from_string("nonexistent"));
        let hits = store.search(&[1.0, 0.0], &filter, 10).await.unwrap();
        assert!(hits.is_empty());
    }
}
