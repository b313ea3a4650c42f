//! `discover`: the native/fallback Discovery policy, transcribed from
//! `original_source/app/queries.py::discover_search`.

use super::{SearchFilter, SearchHit, VectorResult, VectorStore};
use crate::domain::ProjectId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscoveryType {
    Native,
    Fallback,
}

#[derive(Debug, Clone)]
pub struct DiscoverHit {
    pub hit: SearchHit,
    pub discovery_type: DiscoveryType,
}

pub struct DiscoverRequest<'a> {
    pub positive_vectors: &'a [Vec<f32>],
    pub negative_vectors: &'a [Vec<f32>],
    pub target_vector: Option<&'a [f32]>,
    pub project_id: ProjectId,
    pub top_k: usize,
    /// Minimum top-1 score for an anchor to be accepted into the native path.
    pub anchor_quality_threshold: f32,
}

fn mean_vector(vectors: &[Vec<f32>]) -> Option<Vec<f32>> {
    let first = vectors.first()?;
    let dim = first.len();
    let mut out = vec![0.0f32; dim];
    for v in vectors {
        for (o, x) in out.iter_mut().zip(v.iter()) {
            *o += x;
        }
    }
    let n = vectors.len() as f32;
    for o in out.iter_mut() {
        *o /= n;
    }
    Some(out)
}

/// Weighted-vector fallback: `q = mean(positive) - 0.3*mean(negative)`,
/// optionally blended with target as `0.7*q + 0.3*target`.
fn fallback_query_vector(req: &DiscoverRequest<'_>) -> Option<Vec<f32>> {
    let avg_positive = mean_vector(req.positive_vectors)?;
    let mut q = if let Some(avg_negative) = mean_vector(req.negative_vectors) {
        avg_positive
            .iter()
            .zip(avg_negative.iter())
            .map(|(p, n)| p - 0.3 * n)
            .collect()
    } else {
        avg_positive
    };
    if let Some(target) = req.target_vector {
        q = q
            .iter()
            .zip(target.iter())
            .map(|(qi, ti)| 0.7 * qi + 0.3 * ti)
            .collect();
    }
    Some(q)
}

/// Run the Discovery two-path policy against any `VectorStore`.
///
/// Native path: resolve one representative point per anchor via top-1 kNN,
/// accept only anchors whose top-1 score clears `anchor_quality_threshold`,
/// then (if at least one positive anchor survived and the backend supports
/// native Discovery) issue the native call with positive/negative context
/// pairs, pairing surplus negatives with the first positive. Otherwise fall
/// back to the weighted-vector query.
pub async fn discover_with<S: VectorStore + ?Sized>(
    store: &S,
    req: DiscoverRequest<'_>,
) -> VectorResult<Vec<DiscoverHit>> {
    if req.positive_vectors.is_empty() {
        return Ok(Vec::new());
    }

    if store.supports_native_discovery() {
        let mut positive_ids = Vec::new();
        for vec in req.positive_vectors {
            if let Some(hit) = store.top1(vec, &req.project_id).await? {
                if hit.score >= req.anchor_quality_threshold {
                    positive_ids.push(hit.fragment_id);
                } else {
                    tracing::warn!(score = hit.score, threshold = req.anchor_quality_threshold, "discover.weak_anchor_rejected");
                }
            }
        }
        let mut negative_ids = Vec::new();
        for vec in req.negative_vectors {
            if let Some(hit) = store.top1(vec, &req.project_id).await? {
                if hit.score >= req.anchor_quality_threshold {
                    negative_ids.push(hit.fragment_id);
                }
            }
        }

        if !positive_ids.is_empty() {
            tracing::info!(positives = positive_ids.len(), negatives = negative_ids.len(), "discover.using_native");
            let hits = store
                .discover_native(&positive_ids, &negative_ids, req.target_vector, &req.project_id, req.top_k)
                .await?;
            return Ok(hits
                .into_iter()
                .map(|hit| DiscoverHit {
                    hit,
                    discovery_type: DiscoveryType::Native,
                })
                .collect());
        }
        tracing::info!("discover.native.no_valid_anchors_falling_back");
    }

    let Some(query_vector) = fallback_query_vector(&req) else {
        return Ok(Vec::new());
    };
    let filter = SearchFilter::for_project(req.project_id.clone()).without_speaker_filter();
    let hits = store.search(&query_vector, &filter, req.top_k).await?;
    Ok(hits
        .into_iter()
        .map(|hit| DiscoverHit {
            hit,
            discovery_type: DiscoveryType::Fallback,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::{InMemoryVectorStore, VectorPayload, VectorPoint, VectorStore};

    fn point(id: &str, vector: Vec<f32>) -> VectorPoint {
        VectorPoint {
            fragment_id: crate::domain::FragmentId::from_string(id),
            vector,
            payload: VectorPayload {
                project_id: ProjectId::from_string("p1"),
                archivo: "e01".to_string(),
                par_idx: 0,
                speaker: None,
            },
        }
    }

    #[tokio::test]
    async fn fallback_path_used_when_backend_lacks_native_discovery() {
        let store = InMemoryVectorStore::new();
        store
            .upsert_batch(vec![point("f1", vec![1.0, 0.0]), point("f2", vec![0.0, 1.0])])
            .await
            .unwrap();
        let positive = vec![vec![1.0, 0.0]];
        let negative: Vec<Vec<f32>> = vec![];
        let req = DiscoverRequest {
            positive_vectors: &positive,
            negative_vectors: &negative,
            target_vector: None,
            project_id: ProjectId::from_string("p1"),
            top_k: 5,
            anchor_quality_threshold: 0.55,
        };
        let hits = discover_with(&store, req).await.unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].discovery_type, DiscoveryType::Fallback);
    }

    #[tokio::test]
    async fn no_positive_vectors_returns_empty() {
        let store = InMemoryVectorStore::new();
        let positive: Vec<Vec<f32>> = vec![];
        let negative: Vec<Vec<f32>> = vec![];
        let req = DiscoverRequest {
            positive_vectors: &positive,
            negative_vectors: &negative,
            target_vector: None,
            project_id: ProjectId::from_string("p1"),
            top_k: 5,
            anchor_quality_threshold: 0.55,
        };
        let hits = discover_with(&store, req).await.unwrap();
        assert!(hits.is_empty());
    }
}
