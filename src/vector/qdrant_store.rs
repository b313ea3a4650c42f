//! `QdrantVectorStore` — native vector backend with the Discovery API,
//! behind the `vector-native` feature. Transcribed from
//! `original_source/app/queries.py::discover_search`'s native path:
//! `ContextExamplePair` positive/negative pairs, surplus negatives paired
//! with the first positive, project-scoped `Filter`.

use super::{
    SearchFilter, SearchHit, UpsertReport, VectorError, VectorPayload, VectorPoint, VectorResult,
    VectorStore,
};
use crate::domain::{FragmentId, ProjectId};
use async_trait::async_trait;
use qdrant_client::qdrant::{
    Condition, ContextExamplePair, DiscoverPointsBuilder, Filter, GetPointsBuilder, PointStruct,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue,
};
use qdrant_client::Qdrant;
use std::collections::HashMap;

pub struct QdrantVectorStore {
    client: Qdrant,
    collection: String,
}

impl QdrantVectorStore {
    pub fn connect(url: &str, collection: impl Into<String>) -> VectorResult<Self> {
        let client = Qdrant::from_url(url)
            .build()
            .map_err(|e| VectorError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            collection: collection.into(),
        })
    }

    fn project_filter(project_id: &ProjectId) -> Filter {
        Filter::must([Condition::matches("project_id", project_id.as_str().to_string())])
    }

    fn payload_map(payload: &VectorPayload) -> HashMap<String, QdrantValue> {
        let mut map = HashMap::new();
        map.insert("project_id".to_string(), payload.project_id.as_str().into());
        map.insert("archivo".to_string(), payload.archivo.clone().into());
        map.insert("par_idx".to_string(), (payload.par_idx as i64).into());
        if let Some(speaker) = &payload.speaker {
            map.insert("speaker".to_string(), speaker.clone().into());
        }
        map
    }

    async fn write_batch(&self, points: &[VectorPoint]) -> VectorResult<()> {
        let structs: Vec<PointStruct> = points
            .iter()
            .map(|p| {
                PointStruct::new(
                    p.fragment_id.as_str().to_string(),
                    p.vector.clone(),
                    Self::payload_map(&p.payload),
                )
            })
            .collect();
        self.client
            .upsert_points(UpsertPointsBuilder::new(self.collection.clone(), structs))
            .await
            .map_err(|e| classify_error(e))?;
        Ok(())
    }
}

fn classify_error(e: qdrant_client::QdrantError) -> VectorError {
    let message = e.to_string();
    if super::is_transient_vector_error(&message) {
        VectorError::Transient { message, status: None }
    } else {
        VectorError::Transport(message)
    }
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    async fn upsert_batch(&self, points: Vec<VectorPoint>) -> VectorResult<UpsertReport> {
        let write_one = |batch: Vec<VectorPoint>| async move { self.write_batch(&batch).await };
        super::split_on_fail_upsert(points, &write_one).await
    }

    async fn search(&self, vector: &[f32], filter: &SearchFilter, top_k: usize) -> VectorResult<Vec<SearchHit>> {
        let mut must_not = Vec::new();
        for speaker in &filter.exclude_speakers {
            must_not.push(Condition::matches("speaker", speaker.clone()));
        }
        let mut must = vec![Condition::matches("project_id", filter.project_id.as_str().to_string())];
        if let Some(archivo) = &filter.archivo {
            must.push(Condition::matches("archivo", archivo.clone()));
        }
        let qfilter = Filter {
            must,
            must_not,
            ..Default::default()
        };
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(self.collection.clone(), vector.to_vec(), top_k as u64)
                    .filter(qfilter)
                    .with_payload(true),
            )
            .await
            .map_err(classify_error)?;
        Ok(response
            .result
            .into_iter()
            .filter_map(|point| to_hit(point, &filter.project_id))
            .collect())
    }

    async fn top1(&self, vector: &[f32], project_id: &ProjectId) -> VectorResult<Option<SearchHit>> {
        let response = self
            .client
            .search_points(
                SearchPointsBuilder::new(self.collection.clone(), vector.to_vec(), 1)
                    .filter(Self::project_filter(project_id))
                    .with_payload(true),
            )
            .await
            .map_err(classify_error)?;
        Ok(response.result.into_iter().next().and_then(|p| to_hit(p, project_id)))
    }

    async fn get_vector(&self, project_id: &ProjectId, fragment_id: &FragmentId) -> VectorResult<Option<Vec<f32>>> {
        let response = self
            .client
            .get_points(
                GetPointsBuilder::new(self.collection.clone(), vec![fragment_id.as_str().to_string().into()])
                    .with_vectors(true),
            )
            .await
            .map_err(classify_error)?;
        let Some(point) = response.result.into_iter().find(|p| {
            p.payload
                .get("project_id")
                .and_then(|v| v.as_str())
                .map(|p| p == project_id.as_str())
                .unwrap_or(false)
        }) else {
            return Ok(None);
        };
        let vector = match point.vectors.and_then(|v| v.vectors_options) {
            Some(qdrant_client::qdrant::vectors_output::VectorsOptions::Vector(v)) => Some(v.data),
            _ => None,
        };
        Ok(vector)
    }

    fn supports_native_discovery(&self) -> bool {
        true
    }

    async fn discover_native(
        &self,
        positive_ids: &[FragmentId],
        negative_ids: &[FragmentId],
        target: Option<&[f32]>,
        project_id: &ProjectId,
        top_k: usize,
    ) -> VectorResult<Vec<SearchHit>> {
        let mut context = Vec::new();
        for (i, pos) in positive_ids.iter().enumerate() {
            let neg = negative_ids.get(i);
            context.push(ContextExamplePair {
                positive: Some(pos.as_str().to_string().into()),
                negative: neg.map(|n| n.as_str().to_string().into()),
            });
        }
        if negative_ids.len() > positive_ids.len() {
            for neg in &negative_ids[positive_ids.len()..] {
                context.push(ContextExamplePair {
                    positive: positive_ids.first().map(|p| p.as_str().to_string().into()),
                    negative: Some(neg.as_str().to_string().into()),
                });
            }
        }

        let mut builder = DiscoverPointsBuilder::new(self.collection.clone(), top_k as u64)
            .context(context)
            .filter(Self::project_filter(project_id));
        if let Some(target) = target {
            builder = builder.target(target.to_vec());
        }
        let response = self.client.discover(builder).await.map_err(classify_error)?;
        Ok(response
            .result
            .into_iter()
            .filter_map(|point| to_hit(point, project_id))
            .collect())
    }
}

fn to_hit(point: qdrant_client::qdrant::ScoredPoint, project_id: &ProjectId) -> Option<SearchHit> {
    let id = match point.id?.point_id_options? {
        qdrant_client::qdrant::point_id::PointIdOptions::Uuid(u) => u,
        qdrant_client::qdrant::point_id::PointIdOptions::Num(n) => n.to_string(),
    };
    let payload = &point.payload;
    let archivo = payload.get("archivo").and_then(|v| v.as_str().map(str::to_string)).unwrap_or_default();
    let par_idx = payload.get("par_idx").and_then(|v| v.as_integer()).unwrap_or(0) as u32;
    let speaker = payload.get("speaker").and_then(|v| v.as_str().map(str::to_string));
    Some(SearchHit {
        fragment_id: FragmentId::from_string(id),
        score: point.score,
        payload: VectorPayload {
            project_id: project_id.clone(),
            archivo,
            par_idx,
            speaker,
        },
    })
}
