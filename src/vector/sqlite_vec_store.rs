//! `SqliteVecStore` — persistent vector storage via `sqlite-vec`, behind
//! the `vector-sqlite` feature. Generalizes
//! `plexus::storage::sqlite_vec::SqliteVecStore` from a single-dimension
//! per-context partition to a per-`project_id` partition (the teacher's
//! `context_id TEXT PARTITION KEY` column is renamed `project_id`).
//! Vectors are L2-normalized on insert; KNN uses L2 distance converted to
//! cosine similarity (`sim = 1 - dist^2 / 2`), same as the teacher.

use super::{
    SearchFilter, SearchHit, UpsertReport, VectorError, VectorPayload, VectorPoint, VectorResult,
    VectorStore,
};
use crate::domain::{FragmentId, ProjectId};
use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Mutex;

pub struct SqliteVecStore {
    conn: Mutex<Connection>,
    dimensions: usize,
}

fn register_vec_extension() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(sqlite3_vec_init as *const ())));
    });
}

fn l2_normalize(v: &mut [f32]) {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

fn f32_slice_as_bytes(slice: &[f32]) -> &[u8] {
    unsafe { std::slice::from_raw_parts(slice.as_ptr() as *const u8, slice.len() * 4) }
}

impl SqliteVecStore {
    pub fn open(path: &Path, dimensions: usize) -> VectorResult<Self> {
        register_vec_extension();
        let conn = Connection::open(path).map_err(|e| VectorError::Transport(e.to_string()))?;
        Self::init(conn, dimensions)
    }

    pub fn open_in_memory(dimensions: usize) -> VectorResult<Self> {
        register_vec_extension();
        let conn = Connection::open_in_memory().map_err(|e| VectorError::Transport(e.to_string()))?;
        Self::init(conn, dimensions)
    }

    fn init(conn: Connection, dimensions: usize) -> VectorResult<Self> {
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();
        let create_sql = format!(
            "CREATE VIRTUAL TABLE IF NOT EXISTS vec_fragments USING vec0(\
                 project_id TEXT PARTITION KEY,\
                 fragment_id TEXT,\
                 archivo TEXT,\
                 par_idx INTEGER,\
                 speaker TEXT,\
                 embedding float[{dimensions}]\
             )"
        );
        conn.execute_batch(&create_sql)
            .map_err(|e| VectorError::Transport(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
            dimensions,
        })
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn write_batch(&self, points: &[VectorPoint]) -> VectorResult<()> {
        let conn = self.conn.lock().unwrap();
        for p in points {
            if p.vector.len() != self.dimensions {
                return Err(VectorError::DimensionMismatch {
                    expected: self.dimensions,
                    got: p.vector.len(),
                });
            }
            let mut v = p.vector.clone();
            l2_normalize(&mut v);
            let bytes = f32_slice_as_bytes(&v);
            conn.execute(
                "INSERT OR REPLACE INTO vec_fragments(project_id, fragment_id, archivo, par_idx, speaker, embedding)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    p.payload.project_id.as_str(),
                    p.fragment_id.as_str(),
                    p.payload.archivo,
                    p.payload.par_idx,
                    p.payload.speaker,
                    bytes,
                ],
            )
            .map_err(|e| VectorError::Transport(e.to_string()))?;
        }
        Ok(())
    }

    fn knn(&self, query: &[f32], project_id: &ProjectId, archivo: Option<&str>, limit: usize) -> VectorResult<Vec<SearchHit>> {
        let mut normalized = query.to_vec();
        l2_normalize(&mut normalized);
        let conn = self.conn.lock().unwrap();
        let bytes = f32_slice_as_bytes(&normalized);
        let mut stmt = conn
            .prepare(
                "SELECT fragment_id, archivo, par_idx, speaker, distance
                 FROM vec_fragments
                 WHERE embedding MATCH ?1 AND project_id = ?2 AND k = ?3",
            )
            .map_err(|e| VectorError::Transport(e.to_string()))?;
        let rows = stmt
            .query_map(
                rusqlite::params![bytes, project_id.as_str(), limit.max(1) as i64],
                |row| {
                    let fragment_id: String = row.get(0)?;
                    let archivo: String = row.get(1)?;
                    let par_idx: u32 = row.get(2)?;
                    let speaker: Option<String> = row.get(3)?;
                    let distance: f32 = row.get(4)?;
                    Ok((fragment_id, archivo, par_idx, speaker, distance))
                },
            )
            .map_err(|e| VectorError::Transport(e.to_string()))?;

        let mut hits = Vec::new();
        for row in rows {
            let (fragment_id, row_archivo, par_idx, speaker, distance) =
                row.map_err(|e| VectorError::Transport(e.to_string()))?;
            if let Some(want) = archivo {
                if row_archivo != want {
                    continue;
                }
            }
            let similarity = 1.0 - (distance * distance) / 2.0;
            hits.push(SearchHit {
                fragment_id: FragmentId::from_string(fragment_id),
                score: similarity,
                payload: VectorPayload {
                    project_id: project_id.clone(),
                    archivo: row_archivo,
                    par_idx,
                    speaker,
                },
            });
        }
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(hits)
    }
}

#[async_trait]
impl VectorStore for SqliteVecStore {
    async fn upsert_batch(&self, points: Vec<VectorPoint>) -> VectorResult<UpsertReport> {
        let write_one = |batch: Vec<VectorPoint>| {
            let result = self.write_batch(&batch);
            async move { result }
        };
        super::split_on_fail_upsert(points, &write_one).await
    }

    async fn search(&self, vector: &[f32], filter: &SearchFilter, top_k: usize) -> VectorResult<Vec<SearchHit>> {
        // sqlite-vec has no native speaker exclusion; filter post-hoc like the
        // in-memory store, requesting extra candidates to absorb the filter.
        let hits = self.knn(vector, &filter.project_id, filter.archivo.as_deref(), top_k.max(3 * top_k).max(10))?;
        let mut out: Vec<SearchHit> = hits
            .into_iter()
            .filter(|h| {
                h.payload
                    .speaker
                    .as_ref()
                    .map(|s| !filter.exclude_speakers.contains(s))
                    .unwrap_or(true)
            })
            .collect();
        out.truncate(top_k);
        Ok(out)
    }

    async fn top1(&self, vector: &[f32], project_id: &ProjectId) -> VectorResult<Option<SearchHit>> {
        Ok(self.knn(vector, project_id, None, 1)?.into_iter().next())
    }

    async fn get_vector(&self, project_id: &ProjectId, fragment_id: &FragmentId) -> VectorResult<Option<Vec<f32>>> {
        let conn = self.conn.lock().unwrap();
        let bytes: Option<Vec<u8>> = conn
            .query_row(
                "SELECT embedding FROM vec_fragments WHERE project_id = ?1 AND fragment_id = ?2",
                rusqlite::params![project_id.as_str(), fragment_id.as_str()],
                |row| row.get(0),
            )
            .optional()
            .map_err(|e| VectorError::Transport(e.to_string()))?;
        Ok(bytes.map(|b| {
            b.chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        }))
    }

    fn supports_native_discovery(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: &str, vector: Vec<f32>) -> VectorPoint {
        VectorPoint {
            fragment_id: FragmentId::from_string(id),
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
    async fn upsert_and_search_round_trip() {
        let store = SqliteVecStore::open_in_memory(3).unwrap();
        store
            .upsert_batch(vec![point("f1", vec![0.9, 0.3, 0.1]), point("f2", vec![0.1, 0.2, 0.95])])
            .await
            .unwrap();
        let filter = SearchFilter::for_project(ProjectId::from_string("p1"));
        let hits = store.search(&[0.9, 0.3, 0.1], &filter, 5).await.unwrap();
        assert_eq!(hits[0].fragment_id, FragmentId::from_string("f1"));
    }

    #[tokio::test]
    async fn rejects_wrong_dimension_vectors() {
        let store = SqliteVecStore::open_in_memory(3).unwrap();
        let err = store.upsert_batch(vec![point("f1", vec![1.0, 2.0])]).await;
        assert!(matches!(err, Err(VectorError::DimensionMismatch { .. })));
    }
}
