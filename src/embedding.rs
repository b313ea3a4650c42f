//! Shared embedding seam: ingestion turns fragment text into vectors with
//! this trait, hybrid retrieval turns a query string into one with the
//! same trait. Mirrors the teacher's own `plexus::adapter::embedding`
//! split between a real backend and a deterministic stand-in — swapped
//! here from the teacher's node/context embedding shape to plain
//! text-in/vector-out, since this crate's embeddings are keyed by
//! `FragmentId`, not `NodeId`.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding backend unavailable: {0}")]
    Unavailable(String),
    #[error("embedding batch failed: {0}")]
    BatchFailed(String),
}

pub type EmbeddingResult<T> = Result<T, EmbeddingError>;

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>>;

    async fn embed_one(&self, text: &str) -> EmbeddingResult<Vec<f32>> {
        let mut batch = self.embed_batch(&[text.to_string()]).await?;
        batch
            .pop()
            .ok_or_else(|| EmbeddingError::BatchFailed("empty embedding batch".to_string()))
    }

    fn dimension(&self) -> usize;
}

/// Deterministic feature-hashing embedding (the "hashing trick"): each
/// whitespace token is hashed into a fixed-size bucket with a hashed sign,
/// and the result is L2-normalized. Used when the `embeddings` feature is
/// off and no caller-supplied vectors are given — unlike a plain digest of
/// the whole string, two texts sharing words land closer in cosine space,
/// so tests and local/offline runs still see meaningful nearest-neighbour
/// behavior instead of pure noise.
pub struct HashEmbedder {
    dimension: usize,
}

impl HashEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

fn token_digest(token: &str, salt: &str) -> [u8; 32] {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hasher.update(salt.as_bytes());
    hasher.finalize().into()
}

fn hash_vector(text: &str, dimension: usize) -> Vec<f32> {
    let mut out = vec![0.0f32; dimension];
    for token in text.to_lowercase().split_whitespace() {
        let bucket_digest = token_digest(token, "bucket");
        let bucket = (u32::from_le_bytes([
            bucket_digest[0],
            bucket_digest[1],
            bucket_digest[2],
            bucket_digest[3],
        ]) as usize)
            % dimension.max(1);
        let sign_digest = token_digest(token, "sign");
        let sign = if sign_digest[0] % 2 == 0 { 1.0 } else { -1.0 };
        out[bucket] += sign;
    }
    let norm = out.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in out.iter_mut() {
            *x /= norm;
        }
    }
    out
}

#[async_trait]
impl Embedder for HashEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| hash_vector(t, self.dimension)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// `fastembed`-backed embedder, gated behind the teacher's own
/// `embeddings` Cargo feature. The model is loaded once and called
/// synchronously per batch; callers on a multi-threaded runtime get
/// fairness from `tokio`'s scheduler the same way `rusqlite`'s blocking
/// calls already do elsewhere in this crate.
#[cfg(feature = "embeddings")]
pub struct FastEmbedEmbedder {
    model: std::sync::Mutex<fastembed::TextEmbedding>,
    dimension: usize,
}

#[cfg(feature = "embeddings")]
impl FastEmbedEmbedder {
    pub fn try_new() -> EmbeddingResult<Self> {
        let model = fastembed::TextEmbedding::try_new(Default::default())
            .map_err(|e| EmbeddingError::Unavailable(e.to_string()))?;
        Ok(Self {
            model: std::sync::Mutex::new(model),
            dimension: 384,
        })
    }
}

#[cfg(feature = "embeddings")]
#[async_trait]
impl Embedder for FastEmbedEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> EmbeddingResult<Vec<Vec<f32>>> {
        let model = self.model.lock().unwrap();
        let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        model
            .embed(refs, None)
            .map_err(|e| EmbeddingError::BatchFailed(e.to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_text_yields_identical_vectors() {
        let embedder = HashEmbedder::new(32);
        let a = embedder.embed_one("me sentia muy cansada").await.unwrap();
        let b = embedder.embed_one("me sentia muy cansada").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn shared_vocabulary_yields_higher_cosine_similarity() {
        let embedder = HashEmbedder::new(64);
        let seed = embedder.embed_one("llego el pueblo entero temprano").await.unwrap();
        let close = embedder.embed_one("pueblo entero llego temprano hoy").await.unwrap();
        let far = embedder.embed_one("el presupuesto municipal crecio este anio").await.unwrap();

        let cos = |a: &[f32], b: &[f32]| -> f32 {
            let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
            let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
            let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
            dot / (na * nb)
        };
        assert!(cos(&seed, &close) > cos(&seed, &far));
    }

    #[tokio::test]
    async fn dimension_is_reported() {
        let embedder = HashEmbedder::new(16);
        assert_eq!(embedder.dimension(), 16);
    }
}
