//! C1 — Tenant Artifact Store.
//!
//! A tenant-scoped blob store: every logical path is rooted under
//! `org/<org>/projects/<project>/`. Two implementations: `LocalArtifactStore`
//! (filesystem-backed, dev/test default) and `MockArtifactStore`
//! (in-memory double for unit tests), mirroring the teacher's own
//! production/mock client split for external services.

use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact store unavailable: {0}")]
    StorageUnavailable(String),
    #[error("tenant scope required for path '{0}'")]
    TenantRequired(String),
    #[error("transient I/O error: {0}")]
    TransientIo(String),
    #[error("artifact not found: {0}")]
    NotFound(String),
}

pub type ArtifactResult<T> = Result<T, ArtifactError>;

/// The receipt returned by a successful `put`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PutReceipt {
    pub url: String,
    pub name: String,
    pub sha256: String,
    pub bytes: usize,
}

#[derive(Debug, Clone)]
pub struct ArtifactMeta {
    pub logical_path: String,
    pub bytes: usize,
    pub content_type: Option<String>,
}

/// Compute the strict tenant prefix for a logical path.
pub fn tenant_prefix(org: &str, project: &str) -> String {
    format!("org/{org}/projects/{project}/")
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(
        &self,
        org: &str,
        project: &str,
        logical_path: &str,
        bytes: Vec<u8>,
        content_type: Option<&str>,
    ) -> ArtifactResult<PutReceipt>;

    async fn get(&self, org: &str, project: &str, logical_path: &str) -> ArtifactResult<Vec<u8>>;

    async fn list(&self, org: &str, project: &str, prefix: &str) -> ArtifactResult<Vec<ArtifactMeta>>;

    async fn delete_prefix(&self, org: &str, project: &str, prefix: &str) -> ArtifactResult<usize>;
}

/// Enforce the tenant prefix invariant: `org` and `project` must be
/// non-empty unless `allow_orgless` is set, matching the original
/// system's `ALLOW_ORGLESS_TASKS` escape hatch for local/dev runs.
fn check_tenant(org: &str, project: &str, allow_orgless: bool) -> ArtifactResult<()> {
    if (org.is_empty() || project.is_empty()) && !allow_orgless {
        return Err(ArtifactError::TenantRequired(format!(
            "org={org:?} project={project:?}"
        )));
    }
    Ok(())
}

/// Filesystem-backed artifact store rooted at a configured directory.
pub struct LocalArtifactStore {
    root: PathBuf,
    allow_orgless: bool,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>, allow_orgless: bool) -> Self {
        Self {
            root: root.into(),
            allow_orgless,
        }
    }

    fn resolve(&self, org: &str, project: &str, logical_path: &str) -> PathBuf {
        self.root
            .join("org")
            .join(org)
            .join("projects")
            .join(project)
            .join(logical_path)
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn put(
        &self,
        org: &str,
        project: &str,
        logical_path: &str,
        bytes: Vec<u8>,
        _content_type: Option<&str>,
    ) -> ArtifactResult<PutReceipt> {
        check_tenant(org, project, self.allow_orgless)?;
        let path = self.resolve(org, project, logical_path);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ArtifactError::TransientIo(e.to_string()))?;
        }
        let sha256 = sha256_hex(&bytes);
        let len = bytes.len();
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ArtifactError::TransientIo(e.to_string()))?;
        Ok(PutReceipt {
            url: format!("file://{}", path.display()),
            name: logical_path.to_string(),
            sha256,
            bytes: len,
        })
    }

    async fn get(&self, org: &str, project: &str, logical_path: &str) -> ArtifactResult<Vec<u8>> {
        check_tenant(org, project, self.allow_orgless)?;
        let path = self.resolve(org, project, logical_path);
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ArtifactError::NotFound(logical_path.to_string())
            } else {
                ArtifactError::TransientIo(e.to_string())
            }
        })
    }

    async fn list(&self, org: &str, project: &str, prefix: &str) -> ArtifactResult<Vec<ArtifactMeta>> {
        check_tenant(org, project, self.allow_orgless)?;
        let base = self.resolve(org, project, prefix);
        let mut out = Vec::new();
        walk(&base, &base, &mut out)
            .await
            .map_err(|e| ArtifactError::TransientIo(e.to_string()))?;
        Ok(out)
    }

    async fn delete_prefix(&self, org: &str, project: &str, prefix: &str) -> ArtifactResult<usize> {
        check_tenant(org, project, self.allow_orgless)?;
        let base = self.resolve(org, project, prefix);
        let mut out = Vec::new();
        let _ = walk(&base, &base, &mut out).await;
        let count = out.len();
        let _ = tokio::fs::remove_dir_all(&base).await;
        Ok(count)
    }
}

fn walk<'a>(
    root: &'a Path,
    dir: &'a Path,
    out: &'a mut Vec<ArtifactMeta>,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + 'a>> {
    Box::pin(async move {
        if !dir.is_dir() {
            if dir.is_file() {
                let meta = tokio::fs::metadata(dir).await?;
                out.push(ArtifactMeta {
                    logical_path: dir
                        .strip_prefix(root)
                        .unwrap_or(dir)
                        .to_string_lossy()
                        .to_string(),
                    bytes: meta.len() as usize,
                    content_type: None,
                });
            }
            return Ok(());
        }
        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.is_dir() {
                walk(root, &path, out).await?;
            } else {
                let meta = entry.metadata().await?;
                out.push(ArtifactMeta {
                    logical_path: path
                        .strip_prefix(root)
                        .unwrap_or(&path)
                        .to_string_lossy()
                        .to_string(),
                    bytes: meta.len() as usize,
                    content_type: None,
                });
            }
        }
        Ok(())
    })
}

/// In-memory double for tests: no filesystem access, deterministic.
#[derive(Default)]
pub struct MockArtifactStore {
    objects: DashMap<String, Vec<u8>>,
    allow_orgless: bool,
}

impl MockArtifactStore {
    pub fn new(allow_orgless: bool) -> Self {
        Self {
            objects: DashMap::new(),
            allow_orgless,
        }
    }

    fn key(org: &str, project: &str, logical_path: &str) -> String {
        format!("{}{}", tenant_prefix(org, project), logical_path)
    }
}

#[async_trait]
impl ArtifactStore for MockArtifactStore {
    async fn put(
        &self,
        org: &str,
        project: &str,
        logical_path: &str,
        bytes: Vec<u8>,
        _content_type: Option<&str>,
    ) -> ArtifactResult<PutReceipt> {
        check_tenant(org, project, self.allow_orgless)?;
        let key = Self::key(org, project, logical_path);
        let sha256 = sha256_hex(&bytes);
        let len = bytes.len();
        self.objects.insert(key.clone(), bytes);
        Ok(PutReceipt {
            url: format!("mock://{key}"),
            name: logical_path.to_string(),
            sha256,
            bytes: len,
        })
    }

    async fn get(&self, org: &str, project: &str, logical_path: &str) -> ArtifactResult<Vec<u8>> {
        check_tenant(org, project, self.allow_orgless)?;
        let key = Self::key(org, project, logical_path);
        self.objects
            .get(&key)
            .map(|v| v.clone())
            .ok_or_else(|| ArtifactError::NotFound(logical_path.to_string()))
    }

    async fn list(&self, org: &str, project: &str, prefix: &str) -> ArtifactResult<Vec<ArtifactMeta>> {
        check_tenant(org, project, self.allow_orgless)?;
        let scoped_prefix = format!("{}{}", tenant_prefix(org, project), prefix);
        Ok(self
            .objects
            .iter()
            .filter(|e| e.key().starts_with(&scoped_prefix))
            .map(|e| ArtifactMeta {
                logical_path: e
                    .key()
                    .strip_prefix(&tenant_prefix(org, project))
                    .unwrap_or(e.key())
                    .to_string(),
                bytes: e.value().len(),
                content_type: None,
            })
            .collect())
    }

    async fn delete_prefix(&self, org: &str, project: &str, prefix: &str) -> ArtifactResult<usize> {
        check_tenant(org, project, self.allow_orgless)?;
        let scoped_prefix = format!("{}{}", tenant_prefix(org, project), prefix);
        let to_remove: Vec<String> = self
            .objects
            .iter()
            .filter(|e| e.key().starts_with(&scoped_prefix))
            .map(|e| e.key().clone())
            .collect();
        let count = to_remove.len();
        for key in to_remove {
            self.objects.remove(&key);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_put_get_round_trip() {
        let store = MockArtifactStore::new(false);
        let receipt = store
            .put("acme", "proj1", "logs/a.json", b"hello".to_vec(), None)
            .await
            .unwrap();
        assert_eq!(receipt.bytes, 5);
        let got = store.get("acme", "proj1", "logs/a.json").await.unwrap();
        assert_eq!(got, b"hello");
    }

    #[tokio::test]
    async fn strict_mode_rejects_orgless_write() {
        let store = MockArtifactStore::new(false);
        let err = store.put("", "", "logs/a.json", b"x".to_vec(), None).await;
        assert!(matches!(err, Err(ArtifactError::TenantRequired(_))));
    }

    #[tokio::test]
    async fn orgless_allowed_when_configured() {
        let store = MockArtifactStore::new(true);
        let receipt = store.put("", "", "logs/a.json", b"x".to_vec(), None).await;
        assert!(receipt.is_ok());
    }

    #[tokio::test]
    async fn list_respects_tenant_scope() {
        let store = MockArtifactStore::new(false);
        store
            .put("acme", "proj1", "logs/a.json", b"x".to_vec(), None)
            .await
            .unwrap();
        store
            .put("acme", "proj2", "logs/b.json", b"y".to_vec(), None)
            .await
            .unwrap();
        let listed = store.list("acme", "proj1", "logs/").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].logical_path, "logs/a.json");
    }

    #[tokio::test]
    async fn delete_prefix_removes_only_matching() {
        let store = MockArtifactStore::new(false);
        store
            .put("acme", "proj1", "logs/a.json", b"x".to_vec(), None)
            .await
            .unwrap();
        store
            .put("acme", "proj1", "reports/a.json", b"y".to_vec(), None)
            .await
            .unwrap();
        let removed = store.delete_prefix("acme", "proj1", "logs/").await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("acme", "proj1", "reports/a.json").await.is_ok());
    }
}
