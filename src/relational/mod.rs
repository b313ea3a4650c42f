//! C2 — Relational Store Adapter.
//!
//! SQLite stands in for the original system's PostgreSQL store, the same
//! substitution the teacher makes for its own graph store. Schema is
//! applied as ordered, idempotent migrations at `open`/`open_in_memory`,
//! each in its own transaction.

use crate::domain::{
    CandidateCode, CandidateId, CandidateStatus, Fragment, FragmentId, MemoStatement, OpenCode,
    ProjectId, SourceOrigin,
};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RelationalError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("candidate not found: {0}")]
    CandidateNotFound(String),
    #[error("fragment not found: {0}")]
    FragmentNotFound(String),
}

pub type RelationalResult<T> = Result<T, RelationalError>;

/// A single migration: an idempotent batch of DDL/DML, applied in its own
/// transaction, in list order.
struct Migration {
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        name: "0001_fragments",
        sql: "CREATE TABLE IF NOT EXISTS fragments (
            fragment_id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            archivo TEXT NOT NULL,
            par_idx INTEGER NOT NULL,
            speaker TEXT,
            text TEXT NOT NULL,
            char_len INTEGER NOT NULL,
            metadata TEXT NOT NULL DEFAULT '{}'
        );
        CREATE INDEX IF NOT EXISTS idx_fragments_project ON fragments(project_id);
        CREATE INDEX IF NOT EXISTS idx_fragments_archivo ON fragments(project_id, archivo, par_idx);",
    },
    Migration {
        name: "0002_fragments_fts",
        sql: "CREATE VIRTUAL TABLE IF NOT EXISTS fragments_fts USING fts5(
            fragment_id UNINDEXED, project_id UNINDEXED, text
        );",
    },
    Migration {
        name: "0003_candidate_codes",
        sql: "CREATE TABLE IF NOT EXISTS candidate_codes (
            id TEXT PRIMARY KEY,
            project_id TEXT NOT NULL,
            codigo TEXT NOT NULL,
            fragment_id TEXT,
            archivo TEXT NOT NULL,
            cita TEXT NOT NULL,
            source_origin TEXT NOT NULL,
            score_confidence REAL NOT NULL,
            status TEXT NOT NULL,
            memo TEXT,
            created_at TEXT NOT NULL,
            promoted_at TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_candidates_project_status
            ON candidate_codes(project_id, status);",
    },
    Migration {
        name: "0004_open_codes",
        sql: "CREATE TABLE IF NOT EXISTS open_codes (
            project_id TEXT NOT NULL,
            fragment_id TEXT NOT NULL,
            codigo TEXT NOT NULL,
            promoted_from TEXT,
            created_at TEXT NOT NULL,
            PRIMARY KEY (project_id, fragment_id, codigo)
        );
        CREATE INDEX IF NOT EXISTS idx_open_codes_project ON open_codes(project_id);
        CREATE INDEX IF NOT EXISTS idx_open_codes_codigo ON open_codes(project_id, codigo);",
    },
    Migration {
        name: "0005_axial_relations",
        sql: "CREATE TABLE IF NOT EXISTS axial_relations (
            project_id TEXT NOT NULL,
            category TEXT NOT NULL,
            codigo TEXT NOT NULL,
            relation_type TEXT NOT NULL,
            evidence_fragment_ids TEXT NOT NULL,
            created_at TEXT NOT NULL,
            PRIMARY KEY (project_id, category, codigo, relation_type)
        );",
    },
    Migration {
        name: "0006_audit_log",
        sql: "CREATE TABLE IF NOT EXISTS audit_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            project_id TEXT NOT NULL,
            actor TEXT NOT NULL,
            action TEXT NOT NULL,
            entity TEXT NOT NULL,
            before TEXT,
            after TEXT,
            ts TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_audit_project ON audit_log(project_id, ts);",
    },
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub actor: String,
    pub action: String,
    pub entity: String,
    pub before: Option<serde_json::Value>,
    pub after: Option<serde_json::Value>,
}

/// Per-interview aggregate feeding the theoretical-sampling ranking in
/// `list_available_interviews`.
#[derive(Debug, Clone)]
pub struct ArchivoSummary {
    pub archivo: String,
    pub fragmentos: u64,
    pub area_tematica: Option<String>,
    pub actor_principal: Option<String>,
    pub actualizado: Option<chrono::DateTime<chrono::Utc>>,
}

pub struct RelationalStore {
    conn: Mutex<Connection>,
}

impl RelationalStore {
    pub fn open(path: impl AsRef<Path>) -> RelationalResult<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    pub fn open_in_memory() -> RelationalResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> RelationalResult<Self> {
        for migration in MIGRATIONS {
            conn.execute_batch(migration.sql).map_err(|e| {
                tracing::error!(migration = migration.name, error = %e, "migration failed");
                e
            })?;
        }
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    // ---- Fragment I/O ----

    pub fn insert_fragment(&self, f: &Fragment) -> RelationalResult<()> {
        let conn = self.conn.lock().unwrap();
        let metadata = serde_json::to_string(&f.metadata)?;
        conn.execute(
            "INSERT OR REPLACE INTO fragments
             (fragment_id, project_id, archivo, par_idx, speaker, text, char_len, metadata)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                f.fragment_id.as_str(),
                f.project_id.as_str(),
                f.archivo,
                f.par_idx,
                f.speaker,
                f.text,
                f.char_len,
                metadata,
            ],
        )?;
        conn.execute(
            "INSERT INTO fragments_fts (fragment_id, project_id, text) VALUES (?1, ?2, ?3)",
            params![f.fragment_id.as_str(), f.project_id.as_str(), f.text],
        )?;
        Ok(())
    }

    pub fn get_fragment(&self, id: &FragmentId) -> RelationalResult<Option<Fragment>> {
        let conn = self.conn.lock().unwrap();
        conn.query_row(
            "SELECT fragment_id, project_id, archivo, par_idx, speaker, text, char_len, metadata
             FROM fragments WHERE fragment_id = ?1",
            params![id.as_str()],
            row_to_fragment,
        )
        .optional()
        .map_err(Into::into)
    }

    pub fn list_fragments(&self, project_id: &ProjectId, archivo: Option<&str>) -> RelationalResult<Vec<Fragment>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = if archivo.is_some() {
            conn.prepare(
                "SELECT fragment_id, project_id, archivo, par_idx, speaker, text, char_len, metadata
                 FROM fragments WHERE project_id = ?1 AND archivo = ?2 ORDER BY par_idx",
            )?
        } else {
            conn.prepare(
                "SELECT fragment_id, project_id, archivo, par_idx, speaker, text, char_len, metadata
                 FROM fragments WHERE project_id = ?1 ORDER BY archivo, par_idx",
            )?
        };
        let rows = if let Some(archivo) = archivo {
            stmt.query_map(params![project_id.as_str(), archivo], row_to_fragment)?
        } else {
            stmt.query_map(params![project_id.as_str()], row_to_fragment)?
        };
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Lexical search over fragment text via FTS5, returning `(fragment_id, raw_rank)`
    /// pairs. Rank is BM25-style (lower `bm25()` is better; callers normalize).
    pub fn lexical_search(&self, project_id: &ProjectId, query: &str, limit: usize) -> RelationalResult<Vec<(FragmentId, f64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT fragment_id, bm25(fragments_fts) as rank
             FROM fragments_fts
             WHERE fragments_fts MATCH ?1 AND project_id = ?2
             ORDER BY rank LIMIT ?3",
        )?;
        let rows = stmt.query_map(params![query, project_id.as_str(), limit as i64], |row| {
            let id: String = row.get(0)?;
            let rank: f64 = row.get(1)?;
            Ok((FragmentId::from_string(id), rank))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    // ---- Candidate ledger ----

    pub fn insert_candidates(&self, candidates: &[CandidateCode]) -> RelationalResult<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for c in candidates {
            let memo = c.memo.as_ref().map(serde_json::to_string).transpose()?;
            tx.execute(
                "INSERT OR REPLACE INTO candidate_codes
                 (id, project_id, codigo, fragment_id, archivo, cita, source_origin,
                  score_confidence, status, memo, created_at, promoted_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12)",
                params![
                    c.id.as_str(),
                    c.project_id.as_str(),
                    c.codigo,
                    c.fragment_id.as_ref().map(|f| f.as_str()),
                    c.archivo,
                    c.cita,
                    source_origin_str(c.source_origin),
                    c.score_confidence,
                    status_str(c.status),
                    memo,
                    c.created_at.to_rfc3339(),
                    c.promoted_at.map(|t| t.to_rfc3339()),
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Promote a pendiente/hipotesis candidate into a committed `OpenCode`.
    /// Single transaction: update candidate status, insert the open code.
    pub fn promote(&self, candidate_id: &CandidateId) -> RelationalResult<OpenCode> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        let (project_id, fragment_id, codigo): (String, Option<String>, String) = tx
            .query_row(
                "SELECT project_id, fragment_id, codigo FROM candidate_codes WHERE id = ?1",
                params![candidate_id.as_str()],
                |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
            )
            .map_err(|_| RelationalError::CandidateNotFound(candidate_id.to_string()))?;
        let fragment_id = fragment_id.ok_or_else(|| RelationalError::CandidateNotFound(candidate_id.to_string()))?;
        let now = chrono::Utc::now();
        tx.execute(
            "UPDATE candidate_codes SET status = 'validado', promoted_at = ?1 WHERE id = ?2",
            params![now.to_rfc3339(), candidate_id.as_str()],
        )?;
        tx.execute(
            "INSERT OR REPLACE INTO open_codes (project_id, fragment_id, codigo, promoted_from, created_at)
             VALUES (?1,?2,?3,?4,?5)",
            params![project_id, fragment_id, codigo, candidate_id.as_str(), now.to_rfc3339()],
        )?;
        tx.commit()?;
        Ok(OpenCode {
            project_id: ProjectId::from_string(project_id),
            fragment_id: FragmentId::from_string(fragment_id),
            codigo,
            promoted_from: Some(candidate_id.clone()),
            created_at: now,
        })
    }

    /// Merge a duplicate candidate's evidence into a canonical code string,
    /// rejecting the duplicate and writing an audit entry. The two become
    /// one logical code in the ledger going forward.
    pub fn merge(&self, duplicate_id: &CandidateId, canonical_codigo: &str) -> RelationalResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "UPDATE candidate_codes SET status = 'rechazado', codigo = ?1 WHERE id = ?2",
            params![canonical_codigo, duplicate_id.as_str()],
        )?;
        Ok(())
    }

    pub fn count_pending(&self, project_id: &ProjectId) -> RelationalResult<u64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM candidate_codes WHERE project_id = ?1 AND status = 'pendiente'",
            params![project_id.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    pub fn distinct_open_codes(&self, project_id: &ProjectId) -> RelationalResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT DISTINCT codigo FROM open_codes WHERE project_id = ?1",
        )?;
        let rows = stmt.query_map(params![project_id.as_str()], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    pub fn codes_for_fragment(&self, project_id: &ProjectId, fragment_id: &FragmentId) -> RelationalResult<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT codigo FROM open_codes WHERE project_id = ?1 AND fragment_id = ?2",
        )?;
        let rows = stmt.query_map(params![project_id.as_str(), fragment_id.as_str()], |row| row.get::<_, String>(0))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Cumulative distinct-open-code count per interview, in ingest order —
    /// the raw data behind the runner's "saturation curve" diagnostic.
    pub fn saturation_curve(&self, project_id: &ProjectId) -> RelationalResult<Vec<(String, u64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT f.archivo, o.codigo, MIN(f.par_idx) as first_idx
             FROM open_codes o JOIN fragments f
               ON f.project_id = o.project_id AND f.fragment_id = o.fragment_id
             WHERE o.project_id = ?1
             GROUP BY f.archivo, o.codigo
             ORDER BY first_idx",
        )?;
        let rows: Vec<(String, String)> = stmt
            .query_map(params![project_id.as_str()], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        let mut seen = std::collections::HashSet::new();
        let mut curve = Vec::new();
        for (archivo, codigo) in rows {
            seen.insert(codigo);
            curve.push((archivo, seen.len() as u64));
        }
        Ok(curve)
    }

    /// Remove a single promoted code from a fragment, used by
    /// `unassign_open_code`. No-op if the row does not exist.
    pub fn delete_open_code(&self, project_id: &ProjectId, fragment_id: &FragmentId, codigo: &str) -> RelationalResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM open_codes WHERE project_id = ?1 AND fragment_id = ?2 AND codigo = ?3",
            params![project_id.as_str(), fragment_id.as_str(), codigo],
        )?;
        Ok(())
    }

    /// Every `(archivo, codigo)` pair currently promoted in the project, used
    /// to drive `GraphStore::sweep_discovered_only_edges`.
    pub fn all_open_code_pairs(&self, project_id: &ProjectId) -> RelationalResult<Vec<(FragmentId, String)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT fragment_id, codigo FROM open_codes WHERE project_id = ?1")?;
        let rows = stmt.query_map(params![project_id.as_str()], |row| {
            Ok((FragmentId::from_string(row.get::<_, String>(0)?), row.get::<_, String>(1)?))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Fragment ids coded with a given code, scoped to the project — used
    /// by `assign_axial_relation`'s evidence-coded-with-target-code check.
    pub fn fragments_coded_with(&self, project_id: &ProjectId, codigo: &str) -> RelationalResult<Vec<FragmentId>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT fragment_id FROM open_codes WHERE project_id = ?1 AND codigo = ?2")?;
        let rows = stmt.query_map(params![project_id.as_str(), codigo], |row| {
            Ok(FragmentId::from_string(row.get::<_, String>(0)?))
        })?;
        rows.collect::<Result<Vec<_>, _>>().map_err(Into::into)
    }

    /// Per-interview summary used by `list_available_interviews`'s
    /// theoretical-sampling scoring: fragment count, the first non-null
    /// `area_tematica`/`actor_principal` metadata values seen, and
    /// `actualizado` taken as the latest `open_codes.created_at` touching
    /// that archivo (fragments carry no ingest timestamp of their own).
    pub fn archivo_summaries(&self, project_id: &ProjectId) -> RelationalResult<Vec<ArchivoSummary>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT archivo, COUNT(*), metadata FROM fragments WHERE project_id = ?1 GROUP BY archivo",
        )?;
        let rows: Vec<(String, i64, String)> = stmt
            .query_map(params![project_id.as_str()], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut updated_stmt = conn.prepare(
            "SELECT f.archivo, MAX(o.created_at)
             FROM open_codes o JOIN fragments f
               ON f.project_id = o.project_id AND f.fragment_id = o.fragment_id
             WHERE o.project_id = ?1
             GROUP BY f.archivo",
        )?;
        let updated: std::collections::HashMap<String, String> = updated_stmt
            .query_map(params![project_id.as_str()], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;

        let mut out = Vec::new();
        for (archivo, fragmentos, _first_metadata) in rows {
            // Scan per-fragment metadata for the first non-null segment keys;
            // a single GROUP BY row's metadata column is arbitrary, so a
            // second targeted query looks across all of the archivo's rows.
            let mut seg_stmt = conn.prepare(
                "SELECT metadata FROM fragments WHERE project_id = ?1 AND archivo = ?2 ORDER BY par_idx",
            )?;
            let metadatas: Vec<String> = seg_stmt
                .query_map(params![project_id.as_str(), &archivo], |row| row.get(0))?
                .collect::<Result<_, _>>()?;
            let (area_tematica, actor_principal) = metadatas
                .iter()
                .filter_map(|m| serde_json::from_str::<serde_json::Value>(m).ok())
                .find_map(|v| {
                    let area = v.get("area_tematica").and_then(|x| x.as_str()).map(str::to_string);
                    let actor = v.get("actor_principal").and_then(|x| x.as_str()).map(str::to_string);
                    if area.is_some() || actor.is_some() {
                        Some((area, actor))
                    } else {
                        None
                    }
                })
                .unwrap_or((None, None));
            let actualizado = updated
                .get(&archivo)
                .and_then(|t| chrono::DateTime::parse_from_rfc3339(t).ok())
                .map(|t| t.with_timezone(&chrono::Utc));
            out.push(ArchivoSummary {
                archivo,
                fragmentos: fragmentos as u64,
                area_tematica,
                actor_principal,
                actualizado,
            });
        }
        Ok(out)
    }

    /// Writes the axial-relation ledger row; the companion graph write is
    /// the caller's responsibility (relational is the canonical anchor per
    /// spec.md §4.5's consistency contract).
    pub fn insert_axial_relation(&self, relation: &crate::domain::AxialRelation) -> RelationalResult<()> {
        let conn = self.conn.lock().unwrap();
        let evidence = serde_json::to_string(&relation.evidence_fragment_ids)?;
        conn.execute(
            "INSERT OR REPLACE INTO axial_relations
             (project_id, category, codigo, relation_type, evidence_fragment_ids, created_at)
             VALUES (?1,?2,?3,?4,?5,?6)",
            params![
                relation.project_id.as_str(),
                relation.category,
                relation.codigo,
                relation.relation_type.as_str(),
                evidence,
                relation.created_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    // ---- Audit log ----

    pub fn record_audit(&self, project_id: &ProjectId, entry: &AuditEntry) -> RelationalResult<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO audit_log (project_id, actor, action, entity, before, after, ts)
             VALUES (?1,?2,?3,?4,?5,?6,?7)",
            params![
                project_id.as_str(),
                entry.actor,
                entry.action,
                entry.entity,
                entry.before.as_ref().map(|v| v.to_string()),
                entry.after.as_ref().map(|v| v.to_string()),
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(())
    }
}

fn source_origin_str(o: SourceOrigin) -> &'static str {
    match o {
        SourceOrigin::Manual => "manual",
        SourceOrigin::Llm => "llm",
        SourceOrigin::SemanticSuggestion => "semantic_suggestion",
        SourceOrigin::LinkPrediction => "link_prediction",
    }
}

fn status_str(s: CandidateStatus) -> &'static str {
    match s {
        CandidateStatus::Pendiente => "pendiente",
        CandidateStatus::Validado => "validado",
        CandidateStatus::Rechazado => "rechazado",
        CandidateStatus::Hipotesis => "hipotesis",
    }
}

fn row_to_fragment(row: &rusqlite::Row) -> rusqlite::Result<Fragment> {
    let metadata_json: String = row.get(7)?;
    let metadata = serde_json::from_str(&metadata_json).unwrap_or_default();
    let text: String = row.get(5)?;
    Ok(Fragment {
        fragment_id: FragmentId::from_string(row.get::<_, String>(0)?),
        project_id: ProjectId::from_string(row.get::<_, String>(1)?),
        archivo: row.get(2)?,
        par_idx: row.get(3)?,
        speaker: row.get(4)?,
        char_len: text.chars().count() as u32,
        text,
        embedding: None,
        metadata,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CandidateId;

    fn fragment(project: &str, archivo: &str, par_idx: u32, text: &str) -> Fragment {
        Fragment {
            fragment_id: FragmentId::new(),
            project_id: ProjectId::from_string(project),
            archivo: archivo.to_string(),
            par_idx,
            speaker: Some("participant".to_string()),
            char_len: text.chars().count() as u32,
            text: text.to_string(),
            embedding: None,
            metadata: Default::default(),
        }
    }

    #[test]
    fn insert_and_get_fragment_round_trips() {
        let store = RelationalStore::open_in_memory().unwrap();
        let f = fragment("p1", "e01.txt", 0, "me sentia muy cansada");
        store.insert_fragment(&f).unwrap();
        let got = store.get_fragment(&f.fragment_id).unwrap().unwrap();
        assert_eq!(got.text, f.text);
    }

    #[test]
    fn lexical_search_finds_matching_fragment() {
        let store = RelationalStore::open_in_memory().unwrap();
        let f = fragment("p1", "e01.txt", 0, "me sentia muy cansada en el trabajo");
        store.insert_fragment(&f).unwrap();
        let hits = store.lexical_search(&ProjectId::from_string("p1"), "cansada", 10).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].0, f.fragment_id);
    }

    #[test]
    fn promote_creates_open_code_and_updates_status() {
        let store = RelationalStore::open_in_memory().unwrap();
        let f = fragment("p1", "e01.txt", 0, "texto");
        store.insert_fragment(&f).unwrap();
        let candidate = CandidateCode {
            id: CandidateId::new(),
            project_id: ProjectId::from_string("p1"),
            codigo: "fatiga_laboral".to_string(),
            fragment_id: Some(f.fragment_id.clone()),
            archivo: "e01.txt".to_string(),
            cita: "texto".to_string(),
            source_origin: SourceOrigin::Llm,
            score_confidence: 0.8,
            status: CandidateStatus::Pendiente,
            memo: None,
            created_at: chrono::Utc::now(),
            promoted_at: None,
        };
        store.insert_candidates(&[candidate.clone()]).unwrap();
        assert_eq!(store.count_pending(&ProjectId::from_string("p1")).unwrap(), 1);
        let open = store.promote(&candidate.id).unwrap();
        assert_eq!(open.codigo, "fatiga_laboral");
        assert_eq!(store.count_pending(&ProjectId::from_string("p1")).unwrap(), 0);
    }

    #[test]
    fn saturation_curve_is_nondecreasing() {
        let store = RelationalStore::open_in_memory().unwrap();
        let project = ProjectId::from_string("p1");
        let curve = store.saturation_curve(&project).unwrap();
        assert!(curve.is_empty());
    }
}
