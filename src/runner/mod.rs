//! C9 — Semantic-Runner, the coding-discovery subsystem's hardest
//! component. `SemanticRunner::execute`/`resume` drive one `RunnerTask`
//! through every available interview, seed by seed, checkpointing after
//! each step so a crashed or cancelled run can pick up exactly where it
//! left off.
//!
//! Grounded step-for-step on the original's long-running coding-suggest
//! task: interview rotation via C7's theoretical-sampling order, per-seed
//! kNN with bounded retry (C3/`src/retry.rs`'s shared backoff), a
//! global/local best-score union of suggested fragments, optional LLM
//! code suggestion + memo (C10), optional candidate submission (C7's
//! ledger), and saturation bookkeeping against two independent patience
//! counters.

mod checkpoint;

pub use checkpoint::{
    PostMortemReport, RunnerCheckpoint, RunnerCounters, RunnerInputs, RunnerOutcome,
    RunnerStatusSnapshot, SeedStrategy,
};

use crate::artifact::{ArtifactError, ArtifactStore};
use crate::domain::{
    Auth, CandidateCode, CandidateId, CandidateStatus, EpistemicType, Fragment, FragmentId,
    MemoStatement, ProjectId, RunnerStatus, RunnerTask, RunnerTaskId, SourceOrigin,
};
use crate::graph::{GraphError, GraphStore};
use crate::ledger::{CandidateLedger, LedgerError};
use crate::llm::{LlmError, LlmGateway};
use crate::relational::{RelationalError, RelationalStore};
use crate::retry::sleep_backoff;
use crate::vector::{is_transient_vector_error, SearchFilter, SearchHit, VectorError, VectorStore};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error(transparent)]
    Relational(#[from] RelationalError),
    #[error(transparent)]
    Vector(#[from] VectorError),
    #[error(transparent)]
    Graph(#[from] GraphError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Ledger(#[from] LedgerError),
    #[error(transparent)]
    Llm(#[from] LlmError),
    #[error("checkpoint (de)serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("not authorized: {0}")]
    Forbidden(String),
    #[error("no checkpoint found for task '{0}'")]
    CheckpointNotFound(String),
    #[error("invalid runner input: {0}")]
    InvalidInput(String),
}

pub type RunnerResult<T> = Result<T, RunnerError>;

fn slugify(s: &str) -> String {
    s.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
        .collect()
}

pub struct SemanticRunner<V: VectorStore, G: GraphStore, A: ArtifactStore> {
    relational: Arc<RelationalStore>,
    vector: Arc<V>,
    graph: Arc<G>,
    artifact: Arc<A>,
    llm: Option<Arc<LlmGateway>>,
    ledger: Arc<CandidateLedger<V, G>>,
}

impl<V: VectorStore, G: GraphStore, A: ArtifactStore> SemanticRunner<V, G, A> {
    pub fn new(
        relational: Arc<RelationalStore>,
        vector: Arc<V>,
        graph: Arc<G>,
        artifact: Arc<A>,
        llm: Option<Arc<LlmGateway>>,
    ) -> Self {
        let ledger = Arc::new(CandidateLedger::new(relational.clone(), vector.clone(), graph.clone(), llm.clone()));
        Self { relational, vector, graph, artifact, llm, ledger }
    }

    /// Start a fresh run. `auth.user` becomes the task's owner.
    pub async fn execute(&self, auth: &Auth, inputs: RunnerInputs) -> RunnerResult<RunnerOutcome> {
        if inputs.top_k == 0 || inputs.steps_per_interview == 0 {
            return Err(RunnerError::InvalidInput(
                "top_k and steps_per_interview must both be greater than zero".to_string(),
            ));
        }
        let pending_before = self.relational.count_pending(&inputs.project_id)?;
        let focus_mode = !inputs.focus_codes.is_empty();
        let (ranked, _debug) = self.ledger.list_available_interviews(
            &inputs.project_id,
            inputs.interview_order,
            inputs.max_interviews.unwrap_or(usize::MAX),
            &[],
            false,
            false,
            focus_mode,
        )?;
        let archivos: Vec<String> = ranked.into_iter().map(|r| r.archivo).collect();
        let task_id = RunnerTaskId::new();
        let mut checkpoint = RunnerCheckpoint::fresh(task_id, auth.user.clone(), archivos, inputs);
        checkpoint.status = RunnerStatus::Running;

        if let Err(e) = self.run_loop(&mut checkpoint).await {
            checkpoint.status = RunnerStatus::Error;
            checkpoint.errors.push(e.to_string());
            let _ = self.write_checkpoint(&checkpoint).await;
            let _ = self.write_report(&checkpoint, pending_before).await;
            return Err(e);
        }
        self.finish(checkpoint, pending_before).await
    }

    /// Resume a prior task from its last checkpoint. Ownership is enforced
    /// exactly as the original's `_assert_checkpoint_access` does: the
    /// caller must be the checkpoint's owner, or an admin.
    pub async fn resume(
        &self,
        auth: &Auth,
        org: &str,
        project_id: &ProjectId,
        prior_task_id: &RunnerTaskId,
    ) -> RunnerResult<RunnerOutcome> {
        let path = RunnerCheckpoint::logical_checkpoint_path(prior_task_id);
        let bytes = self.artifact.get(org, project_id.as_str(), &path).await.map_err(|e| match e {
            ArtifactError::NotFound(_) => RunnerError::CheckpointNotFound(prior_task_id.to_string()),
            other => RunnerError::Artifact(other),
        })?;
        let saved: RunnerCheckpoint = serde_json::from_slice(&bytes)?;

        let prior_task = task_from_checkpoint(&saved);
        prior_task.authorize(auth).map_err(|e| RunnerError::Forbidden(e.to_string()))?;

        let pending_before = self.relational.count_pending(project_id)?;
        let mut checkpoint = saved.into_resumed(RunnerTaskId::new());

        if let Err(e) = self.run_loop(&mut checkpoint).await {
            checkpoint.status = RunnerStatus::Error;
            checkpoint.errors.push(e.to_string());
            let _ = self.write_checkpoint(&checkpoint).await;
            let _ = self.write_report(&checkpoint, pending_before).await;
            return Err(e);
        }
        self.finish(checkpoint, pending_before).await
    }

    fn pick_next_unvisited(&self, fragments: &[Fragment], visited: &HashSet<FragmentId>) -> Option<FragmentId> {
        fragments.iter().find(|f| !visited.contains(&f.fragment_id)).map(|f| f.fragment_id.clone())
    }

    async fn search_with_retries(
        &self,
        seed_vector: &[f32],
        project_id: &ProjectId,
        archivo: &str,
        top_k: usize,
        counters: &mut RunnerCounters,
    ) -> RunnerResult<Vec<SearchHit>> {
        let filter = SearchFilter::for_project(project_id.clone())
            .without_speaker_filter()
            .for_archivo(archivo.to_string());
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.vector.search(seed_vector, &filter, top_k).await {
                Ok(hits) => return Ok(hits),
                Err(e) if is_transient_vector_error(&e.to_string()) && attempt < 3 => {
                    counters.qdrant_retries += 1;
                    sleep_backoff(attempt).await;
                }
                Err(e) => {
                    counters.qdrant_failures += 1;
                    return Err(e.into());
                }
            }
        }
    }

    /// The per-step body: one seed, one kNN call, one optional LLM
    /// suggestion, one saturation update. Returns whether this step grew
    /// the global union by at least `min_new_unique_per_step`.
    async fn run_loop(&self, checkpoint: &mut RunnerCheckpoint) -> RunnerResult<()> {
        while checkpoint.interview_index < checkpoint.archivos.len() {
            let archivo = checkpoint.archivos[checkpoint.interview_index].clone();
            let fragments = self.relational.list_fragments(&checkpoint.project_id, Some(&archivo))?;
            if fragments.is_empty() {
                checkpoint.interview_index += 1;
                checkpoint.step_in_interview_completed = 0;
                checkpoint.next_seed = None;
                continue;
            }

            let mut visited_this_interview: HashSet<FragmentId> = HashSet::new();
            let mut local_union: HashMap<FragmentId, f32> = HashMap::new();

            let mut current_seed = if let Some(seed) = checkpoint.next_seed.clone() {
                seed
            } else if checkpoint.global_step_completed == 0 {
                checkpoint
                    .inputs
                    .seed_fragment_id
                    .clone()
                    .unwrap_or_else(|| fragments[0].fragment_id.clone())
            } else {
                fragments[0].fragment_id.clone()
            };

            let mut interview_saturated = false;
            while checkpoint.step_in_interview_completed < checkpoint.inputs.steps_per_interview && !interview_saturated {
                visited_this_interview.insert(current_seed.clone());
                checkpoint.visited_seeds_global.insert(current_seed.clone());

                let seed_vector = self.vector.get_vector(&checkpoint.project_id, &current_seed).await?;
                let Some(seed_vector) = seed_vector else {
                    match self.pick_next_unvisited(&fragments, &visited_this_interview) {
                        Some(next) => {
                            current_seed = next;
                            continue;
                        }
                        None => break,
                    }
                };

                let top_k = checkpoint.inputs.top_k + 1;
                let hits = self
                    .search_with_retries(&seed_vector, &checkpoint.project_id, &archivo, top_k, &mut checkpoint.counters)
                    .await?;

                let mut new_unique = 0u32;
                let mut step_suggestions: Vec<SearchHit> = Vec::new();
                for hit in hits {
                    if hit.fragment_id == current_seed {
                        continue;
                    }
                    if self.relational.get_fragment(&hit.fragment_id)?.is_none() {
                        continue;
                    }
                    let codes = self.relational.codes_for_fragment(&checkpoint.project_id, &hit.fragment_id)?;
                    if !codes.is_empty() && !checkpoint.inputs.include_coded {
                        continue;
                    }
                    let is_new_global = !checkpoint.union_by_id_global.contains_key(&hit.fragment_id);
                    if is_new_global {
                        new_unique += 1;
                    }
                    checkpoint
                        .union_by_id_global
                        .entry(hit.fragment_id.clone())
                        .and_modify(|s| {
                            if hit.score > *s {
                                *s = hit.score;
                            }
                        })
                        .or_insert(hit.score);
                    local_union
                        .entry(hit.fragment_id.clone())
                        .and_modify(|s| {
                            if hit.score > *s {
                                *s = hit.score;
                            }
                        })
                        .or_insert(hit.score);
                    step_suggestions.push(hit);
                }
                step_suggestions.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
                step_suggestions.truncate(8);

                if checkpoint.inputs.llm_suggest {
                    self.run_llm_step(checkpoint, &archivo, &current_seed, &step_suggestions).await?;
                }

                if new_unique < checkpoint.inputs.min_new_unique_per_step {
                    checkpoint.no_growth_streak += 1;
                } else {
                    checkpoint.no_growth_streak = 0;
                }
                if checkpoint.no_growth_streak >= checkpoint.inputs.saturation_patience
                    || checkpoint.repeat_code_streak >= checkpoint.inputs.code_repeat_patience
                {
                    checkpoint.saturated = true;
                    interview_saturated = true;
                }

                checkpoint.step_in_interview_completed += 1;
                checkpoint.global_step_completed += 1;

                let next = match checkpoint.inputs.strategy {
                    SeedStrategy::BestScore => local_union
                        .iter()
                        .filter(|(id, _)| !visited_this_interview.contains(*id))
                        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                        .map(|(id, _)| id.clone())
                        .or_else(|| self.pick_next_unvisited(&fragments, &visited_this_interview)),
                    SeedStrategy::First => self.pick_next_unvisited(&fragments, &visited_this_interview),
                };
                checkpoint.next_seed = next.clone();
                checkpoint.updated_at = chrono::Utc::now();
                self.write_checkpoint(checkpoint).await?;

                match next {
                    Some(n) => current_seed = n,
                    None => break,
                }
            }

            checkpoint.interview_index += 1;
            checkpoint.step_in_interview_completed = 0;
            checkpoint.next_seed = None;
            checkpoint.no_growth_streak = 0;
            checkpoint.repeat_code_streak = 0;
        }
        Ok(())
    }

    /// Ask the LLM Gateway for a code suggestion over the seed plus its
    /// top suggestions, then optionally save a memo and submit candidates.
    /// Failures are recorded but never abort the run — an LLM outage
    /// degrades a run to pure retrieval, it doesn't kill it.
    async fn run_llm_step(
        &self,
        checkpoint: &mut RunnerCheckpoint,
        archivo: &str,
        seed_id: &FragmentId,
        step_suggestions: &[SearchHit],
    ) -> RunnerResult<()> {
        let Some(llm) = &self.llm else { return Ok(()) };
        let Some(seed_fragment) = self.relational.get_fragment(seed_id)? else {
            return Ok(());
        };

        let pack = step_suggestions
            .iter()
            .map(|h| format!("- ({:.3}) fragment {}", h.score, h.fragment_id))
            .collect::<Vec<_>>()
            .join("\n");
        let system = "You assign a short grounded-theory open code to a qualitative fragment, \
                      using similar fragments only as context.";
        let user = format!(
            "Seed fragment: {}\nSimilar fragments considered:\n{}\nActive focus codes: {}\n\
             Reply as a single JSON object {{\"codigo\": \"...\", \"memo\": \"...\", \"confianza\": 0.0-1.0}}.",
            seed_fragment.text,
            pack,
            checkpoint.inputs.focus_codes.join(", "),
        );

        checkpoint.counters.llm_calls += 1;
        let obj = match llm.chat_json(system, &user, &checkpoint.inputs.llm_model, &["codigo", "memo"]).await {
            Ok(obj) => obj,
            Err(e) => {
                checkpoint.counters.llm_failures += 1;
                checkpoint.errors.push(format!("llm_suggest step {}: {e}", checkpoint.global_step_completed));
                return Ok(());
            }
        };
        let codigo = obj.get("codigo").and_then(|v| v.as_str()).map(str::to_string);
        let memo_text = obj.get("memo").and_then(|v| v.as_str()).map(str::to_string);
        let Some(codigo) = codigo else { return Ok(()) };

        checkpoint.known_codes.insert(codigo.clone());
        if checkpoint.last_suggested_code.as_deref() == Some(codigo.as_str()) {
            checkpoint.repeat_code_streak += 1;
        } else {
            checkpoint.repeat_code_streak = 0;
        }
        checkpoint.last_suggested_code = Some(codigo.clone());

        if checkpoint.inputs.save_memos {
            if let Some(memo_text) = &memo_text {
                self.write_memo(
                    &checkpoint.inputs,
                    &checkpoint.task_id,
                    archivo,
                    checkpoint.global_step_completed,
                    checkpoint.step_in_interview_completed,
                    &codigo,
                    memo_text,
                )
                .await?;
                checkpoint.counters.memos_saved += 1;
            }
        }

        if checkpoint.inputs.submit_candidates {
            let mut candidates = Vec::new();
            for hit in step_suggestions.iter().take(checkpoint.inputs.candidates_per_step as usize) {
                let Some(fragment) = self.relational.get_fragment(&hit.fragment_id)? else { continue };
                candidates.push(CandidateCode {
                    id: CandidateId::new(),
                    project_id: checkpoint.project_id.clone(),
                    codigo: codigo.clone(),
                    fragment_id: Some(fragment.fragment_id.clone()),
                    archivo: fragment.archivo.clone(),
                    cita: fragment.text.clone(),
                    source_origin: SourceOrigin::SemanticSuggestion,
                    score_confidence: hit.score,
                    status: CandidateStatus::Pendiente,
                    memo: memo_text
                        .as_ref()
                        .map(|m| MemoStatement::new(EpistemicType::Interpretation, m.clone(), vec![fragment.fragment_id.clone()])),
                    created_at: chrono::Utc::now(),
                    promoted_at: None,
                });
            }
            if !candidates.is_empty() {
                checkpoint.counters.candidates_submitted += candidates.len() as u64;
                self.relational.insert_candidates(&candidates)?;
            }
        }
        Ok(())
    }

    async fn write_memo(
        &self,
        inputs: &RunnerInputs,
        task_id: &RunnerTaskId,
        archivo: &str,
        global_step: u64,
        intra_step: u32,
        codigo: &str,
        memo_text: &str,
    ) -> RunnerResult<()> {
        let ts = chrono::Utc::now().format("%Y%m%dT%H%M%S");
        let path = format!(
            "notes/runner_semantic/{ts}_semantic_runner_{}_s{global_step}_i{intra_step}_{}.md",
            slugify(archivo),
            slugify(codigo),
        );
        let body = format!(
            "# Semantic-Runner memo\n\ntask: {task_id}\narchivo: {archivo}\ncodigo: {codigo}\n\n{memo_text}\n"
        );
        self.artifact
            .put(&inputs.org, inputs.project_id.as_str(), &path, body.into_bytes(), Some("text/markdown"))
            .await?;
        Ok(())
    }

    async fn write_checkpoint(&self, checkpoint: &RunnerCheckpoint) -> RunnerResult<()> {
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        let path = RunnerCheckpoint::logical_checkpoint_path(&checkpoint.task_id);
        self.artifact
            .put(&checkpoint.inputs.org, checkpoint.project_id.as_str(), &path, bytes, Some("application/json"))
            .await?;
        Ok(())
    }

    async fn write_report(&self, checkpoint: &RunnerCheckpoint, pending_before: u64) -> RunnerResult<String> {
        let pending_after = self.relational.count_pending(&checkpoint.project_id)?;
        let report = PostMortemReport {
            task_id: checkpoint.task_id.clone(),
            status: checkpoint.status,
            steps_completed: checkpoint.global_step_completed,
            saturated: checkpoint.saturated,
            counters: checkpoint.counters,
            errors: checkpoint.errors.clone(),
            checkpoint_path: RunnerCheckpoint::logical_checkpoint_path(&checkpoint.task_id),
            pending_before,
            pending_after,
        };
        let path = RunnerCheckpoint::logical_report_path(&checkpoint.task_id);
        self.artifact
            .put(
                &checkpoint.inputs.org,
                checkpoint.project_id.as_str(),
                &path,
                serde_json::to_vec_pretty(&report)?,
                Some("application/json"),
            )
            .await?;
        Ok(path)
    }

    async fn finish(&self, mut checkpoint: RunnerCheckpoint, pending_before: u64) -> RunnerResult<RunnerOutcome> {
        checkpoint.status = if checkpoint.saturated { RunnerStatus::Saturated } else { RunnerStatus::Completed };
        checkpoint.updated_at = chrono::Utc::now();
        self.write_checkpoint(&checkpoint).await?;
        let report_path = self.write_report(&checkpoint, pending_before).await?;
        let checkpoint_path = RunnerCheckpoint::logical_checkpoint_path(&checkpoint.task_id);
        let status = status_snapshot(&checkpoint);
        let task = task_from_checkpoint(&checkpoint);
        Ok(RunnerOutcome { task, status, checkpoint_path, report_path })
    }
}

fn task_from_checkpoint(c: &RunnerCheckpoint) -> RunnerTask {
    RunnerTask {
        id: c.task_id.clone(),
        project_id: c.project_id.clone(),
        owner: c.owner.clone(),
        status: c.status,
        archivos: c.archivos.clone(),
        resumed_from: c.resumed_from.clone(),
        created_at: c.created_at,
        updated_at: Some(c.updated_at),
    }
}

fn status_snapshot(c: &RunnerCheckpoint) -> RunnerStatusSnapshot {
    let total_steps = c.archivos.len() as u64 * c.inputs.steps_per_interview as u64;
    let message = match c.status {
        RunnerStatus::Saturated => "saturation patience exceeded".to_string(),
        RunnerStatus::Completed => "all interviews processed".to_string(),
        RunnerStatus::Error => c.errors.last().cloned().unwrap_or_default(),
        RunnerStatus::Running => "in progress".to_string(),
        RunnerStatus::Pending => "not started".to_string(),
    };
    RunnerStatusSnapshot {
        task_id: c.task_id.clone(),
        status: c.status,
        current_step: c.global_step_completed,
        total_steps,
        visited_seeds: c.visited_seeds_global.len(),
        unique_suggestions: c.union_by_id_global.len(),
        memos_saved: c.counters.memos_saved,
        candidates_submitted: c.counters.candidates_submitted,
        llm_calls: c.counters.llm_calls,
        llm_failures: c.counters.llm_failures,
        qdrant_failures: c.counters.qdrant_failures,
        qdrant_retries: c.counters.qdrant_retries,
        saturated: c.saturated,
        last_suggested_code: c.last_suggested_code.clone(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::MockArtifactStore;
    use crate::embedding::HashEmbedder;
    use crate::graph::InMemoryGraphStore;
    use crate::ingestion::{IngestionPipeline, SplitConfig, TranscriptDocument, Turn};
    use crate::ledger::InterviewOrder;
    use crate::vector::InMemoryVectorStore;

    async fn seeded_runner() -> (SemanticRunner<InMemoryVectorStore, InMemoryGraphStore, MockArtifactStore>, ProjectId) {
        let relational = Arc::new(RelationalStore::open_in_memory().unwrap());
        let vector = Arc::new(InMemoryVectorStore::new());
        let graph = Arc::new(InMemoryGraphStore::new());
        let artifact = Arc::new(MockArtifactStore::new(true));
        let embedder = Arc::new(HashEmbedder::new(32));
        let pipeline = IngestionPipeline::new(relational.clone(), vector.clone(), graph.clone(), embedder);

        let project = ProjectId::from_string("p1");
        let doc = TranscriptDocument {
            archivo: "e01.txt".to_string(),
            turns: vec![
                Turn { speaker: Some("interviewer".into()), text: "Que paso el dia de la inundacion?".into() },
                Turn { speaker: Some("participant".into()), text: "Llego el pueblo entero a ayudar esa noche.".into() },
                Turn { speaker: Some("participant".into()), text: "Nadie se quedo en casa, todos salimos a ayudar.".into() },
                Turn { speaker: Some("participant".into()), text: "El agua subio muy rapido esa madrugada.".into() },
            ],
            metadata: Default::default(),
        };
        pipeline.ingest_document(&project, &doc, &SplitConfig::default()).await.unwrap();

        let runner = SemanticRunner::new(relational, vector, graph, artifact, None);
        (runner, project)
    }

    fn base_inputs(project: ProjectId) -> RunnerInputs {
        RunnerInputs {
            org: "acme".to_string(),
            project_id: project,
            seed_fragment_id: None,
            steps_per_interview: 2,
            top_k: 3,
            strategy: SeedStrategy::First,
            interview_order: InterviewOrder::IngestAsc,
            max_interviews: None,
            include_coded: true,
            submit_candidates: false,
            candidates_per_step: 3,
            save_memos: false,
            llm_suggest: false,
            llm_model: "mini".to_string(),
            min_new_unique_per_step: 1,
            saturation_patience: 3,
            code_repeat_patience: 3,
            focus_codes: vec![],
        }
    }

    #[tokio::test]
    async fn execute_completes_and_writes_checkpoint_and_report() {
        let (runner, project) = seeded_runner().await;
        let auth = Auth { user: "alice".to_string(), is_admin: false };
        let outcome = runner.execute(&auth, base_inputs(project)).await.unwrap();

        assert!(matches!(outcome.status.status, RunnerStatus::Completed | RunnerStatus::Saturated));
        assert!(outcome.status.visited_seeds > 0);

        let saved = runner.artifact.get("acme", "p1", &outcome.checkpoint_path).await.unwrap();
        let restored: RunnerCheckpoint = serde_json::from_slice(&saved).unwrap();
        assert_eq!(restored.task_id, outcome.task.id);
        assert!(runner.artifact.get("acme", "p1", &outcome.report_path).await.is_ok());
    }

    #[tokio::test]
    async fn low_patience_drives_the_run_into_saturation() {
        let (runner, project) = seeded_runner().await;
        let auth = Auth { user: "alice".to_string(), is_admin: false };
        let mut inputs = base_inputs(project);
        inputs.min_new_unique_per_step = 100;
        inputs.saturation_patience = 1;
        inputs.steps_per_interview = 5;

        let outcome = runner.execute(&auth, inputs).await.unwrap();
        assert!(matches!(outcome.status.status, RunnerStatus::Saturated));
        assert!(outcome.status.saturated);
    }

    #[tokio::test]
    async fn resume_is_forbidden_for_a_non_owner() {
        let (runner, project) = seeded_runner().await;
        let owner = Auth { user: "alice".to_string(), is_admin: false };
        let outcome = runner.execute(&owner, base_inputs(project.clone())).await.unwrap();

        let intruder = Auth { user: "mallory".to_string(), is_admin: false };
        let err = runner.resume(&intruder, "acme", &project, &outcome.task.id).await;
        assert!(matches!(err, Err(RunnerError::Forbidden(_))));
    }

    #[tokio::test]
    async fn resume_assigns_a_new_task_id_linked_to_the_prior_one() {
        let (runner, project) = seeded_runner().await;
        let auth = Auth { user: "alice".to_string(), is_admin: false };
        let outcome = runner.execute(&auth, base_inputs(project.clone())).await.unwrap();

        let resumed = runner.resume(&auth, "acme", &project, &outcome.task.id).await.unwrap();
        assert_ne!(resumed.task.id, outcome.task.id);
        assert_eq!(resumed.task.resumed_from.as_ref(), Some(&outcome.task.id));
    }

    #[tokio::test]
    async fn resuming_an_unknown_task_reports_checkpoint_not_found() {
        let (runner, project) = seeded_runner().await;
        let auth = Auth { user: "alice".to_string(), is_admin: false };
        let ghost = RunnerTaskId::new();
        let err = runner.resume(&auth, "acme", &project, &ghost).await;
        assert!(matches!(err, Err(RunnerError::CheckpointNotFound(_))));
    }
}
