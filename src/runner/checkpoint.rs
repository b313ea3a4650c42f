//! Checkpoint/status/report shapes persisted and returned by the
//! Semantic-Runner. Field names mirror what the original system keeps in
//! its own checkpoint document (`archivos`, `visited_seeds_global`,
//! `union_by_id_global`, per-step counters, `cursor`) so a reader already
//! familiar with the original's checkpoint JSON recognizes this one.

use crate::domain::{FragmentId, ProjectId, RunnerStatus, RunnerTaskId};
use crate::ledger::InterviewOrder;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SeedStrategy {
    BestScore,
    First,
}

impl std::str::FromStr for SeedStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "best-score" => Ok(SeedStrategy::BestScore),
            "first" => Ok(SeedStrategy::First),
            other => Err(format!("unknown seed strategy: {other}")),
        }
    }
}

/// Caller-supplied parameters for one runner invocation. Persisted
/// verbatim into the checkpoint so a resumed run replays the same policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerInputs {
    pub org: String,
    pub project_id: ProjectId,
    pub seed_fragment_id: Option<FragmentId>,
    pub steps_per_interview: u32,
    pub top_k: usize,
    pub strategy: SeedStrategy,
    pub interview_order: InterviewOrder,
    pub max_interviews: Option<usize>,
    pub include_coded: bool,
    pub submit_candidates: bool,
    pub candidates_per_step: u32,
    pub save_memos: bool,
    pub llm_suggest: bool,
    pub llm_model: String,
    pub min_new_unique_per_step: u32,
    pub saturation_patience: u32,
    pub code_repeat_patience: u32,
    pub focus_codes: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct RunnerCounters {
    pub llm_calls: u64,
    pub llm_failures: u64,
    pub qdrant_retries: u64,
    pub qdrant_failures: u64,
    pub candidates_submitted: u64,
    pub memos_saved: u64,
}

/// The full resumable state of one run, written to C1 after every step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerCheckpoint {
    pub task_id: RunnerTaskId,
    #[serde(default)]
    pub resumed_from: Option<RunnerTaskId>,
    pub project_id: ProjectId,
    pub owner: String,
    pub inputs: RunnerInputs,
    pub archivos: Vec<String>,
    pub interview_index: usize,
    pub step_in_interview_completed: u32,
    pub next_seed: Option<FragmentId>,
    pub global_step_completed: u64,
    pub visited_seeds_global: HashSet<FragmentId>,
    /// Best score seen so far per fragment, across the whole run — the
    /// "global union" the original keeps to measure retrieval growth.
    pub union_by_id_global: HashMap<FragmentId, f32>,
    pub known_codes: HashSet<String>,
    pub counters: RunnerCounters,
    pub saturated: bool,
    pub status: RunnerStatus,
    pub errors: Vec<String>,
    pub no_growth_streak: u32,
    pub repeat_code_streak: u32,
    pub last_suggested_code: Option<String>,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

impl RunnerCheckpoint {
    pub fn fresh(task_id: RunnerTaskId, owner: String, archivos: Vec<String>, inputs: RunnerInputs) -> Self {
        let now = chrono::Utc::now();
        Self {
            task_id,
            resumed_from: None,
            project_id: inputs.project_id.clone(),
            owner,
            inputs,
            archivos,
            interview_index: 0,
            step_in_interview_completed: 0,
            next_seed: None,
            global_step_completed: 0,
            visited_seeds_global: HashSet::new(),
            union_by_id_global: HashMap::new(),
            known_codes: HashSet::new(),
            counters: RunnerCounters::default(),
            saturated: false,
            status: RunnerStatus::Pending,
            errors: Vec::new(),
            no_growth_streak: 0,
            repeat_code_streak: 0,
            last_suggested_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Carries every cursor field forward into a fresh task id, the
    /// resumed run's starting point — transcribes the original's
    /// `normalize_resume_state`.
    pub fn into_resumed(mut self, new_task_id: RunnerTaskId) -> Self {
        self.resumed_from = Some(self.task_id);
        self.task_id = new_task_id;
        self.status = RunnerStatus::Running;
        self.updated_at = chrono::Utc::now();
        self
    }

    pub fn logical_checkpoint_path(task_id: &RunnerTaskId) -> String {
        format!("logs/runner_checkpoints/{task_id}.json")
    }

    pub fn logical_report_path(task_id: &RunnerTaskId) -> String {
        format!("logs/runner_reports/{task_id}.json")
    }
}

/// A bounded, client-facing view of an in-flight or finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerStatusSnapshot {
    pub task_id: RunnerTaskId,
    pub status: RunnerStatus,
    pub current_step: u64,
    pub total_steps: u64,
    pub visited_seeds: usize,
    pub unique_suggestions: usize,
    pub memos_saved: u64,
    pub candidates_submitted: u64,
    pub llm_calls: u64,
    pub llm_failures: u64,
    pub qdrant_failures: u64,
    pub qdrant_retries: u64,
    pub saturated: bool,
    pub last_suggested_code: Option<String>,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostMortemReport {
    pub task_id: RunnerTaskId,
    pub status: RunnerStatus,
    pub steps_completed: u64,
    pub saturated: bool,
    pub counters: RunnerCounters,
    pub errors: Vec<String>,
    pub checkpoint_path: String,
    pub pending_before: u64,
    pub pending_after: u64,
}

#[derive(Debug, Clone)]
pub struct RunnerOutcome {
    pub task: crate::domain::RunnerTask,
    pub status: RunnerStatusSnapshot,
    pub checkpoint_path: String,
    pub report_path: String,
}
