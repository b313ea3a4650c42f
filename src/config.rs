//! Environment-driven configuration, following the original system's
//! `load_settings()` pattern: every knob has a sane default so the crate
//! runs fully in-memory/local with no environment set, and every knob can
//! be overridden via env var for a deployed configuration.

use std::env;
use std::path::PathBuf;

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"),
        Err(_) => default,
    }
}

fn env_f32(key: &str, default: f32) -> f32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Runner defaults, named exactly as spec'd.
#[derive(Debug, Clone)]
pub struct RunnerDefaults {
    pub top_k: u32,
    pub steps_per_interview: u32,
    pub candidates_per_step: u32,
    pub saturation_patience: u32,
    pub code_repeat_patience: u32,
    pub min_new_unique_per_step: u32,
}

impl Default for RunnerDefaults {
    fn default() -> Self {
        Self {
            top_k: env_u32("STRATUM_RUNNER_TOP_K", 5),
            steps_per_interview: env_u32("STRATUM_RUNNER_STEPS_PER_INTERVIEW", 5),
            candidates_per_step: env_u32("STRATUM_RUNNER_CANDIDATES_PER_STEP", 5),
            saturation_patience: env_u32("STRATUM_RUNNER_SATURATION_PATIENCE", 3),
            code_repeat_patience: env_u32("STRATUM_RUNNER_CODE_REPEAT_PATIENCE", 3),
            min_new_unique_per_step: env_u32("STRATUM_RUNNER_MIN_NEW_UNIQUE_PER_STEP", 1),
        }
    }
}

/// Top-level configuration for all components, loaded from the process
/// environment (optionally preloaded from a `.env` file via `dotenvy`).
#[derive(Debug, Clone)]
pub struct Config {
    /// Root directory for `LocalArtifactStore`.
    pub artifact_root: PathBuf,
    /// Allow writes outside the strict `org/<org>/projects/<project>/` prefix.
    pub allow_orgless_tasks: bool,
    /// Allow `LocalArtifactStore` fallback when a tenant-backed store is unavailable.
    pub artifacts_allow_local_fallback: bool,
    /// Force the in-memory/mock artifact store even in non-test builds.
    pub force_mock_blobs: bool,

    /// Path to the relational SQLite database (":memory:" for ephemeral).
    pub relational_path: String,
    /// Path to the vector SQLite database, when the `embeddings` feature is on.
    pub vector_path: String,
    /// Neo4j connection URI, when the `graph-native` feature is on.
    pub graph_uri: String,
    pub graph_user: String,
    pub graph_password: String,

    /// Discovery anchor quality gate (native path only accepted above this).
    pub anchor_quality_threshold: f32,
    /// Hybrid retrieval fusion weight given to the lexical (BM25) score.
    pub bm25_weight: f32,

    /// LLM Gateway.
    pub llm_base_url: String,
    pub llm_api_key: String,
    pub llm_model_chat: String,
    pub llm_model_mini: String,
    pub llm_max_response_bytes: usize,
    pub llm_max_retries: u32,

    pub runner: RunnerDefaults,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            artifact_root: PathBuf::from(env_or("STRATUM_ARTIFACT_ROOT", "./artifacts")),
            allow_orgless_tasks: env_flag("ALLOW_ORGLESS_TASKS", false),
            artifacts_allow_local_fallback: env_flag("ARTIFACTS_ALLOW_LOCAL_FALLBACK", true),
            force_mock_blobs: env_flag("FORCE_MOCK_BLOBS", false),

            relational_path: env_or("STRATUM_RELATIONAL_PATH", ":memory:"),
            vector_path: env_or("STRATUM_VECTOR_PATH", ":memory:"),
            graph_uri: env_or("STRATUM_GRAPH_URI", "bolt://localhost:7687"),
            graph_user: env_or("STRATUM_GRAPH_USER", "neo4j"),
            graph_password: env_or("STRATUM_GRAPH_PASSWORD", ""),

            anchor_quality_threshold: env_f32("STRATUM_ANCHOR_QUALITY_THRESHOLD", 0.55),
            bm25_weight: env_f32("STRATUM_BM25_WEIGHT", 0.35),

            llm_base_url: env_or("STRATUM_LLM_BASE_URL", "https://api.openai.com/v1"),
            llm_api_key: env_or("STRATUM_LLM_API_KEY", ""),
            llm_model_chat: env_or("STRATUM_LLM_MODEL_CHAT", "gpt-4o"),
            llm_model_mini: env_or("STRATUM_LLM_MODEL_MINI", "gpt-4o-mini"),
            llm_max_response_bytes: 32_000,
            llm_max_retries: 3,

            runner: RunnerDefaults::default(),
        }
    }
}

impl Config {
    /// Load configuration from the environment, preloading a `.env` file
    /// if present (errors loading `.env` are ignored, matching the
    /// original system's best-effort `load_dotenv()` behavior).
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.anchor_quality_threshold, 0.55);
        assert_eq!(cfg.bm25_weight, 0.35);
        assert_eq!(cfg.runner.top_k, 5);
        assert_eq!(cfg.runner.saturation_patience, 3);
    }
}
