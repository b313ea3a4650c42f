//! Memo statements: the epistemic annotations a coder (human or LLM) attaches
//! while working a fragment or assigning an axial relation.

use super::FragmentId;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EpistemicType {
    Observation,
    Interpretation,
    Hypothesis,
    NormativeInference,
}

/// A memo statement: a typed, evidence-linked annotation.
///
/// `new` enforces the normalization invariant at construction time so no
/// call site can produce an inconsistent memo: an `Observation` carrying no
/// evidence is demoted to `Interpretation`, since an observation claim
/// without cited evidence is, epistemically, just a reading of the coder's
/// own reasoning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoStatement {
    pub epistemic_type: EpistemicType,
    pub text: String,
    pub evidence_ids: Vec<FragmentId>,
}

impl MemoStatement {
    pub fn new(epistemic_type: EpistemicType, text: impl Into<String>, evidence_ids: Vec<FragmentId>) -> Self {
        let epistemic_type = if matches!(epistemic_type, EpistemicType::Observation) && evidence_ids.is_empty() {
            EpistemicType::Interpretation
        } else {
            epistemic_type
        };
        Self {
            epistemic_type,
            text: text.into(),
            evidence_ids,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_without_evidence_is_demoted() {
        let memo = MemoStatement::new(EpistemicType::Observation, "no cites", vec![]);
        assert_eq!(memo.epistemic_type, EpistemicType::Interpretation);
    }

    #[test]
    fn observation_with_evidence_is_kept() {
        let memo = MemoStatement::new(
            EpistemicType::Observation,
            "backed by evidence",
            vec![FragmentId::from_string("f1")],
        );
        assert_eq!(memo.epistemic_type, EpistemicType::Observation);
    }
}
