//! Turn-joining and fragment splitting: spec.md §4.5 steps 1-2.

use crate::domain::Metadata;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub speaker: Option<String>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptDocument {
    pub archivo: String,
    pub turns: Vec<Turn>,
    #[serde(default)]
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Copy)]
pub struct SplitConfig {
    pub min_chars: usize,
    pub max_chars: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self { min_chars: 200, max_chars: 1200 }
    }
}

/// Join consecutive turns sharing the same speaker label into one turn,
/// concatenated with a single space.
pub fn join_consecutive_speakers(turns: &[Turn]) -> Vec<Turn> {
    let mut out: Vec<Turn> = Vec::new();
    for turn in turns {
        if let Some(last) = out.last_mut() {
            if last.speaker == turn.speaker {
                last.text.push(' ');
                last.text.push_str(&turn.text);
                continue;
            }
        }
        out.push(turn.clone());
    }
    out
}

const SENTENCE_ENDERS: [char; 3] = ['.', '!', '?'];

/// Split `text` into fragments with `min_chars <= len <= max_chars`,
/// preferring a sentence boundary within the window. Falls back to a hard
/// split at `max_chars` when no boundary is found.
pub fn split_into_fragments(text: &str, cfg: &SplitConfig) -> Vec<String> {
    let text = text.trim();
    if text.is_empty() {
        return Vec::new();
    }
    if text.chars().count() <= cfg.max_chars {
        return vec![text.to_string()];
    }

    let chars: Vec<char> = text.chars().collect();
    let mut fragments = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let remaining = chars.len() - start;
        if remaining <= cfg.max_chars {
            push_fragment(&mut fragments, chars[start..].iter().collect(), cfg);
            break;
        }

        let window_end = (start + cfg.max_chars).min(chars.len());
        let window_start = start + cfg.min_chars.min(window_end - start);
        let mut split_at = None;
        for i in (window_start..window_end).rev() {
            if SENTENCE_ENDERS.contains(&chars[i]) {
                split_at = Some(i + 1);
                break;
            }
        }
        let end = split_at.unwrap_or(window_end);
        push_fragment(&mut fragments, chars[start..end].iter().collect(), cfg);
        start = end;
    }
    fragments
}

fn push_fragment(fragments: &mut Vec<String>, piece: String, cfg: &SplitConfig) {
    let trimmed = piece.trim().to_string();
    if trimmed.is_empty() {
        return;
    }
    // A sub-`min_chars` tail is merged into the previous fragment rather
    // than emitted on its own, unless it's the only fragment so far.
    if trimmed.chars().count() < cfg.min_chars {
        if let Some(last) = fragments.last_mut() {
            last.push(' ');
            last.push_str(&trimmed);
            return;
        }
    }
    fragments.push(trimmed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_consecutive_same_speaker_turns() {
        let turns = vec![
            Turn { speaker: Some("participant".into()), text: "Llego el pueblo entero.".into() },
            Turn { speaker: Some("participant".into()), text: "Nadie falto.".into() },
        ];
        let joined = join_consecutive_speakers(&turns);
        assert_eq!(joined.len(), 1);
        assert!(joined[0].text.contains("Llego el pueblo entero."));
        assert!(joined[0].text.contains("Nadie falto."));
    }

    #[test]
    fn different_speakers_are_not_joined() {
        let turns = vec![
            Turn { speaker: Some("interviewer".into()), text: "Que paso?".into() },
            Turn { speaker: Some("participant".into()), text: "Llego el pueblo entero.".into() },
        ];
        let joined = join_consecutive_speakers(&turns);
        assert_eq!(joined.len(), 2);
    }

    #[test]
    fn short_text_stays_a_single_fragment() {
        let cfg = SplitConfig { min_chars: 10, max_chars: 200 };
        let fragments = split_into_fragments("me sentia muy cansada en el trabajo", &cfg);
        assert_eq!(fragments.len(), 1);
    }

    #[test]
    fn long_text_splits_within_bounds() {
        let cfg = SplitConfig { min_chars: 20, max_chars: 60 };
        let text = "Una oracion larga para probar el corte. Otra oracion mas aqui para seguir probando. Y una tercera oracion final para cerrar el parrafo completo.";
        let fragments = split_into_fragments(text, &cfg);
        assert!(fragments.len() > 1);
        for f in &fragments {
            assert!(f.chars().count() <= cfg.max_chars + cfg.min_chars);
        }
    }

    #[test]
    fn empty_text_yields_no_fragments() {
        let cfg = SplitConfig::default();
        assert!(split_into_fragments("   ", &cfg).is_empty());
    }
}
