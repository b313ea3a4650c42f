//! Interview ordering/ranking, transcribed from
//! `original_source/app/coding.py::_order_interviews_theoretical_sampling_with_debug`.
//! Strata are `(area_tematica, actor_principal)`; gap favours under-analysed
//! strata, richness is `log1p(fragments)/log1p(max)`, recency is linear in
//! `actualizado`, and weights shift toward gap when saturated or a
//! focus-codes directive is active.

use crate::relational::ArchivoSummary;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InterviewOrder {
    IngestDesc,
    IngestAsc,
    Alpha,
    FragmentsDesc,
    FragmentsAsc,
    MaxVariation,
    TheoreticalSampling,
}

impl std::str::FromStr for InterviewOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ingest-desc" => Ok(InterviewOrder::IngestDesc),
            "ingest-asc" => Ok(InterviewOrder::IngestAsc),
            "alpha" => Ok(InterviewOrder::Alpha),
            "fragments-desc" => Ok(InterviewOrder::FragmentsDesc),
            "fragments-asc" => Ok(InterviewOrder::FragmentsAsc),
            "max-variation" => Ok(InterviewOrder::MaxVariation),
            "theoretical-sampling" => Ok(InterviewOrder::TheoreticalSampling),
            other => Err(format!("unknown interview order: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RankedInterview {
    pub archivo: String,
    pub fragmentos: u64,
    pub score: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct InterviewScoreDebug {
    pub archivo: String,
    pub segment_key: (String, String),
    pub segment_analyzed_count: u32,
    pub gap_norm: f64,
    pub richness_norm: f64,
    pub recency_norm: f64,
    pub score: f64,
    pub excluded: bool,
    pub reason: Option<String>,
}

fn segment_key(s: &ArchivoSummary) -> (String, String) {
    (
        s.area_tematica.clone().unwrap_or_default(),
        s.actor_principal.clone().unwrap_or_default(),
    )
}

pub fn rank_interviews(
    summaries: Vec<ArchivoSummary>,
    order: InterviewOrder,
    limit: usize,
    analyzed_archivos: &[String],
    include_analyzed: bool,
    saturated: bool,
    focus_mode_active: bool,
) -> (Vec<RankedInterview>, Vec<InterviewScoreDebug>) {
    if order != InterviewOrder::TheoreticalSampling {
        let mut items = summaries;
        match order {
            InterviewOrder::IngestDesc => items.sort_by(|a, b| b.archivo.cmp(&a.archivo)),
            InterviewOrder::IngestAsc => items.sort_by(|a, b| a.archivo.cmp(&b.archivo)),
            InterviewOrder::Alpha => items.sort_by(|a, b| a.archivo.cmp(&b.archivo)),
            InterviewOrder::FragmentsDesc => items.sort_by(|a, b| b.fragmentos.cmp(&a.fragmentos)),
            InterviewOrder::FragmentsAsc => items.sort_by(|a, b| a.fragmentos.cmp(&b.fragmentos)),
            InterviewOrder::MaxVariation => items.sort_by(|a, b| segment_key(a).cmp(&segment_key(b))),
            InterviewOrder::TheoreticalSampling => unreachable!(),
        }
        items.truncate(limit);
        let ranked = items
            .into_iter()
            .map(|s| RankedInterview { archivo: s.archivo, fragmentos: s.fragmentos, score: None })
            .collect();
        return (ranked, Vec::new());
    }

    let analyzed: std::collections::HashSet<&str> = analyzed_archivos.iter().map(String::as_str).collect();

    let mut segment_analyzed_counts: HashMap<(String, String), u32> = HashMap::new();
    for s in &summaries {
        if analyzed.contains(s.archivo.as_str()) {
            *segment_analyzed_counts.entry(segment_key(s)).or_insert(0) += 1;
        }
    }

    let max_frags = summaries.iter().map(|s| s.fragmentos).max().unwrap_or(1).max(1);
    let timestamps: Vec<chrono::DateTime<chrono::Utc>> = summaries.iter().filter_map(|s| s.actualizado).collect();
    let min_dt = timestamps.iter().min().copied();
    let max_dt = timestamps.iter().max().copied();

    let (w_gap, w_rich, w_rec) = if saturated || focus_mode_active {
        (0.70, 0.20, 0.10)
    } else {
        (0.55, 0.25, 0.20)
    };

    let mut scored = Vec::new();
    let mut debug = Vec::new();
    let mut analyzed_tail = Vec::new();

    for s in summaries {
        let key = segment_key(&s);
        let has_report = analyzed.contains(s.archivo.as_str());

        if has_report && !include_analyzed {
            debug.push(InterviewScoreDebug {
                archivo: s.archivo.clone(),
                segment_key: key,
                segment_analyzed_count: segment_analyzed_counts.get(&segment_key(&s)).copied().unwrap_or(0),
                gap_norm: 0.0,
                richness_norm: 0.0,
                recency_norm: 0.0,
                score: 0.0,
                excluded: true,
                reason: Some("already_analyzed".to_string()),
            });
            continue;
        }
        if has_report {
            analyzed_tail.push(s);
            continue;
        }

        let gap = 1.0 / (1.0 + segment_analyzed_counts.get(&key).copied().unwrap_or(0) as f64).sqrt();
        let richness = (s.fragmentos as f64).ln_1p() / (max_frags as f64).ln_1p();
        let recency = match (min_dt, max_dt, s.actualizado) {
            (Some(min), Some(max), Some(dt)) if max > min => {
                let span = (max - min).num_milliseconds() as f64;
                ((dt - min).num_milliseconds() as f64 / span).clamp(0.0, 1.0)
            }
            _ => 0.0,
        };
        let score = w_gap * gap + w_rich * richness + w_rec * recency;

        debug.push(InterviewScoreDebug {
            archivo: s.archivo.clone(),
            segment_key: key,
            segment_analyzed_count: segment_analyzed_counts.get(&segment_key(&s)).copied().unwrap_or(0),
            gap_norm: gap,
            richness_norm: richness,
            recency_norm: recency,
            score,
            excluded: false,
            reason: None,
        });
        scored.push((score, s));
    }

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.1.actualizado.cmp(&a.1.actualizado))
            .then_with(|| b.1.archivo.cmp(&a.1.archivo))
    });

    let mut ordered: Vec<ArchivoSummary> = scored.into_iter().map(|(_, s)| s).collect();
    if include_analyzed {
        analyzed_tail.sort_by(|a, b| b.archivo.cmp(&a.archivo));
        ordered.extend(analyzed_tail);
    }
    ordered.truncate(limit);

    let score_by_archivo: HashMap<&str, f64> = debug.iter().filter(|d| !d.excluded).map(|d| (d.archivo.as_str(), d.score)).collect();
    let ranked = ordered
        .into_iter()
        .map(|s| RankedInterview {
            score: score_by_archivo.get(s.archivo.as_str()).copied(),
            archivo: s.archivo,
            fragmentos: s.fragmentos,
        })
        .collect();

    (ranked, debug)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(archivo: &str, fragmentos: u64, area: &str, actor: &str, minutes_ago: i64) -> ArchivoSummary {
        ArchivoSummary {
            archivo: archivo.to_string(),
            fragmentos,
            area_tematica: Some(area.to_string()),
            actor_principal: Some(actor.to_string()),
            actualizado: Some(chrono::Utc::now() - chrono::Duration::minutes(minutes_ago)),
        }
    }

    #[test]
    fn theoretical_sampling_favours_under_analysed_segments() {
        let summaries = vec![
            summary("e01.txt", 40, "salud", "paciente", 10),
            summary("e02.txt", 40, "salud", "paciente", 5),
            summary("e03.txt", 40, "vivienda", "inquilino", 1),
        ];
        let (ranked, debug) = rank_interviews(
            summaries,
            InterviewOrder::TheoreticalSampling,
            10,
            &["e01.txt".to_string()],
            false,
            false,
            false,
        );
        // e01 is analyzed and excluded; e03's segment has zero prior
        // analysis, so it should outrank e02 whose segment has one.
        assert!(!ranked.iter().any(|r| r.archivo == "e01.txt"));
        let e03_pos = ranked.iter().position(|r| r.archivo == "e03.txt").unwrap();
        let e02_pos = ranked.iter().position(|r| r.archivo == "e02.txt").unwrap();
        assert!(e03_pos < e02_pos);
        assert_eq!(debug.iter().find(|d| d.archivo == "e01.txt").unwrap().reason.as_deref(), Some("already_analyzed"));
    }

    #[test]
    fn saturation_shifts_weight_toward_gap() {
        let summaries = vec![summary("e01.txt", 10, "a", "b", 1)];
        let (ranked, debug) = rank_interviews(summaries, InterviewOrder::TheoreticalSampling, 10, &[], false, true, false);
        assert_eq!(ranked.len(), 1);
        // gap_norm for an unanalysed solo segment is 1.0; saturation weights
        // it at 0.70, which should dominate the single-interview score.
        assert_eq!(debug[0].gap_norm, 1.0);
        assert!(debug[0].score >= 0.70);
    }

    #[test]
    fn alpha_order_sorts_by_archivo_name() {
        let summaries = vec![summary("b.txt", 1, "a", "b", 1), summary("a.txt", 1, "a", "b", 1)];
        let (ranked, _) = rank_interviews(summaries, InterviewOrder::Alpha, 10, &[], false, false, false);
        assert_eq!(ranked[0].archivo, "a.txt");
    }
}
