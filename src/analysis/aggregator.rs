//! Teaching metrics aggregation.
//!
//! Folds the model's minute-by-minute analysis into whole-class metrics:
//! weighted concept frequencies, the teaching-style mix, per-minute
//! question/example counts and the professor/student talk split.

use crate::llm::MinuteAnalysis;
use crate::models::{
    ConceptFrequency, MetricsTotals, QuestionsExamplesPoint, TalkTimePoint, TeachingStyle,
    TranscriptMetrics,
};
use std::collections::{BTreeMap, HashMap};

/// Default number of concepts kept in `top_concepts`.
pub const DEFAULT_TOP_CONCEPTS: usize = 10;

/// Tuning knobs for aggregation.
#[derive(Debug, Clone, Copy)]
pub struct AggregateOptions {
    /// Maximum number of concepts to keep.
    pub top_n: usize,
}

impl Default for AggregateOptions {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_CONCEPTS,
        }
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Aggregate per-minute records into transcript metrics.
pub fn aggregate_minutes(minutes: &[MinuteAnalysis], options: AggregateOptions) -> TranscriptMetrics {
    let questions_examples = questions_examples(minutes);
    let talk_time = talk_time(minutes);
    let totals = compute_totals(&questions_examples, &talk_time, distinct_minutes(minutes));

    TranscriptMetrics {
        top_concepts: top_concepts(minutes, options.top_n),
        teaching_style: teaching_style(minutes),
        questions_examples,
        talk_time,
        totals,
    }
}

/// Tidy metrics the model aggregated itself so they obey the same rules.
///
/// Concepts are re-sorted and truncated, the style is normalised, the
/// series are ordered by minute and the totals are recomputed.
pub fn finalize_metrics(mut metrics: TranscriptMetrics, options: AggregateOptions) -> TranscriptMetrics {
    let mentions = metrics
        .top_concepts
        .iter()
        .map(|c| (c.concept.as_str(), c.frequency));
    metrics.top_concepts = rank_concepts(mentions, options.top_n);

    let style = metrics.teaching_style.normalized();
    metrics.teaching_style = round_style(style);

    let mut qe: BTreeMap<u32, (u32, u32)> = BTreeMap::new();
    for p in &metrics.questions_examples {
        let entry = qe.entry(p.minute).or_default();
        entry.0 += p.professor_questions;
        entry.1 += p.examples;
    }
    metrics.questions_examples = qe
        .into_iter()
        .map(|(minute, (q, e))| QuestionsExamplesPoint {
            minute,
            professor_questions: q,
            examples: e,
        })
        .collect();

    let mut talk: BTreeMap<u32, (f64, f64)> = BTreeMap::new();
    for p in &metrics.talk_time {
        let entry = talk.entry(p.minute).or_default();
        entry.0 += p.professor_percentage.max(0.0);
        entry.1 += p.student_percentage.max(0.0);
    }
    for p in &metrics.questions_examples {
        talk.entry(p.minute).or_default();
    }
    metrics.talk_time = talk
        .into_iter()
        .map(|(minute, (p, s))| talk_point(minute, p, s))
        .collect();

    let mut minutes: Vec<u32> = metrics
        .questions_examples
        .iter()
        .map(|p| p.minute)
        .chain(metrics.talk_time.iter().map(|p| p.minute))
        .collect();
    minutes.sort_unstable();
    minutes.dedup();

    metrics.totals = compute_totals(&metrics.questions_examples, &metrics.talk_time, minutes.len());
    metrics
}

fn distinct_minutes(minutes: &[MinuteAnalysis]) -> usize {
    let mut seen: Vec<u32> = minutes.iter().map(|m| m.minute).collect();
    seen.sort_unstable();
    seen.dedup();
    seen.len()
}

/// Weighted concept frequencies, most frequent first.
pub fn top_concepts(minutes: &[MinuteAnalysis], top_n: usize) -> Vec<ConceptFrequency> {
    let mentions = minutes
        .iter()
        .flat_map(|m| m.concepts.iter())
        .map(|c| (c.name(), c.weight()));
    rank_concepts(mentions, top_n)
}

/// Group `(name, weight)` pairs case-insensitively and rank them.
///
/// The first spelling seen is used for display. Ties are broken by name.
fn rank_concepts<'a>(
    mentions: impl Iterator<Item = (&'a str, f64)>,
    top_n: usize,
) -> Vec<ConceptFrequency> {
    let mut order: Vec<String> = Vec::new();
    let mut totals: HashMap<String, (String, f64)> = HashMap::new();

    for (name, weight) in mentions {
        let display = name.trim();
        if display.is_empty() || !weight.is_finite() || weight <= 0.0 {
            continue;
        }
        let key = display.to_lowercase();
        let entry = totals.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            (display.to_string(), 0.0)
        });
        entry.1 += weight;
    }

    let mut ranked: Vec<ConceptFrequency> = order
        .into_iter()
        .filter_map(|key| totals.remove(&key))
        .map(|(concept, frequency)| ConceptFrequency {
            concept,
            frequency: round_to(frequency, 2),
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.frequency
            .partial_cmp(&a.frequency)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.concept.to_lowercase().cmp(&b.concept.to_lowercase()))
    });
    ranked.truncate(top_n);
    ranked
}

/// Teaching-style mix across the class.
///
/// Each minute's scores are normalised first so every minute has the same
/// scale, then weighted by how much of the minute the professor was
/// talking. Minutes without talk data weigh 1.
pub fn teaching_style(minutes: &[MinuteAnalysis]) -> TeachingStyle {
    let styled: Vec<(TeachingStyle, f64)> = minutes
        .iter()
        .filter_map(|m| {
            let style = m.teaching_style?;
            if style.total() <= 0.0 {
                return None;
            }
            Some((style.normalized(), m.professor_share().unwrap_or(1.0)))
        })
        .collect();

    if styled.is_empty() {
        return TeachingStyle::default();
    }

    // If every weight is zero the professor never spoke; fall back to equal weights.
    let weighted = styled.iter().any(|(_, w)| *w > 0.0);

    let mut acc = TeachingStyle::default();
    for (style, share) in &styled {
        let w = if weighted { *share } else { 1.0 };
        acc.questioning += style.questioning * w;
        acc.explanation += style.explanation * w;
        acc.correcting += style.correcting * w;
        acc.encouraging += style.encouraging * w;
    }

    round_style(acc.normalized())
}

fn round_style(style: TeachingStyle) -> TeachingStyle {
    TeachingStyle {
        questioning: round_to(style.questioning, 4),
        explanation: round_to(style.explanation, 4),
        correcting: round_to(style.correcting, 4),
        encouraging: round_to(style.encouraging, 4),
    }
}

/// Professor questions and examples per distinct minute, ascending.
pub fn questions_examples(minutes: &[MinuteAnalysis]) -> Vec<QuestionsExamplesPoint> {
    let mut by_minute: BTreeMap<u32, (u32, u32)> = BTreeMap::new();

    for m in minutes {
        let entry = by_minute.entry(m.minute).or_default();
        entry.0 += m.professor_questions;
        entry.1 += m.examples;
    }

    by_minute
        .into_iter()
        .map(|(minute, (professor_questions, examples))| QuestionsExamplesPoint {
            minute,
            professor_questions,
            examples,
        })
        .collect()
}

/// Talk-time split per distinct minute, ascending.
///
/// Minutes that report no talk data come out as `0/0`.
pub fn talk_time(minutes: &[MinuteAnalysis]) -> Vec<TalkTimePoint> {
    let mut by_minute: BTreeMap<u32, (f64, f64)> = BTreeMap::new();

    for m in minutes {
        let entry = by_minute.entry(m.minute).or_default();
        entry.0 += m.professor_talk.unwrap_or(0.0).max(0.0);
        entry.1 += m.student_talk.unwrap_or(0.0).max(0.0);
    }

    by_minute
        .into_iter()
        .map(|(minute, (professor, student))| talk_point(minute, professor, student))
        .collect()
}

fn talk_point(minute: u32, professor: f64, student: f64) -> TalkTimePoint {
    let total = professor + student;
    if total > 0.0 {
        TalkTimePoint {
            minute,
            professor_percentage: round_to(professor / total, 4),
            student_percentage: round_to(student / total, 4),
        }
    } else {
        TalkTimePoint {
            minute,
            professor_percentage: 0.0,
            student_percentage: 0.0,
        }
    }
}

/// Whole-class totals from the per-minute series.
///
/// Talk ratios average the per-minute shares over minutes where anyone
/// spoke, so mixed units (seconds vs. fractions) do not skew the result.
pub fn compute_totals(
    questions_examples: &[QuestionsExamplesPoint],
    talk_time: &[TalkTimePoint],
    minutes_analyzed: usize,
) -> MetricsTotals {
    let professor_questions: u32 = questions_examples.iter().map(|p| p.professor_questions).sum();
    let examples: u32 = questions_examples.iter().map(|p| p.examples).sum();

    let per_minute = |count: u32| {
        if minutes_analyzed == 0 {
            0.0
        } else {
            round_to(count as f64 / minutes_analyzed as f64, 2)
        }
    };

    let spoken: Vec<&TalkTimePoint> = talk_time
        .iter()
        .filter(|p| p.professor_percentage + p.student_percentage > 0.0)
        .collect();
    let (professor_talk_ratio, student_talk_ratio) = if spoken.is_empty() {
        (0.0, 0.0)
    } else {
        let professor =
            spoken.iter().map(|p| p.professor_percentage).sum::<f64>() / spoken.len() as f64;
        (round_to(professor, 4), round_to(1.0 - professor, 4))
    };

    MetricsTotals {
        minutes_analyzed,
        professor_questions,
        examples,
        questions_per_minute: per_minute(professor_questions),
        examples_per_minute: per_minute(examples),
        professor_talk_ratio,
        student_talk_ratio,
    }
}

/// Generate a short text summary of transcript metrics.
pub fn generate_summary_text(metrics: &TranscriptMetrics) -> String {
    let mut lines = Vec::new();
    let totals = &metrics.totals;

    lines.push(format!("Minutes analyzed: {}", totals.minutes_analyzed));
    lines.push(format!(
        "Professor questions: {} ({:.2}/min)",
        totals.professor_questions, totals.questions_per_minute
    ));
    lines.push(format!(
        "Examples: {} ({:.2}/min)",
        totals.examples, totals.examples_per_minute
    ));
    lines.push(format!(
        "Talk time: professor {:.0}% | students {:.0}%",
        totals.professor_talk_ratio * 100.0,
        totals.student_talk_ratio * 100.0
    ));

    if let Some(style) = metrics.teaching_style.dominant() {
        lines.push(format!("Dominant style: {}", style));
    }

    if !metrics.top_concepts.is_empty() {
        let names: Vec<&str> = metrics
            .top_concepts
            .iter()
            .take(3)
            .map(|c| c.concept.as_str())
            .collect();
        lines.push(format!("Top concepts: {}", names.join(", ")));
    }

    lines.join("\n")
}
