//! Data models for classroom analytics.
//!
//! This module contains the core data structures used throughout the
//! application for representing exam responses, computed statistics,
//! transcript metrics, and reports.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Columns every exam CSV must carry, in reporting order.
pub const REQUIRED_COLUMNS: [&str; 11] = [
    "exam_id",
    "question_id",
    "question_text",
    "option_a",
    "option_b",
    "option_c",
    "option_d",
    "correct_option",
    "timestamp",
    "student_id",
    "selected_option",
];

/// Deserialize a field, reading an explicit JSON `null` as the type's default.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// A single student's answer to a single exam question.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExamResponse {
    pub exam_id: String,
    pub question_id: String,
    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_option: String,
    /// Raw timestamp as written in the CSV.
    pub timestamp: String,
    pub student_id: String,
    /// `None` when the student left the question blank.
    #[serde(default, deserialize_with = "blank_as_none")]
    pub selected_option: Option<String>,
}

fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value: Option<String> = Option::deserialize(deserializer)?;
    Ok(value.and_then(|s| {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }))
}

impl ExamResponse {
    /// Classify this response as correct, incorrect or missed.
    pub fn status(&self) -> AnswerStatus {
        match self.selected_option.as_deref() {
            None => AnswerStatus::Missed,
            Some(selected) if selected.trim() == self.correct_option.trim() => {
                AnswerStatus::Correct
            }
            Some(_) => AnswerStatus::Incorrect,
        }
    }

    /// Try to interpret the raw timestamp.
    ///
    /// Accepts RFC 3339 and the common `YYYY-MM-DD HH:MM[:SS]` layouts.
    pub fn parsed_timestamp(&self) -> Option<NaiveDateTime> {
        let raw = self.timestamp.trim();
        if raw.is_empty() {
            return None;
        }
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.naive_utc());
        }
        const FORMATS: [&str; 4] = [
            "%Y-%m-%d %H:%M:%S",
            "%Y-%m-%dT%H:%M:%S",
            "%Y-%m-%d %H:%M",
            "%d/%m/%Y %H:%M",
        ];
        FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .or_else(|| {
                chrono::NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            })
    }
}

/// Outcome of a single response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnswerStatus {
    Correct,
    Incorrect,
    Missed,
}

impl fmt::Display for AnswerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnswerStatus::Correct => write!(f, "Correct"),
            AnswerStatus::Incorrect => write!(f, "Incorrect"),
            AnswerStatus::Missed => write!(f, "Missed"),
        }
    }
}

impl AnswerStatus {
    /// Returns an emoji representation of the status.
    pub fn emoji(&self) -> &'static str {
        match self {
            AnswerStatus::Correct => "✅",
            AnswerStatus::Incorrect => "❌",
            AnswerStatus::Missed => "⚪",
        }
    }
}

/// Aggregated results for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionStats {
    pub question_id: String,
    pub question_text: String,
    pub total_responses: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub missed: usize,
    pub pct_correct: f64,
    pub pct_incorrect: f64,
    pub pct_missed: f64,
}

impl QuestionStats {
    /// Fraction of responses that were correct, in `[0, 1]`.
    pub fn correct_rate(&self) -> f64 {
        self.pct_correct / 100.0
    }
}

/// Aggregated results for one student.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudentStats {
    pub student_id: String,
    pub total_questions: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub missed: usize,
    /// Percentage of questions answered correctly.
    pub score: f64,
}

/// How often each option letter was picked for a question.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptionDistribution {
    pub question_id: String,
    pub question_text: String,
    pub correct_option: String,
    /// `(option letter, count)` ordered by option letter.
    pub selections: Vec<(String, usize)>,
    pub missed: usize,
}

/// One bar of the student score histogram.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoreBucket {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

impl ScoreBucket {
    /// Human-readable range label, e.g. `"40-50"`.
    pub fn label(&self) -> String {
        format!("{:.0}-{:.0}", self.lower, self.upper)
    }
}

/// Headline numbers for an exam.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OverallPerformance {
    pub average_score: f64,
    pub answered_correctly: usize,
    pub total_responses: usize,
    pub students: usize,
    pub questions: usize,
}

/// Full analysis of one exam file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamAnalysis {
    /// File the responses were loaded from.
    pub source: PathBuf,
    /// Distinct exam identifiers found in the file.
    pub exam_ids: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_response: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_response: Option<NaiveDateTime>,
    pub overall: OverallPerformance,
    /// Ordered by `(question_id, question_text)`.
    pub question_stats: Vec<QuestionStats>,
    /// Ordered by `student_id`.
    pub student_stats: Vec<StudentStats>,
    pub score_distribution: Vec<ScoreBucket>,
    pub option_distribution: Vec<OptionDistribution>,
    /// Questions below the configured difficulty threshold.
    pub difficult_questions: Vec<QuestionStats>,
}

impl ExamAnalysis {
    /// Question stats ordered by ascending percentage correct.
    pub fn question_performance(&self) -> Vec<&QuestionStats> {
        let mut ordered: Vec<&QuestionStats> = self.question_stats.iter().collect();
        ordered.sort_by(|a, b| {
            a.pct_correct
                .partial_cmp(&b.pct_correct)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ordered
    }

    /// Student stats ordered by descending score.
    pub fn student_ranking(&self) -> Vec<&StudentStats> {
        let mut ordered: Vec<&StudentStats> = self.student_stats.iter().collect();
        ordered.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ordered
    }
}

/// A concept and its weighted frequency across the transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConceptFrequency {
    pub concept: String,
    pub frequency: f64,
}

/// Share of teaching time spent in each style. Values sum to 1 (or are all 0).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TeachingStyle {
    #[serde(default, deserialize_with = "null_as_default")]
    pub questioning: f64,
    #[serde(default, alias = "explaining", deserialize_with = "null_as_default")]
    pub explanation: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub correcting: f64,
    #[serde(default, alias = "encouragement", deserialize_with = "null_as_default")]
    pub encouraging: f64,
}

impl TeachingStyle {
    pub fn total(&self) -> f64 {
        self.questioning + self.explanation + self.correcting + self.encouraging
    }

    /// Scale so the components sum to 1. An all-zero style stays zero.
    pub fn normalized(&self) -> Self {
        let total = self.total();
        if total <= 0.0 {
            return Self::default();
        }
        Self {
            questioning: self.questioning / total,
            explanation: self.explanation / total,
            correcting: self.correcting / total,
            encouraging: self.encouraging / total,
        }
    }

    /// `(label, share)` pairs in display order.
    pub fn entries(&self) -> [(&'static str, f64); 4] {
        [
            ("Questioning", self.questioning),
            ("Explanation", self.explanation),
            ("Correcting", self.correcting),
            ("Encouragement", self.encouraging),
        ]
    }

    /// The style with the largest share, if any share is non-zero.
    pub fn dominant(&self) -> Option<&'static str> {
        self.entries()
            .into_iter()
            .filter(|(_, v)| *v > 0.0)
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(name, _)| name)
    }
}

/// Professor questions and worked examples in one minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionsExamplesPoint {
    pub minute: u32,
    pub professor_questions: u32,
    pub examples: u32,
}

/// Talk-time split in one minute, as fractions in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TalkTimePoint {
    pub minute: u32,
    pub professor_percentage: f64,
    pub student_percentage: f64,
}

/// Whole-class totals derived from the per-minute series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetricsTotals {
    pub minutes_analyzed: usize,
    pub professor_questions: u32,
    pub examples: u32,
    pub questions_per_minute: f64,
    pub examples_per_minute: f64,
    pub professor_talk_ratio: f64,
    pub student_talk_ratio: f64,
}

/// Aggregate teaching metrics for a transcript.
///
/// Field names match what the dashboard charts consume.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMetrics {
    #[serde(default, deserialize_with = "null_as_default")]
    pub top_concepts: Vec<ConceptFrequency>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub teaching_style: TeachingStyle,
    #[serde(default, deserialize_with = "null_as_default")]
    pub questions_examples: Vec<QuestionsExamplesPoint>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub talk_time: Vec<TalkTimePoint>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub totals: MetricsTotals,
}

/// Model verdict on whether an exam question was covered in class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionRelevance {
    pub question: String,
    pub is_related: bool,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub explanation: String,
    #[serde(default)]
    pub supporting_evidence: Vec<String>,
}

/// Transcript section of a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptReport {
    /// Transcript or saved reply the metrics came from.
    pub source: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metrics: Option<TranscriptMetrics>,
    /// Model output that could not be decoded as metrics.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

/// Metadata about the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    /// Date and time of the analysis.
    pub analysis_date: DateTime<Utc>,
    /// Name of the LLM model used, if any call was made.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_used: Option<String>,
    pub exams_analyzed: usize,
    pub transcripts_analyzed: usize,
    /// Duration of the analysis in seconds.
    pub duration_seconds: f64,
}

/// The complete analytics report.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub metadata: ReportMetadata,
    pub exams: Vec<ExamAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript: Option<TranscriptReport>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub relevance: Vec<QuestionRelevance>,
}

impl Report {
    /// Creates an empty report with the given metadata.
    pub fn new(metadata: ReportMetadata) -> Self {
        Self {
            metadata,
            exams: Vec::new(),
            transcript: None,
            relevance: Vec::new(),
        }
    }
}
