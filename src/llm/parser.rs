//! Decoding of model replies.
//!
//! Models are asked for JSON but tend to wrap it in Markdown fences or
//! prose, and sometimes return the aggregate shape directly instead of
//! the per-minute breakdown. Everything here is lenient: fields default
//! when absent and undecodable replies are kept as raw text.

use crate::models::{null_as_default, QuestionRelevance, TeachingStyle, TranscriptMetrics};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// A concept mentioned during a minute, as either a bare name or a weighted entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConceptMention {
    Name(String),
    Weighted {
        #[serde(alias = "name", alias = "topic")]
        concept: String,
        #[serde(
            default = "default_weight",
            alias = "relevance",
            alias = "frequency",
            deserialize_with = "null_as_default_weight"
        )]
        weight: f64,
    },
}

fn default_weight() -> f64 {
    1.0
}

fn null_as_default_weight<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_else(default_weight))
}

impl ConceptMention {
    pub fn name(&self) -> &str {
        match self {
            ConceptMention::Name(name) => name,
            ConceptMention::Weighted { concept, .. } => concept,
        }
    }

    /// Weight of the mention; negative or non-finite weights count as zero.
    pub fn weight(&self) -> f64 {
        let w = match self {
            ConceptMention::Name(_) => 1.0,
            ConceptMention::Weighted { weight, .. } => *weight,
        };
        if w.is_finite() && w > 0.0 {
            w
        } else {
            0.0
        }
    }
}

/// The model's analysis of one minute of class.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MinuteAnalysis {
    #[serde(default, deserialize_with = "null_as_default")]
    pub minute: u32,
    #[serde(default, alias = "topics", deserialize_with = "null_as_default")]
    pub concepts: Vec<ConceptMention>,
    #[serde(default)]
    pub teaching_style: Option<TeachingStyle>,
    #[serde(default, alias = "questions", deserialize_with = "null_as_default")]
    pub professor_questions: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub examples: u32,
    #[serde(default, alias = "professor_percentage", alias = "professor_talk_seconds")]
    pub professor_talk: Option<f64>,
    #[serde(default, alias = "student_percentage", alias = "student_talk_seconds")]
    pub student_talk: Option<f64>,
}

impl MinuteAnalysis {
    /// Professor talk share for the minute, if either side was reported.
    ///
    /// A side that was not reported counts as silent.
    pub fn professor_share(&self) -> Option<f64> {
        if self.professor_talk.is_none() && self.student_talk.is_none() {
            return None;
        }
        let professor = self.professor_talk.unwrap_or(0.0).max(0.0);
        let student = self.student_talk.unwrap_or(0.0).max(0.0);
        let total = professor + student;
        if total > 0.0 {
            Some(professor / total)
        } else {
            None
        }
    }
}

/// What the model sent back for a metrics request.
#[derive(Debug, Clone, PartialEq)]
pub enum MetricsReply {
    /// Per-minute breakdown to be aggregated locally.
    Minutes(Vec<MinuteAnalysis>),
    /// Already aggregated metrics.
    Aggregated(TranscriptMetrics),
    /// Text that could not be decoded.
    Raw(String),
}

/// Strip a surrounding Markdown code fence, if present.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }

    // Drop the opening fence line (which may carry a language tag).
    let body = match trimmed.find('\n') {
        Some(idx) => &trimmed[idx + 1..],
        None => return "",
    };

    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Find the first JSON object or array in free text.
fn extract_json(text: &str) -> Option<Value> {
    let cleaned = strip_code_fences(text);
    if let Ok(value) = serde_json::from_str::<Value>(cleaned) {
        return Some(value);
    }

    // Fall back to the outermost bracketed span, whichever bracket opens first.
    let mut spans: Vec<(usize, usize)> = [('{', '}'), ('[', ']')]
        .iter()
        .filter_map(|(open, close)| Some((cleaned.find(*open)?, cleaned.rfind(*close)?)))
        .filter(|(start, end)| start < end)
        .collect();
    spans.sort_unstable();

    spans
        .into_iter()
        .find_map(|(start, end)| serde_json::from_str::<Value>(&cleaned[start..=end]).ok())
}

/// Decode a metrics reply into minutes, aggregate metrics or raw text.
pub fn parse_metrics_reply(text: &str) -> MetricsReply {
    let Some(value) = extract_json(text) else {
        warn!("Model reply is not valid JSON, keeping raw text");
        return MetricsReply::Raw(text.to_string());
    };

    let minutes_value = match &value {
        Value::Array(_) => Some(value.clone()),
        Value::Object(map) => map
            .get("minutes")
            .or_else(|| map.get("minute_analysis"))
            .or_else(|| map.get("timeline"))
            .cloned(),
        _ => None,
    };

    if let Some(minutes_value) = minutes_value {
        match serde_json::from_value::<Vec<MinuteAnalysis>>(minutes_value) {
            Ok(minutes) => {
                debug!("Decoded {} minute records", minutes.len());
                return MetricsReply::Minutes(minutes);
            }
            Err(e) => warn!("Minute records did not match the expected shape: {}", e),
        }
    }

    if let Value::Object(map) = &value {
        let looks_aggregated = ["top_concepts", "teaching_style", "questions_examples", "talk_time"]
            .iter()
            .any(|k| map.contains_key(*k));
        if looks_aggregated {
            match serde_json::from_value::<TranscriptMetrics>(value.clone()) {
                Ok(metrics) => return MetricsReply::Aggregated(metrics),
                Err(e) => warn!("Aggregate metrics did not match the expected shape: {}", e),
            }
        }
    }

    MetricsReply::Raw(text.to_string())
}

/// Decode a relevance verdict for `question`.
///
/// Returns `None` when the reply carries no usable JSON object.
pub fn parse_relevance_reply(question: &str, text: &str) -> Option<QuestionRelevance> {
    let value = extract_json(text)?;
    let obj = value.as_object()?;

    let is_related = obj.get("is_related")?.as_bool()?;
    let confidence = obj
        .get("confidence")
        .and_then(Value::as_f64)
        .map(|c| if c > 1.0 { c / 100.0 } else { c })
        .unwrap_or(0.0)
        .clamp(0.0, 1.0);

    Some(QuestionRelevance {
        question: question.to_string(),
        is_related,
        confidence,
        explanation: obj
            .get("explanation")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        supporting_evidence: obj
            .get("supporting_evidence")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fences("```\n[1]\n```\n"), "[1]");
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }

    #[test]
    fn test_parse_minutes_object() {
        let reply = r#"```json
{"minutes": [
  {"minute": 0, "concepts": ["derivatives", {"concept": "limits", "weight": 0.5}],
   "teaching_style": {"explanation": 0.8, "questioning": 0.2},
   "professor_questions": 2, "examples": 1,
   "professor_percentage": 0.9, "student_percentage": 0.1}
]}
```"#;

        let MetricsReply::Minutes(minutes) = parse_metrics_reply(reply) else {
            panic!("expected minute records");
        };
        assert_eq!(minutes.len(), 1);
        let m = &minutes[0];
        assert_eq!(m.concepts.len(), 2);
        assert_eq!(m.concepts[0].name(), "derivatives");
        assert_eq!(m.concepts[0].weight(), 1.0);
        assert_eq!(m.concepts[1].weight(), 0.5);
        assert_eq!(m.professor_questions, 2);
        assert!((m.professor_share().unwrap() - 0.9).abs() < 1e-9);
        assert_eq!(m.teaching_style.unwrap().correcting, 0.0);
    }

    #[test]
    fn test_parse_minutes_bare_array_with_prose() {
        let reply = "Here is the analysis:\n[{\"minute\": 3, \"examples\": 4}]\nHope it helps.";
        let MetricsReply::Minutes(minutes) = parse_metrics_reply(reply) else {
            panic!("expected minute records");
        };
        assert_eq!(minutes[0].minute, 3);
        assert_eq!(minutes[0].examples, 4);
        assert!(minutes[0].concepts.is_empty());
    }

    #[test]
    fn test_parse_aggregated() {
        let reply = r#"{"top_concepts": [{"concept": "gravity", "frequency": 4}],
                        "teaching_style": {"questioning": 0.5, "explanation": 0.5}}"#;
        let MetricsReply::Aggregated(metrics) = parse_metrics_reply(reply) else {
            panic!("expected aggregate metrics");
        };
        assert_eq!(metrics.top_concepts[0].concept, "gravity");
        assert!(metrics.talk_time.is_empty());
    }

    #[test]
    fn test_parse_raw() {
        let reply = "Sorry, I cannot analyze this transcript.";
        assert_eq!(
            parse_metrics_reply(reply),
            MetricsReply::Raw(reply.to_string())
        );
    }

    #[test]
    fn test_professor_share() {
        let silent = MinuteAnalysis {
            professor_talk: Some(0.0),
            student_talk: Some(0.0),
            ..Default::default()
        };
        assert_eq!(silent.professor_share(), None);

        let seconds = MinuteAnalysis {
            professor_talk: Some(45.0),
            student_talk: Some(15.0),
            ..Default::default()
        };
        assert_eq!(seconds.professor_share(), Some(0.75));

        assert_eq!(MinuteAnalysis::default().professor_share(), None);

        let student_only = MinuteAnalysis {
            student_talk: Some(60.0),
            ..Default::default()
        };
        assert_eq!(student_only.professor_share(), Some(0.0));

        let professor_only = MinuteAnalysis {
            professor_talk: Some(30.0),
            ..Default::default()
        };
        assert_eq!(professor_only.professor_share(), Some(1.0));
    }

    #[test]
    fn test_parse_minutes_with_nulls() {
        let reply = r#"{"minutes": [
  {"minute": 0, "concepts": [{"concept": "limits", "weight": null}],
   "teaching_style": {"explanation": 1, "questioning": null},
   "professor_questions": 1, "examples": 2},
  {"minute": 1, "concepts": null, "teaching_style": null,
   "professor_questions": null, "examples": null,
   "professor_talk": null, "student_talk": 60}
]}"#;

        let MetricsReply::Minutes(minutes) = parse_metrics_reply(reply) else {
            panic!("expected minute records");
        };
        assert_eq!(minutes.len(), 2);
        assert_eq!(minutes[0].concepts[0].weight(), 1.0);
        assert_eq!(minutes[0].teaching_style.unwrap().questioning, 0.0);
        assert_eq!(minutes[1].minute, 1);
        assert!(minutes[1].concepts.is_empty());
        assert_eq!(minutes[1].professor_questions, 0);
        assert_eq!(minutes[1].examples, 0);
        assert_eq!(minutes[1].professor_talk, None);
        assert_eq!(minutes[1].professor_share(), Some(0.0));
    }

    #[test]
    fn test_parse_aggregated_with_nulls() {
        let reply = r#"{"top_concepts": null,
                        "teaching_style": {"questioning": null, "explanation": 2}}"#;
        let MetricsReply::Aggregated(metrics) = parse_metrics_reply(reply) else {
            panic!("expected aggregate metrics");
        };
        assert!(metrics.top_concepts.is_empty());
        assert_eq!(metrics.teaching_style.explanation, 2.0);
    }

    #[test]
    fn test_parse_relevance_reply() {
        let reply = r#"{"is_related": true, "confidence": 75,
                        "explanation": "Gravity was covered.",
                        "supporting_evidence": ["Minute 4 defines gravity"]}"#;
        let verdict = parse_relevance_reply("Explain gravity", reply).unwrap();
        assert!(verdict.is_related);
        assert_eq!(verdict.confidence, 0.75);
        assert_eq!(verdict.supporting_evidence.len(), 1);
        assert_eq!(verdict.question, "Explain gravity");

        assert!(parse_relevance_reply("Q", "no idea").is_none());
        assert!(parse_relevance_reply("Q", "{\"confidence\": 0.3}").is_none());
    }
}
