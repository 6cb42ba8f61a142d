//! Built-in prompts and prompt-file overrides.

use anyhow::{Context, Result};
use std::path::Path;

/// System prompt shared by every request.
pub const SYSTEM_PROMPT: &str = r#"You are an experienced instructional coach who reviews classroom transcripts.
Follow the output format you are given exactly. When asked for JSON, output only valid JSON, no explanations or markdown."#;

/// Instructions for the transcript cleaning pass.
pub const CLEANER_PROMPT: &str = r#"Clean the following class transcript.

- Remove filler words, timestamps noise and transcription artifacts.
- Label every turn as either "Professor:" or "Student:".
- Keep one turn per line and keep the original order.
- Insert a line "[minute N]" whenever a new minute of class begins, starting at 0.
- Do not summarize or drop content.

Output only the cleaned transcript."#;

/// Instructions for the per-minute metrics pass.
pub const ANALYZER_PROMPT: &str = r#"Analyze the following class transcript minute by minute.

Return a JSON object of this exact shape:
{"minutes": [
  {"minute": 0,
   "concepts": [{"concept": "name of a concept taught", "weight": 1.0}],
   "teaching_style": {"questioning": 0.0, "explanation": 0.0, "correcting": 0.0, "encouraging": 0.0},
   "professor_questions": 0,
   "examples": 0,
   "professor_talk": 0,
   "student_talk": 0}
]}

Rules:
- One entry per minute of class, minutes numbered from 0.
- "weight" is how central the concept was to that minute, between 0 and 1.
- "teaching_style" scores how much of the minute was spent on each style; they should sum to 1.
- "professor_questions" counts questions the professor asked the students.
- "examples" counts worked examples or illustrations given.
- "professor_talk" and "student_talk" are the seconds each side spoke during the minute.

Transcript:"#;

/// Instructions for checking whether an exam question was covered in class.
pub const RELEVANCE_PROMPT: &str = r#"Decide whether the exam question below is related to the content of the class transcript that follows it.

Return a JSON object of this exact shape:
{"is_related": true, "confidence": 0.0, "explanation": "one or two sentences", "supporting_evidence": ["short quote or paraphrase from the transcript"]}

"confidence" is between 0 and 1."#;

/// Use the prompt file at `path` if given, otherwise the built-in default.
pub fn load_prompt(path: Option<&Path>, default: &str) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read prompt file: {}", path.display())),
        None => Ok(default.to_string()),
    }
}

/// Build the relevance question block that precedes the transcript.
pub fn relevance_prompt(question: &str) -> String {
    format!("{}\n\nExam question: {}\n\nTranscript:", RELEVANCE_PROMPT, question)
}
