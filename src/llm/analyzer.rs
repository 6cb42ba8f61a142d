//! Transcript cleaning, metrics extraction and question relevance checks.

use crate::llm::client::{make_final_prompt, LlmClient};
use crate::llm::parser::{parse_metrics_reply, parse_relevance_reply, MetricsReply};
use crate::llm::prompts::{relevance_prompt, SYSTEM_PROMPT};
use crate::models::QuestionRelevance;
use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Prompts used by the analyzer.
#[derive(Debug, Clone)]
pub struct AnalyzerPrompts {
    pub cleaner: String,
    pub analyzer: String,
}

/// Result of a metrics request: the decoded reply and the text it came from.
#[derive(Debug, Clone)]
pub struct MetricsResponse {
    pub reply: MetricsReply,
    pub raw_text: String,
}

/// Runs the model-backed passes over a transcript.
pub struct TranscriptAnalyzer {
    client: LlmClient,
    prompts: AnalyzerPrompts,
    show_progress: bool,
}

impl TranscriptAnalyzer {
    pub fn new(client: LlmClient, prompts: AnalyzerPrompts, show_progress: bool) -> Self {
        Self {
            client,
            prompts,
            show_progress,
        }
    }

    pub fn model_name(&self) -> &str {
        &self.client.config().model_name
    }

    /// Ask the model to tidy a raw transcript before analysis.
    pub async fn clean(&self, transcript: &str) -> Result<String> {
        info!("Cleaning transcript ({} chars)", transcript.len());
        let prompt = make_final_prompt(&self.prompts.cleaner, transcript);
        let cleaned = self
            .with_spinner(
                "Cleaning transcript...",
                self.client.generate(SYSTEM_PROMPT, &prompt, false),
            )
            .await?;

        if cleaned.trim().is_empty() {
            warn!("Cleaner returned an empty transcript, keeping the original");
            return Ok(transcript.to_string());
        }
        Ok(cleaned)
    }

    /// Ask the model for the minute-by-minute metrics of a transcript.
    pub async fn analyze(&self, transcript: &str) -> Result<MetricsResponse> {
        info!("Extracting teaching metrics with {}", self.model_name());
        let prompt = make_final_prompt(&self.prompts.analyzer, transcript);
        let raw_text = self
            .with_spinner(
                "Analyzing transcript...",
                self.client.generate(SYSTEM_PROMPT, &prompt, true),
            )
            .await?;

        Ok(MetricsResponse {
            reply: parse_metrics_reply(&raw_text),
            raw_text,
        })
    }

    /// Check each question against the transcript.
    ///
    /// Questions whose request fails or whose reply cannot be decoded are
    /// skipped with a warning.
    pub async fn check_relevance(
        &self,
        questions: &[String],
        transcript: &str,
    ) -> Vec<QuestionRelevance> {
        let mut verdicts = Vec::with_capacity(questions.len());

        for (i, question) in questions.iter().enumerate() {
            let prompt = make_final_prompt(&relevance_prompt(question), transcript);
            let message = format!("Checking question {}/{}...", i + 1, questions.len());

            let reply = match self
                .with_spinner(&message, self.client.generate(SYSTEM_PROMPT, &prompt, true))
                .await
            {
                Ok(reply) => reply,
                Err(e) => {
                    warn!("Relevance check failed for {:?}: {}", question, e);
                    continue;
                }
            };

            match parse_relevance_reply(question, &reply) {
                Some(verdict) => verdicts.push(verdict),
                None => warn!("Could not decode relevance verdict for {:?}", question),
            }
        }

        verdicts
    }

    async fn with_spinner<F, T>(&self, message: &str, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        if !self.show_progress {
            return fut.await;
        }

        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));

        let result = fut.await;
        pb.finish_and_clear();
        result
    }
}
