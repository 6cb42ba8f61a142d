//! LLM access for transcript analysis.
//!
//! This module provides the Ollama client, the prompts sent to it, and the
//! decoding of its replies into teaching metrics.

pub mod analyzer;
pub mod client;
pub mod parser;
pub mod prompts;

#[cfg(test)]
mod test_server;

pub use analyzer::{AnalyzerPrompts, TranscriptAnalyzer};
pub use client::{LlmClient, LlmConfig};
pub use parser::{parse_metrics_reply, MetricsReply, MinuteAnalysis};
