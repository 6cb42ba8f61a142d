//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.classinsight.toml` files.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default configuration file name.
pub const CONFIG_FILE_NAME: &str = ".classinsight.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Exam analysis settings.
    #[serde(default)]
    pub exam: ExamConfig,

    /// Transcript analysis settings.
    #[serde(default)]
    pub transcript: TranscriptConfig,

    /// Report settings.
    #[serde(default)]
    pub report: ReportConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Default output file path.
    #[serde(default = "default_output")]
    pub output: String,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            verbose: false,
        }
    }
}

fn default_output() -> String {
    "classinsight_report.md".to_string()
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Default model name.
    #[serde(default = "default_model")]
    pub name: String,

    /// Ollama API URL.
    #[serde(default = "default_ollama_url")]
    pub ollama_url: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Number of retries on transport failure.
    #[serde(default = "default_retries")]
    pub retries: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            name: default_model(),
            ollama_url: default_ollama_url(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            retries: default_retries(),
        }
    }
}

fn default_model() -> String {
    "llama3.2:latest".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.1
}

fn default_timeout() -> u64 {
    600 // long lectures produce large prompts
}

fn default_retries() -> usize {
    2
}

/// Exam analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExamConfig {
    /// Correct rate below which a question is flagged as difficult.
    #[serde(default = "default_difficulty_threshold")]
    pub difficulty_threshold: f64,

    /// Questions to review when every answer was correct.
    #[serde(default = "default_problem_fallback")]
    pub problem_fallback: usize,
}

impl Default for ExamConfig {
    fn default() -> Self {
        Self {
            difficulty_threshold: default_difficulty_threshold(),
            problem_fallback: default_problem_fallback(),
        }
    }
}

fn default_difficulty_threshold() -> f64 {
    crate::exam::stats::DEFAULT_DIFFICULTY_THRESHOLD
}

fn default_problem_fallback() -> usize {
    crate::exam::DEFAULT_PROBLEM_FALLBACK
}

/// Transcript analysis settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptConfig {
    /// Run the cleaning pass before extracting metrics.
    #[serde(default)]
    pub clean: bool,

    /// Number of concepts kept in the top concepts list.
    #[serde(default = "default_top_concepts")]
    pub top_concepts: usize,

    /// Prompt file overriding the built-in cleaning prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaner_prompt: Option<PathBuf>,

    /// Prompt file overriding the built-in metrics prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analyzer_prompt: Option<PathBuf>,
}

impl Default for TranscriptConfig {
    fn default() -> Self {
        Self {
            clean: false,
            top_concepts: default_top_concepts(),
            cleaner_prompt: None,
            analyzer_prompt: None,
        }
    }
}

fn default_top_concepts() -> usize {
    crate::analysis::DEFAULT_TOP_CONCEPTS
}

/// Report generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Include the per-student table.
    #[serde(default = "default_true")]
    pub include_students: bool,

    /// Include the per-question option breakdown.
    #[serde(default = "default_true")]
    pub include_option_distribution: bool,

    /// Include the per-minute transcript tables.
    #[serde(default = "default_true")]
    pub include_timeline: bool,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            include_students: true,
            include_option_distribution: true,
            include_timeline: true,
        }
    }
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        Self::load_from_dir(Path::new("."))
    }

    /// Try to load `.classinsight.toml` from a directory.
    pub fn load_from_dir(dir: &Path) -> Result<Option<Self>> {
        let config_path = dir.join(CONFIG_FILE_NAME);

        if config_path.exists() {
            Ok(Some(Self::load(&config_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values the user actually passed override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref url) = args.ollama_url {
            self.model.ollama_url = url.clone();
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }

        if let Some(threshold) = args.difficulty_threshold {
            self.exam.difficulty_threshold = threshold;
        }

        if let Some(top) = args.top_concepts {
            self.transcript.top_concepts = top;
        }
        if args.clean {
            self.transcript.clean = true;
        }
        if let Some(ref path) = args.cleaner_prompt {
            self.transcript.cleaner_prompt = Some(path.clone());
        }
        if let Some(ref path) = args.analyzer_prompt {
            self.transcript.analyzer_prompt = Some(path.clone());
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
