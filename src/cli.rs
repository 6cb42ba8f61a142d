//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use clap::Parser;
use std::path::PathBuf;

/// ClassInsight - exam statistics and teaching metrics for your classes
///
/// Analyze exam-response CSVs for per-question and per-student
/// performance, and extract teaching-style metrics from class
/// transcripts using a local LLM. Markdown/JSON reports.
///
/// Examples:
///   classinsight --exam data/exams/quiz1.csv
///   classinsight --exam data/exams --format json --output report.json
///   classinsight --transcript lecture.txt --model llama3.2:latest
///   classinsight --exam quiz1.csv --transcript lecture.txt --relevance
///   classinsight --metrics-json saved_reply.json
///   classinsight --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// Exam results CSV, or a directory of CSV files
    #[arg(short, long, value_name = "FILE|DIR")]
    pub exam: Option<PathBuf>,

    /// Class transcript (plain text) to analyze with the LLM
    #[arg(short, long, value_name = "FILE")]
    pub transcript: Option<PathBuf>,

    /// Saved LLM reply to aggregate without calling the model
    #[arg(long, value_name = "FILE", conflicts_with = "transcript")]
    pub metrics_json: Option<PathBuf>,

    /// Ollama model to use for transcript analysis
    ///
    /// Can also be set via CLASSINSIGHT_MODEL env var or .classinsight.toml config.
    #[arg(short, long, env = "CLASSINSIGHT_MODEL")]
    pub model: Option<String>,

    /// Ollama API endpoint URL
    #[arg(long, env = "OLLAMA_URL")]
    pub ollama_url: Option<String>,

    /// Temperature for LLM responses (0.0 - 1.0)
    #[arg(long)]
    pub temperature: Option<f32>,

    /// Request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Output file path for the report
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output format (markdown, json)
    #[arg(long, default_value = "markdown", value_name = "FORMAT")]
    pub format: OutputFormat,

    /// Number of concepts to keep in the top concepts list
    #[arg(long, value_name = "COUNT")]
    pub top_concepts: Option<usize>,

    /// Flag questions whose correct rate is below this fraction (0.0 - 1.0)
    #[arg(long, value_name = "RATE")]
    pub difficulty_threshold: Option<f64>,

    /// Clean the transcript with the LLM before extracting metrics
    #[arg(long)]
    pub clean: bool,

    /// Ask the LLM whether each problem question was covered in class
    ///
    /// Requires both --exam and --transcript.
    #[arg(long)]
    pub relevance: bool,

    /// Save the raw LLM metrics reply to this file
    #[arg(long, value_name = "FILE")]
    pub save_raw: Option<PathBuf>,

    /// Prompt file overriding the built-in cleaning prompt
    #[arg(long, value_name = "FILE")]
    pub cleaner_prompt: Option<PathBuf>,

    /// Prompt file overriding the built-in metrics prompt
    #[arg(long, value_name = "FILE")]
    pub analyzer_prompt: Option<PathBuf>,

    /// Path to configuration file
    ///
    /// If not specified, looks for .classinsight.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: load and validate inputs without calling the LLM
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .classinsight.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Markdown format (default)
    #[default]
    Markdown,
    /// JSON format
    Json,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        if self.exam.is_none() && self.transcript.is_none() && self.metrics_json.is_none() {
            return Err(
                "Nothing to analyze: pass --exam, --transcript or --metrics-json".to_string(),
            );
        }

        if self.relevance && (self.exam.is_none() || self.transcript.is_none()) {
            return Err("--relevance needs both --exam and --transcript".to_string());
        }

        if let Some(ref url) = self.ollama_url {
            if !url.starts_with("http://") && !url.starts_with("https://") {
                return Err("Ollama URL must start with 'http://' or 'https://'".to_string());
            }
        }

        if let Some(temperature) = self.temperature {
            if !(0.0..=1.0).contains(&temperature) {
                return Err("Temperature must be between 0.0 and 1.0".to_string());
            }
        }

        if let Some(threshold) = self.difficulty_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err("Difficulty threshold must be between 0.0 and 1.0".to_string());
            }
        }

        if self.top_concepts == Some(0) {
            return Err("Top concepts must be at least 1".to_string());
        }

        if self.timeout == Some(0) {
            return Err("Timeout must be at least 1 second".to_string());
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        for path in [&self.exam, &self.transcript, &self.metrics_json]
            .into_iter()
            .flatten()
        {
            if !path.exists() {
                return Err(format!("Input does not exist: {}", path.display()));
            }
        }

        Ok(())
    }

    /// Whether any step needs to talk to the model.
    pub fn needs_llm(&self) -> bool {
        !self.dry_run && self.transcript.is_some()
    }

    /// Returns the log level based on verbosity settings.
    ///
    /// `verbose_default` comes from the config file; `--quiet` still wins.
    pub fn log_level(&self, verbose_default: bool) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose || verbose_default {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn make_args(exam: &NamedTempFile) -> Args {
        Args {
            exam: Some(exam.path().to_path_buf()),
            transcript: None,
            metrics_json: None,
            model: None,
            ollama_url: None,
            temperature: None,
            timeout: None,
            output: None,
            format: OutputFormat::Markdown,
            top_concepts: None,
            difficulty_threshold: None,
            clean: false,
            relevance: false,
            save_raw: None,
            cleaner_prompt: None,
            analyzer_prompt: None,
            config: None,
            verbose: false,
            quiet: false,
            dry_run: false,
            init_config: false,
        }
    }

    #[test]
    fn test_validation_ok() {
        let exam = NamedTempFile::new().unwrap();
        assert!(make_args(&exam).validate().is_ok());
    }

    #[test]
    fn test_validation_requires_input() {
        let exam = NamedTempFile::new().unwrap();
        let mut args = make_args(&exam);
        args.exam = None;
        assert!(args.validate().is_err());

        args.init_config = true;
        assert!(args.validate().is_ok());
    }

    #[test]
    fn test_validation_missing_input_file() {
        let exam = NamedTempFile::new().unwrap();
        let mut args = make_args(&exam);
        args.transcript = Some(PathBuf::from("/nonexistent/lecture.txt"));
        let err = args.validate().unwrap_err();
        assert!(err.contains("lecture.txt"));
    }

    #[test]
    fn test_validation_relevance_needs_transcript() {
        let exam = NamedTempFile::new().unwrap();
        let mut args = make_args(&exam);
        args.relevance = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_ranges() {
        let exam = NamedTempFile::new().unwrap();
        let mut args = make_args(&exam);
        args.temperature = Some(1.5);
        assert!(args.validate().is_err());

        let mut args = make_args(&exam);
        args.difficulty_threshold = Some(-0.1);
        assert!(args.validate().is_err());

        let mut args = make_args(&exam);
        args.top_concepts = Some(0);
        assert!(args.validate().is_err());

        let mut args = make_args(&exam);
        args.ollama_url = Some("localhost:11434".to_string());
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_validation_conflicting_options() {
        let exam = NamedTempFile::new().unwrap();
        let mut args = make_args(&exam);
        args.verbose = true;
        args.quiet = true;
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_log_level() {
        let exam = NamedTempFile::new().unwrap();
        let mut args = make_args(&exam);
        assert_eq!(args.log_level(false), tracing::Level::INFO);
        assert_eq!(args.log_level(true), tracing::Level::DEBUG);

        args.verbose = true;
        assert_eq!(args.log_level(false), tracing::Level::DEBUG);

        args.verbose = false;
        args.quiet = true;
        assert_eq!(args.log_level(false), tracing::Level::ERROR);
        assert_eq!(args.log_level(true), tracing::Level::ERROR);
    }

    #[test]
    fn test_needs_llm() {
        let exam = NamedTempFile::new().unwrap();
        let mut args = make_args(&exam);
        assert!(!args.needs_llm());

        args.transcript = Some(PathBuf::from("lecture.txt"));
        assert!(args.needs_llm());

        args.dry_run = true;
        assert!(!args.needs_llm());
    }
}
