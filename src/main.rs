//! ClassInsight - classroom exam and transcript analytics
//!
//! A CLI tool that turns exam-response CSVs into per-question and
//! per-student statistics, and uses Ollama to extract teaching-style
//! metrics from class transcripts.
//!
//! Exit codes:
//!   0 - Success
//!   1 - Runtime error (bad input, connection, config, etc.)

mod analysis;
mod cli;
mod config;
mod exam;
mod llm;
mod models;
mod report;
mod transcript;

use analysis::{aggregate_minutes, finalize_metrics, generate_summary_text, AggregateOptions};
use anyhow::{bail, Context, Result};
use chrono::Utc;
use cli::{Args, OutputFormat};
use config::{Config, CONFIG_FILE_NAME};
use llm::{AnalyzerPrompts, LlmClient, LlmConfig, MetricsReply, TranscriptAnalyzer};
use models::{ExamAnalysis, ExamResponse, Report, ReportMetadata, TranscriptReport};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse_args();

    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Config is loaded before logging so `general.verbose` can pick the level.
    let (mut config, config_source) = match load_config(&args) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };
    config.merge_with_args(&args);

    init_logging(&args, &config);

    info!("ClassInsight v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);
    info!("Configuration: {}", config_source);

    match run(args, config).await {
        Ok(exit_code) => std::process::exit(exit_code),
        Err(e) => {
            error!("Analysis failed: {:#}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .classinsight.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE_NAME);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            CONFIG_FILE_NAME
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", CONFIG_FILE_NAME))?;

    println!("✅ Created {} with default settings.", CONFIG_FILE_NAME);
    println!("   Edit it to customize the model, thresholds, prompts and report sections.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args, config: &Config) {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level(config.general.verbose))
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load configuration from file or use defaults.
///
/// Runs before logging is set up, so it returns a description of where the
/// settings came from instead of logging it.
fn load_config(args: &Args) -> Result<(Config, String)> {
    if let Some(ref config_path) = args.config {
        let config = Config::load(config_path)?;
        return Ok((config, config_path.display().to_string()));
    }

    match Config::load_default() {
        Ok(Some(config)) => Ok((config, CONFIG_FILE_NAME.to_string())),
        Ok(None) => Ok((Config::default(), "defaults".to_string())),
        Err(e) => {
            eprintln!("⚠️  Failed to load config, using defaults: {:#}", e);
            Ok((Config::default(), "defaults".to_string()))
        }
    }
}

/// Run the requested analyses. Returns the exit code.
async fn run(args: Args, config: Config) -> Result<i32> {
    let start_time = Instant::now();

    // Step 1: exam statistics
    let mut exams: Vec<ExamAnalysis> = Vec::new();
    let mut all_responses: Vec<ExamResponse> = Vec::new();

    if let Some(ref exam_path) = args.exam {
        for file in exam_files(exam_path)? {
            println!("📥 Loading exam data: {}", file.display());
            let responses = exam::load_exam_data(&file)?;

            let analysis =
                exam::analyze_exam_answers(&file, &responses, config.exam.difficulty_threshold);
            info!(
                "{}: {} responses, {} questions, {} students",
                file.display(),
                responses.len(),
                analysis.overall.questions,
                analysis.overall.students
            );

            exams.push(analysis);
            all_responses.extend(responses);
        }
    }

    // Step 2: load the transcript up front so bad input fails before any LLM call
    let transcript_text = match args.transcript {
        Some(ref path) => {
            println!("📄 Loading transcript: {}", path.display());
            Some(transcript::load_transcript(path)?)
        }
        None => None,
    };

    if args.dry_run {
        return handle_dry_run(&exams, transcript_text.as_deref());
    }

    let aggregate_options = AggregateOptions {
        top_n: config.transcript.top_concepts,
    };

    // Step 3: transcript metrics
    let mut model_used = None;
    let mut transcript_report = None;
    let mut relevance = Vec::new();

    if let Some(ref saved) = args.metrics_json {
        println!("📊 Aggregating saved model reply: {}", saved.display());
        let text = std::fs::read_to_string(saved)
            .with_context(|| format!("Failed to read {}", saved.display()))?;
        transcript_report = Some(build_transcript_report(
            saved,
            llm::parse_metrics_reply(&text),
            text,
            aggregate_options,
        ));
    }

    if let (true, Some(path), Some(text)) = (
        args.needs_llm(),
        args.transcript.as_ref(),
        transcript_text.as_deref(),
    ) {
        let analyzer = build_analyzer(&config, !args.quiet)?;
        model_used = Some(analyzer.model_name().to_string());

        println!("🤖 Analyzing transcript with {}", analyzer.model_name());
        println!("   Ollama: {}", config.model.ollama_url);
        println!("   Timeout: {}s", config.model.timeout_seconds);

        let text = if config.transcript.clean {
            println!("🧹 Cleaning transcript...");
            analyzer.clean(text).await?
        } else {
            text.to_string()
        };

        let response = analyzer
            .analyze(&text)
            .await
            .context("Transcript analysis failed")?;

        if let Some(ref raw_path) = args.save_raw {
            std::fs::write(raw_path, &response.raw_text)
                .with_context(|| format!("Failed to write {}", raw_path.display()))?;
            info!("Saved raw model reply to {}", raw_path.display());
        }

        transcript_report = Some(build_transcript_report(
            path,
            response.reply,
            response.raw_text,
            aggregate_options,
        ));

        // Step 4: question relevance
        if args.relevance {
            let questions =
                exam::problem_questions(&all_responses, config.exam.problem_fallback);
            println!("🔎 Checking {} questions against the transcript...", questions.len());
            relevance = analyzer.check_relevance(&questions, &text).await;
        }
    }

    // Step 5: build and write the report
    println!("\n📝 Generating report...");

    let transcripts_analyzed = usize::from(transcript_report.is_some());
    let mut report = Report::new(ReportMetadata {
        analysis_date: Utc::now(),
        model_used,
        exams_analyzed: exams.len(),
        transcripts_analyzed,
        duration_seconds: start_time.elapsed().as_secs_f64(),
    });
    report.exams = exams;
    report.transcript = transcript_report;
    report.relevance = relevance;

    let output = match args.format {
        OutputFormat::Json => report::generate_json_report(&report)?,
        OutputFormat::Markdown => report::generate_markdown_report(&report, &config.report),
    };

    let output_path = output_path(&args, &config);
    std::fs::write(&output_path, &output)
        .with_context(|| format!("Failed to write report to {}", output_path.display()))?;

    print_summary(&report);
    println!(
        "\n✅ Analysis complete! Report saved to: {}",
        output_path.display()
    );

    Ok(0)
}

/// Resolve the exam argument to a list of CSV files.
fn exam_files(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let files = exam::discover_exam_files(path)?;
    if files.is_empty() {
        bail!("No exam CSV files found in {}", path.display());
    }
    info!("Found {} exam files in {}", files.len(), path.display());
    Ok(files)
}

fn build_analyzer(config: &Config, show_progress: bool) -> Result<TranscriptAnalyzer> {
    let prompts = AnalyzerPrompts {
        cleaner: llm::prompts::load_prompt(
            config.transcript.cleaner_prompt.as_deref(),
            llm::prompts::CLEANER_PROMPT,
        )?,
        analyzer: llm::prompts::load_prompt(
            config.transcript.analyzer_prompt.as_deref(),
            llm::prompts::ANALYZER_PROMPT,
        )?,
    };

    let client = LlmClient::new(LlmConfig {
        ollama_url: config.model.ollama_url.clone(),
        model_name: config.model.name.clone(),
        temperature: config.model.temperature,
        timeout_seconds: config.model.timeout_seconds,
        retries: config.model.retries,
        ..LlmConfig::default()
    })?;

    Ok(TranscriptAnalyzer::new(client, prompts, show_progress))
}

/// Turn a decoded model reply into the transcript section of the report.
fn build_transcript_report(
    source: &Path,
    reply: MetricsReply,
    raw_text: String,
    options: AggregateOptions,
) -> TranscriptReport {
    let (metrics, raw_response) = match reply {
        MetricsReply::Minutes(minutes) => {
            info!("Aggregating {} minute records", minutes.len());
            (Some(aggregate_minutes(&minutes, options)), None)
        }
        MetricsReply::Aggregated(metrics) => {
            info!("Model returned aggregate metrics directly");
            (Some(finalize_metrics(metrics, options)), None)
        }
        MetricsReply::Raw(_) => {
            warn!("Keeping undecodable model reply as raw text");
            (None, Some(raw_text))
        }
    };

    TranscriptReport {
        source: source.to_path_buf(),
        metrics,
        raw_response,
    }
}

/// Pick the report path, switching the default extension for JSON output.
fn output_path(args: &Args, config: &Config) -> PathBuf {
    let path = PathBuf::from(&config.general.output);
    if args.output.is_none() && args.format == OutputFormat::Json {
        return path.with_extension("json");
    }
    path
}

/// Handle --dry-run: report what was loaded, exit.
fn handle_dry_run(exams: &[ExamAnalysis], transcript: Option<&str>) -> Result<i32> {
    println!("\n🔍 Dry run: inputs loaded (no LLM call)...\n");

    for exam in exams {
        println!(
            "   📄 {} ({} questions, {} students, {} responses)",
            exam.source.display(),
            exam.overall.questions,
            exam.overall.students,
            exam.overall.total_responses
        );
    }

    if let Some(text) = transcript {
        println!(
            "   🗒️  Transcript: {} lines, {} words",
            text.lines().count(),
            text.split_whitespace().count()
        );
    }

    println!("\n✅ Dry run complete. No LLM calls were made.");
    Ok(0)
}

fn print_summary(report: &Report) {
    println!("\n📊 Analysis Summary:");

    for exam in &report.exams {
        println!("   {}", exam.source.display());
        println!(
            "   - Average score: {:.1}% | Students: {} | Questions: {}",
            exam.overall.average_score, exam.overall.students, exam.overall.questions
        );
        if !exam.difficult_questions.is_empty() {
            println!(
                "   - ⚠️  {} difficult question(s)",
                exam.difficult_questions.len()
            );
        }
    }

    if let Some(ref transcript) = report.transcript {
        match transcript.metrics {
            Some(ref metrics) => {
                for line in generate_summary_text(metrics).lines() {
                    println!("   {}", line);
                }
            }
            None => println!("   ⚠️  Model reply could not be decoded; kept raw text"),
        }
    }

    if !report.relevance.is_empty() {
        let related = report.relevance.iter().filter(|v| v.is_related).count();
        println!(
            "   Questions covered in class: {}/{}",
            related,
            report.relevance.len()
        );
    }

    println!("   Duration: {:.1}s", report.metadata.duration_seconds);
}
