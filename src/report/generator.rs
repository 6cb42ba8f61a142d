//! Markdown and JSON report generation.
//!
//! This module renders the exam statistics, transcript metrics and
//! question relevance verdicts into a single report.

use crate::analysis::generate_summary_text;
use crate::config::ReportConfig;
use crate::models::{
    AnswerStatus, ExamAnalysis, QuestionRelevance, Report, ReportMetadata, TranscriptMetrics,
    TranscriptReport,
};
use anyhow::Result;
use std::collections::HashMap;

const BAR_WIDTH: usize = 20;

/// Generate a complete Markdown report.
pub fn generate_markdown_report(report: &Report, options: &ReportConfig) -> String {
    let mut output = String::new();

    output.push_str("# ClassInsight Report\n\n");
    output.push_str(&generate_metadata_section(&report.metadata));
    output.push_str(&generate_table_of_contents(report));

    for exam in &report.exams {
        output.push_str(&generate_exam_section(exam, options));
    }

    if let Some(ref transcript) = report.transcript {
        output.push_str(&generate_transcript_section(transcript, options));
    }

    output.push_str(&generate_relevance_section(&report.relevance));
    output.push_str(&generate_footer());

    output
}

/// Generate the metadata section.
fn generate_metadata_section(metadata: &ReportMetadata) -> String {
    let mut section = String::new();

    section.push_str("## Metadata\n\n");
    section.push_str(&format!(
        "- **Analysis Date:** {}\n",
        metadata.analysis_date.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    if let Some(ref model) = metadata.model_used {
        section.push_str(&format!("- **Model Used:** `{}`\n", model));
    }
    section.push_str(&format!("- **Exams Analyzed:** {}\n", metadata.exams_analyzed));
    section.push_str(&format!(
        "- **Transcripts Analyzed:** {}\n",
        metadata.transcripts_analyzed
    ));
    section.push_str(&format!(
        "- **Analysis Duration:** {:.1}s\n\n",
        metadata.duration_seconds
    ));

    section
}

/// Heading slug as GitHub renders it: lowercase, punctuation dropped, spaces to `-`.
fn anchor(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .filter_map(|c| match c {
            ' ' => Some('-'),
            c if c.is_alphanumeric() || c == '-' || c == '_' => Some(c),
            _ => None,
        })
        .collect()
}

fn exam_title(exam: &ExamAnalysis) -> String {
    let name = exam
        .source
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| exam.source.display().to_string());
    format!("Exam: {}", name)
}

/// Generate the table of contents.
fn generate_table_of_contents(report: &Report) -> String {
    let mut toc = String::new();

    toc.push_str("## Table of Contents\n\n");
    toc.push_str("- [Metadata](#metadata)\n");

    // Repeated headings get `-1`, `-2`, ... suffixes on GitHub.
    let mut seen: HashMap<String, usize> = HashMap::new();
    for exam in &report.exams {
        let title = exam_title(exam);
        let slug = anchor(&title);
        let count = seen.entry(slug.clone()).or_insert(0);
        let target = if *count == 0 {
            slug
        } else {
            format!("{}-{}", slug, count)
        };
        *count += 1;
        toc.push_str(&format!("- [{}](#{})\n", title, target));
    }

    if report.transcript.is_some() {
        toc.push_str("- [Teaching Metrics](#teaching-metrics)\n");
    }

    if !report.relevance.is_empty() {
        toc.push_str("- [Question Relevance](#question-relevance)\n");
    }

    toc.push('\n');
    toc
}

/// Escape characters that would break a Markdown table cell.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn bar(fraction: f64) -> String {
    let filled = (fraction.clamp(0.0, 1.0) * BAR_WIDTH as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_WIDTH - filled))
}

/// Generate the section for one exam.
fn generate_exam_section(exam: &ExamAnalysis, options: &ReportConfig) -> String {
    let mut section = String::new();
    let title = exam_title(exam);

    section.push_str(&format!("## {}\n\n", title));

    if !exam.exam_ids.is_empty() {
        section.push_str(&format!("*Exam IDs: {}*\n\n", exam.exam_ids.join(", ")));
    }
    if let (Some(first), Some(last)) = (exam.first_response, exam.last_response) {
        section.push_str(&format!(
            "*Responses from {} to {}*\n\n",
            first.format("%Y-%m-%d %H:%M"),
            last.format("%Y-%m-%d %H:%M")
        ));
    }

    // Overall performance
    let overall = &exam.overall;
    section.push_str("### Overall Performance\n\n");
    section.push_str("| Average Score | Questions Answered | Students | Questions |\n");
    section.push_str("|:---:|:---:|:---:|:---:|\n");
    section.push_str(&format!(
        "| {:.1}% | {} / {} | {} | {} |\n\n",
        overall.average_score,
        overall.answered_correctly,
        overall.total_responses,
        overall.students,
        overall.questions
    ));

    // Question performance, hardest first
    section.push_str("### Question Performance\n\n");
    if exam.question_stats.is_empty() {
        section.push_str("No responses were found in this file.\n\n");
    } else {
        section.push_str(&format!(
            "| ID | Question | {} Correct % | {} Incorrect % | {} Missed % | Responses |\n",
            AnswerStatus::Correct.emoji(),
            AnswerStatus::Incorrect.emoji(),
            AnswerStatus::Missed.emoji()
        ));
        section.push_str("|:---|:---|:---:|:---:|:---:|:---:|\n");
        for q in exam.question_performance() {
            section.push_str(&format!(
                "| {} | {} | {:.1} | {:.1} | {:.1} | {} |\n",
                cell(&q.question_id),
                cell(&q.question_text),
                q.pct_correct,
                q.pct_incorrect,
                q.pct_missed,
                q.total_responses
            ));
        }
        section.push('\n');
    }

    if !exam.difficult_questions.is_empty() {
        section.push_str("### Difficult Questions\n\n");
        for q in &exam.difficult_questions {
            section.push_str(&format!(
                "- **{}** {} ({:.1}% correct)\n",
                cell(&q.question_id),
                q.question_text,
                q.pct_correct
            ));
        }
        section.push('\n');
    }

    // Score histogram
    if !exam.student_stats.is_empty() {
        section.push_str("### Student Score Distribution\n\n");
        section.push_str("```\n");
        let max = exam
            .score_distribution
            .iter()
            .map(|b| b.count)
            .max()
            .unwrap_or(0)
            .max(1);
        for bucket in &exam.score_distribution {
            section.push_str(&format!(
                "{:>7}% {} {}\n",
                bucket.label(),
                bar(bucket.count as f64 / max as f64),
                bucket.count
            ));
        }
        section.push_str("```\n\n");
    }

    if options.include_students && !exam.student_stats.is_empty() {
        section.push_str("### Student Performance\n\n");
        section.push_str("| Student ID | Score % | Correct | Incorrect | Missed | Total Questions |\n");
        section.push_str("|:---|:---:|:---:|:---:|:---:|:---:|\n");
        for s in exam.student_ranking() {
            section.push_str(&format!(
                "| {} | {:.1} | {} | {} | {} | {} |\n",
                cell(&s.student_id),
                s.score,
                s.correct,
                s.incorrect,
                s.missed,
                s.total_questions
            ));
        }
        section.push('\n');
    }

    if options.include_option_distribution && !exam.option_distribution.is_empty() {
        section.push_str("### Answer Distribution\n\n");
        section.push_str("| ID | Correct | Selections | Missed |\n");
        section.push_str("|:---|:---:|:---|:---:|\n");
        for dist in &exam.option_distribution {
            let selections: Vec<String> = dist
                .selections
                .iter()
                .map(|(option, count)| {
                    if *option == dist.correct_option {
                        format!("**{}**: {}", cell(option), count)
                    } else {
                        format!("{}: {}", cell(option), count)
                    }
                })
                .collect();
            section.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                cell(&dist.question_id),
                cell(&dist.correct_option),
                selections.join(", "),
                dist.missed
            ));
        }
        section.push('\n');
    }

    section
}

/// Generate the transcript metrics section.
fn generate_transcript_section(transcript: &TranscriptReport, options: &ReportConfig) -> String {
    let mut section = String::new();

    section.push_str("## Teaching Metrics\n\n");
    section.push_str(&format!("*Source: {}*\n\n", transcript.source.display()));

    match (&transcript.metrics, &transcript.raw_response) {
        (Some(metrics), _) => section.push_str(&generate_metrics_body(metrics, options)),
        (None, Some(raw)) => {
            section.push_str(
                "The model reply could not be decoded as metrics. Raw reply:\n\n```\n",
            );
            section.push_str(raw.trim());
            section.push_str("\n```\n\n");
        }
        (None, None) => section.push_str("No metrics were produced.\n\n"),
    }

    section
}

fn generate_metrics_body(metrics: &TranscriptMetrics, options: &ReportConfig) -> String {
    let mut body = String::new();

    body.push_str("### Summary\n\n```\n");
    body.push_str(&generate_summary_text(metrics));
    body.push_str("\n```\n\n");

    body.push_str("### Teaching Style\n\n");
    body.push_str("| Style | Share | |\n");
    body.push_str("|:---|:---:|:---|\n");
    for (name, share) in metrics.teaching_style.entries() {
        body.push_str(&format!(
            "| {} | {:.1}% | `{}` |\n",
            name,
            share * 100.0,
            bar(share)
        ));
    }
    body.push('\n');

    body.push_str("### Key Topics\n\n");
    if metrics.top_concepts.is_empty() {
        body.push_str("No concepts were identified.\n\n");
    } else {
        body.push_str("| # | Concept | Frequency |\n");
        body.push_str("|:---:|:---|:---:|\n");
        for (i, c) in metrics.top_concepts.iter().enumerate() {
            body.push_str(&format!(
                "| {} | {} | {:.2} |\n",
                i + 1,
                cell(&c.concept),
                c.frequency
            ));
        }
        body.push('\n');
    }

    if options.include_timeline && !metrics.questions_examples.is_empty() {
        body.push_str("### Questions & Examples\n\n");
        body.push_str("| Minute | Professor Questions | Examples |\n");
        body.push_str("|:---:|:---:|:---:|\n");
        for p in &metrics.questions_examples {
            body.push_str(&format!(
                "| {} | {} | {} |\n",
                p.minute, p.professor_questions, p.examples
            ));
        }
        body.push('\n');
    }

    let has_talk = metrics
        .talk_time
        .iter()
        .any(|p| p.professor_percentage + p.student_percentage > 0.0);
    if options.include_timeline && has_talk {
        body.push_str("### Talk Time\n\n");
        body.push_str("| Minute | Professor | Students |\n");
        body.push_str("|:---:|:---:|:---:|\n");
        for p in &metrics.talk_time {
            body.push_str(&format!(
                "| {} | {:.0}% | {:.0}% |\n",
                p.minute,
                p.professor_percentage * 100.0,
                p.student_percentage * 100.0
            ));
        }
        body.push('\n');
    }

    body
}

/// Generate the question relevance section.
fn generate_relevance_section(verdicts: &[QuestionRelevance]) -> String {
    if verdicts.is_empty() {
        return String::new();
    }

    let mut section = String::new();
    section.push_str("## Question Relevance\n\n");

    for (i, v) in verdicts.iter().enumerate() {
        section.push_str(&format!("### Question {}: {}\n\n", i + 1, v.question));
        if v.is_related {
            section.push_str("✅ Related to transcript content\n\n");
        } else {
            section.push_str("❌ Not clearly related to transcript\n\n");
        }
        section.push_str(&format!("**Confidence:** {:.0}%\n\n", v.confidence * 100.0));
        if !v.explanation.is_empty() {
            section.push_str(&format!("**Explanation:** {}\n\n", v.explanation));
        }
        if !v.supporting_evidence.is_empty() {
            section.push_str("**Supporting Evidence:**\n\n");
            for evidence in &v.supporting_evidence {
                section.push_str(&format!("- {}\n", evidence));
            }
            section.push('\n');
        }
    }

    section
}

/// Generate the report footer.
fn generate_footer() -> String {
    "---\n\n*Report generated by ClassInsight*\n".to_string()
}

/// Generate a JSON report.
pub fn generate_json_report(report: &Report) -> Result<String> {
    serde_json::to_string_pretty(report).map_err(Into::into)
}
