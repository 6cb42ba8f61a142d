//! Exam answer statistics.
//!
//! Turns a flat table of student responses into per-question and
//! per-student correctness statistics.

use crate::models::{
    AnswerStatus, ExamAnalysis, ExamResponse, OptionDistribution, OverallPerformance,
    QuestionStats, ScoreBucket, StudentStats,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::Path;

/// Correct-rate threshold below which a question counts as difficult.
pub const DEFAULT_DIFFICULTY_THRESHOLD: f64 = 0.3;

/// Number of questions returned by [`problem_questions`] when every answer was correct.
pub const DEFAULT_PROBLEM_FALLBACK: usize = 3;

const SCORE_BUCKETS: usize = 10;

#[derive(Default)]
struct Tally {
    counted: usize,
    correct: usize,
    incorrect: usize,
    missed: usize,
}

impl Tally {
    fn add(&mut self, status: AnswerStatus) {
        match status {
            AnswerStatus::Correct => self.correct += 1,
            AnswerStatus::Incorrect => self.incorrect += 1,
            AnswerStatus::Missed => self.missed += 1,
        }
    }
}

/// Round to one decimal place, ties to even.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round_ties_even() / 10.0
}

/// `count / total` as a percentage rounded to one decimal; 0 when `total` is 0.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        round1(count as f64 / total as f64 * 100.0)
    }
}

/// Analyze exam answers to calculate correctness and summary statistics.
pub fn analyze_exam_answers(
    source: &Path,
    responses: &[ExamResponse],
    difficulty_threshold: f64,
) -> ExamAnalysis {
    let question_stats = question_stats(responses);
    let student_stats = student_stats(responses);
    let overall = overall_performance(&question_stats, &student_stats);

    let exam_ids: Vec<String> = responses
        .iter()
        .map(|r| r.exam_id.clone())
        .filter(|id| !id.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let timestamps: Vec<_> = responses.iter().filter_map(|r| r.parsed_timestamp()).collect();

    ExamAnalysis {
        source: source.to_path_buf(),
        exam_ids,
        first_response: timestamps.iter().min().copied(),
        last_response: timestamps.iter().max().copied(),
        overall,
        score_distribution: score_distribution(&student_stats),
        option_distribution: option_distribution(responses),
        difficult_questions: difficult_questions(&question_stats, difficulty_threshold),
        question_stats,
        student_stats,
    }
}

/// Per-question statistics grouped by `(question_id, question_text)`.
pub fn question_stats(responses: &[ExamResponse]) -> Vec<QuestionStats> {
    let mut groups: BTreeMap<(&str, &str), Tally> = BTreeMap::new();

    for r in responses {
        let tally = groups
            .entry((r.question_id.as_str(), r.question_text.as_str()))
            .or_default();
        if !r.student_id.is_empty() {
            tally.counted += 1;
        }
        tally.add(r.status());
    }

    groups
        .into_iter()
        .map(|((id, text), t)| QuestionStats {
            question_id: id.to_string(),
            question_text: text.to_string(),
            total_responses: t.counted,
            correct: t.correct,
            incorrect: t.incorrect,
            missed: t.missed,
            pct_correct: percentage(t.correct, t.counted),
            pct_incorrect: percentage(t.incorrect, t.counted),
            pct_missed: percentage(t.missed, t.counted),
        })
        .collect()
}

/// Per-student statistics. Rows without a student id are skipped.
pub fn student_stats(responses: &[ExamResponse]) -> Vec<StudentStats> {
    let mut groups: BTreeMap<&str, Tally> = BTreeMap::new();

    for r in responses.iter().filter(|r| !r.student_id.is_empty()) {
        let tally = groups.entry(r.student_id.as_str()).or_default();
        if !r.question_id.is_empty() {
            tally.counted += 1;
        }
        tally.add(r.status());
    }

    groups
        .into_iter()
        .map(|(id, t)| StudentStats {
            student_id: id.to_string(),
            total_questions: t.counted,
            correct: t.correct,
            incorrect: t.incorrect,
            missed: t.missed,
            score: percentage(t.correct, t.counted),
        })
        .collect()
}

/// Headline numbers shown above the detailed tables.
pub fn overall_performance(
    questions: &[QuestionStats],
    students: &[StudentStats],
) -> OverallPerformance {
    let average_score = if students.is_empty() {
        0.0
    } else {
        students.iter().map(|s| s.score).sum::<f64>() / students.len() as f64
    };

    OverallPerformance {
        average_score: round1(average_score),
        answered_correctly: questions.iter().map(|q| q.correct).sum(),
        total_responses: questions.iter().map(|q| q.total_responses).sum(),
        students: students.len(),
        questions: questions.len(),
    }
}

/// Histogram of student scores in ten buckets of width 10.
///
/// A score of exactly 100 falls in the last bucket.
pub fn score_distribution(students: &[StudentStats]) -> Vec<ScoreBucket> {
    let width = 100.0 / SCORE_BUCKETS as f64;
    let mut buckets: Vec<ScoreBucket> = (0..SCORE_BUCKETS)
        .map(|i| ScoreBucket {
            lower: i as f64 * width,
            upper: (i + 1) as f64 * width,
            count: 0,
        })
        .collect();

    for s in students {
        let score = s.score.clamp(0.0, 100.0);
        let idx = ((score / width) as usize).min(SCORE_BUCKETS - 1);
        buckets[idx].count += 1;
    }

    buckets
}

/// How often each option was selected, per question.
pub fn option_distribution(responses: &[ExamResponse]) -> Vec<OptionDistribution> {
    let mut groups: BTreeMap<(&str, &str), OptionDistribution> = BTreeMap::new();
    let mut counts: BTreeMap<(&str, &str), BTreeMap<String, usize>> = BTreeMap::new();

    for r in responses {
        let key = (r.question_id.as_str(), r.question_text.as_str());
        let dist = groups.entry(key).or_insert_with(|| OptionDistribution {
            question_id: r.question_id.clone(),
            question_text: r.question_text.clone(),
            correct_option: r.correct_option.clone(),
            ..Default::default()
        });
        match &r.selected_option {
            Some(choice) => {
                *counts.entry(key).or_default().entry(choice.clone()).or_default() += 1;
            }
            None => dist.missed += 1,
        }
    }

    groups
        .into_iter()
        .map(|(key, mut dist)| {
            dist.selections = counts.remove(&key).unwrap_or_default().into_iter().collect();
            dist
        })
        .collect()
}

/// Questions whose correct rate is strictly below `threshold`.
pub fn difficult_questions(questions: &[QuestionStats], threshold: f64) -> Vec<QuestionStats> {
    questions
        .iter()
        .filter(|q| q.total_responses > 0 && q.correct_rate() < threshold)
        .cloned()
        .collect()
}

/// Question texts that at least one student did not answer correctly.
///
/// Keeps first-seen order. When every answer was correct, falls back to the
/// first `fallback` question texts so there is always something to review.
pub fn problem_questions(responses: &[ExamResponse], fallback: usize) -> Vec<String> {
    let mut seen = HashSet::new();
    let problems: Vec<String> = responses
        .iter()
        .filter(|r| r.status() != AnswerStatus::Correct)
        .filter(|r| seen.insert(r.question_text.as_str()))
        .map(|r| r.question_text.clone())
        .collect();

    if !problems.is_empty() {
        return problems;
    }

    let mut seen = HashSet::new();
    responses
        .iter()
        .filter(|r| seen.insert(r.question_text.as_str()))
        .take(fallback)
        .map(|r| r.question_text.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn resp(question: &str, student: &str, selected: Option<&str>, correct: &str) -> ExamResponse {
        ExamResponse {
            exam_id: "E1".to_string(),
            question_id: question.to_string(),
            question_text: format!("Question {}", question),
            option_a: "a".to_string(),
            option_b: "b".to_string(),
            option_c: "c".to_string(),
            option_d: "d".to_string(),
            correct_option: correct.to_string(),
            timestamp: "2024-03-01 09:00:00".to_string(),
            student_id: student.to_string(),
            selected_option: selected.map(String::from),
        }
    }

    fn sample() -> Vec<ExamResponse> {
        vec![
            resp("Q1", "S1", Some("A"), "A"),
            resp("Q1", "S2", Some("B"), "A"),
            resp("Q1", "S3", None, "A"),
            resp("Q2", "S1", Some("C"), "C"),
            resp("Q2", "S2", Some("C"), "C"),
            resp("Q2", "S3", Some("C"), "C"),
        ]
    }

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 3), 33.3);
        assert_eq!(percentage(2, 3), 66.7);
        assert_eq!(percentage(0, 0), 0.0);
        assert_eq!(percentage(1, 16), 6.2);
        assert_eq!(percentage(3, 16), 18.8);
    }

    #[test]
    fn test_question_stats() {
        let stats = question_stats(&sample());
        assert_eq!(stats.len(), 2);

        let q1 = &stats[0];
        assert_eq!(q1.question_id, "Q1");
        assert_eq!(q1.total_responses, 3);
        assert_eq!((q1.correct, q1.incorrect, q1.missed), (1, 1, 1));
        assert_eq!(q1.pct_correct, 33.3);
        assert_eq!(q1.pct_missed, 33.3);

        let q2 = &stats[1];
        assert_eq!(q2.pct_correct, 100.0);
        assert_eq!(q2.pct_incorrect, 0.0);
    }

    #[test]
    fn test_question_stats_skip_missing_student_in_count() {
        let mut rows = sample();
        rows.push(resp("Q2", "", Some("C"), "C"));
        let stats = question_stats(&rows);
        let q2 = &stats[1];
        assert_eq!(q2.total_responses, 3);
        assert_eq!(q2.correct, 4);
    }

    #[test]
    fn test_student_stats() {
        let stats = student_stats(&sample());
        let ids: Vec<&str> = stats.iter().map(|s| s.student_id.as_str()).collect();
        assert_eq!(ids, vec!["S1", "S2", "S3"]);

        assert_eq!(stats[0].score, 100.0);
        assert_eq!(stats[1].score, 50.0);
        assert_eq!(stats[2].missed, 1);
        assert_eq!(stats[2].score, 50.0);
    }

    #[test]
    fn test_overall_performance() {
        let rows = sample();
        let analysis = analyze_exam_answers(&PathBuf::from("exam.csv"), &rows, 0.3);

        assert_eq!(analysis.overall.students, 3);
        assert_eq!(analysis.overall.questions, 2);
        assert_eq!(analysis.overall.answered_correctly, 4);
        assert_eq!(analysis.overall.total_responses, 6);
        assert_eq!(analysis.overall.average_score, 66.7);
        assert_eq!(analysis.exam_ids, vec!["E1"]);
        assert!(analysis.first_response.is_some());
    }

    #[test]
    fn test_empty_exam() {
        let analysis = analyze_exam_answers(&PathBuf::from("empty.csv"), &[], 0.3);
        assert_eq!(analysis.overall, OverallPerformance::default());
        assert!(analysis.question_stats.is_empty());
        assert_eq!(analysis.score_distribution.len(), 10);
        assert!(analysis.score_distribution.iter().all(|b| b.count == 0));
    }

    #[test]
    fn test_score_distribution_edges() {
        let students: Vec<StudentStats> = [0.0, 9.9, 10.0, 55.5, 100.0]
            .iter()
            .enumerate()
            .map(|(i, score)| StudentStats {
                student_id: format!("S{}", i),
                total_questions: 10,
                correct: 0,
                incorrect: 0,
                missed: 0,
                score: *score,
            })
            .collect();

        let buckets = score_distribution(&students);
        assert_eq!(buckets[0].count, 2);
        assert_eq!(buckets[1].count, 1);
        assert_eq!(buckets[5].count, 1);
        assert_eq!(buckets[9].count, 1);
        assert_eq!(buckets.iter().map(|b| b.count).sum::<usize>(), 5);
    }

    #[test]
    fn test_option_distribution() {
        let dist = option_distribution(&sample());
        assert_eq!(dist.len(), 2);
        assert_eq!(
            dist[0].selections,
            vec![("A".to_string(), 1), ("B".to_string(), 1)]
        );
        assert_eq!(dist[0].missed, 1);
        assert_eq!(dist[1].selections, vec![("C".to_string(), 3)]);
    }

    #[test]
    fn test_difficult_questions() {
        let stats = question_stats(&sample());
        let hard = difficult_questions(&stats, 0.5);
        assert_eq!(hard.len(), 1);
        assert_eq!(hard[0].question_id, "Q1");

        assert!(difficult_questions(&stats, 0.3).is_empty());
    }

    #[test]
    fn test_question_performance_order() {
        let analysis = analyze_exam_answers(&PathBuf::from("exam.csv"), &sample(), 0.3);
        let ordered = analysis.question_performance();
        assert_eq!(ordered[0].question_id, "Q1");
        assert_eq!(ordered[1].question_id, "Q2");

        let ranking = analysis.student_ranking();
        assert_eq!(ranking[0].student_id, "S1");
    }

    #[test]
    fn test_problem_questions() {
        let problems = problem_questions(&sample(), DEFAULT_PROBLEM_FALLBACK);
        assert_eq!(problems, vec!["Question Q1"]);

        let all_correct = vec![
            resp("Q1", "S1", Some("A"), "A"),
            resp("Q2", "S1", Some("B"), "B"),
            resp("Q3", "S1", Some("C"), "C"),
            resp("Q4", "S1", Some("D"), "D"),
        ];
        let fallback = problem_questions(&all_correct, 3);
        assert_eq!(fallback, vec!["Question Q1", "Question Q2", "Question Q3"]);
    }
}
