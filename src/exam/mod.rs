//! Exam response loading and statistics.

pub mod loader;
pub mod stats;

pub use loader::{discover_exam_files, load_exam_data};
pub use stats::{analyze_exam_answers, problem_questions, DEFAULT_PROBLEM_FALLBACK};
