//! Exam CSV loading.
//!
//! Reads exam-response exports into [`ExamResponse`] rows, checking the
//! header for required columns and dropping exact duplicate rows.

use crate::models::{ExamResponse, REQUIRED_COLUMNS};
use anyhow::Result;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Errors raised while loading exam data.
#[derive(Debug, Error)]
pub enum ExamError {
    #[error("Error loading exam data: Missing required columns in exam data: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    #[error("Error loading exam data: {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Error loading exam data: {0} is not a file")]
    NotAFile(PathBuf),
}

/// Load and clean exam results from a CSV file.
pub fn load_exam_data(path: &Path) -> Result<Vec<ExamResponse>, ExamError> {
    if !path.is_file() {
        return Err(ExamError::NotAFile(path.to_path_buf()));
    }

    let csv_err = |source| ExamError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_path(path)
        .map_err(csv_err)?;

    let headers = reader.headers().map_err(csv_err)?.clone();
    check_columns(&headers)?;

    let mut rows = Vec::new();
    for record in reader.deserialize::<ExamResponse>() {
        rows.push(record.map_err(csv_err)?);
    }

    let loaded = rows.len();
    let rows = drop_duplicates(rows);
    if rows.len() < loaded {
        warn!(
            "Dropped {} duplicate rows from {}",
            loaded - rows.len(),
            path.display()
        );
    }
    debug!("Loaded {} responses from {}", rows.len(), path.display());

    Ok(rows)
}

/// Ensure every required column is present in the header row.
pub fn check_columns(headers: &csv::StringRecord) -> Result<(), ExamError> {
    let present: HashSet<&str> = headers.iter().collect();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|col| !present.contains(**col))
        .map(|col| col.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ExamError::MissingColumns(missing))
    }
}

/// Drop exact duplicate rows, keeping the first occurrence.
pub fn drop_duplicates(rows: Vec<ExamResponse>) -> Vec<ExamResponse> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|row| seen.insert(row.clone()))
        .collect()
}

/// Find every `.csv` file under a data directory, sorted by path.
pub fn discover_exam_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let is_csv = entry
            .path()
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("csv"))
            .unwrap_or(false);
        if is_csv {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    const HEADER: &str = "exam_id,question_id,question_text,option_a,option_b,option_c,option_d,correct_option,timestamp,student_id,selected_option";

    fn write_csv(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_load_exam_data() {
        let dir = TempDir::new().unwrap();
        let content = format!(
            "{}\nE1,Q1,What is 2+2?,3,4,5,22,B,2024-03-01 09:00:00,S001,B\nE1,Q1,What is 2+2?,3,4,5,22,B,2024-03-01 09:01:00,S002,\n",
            HEADER
        );
        let path = write_csv(&dir, "exam.csv", &content);

        let rows = load_exam_data(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].selected_option.as_deref(), Some("B"));
        assert_eq!(rows[1].selected_option, None);
    }

    #[test]
    fn test_load_drops_duplicates() {
        let dir = TempDir::new().unwrap();
        let row = "E1,Q1,Capital of France?,Paris,Rome,Oslo,Lima,A,2024-03-01 09:00:00,S001,A";
        let content = format!("{}\n{}\n{}\n", HEADER, row, row);
        let path = write_csv(&dir, "dupes.csv", &content);

        let rows = load_exam_data(&path).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_load_ignores_extra_columns() {
        let dir = TempDir::new().unwrap();
        let content = format!(
            "{},section\nE1,Q1,Q?,a,b,c,d,A,2024-03-01,S001,A,morning\n",
            HEADER
        );
        let path = write_csv(&dir, "extra.csv", &content);

        let rows = load_exam_data(&path).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_missing_columns() {
        let dir = TempDir::new().unwrap();
        let path = write_csv(
            &dir,
            "bad.csv",
            "exam_id,question_id,question_text,student_id\nE1,Q1,Q?,S001\n",
        );

        let err = load_exam_data(&path).unwrap_err();
        match &err {
            ExamError::MissingColumns(cols) => {
                assert_eq!(cols.first().map(String::as_str), Some("option_a"));
                assert!(cols.contains(&"selected_option".to_string()));
                assert!(!cols.contains(&"student_id".to_string()));
            }
            other => panic!("unexpected error: {:?}", other),
        }
        let message = err.to_string();
        assert!(message.starts_with("Error loading exam data: Missing required columns"));
        assert!(message.contains("option_a, option_b"));
    }

    #[test]
    fn test_not_a_file() {
        let dir = TempDir::new().unwrap();
        let err = load_exam_data(dir.path()).unwrap_err();
        assert!(matches!(err, ExamError::NotAFile(_)));
    }

    #[test]
    fn test_discover_exam_files() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("spring")).unwrap();
        write_csv(&dir, "b.csv", HEADER);
        write_csv(&dir, "a.CSV", HEADER);
        write_csv(&dir, "notes.txt", "not an exam");
        fs::write(dir.path().join("spring/c.csv"), HEADER).unwrap();

        let files = discover_exam_files(dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(names, vec!["a.CSV", "b.csv", "spring/c.csv"]);
    }
}
