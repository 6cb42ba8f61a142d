//! Class transcript loading.

use anyhow::{bail, Context, Result};
use std::path::Path;
use tracing::debug;

/// Read a plain-text transcript.
///
/// Word documents must be exported to text first.
pub fn load_transcript(path: &Path) -> Result<String> {
    let is_docx = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("docx"))
        .unwrap_or(false);
    if is_docx {
        bail!(
            "Cannot read {}: .docx transcripts are not supported, save it as plain text",
            path.display()
        );
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read transcript: {}", path.display()))?;

    if text.trim().is_empty() {
        bail!("Transcript is empty: {}", path.display());
    }

    debug!(
        "Loaded transcript {} ({} lines)",
        path.display(),
        text.lines().count()
    );
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_transcript() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("class.txt");
        std::fs::write(&path, "Professor: Good morning.\nStudent: Hi!\n").unwrap();

        let text = load_transcript(&path).unwrap();
        assert!(text.starts_with("Professor:"));
    }

    #[test]
    fn test_empty_transcript_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "  \n\n").unwrap();

        let err = load_transcript(&path).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_docx_rejected() {
        let err = load_transcript(Path::new("lecture.docx")).unwrap_err();
        assert!(err.to_string().contains(".docx"));
    }

    #[test]
    fn test_missing_file() {
        assert!(load_transcript(Path::new("/nonexistent/class.txt")).is_err());
    }
}
