//! Test definition loader.
//!
//! Reads test definitions stored as JSON (the same shape the backend serves)
//! and checks them for authoring mistakes.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::{QuestionKind, Test};

/// Parse a single JSON file into a `Test`.
pub fn load_test_file(path: &Path) -> Result<Test> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read test file: {}", path.display()))?;

    parse_test_str(&content, path)
}

/// Parse a JSON string into a `Test` (useful for testing).
pub fn parse_test_str(content: &str, source_path: &Path) -> Result<Test> {
    serde_json::from_str(content)
        .with_context(|| format!("failed to parse test definition: {}", source_path.display()))
}

/// Recursively load all `.json` test definitions from a directory.
pub fn load_test_directory(dir: &Path) -> Result<Vec<Test>> {
    let mut tests = Vec::new();

    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?
    {
        let path = entry?.path();

        if path.is_dir() {
            tests.extend(load_test_directory(&path)?);
        } else if path.extension().is_some_and(|ext| ext == "json") {
            match load_test_file(&path) {
                Ok(test) => tests.push(test),
                Err(e) => tracing::warn!("skipping {}: {:#}", path.display(), e),
            }
        }
    }

    Ok(tests)
}

/// A warning from test validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    pub message: String,
}

impl ValidationWarning {
    fn question(id: &impl ToString, message: impl Into<String>) -> Self {
        Self {
            question_id: Some(id.to_string()),
            message: message.into(),
        }
    }
}

/// Validate a test definition for common issues.
pub fn validate_test(test: &Test) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    if test.duration == 0 {
        warnings.push(ValidationWarning {
            question_id: None,
            message: "duration is zero; the session expires on the first tick".into(),
        });
    }

    let mut seen_ids = HashSet::new();
    for question in &test.questions {
        if !seen_ids.insert(&question.id) {
            warnings.push(ValidationWarning::question(
                &question.id,
                format!("duplicate question ID: {}", question.id),
            ));
        }

        if question.prompt.trim().is_empty() {
            warnings.push(ValidationWarning::question(&question.id, "prompt is empty"));
        }

        match &question.kind {
            QuestionKind::Objective { options, answer } => {
                if options.len() < 2 {
                    warnings.push(ValidationWarning::question(
                        &question.id,
                        format!("objective question has {} option(s)", options.len()),
                    ));
                }
                if !options.iter().any(|o| o == answer) {
                    warnings.push(ValidationWarning::question(
                        &question.id,
                        format!("correct answer {answer:?} is not one of the options"),
                    ));
                }
            }
            QuestionKind::Coding { answer } if answer.trim().is_empty() => {
                warnings.push(ValidationWarning::question(
                    &question.id,
                    "expected output is empty; only programs printing nothing will pass",
                ));
            }
            _ => {}
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Section;
    use std::path::PathBuf;

    const VALID_JSON: &str = r#"{
        "_id": "65f0c1",
        "name": "Backend screening",
        "duration": 45,
        "questions": [
            {"_id": "q1", "type": "objective", "question": "2 + 2?", "options": ["3", "4"], "answer": "4"},
            {"_id": "q2", "type": "subjective", "question": "Explain ownership."},
            {"_id": "q3", "type": "coding", "question": "Print 42", "answer": "42"}
        ]
    }"#;

    #[test]
    fn parse_valid_json() {
        let test = parse_test_str(VALID_JSON, &PathBuf::from("t.json")).unwrap();
        assert_eq!(test.id, "65f0c1");
        assert_eq!(test.duration_secs(), 45 * 60);
        assert_eq!(test.questions.len(), 3);
        assert_eq!(test.questions_in(Section::Coding).len(), 1);
        assert!(validate_test(&test).is_empty());
    }

    #[test]
    fn parse_malformed_json() {
        let err = parse_test_str("{ not json", &PathBuf::from("bad.json")).unwrap_err();
        assert!(format!("{err:#}").contains("bad.json"));
    }

    #[test]
    fn validate_reports_authoring_mistakes() {
        let json = r#"{
            "_id": "t", "name": "Broken", "duration": 0,
            "questions": [
                {"_id": "q1", "type": "objective", "question": "Pick", "options": ["A"], "answer": "B"},
                {"_id": "q1", "type": "subjective", "question": "  "}
            ]
        }"#;
        let test = parse_test_str(json, &PathBuf::from("t.json")).unwrap();
        let warnings = validate_test(&test);

        assert!(warnings.iter().any(|w| w.message.contains("duration is zero")));
        assert!(warnings.iter().any(|w| w.message.contains("duplicate")));
        assert!(warnings.iter().any(|w| w.message.contains("1 option")));
        assert!(warnings.iter().any(|w| w.message.contains("not one of the options")));
        assert!(warnings.iter().any(|w| w.message == "prompt is empty"));
    }

    #[test]
    fn load_directory_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("good.json"), VALID_JSON).unwrap();
        std::fs::write(dir.path().join("bad.json"), "[]").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let tests = load_test_directory(dir.path()).unwrap();
        assert_eq!(tests.len(), 1);
        assert_eq!(tests[0].name, "Backend screening");
    }
}
