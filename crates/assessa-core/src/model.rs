//! Core data model types for assessa.
//!
//! These are the fundamental types the session engine works with: test
//! definitions as served by the backend, answers, sections, and the
//! identity of the test-taker.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable identifier of a question within a test.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for QuestionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for QuestionId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A test definition. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    /// Unique identifier for this test.
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    /// Human-readable name.
    pub name: String,
    /// Duration in minutes.
    pub duration: u32,
    /// Questions in presentation order.
    #[serde(default)]
    pub questions: Vec<Question>,
}

impl Test {
    /// Total countdown length in seconds.
    pub fn duration_secs(&self) -> u64 {
        u64::from(self.duration) * 60
    }

    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| &q.id == id)
    }

    /// Questions belonging to one section, in test order.
    pub fn questions_in(&self, section: Section) -> Vec<&Question> {
        self.questions
            .iter()
            .filter(|q| q.section() == section)
            .collect()
    }
}

/// A single question.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id", alias = "id")]
    pub id: QuestionId,
    /// Prompt text shown to the test-taker.
    #[serde(rename = "question", alias = "prompt")]
    pub prompt: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
}

impl Question {
    pub fn section(&self) -> Section {
        match self.kind {
            QuestionKind::Objective { .. } => Section::Objective,
            QuestionKind::Subjective {} => Section::Subjective,
            QuestionKind::Coding { .. } => Section::Coding,
        }
    }
}

/// Kind-specific question fields. The wire format tags these with `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum QuestionKind {
    /// Multiple choice with exactly one correct option value.
    Objective {
        #[serde(default)]
        options: Vec<String>,
        /// The correct option value.
        answer: String,
    },
    /// Free text, graded by the external evaluator.
    Subjective {},
    /// Source code, graded by exact match of the trimmed program output.
    Coding {
        /// Expected program output.
        answer: String,
    },
}

/// A grouping of questions by kind, answered in fixed order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Objective,
    Subjective,
    Coding,
}

impl Section {
    /// All sections in answering order.
    pub const ORDER: [Section; 3] = [Section::Objective, Section::Subjective, Section::Coding];

    /// The section after this one, if any.
    pub fn next(self) -> Option<Section> {
        match self {
            Section::Objective => Some(Section::Subjective),
            Section::Subjective => Some(Section::Coding),
            Section::Coding => None,
        }
    }

    /// Heading shown above the section's questions.
    pub fn title(self) -> &'static str {
        match self {
            Section::Objective => "Objective Questions",
            Section::Subjective => "Subjective Questions",
            Section::Coding => "Coding Questions",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Section::Objective => write!(f, "objective"),
            Section::Subjective => write!(f, "subjective"),
            Section::Coding => write!(f, "coding"),
        }
    }
}

/// Languages accepted by the code execution service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodeLanguage {
    #[default]
    JavaScript,
    Python,
}

impl CodeLanguage {
    /// Short code the execution service expects.
    pub fn wire_code(self) -> &'static str {
        match self {
            CodeLanguage::JavaScript => "js",
            CodeLanguage::Python => "py",
        }
    }
}

impl fmt::Display for CodeLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodeLanguage::JavaScript => write!(f, "javascript"),
            CodeLanguage::Python => write!(f, "python"),
        }
    }
}

impl FromStr for CodeLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "javascript" | "js" => Ok(CodeLanguage::JavaScript),
            "python" | "py" => Ok(CodeLanguage::Python),
            other => Err(format!("unknown language: {other}")),
        }
    }
}

/// The test-taker's current answer to one question.
///
/// The store does not check that the shape matches the question kind; that
/// belongs to whoever renders the question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum Answer {
    /// A selected option value.
    Choice(String),
    /// Free text.
    Text(String),
    /// Source code plus the language it is written in.
    Code {
        source: String,
        language: CodeLanguage,
    },
}

impl Answer {
    /// The raw answer text regardless of shape.
    pub fn as_str(&self) -> &str {
        match self {
            Answer::Choice(s) | Answer::Text(s) => s,
            Answer::Code { source, .. } => source,
        }
    }

    pub fn language(&self) -> Option<CodeLanguage> {
        match self {
            Answer::Code { language, .. } => Some(*language),
            _ => None,
        }
    }

    /// Empty answers count as unanswered when grading.
    pub fn is_blank(&self) -> bool {
        self.as_str().trim().is_empty()
    }
}

/// Identity of the test-taker, forwarded verbatim to result persistence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StudentDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    /// Any further fields supplied by the caller.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_display_and_parse() {
        assert_eq!(CodeLanguage::JavaScript.to_string(), "javascript");
        assert_eq!(CodeLanguage::Python.wire_code(), "py");
        assert_eq!(
            "js".parse::<CodeLanguage>().unwrap(),
            CodeLanguage::JavaScript
        );
        assert_eq!(
            "Python".parse::<CodeLanguage>().unwrap(),
            CodeLanguage::Python
        );
        assert!("rust".parse::<CodeLanguage>().is_err());
    }

    #[test]
    fn section_order_is_fixed() {
        assert_eq!(Section::Objective.next(), Some(Section::Subjective));
        assert_eq!(Section::Subjective.next(), Some(Section::Coding));
        assert_eq!(Section::Coding.next(), None);
        assert_eq!(Section::ORDER[0], Section::Objective);
    }

    #[test]
    fn test_definition_from_backend_json() {
        let json = serde_json::json!({
            "_id": "t-1",
            "name": "Screening",
            "duration": 30,
            "questions": [
                {"_id": "q1", "type": "objective", "question": "2+2?", "options": ["3", "4"], "answer": "4"},
                {"_id": "q2", "type": "subjective", "question": "Explain ownership", "options": []},
                {"_id": "q3", "type": "coding", "question": "Print 42", "answer": "42"}
            ]
        });
        let test: Test = serde_json::from_value(json).unwrap();
        assert_eq!(test.duration_secs(), 1800);
        assert_eq!(test.questions.len(), 3);
        assert_eq!(test.questions[1].section(), Section::Subjective);
        assert!(matches!(
            &test.questions[0].kind,
            QuestionKind::Objective { answer, .. } if answer == "4"
        ));
        assert_eq!(test.questions_in(Section::Coding).len(), 1);
        assert!(test.question(&"q3".into()).is_some());
    }

    #[test]
    fn question_serializes_with_wire_names() {
        let q = Question {
            id: "q9".into(),
            prompt: "Print hi".into(),
            kind: QuestionKind::Coding {
                answer: "hi".into(),
            },
        };
        let value = serde_json::to_value(&q).unwrap();
        assert_eq!(value["_id"], "q9");
        assert_eq!(value["type"], "coding");
        assert_eq!(value["question"], "Print hi");
    }

    #[test]
    fn blank_answers() {
        assert!(Answer::Text("  \n".into()).is_blank());
        assert!(!Answer::Choice("B".into()).is_blank());
        let code = Answer::Code {
            source: "print(1)".into(),
            language: CodeLanguage::Python,
        };
        assert_eq!(code.language(), Some(CodeLanguage::Python));
        assert_eq!(code.as_str(), "print(1)");
    }
}
