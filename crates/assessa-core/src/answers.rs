//! Answer store: the test-taker's current answer per question.

use std::collections::HashMap;
use std::sync::Arc;

use crate::model::{Answer, QuestionId};

/// Mutable mapping from question id to the latest answer.
///
/// Kind-agnostic key/value storage. Entries are created on first edit and
/// never removed; absence means "unanswered".
#[derive(Debug, Clone, Default)]
pub struct AnswerStore {
    entries: HashMap<QuestionId, Answer>,
}

impl AnswerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or overwrite the answer for a question.
    pub fn set(&mut self, question: QuestionId, answer: Answer) {
        self.entries.insert(question, answer);
    }

    /// The current answer, or `None` when unanswered.
    pub fn get(&self, question: &QuestionId) -> Option<&Answer> {
        self.entries.get(question)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Immutable copy for scoring.
    pub fn snapshot(&self) -> AnswerSnapshot {
        AnswerSnapshot {
            entries: Arc::new(self.entries.clone()),
        }
    }
}

/// Frozen view of the answers at submission time. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct AnswerSnapshot {
    entries: Arc<HashMap<QuestionId, Answer>>,
}

impl AnswerSnapshot {
    pub fn get(&self, question: &QuestionId) -> Option<&Answer> {
        self.entries.get(question)
    }

    /// The answer unless it is missing or blank.
    pub fn answered(&self, question: &QuestionId) -> Option<&Answer> {
        self.get(question).filter(|a| !a.is_blank())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(QuestionId, Answer)> for AnswerSnapshot {
    fn from_iter<I: IntoIterator<Item = (QuestionId, Answer)>>(iter: I) -> Self {
        Self {
            entries: Arc::new(iter.into_iter().collect()),
        }
    }
}
