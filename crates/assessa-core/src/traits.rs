//! Collaborator trait definitions.
//!
//! The session engine only sees these boundaries. HTTP implementations live
//! in `assessa-services`; in-memory ones live in [`crate::mock`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, ServiceError};
use crate::model::{CodeLanguage, Test};
use crate::submission::SubmissionPayload;

// ---------------------------------------------------------------------------
// Test retrieval
// ---------------------------------------------------------------------------

/// Source of test definitions.
#[async_trait]
pub trait TestSource: Send + Sync {
    /// Fetch the definition of one test.
    async fn fetch_test(&self, test_id: &str) -> Result<Test, ServiceError>;
}

// ---------------------------------------------------------------------------
// Subjective evaluation
// ---------------------------------------------------------------------------

/// External grader for free-text answers.
#[async_trait]
pub trait AnswerEvaluator: Send + Sync {
    /// Score one answer. Implementations return a value in `0..=10`.
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<f64, ServiceError>;
}

/// Body of an evaluation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// Prompt text of the question.
    pub question: String,
    /// The test-taker's answer.
    pub answer: String,
}

// ---------------------------------------------------------------------------
// Code execution
// ---------------------------------------------------------------------------

/// Call-and-wait boundary to an external code runner.
#[async_trait]
pub trait CodeExecutor: Send + Sync {
    /// Run a program and return its standard output.
    ///
    /// Failures come back as [`ExecutionError`]; they never panic or poison
    /// caller state.
    async fn run(&self, source: &str, language: CodeLanguage) -> Result<String, ExecutionError>;
}

// ---------------------------------------------------------------------------
// Result persistence
// ---------------------------------------------------------------------------

/// Store for finished submissions.
#[async_trait]
pub trait ResultStore: Send + Sync {
    async fn store(&self, payload: &SubmissionPayload) -> Result<(), ServiceError>;
}
