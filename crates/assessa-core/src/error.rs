//! Error types for the session engine and its collaborators.
//!
//! `ServiceError` and `ExecutionError` are defined here, next to the traits,
//! so the scoring engine can convert collaborator failures into score-0
//! outcomes without string matching.

use thiserror::Error;

use crate::model::QuestionId;

/// Errors that can occur when talking to an external service.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service returned an error response.
    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// The request timed out.
    #[error("request timed out after {0}s")]
    Timeout(u64),

    /// A network error occurred.
    #[error("network error: {0}")]
    Network(String),

    /// The response body could not be decoded.
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ServiceError {
    /// Returns `true` if retrying the same request could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            ServiceError::Timeout(_) | ServiceError::Network(_) => true,
            ServiceError::Api { status, .. } => *status >= 500 || *status == 429,
            ServiceError::Decode(_) => false,
        }
    }
}

/// Failure of the external code runner. The message is shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    /// The runner answered but reported a failure (compile error, crash, ...).
    #[error("{message}")]
    Rejected { message: String },

    /// The runner could not be reached or answered with garbage.
    #[error("execution service unavailable: {0}")]
    Unavailable(String),
}

/// Errors surfaced by the session state machine.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The test definition could not be fetched. Fatal for the session.
    #[error("failed to load test {test_id}: {source}")]
    LoadFailure {
        test_id: String,
        #[source]
        source: ServiceError,
    },

    /// Results could not be stored. The computed score is kept for a retry.
    #[error("failed to store results: {0}")]
    PersistenceFailure(#[source] ServiceError),

    /// An action was attempted that the state machine does not allow.
    #[error("cannot {action} while {from}")]
    InvalidTransition { from: String, action: &'static str },

    /// The question id is not part of the loaded test.
    #[error("unknown question: {0}")]
    UnknownQuestion(QuestionId),

    /// Only coding questions can be sent to the code runner.
    #[error("question {0} is not a coding question")]
    NotRunnable(QuestionId),
}

impl SessionError {
    pub(crate) fn invalid(from: impl ToString, action: &'static str) -> Self {
        SessionError::InvalidTransition {
            from: from.to_string(),
            action,
        }
    }

    /// Returns `true` for failures the user can recover from by retrying.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SessionError::PersistenceFailure(_))
    }
}
