//! Submission pipeline: final scoring, persistence, and the at-most-once
//! guard around both.
//!
//! The pipeline scores a session exactly once. If persistence fails the
//! computed [`ScoreRecord`] is kept, and the next `submit` call re-sends it
//! instead of grading again (grading can re-run billable code executions).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::answers::AnswerSnapshot;
use crate::error::SessionError;
use crate::model::{StudentDetails, Test};
use crate::scoring::{ScoreRecord, ScoringEngine};
use crate::traits::ResultStore;

/// Body sent to the result store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload {
    pub test_details: Test,
    pub student_details: StudentDetails,
    pub scores: ScoreRecord,
}

impl SubmissionPayload {
    pub fn percentage(&self) -> f64 {
        self.scores.percentage
    }
}

/// A persisted submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionReceipt {
    pub session_id: Uuid,
    pub submitted_at: DateTime<Utc>,
    pub payload: SubmissionPayload,
}

impl SubmissionReceipt {
    pub fn percentage(&self) -> f64 {
        self.payload.percentage()
    }
}

#[derive(Debug, Clone)]
pub enum SubmissionState {
    Idle,
    InFlight,
    Submitted(Arc<SubmissionReceipt>),
    /// Persistence failed; the payload is retained for resubmission.
    Failed {
        payload: Arc<SubmissionPayload>,
        reason: String,
    },
}

/// Result of a `submit` call that did not fail.
#[derive(Debug, Clone)]
pub enum SubmitAttempt {
    Submitted(Arc<SubmissionReceipt>),
    /// Submission already in flight or done; nothing happened.
    Ignored,
}

pub struct SubmissionPipeline {
    session_id: Uuid,
    scorer: ScoringEngine,
    store: Arc<dyn ResultStore>,
    state: SubmissionState,
}

impl SubmissionPipeline {
    pub fn new(session_id: Uuid, scorer: ScoringEngine, store: Arc<dyn ResultStore>) -> Self {
        Self {
            session_id,
            scorer,
            store,
            state: SubmissionState::Idle,
        }
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    /// The score kept after a failed persistence attempt, if any.
    pub fn retained_score(&self) -> Option<&ScoreRecord> {
        match &self.state {
            SubmissionState::Failed { payload, .. } => Some(&payload.scores),
            SubmissionState::Submitted(receipt) => Some(&receipt.payload.scores),
            _ => None,
        }
    }

    /// Score (first call only) and persist.
    ///
    /// Only the first caller proceeds; calls made while a submission is in
    /// flight or after it succeeded return [`SubmitAttempt::Ignored`].
    ///
    /// Cancel-safe: if the future is dropped before it completes, the state
    /// falls back to `Idle` (scoring unfinished) or `Failed` with the computed
    /// payload, so a later call can finish the submission.
    pub async fn submit(
        &mut self,
        test: &Test,
        student: &StudentDetails,
        answers: AnswerSnapshot,
    ) -> Result<SubmitAttempt, SessionError> {
        let Self {
            session_id,
            scorer,
            store,
            state,
        } = self;
        let session_id = *session_id;

        let (payload, guard) = match std::mem::replace(state, SubmissionState::InFlight) {
            SubmissionState::Idle => {
                let mut guard = InFlightGuard::new(state, SubmissionState::Idle);
                let scores = scorer.score(test, &answers).await;
                let payload = Arc::new(SubmissionPayload {
                    test_details: test.clone(),
                    student_details: student.clone(),
                    scores,
                });
                guard.fall_back_to(SubmissionState::Failed {
                    payload: Arc::clone(&payload),
                    reason: INTERRUPTED.into(),
                });
                (payload, guard)
            }
            SubmissionState::Failed { payload, reason } => {
                tracing::info!(%reason, "resubmitting previously computed score");
                let guard = InFlightGuard::new(
                    state,
                    SubmissionState::Failed {
                        payload: Arc::clone(&payload),
                        reason,
                    },
                );
                (payload, guard)
            }
            other => {
                tracing::debug!("submission already in progress or done, ignoring");
                *state = other;
                return Ok(SubmitAttempt::Ignored);
            }
        };

        match store.store(&payload).await {
            Ok(()) => {
                let receipt = Arc::new(SubmissionReceipt {
                    session_id,
                    submitted_at: Utc::now(),
                    payload: Arc::unwrap_or_clone(payload),
                });
                tracing::info!(
                    session_id = %session_id,
                    percentage = receipt.percentage(),
                    "results stored"
                );
                guard.finish(SubmissionState::Submitted(Arc::clone(&receipt)));
                Ok(SubmitAttempt::Submitted(receipt))
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, "failed to store results: {e}");
                guard.finish(SubmissionState::Failed {
                    payload,
                    reason: e.to_string(),
                });
                Err(SessionError::PersistenceFailure(e))
            }
        }
    }
}

const INTERRUPTED: &str = "submission interrupted";

/// Holds the pipeline in `InFlight` and restores a resumable state if the
/// submitting future is dropped early.
struct InFlightGuard<'a> {
    state: &'a mut SubmissionState,
    fallback: SubmissionState,
}

impl<'a> InFlightGuard<'a> {
    fn new(state: &'a mut SubmissionState, fallback: SubmissionState) -> Self {
        Self { state, fallback }
    }

    fn fall_back_to(&mut self, fallback: SubmissionState) {
        self.fallback = fallback;
    }

    fn finish(self, next: SubmissionState) {
        *self.state = next;
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        if matches!(*self.state, SubmissionState::InFlight) {
            tracing::warn!("submission dropped before completing, state restored");
            *self.state = std::mem::replace(&mut self.fallback, SubmissionState::Idle);
        }
    }
}

#[cfg(test)]
impl SubmissionPayload {
    pub(crate) fn example() -> Self {
        use crate::scoring::{compute_score, GradingInputs};

        let test = Test {
            id: "t-1".into(),
            name: "Example".into(),
            duration: 1,
            questions: vec![],
        };
        let scores = compute_score(&test, &AnswerSnapshot::default(), &GradingInputs::default());
        Self {
            test_details: test,
            student_details: StudentDetails::default(),
            scores,
        }
    }
}
