//! In-memory collaborators for testing the session engine without a backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{ExecutionError, ServiceError};
use crate::model::{CodeLanguage, Test};
use crate::submission::SubmissionPayload;
use crate::traits::{AnswerEvaluator, CodeExecutor, EvaluationRequest, ResultStore, TestSource};

fn clone_error(e: &ServiceError) -> ServiceError {
    match e {
        ServiceError::Api { status, message } => ServiceError::Api {
            status: *status,
            message: message.clone(),
        },
        ServiceError::Timeout(secs) => ServiceError::Timeout(*secs),
        ServiceError::Network(m) => ServiceError::Network(m.clone()),
        ServiceError::Decode(m) => ServiceError::Decode(m.clone()),
    }
}

/// Serves one fixed test definition, or always fails.
pub struct MockTestSource {
    test: Result<Test, ServiceError>,
    call_count: AtomicU32,
}

impl MockTestSource {
    pub fn new(test: Test) -> Self {
        Self {
            test: Ok(test),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn failing(error: ServiceError) -> Self {
        Self {
            test: Err(error),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl TestSource for MockTestSource {
    async fn fetch_test(&self, test_id: &str) -> Result<Test, ServiceError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        match &self.test {
            Ok(test) if test.id == test_id => Ok(test.clone()),
            Ok(_) => Err(ServiceError::Api {
                status: 404,
                message: format!("test {test_id} not found"),
            }),
            Err(e) => Err(clone_error(e)),
        }
    }
}

/// Returns configurable scores based on answer content matching.
pub struct MockEvaluator {
    /// Map of answer substring → score.
    scores: HashMap<String, f64>,
    default_score: Result<f64, ServiceError>,
    call_count: AtomicU32,
}

impl MockEvaluator {
    pub fn new(scores: HashMap<String, f64>) -> Self {
        Self {
            scores,
            default_score: Ok(0.0),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn with_fixed_score(score: f64) -> Self {
        Self {
            scores: HashMap::new(),
            default_score: Ok(score),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn failing(error: ServiceError) -> Self {
        Self {
            scores: HashMap::new(),
            default_score: Err(error),
            call_count: AtomicU32::new(0),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl AnswerEvaluator for MockEvaluator {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<f64, ServiceError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if let Some((_, score)) = self
            .scores
            .iter()
            .find(|(key, _)| request.answer.contains(key.as_str()))
        {
            return Ok(*score);
        }
        match &self.default_score {
            Ok(score) => Ok(*score),
            Err(e) => Err(clone_error(e)),
        }
    }
}

/// Returns configurable program output based on source matching.
pub struct MockExecutor {
    /// Map of source substring → outcome.
    outputs: HashMap<String, Result<String, ExecutionError>>,
    default_output: Result<String, ExecutionError>,
    delay: Duration,
    call_count: AtomicU32,
    last_request: Mutex<Option<(String, CodeLanguage)>>,
}

impl MockExecutor {
    pub fn new(outputs: HashMap<String, Result<String, ExecutionError>>) -> Self {
        Self {
            outputs,
            default_output: Ok(String::new()),
            delay: Duration::ZERO,
            call_count: AtomicU32::new(0),
            last_request: Mutex::new(None),
        }
    }

    pub fn with_fixed_output(output: &str) -> Self {
        Self {
            default_output: Ok(output.to_string()),
            ..Self::new(HashMap::new())
        }
    }

    pub fn failing(error: ExecutionError) -> Self {
        Self {
            default_output: Err(error),
            ..Self::new(HashMap::new())
        }
    }

    /// Simulate a slow runner.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    pub fn last_request(&self) -> Option<(String, CodeLanguage)> {
        self.last_request.lock().unwrap().clone()
    }
}

#[async_trait]
impl CodeExecutor for MockExecutor {
    async fn run(&self, source: &str, language: CodeLanguage) -> Result<String, ExecutionError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        *self.last_request.lock().unwrap() = Some((source.to_string(), language));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.outputs
            .iter()
            .find(|(key, _)| source.contains(key.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.default_output.clone())
    }
}

/// Records stored payloads; can be told to fail the first few calls.
pub struct MockResultStore {
    failures_left: AtomicU32,
    delay: Duration,
    call_count: AtomicU32,
    stored: Mutex<Vec<SubmissionPayload>>,
}

impl Default for MockResultStore {
    fn default() -> Self {
        Self::failing_times(0)
    }
}

impl MockResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the first `n` store calls with a 503.
    pub fn failing_times(n: u32) -> Self {
        Self {
            failures_left: AtomicU32::new(n),
            delay: Duration::ZERO,
            call_count: AtomicU32::new(0),
            stored: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::Relaxed)
    }

    /// Simulate a slow result store.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn stored(&self) -> Vec<SubmissionPayload> {
        self.stored.lock().unwrap().clone()
    }
}

#[async_trait]
impl ResultStore for MockResultStore {
    async fn store(&self, payload: &SubmissionPayload) -> Result<(), ServiceError> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failing = self
            .failures_left
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(ServiceError::Api {
                status: 503,
                message: "result store unavailable".into(),
            });
        }
        self.stored.lock().unwrap().push(payload.clone());
        Ok(())
    }
}
