//! Assessment backend client: test retrieval, subjective evaluation, and
//! result persistence.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use assessa_core::error::ServiceError;
use assessa_core::model::Test;
use assessa_core::submission::SubmissionPayload;
use assessa_core::traits::{AnswerEvaluator, EvaluationRequest, ResultStore, TestSource};

const DEFAULT_BASE_URL: &str = "http://localhost:5000";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// HTTP client for the assessment backend.
pub struct BackendClient {
    base_url: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Self {
        let base = if base_url.is_empty() {
            DEFAULT_BASE_URL
        } else {
            base_url
        };
        let timeout_secs = if timeout_secs == 0 {
            DEFAULT_TIMEOUT_SECS
        } else {
            timeout_secs
        };

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("failed to build HTTP client");

        Self {
            base_url: base.trim_end_matches('/').to_string(),
            timeout_secs,
            client,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn send_error(&self, e: reqwest::Error) -> ServiceError {
        if e.is_timeout() {
            ServiceError::Timeout(self.timeout_secs)
        } else if e.is_connect() {
            ServiceError::Network(format!("backend not reachable at {}", self.base_url))
        } else {
            ServiceError::Network(e.to_string())
        }
    }

    /// Turn an error status into `ServiceError::Api`, passing successes through.
    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ServiceError> {
        let status = response.status().as_u16();
        if status >= 400 {
            let message = response.text().await.unwrap_or_default();
            return Err(ServiceError::Api { status, message });
        }
        Ok(response)
    }
}

#[derive(Deserialize)]
struct EvaluationResponse {
    score: f64,
}

#[async_trait]
impl TestSource for BackendClient {
    #[instrument(skip(self))]
    async fn fetch_test(&self, test_id: &str) -> Result<Test, ServiceError> {
        let response = self
            .client
            .get(self.url(&format!("/api/tests/{test_id}")))
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        let response = Self::check_status(response).await?;

        response
            .json::<Test>()
            .await
            .map_err(|e| ServiceError::Decode(format!("failed to parse test definition: {e}")))
    }
}

#[async_trait]
impl AnswerEvaluator for BackendClient {
    #[instrument(skip(self, request), fields(answer_len = request.answer.len()))]
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<f64, ServiceError> {
        let response = self
            .client
            .post(self.url("/api/evaluate-answer"))
            .json(request)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        let response = Self::check_status(response).await?;

        let body: EvaluationResponse = response
            .json()
            .await
            .map_err(|e| ServiceError::Decode(format!("failed to parse evaluation: {e}")))?;
        Ok(body.score)
    }
}

#[async_trait]
impl ResultStore for BackendClient {
    #[instrument(skip(self, payload), fields(test_id = %payload.test_details.id))]
    async fn store(&self, payload: &SubmissionPayload) -> Result<(), ServiceError> {
        let response = self
            .client
            .post(self.url("/api/results"))
            .json(payload)
            .send()
            .await
            .map_err(|e| self.send_error(e))?;
        Self::check_status(response).await?;
        Ok(())
    }
}
