//! CodeX-style code execution service.
//!
//! The service takes a form-encoded `{code, language, input}` body and
//! answers with JSON carrying its own `status` field: `200` means the
//! program ran and `output` holds stdout, anything else puts the reason in
//! `error`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::instrument;

use assessa_core::error::ExecutionError;
use assessa_core::model::CodeLanguage;
use assessa_core::traits::CodeExecutor;

const DEFAULT_URL: &str = "https://api.codex.jaagrav.in";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct CodexExecutor {
    url: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

impl CodexExecutor {
    pub fn new(url: &str, timeout_secs: u64) -> Self {
        let url = if url.is_empty() { DEFAULT_URL } else { url };
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
            url: url.to_string(),
            timeout_secs,
            client,
        }
    }
}

#[derive(Deserialize)]
struct CodexResponse {
    #[serde(default)]
    status: Option<i64>,
    #[serde(default)]
    output: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[async_trait]
impl CodeExecutor for CodexExecutor {
    #[instrument(skip(self, source), fields(source_len = source.len()))]
    async fn run(&self, source: &str, language: CodeLanguage) -> Result<String, ExecutionError> {
        let form = [
            ("code", source),
            ("language", language.wire_code()),
            ("input", ""),
        ];

        let response = self
            .client
            .post(&self.url)
            .form(&form)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ExecutionError::Unavailable(format!(
                        "no response within {}s",
                        self.timeout_secs
                    ))
                } else {
                    ExecutionError::Unavailable(e.to_string())
                }
            })?;

        let status = response.status().as_u16();
        if status >= 400 {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status, "execution service returned an error: {body}");
            return Err(ExecutionError::Unavailable(format!("HTTP {status}")));
        }

        let body: CodexResponse = response.json().await.map_err(|e| {
            ExecutionError::Unavailable(format!("failed to parse execution response: {e}"))
        })?;

        match body.status {
            Some(200) => Ok(body.output.unwrap_or_default()),
            _ => Err(ExecutionError::Rejected {
                message: body.error.unwrap_or_default(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn successful_run_returns_output() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("language=js"))
            .and(body_string_contains("input="))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": 200,
                "output": "42\n",
                "language": "js"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let executor = CodexExecutor::new(&server.uri(), 5);
        let output = executor
            .run("console.log(42)", CodeLanguage::JavaScript)
            .await
            .unwrap();
        assert_eq!(output, "42\n");
    }

    #[tokio::test]
    async fn python_uses_short_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("language=py"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({"status": 200})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let executor = CodexExecutor::new(&server.uri(), 5);
        let output = executor.run("pass", CodeLanguage::Python).await.unwrap();
        assert_eq!(output, "");
    }

    #[tokio::test]
    async fn service_status_field_rejects() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": 400,
                "error": "SyntaxError: Unexpected token ')'"
            })))
            .mount(&server)
            .await;

        let executor = CodexExecutor::new(&server.uri(), 5);
        let err = executor
            .run("console.log(", CodeLanguage::JavaScript)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ExecutionError::Rejected {
                message: "SyntaxError: Unexpected token ')'".into()
            }
        );
    }

    #[tokio::test]
    async fn http_failure_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let executor = CodexExecutor::new(&server.uri(), 5);
        let err = executor
            .run("print(1)", CodeLanguage::Python)
            .await
            .unwrap_err();
        assert_eq!(err, ExecutionError::Unavailable("HTTP 502".into()));
    }

    #[tokio::test]
    async fn garbage_body_is_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let executor = CodexExecutor::new(&server.uri(), 5);
        let err = executor
            .run("print(1)", CodeLanguage::Python)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Unavailable(_)));
    }
}
