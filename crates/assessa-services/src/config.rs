//! Configuration loading and the service factory.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use assessa_core::clock::TICK_PERIOD;
use assessa_core::model::CodeLanguage;
use assessa_core::session::{ReadinessPolicy, SessionConfig, SessionServices};

use crate::backend::BackendClient;
use crate::codex::CodexExecutor;

/// How the countdown is released after the test loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessMode {
    /// Wait for an explicit ready signal.
    #[default]
    Signal,
    /// Start after `warmup_secs`.
    Warmup,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessConfig {
    #[serde(default)]
    pub mode: ReadinessMode,
    #[serde(default = "default_warmup_secs")]
    pub warmup_secs: u64,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            mode: ReadinessMode::default(),
            warmup_secs: default_warmup_secs(),
        }
    }
}

/// Top-level assessa configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssessaConfig {
    /// Base URL of the assessment backend.
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    /// URL of the code execution service.
    #[serde(default = "default_executor_url")]
    pub executor_url: String,
    /// Timeout for each HTTP request.
    #[serde(default = "default_timeout")]
    pub request_timeout_secs: u64,
    /// Language assumed for code answers that do not name one.
    #[serde(default)]
    pub default_language: CodeLanguage,
    #[serde(default)]
    pub readiness: ReadinessConfig,
}

fn default_backend_url() -> String {
    "http://localhost:5000".to_string()
}
fn default_executor_url() -> String {
    "https://api.codex.jaagrav.in".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_warmup_secs() -> u64 {
    10
}

impl Default for AssessaConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            executor_url: default_executor_url(),
            request_timeout_secs: default_timeout(),
            default_language: CodeLanguage::default(),
            readiness: ReadinessConfig::default(),
        }
    }
}

impl AssessaConfig {
    /// Session settings derived from this configuration.
    pub fn session_config(&self) -> SessionConfig {
        let readiness = match self.readiness.mode {
            ReadinessMode::Signal => ReadinessPolicy::Signal,
            ReadinessMode::Warmup => {
                ReadinessPolicy::Warmup(Duration::from_secs(self.readiness.warmup_secs))
            }
        };
        SessionConfig {
            readiness,
            tick_period: TICK_PERIOD,
            default_language: self.default_language,
        }
    }
}

/// Resolve environment variable references like `${VAR_NAME}` in a string.
fn resolve_env_vars(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(start) = result.find("${") {
        let Some(end) = result[start..].find('}') else {
            break;
        };
        let var_name = &result[start + 2..start + end];
        let value = std::env::var(var_name).unwrap_or_default();
        result = format!("{}{}{}", &result[..start], value, &result[start + end + 1..]);
    }
    result
}

/// Load configuration from well-known paths.
///
/// Search order:
/// 1. `assessa.toml` in the current directory
/// 2. `~/.config/assessa/config.toml`
///
/// Environment variable overrides: `ASSESSA_BACKEND_URL`, `ASSESSA_EXECUTOR_URL`.
pub fn load_config() -> Result<AssessaConfig> {
    load_config_from(None)
}

/// Load config from an explicit path, or search the default locations.
pub fn load_config_from(path: Option<&Path>) -> Result<AssessaConfig> {
    let config_path = match path {
        Some(p) if p.exists() => Some(p.to_path_buf()),
        Some(p) => anyhow::bail!("config file not found: {}", p.display()),
        None => {
            let local = PathBuf::from("assessa.toml");
            if local.exists() {
                Some(local)
            } else {
                dirs_path()
                    .map(|dir| dir.join("config.toml"))
                    .filter(|global| global.exists())
            }
        }
    };

    let mut config = match config_path {
        Some(path) => {
            tracing::debug!("loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("failed to read config: {}", path.display()))?;
            toml::from_str::<AssessaConfig>(&content)
                .with_context(|| format!("failed to parse config: {}", path.display()))?
        }
        None => AssessaConfig::default(),
    };

    if let Ok(url) = std::env::var("ASSESSA_BACKEND_URL") {
        config.backend_url = url;
    }
    if let Ok(url) = std::env::var("ASSESSA_EXECUTOR_URL") {
        config.executor_url = url;
    }

    config.backend_url = resolve_env_vars(&config.backend_url);
    config.executor_url = resolve_env_vars(&config.executor_url);

    Ok(config)
}

fn dirs_path() -> Option<PathBuf> {
    std::env::var("HOME")
        .ok()
        .map(|h| PathBuf::from(h).join(".config").join("assessa"))
}

/// Build the HTTP collaborators for a session.
pub fn create_services(config: &AssessaConfig) -> SessionServices {
    let backend = Arc::new(BackendClient::new(
        &config.backend_url,
        config.request_timeout_secs,
    ));
    let executor = Arc::new(CodexExecutor::new(
        &config.executor_url,
        config.request_timeout_secs,
    ));
    SessionServices {
        tests: backend.clone(),
        evaluator: backend.clone(),
        executor,
        results: backend,
    }
}
