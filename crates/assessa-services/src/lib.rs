//! assessa-services: HTTP collaborators for the assessa session engine.
//!
//! Implements the `TestSource`, `AnswerEvaluator`, and `ResultStore` traits
//! against the assessment backend, and `CodeExecutor` against a CodeX-style
//! execution service. Also loads `assessa.toml` and wires the collaborators
//! into a `SessionServices` bundle.

pub mod backend;
pub mod codex;
pub mod config;

pub use backend::BackendClient;
pub use codex::CodexExecutor;
pub use config::{create_services, load_config, load_config_from, AssessaConfig, ReadinessConfig, ReadinessMode};
