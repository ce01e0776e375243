//! assessa-core: Timed assessment session engine, scoring, and traits.
//!
//! This crate defines the test data model, the collaborator traits, and the
//! session state machine (clock, answers, sections, scoring, submission)
//! that the rest of assessa builds on.

pub mod answers;
pub mod clock;
pub mod error;
pub mod mock;
pub mod model;
pub mod parser;
pub mod router;
pub mod scoring;
pub mod sections;
pub mod session;
pub mod submission;
pub mod traits;
