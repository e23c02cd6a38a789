//! modbot - moderation workflow engine for chat platforms
//!
//! Ingests flagged messages (from a classifier or from user reports),
//! interviews reporters and moderators through conversational flows,
//! enriches reports with an LLM categorization, and queues them for human
//! review by priority.
//!
//! # Modules
//!
//! - `adapters`: Messaging gateway, classifier and LLM interfaces plus implementations
//! - `core`: Queue, reporting and moderation flows, categorizer, orchestrator
//! - `domain`: Reports, categories, verdicts, message references
//! - `config`: YAML + environment configuration
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Interactive session against an in-memory server
//! modbot console
//!
//! # Categorize one message with the configured LLM
//! modbot categorize "vaccines contain microchips" --json
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use crate::core::{Categorizer, Orchestrator, PriorityQueue};
pub use crate::domain::{Report, SubmittedReport};
