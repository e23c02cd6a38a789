//! Core moderation engine.
//!
//! This module contains:
//! - PriorityQueue: multi-lane queue of pending reports
//! - ReportFlow / ModerationFlow: per-user conversational state machines
//! - Categorizer: LLM questionnaire for flagged messages
//! - Orchestrator: routes messages and moves reports between the above

pub mod categorizer;
pub mod moderation_flow;
pub mod orchestrator;
pub mod queue;
pub mod report_flow;
pub mod retry;

// Re-export commonly used types
pub use categorizer::{
    CategorizationError, CategorizationStep, Categorizer, RecommendationRequest,
};
pub use moderation_flow::{ModerationFlow, ModerationSession, ModerationState, MODERATE_KEYWORD};
pub use orchestrator::{ChannelNames, Orchestrator, HELP_KEYWORD};
pub use queue::{LaneSummary, PriorityQueue, QueueError, QueueSummary, DEFAULT_LANES};
pub use report_flow::{
    resolve_message_link, ReportFlow, ReportState, ResolutionError, CANCEL_KEYWORD,
    START_KEYWORD,
};
pub use retry::RetryPolicy;
