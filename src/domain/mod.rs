//! Domain types for the moderation engine.
//!
//! This module contains the core data structures:
//! - Categories: closed option sets for each questionnaire step
//! - Reports: drafts, submitted snapshots and priority derivation
//! - Verdicts: moderator decisions
//! - Messages: ids and references into the messaging platform

pub mod category;
pub mod message;
pub mod report;
pub mod verdict;

// Re-export commonly used types
pub use category::{
    FilterChoice, HealthSubtype, ImminentHarm, MenuOption, MisinfoSubtype, MisinfoType,
    PoliticalSubtype, RecommendedAction, ReportType,
};
pub use message::{
    Channel, ChannelId, FetchedMessage, Guild, GuildId, InboundMessage, MessageId, MessageRef,
    UserId,
};
pub use report::{
    priority, Categorization, Recommendation, Report, ReportOrigin, SubmitError,
    SubmittedReport,
};
pub use verdict::{ActionTaken, ModerationAction, SkipReason};
