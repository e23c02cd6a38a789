//! Moderator decisions.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::category::MenuOption;

/// Why a moderator passed on a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Personal,
    ConflictOfInterest,
    RequiresEscalation,
}

impl MenuOption for SkipReason {
    const OPTIONS: &'static [Self] = &[
        Self::Personal,
        Self::ConflictOfInterest,
        Self::RequiresEscalation,
    ];

    fn menu_label(&self) -> &'static str {
        match self {
            Self::Personal => "Personal reasons",
            Self::ConflictOfInterest => "Bias/Conflict of interest (recusal)",
            Self::RequiresEscalation => "Requires escalation",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.menu_label())
    }
}

/// Options on the final action menu
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModerationAction {
    Remove,
    Allow,
    Escalate,
}

impl MenuOption for ModerationAction {
    const OPTIONS: &'static [Self] = &[Self::Remove, Self::Allow, Self::Escalate];

    fn menu_label(&self) -> &'static str {
        match self {
            Self::Remove => "Remove content",
            Self::Allow => "Allow content",
            Self::Escalate => "Uncertain (Escalate)",
        }
    }
}

/// Outcome of a finished review
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionTaken {
    Removed,
    Allowed,
    Escalated,
    Skipped,
}

impl ActionTaken {
    /// Removed and Allowed close the report; the others send it back to the queue
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Removed | Self::Allowed)
    }
}

impl From<ModerationAction> for ActionTaken {
    fn from(action: ModerationAction) -> Self {
        match action {
            ModerationAction::Remove => Self::Removed,
            ModerationAction::Allow => Self::Allowed,
            ModerationAction::Escalate => Self::Escalated,
        }
    }
}

impl fmt::Display for ActionTaken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Removed => "Removed",
            Self::Allowed => "Allowed",
            Self::Escalated => "Escalated",
            Self::Skipped => "Skipped",
        };
        f.write_str(label)
    }
}
