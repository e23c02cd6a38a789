//! Conversational flow that walks a moderator through one queued report.
//!
//! ```text
//! Start → AwaitingDecision ─(skip)─► AwaitingSkipReason ──────────────► Complete
//!                  │                                                      ▲
//!                (yes)                                                    │
//!                  ▼                                                      │
//!         AwaitingSummaryConfirm ─(any)─► AwaitingAction ─(1/2/3)─────────┘
//! ```
//!
//! The flow only records the decision. Acting on it (verdict notice,
//! reaction, re-queueing) is the orchestrator's job.

use crate::domain::report::display_or_none;
use crate::domain::{
    ActionTaken, ImminentHarm, MenuOption, MisinfoSubtype, MisinfoType, ModerationAction,
    Recommendation, ReportType, SkipReason, SubmittedReport,
};

pub const MODERATE_KEYWORD: &str = "moderate";

const MISINFORMATION_ARTICLE: &str = "https://en.wikipedia.org/wiki/Misinformation";

/// States of the moderation flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModerationState {
    Start,
    AwaitingDecision,
    AwaitingSkipReason,
    AwaitingSummaryConfirm,
    AwaitingAction,
    Complete,
}

/// A moderator's working copy of a dequeued report
#[derive(Debug, Clone)]
pub struct ModerationSession {
    report: SubmittedReport,
    report_type: ReportType,
    misinfo_type: Option<MisinfoType>,
    misinfo_subtype: Option<MisinfoSubtype>,
    imminent_harm: Option<ImminentHarm>,
    filter_requested: bool,
    recommendation: Option<Recommendation>,
    author_metadata: String,
    content_metadata: String,
    skip_reason: Option<SkipReason>,
    action_taken: Option<ActionTaken>,
}

impl ModerationSession {
    /// Take ownership of a dequeued report
    pub fn from_report(report: SubmittedReport) -> Self {
        Self {
            report_type: report.report_type,
            misinfo_type: report.misinfo_type,
            misinfo_subtype: report.misinfo_subtype,
            imminent_harm: report.imminent_harm,
            filter_requested: report.filter_requested,
            recommendation: report.llm_recommendation.clone(),
            author_metadata: format!("User: {}", report.author),
            content_metadata: format!("Msg: \"{}\"", report.content),
            skip_reason: None,
            action_taken: None,
            report,
        }
    }

    /// Attach a recommendation computed after dequeue
    pub fn with_recommendation(mut self, recommendation: Recommendation) -> Self {
        self.recommendation = Some(recommendation);
        self
    }

    pub fn report(&self) -> &SubmittedReport {
        &self.report
    }

    /// Hand the original report back (for re-queueing)
    pub fn into_report(self) -> SubmittedReport {
        self.report
    }

    pub fn recommendation(&self) -> Option<&Recommendation> {
        self.recommendation.as_ref()
    }

    pub fn skip_reason(&self) -> Option<SkipReason> {
        self.skip_reason
    }

    pub fn action_taken(&self) -> Option<ActionTaken> {
        self.action_taken
    }

    /// Full review summary shown after the moderator accepts the item
    pub fn summary(&self) -> String {
        let mut reply = format!(
            "This content was reported as {}.\nMisinfo category: {} - {}\n",
            self.report_type,
            display_or_none(self.misinfo_type),
            display_or_none(self.misinfo_subtype)
        );
        if let Some(harm) = self.imminent_harm.filter(ImminentHarm::is_imminent) {
            reply.push_str(&format!("Potential imminent harm: {}\n", harm));
        }
        if self.filter_requested {
            reply.push_str("User requested filtering/blocking.\n");
        }
        reply.push_str(&format!("Filed by: {}\n", self.report.origin));
        reply.push_str(&format!("Author metadata: {}\n", self.author_metadata));
        reply.push_str(&format!("Content metadata: {}\n", self.content_metadata));
        reply.push_str(&format!(
            "Here is the relevant wikipedia article: {}\n\n",
            MISINFORMATION_ARTICLE
        ));
        if let Some(ref recommendation) = self.recommendation {
            reply.push_str(&format!(
                "The Auto-Mod bot made this recommendation: {}\n\n",
                recommendation
            ));
        }
        reply.push_str("Type any key to continue.");
        reply
    }
}

/// One moderator's review of one report
#[derive(Debug, Clone)]
pub struct ModerationFlow {
    state: ModerationState,
    session: ModerationSession,
}

impl ModerationFlow {
    pub fn new(session: ModerationSession) -> Self {
        Self {
            state: ModerationState::Start,
            session,
        }
    }

    pub fn state(&self) -> ModerationState {
        self.state
    }

    pub fn session(&self) -> &ModerationSession {
        &self.session
    }

    pub fn into_session(self) -> ModerationSession {
        self.session
    }

    pub fn is_complete(&self) -> bool {
        self.state == ModerationState::Complete
    }

    /// Advance the review with one message from the moderator
    pub fn handle_message(&mut self, content: &str) -> Vec<String> {
        let input = content.trim();

        match self.state {
            ModerationState::Start => {
                self.state = ModerationState::AwaitingDecision;
                lines(&[
                    "New reported content available.",
                    "Would you like to review it now?",
                    "Type `yes` to begin review, or `skip` to pass.",
                ])
            }

            ModerationState::AwaitingDecision => {
                if input.eq_ignore_ascii_case("yes") {
                    self.state = ModerationState::AwaitingSummaryConfirm;
                    vec![self.session.summary()]
                } else if input.eq_ignore_ascii_case("skip") {
                    self.state = ModerationState::AwaitingSkipReason;
                    menu::<SkipReason>("Please select a reason for skipping:")
                } else {
                    lines(&["Invalid response. Type `yes` or `skip`."])
                }
            }

            ModerationState::AwaitingSkipReason => match SkipReason::from_choice(input) {
                Some(reason) => {
                    self.session.skip_reason = Some(reason);
                    self.session.action_taken = Some(ActionTaken::Skipped);
                    self.state = ModerationState::Complete;
                    vec![
                        format!("You skipped this review due to: {}.", reason),
                        "Returning to queue.".to_string(),
                    ]
                }
                None => {
                    let mut replies = lines(&["Please choose a valid skip reason:"]);
                    replies.extend(menu_lines::<SkipReason>());
                    replies
                }
            },

            ModerationState::AwaitingSummaryConfirm => {
                self.state = ModerationState::AwaitingAction;
                menu::<ModerationAction>("What action would you like to take on this content?")
            }

            ModerationState::AwaitingAction => match ModerationAction::from_choice(input) {
                Some(action) => {
                    let taken = ActionTaken::from(action);
                    self.session.action_taken = Some(taken);
                    self.state = ModerationState::Complete;
                    match taken {
                        ActionTaken::Removed => {
                            lines(&["Content has been removed. Review complete."])
                        }
                        ActionTaken::Allowed => {
                            lines(&["Content has been allowed. Review complete."])
                        }
                        ActionTaken::Escalated | ActionTaken::Skipped => lines(&[
                            "You escalated this review due to uncertainty.",
                            "Returning to queue.",
                        ]),
                    }
                }
                None => {
                    let mut replies = lines(&["Invalid action. Please choose one of:"]);
                    replies.extend(menu_lines::<ModerationAction>());
                    replies
                }
            },

            ModerationState::Complete => Vec::new(),
        }
    }
}

fn lines(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn menu_lines<T: MenuOption>() -> Vec<String> {
    T::menu().lines().map(str::to_string).collect()
}

fn menu<T: MenuOption>(header: &str) -> Vec<String> {
    let mut replies = vec![header.to_string()];
    replies.extend(menu_lines::<T>());
    replies
}
