//! Conversational flow that collects a report from a reporting user.
//!
//! ```text
//! Start → AwaitingMessageLink → AwaitingReason ─(Other)──────────────────────────────┐
//!                                     │                                              │
//!                              AwaitingMisinfoType ─(Other)─┐                        │
//!                               │              │            │                        │
//!        AwaitingPoliticalSubtype  AwaitingHealthSubtype    │                        │
//!                               └──────┬───────┘            │                        │
//!                            AwaitingHarmAssessment ◄───────┘                        │
//!                                      │                                             │
//!                           AwaitingFilterPreference ──────────────────────► Complete ◄┘
//! ```
//!
//! `cancel` moves any non-terminal state to `Cancelled`. Invalid input never
//! changes state; it produces an error and the same option list again.

use thiserror::Error;
use tracing::{debug, warn};

use crate::adapters::MessagingGateway;
use crate::domain::{
    ChannelId, FetchedMessage, FilterChoice, GuildId, HealthSubtype, ImminentHarm, MenuOption,
    MessageId, MessageRef, MisinfoSubtype, MisinfoType, PoliticalSubtype, Report, ReportType,
};

pub const START_KEYWORD: &str = "report";
pub const CANCEL_KEYWORD: &str = "cancel";

const TRY_AGAIN: &str = "Please try again or say `cancel` to cancel.";

/// States of the reporting flow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportState {
    Start,
    AwaitingMessageLink,
    AwaitingReason,
    AwaitingMisinfoType,
    AwaitingPoliticalSubtype,
    AwaitingHealthSubtype,
    AwaitingHarmAssessment,
    AwaitingFilterPreference,
    Complete,
    Cancelled,
}

impl ReportState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Cancelled)
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Start => "starting",
            Self::AwaitingMessageLink => "waiting for a message link",
            Self::AwaitingReason => "waiting for a report reason",
            Self::AwaitingMisinfoType => "waiting for a misinformation type",
            Self::AwaitingPoliticalSubtype => "waiting for a political misinformation type",
            Self::AwaitingHealthSubtype => "waiting for a health misinformation type",
            Self::AwaitingHarmAssessment => "waiting for a harm assessment",
            Self::AwaitingFilterPreference => "waiting for a filter preference",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Why a pasted message link could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    #[error("Link does not contain guild/channel/message ids")]
    InvalidLink,

    #[error("Guild {0} not found")]
    GuildNotFound(GuildId),

    #[error("Channel {0} not found")]
    ChannelNotFound(ChannelId),

    #[error("Message {0} not found")]
    MessageNotFound(MessageId),

    #[error("Gateway lookup failed: {0}")]
    Gateway(String),
}

impl ResolutionError {
    /// Re-prompt shown to the reporter
    pub fn user_reply(&self) -> String {
        match self {
            Self::InvalidLink => format!("I'm sorry, I couldn't read that link. {}", TRY_AGAIN),
            Self::GuildNotFound(_) => "I cannot accept reports of messages from guilds that I'm not in. \
                Please have the guild owner add me to the guild and try again."
                .to_string(),
            Self::ChannelNotFound(_) => format!(
                "It seems this channel was deleted or never existed. {}",
                TRY_AGAIN
            ),
            Self::MessageNotFound(_) => format!(
                "It seems this message was deleted or never existed. {}",
                TRY_AGAIN
            ),
            Self::Gateway(_) => format!("I couldn't look up that message right now. {}", TRY_AGAIN),
        }
    }
}

/// Resolve a pasted link to the message it points at
pub async fn resolve_message_link(
    link: &str,
    gateway: &dyn MessagingGateway,
) -> Result<FetchedMessage, ResolutionError> {
    let MessageRef {
        guild_id,
        channel_id,
        message_id,
    } = MessageRef::parse_link(link).ok_or(ResolutionError::InvalidLink)?;

    let gateway_err = |e: anyhow::Error| ResolutionError::Gateway(e.to_string());

    gateway
        .resolve_guild(guild_id)
        .await
        .map_err(gateway_err)?
        .ok_or(ResolutionError::GuildNotFound(guild_id))?;

    gateway
        .resolve_channel(guild_id, channel_id)
        .await
        .map_err(gateway_err)?
        .ok_or(ResolutionError::ChannelNotFound(channel_id))?;

    gateway
        .fetch_message(channel_id, message_id)
        .await
        .map_err(gateway_err)?
        .ok_or(ResolutionError::MessageNotFound(message_id))
}

/// One reporter's in-progress report
#[derive(Debug, Clone)]
pub struct ReportFlow {
    state: ReportState,
    report: Report,
}

impl Default for ReportFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportFlow {
    pub fn new() -> Self {
        Self {
            state: ReportState::Start,
            report: Report::new(),
        }
    }

    pub fn state(&self) -> ReportState {
        self.state
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    /// Complete or cancelled
    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn is_cancelled(&self) -> bool {
        self.state == ReportState::Cancelled
    }

    /// Give up the draft (normally once the flow is finished)
    pub fn into_report(self) -> Report {
        self.report
    }

    /// Advance the flow with one message from the reporter, returning the replies in order
    pub async fn handle_message(
        &mut self,
        content: &str,
        gateway: &dyn MessagingGateway,
    ) -> Vec<String> {
        let input = content.trim();

        if self.state.is_terminal() {
            return Vec::new();
        }

        if input.eq_ignore_ascii_case(CANCEL_KEYWORD) {
            debug!(from = ?self.state, "Report cancelled");
            self.state = ReportState::Cancelled;
            self.report.cancel();
            return vec!["Report cancelled.".to_string()];
        }

        if self.state == ReportState::Start {
            self.state = ReportState::AwaitingMessageLink;
            return vec![
                "Thank you for starting the reporting process. Say `help` at any time for more information.\n\n\
                 Please copy paste the link to the message you want to report.\n\
                 You can obtain this link by right-clicking the message and clicking `Copy Message Link`."
                    .to_string(),
            ];
        }

        if input.eq_ignore_ascii_case(START_KEYWORD) {
            return vec![format!(
                "You currently have an active report open, the status is: {}. \
                 Please continue this report or say `cancel` to cancel.",
                self.state.label()
            )];
        }

        let previous = self.state;
        let replies = match self.state {
            ReportState::AwaitingMessageLink => self.on_message_link(input, gateway).await,
            ReportState::AwaitingReason => self.on_reason(input),
            ReportState::AwaitingMisinfoType => self.on_misinfo_type(input),
            ReportState::AwaitingPoliticalSubtype => self.on_political_subtype(input),
            ReportState::AwaitingHealthSubtype => self.on_health_subtype(input),
            ReportState::AwaitingHarmAssessment => self.on_harm(input),
            ReportState::AwaitingFilterPreference => self.on_filter(input),
            ReportState::Start | ReportState::Complete | ReportState::Cancelled => Vec::new(),
        };
        if previous != self.state {
            debug!(from = ?previous, to = ?self.state, "Report flow advanced");
        }
        replies
    }

    async fn on_message_link(&mut self, input: &str, gateway: &dyn MessagingGateway) -> Vec<String> {
        let message = match resolve_message_link(input, gateway).await {
            Ok(message) => message,
            Err(e) => {
                if let ResolutionError::Gateway(ref reason) = e {
                    warn!(gateway = gateway.name(), %reason, "Message link lookup failed");
                }
                return vec![e.user_reply()];
            }
        };

        let reply = format!(
            "I found this message:```{}: {}```\n\
             Please select the reason for reporting this message by typing the corresponding number:\n{}",
            message.author_name,
            message.content,
            ReportType::menu()
        );
        self.report.set_reported_message(message);
        self.state = ReportState::AwaitingReason;
        vec![reply]
    }

    fn on_reason(&mut self, input: &str) -> Vec<String> {
        match ReportType::from_choice(input) {
            Some(ReportType::Misinformation) => {
                self.report.set_report_type(ReportType::Misinformation);
                self.state = ReportState::AwaitingMisinfoType;
                vec![format!(
                    "You have selected {}.\n\
                     Please select the type of misinformation by typing the corresponding number:\n{}",
                    ReportType::Misinformation,
                    MisinfoType::menu()
                )]
            }
            Some(ReportType::Other) => {
                self.report.set_report_type(ReportType::Other);
                self.complete()
            }
            None => invalid::<ReportType>("report reason"),
        }
    }

    fn on_misinfo_type(&mut self, input: &str) -> Vec<String> {
        let Some(misinfo_type) = MisinfoType::from_choice(input) else {
            return invalid::<MisinfoType>("misinformation type");
        };
        self.report.set_misinfo_type(misinfo_type);

        match misinfo_type {
            MisinfoType::Political => {
                self.state = ReportState::AwaitingPoliticalSubtype;
                vec![format!(
                    "You have selected {}.\n\
                     Please select the type of political misinformation by typing the corresponding number:\n{}",
                    misinfo_type,
                    PoliticalSubtype::menu()
                )]
            }
            MisinfoType::Health => {
                self.state = ReportState::AwaitingHealthSubtype;
                vec![format!(
                    "You have selected {}.\n\
                     Please select the type of health misinformation by typing the corresponding number:\n{}",
                    misinfo_type,
                    HealthSubtype::menu()
                )]
            }
            MisinfoType::Other => self.ask_harm(misinfo_type.menu_label()),
        }
    }

    fn on_political_subtype(&mut self, input: &str) -> Vec<String> {
        match PoliticalSubtype::from_choice(input) {
            Some(subtype) => {
                self.report
                    .set_misinfo_subtype(MisinfoSubtype::Political(subtype));
                self.ask_harm(subtype.menu_label())
            }
            None => invalid::<PoliticalSubtype>("political misinformation type"),
        }
    }

    fn on_health_subtype(&mut self, input: &str) -> Vec<String> {
        match HealthSubtype::from_choice(input) {
            Some(subtype) => {
                self.report.set_misinfo_subtype(MisinfoSubtype::Health(subtype));
                self.ask_harm(subtype.menu_label())
            }
            None => invalid::<HealthSubtype>("health misinformation type"),
        }
    }

    fn ask_harm(&mut self, selected: &str) -> Vec<String> {
        self.state = ReportState::AwaitingHarmAssessment;
        vec![format!("You have selected {}.\n{}", selected, harm_question())]
    }

    fn on_harm(&mut self, input: &str) -> Vec<String> {
        let Some(harm) = ImminentHarm::from_choice(input) else {
            return invalid::<ImminentHarm>("harm assessment");
        };
        self.report.set_imminent_harm(harm);
        self.state = ReportState::AwaitingFilterPreference;

        let mut replies = Vec::new();
        if harm.is_imminent() {
            replies.push("Thank you. Our team has been notified.".to_string());
        }
        replies.push(format!(
            "Please indicate if you would like to block content from this account on your feed. \
             Select the corresponding number:\n{}",
            FilterChoice::menu()
        ));
        replies
    }

    fn on_filter(&mut self, input: &str) -> Vec<String> {
        match FilterChoice::from_choice(input) {
            Some(choice) => {
                self.report.set_filter_requested(choice == FilterChoice::Yes);
                self.complete()
            }
            None => invalid::<FilterChoice>("filter preference"),
        }
    }

    fn complete(&mut self) -> Vec<String> {
        self.state = ReportState::Complete;
        let report_type = self
            .report
            .report_type()
            .map(|t| t.to_string())
            .unwrap_or_else(|| "this".to_string());
        vec![format!(
            "Thank you for reporting {} content.\n\
             Our content moderation team will review the message and take action \
             which may result in content or account removal.",
            report_type
        )]
    }
}

fn harm_question() -> String {
    format!(
        "Could this content likely cause imminent harm to people or public safety? \
         Select the corresponding number:\n{}",
        ImminentHarm::menu()
    )
}

/// Error plus the unchanged option list
fn invalid<T: MenuOption>(what: &str) -> Vec<String> {
    vec![format!(
        "That is not a valid {}. Please select one by typing the corresponding number:\n{}\n{}",
        what,
        T::menu(),
        TRY_AGAIN
    )]
}
