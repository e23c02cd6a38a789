//! Session router for the moderation engine.
//!
//! Routes inbound messages to per-user reporting or moderation flows,
//! runs automatic review for messages posted in a user channel, and moves
//! reports between the flows and the shared priority queue.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{Classifier, MessagingGateway};
use crate::domain::{
    ActionTaken, Categorization, ChannelId, GuildId, InboundMessage, MessageRef, SubmittedReport,
    UserId,
};

use super::categorizer::{Categorizer, RecommendationRequest};
use super::moderation_flow::{ModerationFlow, ModerationSession, MODERATE_KEYWORD};
use super::queue::{PriorityQueue, QueueError, QueueSummary};
use super::report_flow::{ReportFlow, CANCEL_KEYWORD, START_KEYWORD};

pub const HELP_KEYWORD: &str = "help";

const REMOVED_REACTION: &str = "❌";

/// Names of the channels the engine watches in every guild
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelNames {
    /// Messages posted here go through automatic review
    pub user_channel: String,
    /// Receives report notices and verdicts, accepts queue commands
    pub mod_channel: String,
}

impl Default for ChannelNames {
    fn default() -> Self {
        Self {
            user_channel: "reports".to_string(),
            mod_channel: "reports-mod".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct GuildChannels {
    user_channel: Option<ChannelId>,
    mod_channel: Option<ChannelId>,
}

/// A user's active flows. At most one of each kind.
#[derive(Debug, Default)]
struct UserSession {
    report: Option<ReportFlow>,
    moderation: Option<ModerationFlow>,
    /// Set once the session has been removed from the map
    released: bool,
}

impl UserSession {
    fn is_idle(&self) -> bool {
        self.report.is_none() && self.moderation.is_none()
    }
}

/// Long-lived engine state shared by every conversation
pub struct Orchestrator {
    gateway: Arc<dyn MessagingGateway>,
    classifier: Option<Arc<dyn Classifier>>,
    categorizer: Option<Categorizer>,
    queue: Mutex<PriorityQueue>,
    next_report_id: AtomicU64,
    /// Outer lock only guards the map; each user's flows sit behind their own lock
    sessions: Mutex<HashMap<UserId, Arc<Mutex<UserSession>>>>,
    guilds: RwLock<HashMap<GuildId, GuildChannels>>,
    channel_names: ChannelNames,
    bot_user_id: Option<UserId>,
}

impl Orchestrator {
    pub fn new(gateway: Arc<dyn MessagingGateway>, queue: PriorityQueue) -> Self {
        Self {
            gateway,
            classifier: None,
            categorizer: None,
            queue: Mutex::new(queue),
            next_report_id: AtomicU64::new(0),
            sessions: Mutex::new(HashMap::new()),
            guilds: RwLock::new(HashMap::new()),
            channel_names: ChannelNames::default(),
            bot_user_id: None,
        }
    }

    /// Enable automatic review of user-channel messages
    pub fn with_classifier(mut self, classifier: Arc<dyn Classifier>) -> Self {
        self.classifier = Some(classifier);
        self
    }

    /// Enable LLM categorization and recommendations
    pub fn with_categorizer(mut self, categorizer: Categorizer) -> Self {
        self.categorizer = Some(categorizer);
        self
    }

    pub fn with_channel_names(mut self, names: ChannelNames) -> Self {
        self.channel_names = names;
        self
    }

    /// Messages from this user id are ignored
    pub fn with_bot_user(mut self, user_id: UserId) -> Self {
        self.bot_user_id = Some(user_id);
        self
    }

    pub fn gateway(&self) -> &Arc<dyn MessagingGateway> {
        &self.gateway
    }

    /// Look up a guild's user and moderation channels by name.
    ///
    /// Returns false if the gateway does not know the guild.
    #[instrument(skip(self))]
    pub async fn register_guild(&self, guild_id: GuildId) -> Result<bool> {
        let guild = self
            .gateway
            .resolve_guild(guild_id)
            .await
            .with_context(|| format!("Failed to resolve guild {}", guild_id))?;

        let Some(guild) = guild else {
            warn!("Guild not found, not registering");
            return Ok(false);
        };

        let channels = GuildChannels {
            user_channel: guild
                .channel_named(&self.channel_names.user_channel)
                .map(|c| c.id),
            mod_channel: guild
                .channel_named(&self.channel_names.mod_channel)
                .map(|c| c.id),
        };
        if channels.mod_channel.is_none() {
            warn!(guild = %guild.name, channel = %self.channel_names.mod_channel, "Moderation channel not found");
        }
        info!(
            guild = %guild.name,
            user_channel = ?channels.user_channel,
            mod_channel = ?channels.mod_channel,
            "Guild registered"
        );

        self.guilds.write().await.insert(guild_id, channels);
        Ok(true)
    }

    /// Moderation channel for a registered guild
    pub async fn mod_channel(&self, guild_id: GuildId) -> Option<ChannelId> {
        self.guilds
            .read()
            .await
            .get(&guild_id)
            .and_then(|channels| channels.mod_channel)
    }

    /// Entry point for every inbound message event
    #[instrument(
        skip(self, message),
        fields(author = message.author_id, channel = message.channel_id)
    )]
    pub async fn handle_message(&self, message: InboundMessage) -> Result<()> {
        if Some(message.author_id) == self.bot_user_id {
            return Ok(());
        }

        match message.guild_id {
            None => self.handle_direct(&message).await,
            Some(guild_id) => self.handle_channel(guild_id, &message).await,
        }
    }

    /// Snapshot of queue depth
    pub async fn queue_summary(&self) -> QueueSummary {
        self.queue.lock().await.summary()
    }

    pub async fn pending_count(&self) -> usize {
        self.queue.lock().await.len()
    }

    /// Number of users with an open report or review
    pub async fn active_sessions(&self) -> usize {
        self.sessions.lock().await.len()
    }

    /// Render every pending report
    pub async fn display_queue(&self, show_content: bool) -> String {
        self.queue.lock().await.display_all(show_content)
    }

    /// Put a report on the queue
    pub async fn enqueue(&self, report: SubmittedReport) -> Result<(), QueueError> {
        let id = report.id;
        let priority = report.priority;
        match self.queue.lock().await.enqueue(report) {
            Ok(()) => {
                info!(report_id = id, priority, "Report enqueued");
                Ok(())
            }
            Err(e) => {
                error!(report_id = id, error = %e, "Report could not be enqueued");
                Err(e)
            }
        }
    }

    fn next_report_id(&self) -> u64 {
        self.next_report_id.fetch_add(1, Ordering::SeqCst)
    }

    // ---------------------------------------------------------------------
    // Direct messages
    // ---------------------------------------------------------------------

    async fn handle_direct(&self, message: &InboundMessage) -> Result<()> {
        let content = message.content.trim();

        if content.eq_ignore_ascii_case(HELP_KEYWORD) {
            return self.send(message.channel_id, &[help_text()]).await;
        }

        let starts_flow = starts_with_keyword(content, START_KEYWORD)
            || starts_with_keyword(content, MODERATE_KEYWORD);

        loop {
            let Some(handle) = self.session(message.author_id, starts_flow).await else {
                debug!("Direct message outside any flow ignored");
                return Ok(());
            };
            let mut session = handle.lock().await;
            // Released while this task waited for the lock
            if session.released {
                continue;
            }

            let result = self.route_direct(&mut session, message).await;
            if session.is_idle() {
                self.release_session(message.author_id, &handle, &mut session)
                    .await;
            }
            return result;
        }
    }

    async fn route_direct(&self, session: &mut UserSession, message: &InboundMessage) -> Result<()> {
        let content = message.content.trim();
        let wants_report = starts_with_keyword(content, START_KEYWORD);
        let wants_moderation = starts_with_keyword(content, MODERATE_KEYWORD);

        if session.report.is_some() || (session.moderation.is_none() && wants_report) {
            self.drive_report(session, message).await
        } else if session.moderation.is_some() || wants_moderation {
            self.drive_moderation(session, message).await
        } else {
            debug!("Direct message outside any flow ignored");
            Ok(())
        }
    }

    /// The user's session, created only when `create` is set
    async fn session(&self, user_id: UserId, create: bool) -> Option<Arc<Mutex<UserSession>>> {
        let mut sessions = self.sessions.lock().await;
        if create {
            Some(sessions.entry(user_id).or_default().clone())
        } else {
            sessions.get(&user_id).cloned()
        }
    }

    /// Drop an idle session from the map. Called with the session lock held.
    async fn release_session(
        &self,
        user_id: UserId,
        handle: &Arc<Mutex<UserSession>>,
        session: &mut UserSession,
    ) {
        let mut sessions = self.sessions.lock().await;
        if sessions
            .get(&user_id)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
        {
            sessions.remove(&user_id);
        }
        session.released = true;
    }

    async fn drive_report(&self, session: &mut UserSession, message: &InboundMessage) -> Result<()> {
        let flow = session.report.get_or_insert_with(ReportFlow::new);
        let replies = flow
            .handle_message(&message.content, self.gateway.as_ref())
            .await;
        let finished = flow.is_finished();

        // Submit before replying so a failed send cannot strand the report
        let completed = match session.report.take() {
            Some(flow) if finished => self.complete_report(flow, message).await,
            flow => {
                session.report = flow;
                Ok(())
            }
        };
        let sent = self.send(message.channel_id, &replies).await;
        completed.and(sent)
    }

    async fn complete_report(&self, flow: ReportFlow, message: &InboundMessage) -> Result<()> {
        if flow.is_cancelled() {
            info!(reporter = message.author_id, "Report cancelled");
            return Ok(());
        }

        let submitted = match SubmittedReport::from_report(
            self.next_report_id(),
            flow.into_report(),
            message.author_id,
            message.author_name.clone(),
        ) {
            Ok(submitted) => submitted,
            Err(e) => {
                warn!(error = %e, "Finished report could not be submitted");
                return Ok(());
            }
        };
        self.submit(submitted).await
    }

    async fn drive_moderation(
        &self,
        session: &mut UserSession,
        message: &InboundMessage,
    ) -> Result<()> {
        let mut replies = Vec::new();

        if session.moderation.is_none() {
            let dequeued = self.queue.lock().await.dequeue();
            let report = match dequeued {
                Ok(report) => report,
                Err(QueueError::QueueEmpty) => {
                    return self
                        .send(message.channel_id, &["No pending reports.".to_string()])
                        .await;
                }
                Err(e) => {
                    error!(error = %e, "Dequeue failed");
                    return Ok(());
                }
            };
            info!(report_id = report.id, moderator = message.author_id, "Review started");

            replies.push(format!("```{}```", PriorityQueue::display_one(&report, false)));
            let review = self.start_review(report).await;
            session.moderation = Some(ModerationFlow::new(review));
        }

        let content = message.content.trim();
        if content.eq_ignore_ascii_case(CANCEL_KEYWORD) {
            if let Some(flow) = session.moderation.take() {
                let report = flow.into_session().into_report();
                info!(report_id = report.id, "Review cancelled, returning report to queue");
                replies.push(match self.enqueue(report).await {
                    Ok(()) => {
                        "Review cancelled. The report has been returned to the queue.".to_string()
                    }
                    Err(e) => requeue_failed(&e),
                });
            }
            return self.send(message.channel_id, &replies).await;
        }

        let Some(flow) = session.moderation.as_mut() else {
            return Ok(());
        };
        replies.extend(flow.handle_message(content));
        let complete = flow.is_complete();

        let resolved = match session.moderation.take() {
            Some(flow) if complete => {
                self.resolve_review(flow.into_session(), &mut replies)
                    .await
            }
            flow => {
                session.moderation = flow;
                Ok(())
            }
        };
        let sent = self.send(message.channel_id, &replies).await;
        resolved.and(sent)
    }

    /// Wrap a dequeued report for review, fetching a recommendation if it has none
    async fn start_review(&self, report: SubmittedReport) -> ModerationSession {
        let needs_recommendation = report.llm_recommendation.is_none();
        let recommendation = match (&self.categorizer, needs_recommendation) {
            (Some(categorizer), true) => {
                categorizer
                    .recommend(RecommendationRequest::from(&report))
                    .await
            }
            _ => None,
        };

        let review = ModerationSession::from_report(report);
        match recommendation {
            Some(recommendation) => review.with_recommendation(recommendation),
            None => review,
        }
    }

    /// Publish the verdict of a finished review, or return the report to the queue
    async fn resolve_review(
        &self,
        review: ModerationSession,
        replies: &mut Vec<String>,
    ) -> Result<()> {
        let action = review.action_taken();
        let report = review.into_report();
        info!(report_id = report.id, action = ?action, "Review complete");

        match action {
            Some(action) if action.is_final() => {
                let verdict = format!(
                    "Report ID: {}\nhas been moderated.\nVerdict: {}.",
                    report.id, action
                );
                self.notify_moderators(report.message.guild_id, &verdict)
                    .await?;
                if action == ActionTaken::Removed {
                    self.gateway
                        .react_to_message(report.message, REMOVED_REACTION)
                        .await
                        .with_context(|| {
                            format!("Failed to react to message {}", report.message)
                        })?;
                }
            }
            _ => {
                if let Err(e) = self.enqueue(report).await {
                    replies.push(requeue_failed(&e));
                }
            }
        }
        Ok(())
    }

    // ---------------------------------------------------------------------
    // Guild channels
    // ---------------------------------------------------------------------

    async fn handle_channel(&self, guild_id: GuildId, message: &InboundMessage) -> Result<()> {
        let Some(channels) = self.guilds.read().await.get(&guild_id).copied() else {
            debug!(guild = guild_id, "Message from unregistered guild ignored");
            return Ok(());
        };

        if channels.mod_channel == Some(message.channel_id) {
            self.handle_mod_command(message).await
        } else if channels.user_channel == Some(message.channel_id) {
            match message.reference() {
                Some(reference) => self.auto_review(reference, message).await,
                None => Ok(()),
            }
        } else {
            Ok(())
        }
    }

    async fn handle_mod_command(&self, message: &InboundMessage) -> Result<()> {
        let content = message.content.trim();

        let reply = if content == "report summary" {
            self.queue_summary().await.to_string()
        } else if content.starts_with("report display") {
            let show_content = content.contains("showcontent");
            self.display_queue(show_content).await
        } else {
            return Ok(());
        };

        self.send(message.channel_id, &[reply]).await
    }

    /// Classify a user-channel message and file an automatic report on a hit
    async fn auto_review(&self, reference: MessageRef, message: &InboundMessage) -> Result<()> {
        let Some(classifier) = &self.classifier else {
            return Ok(());
        };

        let classification = match classifier.classify(&message.content).await {
            Ok(classification) => classification,
            Err(e) => {
                warn!(classifier = classifier.name(), error = %e, "Classification failed");
                let notice = format!("Error classifying message: {}", message.content);
                return self.notify_moderators(reference.guild_id, &notice).await;
            }
        };

        if !classification.is_misinformation() {
            debug!(
                confidence = classification.confidence,
                "Message not flagged"
            );
            return Ok(());
        }
        info!(
            reported = %reference,
            confidence = classification.confidence,
            "Message flagged as misinformation"
        );

        let categorization = match &self.categorizer {
            Some(categorizer) => {
                categorizer
                    .categorize(&message.content, Some(classification))
                    .await
            }
            None => Categorization::default(),
        };

        let report = SubmittedReport::from_categorization(
            self.next_report_id(),
            reference,
            message.author_name.clone(),
            message.content.clone(),
            classification.confidence,
            categorization,
        );
        self.submit(report).await
    }

    /// Enqueue a new report and announce it to the moderators
    async fn submit(&self, report: SubmittedReport) -> Result<()> {
        let notice = report_notice(&report);
        let guild_id = report.message.guild_id;
        if self.enqueue(report).await.is_err() {
            return Ok(());
        }
        self.notify_moderators(guild_id, &notice).await
    }

    async fn notify_moderators(&self, guild_id: GuildId, text: &str) -> Result<()> {
        match self.mod_channel(guild_id).await {
            Some(channel) => self.send(channel, &[text.to_string()]).await,
            None => {
                warn!(guild = guild_id, "No moderation channel for guild, notice dropped");
                Ok(())
            }
        }
    }

    async fn send(&self, channel_id: ChannelId, replies: &[String]) -> Result<()> {
        for reply in replies {
            self.gateway
                .send_message(channel_id, reply)
                .await
                .with_context(|| format!("Failed to send message to channel {}", channel_id))?;
        }
        Ok(())
    }
}

fn starts_with_keyword(content: &str, keyword: &str) -> bool {
    content
        .get(..keyword.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
}

fn requeue_failed(error: &QueueError) -> String {
    format!("The report could not be returned to the queue: {}", error)
}

fn help_text() -> String {
    [
        "Use the `report` command to begin the reporting process.",
        "Use the `cancel` command to cancel the report process.",
        "Use the `moderate` command to begin the moderation process.",
    ]
    .join("\n")
}

/// Moderation-channel announcement for a newly queued report
fn report_notice(report: &SubmittedReport) -> String {
    let mut notice = format!(
        "Report ID: {}\n{} reported user {}'s message.\nCategory: {}\n",
        report.id,
        report.origin,
        report.author,
        report.category_path()
    );
    if let Some(harm) = report.urgent_harm() {
        notice.push_str(&format!("URGENT: Imminent {} harm reported.", harm.label()));
    }
    notice.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryGateway;
    use crate::domain::{ImminentHarm, MisinfoSubtype, MisinfoType, PoliticalSubtype};

    const MOD_DM: ChannelId = 9;

    /// A review of an unassessed report (priority 2) against a one-lane queue,
    /// so returning it to the queue fails
    fn single_lane_review() -> (Arc<InMemoryGateway>, Orchestrator, UserSession) {
        let gateway = Arc::new(InMemoryGateway::new());
        let orchestrator = Orchestrator::new(gateway.clone(), PriorityQueue::new(["only"]));
        let report = SubmittedReport::from_categorization(
            0,
            MessageRef::new(1, 2, 3),
            "poster",
            "text",
            0.8,
            Categorization::default(),
        );
        let session = UserSession {
            moderation: Some(ModerationFlow::new(ModerationSession::from_report(report))),
            ..Default::default()
        };
        (gateway, orchestrator, session)
    }

    async fn moderate(orchestrator: &Orchestrator, session: &mut UserSession, inputs: &[&str]) {
        for input in inputs {
            let message = InboundMessage::direct(500, "mod", MOD_DM, *input);
            orchestrator.drive_moderation(session, &message).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_cancel_reports_failed_requeue() {
        let (gateway, orchestrator, mut session) = single_lane_review();

        moderate(&orchestrator, &mut session, &["cancel"]).await;

        assert!(session.moderation.is_none());
        assert_eq!(
            gateway.sent_to(MOD_DM).await,
            vec!["The report could not be returned to the queue: \
                  Invalid priority level 2 (queue has 1 levels)"
                .to_string()]
        );
    }

    #[tokio::test]
    async fn test_escalate_reports_failed_requeue() {
        let (gateway, orchestrator, mut session) = single_lane_review();

        moderate(&orchestrator, &mut session, &["moderate", "yes", "ok", "3"]).await;

        assert!(session.moderation.is_none());
        let replies = gateway.sent_to(MOD_DM).await;
        assert_eq!(replies[replies.len() - 2], "Returning to queue.");
        assert!(replies[replies.len() - 1].starts_with("The report could not be returned"));
        assert_eq!(orchestrator.pending_count().await, 0);
    }

    #[test]
    fn test_keyword_prefix() {
        assert!(starts_with_keyword("report", START_KEYWORD));
        assert!(starts_with_keyword("Report now", START_KEYWORD));
        assert!(!starts_with_keyword("rep", START_KEYWORD));
        assert!(!starts_with_keyword("moderate", START_KEYWORD));
    }

    #[test]
    fn test_report_notice() {
        let report = SubmittedReport::from_categorization(
            12,
            MessageRef::new(1, 2, 3),
            "poster",
            "text",
            0.8,
            Categorization {
                misinfo_type: Some(MisinfoType::Political),
                misinfo_subtype: Some(MisinfoSubtype::Political(
                    PoliticalSubtype::ElectionCampaign,
                )),
                imminent_harm: Some(ImminentHarm::Mental),
                recommendation: None,
            },
        );
        assert_eq!(
            report_notice(&report),
            "Report ID: 12\n[Auto-Mod] reported user poster's message.\n\
             Category: Misinformation > Political Misinformation > Election/Campaign Misinformation\n\
             URGENT: Imminent mental harm reported."
        );
    }

    #[test]
    fn test_notice_without_harm_has_no_urgent_line() {
        let report = SubmittedReport::from_categorization(
            0,
            MessageRef::new(1, 2, 3),
            "poster",
            "text",
            0.8,
            Categorization::default(),
        );
        assert!(!report_notice(&report).contains("URGENT"));
    }
}
