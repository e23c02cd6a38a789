//! Shared fakes and fixtures for integration tests.

#![allow(dead_code)]

use std::ops::Deref;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use modbot::adapters::{
    Classification, Classifier, ClassifierLabel, InMemoryGateway, LlmService, MessagingGateway,
};
use modbot::core::{Categorizer, Orchestrator, PriorityQueue, RetryPolicy};
use modbot::domain::{
    Channel, ChannelId, FetchedMessage, Guild, GuildId, InboundMessage, MessageId, MessageRef,
    UserId,
};

pub const GUILD: GuildId = 7;
pub const USER_CHANNEL: ChannelId = 70;
pub const MOD_CHANNEL: ChannelId = 71;
pub const BOT: UserId = 1;

/// LLM answering by the first script entry whose key occurs in the prompt.
/// `None` answers (and unmatched prompts) fail the call.
pub struct ScriptedLlm {
    script: Vec<(&'static str, Option<&'static str>)>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedLlm {
    pub fn new(script: Vec<(&'static str, Option<&'static str>)>) -> Arc<Self> {
        Arc::new(Self {
            script,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmService for ScriptedLlm {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, _system: &str, user: &str) -> Result<String> {
        self.calls.lock().unwrap().push(user.to_string());
        match self.script.iter().find(|(key, _)| user.contains(key)) {
            Some((_, Some(answer))) => Ok(answer.to_string()),
            _ => Err(anyhow!("scripted failure")),
        }
    }
}

/// Classifier returning the same verdict for every message; `None` errors
pub struct FixedClassifier {
    result: Option<Classification>,
}

impl FixedClassifier {
    pub fn flagging(confidence: f64) -> Arc<Self> {
        Arc::new(Self {
            result: Some(Classification {
                label: ClassifierLabel::Misinformation,
                confidence,
            }),
        })
    }

    pub fn passing() -> Arc<Self> {
        Arc::new(Self {
            result: Some(Classification {
                label: ClassifierLabel::NotMisinformation,
                confidence: 0.97,
            }),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self { result: None })
    }
}

#[async_trait]
impl Classifier for FixedClassifier {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn classify(&self, _message: &str) -> Result<Classification> {
        self.result.ok_or_else(|| anyhow!("classifier returned 503"))
    }
}

/// In-memory gateway whose sends to one channel can be made to fail
#[derive(Default)]
pub struct FlakyGateway {
    inner: InMemoryGateway,
    rejected: Mutex<Option<ChannelId>>,
}

impl FlakyGateway {
    pub fn reject_sends_to(&self, channel_id: ChannelId) {
        *self.rejected.lock().unwrap() = Some(channel_id);
    }
}

impl Deref for FlakyGateway {
    type Target = InMemoryGateway;

    fn deref(&self) -> &InMemoryGateway {
        &self.inner
    }
}

#[async_trait]
impl MessagingGateway for FlakyGateway {
    fn name(&self) -> &str {
        "flaky"
    }

    async fn resolve_guild(&self, guild_id: GuildId) -> Result<Option<Guild>> {
        self.inner.resolve_guild(guild_id).await
    }

    async fn resolve_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Option<Channel>> {
        self.inner.resolve_channel(guild_id, channel_id).await
    }

    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Option<FetchedMessage>> {
        self.inner.fetch_message(channel_id, message_id).await
    }

    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<()> {
        if *self.rejected.lock().unwrap() == Some(channel_id) {
            return Err(anyhow!("channel {} unavailable", channel_id));
        }
        self.inner.send_message(channel_id, text).await
    }

    async fn react_to_message(&self, message: MessageRef, emoji: &str) -> Result<()> {
        self.inner.react_to_message(message, emoji).await
    }
}

/// Flaky gateway with the same guild layout as [`gateway`]
pub async fn flaky_gateway() -> Arc<FlakyGateway> {
    let gateway = Arc::new(FlakyGateway::default());
    gateway.add_guild(GUILD, "test guild").await;
    gateway.add_channel(GUILD, USER_CHANNEL, "reports").await;
    gateway.add_channel(GUILD, MOD_CHANNEL, "reports-mod").await;
    gateway
}

pub fn categorizer(llm: Arc<ScriptedLlm>) -> Categorizer {
    Categorizer::new(llm, RetryPolicy::fixed(3, Duration::ZERO))
}

/// Gateway with one guild holding the default user and moderation channels
pub async fn gateway() -> Arc<InMemoryGateway> {
    let gateway = Arc::new(InMemoryGateway::new());
    gateway.add_guild(GUILD, "test guild").await;
    gateway.add_channel(GUILD, USER_CHANNEL, "reports").await;
    gateway.add_channel(GUILD, MOD_CHANNEL, "reports-mod").await;
    gateway
}

/// Orchestrator over `gateway` with the guild registered
pub async fn orchestrator<G: MessagingGateway + 'static>(gateway: &Arc<G>) -> Orchestrator {
    let orchestrator =
        Orchestrator::new(gateway.clone(), PriorityQueue::default()).with_bot_user(BOT);
    assert!(orchestrator.register_guild(GUILD).await.unwrap());
    orchestrator
}

pub fn dm_channel(user_id: UserId) -> ChannelId {
    1000 + user_id
}

pub fn dm(user_id: UserId, name: &str, text: &str) -> InboundMessage {
    InboundMessage::direct(user_id, name, dm_channel(user_id), text)
}

/// Send a sequence of direct messages from one user
pub async fn converse(orchestrator: &Orchestrator, user_id: UserId, name: &str, inputs: &[&str]) {
    for input in inputs {
        orchestrator
            .handle_message(dm(user_id, name, input))
            .await
            .unwrap();
    }
}

/// Post in the user channel and return where the message landed
pub async fn post(
    gateway: &InMemoryGateway,
    author_id: UserId,
    author: &str,
    text: &str,
) -> MessageRef {
    gateway
        .post(GUILD, USER_CHANNEL, author_id, author, text)
        .await
}

/// File a report on `target` through the reporting flow
pub async fn file_report(
    orchestrator: &Orchestrator,
    reporter_id: UserId,
    target: MessageRef,
    answers: &[&str],
) {
    let link = target.link();
    let mut inputs = vec!["report", link.as_str()];
    inputs.extend_from_slice(answers);
    converse(orchestrator, reporter_id, "reporter", &inputs).await;
}
