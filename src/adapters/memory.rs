//! In-memory messaging gateway.
//!
//! Holds guilds, channels and posted messages in process memory and records
//! everything the engine sends. Backs the interactive console and the tests.

use std::collections::HashMap;

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::Mutex;

use super::MessagingGateway;
use crate::domain::{
    Channel, ChannelId, FetchedMessage, Guild, GuildId, MessageId, MessageRef, UserId,
};

/// A message the engine sent through the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub channel_id: ChannelId,
    pub text: String,
}

#[derive(Default)]
struct GatewayState {
    guilds: HashMap<GuildId, Guild>,
    messages: HashMap<(ChannelId, MessageId), FetchedMessage>,
    sent: Vec<SentMessage>,
    reactions: Vec<(MessageRef, String)>,
    next_message_id: MessageId,
}

/// Gateway backed by process memory
#[derive(Default)]
pub struct InMemoryGateway {
    state: Mutex<GatewayState>,
}

impl InMemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_guild(&self, guild_id: GuildId, name: impl Into<String>) {
        let mut state = self.state.lock().await;
        state.guilds.entry(guild_id).or_insert_with(|| Guild {
            id: guild_id,
            name: name.into(),
            channels: Vec::new(),
        });
    }

    /// Add a text channel; returns false if the guild is unknown
    pub async fn add_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        name: impl Into<String>,
    ) -> bool {
        let mut state = self.state.lock().await;
        match state.guilds.get_mut(&guild_id) {
            Some(guild) => {
                guild.channels.push(Channel {
                    id: channel_id,
                    guild_id,
                    name: name.into(),
                });
                true
            }
            None => false,
        }
    }

    /// Store a message as if a user had posted it, returning its reference
    pub async fn post(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
        author_id: UserId,
        author_name: impl Into<String>,
        content: impl Into<String>,
    ) -> MessageRef {
        let mut state = self.state.lock().await;
        state.next_message_id += 1;
        let reference = MessageRef::new(guild_id, channel_id, state.next_message_id);
        state.messages.insert(
            (channel_id, reference.message_id),
            FetchedMessage {
                reference,
                author_id,
                author_name: author_name.into(),
                content: content.into(),
            },
        );
        reference
    }

    /// Everything sent so far, in send order
    pub async fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().await.sent.clone()
    }

    /// Drain the sent log
    pub async fn take_sent(&self) -> Vec<SentMessage> {
        std::mem::take(&mut self.state.lock().await.sent)
    }

    /// Texts sent to one channel, in send order
    pub async fn sent_to(&self, channel_id: ChannelId) -> Vec<String> {
        self.state
            .lock()
            .await
            .sent
            .iter()
            .filter(|m| m.channel_id == channel_id)
            .map(|m| m.text.clone())
            .collect()
    }

    pub async fn reactions(&self) -> Vec<(MessageRef, String)> {
        self.state.lock().await.reactions.clone()
    }
}

#[async_trait]
impl MessagingGateway for InMemoryGateway {
    fn name(&self) -> &str {
        "memory"
    }

    async fn resolve_guild(&self, guild_id: GuildId) -> Result<Option<Guild>> {
        Ok(self.state.lock().await.guilds.get(&guild_id).cloned())
    }

    async fn resolve_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Option<Channel>> {
        let state = self.state.lock().await;
        Ok(state.guilds.get(&guild_id).and_then(|guild| {
            guild
                .channels
                .iter()
                .find(|c| c.id == channel_id)
                .cloned()
        }))
    }

    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Option<FetchedMessage>> {
        Ok(self
            .state
            .lock()
            .await
            .messages
            .get(&(channel_id, message_id))
            .cloned())
    }

    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<()> {
        self.state.lock().await.sent.push(SentMessage {
            channel_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn react_to_message(&self, message: MessageRef, emoji: &str) -> Result<()> {
        self.state
            .lock()
            .await
            .reactions
            .push((message, emoji.to_string()));
        Ok(())
    }
}
