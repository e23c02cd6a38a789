//! Identifiers and message references for the messaging gateway.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub type UserId = u64;
pub type GuildId = u64;
pub type ChannelId = u64;
pub type MessageId = u64;

/// Link pattern: `.../<guild>/<channel>/<message>`
static LINK_PATTERN: OnceLock<Option<Regex>> = OnceLock::new();

fn link_pattern() -> Option<&'static Regex> {
    LINK_PATTERN
        .get_or_init(|| Regex::new(r"/(\d+)/(\d+)/(\d+)").ok())
        .as_ref()
}

/// Fully qualified location of a message on the platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub guild_id: GuildId,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
}

impl MessageRef {
    pub fn new(guild_id: GuildId, channel_id: ChannelId, message_id: MessageId) -> Self {
        Self {
            guild_id,
            channel_id,
            message_id,
        }
    }

    /// Extract the three ids from a pasted message link.
    ///
    /// Accepts anything containing `/<digits>/<digits>/<digits>`, so both
    /// full URLs and bare paths work. Ids that overflow `u64` are rejected.
    pub fn parse_link(link: &str) -> Option<Self> {
        let caps = link_pattern()?.captures(link)?;
        let guild_id = caps.get(1)?.as_str().parse().ok()?;
        let channel_id = caps.get(2)?.as_str().parse().ok()?;
        let message_id = caps.get(3)?.as_str().parse().ok()?;
        Some(Self::new(guild_id, channel_id, message_id))
    }

    /// Canonical link for this message
    pub fn link(&self) -> String {
        format!(
            "https://discord.com/channels/{}/{}/{}",
            self.guild_id, self.channel_id, self.message_id
        )
    }
}

impl fmt::Display for MessageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.guild_id, self.channel_id, self.message_id)
    }
}

/// An inbound message event delivered by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub author_id: UserId,
    pub author_name: String,
    /// `None` for direct messages
    pub guild_id: Option<GuildId>,
    pub channel_id: ChannelId,
    pub message_id: MessageId,
    pub content: String,
}

impl InboundMessage {
    /// A direct message to the bot
    pub fn direct(
        author_id: UserId,
        author_name: impl Into<String>,
        channel_id: ChannelId,
        content: impl Into<String>,
    ) -> Self {
        Self {
            author_id,
            author_name: author_name.into(),
            guild_id: None,
            channel_id,
            message_id: 0,
            content: content.into(),
        }
    }

    /// A message posted in a guild channel
    pub fn in_guild(
        author_id: UserId,
        author_name: impl Into<String>,
        reference: MessageRef,
        content: impl Into<String>,
    ) -> Self {
        Self {
            author_id,
            author_name: author_name.into(),
            guild_id: Some(reference.guild_id),
            channel_id: reference.channel_id,
            message_id: reference.message_id,
            content: content.into(),
        }
    }

    pub fn is_direct(&self) -> bool {
        self.guild_id.is_none()
    }

    /// Location of this message, if it was posted in a guild
    pub fn reference(&self) -> Option<MessageRef> {
        self.guild_id
            .map(|guild_id| MessageRef::new(guild_id, self.channel_id, self.message_id))
    }
}

/// A guild as resolved by the gateway
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Guild {
    pub id: GuildId,
    pub name: String,
    pub channels: Vec<Channel>,
}

impl Guild {
    /// Find a text channel by exact name
    pub fn channel_named(&self, name: &str) -> Option<&Channel> {
        self.channels.iter().find(|c| c.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Channel {
    pub id: ChannelId,
    pub guild_id: GuildId,
    pub name: String,
}

/// A message fetched from the platform by reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedMessage {
    pub reference: MessageRef,
    pub author_id: UserId,
    pub author_name: String,
    pub content: String,
}
