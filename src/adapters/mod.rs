//! Adapter interfaces for external systems.
//!
//! The engine talks to three collaborators it does not implement itself:
//! the chat platform (`MessagingGateway`), the misinformation classifier
//! (`Classifier`) and a text-completion model (`LlmService`).

pub mod classifier;
pub mod memory;
pub mod openai;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{Channel, ChannelId, FetchedMessage, Guild, GuildId, MessageId, MessageRef};

pub use classifier::HttpClassifier;
pub use memory::{InMemoryGateway, SentMessage};
pub use openai::OpenAiAdapter;

/// Chat platform operations the engine needs.
///
/// Lookups return `Ok(None)` when the entity does not exist and `Err` only
/// for transport failures.
#[async_trait]
pub trait MessagingGateway: Send + Sync {
    /// Human-readable gateway name
    fn name(&self) -> &str;

    async fn resolve_guild(&self, guild_id: GuildId) -> Result<Option<Guild>>;

    async fn resolve_channel(
        &self,
        guild_id: GuildId,
        channel_id: ChannelId,
    ) -> Result<Option<Channel>>;

    async fn fetch_message(
        &self,
        channel_id: ChannelId,
        message_id: MessageId,
    ) -> Result<Option<FetchedMessage>>;

    async fn send_message(&self, channel_id: ChannelId, text: &str) -> Result<()>;

    async fn react_to_message(&self, message: MessageRef, emoji: &str) -> Result<()>;
}

/// Label returned by the classifier service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClassifierLabel {
    #[serde(rename = "Misinformation")]
    Misinformation,

    #[serde(rename = "Not Misinformation")]
    NotMisinformation,
}

/// Classifier verdict for one message
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    #[serde(rename = "classification")]
    pub label: ClassifierLabel,

    /// Advisory only; any misinformation label triggers categorization
    #[serde(rename = "confidence_score")]
    pub confidence: f64,
}

impl Classification {
    pub fn is_misinformation(&self) -> bool {
        self.label == ClassifierLabel::Misinformation
    }
}

/// Remote misinformation classifier
#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, message: &str) -> Result<Classification>;
}

/// Text-completion backend used by every categorization step
#[async_trait]
pub trait LlmService: Send + Sync {
    fn name(&self) -> &str;

    /// Complete `user_content` under `system_instruction`
    async fn complete(&self, system_instruction: &str, user_content: &str) -> Result<String>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_wire_format() {
        let parsed: Classification = serde_json::from_str(
            r#"{"classification": "Not Misinformation", "confidence_score": 0.71}"#,
        )
        .unwrap();
        assert_eq!(parsed.label, ClassifierLabel::NotMisinformation);
        assert!(!parsed.is_misinformation());

        let parsed: Classification = serde_json::from_str(
            r#"{"classification": "Misinformation", "confidence_score": 0.52}"#,
        )
        .unwrap();
        assert!(parsed.is_misinformation());
    }
}
