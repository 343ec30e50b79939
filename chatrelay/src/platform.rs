//! Messaging-platform collaborator interface.
//!
//! The relay never talks to the platform directly; everything goes through a
//! [`MessagingClient`]. Inbound traffic arrives as [`PlatformEvent`]s.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RelayResult;
use crate::target::{Group, IndividualQuery, MessageHandle, OutgoingContent, Target};

#[async_trait]
pub trait MessagingClient: Send + Sync {
    /// Exact-match lookup of individuals by alias or display name.
    async fn find_individuals(&self, query: IndividualQuery) -> RelayResult<Vec<Target>>;

    /// Exact-match lookup of groups by topic.
    async fn find_groups(&self, topic: &str) -> RelayResult<Vec<Target>>;

    /// Every individual known to the account; source for the directory dump.
    async fn list_individuals(&self) -> RelayResult<Vec<Target>>;

    async fn say(&self, target: &Target, content: OutgoingContent) -> RelayResult<MessageHandle>;

    async fn recall(&self, handle: &MessageHandle) -> RelayResult<bool>;

    /// Ask the platform to refresh its view of `target`.
    async fn sync(&self, target: &Target) -> RelayResult<()>;

    /// Live topic of a group, which may differ from the topic seen at lookup.
    async fn current_topic(&self, group: &Group) -> RelayResult<String>;

    /// The logged-in account itself.
    async fn self_target(&self) -> RelayResult<Target>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePayload {
    Text {
        text: String,
    },
    Attachment {
        file_name: String,
        #[serde(default)]
        bytes: Vec<u8>,
    },
    /// The platform reports that the message `original_id` was retracted.
    Recalled {
        original_id: String,
    },
    Unsupported {
        kind: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub id: String,
    pub talker: Target,
    #[serde(default)]
    pub listener: Option<Target>,
    #[serde(default)]
    pub room: Option<Target>,
    /// True when the account itself sent the message from another device.
    #[serde(default)]
    pub self_sent: bool,
    pub payload: MessagePayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PlatformEvent {
    Message(InboundMessage),
    Login { user: Target },
    Logout { user: Target },
}
