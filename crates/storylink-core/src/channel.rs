//! Publish/subscribe channel abstraction.
//!
//! The synchronization layer never references a concrete transport; it talks
//! through [`SyncChannel`]. The channel is a shared, unauthenticated broadcast
//! medium: any participant may publish to any topic.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// A message as carried by the channel: a topic and a JSON text payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMessage {
    /// Full topic name, e.g. `nerfwar/story/state`.
    pub topic: String,
    /// JSON-encoded payload.
    pub payload: String,
    /// When set, the channel keeps this message as the topic's last value and
    /// hands it to every participant that subscribes later.
    #[serde(default)]
    pub retain: bool,
}

impl ChannelMessage {
    /// Creates a message that is delivered once and not retained.
    #[must_use]
    pub fn transient(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: false,
        }
    }

    /// Creates a message that the channel retains for late joiners.
    #[must_use]
    pub fn retained(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            retain: true,
        }
    }
}

/// A live subscription. Dropping it ends the subscription.
#[async_trait]
pub trait Subscription: Send {
    /// Waits for the next matching message. `None` means the connection was
    /// lost and the caller should reconnect.
    async fn next_message(&mut self) -> Option<ChannelMessage>;
}

/// Transport port for topic-based publish/subscribe.
#[async_trait]
pub trait SyncChannel: Send + Sync {
    /// Opens a subscription for the given topic filters. Retained messages
    /// matching the filters are delivered first, in filter order.
    async fn subscribe(&self, filters: &[String]) -> Result<Box<dyn Subscription>, DomainError>;

    /// Publishes a message to every current subscriber of its topic.
    async fn publish(&self, message: ChannelMessage) -> Result<(), DomainError>;
}
