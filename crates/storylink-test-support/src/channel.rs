//! Test channels: mock `SyncChannel` implementations for tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use storylink_core::channel::{ChannelMessage, Subscription, SyncChannel};
use storylink_core::error::DomainError;

/// A channel that records every publish and subscription. Each subscription
/// yields the scripted inbound messages in order and then stays idle, like a
/// healthy connection with no traffic.
#[derive(Debug, Default)]
pub struct RecordingChannel {
    published: Mutex<Vec<ChannelMessage>>,
    subscriptions: Mutex<Vec<Vec<String>>>,
    inbound: Mutex<Vec<ChannelMessage>>,
}

impl RecordingChannel {
    /// Creates a channel with no scripted inbound traffic.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a channel whose subscriptions deliver `inbound`.
    #[must_use]
    pub fn with_inbound(inbound: Vec<ChannelMessage>) -> Self {
        Self {
            inbound: Mutex::new(inbound),
            ..Self::default()
        }
    }

    /// Returns a snapshot of everything published so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn published(&self) -> Vec<ChannelMessage> {
        self.published.lock().unwrap().clone()
    }

    /// Returns the published messages whose topic ends with `suffix`.
    pub fn published_to(&self, suffix: &str) -> Vec<ChannelMessage> {
        self.published()
            .into_iter()
            .filter(|m| m.topic.ends_with(suffix))
            .collect()
    }

    /// Forgets everything published so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn clear(&self) {
        self.published.lock().unwrap().clear();
    }

    /// Returns the filter lists of every subscription opened so far.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    pub fn subscriptions(&self) -> Vec<Vec<String>> {
        self.subscriptions.lock().unwrap().clone()
    }
}

#[async_trait]
impl SyncChannel for RecordingChannel {
    async fn subscribe(&self, filters: &[String]) -> Result<Box<dyn Subscription>, DomainError> {
        self.subscriptions.lock().unwrap().push(filters.to_vec());
        let scripted = self.inbound.lock().unwrap().clone();
        Ok(Box::new(ScriptedSubscription {
            pending: scripted.into(),
        }))
    }

    async fn publish(&self, message: ChannelMessage) -> Result<(), DomainError> {
        self.published.lock().unwrap().push(message);
        Ok(())
    }
}

struct ScriptedSubscription {
    pending: VecDeque<ChannelMessage>,
}

#[async_trait]
impl Subscription for ScriptedSubscription {
    async fn next_message(&mut self) -> Option<ChannelMessage> {
        match self.pending.pop_front() {
            Some(message) => Some(message),
            None => std::future::pending().await,
        }
    }
}

/// A channel that refuses every subscribe and publish with a transport error.
/// Useful for testing that navigation keeps working with sync unavailable.
#[derive(Debug)]
pub struct FailingChannel;

#[async_trait]
impl SyncChannel for FailingChannel {
    async fn subscribe(&self, _filters: &[String]) -> Result<Box<dyn Subscription>, DomainError> {
        Err(DomainError::Transport("connection refused".into()))
    }

    async fn publish(&self, _message: ChannelMessage) -> Result<(), DomainError> {
        Err(DomainError::Transport("connection refused".into()))
    }
}
