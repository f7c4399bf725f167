//! In-memory implementation of the `SyncChannel` port.

use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use storylink_core::channel::{ChannelMessage, Subscription, SyncChannel};
use storylink_core::error::DomainError;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

use crate::topic_filter;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
struct BrokerState {
    sender: broadcast::Sender<ChannelMessage>,
    retained: BTreeMap<String, ChannelMessage>,
    online: bool,
}

/// A pub/sub broker living in process memory.
///
/// Retained messages are kept per topic (last one wins; an empty retained
/// payload clears the topic) and replayed to every new subscription before
/// live traffic. Retained state survives [`InMemoryBroker::go_offline`], like
/// a broker with persistent storage.
#[derive(Debug)]
pub struct InMemoryBroker {
    state: Mutex<BrokerState>,
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryBroker {
    /// Creates an empty, online broker.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            state: Mutex::new(BrokerState {
                sender,
                retained: BTreeMap::new(),
                online: true,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, BrokerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Drops every live subscription and refuses new traffic until
    /// [`InMemoryBroker::go_online`].
    pub fn go_offline(&self) {
        let mut state = self.state();
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        // Replacing the sender closes every existing receiver.
        state.sender = sender;
        state.online = false;
        info!("Broker offline");
    }

    /// Accepts traffic again.
    pub fn go_online(&self) {
        self.state().online = true;
        info!("Broker online");
    }

    /// Retained messages whose topic matches `filter`, in topic order.
    #[must_use]
    pub fn retained(&self, filter: &str) -> Vec<ChannelMessage> {
        self.state()
            .retained
            .values()
            .filter(|message| topic_filter::matches(filter, &message.topic))
            .cloned()
            .collect()
    }

    /// Number of live subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.state().sender.receiver_count()
    }
}

#[async_trait]
impl SyncChannel for InMemoryBroker {
    async fn subscribe(&self, filters: &[String]) -> Result<Box<dyn Subscription>, DomainError> {
        for filter in filters {
            topic_filter::validate(filter)?;
        }
        let state = self.state();
        if !state.online {
            return Err(DomainError::Transport("broker is offline".into()));
        }

        // Retained replay follows filter order; a message matching several
        // filters is replayed once.
        let mut seen = HashSet::new();
        let mut backlog = VecDeque::new();
        for filter in filters {
            for message in state.retained.values() {
                if topic_filter::matches(filter, &message.topic)
                    && seen.insert(message.topic.clone())
                {
                    backlog.push_back(message.clone());
                }
            }
        }
        debug!(filters = ?filters, retained = backlog.len(), "Subscription opened");

        Ok(Box::new(BrokerSubscription {
            filters: filters.to_vec(),
            backlog,
            receiver: state.sender.subscribe(),
        }))
    }

    async fn publish(&self, message: ChannelMessage) -> Result<(), DomainError> {
        let mut state = self.state();
        if !state.online {
            return Err(DomainError::Transport("broker is offline".into()));
        }
        if message.retain {
            if message.payload.is_empty() {
                state.retained.remove(&message.topic);
            } else {
                state.retained.insert(message.topic.clone(), message.clone());
            }
        }
        // No receivers is not an error: nobody is listening yet.
        let delivered = state.sender.send(message).unwrap_or(0);
        debug!(delivered, "Message published");
        Ok(())
    }
}

struct BrokerSubscription {
    filters: Vec<String>,
    backlog: VecDeque<ChannelMessage>,
    receiver: broadcast::Receiver<ChannelMessage>,
}

impl BrokerSubscription {
    fn wants(&self, topic: &str) -> bool {
        self.filters
            .iter()
            .any(|filter| topic_filter::matches(filter, topic))
    }
}

#[async_trait]
impl Subscription for BrokerSubscription {
    async fn next_message(&mut self) -> Option<ChannelMessage> {
        if let Some(message) = self.backlog.pop_front() {
            return Some(message);
        }
        loop {
            match self.receiver.recv().await {
                Ok(message) if self.wants(&message.topic) => return Some(message),
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Subscriber lagged; messages dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }
}
