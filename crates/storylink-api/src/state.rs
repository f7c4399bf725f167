//! Shared application state.

use std::sync::Arc;

use storylink_broker::InMemoryBroker;
use storylink_sync::application::runtime::ParticipantHandle;

/// Application state shared across all request handlers.
#[derive(Clone)]
pub struct AppState {
    /// The participant this server hosts.
    pub participant: ParticipantHandle,
    /// Broker shared by the participant and the WebSocket relay.
    pub broker: Arc<InMemoryBroker>,
    /// Topic prefix relayed over `/ws`.
    pub topic_prefix: String,
}

impl AppState {
    /// Create new application state.
    #[must_use]
    pub fn new(
        participant: ParticipantHandle,
        broker: Arc<InMemoryBroker>,
        topic_prefix: impl Into<String>,
    ) -> Self {
        Self {
            participant,
            broker,
            topic_prefix: topic_prefix.into(),
        }
    }
}
