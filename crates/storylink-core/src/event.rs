//! Recorded navigation events.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata attached to every recorded event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventMetadata {
    /// Unique event identifier.
    pub event_id: Uuid,
    /// Type name, e.g. `navigation.position_changed`.
    pub event_type: String,
    /// Aggregate that recorded the event.
    pub aggregate_id: Uuid,
    /// Monotonically increasing version within the aggregate.
    pub sequence_number: i64,
    /// Correlation ID for tracing a command through its effects.
    pub correlation_id: Uuid,
    /// When the aggregate recorded the change, per the injected clock.
    pub occurred_at: DateTime<Utc>,
}

/// Implemented by events an aggregate records. Events live only until the
/// reconciliation protocol drains them into outbound messages.
pub trait DomainEvent: Send + Sync + std::fmt::Debug {
    /// Dotted type name, matching `EventMetadata::event_type`.
    fn event_type(&self) -> &'static str;

    /// The event body as JSON, for structured logs.
    fn to_payload(&self) -> serde_json::Value;

    /// Identity, ordering and timing of the event.
    fn metadata(&self) -> &EventMetadata;
}
