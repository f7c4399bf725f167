//! Aggregate root abstraction.

use uuid::Uuid;

use crate::event::DomainEvent;

/// Trait for stateful roots that record every change they make as an event.
///
/// Storylink keeps no event store: recorded events are drained by whoever owns
/// the aggregate (the reconciliation protocol) and turned into outbound
/// messages, then discarded.
pub trait AggregateRoot: Send + Sync {
    /// The event type this aggregate records.
    type Event: DomainEvent;

    /// Returns the aggregate identifier.
    fn aggregate_id(&self) -> Uuid;

    /// Returns the current version (number of events recorded so far).
    fn version(&self) -> i64;

    /// Returns events recorded since the last drain.
    fn uncommitted_events(&self) -> &[Self::Event];

    /// Removes and returns the recorded events, oldest first.
    fn take_uncommitted_events(&mut self) -> Vec<Self::Event>;
}
