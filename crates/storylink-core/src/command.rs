//! Requests that change a participant's navigation state.

use std::fmt;

use uuid::Uuid;

/// Implemented by every navigation command so handlers can log them uniformly.
pub trait Command: Send + Sync + fmt::Debug {
    /// Stable dotted name, e.g. `navigation.next_line`.
    fn command_type(&self) -> &'static str;

    /// Copied into every event the command records.
    fn correlation_id(&self) -> Uuid;
}
