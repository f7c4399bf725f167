//! Domain layer for the Synchronization context.

pub mod messages;
pub mod reconciliation;
pub mod topics;
